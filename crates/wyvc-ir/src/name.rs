use std::fmt;

/// A hierarchical path identifying a compilation unit, e.g. `whiley/lang/Int`.
///
/// The empty path is the root. Paths are immutable; `append` builds children.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PathId {
    segments: Vec<String>,
}

impl PathId {
    /// The root path (no segments).
    pub fn root() -> Self {
        PathId { segments: Vec::new() }
    }

    pub fn from_segments(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        PathId {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        PathId { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path with the final segment removed, or `None` for the root.
    pub fn parent(&self) -> Option<PathId> {
        if self.segments.is_empty() {
            None
        } else {
            Some(PathId {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// The final segment, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A canonical name: a module path plus a symbol within that module.
///
/// Qualified names key the global generator's memoization cache and identify
/// invocation targets in the IR. Names whose module is the root path are
/// block-local (recursion labels) and never cross a module boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    module: PathId,
    name: String,
}

impl QualifiedName {
    pub fn new(module: PathId, name: impl Into<String>) -> Self {
        QualifiedName { module, name: name.into() }
    }

    /// A root-module name, used for recursion labels.
    pub fn local(name: impl Into<String>) -> Self {
        QualifiedName { module: PathId::root(), name: name.into() }
    }

    pub fn module(&self) -> &PathId {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_path_is_empty() {
        let root = PathId::root();
        assert!(root.is_root());
        assert_eq!(root.segments().len(), 0);
        assert_eq!(root.parent(), None);
        assert_eq!(root.last(), None);
    }

    #[test]
    fn append_builds_children() {
        let p = PathId::root().append("whiley").append("lang");
        assert_eq!(p.segments(), &["whiley".to_string(), "lang".to_string()]);
        assert_eq!(p.last(), Some("lang"));
        assert_eq!(p.parent(), Some(PathId::from_segments(["whiley"])));
    }

    #[test]
    fn display_joins_with_slash() {
        let p = PathId::from_segments(["whiley", "lang", "Int"]);
        assert_eq!(p.to_string(), "whiley/lang/Int");
    }

    #[test]
    fn qualified_name_display() {
        let qn = QualifiedName::new(PathId::from_segments(["whiley", "lang"]), "max");
        assert_eq!(qn.to_string(), "whiley/lang:max");
    }

    #[test]
    fn local_name_has_root_module() {
        let qn = QualifiedName::local("X");
        assert!(qn.module().is_root());
        assert_eq!(qn.name(), "X");
    }

    #[test]
    fn ordering_is_stable() {
        let a = QualifiedName::new(PathId::from_segments(["a"]), "f");
        let b = QualifiedName::new(PathId::from_segments(["b"]), "f");
        assert!(a < b);
    }
}
