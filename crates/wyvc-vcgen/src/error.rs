use std::fmt;

use wyvc_ir::block::Attribute;
use wyvc_ir::error::TypeError;
use wyvc_ir::name::QualifiedName;
use wyvc_solver::SolverError;

/// Errors raised while generating or checking verification conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcError {
    /// A nominal name could not be located in the source set or on the
    /// module path.
    UnresolvedName(QualifiedName),
    /// A construct whose elaboration is deliberately unimplemented
    /// (refinements under unions, maps, references, intersections,
    /// negations, and recursive refinements).
    UnsupportedFeature(String),
    /// An opcode's static type disagreed with its operand's declared type.
    TypeInconsistency(String),
    /// Structurally ill-formed types from a caller.
    Type(TypeError),
    /// The external checker failed.
    Solver(SolverError),
    /// An internal invariant was violated; the attributes locate the
    /// offending entry.
    Internal { message: String, attributes: Vec<Attribute> },
}

impl VcError {
    pub(crate) fn internal(message: impl Into<String>, attributes: &[Attribute]) -> Self {
        VcError::Internal { message: message.into(), attributes: attributes.to_vec() }
    }
}

impl fmt::Display for VcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedName(name) => write!(f, "name not found: {name}"),
            Self::UnsupportedFeature(what) => write!(f, "unsupported feature: {what}"),
            Self::TypeInconsistency(what) => write!(f, "type inconsistency: {what}"),
            Self::Type(e) => write!(f, "{e}"),
            Self::Solver(e) => write!(f, "{e}"),
            Self::Internal { message, .. } => write!(f, "internal failure: {message}"),
        }
    }
}

impl std::error::Error for VcError {}

impl From<TypeError> for VcError {
    fn from(e: TypeError) -> Self {
        VcError::Type(e)
    }
}

impl From<SolverError> for VcError {
    fn from(e: SolverError) -> Self {
        VcError::Solver(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyvc_ir::name::{PathId, QualifiedName};

    #[test]
    fn display_unresolved_name() {
        let err = VcError::UnresolvedName(QualifiedName::new(
            PathId::from_segments(["whiley", "lang"]),
            "nat",
        ));
        assert_eq!(err.to_string(), "name not found: whiley/lang:nat");
    }

    #[test]
    fn display_unsupported_feature() {
        let err = VcError::UnsupportedFeature("union refinement".to_string());
        assert_eq!(err.to_string(), "unsupported feature: union refinement");
    }

    #[test]
    fn type_error_converts() {
        let err: VcError = TypeError::EmptyUnion.into();
        assert!(matches!(err, VcError::Type(_)));
    }

    #[test]
    fn internal_carries_attributes() {
        let err = VcError::internal("scope stack empty", &[Attribute::new("line", vec![3])]);
        match err {
            VcError::Internal { attributes, .. } => {
                assert_eq!(attributes.len(), 1);
                assert_eq!(attributes[0].name, "line");
            }
            other => panic!("expected internal, got {other:?}"),
        }
    }
}
