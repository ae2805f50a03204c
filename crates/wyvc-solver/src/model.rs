/// A counterexample model reported by the checker.
///
/// Assignments map logical-variable names to the checker's textual rendering
/// of their values. The engine threads these through to failure reports; it
/// does not interpret them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// Variable assignments: `(name, value)` pairs in checker order.
    pub assignments: Vec<(String, String)>,
}

impl Model {
    pub fn new() -> Self {
        Self {
            assignments: Vec::new(),
        }
    }

    pub fn with_assignments(assignments: Vec<(String, String)>) -> Self {
        Self { assignments }
    }

    /// Look up a variable's value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_model() {
        let model = Model::new();
        assert!(model.is_empty());
        assert_eq!(model.len(), 0);
        assert_eq!(model.get("x"), None);
    }

    #[test]
    fn lookup_by_name() {
        let model = Model::with_assignments(vec![
            ("r0".to_string(), "-1".to_string()),
            ("r1_3".to_string(), "{}".to_string()),
        ]);
        assert_eq!(model.len(), 2);
        assert_eq!(model.get("r0"), Some("-1"));
        assert_eq!(model.get("r1_3"), Some("{}"));
        assert_eq!(model.get("r2"), None);
    }
}
