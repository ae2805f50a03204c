use crate::model::Model;

/// Result from the satisfiability checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverResult {
    /// Formula is satisfiable. For a negated obligation this means the
    /// property FAILED; the optional model is the counterexample.
    Sat(Option<Model>),
    /// Formula is unsatisfiable. For a negated obligation this means the
    /// property is PROVED.
    Unsat,
    /// The checker could not decide (timeout, resource limit, incomplete
    /// theory). The string carries the checker's reason.
    Unknown(String),
}

impl SolverResult {
    /// Returns `true` if the result is `Sat`.
    pub fn is_sat(&self) -> bool {
        matches!(self, SolverResult::Sat(_))
    }

    /// Returns `true` if the result is `Unsat`.
    pub fn is_unsat(&self) -> bool {
        matches!(self, SolverResult::Unsat)
    }

    /// Returns `true` if the result is `Unknown`.
    pub fn is_unknown(&self) -> bool {
        matches!(self, SolverResult::Unknown(_))
    }

    /// Returns the counterexample model, if any.
    pub fn model(&self) -> Option<&Model> {
        match self {
            SolverResult::Sat(Some(model)) => Some(model),
            _ => None,
        }
    }
}
