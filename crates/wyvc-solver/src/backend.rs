//! Abstraction over satisfiability-checker implementations.
//!
//! The verification engine is generic over this trait so that it can be
//! driven against a production automaton/SMT checker or a scripted stand-in
//! in tests. Implementations live outside this workspace.

use wyvc_logic::Expr;

use crate::error::SolverError;
use crate::result::SolverResult;

/// A satisfiability checker for logical expressions.
pub trait SolverBackend {
    /// Check satisfiability of `expr`.
    ///
    /// Returns:
    /// - `Ok(SolverResult::Sat(model))` if satisfiable
    /// - `Ok(SolverResult::Unsat)` if unsatisfiable
    /// - `Ok(SolverResult::Unknown(reason))` if the checker gave up
    /// - `Err(SolverError)` if the checker itself failed
    fn check(&self, expr: &Expr) -> Result<SolverResult, SolverError>;
}

impl<T: SolverBackend + ?Sized> SolverBackend for &T {
    fn check(&self, expr: &Expr) -> Result<SolverResult, SolverError> {
        (**self).check(expr)
    }
}

impl<T: SolverBackend + ?Sized> SolverBackend for Box<T> {
    fn check(&self, expr: &Expr) -> Result<SolverResult, SolverError> {
        (**self).check(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysUnsat;

    impl SolverBackend for AlwaysUnsat {
        fn check(&self, _expr: &Expr) -> Result<SolverResult, SolverError> {
            Ok(SolverResult::Unsat)
        }
    }

    #[test]
    fn trait_object_dispatch() {
        let backend: Box<dyn SolverBackend> = Box::new(AlwaysUnsat);
        let result = backend.check(&Expr::bool_lit(false)).unwrap();
        assert!(result.is_unsat());
    }

    #[test]
    fn reference_dispatch() {
        let backend = AlwaysUnsat;
        let by_ref: &dyn SolverBackend = &backend;
        assert!(by_ref.check(&Expr::bool_lit(true)).unwrap().is_unsat());
    }
}
