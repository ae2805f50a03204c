//! # wyvc-solver
//!
//! The satisfiability-checker interface consumed by the verification-condition
//! engine. The checker itself is an external collaborator; this crate defines
//! the seam: a [`SolverBackend`] receives a closed logical [`Expr`] and reports
//! [`SolverResult::Sat`] (with an optional counterexample [`Model`]),
//! [`SolverResult::Unsat`], or [`SolverResult::Unknown`].
//!
//! Verification conditions are checked by asking the backend about the
//! *negation* of the property: `Unsat` means the property is valid.
//!
//! [`Expr`]: wyvc_logic::Expr

pub mod backend;
pub mod error;
pub mod model;
pub mod result;

pub use backend::SolverBackend;
pub use error::SolverError;
pub use model::Model;
pub use result::SolverResult;
