//! # wyvc-logic
//!
//! The logical-expression model shared by the verification-condition engine
//! and the solver interface.
//!
//! Expressions are immutable trees of [`ExprNode`] wrapped in [`Expr`], a
//! cheaply-clonable shared handle. Sharing is semantically significant: the
//! branch engine splits constraint lists into a common prefix and two
//! remainders by *pointer* identity at control-flow joins, so constraints
//! established before a fork must be the same handle on both sides.

pub mod expr;

pub use expr::{Expr, ExprNode};
