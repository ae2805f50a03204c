//! # wyvc-vcgen
//!
//! Path-sensitive verification-condition generation over the register IR.
//!
//! The [`branch::VcArena`] walks every feasible path through a
//! [`Block`], forking at conditionals, joining at control-flow meets, and
//! killing unreachable paths, while a [`transformer::VcTransformer`]
//! translates each bytecode into logical constraints. The concrete
//! [`vcgen::VcGenerator`] emits [`vcgen::Obligation`]s which
//! [`verify::verify_module`] submits to an external
//! [`SolverBackend`]. The [`generator::GlobalGenerator`] elaborates
//! refinement-type predicates into IR blocks that are inlined at use sites.
//!
//! [`Block`]: wyvc_ir::Block
//! [`SolverBackend`]: wyvc_solver::SolverBackend

pub mod branch;
pub mod error;
pub mod generator;
pub mod surface;
pub mod transformer;
pub mod vcgen;
pub mod verify;

pub use branch::{BranchId, Scope, ScopeKind, VcArena, VcBranch};
pub use error::VcError;
pub use generator::GlobalGenerator;
pub use surface::{ModuleLoader, NameResolver, SourceTypeDef, SourceUnits, SurfaceType};
pub use transformer::VcTransformer;
pub use vcgen::{FunctionRegistry, ModuleRegistry, Obligation, VcGenerator, VcKind};
pub use verify::{verify_module, FunctionReport, ObligationStatus, VerificationOutcome};
