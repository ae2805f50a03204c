//! # wyvc-ir
//!
//! The intermediate representation at the heart of the wyvc verification
//! core: a register-based, unstructured bytecode into which the surface
//! language has already been lowered, together with its type model, constant
//! model, and on-disk binary format.
//!
//! The main pieces:
//!
//! - [`types::Type`] — structural types with union/intersection/negation and
//!   recursive nominal types, plus the subtype/intersection algebra the
//!   verifier's type-test narrowing depends on.
//! - [`constant::Constant`] — first-class literal values.
//! - [`codes::Code`] — the bytecode instruction set, one enum variant per
//!   opcode, with register and label rewriting.
//! - [`block::Block`] — an ordered bytecode sequence with slot accounting,
//!   register shifting and label freshening.
//! - [`module::WyilFile`] — a compilation unit of declarations, validated on
//!   construction.
//! - [`io`] — the pooled binary reader/writer pair.

pub mod block;
pub mod codes;
pub mod constant;
pub mod error;
pub mod io;
pub mod module;
pub mod name;
pub mod types;

pub use block::{Attribute, Block, Entry, LabelAllocator};
pub use codes::{Code, Comparator, Label, Reg};
pub use constant::Constant;
pub use error::{BlockError, DecodeError, EncodeError, ModuleError, TypeError};
pub use module::{Case, ConstantDecl, Declaration, FunctionOrMethodDecl, TypeDecl, WyilFile};
pub use name::{PathId, QualifiedName};
pub use types::Type;
