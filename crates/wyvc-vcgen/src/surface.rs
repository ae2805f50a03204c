//! Consumed interfaces to the surrounding compiler.
//!
//! The global generator receives type definitions still in *surface* form
//! (unresolved trees produced by the parser), a resolver that maps nominal
//! names to qualified names and elaborated types, a loader for already
//! compiled modules, and the set of source units currently being compiled.

use std::collections::BTreeMap;

use wyvc_ir::block::Block;
use wyvc_ir::module::WyilFile;
use wyvc_ir::name::{PathId, QualifiedName};
use wyvc_ir::types::Type;

use crate::error::VcError;

/// An unresolved surface type tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceType {
    Void,
    Any,
    Null,
    Bool,
    Byte,
    Char,
    Int,
    Real,
    Str,
    List(Box<SurfaceType>),
    Set(Box<SurfaceType>),
    Map(Box<SurfaceType>, Box<SurfaceType>),
    Tuple(Vec<SurfaceType>),
    Record(BTreeMap<String, SurfaceType>),
    Union(Vec<SurfaceType>),
    Intersection(Vec<SurfaceType>),
    Negation(Box<SurfaceType>),
    Reference(Box<SurfaceType>),
    /// A dotted name as written in the source, to be resolved.
    Nominal(Vec<String>),
}

impl SurfaceType {
    pub fn list(element: SurfaceType) -> Self {
        SurfaceType::List(Box::new(element))
    }

    pub fn set(element: SurfaceType) -> Self {
        SurfaceType::Set(Box::new(element))
    }

    pub fn nominal(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        SurfaceType::Nominal(names.into_iter().map(Into::into).collect())
    }
}

/// Resolves surface names and types against the compilation context.
pub trait NameResolver {
    /// Resolve a dotted source name to its canonical qualified name.
    fn resolve_name(&self, names: &[String]) -> Result<QualifiedName, VcError>;

    /// Elaborate a surface type into its structural [`Type`].
    fn resolve_type(&self, ty: &SurfaceType) -> Result<Type, VcError>;
}

/// Supplies previously compiled modules for names outside the source set.
pub trait ModuleLoader {
    fn load_module(&self, module: &PathId) -> Result<WyilFile, VcError>;
}

/// A type definition from a source unit under compilation.
///
/// The `constraint` is the lowered `where` clause, if any: a check block
/// over one input slot holding the candidate value, falling through on
/// success and reaching a `fail` otherwise.
#[derive(Debug, Clone)]
pub struct SourceTypeDef {
    pub name: String,
    pub surface: SurfaceType,
    pub constraint: Option<Block>,
}

/// The set of source units currently being compiled.
pub trait SourceUnits {
    fn type_def(&self, name: &QualifiedName) -> Option<&SourceTypeDef>;
}
