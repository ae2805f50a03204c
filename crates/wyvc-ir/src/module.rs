//! In-memory representation of a compiled module.
//!
//! A [`WyilFile`] is a compilation unit in which name resolution and type
//! checking are already complete: a flat list of constant, type, and
//! function/method declarations over the register bytecode of [`crate::block`].
//! Construction validates the module-level uniqueness invariants.

use crate::block::Block;
use crate::constant::Constant;
use crate::error::ModuleError;
use crate::name::PathId;
use crate::types::{equivalent, Type};

/// A compiled module: its identifier, originating filename, and declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct WyilFile {
    id: PathId,
    filename: String,
    declarations: Vec<Declaration>,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Constant(ConstantDecl),
    Type(TypeDecl),
    FunctionOrMethod(FunctionOrMethodDecl),
}

/// `constant NAME is VALUE`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDecl {
    pub name: String,
    pub constant: Constant,
}

/// `type NAME is TYPE where CONSTRAINT`
///
/// The constraint, when present, is a check block over one input slot
/// holding the candidate value; it falls through on success and reaches a
/// `fail` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub ty: Type,
    pub constraint: Option<Block>,
}

/// A function or method with one or more cases.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOrMethodDecl {
    pub name: String,
    /// A `Type::Function` or `Type::Method`.
    pub ty: Type,
    pub cases: Vec<Case>,
}

impl FunctionOrMethodDecl {
    pub fn is_function(&self) -> bool {
        matches!(self.ty, Type::Function { .. })
    }

    pub fn is_method(&self) -> bool {
        matches!(self.ty, Type::Method { .. })
    }

    /// Parameter types from the declared signature.
    pub fn params(&self) -> &[Type] {
        self.ty.signature().map(|(p, _)| p).unwrap_or(&[])
    }

    /// Return type from the declared signature.
    pub fn ret(&self) -> Option<&Type> {
        self.ty.signature().map(|(_, r)| r)
    }
}

/// One case of a function or method: its body plus optional pre/postcondition
/// check blocks. The precondition block's inputs are the parameters; the
/// postcondition block's inputs are the return value followed by the
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub precondition: Option<Block>,
    pub postcondition: Option<Block>,
    pub body: Block,
}

impl WyilFile {
    /// Build a module, validating that no two functions/methods share a name
    /// *and* signature, and that type and constant names are unique.
    pub fn new(
        id: PathId,
        filename: impl Into<String>,
        declarations: Vec<Declaration>,
    ) -> Result<Self, ModuleError> {
        let mut types: Vec<&str> = Vec::new();
        let mut constants: Vec<&str> = Vec::new();
        let mut methods: Vec<(&str, &Type)> = Vec::new();

        for d in &declarations {
            match d {
                Declaration::Type(t) => {
                    if types.contains(&t.name.as_str()) {
                        return Err(ModuleError::DuplicateDeclaration {
                            kind: "type",
                            name: t.name.clone(),
                        });
                    }
                    types.push(&t.name);
                }
                Declaration::Constant(c) => {
                    if constants.contains(&c.name.as_str()) {
                        return Err(ModuleError::DuplicateDeclaration {
                            kind: "constant",
                            name: c.name.clone(),
                        });
                    }
                    constants.push(&c.name);
                }
                Declaration::FunctionOrMethod(m) => {
                    if methods
                        .iter()
                        .any(|(n, t)| *n == m.name && equivalent(t, &m.ty))
                    {
                        return Err(ModuleError::DuplicateDeclaration {
                            kind: "function or method",
                            name: m.name.clone(),
                        });
                    }
                    methods.push((&m.name, &m.ty));
                }
            }
        }

        Ok(WyilFile {
            id,
            filename: filename.into(),
            declarations,
        })
    }

    pub fn id(&self) -> &PathId {
        &self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Whether any declaration carries the given name.
    pub fn has_name(&self, name: &str) -> bool {
        self.declarations.iter().any(|d| match d {
            Declaration::Constant(c) => c.name == name,
            Declaration::Type(t) => t.name == name,
            Declaration::FunctionOrMethod(m) => m.name == name,
        })
    }

    /// The type declaration with the given name, if any.
    pub fn type_decl(&self, name: &str) -> Option<&TypeDecl> {
        self.declarations.iter().find_map(|d| match d {
            Declaration::Type(t) if t.name == name => Some(t),
            _ => None,
        })
    }

    /// The constant declaration with the given name, if any.
    pub fn constant_decl(&self, name: &str) -> Option<&ConstantDecl> {
        self.declarations.iter().find_map(|d| match d {
            Declaration::Constant(c) if c.name == name => Some(c),
            _ => None,
        })
    }

    /// Every function or method declaration with the given name.
    pub fn functions_or_methods(&self, name: &str) -> Vec<&FunctionOrMethodDecl> {
        self.declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::FunctionOrMethod(m) if m.name == name => Some(m),
                _ => None,
            })
            .collect()
    }

    /// The function or method with the given name and (equivalent) type.
    pub fn function_or_method(&self, name: &str, ty: &Type) -> Option<&FunctionOrMethodDecl> {
        self.declarations.iter().find_map(|d| match d {
            Declaration::FunctionOrMethod(m) if m.name == name && equivalent(&m.ty, ty) => {
                Some(m)
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::Code;

    fn ret_block() -> Block {
        let mut b = Block::new();
        b.push(Code::Return { operand: Some((Type::Int, 0)) });
        b
    }

    fn id_fn(name: &str) -> Declaration {
        Declaration::FunctionOrMethod(FunctionOrMethodDecl {
            name: name.to_string(),
            ty: Type::function(vec![Type::Int], Type::Int, Type::Void),
            cases: vec![Case { precondition: None, postcondition: None, body: ret_block() }],
        })
    }

    #[test]
    fn construction_and_lookup() {
        let file = WyilFile::new(
            PathId::from_segments(["main"]),
            "main.whiley",
            vec![
                Declaration::Constant(ConstantDecl {
                    name: "PI".to_string(),
                    constant: Constant::rational(22, 7),
                }),
                Declaration::Type(TypeDecl {
                    name: "nat".to_string(),
                    ty: Type::Int,
                    constraint: None,
                }),
                id_fn("f"),
            ],
        )
        .unwrap();

        assert!(file.has_name("PI"));
        assert!(file.has_name("nat"));
        assert!(file.has_name("f"));
        assert!(!file.has_name("g"));
        assert_eq!(file.type_decl("nat").unwrap().ty, Type::Int);
        assert_eq!(
            file.constant_decl("PI").unwrap().constant,
            Constant::rational(22, 7)
        );
        assert_eq!(file.functions_or_methods("f").len(), 1);
    }

    #[test]
    fn duplicate_type_rejected() {
        let dup = Declaration::Type(TypeDecl {
            name: "t".to_string(),
            ty: Type::Int,
            constraint: None,
        });
        let err = WyilFile::new(
            PathId::from_segments(["m"]),
            "m.whiley",
            vec![dup.clone(), dup],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModuleError::DuplicateDeclaration { kind: "type", name: "t".to_string() }
        );
    }

    #[test]
    fn duplicate_constant_rejected() {
        let dup = Declaration::Constant(ConstantDecl {
            name: "c".to_string(),
            constant: Constant::integer(1),
        });
        assert!(WyilFile::new(
            PathId::from_segments(["m"]),
            "m.whiley",
            vec![dup.clone(), dup]
        )
        .is_err());
    }

    #[test]
    fn same_name_different_signature_permitted() {
        let f1 = id_fn("f");
        let f2 = Declaration::FunctionOrMethod(FunctionOrMethodDecl {
            name: "f".to_string(),
            ty: Type::function(vec![Type::Bool], Type::Int, Type::Void),
            cases: vec![Case { precondition: None, postcondition: None, body: ret_block() }],
        });
        assert!(WyilFile::new(PathId::from_segments(["m"]), "m.whiley", vec![f1, f2]).is_ok());
    }

    #[test]
    fn same_name_same_signature_rejected() {
        let err =
            WyilFile::new(PathId::from_segments(["m"]), "m.whiley", vec![id_fn("f"), id_fn("f")])
                .unwrap_err();
        assert!(matches!(err, ModuleError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn function_decl_accessors() {
        let decl = FunctionOrMethodDecl {
            name: "f".to_string(),
            ty: Type::function(vec![Type::Int, Type::Bool], Type::Real, Type::Void),
            cases: vec![],
        };
        assert!(decl.is_function());
        assert!(!decl.is_method());
        assert_eq!(decl.params(), &[Type::Int, Type::Bool]);
        assert_eq!(decl.ret(), Some(&Type::Real));
    }
}
