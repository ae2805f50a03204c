//! The module reader.
//!
//! Reads the pooled binary format back into a [`WyilFile`]. Labels are
//! materialized lazily: branch operands are forward offsets, and the first
//! reference to (or definition at) a given index mints that index's label,
//! so distinct branches to one offset share a single fresh label. After a
//! block is decoded, every recorded branch target must land on a
//! label-defining entry and the block must pass structural validation.

use std::collections::HashMap;

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::block::{Attribute, Block, Entry};
use crate::codes::{
    BinaryArithKind, BinListKind, BinSetKind, BinStringKind, Code, Comparator, Label,
    UnaryArithKind, UpdateKey,
};
use crate::constant::Constant;
use crate::error::DecodeError;
use crate::module::{
    Case, ConstantDecl, Declaration, FunctionOrMethodDecl, TypeDecl, WyilFile,
};
use crate::name::{PathId, QualifiedName};
use crate::types::Type;

use super::binary::ByteReader;
use super::*;

/// Decode a module from bytes.
pub fn read_module(bytes: &[u8]) -> Result<WyilFile, DecodeError> {
    WyilFileReader::new(bytes).read()
}

/// Streaming reader with the decoded pools.
pub struct WyilFileReader<'a> {
    input: ByteReader<'a>,
    strings: Vec<String>,
    paths: Vec<PathId>,
    names: Vec<QualifiedName>,
    constants: Vec<Constant>,
    types: Vec<Type>,
}

/// Mints fresh labels for branch-target indices, one per index.
#[derive(Default)]
struct LabelNames {
    by_index: HashMap<usize, Label>,
    next: u64,
}

impl LabelNames {
    fn at(&mut self, index: usize) -> Label {
        if let Some(label) = self.by_index.get(&index) {
            return label.clone();
        }
        let label = format!("label{}", self.next);
        self.next += 1;
        self.by_index.insert(index, label.clone());
        label
    }
}

impl<'a> WyilFileReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        WyilFileReader {
            input: ByteReader::new(bytes),
            strings: Vec::new(),
            paths: Vec::new(),
            names: Vec::new(),
            constants: Vec::new(),
            types: Vec::new(),
        }
    }

    pub fn read(mut self) -> Result<WyilFile, DecodeError> {
        for expected in MAGIC {
            if self.input.read_u1()? != expected {
                return Err(DecodeError::BadMagic);
            }
        }
        let major = self.input.read_uv()?;
        let minor = self.input.read_uv()?;
        if major > MAJOR_VERSION {
            return Err(DecodeError::UnsupportedVersion { major, minor });
        }
        tracing::debug!(major, minor, "reading module");

        let string_pool_size = self.input.read_uv()?;
        let path_pool_size = self.input.read_uv()?;
        let name_pool_size = self.input.read_uv()?;
        let constant_pool_size = self.input.read_uv()?;
        let type_pool_size = self.input.read_uv()?;
        let num_blocks = self.input.read_uv()?;

        self.read_string_pool(string_pool_size)?;
        self.read_path_pool(path_pool_size)?;
        self.read_name_pool(name_pool_size)?;
        self.read_constant_pool(constant_pool_size)?;
        self.read_type_pool(type_pool_size)?;

        let module_ref = self.input.read_uv()?;
        let id = if module_ref == 0 {
            PathId::root()
        } else {
            self.path(module_ref - 1)?.clone()
        };
        let filename_idx = self.input.read_uv()?;
        let filename = self.string(filename_idx)?.to_string();

        let mut declarations = Vec::new();
        for _ in 0..num_blocks {
            declarations.push(self.read_declaration()?);
        }
        Ok(WyilFile::new(id, filename, declarations)?)
    }

    // === Pools ===

    fn read_string_pool(&mut self, size: u64) -> Result<(), DecodeError> {
        for _ in 0..size {
            let length = self.input.read_uv()?;
            let bytes = self.input.read_bytes(length as usize)?;
            let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidString)?;
            self.strings.push(s.to_string());
        }
        Ok(())
    }

    fn read_path_pool(&mut self, size: u64) -> Result<(), DecodeError> {
        for _ in 0..size {
            let parent = self.input.read_uv()?;
            let string_index = self.input.read_uv()?;
            let base = if parent == 0 {
                PathId::root()
            } else {
                self.path(parent - 1)?.clone()
            };
            let segment = self.string(string_index)?.clone();
            self.paths.push(base.append(segment));
        }
        Ok(())
    }

    fn read_name_pool(&mut self, size: u64) -> Result<(), DecodeError> {
        for _ in 0..size {
            let path_index = self.input.read_uv()?;
            let name_index = self.input.read_uv()?;
            let module = self.path(path_index)?.clone();
            let name = self.string(name_index)?.clone();
            self.names.push(QualifiedName::new(module, name));
        }
        Ok(())
    }

    fn read_constant_pool(&mut self, size: u64) -> Result<(), DecodeError> {
        for _ in 0..size {
            let constant = self.read_constant()?;
            self.constants.push(constant);
        }
        Ok(())
    }

    fn read_type_pool(&mut self, size: u64) -> Result<(), DecodeError> {
        for _ in 0..size {
            let ty = self.read_type()?;
            self.types.push(ty);
        }
        Ok(())
    }

    fn string(&self, index: u64) -> Result<&String, DecodeError> {
        self.strings
            .get(index as usize)
            .ok_or(DecodeError::PoolIndexOutOfRange { pool: "string", index })
    }

    fn path(&self, index: u64) -> Result<&PathId, DecodeError> {
        self.paths
            .get(index as usize)
            .ok_or(DecodeError::PoolIndexOutOfRange { pool: "path", index })
    }

    fn name(&self, index: u64) -> Result<&QualifiedName, DecodeError> {
        self.names
            .get(index as usize)
            .ok_or(DecodeError::PoolIndexOutOfRange { pool: "name", index })
    }

    fn constant(&self, index: u64) -> Result<&Constant, DecodeError> {
        self.constants
            .get(index as usize)
            .ok_or(DecodeError::PoolIndexOutOfRange { pool: "constant", index })
    }

    fn ty(&self, index: u64) -> Result<&Type, DecodeError> {
        self.types
            .get(index as usize)
            .ok_or(DecodeError::PoolIndexOutOfRange { pool: "type", index })
    }

    // === Declarations ===

    fn read_declaration(&mut self) -> Result<Declaration, DecodeError> {
        let kind = self.input.read_uv()?;
        match kind {
            BLOCK_CONSTANT => {
                let name_idx = self.input.read_uv()?;
                let name = self.string(name_idx)?.clone();
                let constant_idx = self.input.read_uv()?;
                let constant = self.constant(constant_idx)?.clone();
                self.input.read_uv()?; // nested block count, always zero
                Ok(Declaration::Constant(ConstantDecl { name, constant }))
            }
            BLOCK_TYPE => {
                let name_idx = self.input.read_uv()?;
                let name = self.string(name_idx)?.clone();
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                let n_blocks = self.input.read_uv()?;
                let constraint = if n_blocks == 0 {
                    None
                } else {
                    Some(self.read_code_block()?)
                };
                Ok(Declaration::Type(TypeDecl { name, ty, constraint }))
            }
            BLOCK_FUNCTION | BLOCK_METHOD => {
                let name_idx = self.input.read_uv()?;
                let name = self.string(name_idx)?.clone();
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                let expects_method = kind == BLOCK_METHOD;
                match (&ty, expects_method) {
                    (Type::Function { .. }, false) | (Type::Method { .. }, true) => {}
                    _ => {
                        return Err(DecodeError::TypeMismatch {
                            opcode: "function or method block",
                            expected: if expects_method { "method" } else { "function" },
                        })
                    }
                }
                let num_cases = self.input.read_uv()?;
                let mut cases = Vec::new();
                for _ in 0..num_cases {
                    cases.push(self.read_case()?);
                }
                Ok(Declaration::FunctionOrMethod(FunctionOrMethodDecl { name, ty, cases }))
            }
            other => Err(DecodeError::UnknownTag {
                what: "module block",
                tag: other as u8,
            }),
        }
    }

    fn read_case(&mut self) -> Result<Case, DecodeError> {
        let mut precondition = None;
        let mut postcondition = None;
        let mut body = None;
        let n_blocks = self.input.read_uv()?;
        for _ in 0..n_blocks {
            let kind = self.input.read_uv()?;
            match kind {
                BLOCK_PRECONDITION => precondition = Some(self.read_code_block()?),
                BLOCK_POSTCONDITION => postcondition = Some(self.read_code_block()?),
                BLOCK_BODY => body = Some(self.read_code_block()?),
                other => {
                    return Err(DecodeError::UnknownTag {
                        what: "case block",
                        tag: other as u8,
                    })
                }
            }
        }
        Ok(Case {
            precondition,
            postcondition,
            body: body.unwrap_or_default(),
        })
    }

    // === Code blocks ===

    fn read_code_block(&mut self) -> Result<Block, DecodeError> {
        let n_codes = self.input.read_uv()? as usize;
        let mut labels = LabelNames::default();
        let mut branch_targets: Vec<(usize, usize)> = Vec::new();
        let mut entries = Vec::with_capacity(n_codes);
        for i in 0..n_codes {
            let code = self.read_code(i, &mut labels, &mut branch_targets)?;
            let n_attributes = self.input.read_uv()?;
            let mut attributes = Vec::with_capacity(n_attributes as usize);
            for _ in 0..n_attributes {
                let name_idx = self.input.read_uv()?;
                let name = self.string(name_idx)?.clone();
                let length = self.input.read_uv()?;
                let payload = self.input.read_bytes(length as usize)?.to_vec();
                attributes.push(Attribute { name, payload });
            }
            entries.push(Entry::with_attributes(code, attributes));
        }
        // Every branch must land on an entry that defines a label.
        for (from, target) in branch_targets {
            let defines = entries
                .get(target)
                .map(|e: &Entry| e.code.defined_label().is_some())
                .unwrap_or(false);
            if !defines {
                return Err(DecodeError::BadBranchTarget { from, target });
            }
        }
        let block = Block::from_entries(entries);
        block.validate()?;
        Ok(block)
    }

    fn read_code(
        &mut self,
        at: usize,
        labels: &mut LabelNames,
        branch_targets: &mut Vec<(usize, usize)>,
    ) -> Result<Code, DecodeError> {
        fn target_label(
            at: usize,
            offset: u8,
            labels: &mut LabelNames,
            branch_targets: &mut Vec<(usize, usize)>,
        ) -> Label {
            let target = at + offset as usize;
            branch_targets.push((at, target));
            labels.at(target)
        }

        let opcode = self.input.read_u1()?;
        match opcode {
            OPCODE_NOP => Ok(Code::Nop),
            OPCODE_GOTO => {
                let offset = self.input.read_u1()?;
                Ok(Code::Goto { target: target_label(at, offset, labels, branch_targets) })
            }
            OPCODE_FAIL => {
                let message_idx = self.input.read_uv()?;
                Ok(Code::Fail { message: self.string(message_idx)?.clone() })
            }
            OPCODE_ASSERT => {
                let offset = self.input.read_u1()?;
                Ok(Code::Assert { target: target_label(at, offset, labels, branch_targets) })
            }
            OPCODE_ASSUME => {
                let offset = self.input.read_u1()?;
                Ok(Code::Assume { target: target_label(at, offset, labels, branch_targets) })
            }
            OPCODE_TRYCATCH => {
                let offset = self.input.read_u1()?;
                let target = target_label(at, offset, labels, branch_targets);
                let n_catches = self.input.read_uv()?;
                let mut catches = Vec::new();
                for _ in 0..n_catches {
                    let type_idx = self.input.read_uv()?;
                    let ty = self.ty(type_idx)?.clone();
                    let handler_offset = self.input.read_u1()?;
                    catches.push((ty, target_label(at, handler_offset, labels, branch_targets)));
                }
                Ok(Code::TryCatch { target, catches })
            }
            OPCODE_LOOP => {
                let offset = self.input.read_u1()?;
                let target = target_label(at, offset, labels, branch_targets);
                let modified = self.read_registers()?;
                Ok(Code::Loop { target, modified })
            }
            OPCODE_FORALL => {
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                require_collection(&ty, "forall")?;
                let source = self.input.read_u1()? as usize;
                let index = self.input.read_u1()? as usize;
                let offset = self.input.read_u1()?;
                let target = target_label(at, offset, labels, branch_targets);
                let modified = self.read_registers()?;
                Ok(Code::ForAll { ty, source, index, target, modified })
            }
            OPCODE_LOOPEND => Ok(Code::LoopEnd { label: labels.at(at) }),
            OPCODE_LABEL => Ok(Code::Label { label: labels.at(at) }),
            OPCODE_RETURN => {
                let operand = self.input.read_u1()? as usize;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                Ok(Code::Return { operand: Some((ty, operand)) })
            }
            OPCODE_RETURNV => Ok(Code::Return { operand: None }),
            OPCODE_THROW => {
                let operand = self.input.read_u1()? as usize;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                Ok(Code::Throw { ty, operand })
            }
            OPCODE_DEBUG => {
                let operand = self.input.read_u1()? as usize;
                Ok(Code::Debug { operand })
            }
            OPCODE_CONST => {
                let target = self.input.read_u1()? as usize;
                let constant_idx = self.input.read_uv()?;
                let constant = self.constant(constant_idx)?.clone();
                Ok(Code::Const { target, constant })
            }
            OPCODE_IF => {
                let left = self.input.read_u1()? as usize;
                let right = self.input.read_u1()? as usize;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                let cmp = read_comparator(self.input.read_u1()?)?;
                let offset = self.input.read_u1()?;
                Ok(Code::If { ty, left, right, cmp, target: target_label(at, offset, labels, branch_targets) })
            }
            OPCODE_IFIS => {
                let operand = self.input.read_u1()? as usize;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                let test_idx = self.input.read_uv()?;
                let test = self.ty(test_idx)?.clone();
                let offset = self.input.read_u1()?;
                Ok(Code::IfIs { ty, operand, test, target: target_label(at, offset, labels, branch_targets) })
            }
            OPCODE_SWITCH => {
                let operand = self.input.read_u1()? as usize;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                let default_offset = self.input.read_u1()?;
                let default = target_label(at, default_offset, labels, branch_targets);
                let n_cases = self.input.read_uv()?;
                let mut branches = Vec::new();
                for _ in 0..n_cases {
                    let constant_idx = self.input.read_uv()?;
                    let constant = self.constant(constant_idx)?.clone();
                    let case_offset = self.input.read_u1()?;
                    branches.push((constant, target_label(at, case_offset, labels, branch_targets)));
                }
                Ok(Code::Switch { ty, operand, default, branches })
            }
            OPCODE_ASSIGN => {
                let (target, operand, ty) = self.read_unary_assign()?;
                Ok(Code::Assign { ty, target, operand })
            }
            OPCODE_CONVERT => {
                let (target, operand, ty) = self.read_unary_assign()?;
                let to_idx = self.input.read_uv()?;
                let to = self.ty(to_idx)?.clone();
                Ok(Code::Convert { ty, target, operand, to })
            }
            OPCODE_DEREFERENCE => {
                let (target, operand, ty) = self.read_unary_assign()?;
                if !matches!(ty, Type::Reference(_)) {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "dereference",
                        expected: "reference",
                    });
                }
                Ok(Code::Dereference { ty, target, operand })
            }
            OPCODE_FIELDLOAD => {
                let (target, operand, ty) = self.read_unary_assign()?;
                if !matches!(ty, Type::Record { .. }) {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "fieldload",
                        expected: "record",
                    });
                }
                let field_idx = self.input.read_uv()?;
                let field = self.string(field_idx)?.clone();
                Ok(Code::FieldLoad { ty, target, operand, field })
            }
            OPCODE_INVERT => {
                let (target, operand, ty) = self.read_unary_assign()?;
                Ok(Code::Invert { ty, target, operand })
            }
            OPCODE_LENGTHOF => {
                let (target, operand, ty) = self.read_unary_assign()?;
                require_collection(&ty, "lengthof")?;
                Ok(Code::LengthOf { ty, target, operand })
            }
            OPCODE_MOVE => {
                let (target, operand, ty) = self.read_unary_assign()?;
                Ok(Code::Move { ty, target, operand })
            }
            OPCODE_NEWOBJECT => {
                let (target, operand, ty) = self.read_unary_assign()?;
                if !matches!(ty, Type::Reference(_)) {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "newobject",
                        expected: "reference",
                    });
                }
                Ok(Code::NewObject { ty, target, operand })
            }
            OPCODE_NOT => {
                let target = self.input.read_u1()? as usize;
                let operand = self.input.read_u1()? as usize;
                Ok(Code::Not { target, operand })
            }
            OPCODE_TUPLELOAD => {
                let (target, operand, ty) = self.read_unary_assign()?;
                if !matches!(ty, Type::Tuple(_)) {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "tupleload",
                        expected: "tuple",
                    });
                }
                let index = self.input.read_uv()? as usize;
                Ok(Code::TupleLoad { ty, target, operand, index })
            }
            OPCODE_NEG | OPCODE_NUMERATOR | OPCODE_DENOMINATOR => {
                let (target, operand, ty) = self.read_unary_assign()?;
                let kind = match opcode {
                    OPCODE_NEG => UnaryArithKind::Neg,
                    OPCODE_NUMERATOR => UnaryArithKind::Numerator,
                    _ => UnaryArithKind::Denominator,
                };
                Ok(Code::UnaryArith { ty, target, operand, kind })
            }
            OPCODE_ADD..=OPCODE_SHR => {
                let (target, left, right, ty) = self.read_binary_assign()?;
                let kind = match opcode {
                    OPCODE_ADD => BinaryArithKind::Add,
                    OPCODE_SUB => BinaryArithKind::Sub,
                    OPCODE_MUL => BinaryArithKind::Mul,
                    OPCODE_DIV => BinaryArithKind::Div,
                    OPCODE_REM => BinaryArithKind::Rem,
                    OPCODE_RANGE => BinaryArithKind::Range,
                    OPCODE_BITOR => BinaryArithKind::BitwiseOr,
                    OPCODE_BITXOR => BinaryArithKind::BitwiseXor,
                    OPCODE_BITAND => BinaryArithKind::BitwiseAnd,
                    OPCODE_SHL => BinaryArithKind::LeftShift,
                    _ => BinaryArithKind::RightShift,
                };
                Ok(Code::BinaryArith { ty, target, left, right, kind })
            }
            OPCODE_INDEXOF => {
                let (target, source, key, ty) = self.read_binary_assign()?;
                Ok(Code::IndexOf { ty, target, source, key })
            }
            OPCODE_LISTAPPEND..=OPCODE_LISTAPPENDR => {
                let (target, left, right, ty) = self.read_binary_assign()?;
                if !matches!(ty, Type::List(_)) {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "list append",
                        expected: "list",
                    });
                }
                let kind = match opcode {
                    OPCODE_LISTAPPEND => BinListKind::Append,
                    OPCODE_LISTAPPENDL => BinListKind::AppendLeft,
                    _ => BinListKind::AppendRight,
                };
                Ok(Code::ListOp { ty, target, left, right, kind })
            }
            OPCODE_SETUNION..=OPCODE_SETDIFFL => {
                let (target, left, right, ty) = self.read_binary_assign()?;
                if !matches!(ty, Type::Set(_)) {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "set operator",
                        expected: "set",
                    });
                }
                let kind = match opcode {
                    OPCODE_SETUNION => BinSetKind::Union,
                    OPCODE_SETUNIONL => BinSetKind::UnionLeft,
                    OPCODE_SETUNIONR => BinSetKind::UnionRight,
                    OPCODE_SETINTERSECT => BinSetKind::Intersect,
                    OPCODE_SETINTERSECTL => BinSetKind::IntersectLeft,
                    OPCODE_SETINTERSECTR => BinSetKind::IntersectRight,
                    OPCODE_SETDIFF => BinSetKind::Difference,
                    _ => BinSetKind::DifferenceLeft,
                };
                Ok(Code::SetOp { ty, target, left, right, kind })
            }
            OPCODE_STRAPPEND..=OPCODE_STRAPPENDR => {
                let target = self.input.read_u1()? as usize;
                let left = self.input.read_u1()? as usize;
                let right = self.input.read_u1()? as usize;
                let kind = match opcode {
                    OPCODE_STRAPPEND => BinStringKind::Append,
                    OPCODE_STRAPPENDL => BinStringKind::AppendLeft,
                    _ => BinStringKind::AppendRight,
                };
                Ok(Code::StringOp { target, left, right, kind })
            }
            OPCODE_INVOKE | OPCODE_INVOKEV => {
                let target = if opcode == OPCODE_INVOKE {
                    Some(self.input.read_u1()? as usize)
                } else {
                    None
                };
                let operands = self.read_registers()?;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                if !ty.is_function_or_method() {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "invoke",
                        expected: "function or method",
                    });
                }
                let name_idx = self.input.read_uv()?;
                let name = self.name(name_idx)?.clone();
                Ok(Code::Invoke { ty, target, operands, name })
            }
            OPCODE_INDIRECTINVOKE | OPCODE_INDIRECTINVOKEV => {
                let target = if opcode == OPCODE_INDIRECTINVOKE {
                    Some(self.input.read_u1()? as usize)
                } else {
                    None
                };
                let operand = self.input.read_u1()? as usize;
                let operands = self.read_registers()?;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                if !ty.is_function_or_method() {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "indirect invoke",
                        expected: "function or method",
                    });
                }
                Ok(Code::IndirectInvoke { ty, target, operand, operands })
            }
            OPCODE_NEWLIST | OPCODE_NEWSET | OPCODE_NEWMAP | OPCODE_NEWRECORD
            | OPCODE_NEWTUPLE => {
                let target = self.input.read_u1()? as usize;
                let operands = self.read_registers()?;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                match opcode {
                    OPCODE_NEWLIST => {
                        if !matches!(ty, Type::List(_)) {
                            return Err(DecodeError::TypeMismatch {
                                opcode: "newlist",
                                expected: "list",
                            });
                        }
                        Ok(Code::NewList { ty, target, operands })
                    }
                    OPCODE_NEWSET => {
                        if !matches!(ty, Type::Set(_)) {
                            return Err(DecodeError::TypeMismatch {
                                opcode: "newset",
                                expected: "set",
                            });
                        }
                        Ok(Code::NewSet { ty, target, operands })
                    }
                    OPCODE_NEWMAP => {
                        if !matches!(ty, Type::Map(_, _)) {
                            return Err(DecodeError::TypeMismatch {
                                opcode: "newmap",
                                expected: "map",
                            });
                        }
                        Ok(Code::NewMap { ty, target, operands })
                    }
                    OPCODE_NEWRECORD => {
                        if !matches!(ty, Type::Record { .. }) {
                            return Err(DecodeError::TypeMismatch {
                                opcode: "newrecord",
                                expected: "record",
                            });
                        }
                        Ok(Code::NewRecord { ty, target, operands })
                    }
                    _ => {
                        if !matches!(ty, Type::Tuple(_)) {
                            return Err(DecodeError::TypeMismatch {
                                opcode: "newtuple",
                                expected: "tuple",
                            });
                        }
                        Ok(Code::NewTuple { ty, target, operands })
                    }
                }
            }
            OPCODE_SUBLIST => {
                let target = self.input.read_u1()? as usize;
                let source = self.input.read_u1()? as usize;
                let from = self.input.read_u1()? as usize;
                let to = self.input.read_u1()? as usize;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                if !matches!(ty, Type::List(_)) {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "sublist",
                        expected: "list",
                    });
                }
                Ok(Code::SubList { ty, target, source, from, to })
            }
            OPCODE_SUBSTRING => {
                let target = self.input.read_u1()? as usize;
                let source = self.input.read_u1()? as usize;
                let from = self.input.read_u1()? as usize;
                let to = self.input.read_u1()? as usize;
                Ok(Code::SubString { target, source, from, to })
            }
            OPCODE_UPDATEINDEX => {
                let target = self.input.read_u1()? as usize;
                let key = self.input.read_u1()? as usize;
                let operand = self.input.read_u1()? as usize;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                let after_idx = self.input.read_uv()?;
                let after = self.ty(after_idx)?.clone();
                Ok(Code::Update { ty, target, key: UpdateKey::Index(key), operand, after })
            }
            OPCODE_UPDATEFIELD => {
                let target = self.input.read_u1()? as usize;
                let field_idx = self.input.read_uv()?;
                let field = self.string(field_idx)?.clone();
                let operand = self.input.read_u1()? as usize;
                let type_idx = self.input.read_uv()?;
                let ty = self.ty(type_idx)?.clone();
                if !matches!(ty, Type::Record { .. }) {
                    return Err(DecodeError::TypeMismatch {
                        opcode: "update",
                        expected: "record",
                    });
                }
                let after_idx = self.input.read_uv()?;
                let after = self.ty(after_idx)?.clone();
                Ok(Code::Update { ty, target, key: UpdateKey::Field(field), operand, after })
            }
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }

    fn read_unary_assign(&mut self) -> Result<(usize, usize, Type), DecodeError> {
        let target = self.input.read_u1()? as usize;
        let operand = self.input.read_u1()? as usize;
        let type_idx = self.input.read_uv()?;
        let ty = self.ty(type_idx)?.clone();
        Ok((target, operand, ty))
    }

    fn read_binary_assign(&mut self) -> Result<(usize, usize, usize, Type), DecodeError> {
        let target = self.input.read_u1()? as usize;
        let left = self.input.read_u1()? as usize;
        let right = self.input.read_u1()? as usize;
        let type_idx = self.input.read_uv()?;
        let ty = self.ty(type_idx)?.clone();
        Ok((target, left, right, ty))
    }

    fn read_registers(&mut self) -> Result<Vec<usize>, DecodeError> {
        let count = self.input.read_uv()?;
        let mut registers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            registers.push(self.input.read_u1()? as usize);
        }
        Ok(registers)
    }

    // === Constants ===

    fn read_constant(&mut self) -> Result<Constant, DecodeError> {
        let tag = self.input.read_u1()?;
        match tag {
            CONSTANT_NULL => Ok(Constant::Null),
            CONSTANT_FALSE => Ok(Constant::Bool(false)),
            CONSTANT_TRUE => Ok(Constant::Bool(true)),
            CONSTANT_BYTE => Ok(Constant::Byte(self.input.read_u1()?)),
            CONSTANT_CHAR => {
                let unit = self.input.read_u2()?;
                let c = char::from_u32(u32::from(unit))
                    .ok_or(DecodeError::InvalidChar(u32::from(unit)))?;
                Ok(Constant::Char(c))
            }
            CONSTANT_INT => Ok(Constant::Integer(self.read_bigint()?)),
            CONSTANT_REAL => {
                let numerator = self.read_bigint()?;
                let denominator = self.read_bigint()?;
                Ok(Constant::Rational(BigRational::new(numerator, denominator)))
            }
            CONSTANT_STRING => {
                let length = self.input.read_u2()?;
                let mut units = Vec::with_capacity(length as usize);
                for _ in 0..length {
                    units.push(self.input.read_u2()?);
                }
                let s = String::from_utf16(&units).map_err(|_| DecodeError::InvalidString)?;
                Ok(Constant::Str(s))
            }
            CONSTANT_LIST => {
                let length = self.input.read_u2()?;
                let mut values = Vec::with_capacity(length as usize);
                for _ in 0..length {
                    values.push(self.read_constant()?);
                }
                Ok(Constant::List(values))
            }
            CONSTANT_SET => {
                let length = self.input.read_u2()?;
                let mut values = std::collections::BTreeSet::new();
                for _ in 0..length {
                    values.insert(self.read_constant()?);
                }
                Ok(Constant::Set(values))
            }
            CONSTANT_TUPLE => {
                let length = self.input.read_u2()?;
                let mut values = Vec::with_capacity(length as usize);
                for _ in 0..length {
                    values.push(self.read_constant()?);
                }
                Ok(Constant::Tuple(values))
            }
            CONSTANT_RECORD => {
                let length = self.input.read_u2()?;
                let mut fields = std::collections::BTreeMap::new();
                for _ in 0..length {
                    let field_idx = self.input.read_u2()?;
                    let field = self.string(u64::from(field_idx))?.clone();
                    let value = self.read_constant()?;
                    fields.insert(field, value);
                }
                Ok(Constant::Record(fields))
            }
            other => Err(DecodeError::UnknownTag { what: "constant", tag: other }),
        }
    }

    fn read_bigint(&mut self) -> Result<BigInt, DecodeError> {
        let length = self.input.read_u2()?;
        let bytes = self.input.read_bytes(length as usize)?;
        Ok(BigInt::from_signed_bytes_be(bytes))
    }

    // === Types ===

    fn read_type(&mut self) -> Result<Type, DecodeError> {
        let tag = self.input.read_u1()?;
        match tag {
            TYPE_VOID => Ok(Type::Void),
            TYPE_ANY => Ok(Type::Any),
            TYPE_NULL => Ok(Type::Null),
            TYPE_BOOL => Ok(Type::Bool),
            TYPE_BYTE => Ok(Type::Byte),
            TYPE_CHAR => Ok(Type::Char),
            TYPE_INT => Ok(Type::Int),
            TYPE_REAL => Ok(Type::Real),
            TYPE_STRING => Ok(Type::Str),
            TYPE_LIST => Ok(Type::list(self.read_type()?)),
            TYPE_SET => Ok(Type::set(self.read_type()?)),
            TYPE_MAP => {
                let key = self.read_type()?;
                let value = self.read_type()?;
                Ok(Type::map(key, value))
            }
            TYPE_TUPLE => {
                let count = self.input.read_uv()?;
                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(self.read_type()?);
                }
                Ok(Type::Tuple(elements))
            }
            TYPE_RECORD => {
                let open = self.input.read_u1()? != 0;
                let count = self.input.read_uv()?;
                let mut fields = std::collections::BTreeMap::new();
                for _ in 0..count {
                    let field = self.read_inline_str()?;
                    let ty = self.read_type()?;
                    fields.insert(field, ty);
                }
                Ok(Type::Record { fields, open })
            }
            TYPE_REFERENCE => Ok(Type::reference(self.read_type()?)),
            TYPE_FUNCTION => {
                let count = self.input.read_uv()?;
                let mut params = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    params.push(self.read_type()?);
                }
                let ret = self.read_type()?;
                let throws = self.read_type()?;
                Ok(Type::function(params, ret, throws))
            }
            TYPE_METHOD => {
                let has_receiver = self.input.read_u1()? != 0;
                let receiver = if has_receiver {
                    Some(self.read_type()?)
                } else {
                    None
                };
                let count = self.input.read_uv()?;
                let mut params = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    params.push(self.read_type()?);
                }
                let ret = self.read_type()?;
                let throws = self.read_type()?;
                Ok(Type::method(receiver, params, ret, throws))
            }
            TYPE_UNION => {
                let count = self.input.read_uv()?;
                let mut members = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    members.push(self.read_type()?);
                }
                Ok(Type::Union(members))
            }
            TYPE_INTERSECTION => {
                let count = self.input.read_uv()?;
                let mut members = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    members.push(self.read_type()?);
                }
                Ok(Type::Intersection(members))
            }
            TYPE_NEGATION => Ok(Type::Negation(Box::new(self.read_type()?))),
            TYPE_NOMINAL => {
                let count = self.input.read_uv()?;
                let mut module = PathId::root();
                for _ in 0..count {
                    module = module.append(self.read_inline_str()?);
                }
                let name = self.read_inline_str()?;
                Ok(Type::Nominal(QualifiedName::new(module, name)))
            }
            TYPE_RECURSIVE => {
                let label = self.read_inline_str()?;
                let body = self.read_type()?;
                Ok(Type::recursive_named(label, body))
            }
            other => Err(DecodeError::UnknownTag { what: "type", tag: other }),
        }
    }

    fn read_inline_str(&mut self) -> Result<String, DecodeError> {
        let length = self.input.read_uv()?;
        let bytes = self.input.read_bytes(length as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidString)
    }
}

fn read_comparator(code: u8) -> Result<Comparator, DecodeError> {
    match code {
        0 => Ok(Comparator::Eq),
        1 => Ok(Comparator::Ne),
        2 => Ok(Comparator::Lt),
        3 => Ok(Comparator::Le),
        4 => Ok(Comparator::Gt),
        5 => Ok(Comparator::Ge),
        6 => Ok(Comparator::In),
        7 => Ok(Comparator::Subset),
        8 => Ok(Comparator::SubsetEq),
        other => Err(DecodeError::UnknownTag { what: "comparator", tag: other }),
    }
}

fn require_collection(ty: &Type, opcode: &'static str) -> Result<(), DecodeError> {
    match ty {
        Type::List(_) | Type::Set(_) | Type::Map(_, _) | Type::Str => Ok(()),
        _ => Err(DecodeError::TypeMismatch { opcode, expected: "collection" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_eof() {
        assert_eq!(read_module(&[]), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut bytes = b"NOTWYIL!".to_vec();
        bytes.extend([0u8; 16]);
        assert_eq!(read_module(&bytes), Err(DecodeError::BadMagic));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = b"WYILFILE".to_vec();
        bytes.push(9); // major 9
        bytes.push(0); // minor
        bytes.extend([0u8; 8]);
        assert_eq!(
            read_module(&bytes),
            Err(DecodeError::UnsupportedVersion { major: 9, minor: 0 })
        );
    }

    #[test]
    fn truncated_header_is_eof() {
        let bytes = b"WYILFILE".to_vec();
        assert_eq!(read_module(&bytes), Err(DecodeError::UnexpectedEof));
    }
}
