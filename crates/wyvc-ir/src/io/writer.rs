//! The module writer.
//!
//! Writing is two-phase over one pass: declarations are serialized into a
//! body buffer while the pools are interned on first use, then the header,
//! pools and body are assembled in file order. Pool indices are stable
//! because interning assigns them on first encounter.

use std::collections::HashMap;

use crate::block::Block;
use crate::codes::{
    BinaryArithKind, BinListKind, BinSetKind, BinStringKind, Code, Comparator, Label, Reg,
    UnaryArithKind, UpdateKey,
};
use crate::constant::Constant;
use crate::error::{BlockError, EncodeError};
use crate::module::{Declaration, FunctionOrMethodDecl, WyilFile};
use crate::name::{PathId, QualifiedName};
use crate::types::Type;

use super::binary::ByteWriter;
use super::*;

/// Serialize a module to bytes.
pub fn write_module(file: &WyilFile) -> Result<Vec<u8>, EncodeError> {
    WyilFileWriter::new().write(file)
}

/// Streaming writer with pool interning state.
#[derive(Default)]
pub struct WyilFileWriter {
    strings: Vec<String>,
    string_index: HashMap<String, u64>,
    /// Entries are `(parent_ref, segment_string_index)`; `parent_ref` of 0
    /// denotes the root, otherwise `paths[parent_ref - 1]`.
    paths: Vec<(u64, u64)>,
    path_index: HashMap<PathId, u64>,
    /// Entries are `(path_pool_index, name_string_index)`.
    names: Vec<(u64, u64)>,
    name_index: HashMap<QualifiedName, u64>,
    constants: Vec<Constant>,
    constant_index: HashMap<Constant, u64>,
    types: Vec<Type>,
    type_index: HashMap<Type, u64>,
}

impl WyilFileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(mut self, file: &WyilFile) -> Result<Vec<u8>, EncodeError> {
        tracing::debug!(module = %file.id(), declarations = file.declarations().len(),
            "writing module");

        let mut body = ByteWriter::new();
        let module_ref = self.path_ref(file.id());
        let filename_idx = self.intern_string(file.filename());
        body.write_uv(module_ref);
        body.write_uv(filename_idx);
        for declaration in file.declarations() {
            self.write_declaration(&mut body, declaration)?;
        }

        // Types are self-contained; constants may still intern strings for
        // record field names, so they are serialized before the string pool.
        let type_pool = self.serialize_type_pool();
        let constant_pool = self.serialize_constant_pool()?;

        let mut out = ByteWriter::new();
        out.write_bytes(&MAGIC);
        out.write_uv(MAJOR_VERSION);
        out.write_uv(MINOR_VERSION);
        out.write_uv(self.strings.len() as u64);
        out.write_uv(self.paths.len() as u64);
        out.write_uv(self.names.len() as u64);
        out.write_uv(self.constants.len() as u64);
        out.write_uv(self.types.len() as u64);
        out.write_uv(file.declarations().len() as u64);
        for s in &self.strings {
            out.write_uv(s.len() as u64);
            out.write_bytes(s.as_bytes());
        }
        for (parent, segment) in &self.paths {
            out.write_uv(*parent);
            out.write_uv(*segment);
        }
        for (path, name) in &self.names {
            out.write_uv(*path);
            out.write_uv(*name);
        }
        out.append(constant_pool);
        out.append(type_pool);
        out.append(body);
        Ok(out.into_bytes())
    }

    // === Pool interning ===

    fn intern_string(&mut self, s: &str) -> u64 {
        if let Some(&i) = self.string_index.get(s) {
            return i;
        }
        let i = self.strings.len() as u64;
        self.strings.push(s.to_string());
        self.string_index.insert(s.to_string(), i);
        i
    }

    /// Pool reference for a path: 0 for the root, otherwise index + 1.
    /// Ancestors are interned first so parent references point backwards.
    fn path_ref(&mut self, path: &PathId) -> u64 {
        if path.is_root() {
            return 0;
        }
        if let Some(&i) = self.path_index.get(path) {
            return i + 1;
        }
        let mut current = PathId::root();
        let mut current_ref = 0u64;
        for segment in path.segments() {
            current = current.append(segment.clone());
            current_ref = match self.path_index.get(&current) {
                Some(&i) => i + 1,
                None => {
                    let segment_idx = self.intern_string(segment);
                    let i = self.paths.len() as u64;
                    self.paths.push((current_ref, segment_idx));
                    self.path_index.insert(current.clone(), i);
                    i + 1
                }
            };
        }
        current_ref
    }

    fn intern_name(&mut self, name: &QualifiedName) -> Result<u64, EncodeError> {
        if let Some(&i) = self.name_index.get(name) {
            return Ok(i);
        }
        let path_ref = self.path_ref(name.module());
        if path_ref == 0 {
            return Err(EncodeError::RootModuleName);
        }
        let string_idx = self.intern_string(name.name());
        let i = self.names.len() as u64;
        self.names.push((path_ref - 1, string_idx));
        self.name_index.insert(name.clone(), i);
        Ok(i)
    }

    fn intern_constant(&mut self, constant: &Constant) -> u64 {
        if let Some(&i) = self.constant_index.get(constant) {
            return i;
        }
        let i = self.constants.len() as u64;
        self.constants.push(constant.clone());
        self.constant_index.insert(constant.clone(), i);
        i
    }

    fn intern_type(&mut self, ty: &Type) -> u64 {
        if let Some(&i) = self.type_index.get(ty) {
            return i;
        }
        let i = self.types.len() as u64;
        self.types.push(ty.clone());
        self.type_index.insert(ty.clone(), i);
        i
    }

    // === Declarations ===

    fn write_declaration(
        &mut self,
        w: &mut ByteWriter,
        declaration: &Declaration,
    ) -> Result<(), EncodeError> {
        match declaration {
            Declaration::Constant(c) => {
                w.write_uv(BLOCK_CONSTANT);
                let name = self.intern_string(&c.name);
                w.write_uv(name);
                let constant = self.intern_constant(&c.constant);
                w.write_uv(constant);
                w.write_uv(0); // no nested blocks
            }
            Declaration::Type(t) => {
                w.write_uv(BLOCK_TYPE);
                let name = self.intern_string(&t.name);
                w.write_uv(name);
                let ty = self.intern_type(&t.ty);
                w.write_uv(ty);
                match &t.constraint {
                    None => w.write_uv(0),
                    Some(block) => {
                        w.write_uv(1);
                        self.write_code_block(w, block)?;
                    }
                }
            }
            Declaration::FunctionOrMethod(m) => self.write_function_or_method(w, m)?,
        }
        Ok(())
    }

    fn write_function_or_method(
        &mut self,
        w: &mut ByteWriter,
        decl: &FunctionOrMethodDecl,
    ) -> Result<(), EncodeError> {
        w.write_uv(if decl.is_method() { BLOCK_METHOD } else { BLOCK_FUNCTION });
        let name = self.intern_string(&decl.name);
        w.write_uv(name);
        let ty = self.intern_type(&decl.ty);
        w.write_uv(ty);
        w.write_uv(decl.cases.len() as u64);
        for case in &decl.cases {
            let sub_blocks = 1
                + u64::from(case.precondition.is_some())
                + u64::from(case.postcondition.is_some());
            w.write_uv(sub_blocks);
            if let Some(pre) = &case.precondition {
                w.write_uv(BLOCK_PRECONDITION);
                self.write_code_block(w, pre)?;
            }
            if let Some(post) = &case.postcondition {
                w.write_uv(BLOCK_POSTCONDITION);
                self.write_code_block(w, post)?;
            }
            w.write_uv(BLOCK_BODY);
            self.write_code_block(w, &case.body)?;
        }
        Ok(())
    }

    // === Code blocks ===

    fn write_code_block(&mut self, w: &mut ByteWriter, block: &Block) -> Result<(), EncodeError> {
        block.validate()?;
        let mut label_index: HashMap<&Label, usize> = HashMap::new();
        for (i, entry) in block.iter().enumerate() {
            if let Some(label) = entry.code.defined_label() {
                label_index.insert(label, i);
            }
        }
        w.write_uv(block.size() as u64);
        for (i, entry) in block.iter().enumerate() {
            self.write_code(w, &entry.code, i, &label_index)?;
            w.write_uv(entry.attributes.len() as u64);
            for attribute in &entry.attributes {
                let name = self.intern_string(&attribute.name);
                w.write_uv(name);
                w.write_uv(attribute.payload.len() as u64);
                w.write_bytes(&attribute.payload);
            }
        }
        Ok(())
    }

    fn write_code(
        &mut self,
        w: &mut ByteWriter,
        code: &Code,
        at: usize,
        labels: &HashMap<&Label, usize>,
    ) -> Result<(), EncodeError> {
        match code {
            Code::Nop => w.write_u1(OPCODE_NOP),
            Code::Goto { target } => {
                w.write_u1(OPCODE_GOTO);
                w.write_u1(branch_offset(at, target, labels)?);
            }
            Code::Fail { message } => {
                w.write_u1(OPCODE_FAIL);
                let message = self.intern_string(message);
                w.write_uv(message);
            }
            Code::Assert { target } => {
                w.write_u1(OPCODE_ASSERT);
                w.write_u1(branch_offset(at, target, labels)?);
            }
            Code::Assume { target } => {
                w.write_u1(OPCODE_ASSUME);
                w.write_u1(branch_offset(at, target, labels)?);
            }
            Code::TryCatch { target, catches } => {
                w.write_u1(OPCODE_TRYCATCH);
                w.write_u1(branch_offset(at, target, labels)?);
                w.write_uv(catches.len() as u64);
                for (ty, handler) in catches {
                    let ty = self.intern_type(ty);
                    w.write_uv(ty);
                    w.write_u1(branch_offset(at, handler, labels)?);
                }
            }
            Code::Loop { target, modified } => {
                w.write_u1(OPCODE_LOOP);
                w.write_u1(branch_offset(at, target, labels)?);
                write_registers(w, modified)?;
            }
            Code::ForAll { ty, source, index, target, modified } => {
                w.write_u1(OPCODE_FORALL);
                let ty = self.intern_type(ty);
                w.write_uv(ty);
                w.write_u1(reg(*source)?);
                w.write_u1(reg(*index)?);
                w.write_u1(branch_offset(at, target, labels)?);
                write_registers(w, modified)?;
            }
            Code::LoopEnd { .. } => w.write_u1(OPCODE_LOOPEND),
            Code::Label { .. } => w.write_u1(OPCODE_LABEL),
            Code::Return { operand: Some((ty, operand)) } => {
                w.write_u1(OPCODE_RETURN);
                w.write_u1(reg(*operand)?);
                let ty = self.intern_type(ty);
                w.write_uv(ty);
            }
            Code::Return { operand: None } => w.write_u1(OPCODE_RETURNV),
            Code::Throw { ty, operand } => {
                w.write_u1(OPCODE_THROW);
                w.write_u1(reg(*operand)?);
                let ty = self.intern_type(ty);
                w.write_uv(ty);
            }
            Code::Debug { operand } => {
                w.write_u1(OPCODE_DEBUG);
                w.write_u1(reg(*operand)?);
            }
            Code::Const { target, constant } => {
                w.write_u1(OPCODE_CONST);
                w.write_u1(reg(*target)?);
                let constant = self.intern_constant(constant);
                w.write_uv(constant);
            }
            Code::If { ty, left, right, cmp, target } => {
                w.write_u1(OPCODE_IF);
                w.write_u1(reg(*left)?);
                w.write_u1(reg(*right)?);
                let ty = self.intern_type(ty);
                w.write_uv(ty);
                w.write_u1(comparator_code(*cmp));
                w.write_u1(branch_offset(at, target, labels)?);
            }
            Code::IfIs { ty, operand, test, target } => {
                w.write_u1(OPCODE_IFIS);
                w.write_u1(reg(*operand)?);
                let ty = self.intern_type(ty);
                w.write_uv(ty);
                let test = self.intern_type(test);
                w.write_uv(test);
                w.write_u1(branch_offset(at, target, labels)?);
            }
            Code::Switch { ty, operand, default, branches } => {
                w.write_u1(OPCODE_SWITCH);
                w.write_u1(reg(*operand)?);
                let ty = self.intern_type(ty);
                w.write_uv(ty);
                w.write_u1(branch_offset(at, default, labels)?);
                w.write_uv(branches.len() as u64);
                for (constant, label) in branches {
                    let constant = self.intern_constant(constant);
                    w.write_uv(constant);
                    w.write_u1(branch_offset(at, label, labels)?);
                }
            }
            Code::Assign { ty, target, operand } => {
                self.write_unary_assign(w, OPCODE_ASSIGN, ty, *target, *operand)?
            }
            Code::Convert { ty, target, operand, to } => {
                self.write_unary_assign(w, OPCODE_CONVERT, ty, *target, *operand)?;
                let to = self.intern_type(to);
                w.write_uv(to);
            }
            Code::Dereference { ty, target, operand } => {
                self.write_unary_assign(w, OPCODE_DEREFERENCE, ty, *target, *operand)?
            }
            Code::FieldLoad { ty, target, operand, field } => {
                self.write_unary_assign(w, OPCODE_FIELDLOAD, ty, *target, *operand)?;
                let field = self.intern_string(field);
                w.write_uv(field);
            }
            Code::Invert { ty, target, operand } => {
                self.write_unary_assign(w, OPCODE_INVERT, ty, *target, *operand)?
            }
            Code::LengthOf { ty, target, operand } => {
                self.write_unary_assign(w, OPCODE_LENGTHOF, ty, *target, *operand)?
            }
            Code::Move { ty, target, operand } => {
                self.write_unary_assign(w, OPCODE_MOVE, ty, *target, *operand)?
            }
            Code::NewObject { ty, target, operand } => {
                self.write_unary_assign(w, OPCODE_NEWOBJECT, ty, *target, *operand)?
            }
            Code::Not { target, operand } => {
                w.write_u1(OPCODE_NOT);
                w.write_u1(reg(*target)?);
                w.write_u1(reg(*operand)?);
            }
            Code::TupleLoad { ty, target, operand, index } => {
                self.write_unary_assign(w, OPCODE_TUPLELOAD, ty, *target, *operand)?;
                w.write_uv(*index as u64);
            }
            Code::UnaryArith { ty, target, operand, kind } => {
                let opcode = match kind {
                    UnaryArithKind::Neg => OPCODE_NEG,
                    UnaryArithKind::Numerator => OPCODE_NUMERATOR,
                    UnaryArithKind::Denominator => OPCODE_DENOMINATOR,
                };
                self.write_unary_assign(w, opcode, ty, *target, *operand)?
            }
            Code::BinaryArith { ty, target, left, right, kind } => {
                let opcode = match kind {
                    BinaryArithKind::Add => OPCODE_ADD,
                    BinaryArithKind::Sub => OPCODE_SUB,
                    BinaryArithKind::Mul => OPCODE_MUL,
                    BinaryArithKind::Div => OPCODE_DIV,
                    BinaryArithKind::Rem => OPCODE_REM,
                    BinaryArithKind::Range => OPCODE_RANGE,
                    BinaryArithKind::BitwiseOr => OPCODE_BITOR,
                    BinaryArithKind::BitwiseXor => OPCODE_BITXOR,
                    BinaryArithKind::BitwiseAnd => OPCODE_BITAND,
                    BinaryArithKind::LeftShift => OPCODE_SHL,
                    BinaryArithKind::RightShift => OPCODE_SHR,
                };
                self.write_binary_assign(w, opcode, ty, *target, *left, *right)?
            }
            Code::IndexOf { ty, target, source, key } => {
                self.write_binary_assign(w, OPCODE_INDEXOF, ty, *target, *source, *key)?
            }
            Code::ListOp { ty, target, left, right, kind } => {
                let opcode = match kind {
                    BinListKind::Append => OPCODE_LISTAPPEND,
                    BinListKind::AppendLeft => OPCODE_LISTAPPENDL,
                    BinListKind::AppendRight => OPCODE_LISTAPPENDR,
                };
                self.write_binary_assign(w, opcode, ty, *target, *left, *right)?
            }
            Code::SetOp { ty, target, left, right, kind } => {
                let opcode = match kind {
                    BinSetKind::Union => OPCODE_SETUNION,
                    BinSetKind::UnionLeft => OPCODE_SETUNIONL,
                    BinSetKind::UnionRight => OPCODE_SETUNIONR,
                    BinSetKind::Intersect => OPCODE_SETINTERSECT,
                    BinSetKind::IntersectLeft => OPCODE_SETINTERSECTL,
                    BinSetKind::IntersectRight => OPCODE_SETINTERSECTR,
                    BinSetKind::Difference => OPCODE_SETDIFF,
                    BinSetKind::DifferenceLeft => OPCODE_SETDIFFL,
                };
                self.write_binary_assign(w, opcode, ty, *target, *left, *right)?
            }
            Code::StringOp { target, left, right, kind } => {
                let opcode = match kind {
                    BinStringKind::Append => OPCODE_STRAPPEND,
                    BinStringKind::AppendLeft => OPCODE_STRAPPENDL,
                    BinStringKind::AppendRight => OPCODE_STRAPPENDR,
                };
                w.write_u1(opcode);
                w.write_u1(reg(*target)?);
                w.write_u1(reg(*left)?);
                w.write_u1(reg(*right)?);
            }
            Code::Invoke { ty, target, operands, name } => {
                match target {
                    Some(target) => {
                        w.write_u1(OPCODE_INVOKE);
                        w.write_u1(reg(*target)?);
                    }
                    None => w.write_u1(OPCODE_INVOKEV),
                }
                write_registers(w, operands)?;
                let ty = self.intern_type(ty);
                w.write_uv(ty);
                let name = self.intern_name(name)?;
                w.write_uv(name);
            }
            Code::IndirectInvoke { ty, target, operand, operands } => {
                match target {
                    Some(target) => {
                        w.write_u1(OPCODE_INDIRECTINVOKE);
                        w.write_u1(reg(*target)?);
                    }
                    None => w.write_u1(OPCODE_INDIRECTINVOKEV),
                }
                w.write_u1(reg(*operand)?);
                write_registers(w, operands)?;
                let ty = self.intern_type(ty);
                w.write_uv(ty);
            }
            Code::NewList { ty, target, operands } => {
                self.write_nary_assign(w, OPCODE_NEWLIST, ty, *target, operands)?
            }
            Code::NewSet { ty, target, operands } => {
                self.write_nary_assign(w, OPCODE_NEWSET, ty, *target, operands)?
            }
            Code::NewMap { ty, target, operands } => {
                self.write_nary_assign(w, OPCODE_NEWMAP, ty, *target, operands)?
            }
            Code::NewRecord { ty, target, operands } => {
                self.write_nary_assign(w, OPCODE_NEWRECORD, ty, *target, operands)?
            }
            Code::NewTuple { ty, target, operands } => {
                self.write_nary_assign(w, OPCODE_NEWTUPLE, ty, *target, operands)?
            }
            Code::SubList { ty, target, source, from, to } => {
                w.write_u1(OPCODE_SUBLIST);
                w.write_u1(reg(*target)?);
                w.write_u1(reg(*source)?);
                w.write_u1(reg(*from)?);
                w.write_u1(reg(*to)?);
                let ty = self.intern_type(ty);
                w.write_uv(ty);
            }
            Code::SubString { target, source, from, to } => {
                w.write_u1(OPCODE_SUBSTRING);
                w.write_u1(reg(*target)?);
                w.write_u1(reg(*source)?);
                w.write_u1(reg(*from)?);
                w.write_u1(reg(*to)?);
            }
            Code::Update { ty, target, key, operand, after } => {
                match key {
                    UpdateKey::Index(k) => {
                        w.write_u1(OPCODE_UPDATEINDEX);
                        w.write_u1(reg(*target)?);
                        w.write_u1(reg(*k)?);
                    }
                    UpdateKey::Field(field) => {
                        w.write_u1(OPCODE_UPDATEFIELD);
                        w.write_u1(reg(*target)?);
                        let field = self.intern_string(field);
                        w.write_uv(field);
                    }
                }
                w.write_u1(reg(*operand)?);
                let ty = self.intern_type(ty);
                w.write_uv(ty);
                let after = self.intern_type(after);
                w.write_uv(after);
            }
        }
        Ok(())
    }

    fn write_unary_assign(
        &mut self,
        w: &mut ByteWriter,
        opcode: u8,
        ty: &Type,
        target: Reg,
        operand: Reg,
    ) -> Result<(), EncodeError> {
        w.write_u1(opcode);
        w.write_u1(reg(target)?);
        w.write_u1(reg(operand)?);
        let ty = self.intern_type(ty);
        w.write_uv(ty);
        Ok(())
    }

    fn write_binary_assign(
        &mut self,
        w: &mut ByteWriter,
        opcode: u8,
        ty: &Type,
        target: Reg,
        left: Reg,
        right: Reg,
    ) -> Result<(), EncodeError> {
        w.write_u1(opcode);
        w.write_u1(reg(target)?);
        w.write_u1(reg(left)?);
        w.write_u1(reg(right)?);
        let ty = self.intern_type(ty);
        w.write_uv(ty);
        Ok(())
    }

    fn write_nary_assign(
        &mut self,
        w: &mut ByteWriter,
        opcode: u8,
        ty: &Type,
        target: Reg,
        operands: &[Reg],
    ) -> Result<(), EncodeError> {
        w.write_u1(opcode);
        w.write_u1(reg(target)?);
        write_registers(w, operands)?;
        let ty = self.intern_type(ty);
        w.write_uv(ty);
        Ok(())
    }

    // === Pool serialization ===

    fn serialize_type_pool(&mut self) -> ByteWriter {
        let mut w = ByteWriter::new();
        // intern_type never grows the pool during serialization; nested
        // types are encoded inline.
        let types = self.types.clone();
        for ty in &types {
            write_type(&mut w, ty);
        }
        w
    }

    fn serialize_constant_pool(&mut self) -> Result<ByteWriter, EncodeError> {
        let mut w = ByteWriter::new();
        let constants = self.constants.clone();
        for constant in &constants {
            self.write_constant(&mut w, constant)?;
        }
        Ok(w)
    }

    fn write_constant(
        &mut self,
        w: &mut ByteWriter,
        constant: &Constant,
    ) -> Result<(), EncodeError> {
        match constant {
            Constant::Null => w.write_u1(CONSTANT_NULL),
            Constant::Bool(false) => w.write_u1(CONSTANT_FALSE),
            Constant::Bool(true) => w.write_u1(CONSTANT_TRUE),
            Constant::Byte(b) => {
                w.write_u1(CONSTANT_BYTE);
                w.write_u1(*b);
            }
            Constant::Char(c) => {
                w.write_u1(CONSTANT_CHAR);
                let unit = u16::try_from(*c as u32)
                    .map_err(|_| EncodeError::UnencodableChar(*c))?;
                w.write_u2(unit);
            }
            Constant::Integer(i) => {
                w.write_u1(CONSTANT_INT);
                write_bigint(w, i)?;
            }
            Constant::Rational(r) => {
                w.write_u1(CONSTANT_REAL);
                write_bigint(w, r.numer())?;
                write_bigint(w, r.denom())?;
            }
            Constant::Str(s) => {
                w.write_u1(CONSTANT_STRING);
                let units: Vec<u16> = s.encode_utf16().collect();
                w.write_u2(len_u2(units.len(), "string length")?);
                for unit in units {
                    w.write_u2(unit);
                }
            }
            Constant::List(values) => {
                w.write_u1(CONSTANT_LIST);
                w.write_u2(len_u2(values.len(), "list length")?);
                for value in values {
                    self.write_constant(w, value)?;
                }
            }
            Constant::Set(values) => {
                w.write_u1(CONSTANT_SET);
                w.write_u2(len_u2(values.len(), "set length")?);
                for value in values {
                    self.write_constant(w, value)?;
                }
            }
            Constant::Tuple(values) => {
                w.write_u1(CONSTANT_TUPLE);
                w.write_u2(len_u2(values.len(), "tuple length")?);
                for value in values {
                    self.write_constant(w, value)?;
                }
            }
            Constant::Record(fields) => {
                w.write_u1(CONSTANT_RECORD);
                w.write_u2(len_u2(fields.len(), "record length")?);
                for (field, value) in fields {
                    let field_idx = self.intern_string(field);
                    w.write_u2(len_u2(field_idx as usize, "string pool index")?);
                    self.write_constant(w, value)?;
                }
            }
        }
        Ok(())
    }
}

/// Encode a type, self-contained (no pool references).
fn write_type(w: &mut ByteWriter, ty: &Type) {
    match ty {
        Type::Void => w.write_u1(TYPE_VOID),
        Type::Any => w.write_u1(TYPE_ANY),
        Type::Null => w.write_u1(TYPE_NULL),
        Type::Bool => w.write_u1(TYPE_BOOL),
        Type::Byte => w.write_u1(TYPE_BYTE),
        Type::Char => w.write_u1(TYPE_CHAR),
        Type::Int => w.write_u1(TYPE_INT),
        Type::Real => w.write_u1(TYPE_REAL),
        Type::Str => w.write_u1(TYPE_STRING),
        Type::List(element) => {
            w.write_u1(TYPE_LIST);
            write_type(w, element);
        }
        Type::Set(element) => {
            w.write_u1(TYPE_SET);
            write_type(w, element);
        }
        Type::Map(key, value) => {
            w.write_u1(TYPE_MAP);
            write_type(w, key);
            write_type(w, value);
        }
        Type::Tuple(elements) => {
            w.write_u1(TYPE_TUPLE);
            w.write_uv(elements.len() as u64);
            for element in elements {
                write_type(w, element);
            }
        }
        Type::Record { fields, open } => {
            w.write_u1(TYPE_RECORD);
            w.write_u1(u8::from(*open));
            w.write_uv(fields.len() as u64);
            for (field, ty) in fields {
                write_inline_str(w, field);
                write_type(w, ty);
            }
        }
        Type::Reference(element) => {
            w.write_u1(TYPE_REFERENCE);
            write_type(w, element);
        }
        Type::Function { params, ret, throws } => {
            w.write_u1(TYPE_FUNCTION);
            w.write_uv(params.len() as u64);
            for param in params {
                write_type(w, param);
            }
            write_type(w, ret);
            write_type(w, throws);
        }
        Type::Method { receiver, params, ret, throws } => {
            w.write_u1(TYPE_METHOD);
            w.write_u1(u8::from(receiver.is_some()));
            if let Some(receiver) = receiver {
                write_type(w, receiver);
            }
            w.write_uv(params.len() as u64);
            for param in params {
                write_type(w, param);
            }
            write_type(w, ret);
            write_type(w, throws);
        }
        Type::Union(members) => {
            w.write_u1(TYPE_UNION);
            w.write_uv(members.len() as u64);
            for member in members {
                write_type(w, member);
            }
        }
        Type::Intersection(members) => {
            w.write_u1(TYPE_INTERSECTION);
            w.write_uv(members.len() as u64);
            for member in members {
                write_type(w, member);
            }
        }
        Type::Negation(element) => {
            w.write_u1(TYPE_NEGATION);
            write_type(w, element);
        }
        Type::Nominal(name) => {
            w.write_u1(TYPE_NOMINAL);
            let segments = name.module().segments();
            w.write_uv(segments.len() as u64);
            for segment in segments {
                write_inline_str(w, segment);
            }
            write_inline_str(w, name.name());
        }
        Type::Recursive { label, body } => {
            w.write_u1(TYPE_RECURSIVE);
            write_inline_str(w, label);
            write_type(w, body);
        }
    }
}

fn write_inline_str(w: &mut ByteWriter, s: &str) {
    w.write_uv(s.len() as u64);
    w.write_bytes(s.as_bytes());
}

fn write_bigint(w: &mut ByteWriter, i: &num_bigint::BigInt) -> Result<(), EncodeError> {
    let bytes = i.to_signed_bytes_be();
    w.write_u2(len_u2(bytes.len(), "integer length")?);
    w.write_bytes(&bytes);
    Ok(())
}

fn write_registers(w: &mut ByteWriter, registers: &[Reg]) -> Result<(), EncodeError> {
    w.write_uv(registers.len() as u64);
    for &r in registers {
        w.write_u1(reg(r)?);
    }
    Ok(())
}

fn reg(r: Reg) -> Result<u8, EncodeError> {
    u8::try_from(r).map_err(|_| EncodeError::RegisterOverflow(r))
}

fn len_u2(len: usize, what: &'static str) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::FieldOverflow(what))
}

fn branch_offset(
    from: usize,
    target: &Label,
    labels: &HashMap<&Label, usize>,
) -> Result<u8, EncodeError> {
    let target_index = *labels
        .get(target)
        .ok_or_else(|| EncodeError::InvalidBlock(BlockError::UnknownLabel(target.clone())))?;
    let delta = target_index
        .checked_sub(from)
        .filter(|&d| d > 0)
        .ok_or(EncodeError::BranchOffsetOverflow { from, target: target_index })?;
    u8::try_from(delta)
        .map_err(|_| EncodeError::BranchOffsetOverflow { from, target: target_index })
}

fn comparator_code(cmp: Comparator) -> u8 {
    match cmp {
        Comparator::Eq => 0,
        Comparator::Ne => 1,
        Comparator::Lt => 2,
        Comparator::Le => 3,
        Comparator::Gt => 4,
        Comparator::Ge => 5,
        Comparator::In => 6,
        Comparator::Subset => 7,
        Comparator::SubsetEq => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Case, ConstantDecl, TypeDecl};

    #[test]
    fn written_file_opens_with_magic() {
        let file = WyilFile::new(PathId::from_segments(["m"]), "m.whiley", vec![]).unwrap();
        let bytes = write_module(&file).unwrap();
        assert_eq!(&bytes[..8], b"WYILFILE");
    }

    #[test]
    fn register_overflow_rejected() {
        let mut block = Block::new();
        block.push(Code::Debug { operand: 300 });
        let file = WyilFile::new(
            PathId::from_segments(["m"]),
            "m.whiley",
            vec![Declaration::FunctionOrMethod(FunctionOrMethodDecl {
                name: "f".to_string(),
                ty: Type::function(vec![], Type::Void, Type::Void),
                cases: vec![Case { precondition: None, postcondition: None, body: block }],
            })],
        )
        .unwrap();
        assert_eq!(write_module(&file), Err(EncodeError::RegisterOverflow(300)));
    }

    #[test]
    fn invalid_block_rejected() {
        let mut block = Block::new();
        block.push(Code::Goto { target: "nowhere".to_string() });
        let file = WyilFile::new(
            PathId::from_segments(["m"]),
            "m.whiley",
            vec![Declaration::Type(TypeDecl {
                name: "t".to_string(),
                ty: Type::Int,
                constraint: Some(block),
            })],
        )
        .unwrap();
        assert!(matches!(
            write_module(&file),
            Err(EncodeError::InvalidBlock(BlockError::UnknownLabel(_)))
        ));
    }

    #[test]
    fn writing_is_deterministic() {
        let file = WyilFile::new(
            PathId::from_segments(["m"]),
            "m.whiley",
            vec![Declaration::Constant(ConstantDecl {
                name: "PI".to_string(),
                constant: Constant::rational(22, 7),
            })],
        )
        .unwrap();
        assert_eq!(write_module(&file).unwrap(), write_module(&file).unwrap());
    }

    #[test]
    fn non_bmp_char_rejected() {
        let file = WyilFile::new(
            PathId::from_segments(["m"]),
            "m.whiley",
            vec![Declaration::Constant(ConstantDecl {
                name: "c".to_string(),
                constant: Constant::Char('\u{1F600}'),
            })],
        )
        .unwrap();
        assert_eq!(
            write_module(&file),
            Err(EncodeError::UnencodableChar('\u{1F600}'))
        );
    }
}
