//! The bytecode instruction set.
//!
//! One enum variant per opcode, so every consumer dispatches by exhaustive
//! pattern match and a new opcode is a compile error until each of them is
//! extended. Register operands are slot numbers; label operands are
//! block-local strings. Control flow is forward-only: every branch targets a
//! label defined later in the same block.

use std::collections::HashMap;

use crate::constant::Constant;
use crate::name::QualifiedName;
use crate::types::Type;

/// A register (slot) number.
pub type Reg = usize;

/// A block-local label.
pub type Label = String;

/// Comparators for conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Element-of test against a collection.
    In,
    /// Strict subset.
    Subset,
    /// Subset-or-equal.
    SubsetEq,
}

/// Unary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryArithKind {
    Neg,
    /// Numerator of a rational.
    Numerator,
    /// Denominator of a rational.
    Denominator,
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryArithKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// Integer range construction `[l..r)`.
    Range,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    LeftShift,
    RightShift,
}

/// List concatenation variants. The directional forms record which operand
/// is a bare element rather than a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinListKind {
    Append,
    AppendLeft,
    AppendRight,
}

/// Set operators. Directional forms take a bare element on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinSetKind {
    Union,
    UnionLeft,
    UnionRight,
    Intersect,
    IntersectLeft,
    IntersectRight,
    Difference,
    DifferenceLeft,
}

/// String concatenation variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinStringKind {
    Append,
    AppendLeft,
    AppendRight,
}

/// The access path of an `update` opcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpdateKey {
    /// List or map element, keyed by a register.
    Index(Reg),
    /// Record field, keyed by name.
    Field(String),
}

/// A single bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Code {
    // === Unary register assignments ===
    /// `target = operand`
    Assign { ty: Type, target: Reg, operand: Reg },
    /// `target = (to) operand`
    Convert { ty: Type, target: Reg, operand: Reg, to: Type },
    /// `target = *operand`; `ty` must be a reference type.
    Dereference { ty: Type, target: Reg, operand: Reg },
    /// `target = operand.field`; `ty` must be a record type.
    FieldLoad { ty: Type, target: Reg, operand: Reg, field: String },
    /// Bitwise inversion.
    Invert { ty: Type, target: Reg, operand: Reg },
    /// `target = |operand|`; `ty` must be a collection type.
    LengthOf { ty: Type, target: Reg, operand: Reg },
    /// Like `Assign`, but the source register is dead afterwards.
    Move { ty: Type, target: Reg, operand: Reg },
    /// Allocate a fresh reference cell; `ty` must be a reference type.
    NewObject { ty: Type, target: Reg, operand: Reg },
    /// Boolean negation.
    Not { target: Reg, operand: Reg },
    /// `target = operand.index`; `ty` must be a tuple type.
    TupleLoad { ty: Type, target: Reg, operand: Reg, index: usize },
    /// Unary arithmetic.
    UnaryArith { ty: Type, target: Reg, operand: Reg, kind: UnaryArithKind },

    // === Binary register assignments ===
    /// Binary arithmetic / bitwise operation.
    BinaryArith { ty: Type, target: Reg, left: Reg, right: Reg, kind: BinaryArithKind },
    /// `target = source[key]`
    IndexOf { ty: Type, target: Reg, source: Reg, key: Reg },
    /// List concatenation.
    ListOp { ty: Type, target: Reg, left: Reg, right: Reg, kind: BinListKind },
    /// Set algebra.
    SetOp { ty: Type, target: Reg, left: Reg, right: Reg, kind: BinSetKind },
    /// String concatenation.
    StringOp { target: Reg, left: Reg, right: Reg, kind: BinStringKind },

    // === N-ary register assignments ===
    /// Direct invocation of a named function or method.
    Invoke {
        ty: Type,
        target: Option<Reg>,
        operands: Vec<Reg>,
        name: QualifiedName,
    },
    /// Invocation through a function-valued register.
    IndirectInvoke {
        ty: Type,
        target: Option<Reg>,
        operand: Reg,
        operands: Vec<Reg>,
    },
    NewList { ty: Type, target: Reg, operands: Vec<Reg> },
    NewSet { ty: Type, target: Reg, operands: Vec<Reg> },
    /// Operands alternate key, value, key, value, ...
    NewMap { ty: Type, target: Reg, operands: Vec<Reg> },
    /// Operands align with the record type's fields in field order.
    NewRecord { ty: Type, target: Reg, operands: Vec<Reg> },
    NewTuple { ty: Type, target: Reg, operands: Vec<Reg> },
    /// `target = source[from..to]`
    SubList { ty: Type, target: Reg, source: Reg, from: Reg, to: Reg },
    /// `target = source[from..to]` over a string.
    SubString { target: Reg, source: Reg, from: Reg, to: Reg },
    /// Functional update of one level of a compound value in place:
    /// `target = target with key := operand`.
    Update { ty: Type, target: Reg, key: UpdateKey, operand: Reg, after: Type },

    // === Constants and diagnostics ===
    /// Load a literal.
    Const { target: Reg, constant: Constant },
    /// Print a string operand. No verification effect.
    Debug { operand: Reg },

    // === Control flow ===
    Goto { target: Label },
    /// Conditional branch: jump to `target` when `left cmp right` holds.
    If { ty: Type, left: Reg, right: Reg, cmp: Comparator, target: Label },
    /// Runtime type test: jump to `target` when the operand inhabits `test`.
    IfIs { ty: Type, operand: Reg, test: Type, target: Label },
    /// Multi-way dispatch on a constant.
    Switch {
        ty: Type,
        operand: Reg,
        default: Label,
        branches: Vec<(Constant, Label)>,
    },
    /// Return, optionally with a typed operand.
    Return { operand: Option<(Type, Reg)> },
    Throw { ty: Type, operand: Reg },
    /// Abort with a message; verification proves this unreachable.
    Fail { message: String },
    Nop,
    /// Label definition.
    Label { label: Label },

    // === Scoped regions ===
    /// Loop until `target`, which must name a `LoopEnd`. `modified` lists
    /// every register the body may write.
    Loop { target: Label, modified: Vec<Reg> },
    /// Universally-quantified iteration of the body over `source`, binding
    /// `index`; `ty` is the collection type of `source`.
    ForAll {
        ty: Type,
        source: Reg,
        index: Reg,
        target: Label,
        modified: Vec<Reg>,
    },
    /// Terminator of a `Loop`/`ForAll` region; defines its label.
    LoopEnd { label: Label },
    /// Guarded region until `target`; `catches` pairs each handled type
    /// with its handler label.
    TryCatch { target: Label, catches: Vec<(Type, Label)> },
    /// Assertion region until `target`.
    Assert { target: Label },
    /// Assumption region until `target`.
    Assume { target: Label },
}

impl Code {
    /// Every register this opcode reads or writes, in operand order.
    pub fn slots(&self) -> Vec<Reg> {
        match self {
            Code::Assign { target, operand, .. }
            | Code::Convert { target, operand, .. }
            | Code::Dereference { target, operand, .. }
            | Code::FieldLoad { target, operand, .. }
            | Code::Invert { target, operand, .. }
            | Code::LengthOf { target, operand, .. }
            | Code::Move { target, operand, .. }
            | Code::NewObject { target, operand, .. }
            | Code::Not { target, operand }
            | Code::TupleLoad { target, operand, .. }
            | Code::UnaryArith { target, operand, .. } => vec![*target, *operand],

            Code::BinaryArith { target, left, right, .. }
            | Code::ListOp { target, left, right, .. }
            | Code::SetOp { target, left, right, .. }
            | Code::StringOp { target, left, right, .. } => vec![*target, *left, *right],
            Code::IndexOf { target, source, key, .. } => vec![*target, *source, *key],

            Code::Invoke { target, operands, .. } => {
                let mut slots: Vec<Reg> = target.iter().copied().collect();
                slots.extend(operands);
                slots
            }
            Code::IndirectInvoke { target, operand, operands, .. } => {
                let mut slots: Vec<Reg> = target.iter().copied().collect();
                slots.push(*operand);
                slots.extend(operands);
                slots
            }
            Code::NewList { target, operands, .. }
            | Code::NewSet { target, operands, .. }
            | Code::NewMap { target, operands, .. }
            | Code::NewRecord { target, operands, .. }
            | Code::NewTuple { target, operands, .. } => {
                let mut slots = vec![*target];
                slots.extend(operands);
                slots
            }
            Code::SubList { target, source, from, to, .. }
            | Code::SubString { target, source, from, to } => {
                vec![*target, *source, *from, *to]
            }
            Code::Update { target, key, operand, .. } => {
                let mut slots = vec![*target];
                if let UpdateKey::Index(k) = key {
                    slots.push(*k);
                }
                slots.push(*operand);
                slots
            }

            Code::Const { target, .. } => vec![*target],
            Code::Debug { operand } => vec![*operand],

            Code::If { left, right, .. } => vec![*left, *right],
            Code::IfIs { operand, .. }
            | Code::Switch { operand, .. }
            | Code::Throw { operand, .. } => vec![*operand],
            Code::Return { operand } => operand.iter().map(|(_, r)| *r).collect(),

            Code::Loop { modified, .. } => modified.clone(),
            Code::ForAll { source, index, modified, .. } => {
                let mut slots = vec![*source, *index];
                slots.extend(modified);
                slots
            }

            Code::Goto { .. }
            | Code::Fail { .. }
            | Code::Nop
            | Code::Label { .. }
            | Code::LoopEnd { .. }
            | Code::TryCatch { .. }
            | Code::Assert { .. }
            | Code::Assume { .. } => Vec::new(),
        }
    }

    /// Renumber every register through `map`; registers absent from the map
    /// are unchanged.
    pub fn remap(&self, map: &HashMap<Reg, Reg>) -> Code {
        let m = |r: Reg| map.get(&r).copied().unwrap_or(r);
        match self {
            Code::Assign { ty, target, operand } => Code::Assign {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
            },
            Code::Convert { ty, target, operand, to } => Code::Convert {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
                to: to.clone(),
            },
            Code::Dereference { ty, target, operand } => Code::Dereference {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
            },
            Code::FieldLoad { ty, target, operand, field } => Code::FieldLoad {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
                field: field.clone(),
            },
            Code::Invert { ty, target, operand } => Code::Invert {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
            },
            Code::LengthOf { ty, target, operand } => Code::LengthOf {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
            },
            Code::Move { ty, target, operand } => Code::Move {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
            },
            Code::NewObject { ty, target, operand } => Code::NewObject {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
            },
            Code::Not { target, operand } => Code::Not {
                target: m(*target),
                operand: m(*operand),
            },
            Code::TupleLoad { ty, target, operand, index } => Code::TupleLoad {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
                index: *index,
            },
            Code::UnaryArith { ty, target, operand, kind } => Code::UnaryArith {
                ty: ty.clone(),
                target: m(*target),
                operand: m(*operand),
                kind: *kind,
            },
            Code::BinaryArith { ty, target, left, right, kind } => Code::BinaryArith {
                ty: ty.clone(),
                target: m(*target),
                left: m(*left),
                right: m(*right),
                kind: *kind,
            },
            Code::IndexOf { ty, target, source, key } => Code::IndexOf {
                ty: ty.clone(),
                target: m(*target),
                source: m(*source),
                key: m(*key),
            },
            Code::ListOp { ty, target, left, right, kind } => Code::ListOp {
                ty: ty.clone(),
                target: m(*target),
                left: m(*left),
                right: m(*right),
                kind: *kind,
            },
            Code::SetOp { ty, target, left, right, kind } => Code::SetOp {
                ty: ty.clone(),
                target: m(*target),
                left: m(*left),
                right: m(*right),
                kind: *kind,
            },
            Code::StringOp { target, left, right, kind } => Code::StringOp {
                target: m(*target),
                left: m(*left),
                right: m(*right),
                kind: *kind,
            },
            Code::Invoke { ty, target, operands, name } => Code::Invoke {
                ty: ty.clone(),
                target: target.map(m),
                operands: operands.iter().copied().map(m).collect(),
                name: name.clone(),
            },
            Code::IndirectInvoke { ty, target, operand, operands } => Code::IndirectInvoke {
                ty: ty.clone(),
                target: target.map(m),
                operand: m(*operand),
                operands: operands.iter().copied().map(m).collect(),
            },
            Code::NewList { ty, target, operands } => Code::NewList {
                ty: ty.clone(),
                target: m(*target),
                operands: operands.iter().copied().map(m).collect(),
            },
            Code::NewSet { ty, target, operands } => Code::NewSet {
                ty: ty.clone(),
                target: m(*target),
                operands: operands.iter().copied().map(m).collect(),
            },
            Code::NewMap { ty, target, operands } => Code::NewMap {
                ty: ty.clone(),
                target: m(*target),
                operands: operands.iter().copied().map(m).collect(),
            },
            Code::NewRecord { ty, target, operands } => Code::NewRecord {
                ty: ty.clone(),
                target: m(*target),
                operands: operands.iter().copied().map(m).collect(),
            },
            Code::NewTuple { ty, target, operands } => Code::NewTuple {
                ty: ty.clone(),
                target: m(*target),
                operands: operands.iter().copied().map(m).collect(),
            },
            Code::SubList { ty, target, source, from, to } => Code::SubList {
                ty: ty.clone(),
                target: m(*target),
                source: m(*source),
                from: m(*from),
                to: m(*to),
            },
            Code::SubString { target, source, from, to } => Code::SubString {
                target: m(*target),
                source: m(*source),
                from: m(*from),
                to: m(*to),
            },
            Code::Update { ty, target, key, operand, after } => Code::Update {
                ty: ty.clone(),
                target: m(*target),
                key: match key {
                    UpdateKey::Index(k) => UpdateKey::Index(m(*k)),
                    UpdateKey::Field(f) => UpdateKey::Field(f.clone()),
                },
                operand: m(*operand),
                after: after.clone(),
            },
            Code::Const { target, constant } => Code::Const {
                target: m(*target),
                constant: constant.clone(),
            },
            Code::Debug { operand } => Code::Debug { operand: m(*operand) },
            Code::If { ty, left, right, cmp, target } => Code::If {
                ty: ty.clone(),
                left: m(*left),
                right: m(*right),
                cmp: *cmp,
                target: target.clone(),
            },
            Code::IfIs { ty, operand, test, target } => Code::IfIs {
                ty: ty.clone(),
                operand: m(*operand),
                test: test.clone(),
                target: target.clone(),
            },
            Code::Switch { ty, operand, default, branches } => Code::Switch {
                ty: ty.clone(),
                operand: m(*operand),
                default: default.clone(),
                branches: branches.clone(),
            },
            Code::Return { operand } => Code::Return {
                operand: operand.as_ref().map(|(ty, r)| (ty.clone(), m(*r))),
            },
            Code::Throw { ty, operand } => Code::Throw {
                ty: ty.clone(),
                operand: m(*operand),
            },
            Code::Loop { target, modified } => Code::Loop {
                target: target.clone(),
                modified: modified.iter().copied().map(m).collect(),
            },
            Code::ForAll { ty, source, index, target, modified } => Code::ForAll {
                ty: ty.clone(),
                source: m(*source),
                index: m(*index),
                target: target.clone(),
                modified: modified.iter().copied().map(m).collect(),
            },
            Code::Goto { .. }
            | Code::Fail { .. }
            | Code::Nop
            | Code::Label { .. }
            | Code::LoopEnd { .. }
            | Code::TryCatch { .. }
            | Code::Assert { .. }
            | Code::Assume { .. } => self.clone(),
        }
    }

    /// Rename every label through `map`; labels absent from the map are
    /// unchanged. Both defined and referenced labels are renamed.
    pub fn relabel(&self, map: &HashMap<Label, Label>) -> Code {
        let m = |l: &Label| map.get(l).cloned().unwrap_or_else(|| l.clone());
        match self {
            Code::Goto { target } => Code::Goto { target: m(target) },
            Code::If { ty, left, right, cmp, target } => Code::If {
                ty: ty.clone(),
                left: *left,
                right: *right,
                cmp: *cmp,
                target: m(target),
            },
            Code::IfIs { ty, operand, test, target } => Code::IfIs {
                ty: ty.clone(),
                operand: *operand,
                test: test.clone(),
                target: m(target),
            },
            Code::Switch { ty, operand, default, branches } => Code::Switch {
                ty: ty.clone(),
                operand: *operand,
                default: m(default),
                branches: branches
                    .iter()
                    .map(|(c, l)| (c.clone(), m(l)))
                    .collect(),
            },
            Code::Label { label } => Code::Label { label: m(label) },
            Code::Loop { target, modified } => Code::Loop {
                target: m(target),
                modified: modified.clone(),
            },
            Code::ForAll { ty, source, index, target, modified } => Code::ForAll {
                ty: ty.clone(),
                source: *source,
                index: *index,
                target: m(target),
                modified: modified.clone(),
            },
            Code::LoopEnd { label } => Code::LoopEnd { label: m(label) },
            Code::TryCatch { target, catches } => Code::TryCatch {
                target: m(target),
                catches: catches.iter().map(|(t, l)| (t.clone(), m(l))).collect(),
            },
            Code::Assert { target } => Code::Assert { target: m(target) },
            Code::Assume { target } => Code::Assume { target: m(target) },
            _ => self.clone(),
        }
    }

    /// The label this entry defines, if it is a label-defining opcode.
    pub fn defined_label(&self) -> Option<&Label> {
        match self {
            Code::Label { label } | Code::LoopEnd { label } => Some(label),
            _ => None,
        }
    }

    /// Every label this opcode references (branch targets and scope ends).
    pub fn referenced_labels(&self) -> Vec<&Label> {
        match self {
            Code::Goto { target }
            | Code::If { target, .. }
            | Code::IfIs { target, .. }
            | Code::Loop { target, .. }
            | Code::ForAll { target, .. }
            | Code::Assert { target }
            | Code::Assume { target } => vec![target],
            Code::Switch { default, branches, .. } => {
                let mut labels = vec![default];
                labels.extend(branches.iter().map(|(_, l)| l));
                labels
            }
            Code::TryCatch { target, catches } => {
                let mut labels = vec![target];
                labels.extend(catches.iter().map(|(_, l)| l));
                labels
            }
            _ => Vec::new(),
        }
    }

    /// The register this opcode writes, if any.
    pub fn target_register(&self) -> Option<Reg> {
        match self {
            Code::Assign { target, .. }
            | Code::Convert { target, .. }
            | Code::Dereference { target, .. }
            | Code::FieldLoad { target, .. }
            | Code::Invert { target, .. }
            | Code::LengthOf { target, .. }
            | Code::Move { target, .. }
            | Code::NewObject { target, .. }
            | Code::Not { target, .. }
            | Code::TupleLoad { target, .. }
            | Code::UnaryArith { target, .. }
            | Code::BinaryArith { target, .. }
            | Code::IndexOf { target, .. }
            | Code::ListOp { target, .. }
            | Code::SetOp { target, .. }
            | Code::StringOp { target, .. }
            | Code::NewList { target, .. }
            | Code::NewSet { target, .. }
            | Code::NewMap { target, .. }
            | Code::NewRecord { target, .. }
            | Code::NewTuple { target, .. }
            | Code::SubList { target, .. }
            | Code::SubString { target, .. }
            | Code::Update { target, .. }
            | Code::Const { target, .. } => Some(*target),
            Code::Invoke { target, .. } | Code::IndirectInvoke { target, .. } => *target,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_of_binary_arith() {
        let code = Code::BinaryArith {
            ty: Type::Int,
            target: 2,
            left: 0,
            right: 1,
            kind: BinaryArithKind::Add,
        };
        assert_eq!(code.slots(), vec![2, 0, 1]);
        assert_eq!(code.target_register(), Some(2));
    }

    #[test]
    fn slots_of_invoke_includes_optional_target() {
        let name = QualifiedName::new(crate::name::PathId::from_segments(["m"]), "f");
        let with_target = Code::Invoke {
            ty: Type::function(vec![Type::Int], Type::Int, Type::Void),
            target: Some(3),
            operands: vec![0, 1],
            name: name.clone(),
        };
        assert_eq!(with_target.slots(), vec![3, 0, 1]);

        let without = Code::Invoke {
            ty: Type::function(vec![Type::Int], Type::Void, Type::Void),
            target: None,
            operands: vec![0],
            name,
        };
        assert_eq!(without.slots(), vec![0]);
        assert_eq!(without.target_register(), None);
    }

    #[test]
    fn remap_renumbers_all_registers() {
        let code = Code::IndexOf {
            ty: Type::list(Type::Int),
            target: 0,
            source: 1,
            key: 2,
        };
        let map: HashMap<Reg, Reg> = [(0, 5), (1, 6), (2, 7)].into_iter().collect();
        let remapped = code.remap(&map);
        assert_eq!(remapped.slots(), vec![5, 6, 7]);
    }

    #[test]
    fn remap_leaves_unmapped_registers() {
        let code = Code::Debug { operand: 4 };
        let remapped = code.remap(&HashMap::new());
        assert_eq!(remapped, code);
    }

    #[test]
    fn relabel_renames_defined_and_referenced() {
        let map: HashMap<Label, Label> =
            [("a".to_string(), "b".to_string())].into_iter().collect();
        let branch = Code::Goto { target: "a".to_string() };
        assert_eq!(
            branch.relabel(&map),
            Code::Goto { target: "b".to_string() }
        );
        let def = Code::Label { label: "a".to_string() };
        assert_eq!(def.relabel(&map), Code::Label { label: "b".to_string() });
        let other = Code::Label { label: "c".to_string() };
        assert_eq!(other.relabel(&map), other);
    }

    #[test]
    fn switch_references_every_label() {
        let code = Code::Switch {
            ty: Type::Int,
            operand: 0,
            default: "d".to_string(),
            branches: vec![
                (Constant::integer(1), "l1".to_string()),
                (Constant::integer(2), "l2".to_string()),
            ],
        };
        let labels: Vec<&Label> = code.referenced_labels();
        assert_eq!(labels, vec!["d", "l1", "l2"]);
    }

    #[test]
    fn loop_end_defines_its_label() {
        let code = Code::LoopEnd { label: "x".to_string() };
        assert_eq!(code.defined_label(), Some(&"x".to_string()));
        assert!(code.referenced_labels().is_empty());
    }

    #[test]
    fn forall_slots_cover_source_index_and_modified() {
        let code = Code::ForAll {
            ty: Type::set(Type::Int),
            source: 0,
            index: 1,
            target: "end".to_string(),
            modified: vec![2, 3],
        };
        assert_eq!(code.slots(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn update_field_slots_exclude_key_register() {
        let by_field = Code::Update {
            ty: Type::record([("x", Type::Int)], false),
            target: 0,
            key: UpdateKey::Field("x".to_string()),
            operand: 1,
            after: Type::record([("x", Type::Int)], false),
        };
        assert_eq!(by_field.slots(), vec![0, 1]);

        let by_index = Code::Update {
            ty: Type::list(Type::Int),
            target: 0,
            key: UpdateKey::Index(2),
            operand: 1,
            after: Type::list(Type::Int),
        };
        assert_eq!(by_index.slots(), vec![0, 2, 1]);
    }
}
