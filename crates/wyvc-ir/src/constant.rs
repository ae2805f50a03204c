//! First-class literal values.
//!
//! Constants appear inside IR opcodes (`const`, switch cases) and in
//! constant declarations. They carry no behavior beyond structural
//! equality, ordering (so they can populate set constants), and typing.

use std::collections::{BTreeMap, BTreeSet};

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::types::{union_of, Type};

/// A literal value, carrying its minimal type via [`Constant::type_of`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constant {
    Null,
    Bool(bool),
    Byte(u8),
    Char(char),
    /// Unbounded integer.
    Integer(BigInt),
    /// Unbounded rational.
    Rational(BigRational),
    Str(String),
    List(Vec<Constant>),
    Set(BTreeSet<Constant>),
    Tuple(Vec<Constant>),
    Record(BTreeMap<String, Constant>),
}

impl Constant {
    pub fn integer(i: impl Into<BigInt>) -> Self {
        Constant::Integer(i.into())
    }

    /// The rational `numerator / denominator`.
    pub fn rational(numerator: impl Into<BigInt>, denominator: impl Into<BigInt>) -> Self {
        Constant::Rational(BigRational::new(numerator.into(), denominator.into()))
    }

    /// The minimal type of this value. Collection element types are the
    /// canonical union over the element value types, so an empty list types
    /// as `[void]`.
    pub fn type_of(&self) -> Type {
        match self {
            Constant::Null => Type::Null,
            Constant::Bool(_) => Type::Bool,
            Constant::Byte(_) => Type::Byte,
            Constant::Char(_) => Type::Char,
            Constant::Integer(_) => Type::Int,
            Constant::Rational(_) => Type::Real,
            Constant::Str(_) => Type::Str,
            Constant::List(vs) => Type::list(union_of(vs.iter().map(Constant::type_of))),
            Constant::Set(vs) => Type::set(union_of(vs.iter().map(Constant::type_of))),
            Constant::Tuple(vs) => Type::tuple(vs.iter().map(Constant::type_of).collect()),
            Constant::Record(fields) => Type::Record {
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.type_of()))
                    .collect(),
                open: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_typing() {
        assert_eq!(Constant::Null.type_of(), Type::Null);
        assert_eq!(Constant::Bool(true).type_of(), Type::Bool);
        assert_eq!(Constant::Byte(7).type_of(), Type::Byte);
        assert_eq!(Constant::Char('w').type_of(), Type::Char);
        assert_eq!(Constant::integer(-3).type_of(), Type::Int);
        assert_eq!(Constant::rational(22, 7).type_of(), Type::Real);
        assert_eq!(Constant::Str("hi".into()).type_of(), Type::Str);
    }

    #[test]
    fn homogeneous_list_typing() {
        let c = Constant::List(vec![Constant::integer(1), Constant::integer(2)]);
        assert_eq!(c.type_of(), Type::list(Type::Int));
    }

    #[test]
    fn mixed_list_types_as_union() {
        let c = Constant::List(vec![Constant::integer(1), Constant::Null]);
        let expected = Type::list(Type::union(vec![Type::Int, Type::Null]).unwrap());
        assert_eq!(c.type_of(), expected);
    }

    #[test]
    fn empty_list_types_as_list_of_void() {
        assert_eq!(Constant::List(vec![]).type_of(), Type::list(Type::Void));
    }

    #[test]
    fn record_typing_is_closed() {
        let mut fields = BTreeMap::new();
        fields.insert("x".to_string(), Constant::integer(1));
        let ty = Constant::Record(fields).type_of();
        match ty {
            Type::Record { fields, open } => {
                assert!(!open);
                assert_eq!(fields.get("x"), Some(&Type::Int));
            }
            other => panic!("expected record type, got {other:?}"),
        }
    }

    #[test]
    fn rational_normalizes() {
        assert_eq!(Constant::rational(2, 4), Constant::rational(1, 2));
    }

    #[test]
    fn sets_deduplicate_structurally() {
        let mut s = BTreeSet::new();
        s.insert(Constant::integer(1));
        s.insert(Constant::integer(1));
        assert_eq!(Constant::Set(s.clone()).type_of(), Type::set(Type::Int));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn structural_equality_and_ordering() {
        assert_eq!(Constant::integer(5), Constant::integer(5));
        assert!(Constant::integer(1) < Constant::integer(2));
        let t1 = Constant::Tuple(vec![Constant::Bool(false)]);
        let t2 = Constant::Tuple(vec![Constant::Bool(false)]);
        assert_eq!(t1, t2);
    }
}
