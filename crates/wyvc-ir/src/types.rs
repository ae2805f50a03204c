//! The structural type model.
//!
//! Types are immutable value objects. Unions are kept in canonical form
//! (flattened, deduplicated, deterministically ordered), so structural
//! equality is meaningful for container keys. Semantic equivalence over
//! recursive types is bisimulation, which [`equivalent`] realizes as mutual
//! [`subtype`] judgements; the subtype relation itself reasons coinductively,
//! discharging a judgement when it re-encounters one already in progress.
//!
//! Anonymous recursive types are labelled by a deterministic digest of their
//! structure, so two independently-built but identically-shaped recursive
//! types receive the same label and compare equal syntactically.

use std::collections::{BTreeMap, HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::error::TypeError;
use crate::name::QualifiedName;

/// A structural type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    /// The empty type (no values).
    Void,
    /// The top type (all values).
    Any,
    /// The singleton null type.
    Null,
    Bool,
    Byte,
    Char,
    /// Unbounded integers.
    Int,
    /// Unbounded rationals.
    Real,
    /// Character strings.
    Str,
    /// Homogeneous lists.
    List(Box<Type>),
    /// Homogeneous sets.
    Set(Box<Type>),
    /// Key/value maps.
    Map(Box<Type>, Box<Type>),
    /// Fixed-arity tuples.
    Tuple(Vec<Type>),
    /// Records. An open record admits additional unnamed fields.
    Record {
        fields: BTreeMap<String, Type>,
        open: bool,
    },
    /// Mutable reference cells.
    Reference(Box<Type>),
    /// First-class functions.
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
        throws: Box<Type>,
    },
    /// Methods, optionally bound to a receiver.
    Method {
        receiver: Option<Box<Type>>,
        params: Vec<Type>,
        ret: Box<Type>,
        throws: Box<Type>,
    },
    /// Canonical union of two or more summands.
    Union(Vec<Type>),
    /// Intersection of two or more operands.
    Intersection(Vec<Type>),
    /// Negation (complement).
    Negation(Box<Type>),
    /// A named type. Root-module names are recursion labels bound by an
    /// enclosing [`Type::Recursive`]; all other names are opaque here and
    /// resolved by the global generator.
    Nominal(QualifiedName),
    /// An equi-recursive binder: `body` may refer back to the whole type via
    /// `Nominal(QualifiedName::local(label))`.
    Recursive { label: String, body: Box<Type> },
}

impl Type {
    // === Constructors ===

    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    pub fn set(element: Type) -> Type {
        Type::Set(Box::new(element))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn tuple(elements: Vec<Type>) -> Type {
        Type::Tuple(elements)
    }

    pub fn record(fields: impl IntoIterator<Item = (impl Into<String>, Type)>, open: bool) -> Type {
        Type::Record {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            open,
        }
    }

    pub fn reference(element: Type) -> Type {
        Type::Reference(Box::new(element))
    }

    pub fn function(params: Vec<Type>, ret: Type, throws: Type) -> Type {
        Type::Function {
            params,
            ret: Box::new(ret),
            throws: Box::new(throws),
        }
    }

    pub fn method(receiver: Option<Type>, params: Vec<Type>, ret: Type, throws: Type) -> Type {
        Type::Method {
            receiver: receiver.map(Box::new),
            params,
            ret: Box::new(ret),
            throws: Box::new(throws),
        }
    }

    pub fn nominal(name: QualifiedName) -> Type {
        Type::Nominal(name)
    }

    /// Canonical union of the given summands.
    ///
    /// Fails with [`TypeError::EmptyUnion`] on an empty summand list; a
    /// singleton (after flattening and deduplication) collapses to its sole
    /// summand.
    pub fn union(summands: Vec<Type>) -> Result<Type, TypeError> {
        if summands.is_empty() {
            return Err(TypeError::EmptyUnion);
        }
        Ok(union_of(summands))
    }

    /// Canonical intersection of the given operands.
    pub fn intersection(operands: Vec<Type>) -> Result<Type, TypeError> {
        if operands.is_empty() {
            return Err(TypeError::EmptyIntersection);
        }
        Ok(intersection_of(operands))
    }

    /// Build a recursive type whose label is a deterministic digest of the
    /// body's structure. Within `body`, occurrences of
    /// `Nominal(QualifiedName::local(provisional))` denote the type being
    /// defined; they are rewritten to the digest label.
    pub fn recursive(provisional: &str, body: Type) -> Type {
        let label = structural_label(&body, provisional);
        let renamed = substitute(
            &body,
            &QualifiedName::local(provisional),
            &Type::Nominal(QualifiedName::local(label.clone())),
        );
        Type::Recursive {
            label,
            body: Box::new(renamed),
        }
    }

    /// Build a recursive type with an explicit label. Used by the codec,
    /// which persists labels; fresh construction should prefer
    /// [`Type::recursive`].
    pub fn recursive_named(label: impl Into<String>, body: Type) -> Type {
        Type::Recursive {
            label: label.into(),
            body: Box::new(body),
        }
    }

    // === Predicates and accessors ===

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    /// The element type of a list or set.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::List(e) | Type::Set(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Type> {
        match self {
            Type::Reference(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, Type>> {
        match self {
            Type::Record { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Type]> {
        match self {
            Type::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    /// Parameter and return types of a function or method.
    pub fn signature(&self) -> Option<(&[Type], &Type)> {
        match self {
            Type::Function { params, ret, .. } => Some((params, ret)),
            Type::Method { params, ret, .. } => Some((params, ret)),
            _ => None,
        }
    }

    pub fn is_function_or_method(&self) -> bool {
        matches!(self, Type::Function { .. } | Type::Method { .. })
    }
}

// =========================================================================
// Canonical combinators
// =========================================================================

/// Canonical union: flattens nested unions, drops `void` summands, absorbs
/// into `any`, deduplicates and orders deterministically.
pub fn union_of(summands: impl IntoIterator<Item = Type>) -> Type {
    let mut flat = Vec::new();
    for s in summands {
        match s {
            Type::Union(inner) => flat.extend(inner),
            Type::Void => {}
            other => flat.push(other),
        }
    }
    if flat.iter().any(Type::is_any) {
        return Type::Any;
    }
    flat.sort();
    flat.dedup();
    match flat.len() {
        0 => Type::Void,
        1 => flat.pop().unwrap(),
        _ => Type::Union(flat),
    }
}

/// Canonical intersection: flattens, drops `any`, absorbs into `void`,
/// deduplicates and orders deterministically.
pub fn intersection_of(operands: impl IntoIterator<Item = Type>) -> Type {
    let mut flat = Vec::new();
    for s in operands {
        match s {
            Type::Intersection(inner) => flat.extend(inner),
            Type::Any => {}
            Type::Void => return Type::Void,
            other => flat.push(other),
        }
    }
    flat.sort();
    flat.dedup();
    match flat.len() {
        0 => Type::Any,
        1 => flat.pop().unwrap(),
        _ => Type::Intersection(flat),
    }
}

// =========================================================================
// Subtyping
// =========================================================================

/// Whether `a` is a subtype of `b`.
///
/// Recursive types are handled coinductively: each in-progress judgement is
/// recorded as an assumption, and re-encountering it discharges the cycle.
/// An environment maps recursion labels to their binders while the traversal
/// is underneath them.
pub fn subtype(a: &Type, b: &Type) -> bool {
    let mut ctx = SubtypeCtx::default();
    subtype_in(a, b, &mut ctx)
}

/// Semantic equivalence: bisimulation, i.e. mutual subtyping.
pub fn equivalent(a: &Type, b: &Type) -> bool {
    subtype(a, b) && subtype(b, a)
}

#[derive(Default)]
struct SubtypeCtx {
    /// Recursion label -> its binder, for labels currently in scope.
    env: HashMap<QualifiedName, Type>,
    /// Judgements currently assumed to hold.
    assumptions: HashSet<(Type, Type)>,
}

impl SubtypeCtx {
    fn involves_recursion(&self, t: &Type) -> bool {
        match t {
            Type::Recursive { .. } => true,
            Type::Nominal(n) => self.env.contains_key(n),
            _ => false,
        }
    }

    /// Unroll one recursion step, binding the label on the way down.
    fn unroll(&mut self, t: &Type) -> Type {
        match t {
            Type::Recursive { label, body } => {
                self.env
                    .insert(QualifiedName::local(label.clone()), t.clone());
                (**body).clone()
            }
            Type::Nominal(n) => match self.env.get(n) {
                Some(Type::Recursive { body, .. }) => (**body).clone(),
                Some(other) => other.clone(),
                None => t.clone(),
            },
            _ => t.clone(),
        }
    }
}

fn subtype_in(a: &Type, b: &Type, ctx: &mut SubtypeCtx) -> bool {
    if a == b {
        return true;
    }

    if ctx.involves_recursion(a) || ctx.involves_recursion(b) {
        let key = (a.clone(), b.clone());
        if !ctx.assumptions.insert(key.clone()) {
            // The judgement is already in progress; assume it holds.
            return true;
        }
        let a2 = ctx.unroll(a);
        let b2 = ctx.unroll(b);
        let holds = subtype_in(&a2, &b2, ctx);
        if !holds {
            // A refuted judgement must not discharge later cycles.
            ctx.assumptions.remove(&key);
        }
        return holds;
    }

    match (a, b) {
        (_, Type::Any) => true,
        (Type::Void, _) => true,

        // Unions distribute; the left side is decomposed first.
        (Type::Union(es), _) => es.iter().all(|e| subtype_in(e, b, ctx)),
        (_, Type::Union(es)) => es.iter().any(|e| subtype_in(a, e, ctx)),

        // Intersections, dually.
        (_, Type::Intersection(es)) => es.iter().all(|e| subtype_in(a, e, ctx)),
        (Type::Intersection(es), _) => es.iter().any(|e| subtype_in(e, b, ctx)),

        // Double negation and complement inclusion.
        (Type::Negation(x), Type::Negation(y)) => subtype_in(y, x, ctx),
        (_, Type::Negation(y)) => intersect(a, y).is_void(),
        (Type::Negation(_), _) => false,

        // Numeric tower.
        (Type::Char, Type::Int) | (Type::Char, Type::Real) | (Type::Int, Type::Real) => true,

        (Type::List(x), Type::List(y)) => subtype_in(x, y, ctx),
        (Type::Set(x), Type::Set(y)) => subtype_in(x, y, ctx),
        (Type::Map(k1, v1), Type::Map(k2, v2)) => {
            subtype_in(k1, k2, ctx) && subtype_in(v1, v2, ctx)
        }
        (Type::Tuple(xs), Type::Tuple(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| subtype_in(x, y, ctx))
        }
        (
            Type::Record { fields: fa, open: oa },
            Type::Record { fields: fb, open: ob },
        ) => {
            if *ob {
                // An open supertype requires (at least) its named fields.
                fb.iter()
                    .all(|(k, tb)| fa.get(k).is_some_and(|ta| subtype_in(ta, tb, ctx)))
            } else {
                // A closed supertype requires exactly its named fields.
                !*oa
                    && fa.len() == fb.len()
                    && fb
                        .iter()
                        .all(|(k, tb)| fa.get(k).is_some_and(|ta| subtype_in(ta, tb, ctx)))
            }
        }
        // References are invariant.
        (Type::Reference(x), Type::Reference(y)) => {
            subtype_in(x, y, ctx) && subtype_in(y, x, ctx)
        }
        (
            Type::Function { params: pa, ret: ra, throws: ta },
            Type::Function { params: pb, ret: rb, throws: tb },
        ) => {
            pa.len() == pb.len()
                && pb.iter().zip(pa).all(|(x, y)| subtype_in(x, y, ctx))
                && subtype_in(ra, rb, ctx)
                && subtype_in(ta, tb, ctx)
        }
        (
            Type::Method { receiver: ca, params: pa, ret: ra, throws: ta },
            Type::Method { receiver: cb, params: pb, ret: rb, throws: tb },
        ) => {
            let receivers = match (ca, cb) {
                (None, None) => true,
                (Some(x), Some(y)) => subtype_in(x, y, ctx) && subtype_in(y, x, ctx),
                _ => false,
            };
            receivers
                && pa.len() == pb.len()
                && pb.iter().zip(pa).all(|(x, y)| subtype_in(x, y, ctx))
                && subtype_in(ra, rb, ctx)
                && subtype_in(ta, tb, ctx)
        }
        _ => false,
    }
}

// =========================================================================
// Intersection
// =========================================================================

/// The normalized intersection of `a` and `b`.
///
/// Returns `void` when the operands are provably disjoint, a narrowed
/// structural type when one can be computed, and a symbolic
/// `Intersection` otherwise. This is the operation `if-is` uses to narrow a
/// register's type on both sides of the test.
pub fn intersect(a: &Type, b: &Type) -> Type {
    if a == b {
        return a.clone();
    }
    match (a, b) {
        (Type::Any, _) => b.clone(),
        (_, Type::Any) => a.clone(),
        (Type::Void, _) | (_, Type::Void) => Type::Void,

        (Type::Union(es), _) => union_of(es.iter().map(|e| intersect(e, b))),
        (_, Type::Union(es)) => union_of(es.iter().map(|e| intersect(a, e))),

        (Type::Negation(x), _) => intersect_negation(b, x),
        (_, Type::Negation(y)) => intersect_negation(a, y),

        (Type::List(x), Type::List(y)) => Type::list(intersect(x, y)),
        (Type::Set(x), Type::Set(y)) => Type::set(intersect(x, y)),
        (Type::Map(k1, v1), Type::Map(k2, v2)) => {
            Type::map(intersect(k1, k2), intersect(v1, v2))
        }
        (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => {
            let elements: Vec<Type> = xs.iter().zip(ys).map(|(x, y)| intersect(x, y)).collect();
            if elements.iter().any(Type::is_void) {
                Type::Void
            } else {
                Type::Tuple(elements)
            }
        }
        (
            Type::Record { fields: fa, open: oa },
            Type::Record { fields: fb, open: ob },
        ) => intersect_records(fa, *oa, fb, *ob),

        // Numeric tower.
        (Type::Int, Type::Real) | (Type::Real, Type::Int) => Type::Int,
        (Type::Char, Type::Int) | (Type::Int, Type::Char) => Type::Char,
        (Type::Char, Type::Real) | (Type::Real, Type::Char) => Type::Char,

        _ => {
            if subtype(a, b) {
                a.clone()
            } else if subtype(b, a) {
                b.clone()
            } else if disjoint_heads(a, b) {
                Type::Void
            } else {
                intersection_of([a.clone(), b.clone()])
            }
        }
    }
}

/// `t ∩ ¬neg`.
fn intersect_negation(t: &Type, neg: &Type) -> Type {
    if subtype(t, neg) {
        Type::Void
    } else if intersect(t, neg).is_void() {
        t.clone()
    } else {
        intersection_of([t.clone(), negate(neg)])
    }
}

fn intersect_records(
    fa: &BTreeMap<String, Type>,
    oa: bool,
    fb: &BTreeMap<String, Type>,
    ob: bool,
) -> Type {
    // A closed record fixes its field set; fields the other side demands
    // beyond it make the intersection empty.
    if !oa && fb.keys().any(|k| !fa.contains_key(k)) {
        return Type::Void;
    }
    if !ob && fa.keys().any(|k| !fb.contains_key(k)) {
        return Type::Void;
    }
    let mut fields = BTreeMap::new();
    for (k, ta) in fa {
        let ft = match fb.get(k) {
            Some(tb) => intersect(ta, tb),
            None => ta.clone(),
        };
        if ft.is_void() {
            return Type::Void;
        }
        fields.insert(k.clone(), ft);
    }
    for (k, tb) in fb {
        if !fields.contains_key(k) {
            fields.insert(k.clone(), tb.clone());
        }
    }
    Type::Record { fields, open: oa && ob }
}

/// Whether `a` and `b` have provably-disjoint head constructors.
fn disjoint_heads(a: &Type, b: &Type) -> bool {
    let (ka, kb) = match (head_kind(a), head_kind(b)) {
        (Some(ka), Some(kb)) => (ka, kb),
        _ => return false,
    };
    if ka == kb {
        return false;
    }
    // The numeric constructors overlap pairwise.
    const NUMERIC: [HeadKind; 3] = [HeadKind::Char, HeadKind::Int, HeadKind::Real];
    !(NUMERIC.contains(&ka) && NUMERIC.contains(&kb))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum HeadKind {
    Null,
    Bool,
    Byte,
    Char,
    Int,
    Real,
    Str,
    List,
    Set,
    Map,
    Tuple,
    Record,
    Reference,
    Function,
    Method,
}

fn head_kind(t: &Type) -> Option<HeadKind> {
    match t {
        Type::Null => Some(HeadKind::Null),
        Type::Bool => Some(HeadKind::Bool),
        Type::Byte => Some(HeadKind::Byte),
        Type::Char => Some(HeadKind::Char),
        Type::Int => Some(HeadKind::Int),
        Type::Real => Some(HeadKind::Real),
        Type::Str => Some(HeadKind::Str),
        Type::List(_) => Some(HeadKind::List),
        Type::Set(_) => Some(HeadKind::Set),
        Type::Map(_, _) => Some(HeadKind::Map),
        Type::Tuple(_) => Some(HeadKind::Tuple),
        Type::Record { .. } => Some(HeadKind::Record),
        Type::Reference(_) => Some(HeadKind::Reference),
        Type::Function { .. } => Some(HeadKind::Function),
        Type::Method { .. } => Some(HeadKind::Method),
        _ => None,
    }
}

// =========================================================================
// Negation, substitution, unrolling
// =========================================================================

/// The normalized complement of `t`: double negation collapses and
/// De Morgan pushes through unions and intersections.
pub fn negate(t: &Type) -> Type {
    match t {
        Type::Void => Type::Any,
        Type::Any => Type::Void,
        Type::Negation(x) => (**x).clone(),
        Type::Union(es) => intersection_of(es.iter().map(negate)),
        Type::Intersection(es) => union_of(es.iter().map(negate)),
        _ => Type::Negation(Box::new(t.clone())),
    }
}

/// Replace free occurrences of `Nominal(from)` with `to`. A nested
/// `Recursive` binder with the same label shadows the substitution.
pub fn substitute(t: &Type, from: &QualifiedName, to: &Type) -> Type {
    match t {
        Type::Nominal(n) if n == from => to.clone(),
        Type::Recursive { label, .. }
            if QualifiedName::local(label.clone()) == *from =>
        {
            t.clone()
        }
        Type::List(e) => Type::list(substitute(e, from, to)),
        Type::Set(e) => Type::set(substitute(e, from, to)),
        Type::Map(k, v) => Type::map(substitute(k, from, to), substitute(v, from, to)),
        Type::Tuple(es) => Type::Tuple(es.iter().map(|e| substitute(e, from, to)).collect()),
        Type::Record { fields, open } => Type::Record {
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), substitute(v, from, to)))
                .collect(),
            open: *open,
        },
        Type::Reference(e) => Type::reference(substitute(e, from, to)),
        Type::Function { params, ret, throws } => Type::Function {
            params: params.iter().map(|p| substitute(p, from, to)).collect(),
            ret: Box::new(substitute(ret, from, to)),
            throws: Box::new(substitute(throws, from, to)),
        },
        Type::Method { receiver, params, ret, throws } => Type::Method {
            receiver: receiver
                .as_ref()
                .map(|r| Box::new(substitute(r, from, to))),
            params: params.iter().map(|p| substitute(p, from, to)).collect(),
            ret: Box::new(substitute(ret, from, to)),
            throws: Box::new(substitute(throws, from, to)),
        },
        Type::Union(es) => union_of(es.iter().map(|e| substitute(e, from, to))),
        Type::Intersection(es) => intersection_of(es.iter().map(|e| substitute(e, from, to))),
        Type::Negation(e) => negate(&substitute(e, from, to)),
        Type::Recursive { label, body } => Type::Recursive {
            label: label.clone(),
            body: Box::new(substitute(body, from, to)),
        },
        _ => t.clone(),
    }
}

/// Unroll the outermost recursive binder once. Non-recursive types are
/// returned unchanged.
pub fn flatten(t: &Type) -> Type {
    match t {
        Type::Recursive { label, body } => {
            substitute(body, &QualifiedName::local(label.clone()), t)
        }
        _ => t.clone(),
    }
}

// =========================================================================
// Structural labelling
// =========================================================================

/// Deterministic label for an anonymous recursive type: a digest of the
/// body's structure with self-references canonicalized, so bisimilar
/// spellings coincide without name coincidence.
fn structural_label(body: &Type, provisional: &str) -> String {
    let mut hasher = Sha256::new();
    feed_structure(body, provisional, &mut hasher);
    let digest = hasher.finalize();
    let mut label = String::from("rec$");
    for byte in &digest[..8] {
        label.push_str(&format!("{byte:02x}"));
    }
    label
}

fn feed_structure(t: &Type, self_label: &str, hasher: &mut Sha256) {
    fn feed_str(s: &str, hasher: &mut Sha256) {
        hasher.update((s.len() as u64).to_be_bytes());
        hasher.update(s.as_bytes());
    }
    match t {
        Type::Void => hasher.update([0u8]),
        Type::Any => hasher.update([1u8]),
        Type::Null => hasher.update([2u8]),
        Type::Bool => hasher.update([3u8]),
        Type::Byte => hasher.update([4u8]),
        Type::Char => hasher.update([5u8]),
        Type::Int => hasher.update([6u8]),
        Type::Real => hasher.update([7u8]),
        Type::Str => hasher.update([8u8]),
        Type::List(e) => {
            hasher.update([9u8]);
            feed_structure(e, self_label, hasher);
        }
        Type::Set(e) => {
            hasher.update([10u8]);
            feed_structure(e, self_label, hasher);
        }
        Type::Map(k, v) => {
            hasher.update([11u8]);
            feed_structure(k, self_label, hasher);
            feed_structure(v, self_label, hasher);
        }
        Type::Tuple(es) => {
            hasher.update([12u8]);
            hasher.update((es.len() as u64).to_be_bytes());
            for e in es {
                feed_structure(e, self_label, hasher);
            }
        }
        Type::Record { fields, open } => {
            hasher.update([13u8, u8::from(*open)]);
            hasher.update((fields.len() as u64).to_be_bytes());
            for (k, v) in fields {
                feed_str(k, hasher);
                feed_structure(v, self_label, hasher);
            }
        }
        Type::Reference(e) => {
            hasher.update([14u8]);
            feed_structure(e, self_label, hasher);
        }
        Type::Function { params, ret, throws } => {
            hasher.update([15u8]);
            hasher.update((params.len() as u64).to_be_bytes());
            for p in params {
                feed_structure(p, self_label, hasher);
            }
            feed_structure(ret, self_label, hasher);
            feed_structure(throws, self_label, hasher);
        }
        Type::Method { receiver, params, ret, throws } => {
            hasher.update([16u8, u8::from(receiver.is_some())]);
            if let Some(r) = receiver {
                feed_structure(r, self_label, hasher);
            }
            hasher.update((params.len() as u64).to_be_bytes());
            for p in params {
                feed_structure(p, self_label, hasher);
            }
            feed_structure(ret, self_label, hasher);
            feed_structure(throws, self_label, hasher);
        }
        Type::Union(es) => {
            hasher.update([17u8]);
            hasher.update((es.len() as u64).to_be_bytes());
            for e in es {
                feed_structure(e, self_label, hasher);
            }
        }
        Type::Intersection(es) => {
            hasher.update([18u8]);
            hasher.update((es.len() as u64).to_be_bytes());
            for e in es {
                feed_structure(e, self_label, hasher);
            }
        }
        Type::Negation(e) => {
            hasher.update([19u8]);
            feed_structure(e, self_label, hasher);
        }
        Type::Nominal(n) => {
            if n.module().is_root() && n.name() == self_label {
                // Self-reference marker, independent of the provisional name.
                hasher.update([255u8]);
            } else {
                hasher.update([20u8]);
                feed_str(&n.to_string(), hasher);
            }
        }
        Type::Recursive { label, body } => {
            hasher.update([21u8]);
            feed_str(label, hasher);
            feed_structure(body, self_label, hasher);
        }
    }
}
