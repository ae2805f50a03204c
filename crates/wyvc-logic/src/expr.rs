use std::sync::Arc;

use num_bigint::BigInt;
use num_rational::BigRational;

/// A logical expression node.
///
/// The variant set covers what the verification-condition transformer emits:
/// boolean connectives, unbounded integer/rational arithmetic, uninterpreted
/// function application, quantifiers, and the domain-specific collection
/// operators (lists, sets, maps, records, tuples).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprNode {
    // === Literals ===
    /// Boolean literal
    Bool(bool),
    /// The null value
    Null,
    /// Byte literal
    Byte(u8),
    /// Character literal
    Char(char),
    /// Unbounded integer literal
    Int(BigInt),
    /// Unbounded rational literal
    Rational(BigRational),
    /// String literal
    Str(String),

    // === Variables and application ===
    /// Logical variable reference
    Var(String),
    /// Uninterpreted function application: `f(args...)`
    App(String, Vec<Expr>),

    // === Boolean connectives ===
    /// Logical NOT
    Not(Expr),
    /// Logical AND (n-ary)
    And(Vec<Expr>),
    /// Logical OR (n-ary)
    Or(Vec<Expr>),
    /// Logical implication
    Implies(Expr, Expr),
    /// Logical if-and-only-if
    Iff(Expr, Expr),

    // === Comparisons ===
    /// Equality
    Eq(Expr, Expr),
    /// Disequality
    Ne(Expr, Expr),
    /// Less-than
    Lt(Expr, Expr),
    /// Less-or-equal
    Le(Expr, Expr),
    /// Greater-than
    Gt(Expr, Expr),
    /// Greater-or-equal
    Ge(Expr, Expr),

    // === Arithmetic ===
    Add(Expr, Expr),
    Sub(Expr, Expr),
    Mul(Expr, Expr),
    Div(Expr, Expr),
    Rem(Expr, Expr),
    /// Arithmetic negation
    Neg(Expr),
    /// Numerator of a rational
    Numerator(Expr),
    /// Denominator of a rational
    Denominator(Expr),

    // === Quantifiers ===
    /// `forall vars . body`
    Forall(Vec<String>, Expr),
    /// `exists vars . body`
    Exists(Vec<String>, Expr),

    // === Collection construction ===
    /// List display: `[e1, ..., en]`
    ListLit(Vec<Expr>),
    /// Set display: `{e1, ..., en}`
    SetLit(Vec<Expr>),
    /// Tuple display: `(e1, ..., en)`
    TupleLit(Vec<Expr>),
    /// Record display: `{f1: e1, ..., fn: en}`
    RecordLit(Vec<(String, Expr)>),
    /// Map display: `{k1 => v1, ..., kn => vn}`
    MapLit(Vec<(Expr, Expr)>),

    // === Collection operators ===
    /// Length of a list, set, map or string
    LengthOf(Expr),
    /// Indexing: `src[key]`
    IndexOf(Expr, Expr),
    /// Sublist/substring: `src[from..to]`
    SubList(Expr, Expr, Expr),
    /// List or string concatenation
    Append(Expr, Expr),
    /// Integer range: `[from..to)` as a list
    Range(Expr, Expr),
    /// Set union
    SetUnion(Expr, Expr),
    /// Set intersection
    SetIntersect(Expr, Expr),
    /// Set difference
    SetDifference(Expr, Expr),
    /// Membership: `e in set`
    ElementOf(Expr, Expr),
    /// Strict subset
    Subset(Expr, Expr),
    /// Subset-or-equal
    SubsetEq(Expr, Expr),

    // === Projection and update ===
    /// Record field projection
    FieldOf(Expr, String),
    /// Tuple element projection
    TupleAt(Expr, usize),
    /// Functional record update: `rec with field = value`
    FieldUpdate(Expr, String, Expr),
    /// Functional index update: `src with [key] = value`
    IndexUpdate(Expr, Expr, Expr),
    /// Contents of a reference cell
    Deref(Expr),
}

/// A shared, immutable logical expression.
///
/// Cloning an `Expr` clones the handle, not the tree. [`Expr::ptr_eq`]
/// observes handle identity, which the branch engine relies on when
/// splitting constraint lists at join points.
#[derive(Debug, Clone)]
pub struct Expr(Arc<ExprNode>);

impl Expr {
    pub fn new(node: ExprNode) -> Self {
        Expr(Arc::new(node))
    }

    pub fn node(&self) -> &ExprNode {
        &self.0
    }

    /// Whether `a` and `b` are the same handle (not merely structurally equal).
    pub fn ptr_eq(a: &Expr, b: &Expr) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    // === Literal constructors ===

    pub fn bool_lit(b: bool) -> Self {
        Expr::new(ExprNode::Bool(b))
    }

    pub fn null() -> Self {
        Expr::new(ExprNode::Null)
    }

    pub fn int(i: impl Into<BigInt>) -> Self {
        Expr::new(ExprNode::Int(i.into()))
    }

    pub fn rational(r: BigRational) -> Self {
        Expr::new(ExprNode::Rational(r))
    }

    pub fn str_lit(s: impl Into<String>) -> Self {
        Expr::new(ExprNode::Str(s.into()))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::new(ExprNode::Var(name.into()))
    }

    /// Whether this expression is the literal `false`.
    pub fn is_false(&self) -> bool {
        matches!(self.node(), ExprNode::Bool(false))
    }

    /// Whether this expression is the literal `true`.
    pub fn is_true(&self) -> bool {
        matches!(self.node(), ExprNode::Bool(true))
    }

    // === Connective constructors ===

    pub fn not(e: Expr) -> Self {
        Expr::new(ExprNode::Not(e))
    }

    /// Conjunction of `exprs`. Empty conjunctions are `true`; singleton
    /// conjunctions return the sole operand unchanged (preserving its
    /// handle identity).
    pub fn and(mut exprs: Vec<Expr>) -> Self {
        match exprs.len() {
            0 => Expr::bool_lit(true),
            1 => exprs.pop().unwrap(),
            _ => Expr::new(ExprNode::And(exprs)),
        }
    }

    /// Disjunction of `exprs`. Empty disjunctions are `false`; singleton
    /// disjunctions return the sole operand unchanged.
    pub fn or(mut exprs: Vec<Expr>) -> Self {
        match exprs.len() {
            0 => Expr::bool_lit(false),
            1 => exprs.pop().unwrap(),
            _ => Expr::new(ExprNode::Or(exprs)),
        }
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprNode::Implies(lhs, rhs))
    }

    pub fn iff(lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprNode::Iff(lhs, rhs))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprNode::Eq(lhs, rhs))
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprNode::Ne(lhs, rhs))
    }

    pub fn forall(vars: Vec<String>, body: Expr) -> Self {
        if vars.is_empty() {
            body
        } else {
            Expr::new(ExprNode::Forall(vars, body))
        }
    }

    pub fn exists(vars: Vec<String>, body: Expr) -> Self {
        if vars.is_empty() {
            body
        } else {
            Expr::new(ExprNode::Exists(vars, body))
        }
    }

    pub fn element_of(elem: Expr, set: Expr) -> Self {
        Expr::new(ExprNode::ElementOf(elem, set))
    }

    pub fn app(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::new(ExprNode::App(name.into(), args))
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Expr {}

impl std::hash::Hash for Expr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl From<ExprNode> for Expr {
    fn from(node: ExprNode) -> Self {
        Expr::new(node)
    }
}
