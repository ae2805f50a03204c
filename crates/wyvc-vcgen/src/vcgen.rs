//! The concrete verification-condition transformer.
//!
//! [`VcGenerator`] translates each bytecode into logical expressions over
//! the branch environment and emits [`Obligation`]s at the points where a
//! property must hold: a `fail` must be unreachable, an assertion region
//! must be valid on exit, a callee's precondition must hold at the call
//! site, and the enclosing function's postcondition must hold at `return`.
//!
//! Pre- and postcondition blocks are themselves IR: to instantiate one, the
//! block is symbolically executed against the actual argument expressions
//! by a lightweight collector whose only output is the disjunction of path
//! conditions reaching a `fail`. "The contract holds" is the negation of
//! that disjunction.

use wyvc_logic::{Expr, ExprNode};

use wyvc_ir::block::{Attribute, Block, Entry};
use wyvc_ir::codes::{BinaryArithKind, BinListKind, BinSetKind, Code, Comparator, UnaryArithKind, UpdateKey};
use wyvc_ir::constant::Constant;
use wyvc_ir::module::{Case, FunctionOrMethodDecl, WyilFile};
use wyvc_ir::name::QualifiedName;
use wyvc_ir::types::Type;

use crate::branch::{Scope, ScopeKind, VcArena, VcBranch};
use crate::error::VcError;
use crate::generator::GlobalGenerator;
use crate::transformer::VcTransformer;

/// Classification of verification conditions for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcKind {
    /// A callee's precondition holds at a call site.
    Precondition,
    /// The function's postcondition holds at a return.
    Postcondition,
    /// An assertion region is valid on exit.
    Assertion,
    /// A `fail` opcode is unreachable.
    Unreachable,
    /// A value converted to a refined nominal type satisfies its check.
    TypeInvariant,
}

/// A verification condition with the metadata needed to report it.
#[derive(Debug, Clone)]
pub struct Obligation {
    /// Human-readable description of what is being verified.
    pub description: String,
    pub kind: VcKind,
    /// The property, already under its path hypothesis; valid iff its
    /// negation is unsatisfiable.
    pub expr: Expr,
    /// Attributes of the originating entry, preserved for reporting.
    pub attributes: Vec<Attribute>,
}

/// Supplies callee declarations for contract instantiation at call sites.
pub trait FunctionRegistry {
    fn declaration(&self, name: &QualifiedName) -> Option<FunctionOrMethodDecl>;
}

/// The empty registry: every callee is opaque.
impl FunctionRegistry for () {
    fn declaration(&self, _name: &QualifiedName) -> Option<FunctionOrMethodDecl> {
        None
    }
}

/// A registry backed by a single module.
pub struct ModuleRegistry<'a> {
    file: &'a WyilFile,
}

impl<'a> ModuleRegistry<'a> {
    pub fn new(file: &'a WyilFile) -> Self {
        ModuleRegistry { file }
    }
}

impl FunctionRegistry for ModuleRegistry<'_> {
    fn declaration(&self, name: &QualifiedName) -> Option<FunctionOrMethodDecl> {
        if name.module() != self.file.id() {
            return None;
        }
        self.file
            .functions_or_methods(name.name())
            .first()
            .map(|d| (*d).clone())
    }
}

/// The production transformer.
pub struct VcGenerator<'a, 'g> {
    registry: &'a dyn FunctionRegistry,
    globals: Option<&'a mut GlobalGenerator<'g>>,
    /// Name of the function under verification, for reports.
    function: String,
    /// The current case's postcondition check, instantiated at returns.
    postcondition: Option<Block>,
    /// Declared parameter types; postconditions see the original parameter
    /// variables `r0..`, not their current register contents.
    param_types: Vec<Type>,
    obligations: Vec<Obligation>,
}

impl<'a, 'g> VcGenerator<'a, 'g> {
    /// A transformer with no enclosing function context (no postcondition
    /// to check at returns).
    pub fn new(registry: &'a dyn FunctionRegistry) -> Self {
        VcGenerator {
            registry,
            globals: None,
            function: String::new(),
            postcondition: None,
            param_types: Vec::new(),
            obligations: Vec::new(),
        }
    }

    /// A transformer verifying one case of `declaration`.
    pub fn for_function(
        registry: &'a dyn FunctionRegistry,
        declaration: &FunctionOrMethodDecl,
        case: &Case,
    ) -> Self {
        VcGenerator {
            registry,
            globals: None,
            function: declaration.name.clone(),
            postcondition: case.postcondition.clone(),
            param_types: declaration.params().to_vec(),
            obligations: Vec::new(),
        }
    }

    /// Attach a global generator, enabling refinement checks at conversions
    /// to nominal types.
    pub fn with_globals(mut self, globals: &'a mut GlobalGenerator<'g>) -> Self {
        self.globals = Some(globals);
        self
    }

    pub fn obligations(&self) -> &[Obligation] {
        &self.obligations
    }

    pub fn into_obligations(self) -> Vec<Obligation> {
        self.obligations
    }

    fn emit(
        &mut self,
        description: impl Into<String>,
        kind: VcKind,
        expr: Expr,
        attributes: &[Attribute],
    ) {
        let description = description.into();
        tracing::debug!(function = %self.function, %description, ?kind, "emitting obligation");
        self.obligations.push(Obligation {
            description,
            kind,
            expr,
            attributes: attributes.to_vec(),
        });
    }
}

impl VcTransformer for VcGenerator<'_, '_> {
    fn transform_unary_assign(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        apply_code(entry, branch)?;
        // Conversions into a refined nominal type must satisfy its check.
        if let Code::Convert { target, to: Type::Nominal(name), .. } = &entry.code {
            let check = match self.globals.as_mut() {
                Some(globals) => globals.generate(name)?,
                None => None,
            };
            if let Some(check) = check {
                let value = branch.read(*target)?.clone();
                let input = [(value, Type::Nominal(name.clone()))];
                if let Some(failed) = collect_fail_condition(&check, &input)? {
                    let obligation =
                        Expr::implies(branch.constraints_expr(), Expr::not(failed));
                    self.emit(
                        format!("value satisfies constraint on {name}"),
                        VcKind::TypeInvariant,
                        obligation,
                        &entry.attributes,
                    );
                }
            }
        }
        Ok(())
    }

    fn transform_binary_assign(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_nary_assign(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_const(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_invoke(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
        let Code::Invoke { ty, target, operands, name } = &entry.code else {
            return Err(VcError::internal("invoke handler on non-invoke", &entry.attributes));
        };
        let Some((param_types, ret)) = ty.signature() else {
            return Err(VcError::TypeInconsistency(format!(
                "invoke of {name} with non-function type"
            )));
        };
        let mut arguments: Vec<(Expr, Type)> = Vec::with_capacity(operands.len());
        for (register, param) in operands.iter().zip(param_types) {
            arguments.push((branch.read(*register)?.clone(), param.clone()));
        }

        let callee = self.registry.declaration(name);
        if let Some(case) = callee.as_ref().and_then(|d| d.cases.first()) {
            if let Some(precondition) = &case.precondition {
                if let Some(failed) = collect_fail_condition(precondition, &arguments)? {
                    let obligation =
                        Expr::implies(branch.constraints_expr(), Expr::not(failed));
                    self.emit(
                        format!("precondition of {name}"),
                        VcKind::Precondition,
                        obligation,
                        &entry.attributes,
                    );
                }
            }
            if let Some(target) = target {
                let result = branch.invalidate(*target, ret.clone());
                if let Some(postcondition) = &case.postcondition {
                    let mut inputs = vec![(result, ret.clone())];
                    inputs.extend(arguments.iter().cloned());
                    if let Some(failed) = collect_fail_condition(postcondition, &inputs)? {
                        branch.add(Expr::not(failed));
                    }
                }
            }
        } else if let Some(target) = target {
            // Unknown callee: the result is unconstrained.
            branch.invalidate(*target, ret.clone());
        }
        Ok(())
    }

    fn transform_indirect_invoke(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_if(
        &mut self,
        entry: &Entry,
        false_branch: &mut VcBranch,
        true_branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        branch_conditions(entry, false_branch, true_branch)
    }

    fn transform_switch(
        &mut self,
        entry: &Entry,
        default_branch: &mut VcBranch,
        cases: &mut [VcBranch],
    ) -> Result<(), VcError> {
        switch_conditions(entry, default_branch, cases)
    }

    fn transform_if_is(
        &mut self,
        entry: &Entry,
        false_branch: &mut VcBranch,
        true_branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        // When the tested type is a singleton the test is expressible as an
        // equality; richer type tests carry no logical constraint here.
        let Code::IfIs { operand, test, .. } = &entry.code else {
            return Ok(());
        };
        if matches!(test, Type::Null) {
            let value = false_branch.read(*operand)?.clone();
            true_branch.add(Expr::eq(value.clone(), Expr::null()));
            false_branch.add(Expr::ne(value, Expr::null()));
        }
        Ok(())
    }

    fn transform_return(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
        let Code::Return { operand } = &entry.code else {
            return Err(VcError::internal("return handler on non-return", &entry.attributes));
        };
        let Some(postcondition) = self.postcondition.clone() else {
            return Ok(());
        };
        // Postcondition inputs: the returned value, then the original
        // parameter variables.
        let mut inputs: Vec<(Expr, Type)> = Vec::with_capacity(1 + self.param_types.len());
        match operand {
            Some((ty, register)) => inputs.push((branch.read(*register)?.clone(), ty.clone())),
            None => inputs.push((Expr::null(), Type::Null)),
        }
        for (i, ty) in self.param_types.iter().enumerate() {
            inputs.push((Expr::var(format!("r{i}")), ty.clone()));
        }
        if let Some(failed) = collect_fail_condition(&postcondition, &inputs)? {
            let obligation = Expr::implies(branch.constraints_expr(), Expr::not(failed));
            self.emit(
                format!("postcondition of {}", self.function),
                VcKind::Postcondition,
                obligation,
                &entry.attributes,
            );
        }
        Ok(())
    }

    fn transform_fail(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
        let Code::Fail { message } = &entry.code else {
            return Err(VcError::internal("fail handler on non-fail", &entry.attributes));
        };
        // The path condition reaching this point must be unsatisfiable.
        self.emit(
            message.clone(),
            VcKind::Unreachable,
            Expr::not(branch.constraints_expr()),
            &entry.attributes,
        );
        Ok(())
    }

    fn enter_forall(&mut self, _entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
        assume_forall_membership(branch);
        Ok(())
    }

    fn exit_scope(&mut self, scope: &Scope, branch: &mut VcBranch) -> Result<(), VcError> {
        match &scope.kind {
            ScopeKind::AssertOrAssume { is_assertion } => {
                let claim = Expr::and(scope.constraints.clone());
                if *is_assertion {
                    let obligation =
                        Expr::implies(branch.constraints_expr(), claim.clone());
                    self.emit("assertion", VcKind::Assertion, obligation, &scope.attributes);
                }
                // Either way the region's facts hold afterwards.
                branch.add(claim);
            }
            ScopeKind::ForAll { .. } => promote_forall(scope, branch),
            _ => {}
        }
        Ok(())
    }

    fn end_forall(&mut self, scope: &Scope, branch: &mut VcBranch) -> Result<(), VcError> {
        promote_forall(scope, branch);
        Ok(())
    }
}

// =========================================================================
// Contract instantiation
// =========================================================================

/// Collects the disjunction of path conditions reaching a `fail` in a check
/// block. Used to instantiate pre/postconditions and refinement checks.
#[derive(Default)]
struct ConditionCollector {
    failed: Vec<Expr>,
}

impl VcTransformer for ConditionCollector {
    fn transform_unary_assign(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_binary_assign(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_nary_assign(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_const(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_invoke(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_indirect_invoke(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        apply_code(entry, branch)
    }

    fn transform_if(
        &mut self,
        entry: &Entry,
        false_branch: &mut VcBranch,
        true_branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        branch_conditions(entry, false_branch, true_branch)
    }

    fn transform_switch(
        &mut self,
        entry: &Entry,
        default_branch: &mut VcBranch,
        cases: &mut [VcBranch],
    ) -> Result<(), VcError> {
        switch_conditions(entry, default_branch, cases)
    }

    fn transform_return(&mut self, _entry: &Entry, _branch: &mut VcBranch) -> Result<(), VcError> {
        Ok(())
    }

    fn transform_fail(&mut self, _entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
        self.failed.push(branch.constraints_expr());
        Ok(())
    }

    fn enter_forall(&mut self, _entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
        assume_forall_membership(branch);
        Ok(())
    }

    fn exit_scope(&mut self, scope: &Scope, branch: &mut VcBranch) -> Result<(), VcError> {
        match &scope.kind {
            ScopeKind::AssertOrAssume { .. } => {
                branch.add(Expr::and(scope.constraints.clone()));
            }
            ScopeKind::ForAll { .. } => promote_forall(scope, branch),
            _ => {}
        }
        Ok(())
    }

    fn end_forall(&mut self, scope: &Scope, branch: &mut VcBranch) -> Result<(), VcError> {
        promote_forall(scope, branch);
        Ok(())
    }
}

/// Symbolically execute a check block against the given inputs (slot `i`
/// bound to `inputs[i]`) and return the disjunction of fail-path
/// conditions, or `None` when no path can fail.
pub fn collect_fail_condition(
    block: &Block,
    inputs: &[(Expr, Type)],
) -> Result<Option<Expr>, VcError> {
    let mut arena = VcArena::new(block);
    let master = arena.master(None);
    {
        let branch = arena.branch_mut(master);
        for (i, (expr, ty)) in inputs.iter().enumerate() {
            branch.write(i, expr.clone(), ty.clone());
        }
    }
    let mut collector = ConditionCollector::default();
    arena.transform(master, &mut collector)?;
    if collector.failed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Expr::or(collector.failed)))
    }
}

// =========================================================================
// Shared opcode semantics
// =========================================================================

/// The condition of a comparator over two expressions.
fn comparator_expr(cmp: Comparator, left: Expr, right: Expr) -> Expr {
    let node = match cmp {
        Comparator::Eq => ExprNode::Eq(left, right),
        Comparator::Ne => ExprNode::Ne(left, right),
        Comparator::Lt => ExprNode::Lt(left, right),
        Comparator::Le => ExprNode::Le(left, right),
        Comparator::Gt => ExprNode::Gt(left, right),
        Comparator::Ge => ExprNode::Ge(left, right),
        Comparator::In => ExprNode::ElementOf(left, right),
        Comparator::Subset => ExprNode::Subset(left, right),
        Comparator::SubsetEq => ExprNode::SubsetEq(left, right),
    };
    Expr::new(node)
}

/// Install the taken/fallthrough constraints of a conditional branch.
fn branch_conditions(
    entry: &Entry,
    false_branch: &mut VcBranch,
    true_branch: &mut VcBranch,
) -> Result<(), VcError> {
    let Code::If { left, right, cmp, .. } = &entry.code else {
        return Err(VcError::internal("if handler on non-if", &entry.attributes));
    };
    let left = false_branch.read(*left)?.clone();
    let right = false_branch.read(*right)?.clone();
    let condition = comparator_expr(*cmp, left, right);
    true_branch.add(condition.clone());
    false_branch.add(Expr::not(condition));
    Ok(())
}

/// Install the per-case and default constraints of a switch.
fn switch_conditions(
    entry: &Entry,
    default_branch: &mut VcBranch,
    cases: &mut [VcBranch],
) -> Result<(), VcError> {
    let Code::Switch { operand, branches, .. } = &entry.code else {
        return Err(VcError::internal("switch handler on non-switch", &entry.attributes));
    };
    let value = default_branch.read(*operand)?.clone();
    for ((constant, _), case) in branches.iter().zip(cases.iter_mut()) {
        case.add(Expr::eq(value.clone(), constant_expr(constant)));
    }
    for (constant, _) in branches {
        default_branch.add(Expr::ne(value.clone(), constant_expr(constant)));
    }
    Ok(())
}

/// On entering a `forall` region, the index is hypothesized to range over
/// the source collection.
fn assume_forall_membership(branch: &mut VcBranch) {
    if let ScopeKind::ForAll { source, index, .. } = &branch.top_scope().kind {
        let hypothesis = Expr::element_of(index.clone(), source.clone());
        branch.add(hypothesis);
    }
}

/// On leaving a `forall` region, everything established under the skolem
/// becomes a universally quantified fact for the surrounding scope.
fn promote_forall(scope: &Scope, branch: &mut VcBranch) {
    let ScopeKind::ForAll { source, index, .. } = &scope.kind else {
        return;
    };
    let ExprNode::Var(name) = index.node() else {
        return;
    };
    let body = Expr::and(scope.constraints.clone());
    if body.is_true() {
        return;
    }
    let fact = Expr::forall(
        vec![name.clone()],
        Expr::implies(Expr::element_of(index.clone(), source.clone()), body),
    );
    branch.add(fact);
}

/// The literal expression of a constant.
fn constant_expr(constant: &Constant) -> Expr {
    match constant {
        Constant::Null => Expr::null(),
        Constant::Bool(b) => Expr::bool_lit(*b),
        Constant::Byte(b) => Expr::new(ExprNode::Byte(*b)),
        Constant::Char(c) => Expr::new(ExprNode::Char(*c)),
        Constant::Integer(i) => Expr::int(i.clone()),
        Constant::Rational(r) => Expr::rational(r.clone()),
        Constant::Str(s) => Expr::str_lit(s.clone()),
        Constant::List(values) => {
            Expr::new(ExprNode::ListLit(values.iter().map(constant_expr).collect()))
        }
        Constant::Set(values) => {
            Expr::new(ExprNode::SetLit(values.iter().map(constant_expr).collect()))
        }
        Constant::Tuple(values) => {
            Expr::new(ExprNode::TupleLit(values.iter().map(constant_expr).collect()))
        }
        Constant::Record(fields) => Expr::new(ExprNode::RecordLit(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), constant_expr(v)))
                .collect(),
        )),
    }
}

/// The element type produced by indexing a collection of type `ty`.
fn index_result_type(ty: &Type) -> Result<Type, VcError> {
    match ty {
        Type::List(e) => Ok((**e).clone()),
        Type::Map(_, v) => Ok((**v).clone()),
        Type::Str => Ok(Type::Char),
        other => Err(VcError::TypeInconsistency(format!(
            "indexing into non-indexable type {other:?}"
        ))),
    }
}

/// Apply the environment effect of a straight-line opcode: bind the target
/// register to the logical expression denoting the result. Emits no
/// obligations.
pub(crate) fn apply_code(entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError> {
    match &entry.code {
        Code::Assign { ty, target, operand } | Code::Move { ty, target, operand } => {
            let value = branch.read(*operand)?.clone();
            branch.write(*target, value, ty.clone());
        }
        Code::Convert { target, operand, to, .. } => {
            let value = branch.read(*operand)?.clone();
            branch.write(*target, value, to.clone());
        }
        Code::Dereference { ty, target, operand } => {
            let Some(element) = ty.as_reference() else {
                return Err(VcError::TypeInconsistency(
                    "dereference of a non-reference type".to_string(),
                ));
            };
            let value = Expr::new(ExprNode::Deref(branch.read(*operand)?.clone()));
            branch.write(*target, value, element.clone());
        }
        Code::FieldLoad { ty, target, operand, field } => {
            let field_ty = ty
                .as_record()
                .and_then(|fields| fields.get(field))
                .cloned()
                .ok_or_else(|| {
                    VcError::TypeInconsistency(format!("field load of unknown field {field}"))
                })?;
            let value = Expr::new(ExprNode::FieldOf(
                branch.read(*operand)?.clone(),
                field.clone(),
            ));
            branch.write(*target, value, field_ty);
        }
        Code::Invert { ty, target, operand } => {
            let value = Expr::app("bitwise_invert", vec![branch.read(*operand)?.clone()]);
            branch.write(*target, value, ty.clone());
        }
        Code::LengthOf { target, operand, .. } => {
            let value = Expr::new(ExprNode::LengthOf(branch.read(*operand)?.clone()));
            branch.write(*target, value, Type::Int);
        }
        Code::NewObject { ty, target, .. } => {
            // A fresh allocation is unconstrained.
            branch.invalidate(*target, ty.clone());
        }
        Code::Not { target, operand } => {
            let value = Expr::not(branch.read(*operand)?.clone());
            branch.write(*target, value, Type::Bool);
        }
        Code::TupleLoad { ty, target, operand, index } => {
            let element_ty = ty
                .as_tuple()
                .and_then(|elements| elements.get(*index))
                .cloned()
                .ok_or_else(|| {
                    VcError::TypeInconsistency(format!("tuple load of element {index}"))
                })?;
            let value = Expr::new(ExprNode::TupleAt(branch.read(*operand)?.clone(), *index));
            branch.write(*target, value, element_ty);
        }
        Code::UnaryArith { ty, target, operand, kind } => {
            let operand = branch.read(*operand)?.clone();
            let (value, result_ty) = match kind {
                UnaryArithKind::Neg => (Expr::new(ExprNode::Neg(operand)), ty.clone()),
                UnaryArithKind::Numerator => {
                    (Expr::new(ExprNode::Numerator(operand)), Type::Int)
                }
                UnaryArithKind::Denominator => {
                    (Expr::new(ExprNode::Denominator(operand)), Type::Int)
                }
            };
            branch.write(*target, value, result_ty);
        }
        Code::BinaryArith { ty, target, left, right, kind } => {
            let l = branch.read(*left)?.clone();
            let r = branch.read(*right)?.clone();
            let (value, result_ty) = match kind {
                BinaryArithKind::Add => (Expr::new(ExprNode::Add(l, r)), ty.clone()),
                BinaryArithKind::Sub => (Expr::new(ExprNode::Sub(l, r)), ty.clone()),
                BinaryArithKind::Mul => (Expr::new(ExprNode::Mul(l, r)), ty.clone()),
                BinaryArithKind::Div => (Expr::new(ExprNode::Div(l, r)), ty.clone()),
                BinaryArithKind::Rem => (Expr::new(ExprNode::Rem(l, r)), ty.clone()),
                BinaryArithKind::Range => {
                    (Expr::new(ExprNode::Range(l, r)), Type::list(Type::Int))
                }
                BinaryArithKind::BitwiseOr => (Expr::app("bitwise_or", vec![l, r]), ty.clone()),
                BinaryArithKind::BitwiseXor => {
                    (Expr::app("bitwise_xor", vec![l, r]), ty.clone())
                }
                BinaryArithKind::BitwiseAnd => {
                    (Expr::app("bitwise_and", vec![l, r]), ty.clone())
                }
                BinaryArithKind::LeftShift => (Expr::app("shift_left", vec![l, r]), ty.clone()),
                BinaryArithKind::RightShift => {
                    (Expr::app("shift_right", vec![l, r]), ty.clone())
                }
            };
            branch.write(*target, value, result_ty);
        }
        Code::IndexOf { ty, target, source, key } => {
            let result_ty = index_result_type(ty)?;
            let value = Expr::new(ExprNode::IndexOf(
                branch.read(*source)?.clone(),
                branch.read(*key)?.clone(),
            ));
            branch.write(*target, value, result_ty);
        }
        Code::ListOp { ty, target, left, right, kind } => {
            let l = branch.read(*left)?.clone();
            let r = branch.read(*right)?.clone();
            let value = match kind {
                BinListKind::Append => Expr::new(ExprNode::Append(l, r)),
                BinListKind::AppendLeft => Expr::new(ExprNode::Append(
                    l,
                    Expr::new(ExprNode::ListLit(vec![r])),
                )),
                BinListKind::AppendRight => Expr::new(ExprNode::Append(
                    Expr::new(ExprNode::ListLit(vec![l])),
                    r,
                )),
            };
            branch.write(*target, value, ty.clone());
        }
        Code::SetOp { ty, target, left, right, kind } => {
            let l = branch.read(*left)?.clone();
            let r = branch.read(*right)?.clone();
            let singleton = |e: Expr| Expr::new(ExprNode::SetLit(vec![e]));
            let value = match kind {
                BinSetKind::Union => Expr::new(ExprNode::SetUnion(l, r)),
                BinSetKind::UnionLeft => Expr::new(ExprNode::SetUnion(l, singleton(r))),
                BinSetKind::UnionRight => Expr::new(ExprNode::SetUnion(singleton(l), r)),
                BinSetKind::Intersect => Expr::new(ExprNode::SetIntersect(l, r)),
                BinSetKind::IntersectLeft => {
                    Expr::new(ExprNode::SetIntersect(l, singleton(r)))
                }
                BinSetKind::IntersectRight => {
                    Expr::new(ExprNode::SetIntersect(singleton(l), r))
                }
                BinSetKind::Difference => Expr::new(ExprNode::SetDifference(l, r)),
                BinSetKind::DifferenceLeft => {
                    Expr::new(ExprNode::SetDifference(l, singleton(r)))
                }
            };
            branch.write(*target, value, ty.clone());
        }
        Code::StringOp { target, left, right, kind } => {
            let l = branch.read(*left)?.clone();
            let r = branch.read(*right)?.clone();
            let singleton = |e: Expr| Expr::new(ExprNode::ListLit(vec![e]));
            let value = match kind {
                wyvc_ir::codes::BinStringKind::Append => Expr::new(ExprNode::Append(l, r)),
                wyvc_ir::codes::BinStringKind::AppendLeft => {
                    Expr::new(ExprNode::Append(l, singleton(r)))
                }
                wyvc_ir::codes::BinStringKind::AppendRight => {
                    Expr::new(ExprNode::Append(singleton(l), r))
                }
            };
            branch.write(*target, value, Type::Str);
        }
        Code::Invoke { ty, target, .. } | Code::IndirectInvoke { ty, target, .. } => {
            // Opaque call: the result, if any, is unconstrained.
            if let Some(target) = target {
                let ret = ty
                    .signature()
                    .map(|(_, ret)| ret.clone())
                    .unwrap_or(Type::Any);
                branch.invalidate(*target, ret);
            }
        }
        Code::NewList { ty, target, operands } => {
            let values = read_all(branch, operands)?;
            branch.write(*target, Expr::new(ExprNode::ListLit(values)), ty.clone());
        }
        Code::NewSet { ty, target, operands } => {
            let values = read_all(branch, operands)?;
            branch.write(*target, Expr::new(ExprNode::SetLit(values)), ty.clone());
        }
        Code::NewTuple { ty, target, operands } => {
            let values = read_all(branch, operands)?;
            branch.write(*target, Expr::new(ExprNode::TupleLit(values)), ty.clone());
        }
        Code::NewMap { ty, target, operands } => {
            if operands.len() % 2 != 0 {
                return Err(VcError::TypeInconsistency(
                    "map construction with odd operand count".to_string(),
                ));
            }
            let mut pairs = Vec::with_capacity(operands.len() / 2);
            for kv in operands.chunks(2) {
                pairs.push((branch.read(kv[0])?.clone(), branch.read(kv[1])?.clone()));
            }
            branch.write(*target, Expr::new(ExprNode::MapLit(pairs)), ty.clone());
        }
        Code::NewRecord { ty, target, operands } => {
            let fields = ty.as_record().ok_or_else(|| {
                VcError::TypeInconsistency("record construction with non-record type".to_string())
            })?;
            if fields.len() != operands.len() {
                return Err(VcError::TypeInconsistency(format!(
                    "record construction with {} operands for {} fields",
                    operands.len(),
                    fields.len()
                )));
            }
            let mut pairs = Vec::with_capacity(operands.len());
            for (name, register) in fields.keys().zip(operands) {
                pairs.push((name.clone(), branch.read(*register)?.clone()));
            }
            branch.write(*target, Expr::new(ExprNode::RecordLit(pairs)), ty.clone());
        }
        Code::SubList { ty, target, source, from, to } => {
            let value = Expr::new(ExprNode::SubList(
                branch.read(*source)?.clone(),
                branch.read(*from)?.clone(),
                branch.read(*to)?.clone(),
            ));
            branch.write(*target, value, ty.clone());
        }
        Code::SubString { target, source, from, to } => {
            let value = Expr::new(ExprNode::SubList(
                branch.read(*source)?.clone(),
                branch.read(*from)?.clone(),
                branch.read(*to)?.clone(),
            ));
            branch.write(*target, value, Type::Str);
        }
        Code::Update { target, key, operand, after, .. } => {
            let old = branch.read(*target)?.clone();
            let value = branch.read(*operand)?.clone();
            let updated = match key {
                UpdateKey::Index(k) => Expr::new(ExprNode::IndexUpdate(
                    old,
                    branch.read(*k)?.clone(),
                    value,
                )),
                UpdateKey::Field(field) => {
                    Expr::new(ExprNode::FieldUpdate(old, field.clone(), value))
                }
            };
            branch.write(*target, updated, after.clone());
        }
        Code::Const { target, constant } => {
            branch.write(*target, constant_expr(constant), constant.type_of());
        }
        Code::Debug { .. } | Code::Nop | Code::Label { .. } => {}
        other => {
            return Err(VcError::internal(
                format!("straight-line semantics requested for {other:?}"),
                &entry.attributes,
            ))
        }
    }
    Ok(())
}

fn read_all(branch: &VcBranch, registers: &[usize]) -> Result<Vec<Expr>, VcError> {
    registers
        .iter()
        .map(|r| branch.read(*r).cloned())
        .collect()
}
