//! The path-sensitive branch engine.
//!
//! A [`VcBranch`] is one symbolic execution state along a path through a
//! block: an environment mapping registers to logical expressions, the
//! registers' current types, and a stack of active scopes accumulating
//! constraints. Branches fork at conditionals, join back at control-flow
//! meets, and are killed when provably unreachable.
//!
//! Branches live in a [`VcArena`] and refer to their parent by id, so the
//! branch graph needs no shared ownership: parents outlive children by
//! construction, children being discarded at join or termination.

use std::sync::Arc;

use wyvc_logic::Expr;

use wyvc_ir::block::{Attribute, Block};
use wyvc_ir::codes::{Code, Label, Reg};
use wyvc_ir::module::FunctionOrMethodDecl;
use wyvc_ir::types::{self, Type};

use crate::error::VcError;
use crate::transformer::VcTransformer;

/// Index of a branch within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchId(usize);

/// A frame on a branch's scope stack.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    /// Bytecode index of the matching terminator.
    pub end: usize,
    /// Constraints accumulated within this scope, in order.
    pub constraints: Vec<Expr>,
    /// Attributes of the entry that opened the scope, for reporting.
    pub attributes: Vec<Attribute>,
}

/// What kind of region a scope tracks, with its per-kind payload.
#[derive(Debug, Clone)]
pub enum ScopeKind {
    /// The whole function or method body.
    Entry { declaration: Option<Arc<FunctionOrMethodDecl>> },
    /// A plain loop; `modified` lists the registers its body may write.
    Loop { modified: Vec<Reg> },
    /// A universally-quantified iteration.
    ForAll {
        modified: Vec<Reg>,
        /// The collection being iterated, as read at loop entry.
        source: Expr,
        /// The skolem bound to the iteration variable.
        index: Expr,
    },
    /// A guarded region with its handlers.
    Try { catches: Vec<(Type, Label)> },
    /// An assertion or assumption region.
    AssertOrAssume { is_assertion: bool },
}

/// One symbolic execution state.
#[derive(Debug, Clone)]
pub struct VcBranch {
    /// The branch this one was forked from; `None` for the master.
    parent: Option<BranchId>,
    /// Register assignment: register -> logical expression.
    environment: Vec<Option<Expr>>,
    /// Register typing at this point on the path.
    types: Vec<Option<Type>>,
    /// Active scopes; the bottom is always the entry scope.
    pub scopes: Vec<Scope>,
    /// Bytecode offset where this branch was forked (0 for the master).
    origin: usize,
    /// Current program counter.
    pc: usize,
}

impl VcBranch {
    pub fn parent(&self) -> Option<BranchId> {
        self.parent
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    /// The expression currently held by `register`.
    pub fn read(&self, register: Reg) -> Result<&Expr, VcError> {
        self.environment
            .get(register)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                VcError::internal(format!("read of unassigned register {register}"), &[])
            })
    }

    /// The current type of `register`.
    pub fn type_of(&self, register: Reg) -> Result<&Type, VcError> {
        self.types.get(register).and_then(Option::as_ref).ok_or_else(|| {
            VcError::internal(format!("type of unassigned register {register}"), &[])
        })
    }

    fn type_of_or_any(&self, register: Reg) -> Type {
        self.types
            .get(register)
            .and_then(Option::as_ref)
            .cloned()
            .unwrap_or(Type::Any)
    }

    /// Bind `register` to `expr` with the given type.
    pub fn write(&mut self, register: Reg, expr: Expr, ty: Type) {
        if register >= self.environment.len() {
            self.environment.resize(register + 1, None);
            self.types.resize(register + 1, None);
        }
        self.environment[register] = Some(expr);
        self.types[register] = Some(ty);
    }

    /// Terminate the current flow for `register` and begin a new one by
    /// binding it to a fresh skolem named after the register and the
    /// current program counter.
    pub fn invalidate(&mut self, register: Reg, ty: Type) -> Expr {
        let var = Expr::var(format!("r{}_{}", register, self.pc));
        self.write(register, var.clone(), ty);
        var
    }

    /// Append a constraint to the innermost scope.
    pub fn add(&mut self, constraint: Expr) {
        self.top_scope_mut().constraints.push(constraint);
    }

    /// Append several constraints to the innermost scope.
    pub fn add_all(&mut self, constraints: impl IntoIterator<Item = Expr>) {
        self.top_scope_mut().constraints.extend(constraints);
    }

    pub fn top_scope(&self) -> &Scope {
        self.scopes.last().expect("scope stack is never empty")
    }

    fn top_scope_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    /// The entry-scope declaration, when this branch runs a function body.
    pub fn declaration(&self) -> Option<&Arc<FunctionOrMethodDecl>> {
        match &self.scopes.first()?.kind {
            ScopeKind::Entry { declaration } => declaration.as_ref(),
            _ => None,
        }
    }

    /// Everything known to hold at this point: the conjunction of every
    /// scope's constraints, outermost first.
    pub fn constraints_expr(&self) -> Expr {
        let all: Vec<Expr> = self
            .scopes
            .iter()
            .flat_map(|s| s.constraints.iter().cloned())
            .collect();
        Expr::and(all)
    }

    /// A branch is live until a `false` constraint is installed.
    pub fn is_live(&self) -> bool {
        !self
            .scopes
            .iter()
            .any(|s| s.constraints.iter().any(Expr::is_false))
    }

    /// Mark this branch unreachable: clear every scope's constraints and
    /// install the literal `false`. Idempotent.
    pub fn kill(&mut self) {
        for scope in &mut self.scopes {
            scope.constraints.clear();
        }
        self.top_scope_mut().constraints.push(Expr::bool_lit(false));
    }
}

/// The branch arena for one block traversal.
pub struct VcArena<'a> {
    block: &'a Block,
    branches: Vec<VcBranch>,
}

impl<'a> VcArena<'a> {
    pub fn new(block: &'a Block) -> Self {
        VcArena { block, branches: Vec::new() }
    }

    pub fn block(&self) -> &'a Block {
        self.block
    }

    /// Construct the master branch: origin and program counter at the block
    /// entry, an entry scope spanning the whole block, and, when a
    /// declaration is supplied, each parameter register bound to a fresh
    /// logical variable of its declared type.
    pub fn master(&mut self, declaration: Option<Arc<FunctionOrMethodDecl>>) -> BranchId {
        let slots = self.block.num_slots();
        let mut branch = VcBranch {
            parent: None,
            environment: vec![None; slots],
            types: vec![None; slots],
            scopes: vec![Scope {
                kind: ScopeKind::Entry { declaration: declaration.clone() },
                end: self.block.size(),
                constraints: Vec::new(),
                attributes: Vec::new(),
            }],
            origin: 0,
            pc: 0,
        };
        if let Some(declaration) = &declaration {
            for (i, ty) in declaration.params().iter().enumerate() {
                branch.write(i, Expr::var(format!("r{i}")), ty.clone());
            }
        }
        self.push(branch)
    }

    pub fn branch(&self, id: BranchId) -> &VcBranch {
        &self.branches[id.0]
    }

    /// Every branch created so far, in creation order (the master first,
    /// then children in fork order).
    pub fn branch_ids(&self) -> Vec<BranchId> {
        (0..self.branches.len()).map(BranchId).collect()
    }

    pub fn branch_mut(&mut self, id: BranchId) -> &mut VcBranch {
        &mut self.branches[id.0]
    }

    fn push(&mut self, branch: VcBranch) -> BranchId {
        let id = BranchId(self.branches.len());
        self.branches.push(branch);
        id
    }

    /// Fork a child identical to `parent`; environment, types and scopes
    /// are cloned, never shared. The child's origin is the fork point.
    fn fork(&mut self, parent: BranchId) -> BranchId {
        let mut child = self.branches[parent.0].clone();
        child.parent = Some(parent);
        child.origin = child.pc;
        self.push(child)
    }

    fn pair_mut(&mut self, a: BranchId, b: BranchId) -> (&mut VcBranch, &mut VcBranch) {
        debug_assert!(a.0 < b.0);
        let (head, tail) = self.branches.split_at_mut(b.0);
        (&mut head[a.0], &mut tail[0])
    }

    /// Reposition `id` at the entry defining `label` (which, by the
    /// forward-branching invariant, lies at or after the current pc).
    fn goto_label(&mut self, id: BranchId, label: &Label) -> Result<(), VcError> {
        let index = self.label_index(id, label)?;
        self.branches[id.0].pc = index;
        Ok(())
    }

    fn label_index(&self, id: BranchId, label: &Label) -> Result<usize, VcError> {
        self.block
            .find_label(self.branches[id.0].pc, label)
            .ok_or_else(|| VcError::internal(format!("unknown label \"{label}\""), &[]))
    }

    /// Pop the top scope if the program counter has moved past its end.
    fn departing_scope(&mut self, id: BranchId) -> Option<Scope> {
        let branch = &mut self.branches[id.0];
        let departing = branch
            .scopes
            .last()
            .map(|s| s.end < branch.pc)
            .unwrap_or(false);
        if departing {
            branch.scopes.pop()
        } else {
            None
        }
    }

    /// Merge a descendant back into `parent` at a control-flow meet. The
    /// two constraint lists share a pointer-identical prefix established
    /// before the fork; only the remainders are placed under a disjunction,
    /// keeping the solver input tight.
    fn join(&mut self, parent: BranchId, child: BranchId) {
        let (common, left, right) = {
            let p = &self.branches[parent.0].top_scope().constraints;
            let c = &self.branches[child.0].top_scope().constraints;
            let mut shared = 0;
            while shared < p.len() && shared < c.len() && Expr::ptr_eq(&p[shared], &c[shared]) {
                shared += 1;
            }
            (p[..shared].to_vec(), p[shared..].to_vec(), c[shared..].to_vec())
        };
        let joined = Expr::or(vec![Expr::and(left), Expr::and(right)]);
        let top = self.branches[parent.0].top_scope_mut();
        top.constraints = common;
        top.constraints.push(joined);
    }

    /// Walk this branch to the end of the block, transforming each bytecode
    /// through `tx`, then transform each forked child in fork order and
    /// join it back. Yields the conjunction of everything known to hold at
    /// the end of the branch.
    pub fn transform(
        &mut self,
        id: BranchId,
        tx: &mut dyn VcTransformer,
    ) -> Result<Expr, VcError> {
        let block = self.block;
        let block_size = block.size();
        let mut children: Vec<BranchId> = Vec::new();

        'walk: while self.branches[id.0].pc < block_size {
            // First, departures: pop every scope whose region ended.
            while let Some(scope) = self.departing_scope(id) {
                tx.exit_scope(&scope, &mut self.branches[id.0])?;
            }

            let pc = self.branches[id.0].pc;
            let entry = block.get(pc);
            tracing::trace!(pc, code = ?entry.code, "transforming");
            match &entry.code {
                Code::Goto { target } => {
                    self.goto_label(id, target)?;
                }
                Code::If { target, .. } => {
                    let child = self.fork(id);
                    let (false_branch, true_branch) = self.pair_mut(id, child);
                    tx.transform_if(entry, false_branch, true_branch)?;
                    self.goto_label(child, target)?;
                    children.push(child);
                }
                Code::Switch { default, branches: case_labels, .. } => {
                    let first_case = self.branches.len();
                    for _ in case_labels {
                        let case = self.fork(id);
                        children.push(case);
                    }
                    {
                        let (head, tail) = self.branches.split_at_mut(first_case);
                        tx.transform_switch(entry, &mut head[id.0], tail)?;
                    }
                    for (i, (_, label)) in case_labels.iter().enumerate() {
                        self.goto_label(BranchId(first_case + i), label)?;
                    }
                    self.goto_label(id, default)?;
                }
                Code::IfIs { operand, test, target, .. } => {
                    let operand = *operand;
                    let current = self.branches[id.0].type_of(operand)?.clone();
                    let true_type = types::intersect(&current, test);
                    let false_type = types::intersect(&current, &types::negate(test));
                    if true_type.is_void() {
                        // The taken path is infeasible; stay on the
                        // fallthrough with the narrowed type.
                        let branch = &mut self.branches[id.0];
                        let expr = branch.read(operand)?.clone();
                        branch.write(operand, expr, false_type);
                    } else if false_type.is_void() {
                        // The fallthrough is infeasible; this branch takes
                        // the jump.
                        let branch = &mut self.branches[id.0];
                        let expr = branch.read(operand)?.clone();
                        branch.write(operand, expr, true_type);
                        self.goto_label(id, target)?;
                    } else {
                        let child = self.fork(id);
                        {
                            let (false_branch, true_branch) = self.pair_mut(id, child);
                            let expr = false_branch.read(operand)?.clone();
                            false_branch.write(operand, expr.clone(), false_type);
                            true_branch.write(operand, expr, true_type);
                            tx.transform_if_is(entry, false_branch, true_branch)?;
                        }
                        self.goto_label(child, target)?;
                        children.push(child);
                    }
                }
                Code::ForAll { ty, source, index, target, modified } => {
                    let end = self.label_index(id, target)?;
                    let element = element_type(ty)
                        .map_err(|e| e.with_attributes(&entry.attributes))?;
                    let branch = &mut self.branches[id.0];
                    for &register in modified {
                        let ty = branch.type_of_or_any(register);
                        branch.invalidate(register, ty);
                    }
                    let index_var = branch.invalidate(*index, element);
                    let source_expr = branch.read(*source)?.clone();
                    branch.scopes.push(Scope {
                        kind: ScopeKind::ForAll {
                            modified: modified.clone(),
                            source: source_expr,
                            index: index_var,
                        },
                        end,
                        constraints: Vec::new(),
                        attributes: entry.attributes.clone(),
                    });
                    tx.enter_forall(entry, branch)?;
                }
                Code::Loop { target, modified } => {
                    let end = self.label_index(id, target)?;
                    let branch = &mut self.branches[id.0];
                    for &register in modified {
                        let ty = branch.type_of_or_any(register);
                        branch.invalidate(register, ty);
                    }
                    branch.scopes.push(Scope {
                        kind: ScopeKind::Loop { modified: modified.clone() },
                        end,
                        constraints: Vec::new(),
                        attributes: entry.attributes.clone(),
                    });
                    tx.enter_loop(entry, branch)?;
                }
                Code::LoopEnd { .. } => {
                    let branch = &mut self.branches[id.0];
                    let scope = branch.scopes.pop().ok_or_else(|| {
                        VcError::internal("scope stack exhausted at loop end", &entry.attributes)
                    })?;
                    match &scope.kind {
                        ScopeKind::ForAll { .. } => {
                            tx.end_forall(&scope, branch)?;
                        }
                        ScopeKind::Loop { .. } => {
                            // A plain loop's body is explored once under
                            // havocked state; the branch ends here.
                            tx.end_loop(&scope, branch)?;
                            break 'walk;
                        }
                        _ => {
                            return Err(VcError::internal(
                                "loop end without an enclosing loop scope",
                                &entry.attributes,
                            ))
                        }
                    }
                }
                Code::TryCatch { target, catches } => {
                    let end = self.label_index(id, target)?;
                    let branch = &mut self.branches[id.0];
                    branch.scopes.push(Scope {
                        kind: ScopeKind::Try { catches: catches.clone() },
                        end,
                        constraints: Vec::new(),
                        attributes: entry.attributes.clone(),
                    });
                    tx.enter_try(entry, branch)?;
                }
                Code::Assert { target } | Code::Assume { target } => {
                    let end = self.label_index(id, target)?;
                    let is_assertion = matches!(entry.code, Code::Assert { .. });
                    let branch = &mut self.branches[id.0];
                    branch.scopes.push(Scope {
                        kind: ScopeKind::AssertOrAssume { is_assertion },
                        end,
                        constraints: Vec::new(),
                        attributes: entry.attributes.clone(),
                    });
                    tx.enter_assert_or_assume(entry, branch)?;
                }
                Code::Return { .. } => {
                    tx.transform_return(entry, &mut self.branches[id.0])?;
                    self.branches[id.0].kill();
                    break 'walk;
                }
                Code::Throw { .. } => {
                    // Thrown control is the transformer's business (it may
                    // route it into an enclosing try scope); the branch
                    // simply ends without being killed.
                    tx.transform_throw(entry, &mut self.branches[id.0])?;
                    break 'walk;
                }
                Code::Fail { .. } => {
                    tx.transform_fail(entry, &mut self.branches[id.0])?;
                    self.branches[id.0].kill();
                    break 'walk;
                }
                Code::Label { .. } | Code::Nop => {}
                Code::Debug { .. } => {
                    tx.transform_debug(entry, &mut self.branches[id.0])?;
                }
                Code::Const { .. } => {
                    tx.transform_const(entry, &mut self.branches[id.0])?;
                }
                Code::Invoke { .. } => {
                    tx.transform_invoke(entry, &mut self.branches[id.0])?;
                }
                Code::IndirectInvoke { .. } => {
                    tx.transform_indirect_invoke(entry, &mut self.branches[id.0])?;
                }
                Code::Assign { .. }
                | Code::Convert { .. }
                | Code::Dereference { .. }
                | Code::FieldLoad { .. }
                | Code::Invert { .. }
                | Code::LengthOf { .. }
                | Code::Move { .. }
                | Code::NewObject { .. }
                | Code::Not { .. }
                | Code::TupleLoad { .. }
                | Code::UnaryArith { .. } => {
                    tx.transform_unary_assign(entry, &mut self.branches[id.0])?;
                }
                Code::BinaryArith { .. }
                | Code::IndexOf { .. }
                | Code::ListOp { .. }
                | Code::SetOp { .. }
                | Code::StringOp { .. } => {
                    tx.transform_binary_assign(entry, &mut self.branches[id.0])?;
                }
                Code::NewList { .. }
                | Code::NewSet { .. }
                | Code::NewMap { .. }
                | Code::NewRecord { .. }
                | Code::NewTuple { .. }
                | Code::SubList { .. }
                | Code::SubString { .. }
                | Code::Update { .. } => {
                    tx.transform_nary_assign(entry, &mut self.branches[id.0])?;
                }
            }

            self.branches[id.0].pc += 1;
        }

        // Transform the forked children in fork order, merging each back.
        for child in children {
            self.transform(child, tx)?;
            self.join(id, child);
        }

        Ok(self.branches[id.0].constraints_expr())
    }
}

/// The type bound to a `forall` index variable iterating the given
/// collection type.
fn element_type(collection: &Type) -> Result<Type, VcError> {
    match collection {
        Type::List(e) | Type::Set(e) => Ok((**e).clone()),
        Type::Map(k, v) => Ok(Type::tuple(vec![(**k).clone(), (**v).clone()])),
        Type::Str => Ok(Type::Char),
        other => Err(VcError::TypeInconsistency(format!(
            "forall over non-collection type {other:?}"
        ))),
    }
}

impl VcError {
    fn with_attributes(self, attributes: &[Attribute]) -> VcError {
        match self {
            VcError::TypeInconsistency(message) if !attributes.is_empty() => {
                VcError::Internal { message, attributes: attributes.to_vec() }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyvc_ir::codes::Comparator;
    use wyvc_ir::constant::Constant;
    use wyvc_ir::name::QualifiedName;

    /// A transformer that tracks straight-line visits and labels branch
    /// sides at conditionals.
    #[derive(Default)]
    struct Tracing {
        visited: Vec<String>,
    }

    impl VcTransformer for Tracing {
        fn transform_unary_assign(
            &mut self,
            entry: &wyvc_ir::block::Entry,
            _branch: &mut VcBranch,
        ) -> Result<(), VcError> {
            self.visited.push(format!("{:?}", entry.code));
            Ok(())
        }

        fn transform_binary_assign(
            &mut self,
            _entry: &wyvc_ir::block::Entry,
            _branch: &mut VcBranch,
        ) -> Result<(), VcError> {
            self.visited.push("binary".to_string());
            Ok(())
        }

        fn transform_nary_assign(
            &mut self,
            _entry: &wyvc_ir::block::Entry,
            _branch: &mut VcBranch,
        ) -> Result<(), VcError> {
            Ok(())
        }

        fn transform_const(
            &mut self,
            entry: &wyvc_ir::block::Entry,
            branch: &mut VcBranch,
        ) -> Result<(), VcError> {
            if let Code::Const { target, constant } = &entry.code {
                let expr = match constant {
                    Constant::Integer(i) => Expr::int(i.clone()),
                    _ => Expr::null(),
                };
                branch.write(*target, expr, constant.type_of());
            }
            Ok(())
        }

        fn transform_invoke(
            &mut self,
            _entry: &wyvc_ir::block::Entry,
            _branch: &mut VcBranch,
        ) -> Result<(), VcError> {
            Ok(())
        }

        fn transform_indirect_invoke(
            &mut self,
            _entry: &wyvc_ir::block::Entry,
            _branch: &mut VcBranch,
        ) -> Result<(), VcError> {
            Ok(())
        }

        fn transform_if(
            &mut self,
            _entry: &wyvc_ir::block::Entry,
            false_branch: &mut VcBranch,
            true_branch: &mut VcBranch,
        ) -> Result<(), VcError> {
            false_branch.add(Expr::var("not-taken"));
            true_branch.add(Expr::var("taken"));
            Ok(())
        }

        fn transform_switch(
            &mut self,
            _entry: &wyvc_ir::block::Entry,
            _default_branch: &mut VcBranch,
            _cases: &mut [VcBranch],
        ) -> Result<(), VcError> {
            Ok(())
        }

        fn transform_return(
            &mut self,
            _entry: &wyvc_ir::block::Entry,
            _branch: &mut VcBranch,
        ) -> Result<(), VcError> {
            self.visited.push("return".to_string());
            Ok(())
        }

        fn transform_fail(
            &mut self,
            _entry: &wyvc_ir::block::Entry,
            _branch: &mut VcBranch,
        ) -> Result<(), VcError> {
            self.visited.push("fail".to_string());
            Ok(())
        }
    }

    fn if_block() -> Block {
        let mut block = Block::new();
        block.push(Code::Const { target: 1, constant: Constant::integer(0) });
        block.push(Code::If {
            ty: Type::Int,
            left: 0,
            right: 1,
            cmp: Comparator::Ge,
            target: "exit".to_string(),
        });
        block.push(Code::Fail { message: "negative".to_string() });
        block.push(Code::Label { label: "exit".to_string() });
        block.push(Code::Return { operand: None });
        block
    }

    #[test]
    fn master_initializes_parameters() {
        let block = if_block();
        let decl = Arc::new(FunctionOrMethodDecl {
            name: "f".to_string(),
            ty: Type::function(vec![Type::Int], Type::Void, Type::Void),
            cases: vec![],
        });
        let mut arena = VcArena::new(&block);
        let master = arena.master(Some(decl));
        let branch = arena.branch(master);
        assert_eq!(branch.read(0).unwrap(), &Expr::var("r0"));
        assert_eq!(branch.type_of(0).unwrap(), &Type::Int);
        assert_eq!(branch.pc(), 0);
        assert_eq!(branch.origin(), 0);
    }

    #[test]
    fn kill_is_idempotent() {
        let block = if_block();
        let mut arena = VcArena::new(&block);
        let master = arena.master(None);
        let branch = arena.branch_mut(master);
        branch.add(Expr::var("p"));
        branch.kill();
        branch.kill();
        assert_eq!(branch.top_scope().constraints.len(), 1);
        assert!(branch.top_scope().constraints[0].is_false());
        assert!(!branch.is_live());
    }

    #[test]
    fn fork_and_join_share_prefix() {
        // Scenario: [p, q] forks; child adds r, parent adds s; the join is
        // [p, q, Or(s, r)] with the common prefix pointer-identical.
        let block = if_block();
        let mut arena = VcArena::new(&block);
        let master = arena.master(None);
        let p = Expr::var("p");
        let q = Expr::var("q");
        arena.branch_mut(master).add(p.clone());
        arena.branch_mut(master).add(q.clone());

        let child = arena.fork(master);
        arena.branch_mut(child).add(Expr::var("r"));
        arena.branch_mut(master).add(Expr::var("s"));
        arena.join(master, child);

        let constraints = &arena.branch(master).top_scope().constraints;
        assert_eq!(constraints.len(), 3);
        assert!(Expr::ptr_eq(&constraints[0], &p));
        assert!(Expr::ptr_eq(&constraints[1], &q));
        match constraints[2].node() {
            wyvc_logic::ExprNode::Or(sides) => {
                assert_eq!(sides.len(), 2);
                assert_eq!(sides[0], Expr::var("s"));
                assert_eq!(sides[1], Expr::var("r"));
            }
            other => panic!("expected or, got {other:?}"),
        }
    }

    #[test]
    fn join_of_identical_paths_restores_prefix() {
        let block = if_block();
        let mut arena = VcArena::new(&block);
        let master = arena.master(None);
        let p = Expr::var("p");
        arena.branch_mut(master).add(p.clone());
        let child = arena.fork(master);
        arena.join(master, child);
        let constraints = &arena.branch(master).top_scope().constraints;
        // Nothing diverged, so the prefix survives plus an empty join.
        assert!(Expr::ptr_eq(&constraints[0], &p));
    }

    #[test]
    fn transform_explores_both_sides_of_if() {
        let block = if_block();
        let decl = Arc::new(FunctionOrMethodDecl {
            name: "f".to_string(),
            ty: Type::function(vec![Type::Int], Type::Void, Type::Void),
            cases: vec![],
        });
        let mut arena = VcArena::new(&block);
        let master = arena.master(Some(decl));
        let mut tx = Tracing::default();
        arena.transform(master, &mut tx).unwrap();
        // The fallthrough reached the fail, the forked side the return, and
        // both ended killed.
        assert_eq!(arena.branches.len(), 2);
        assert!(tx.visited.contains(&"fail".to_string()));
        assert!(tx.visited.contains(&"return".to_string()));
        assert!(!arena.branch(master).is_live());
    }

    #[test]
    fn if_is_narrowing_retypes_both_sides() {
        // register 0: int|null, test against null
        let mut block = Block::new();
        block.push(Code::IfIs {
            ty: Type::union(vec![Type::Int, Type::Null]).unwrap(),
            operand: 0,
            test: Type::Null,
            target: "isnull".to_string(),
        });
        block.push(Code::Return { operand: None });
        block.push(Code::Label { label: "isnull".to_string() });
        block.push(Code::Return { operand: None });

        let decl = Arc::new(FunctionOrMethodDecl {
            name: "f".to_string(),
            ty: Type::function(
                vec![Type::union(vec![Type::Int, Type::Null]).unwrap()],
                Type::Void,
                Type::Void,
            ),
            cases: vec![],
        });
        let mut arena = VcArena::new(&block);
        let master = arena.master(Some(decl));
        let mut tx = Tracing::default();
        arena.transform(master, &mut tx).unwrap();

        // After transform, the master (fallthrough) saw int; the forked
        // child saw null.
        assert_eq!(arena.branch(master).type_of(0).unwrap(), &Type::Int);
        let child = BranchId(1);
        assert_eq!(arena.branch(child).type_of(0).unwrap(), &Type::Null);
        assert_eq!(arena.branch(child).parent(), Some(master));
        assert_eq!(arena.branch(child).origin(), 0);
    }

    #[test]
    fn infeasible_type_test_does_not_fork() {
        // register 0: int, test against null -- the taken side is void.
        let mut block = Block::new();
        block.push(Code::IfIs {
            ty: Type::Int,
            operand: 0,
            test: Type::Null,
            target: "isnull".to_string(),
        });
        block.push(Code::Return { operand: None });
        block.push(Code::Label { label: "isnull".to_string() });
        block.push(Code::Return { operand: None });

        let decl = Arc::new(FunctionOrMethodDecl {
            name: "f".to_string(),
            ty: Type::function(vec![Type::Int], Type::Void, Type::Void),
            cases: vec![],
        });
        let mut arena = VcArena::new(&block);
        let master = arena.master(Some(decl));
        let mut tx = Tracing::default();
        arena.transform(master, &mut tx).unwrap();
        // Only the master exists; no fork happened.
        assert_eq!(arena.branches.len(), 1);
    }

    #[test]
    fn forall_pushes_scope_and_invalidates_index() {
        let mut block = Block::new();
        block.push(Code::ForAll {
            ty: Type::set(Type::Int),
            source: 0,
            index: 1,
            target: "end".to_string(),
            modified: vec![2],
        });
        block.push(Code::LoopEnd { label: "end".to_string() });
        block.push(Code::Return { operand: None });

        let decl = Arc::new(FunctionOrMethodDecl {
            name: "f".to_string(),
            ty: Type::function(vec![Type::set(Type::Int)], Type::Void, Type::Void),
            cases: vec![],
        });
        let mut arena = VcArena::new(&block);
        let master = arena.master(Some(decl));
        let mut tx = Tracing::default();
        arena.transform(master, &mut tx).unwrap();
        // The index skolem is named by register and pc.
        let branch = arena.branch(master);
        assert_eq!(branch.read(1).unwrap(), &Expr::var("r1_0"));
        assert_eq!(branch.type_of(1).unwrap(), &Type::Int);
    }

    #[test]
    fn scope_departure_pops_in_order() {
        // An assert region the branch falls straight through.
        let mut block = Block::new();
        block.push(Code::Assert { target: "out".to_string() });
        block.push(Code::Nop);
        block.push(Code::Label { label: "out".to_string() });
        block.push(Code::Nop);
        block.push(Code::Return { operand: None });

        let mut arena = VcArena::new(&block);
        let master = arena.master(None);
        let mut tx = Tracing::default();
        arena.transform(master, &mut tx).unwrap();
        // Only the entry scope remains.
        assert_eq!(arena.branch(master).scopes.len(), 1);
    }

    #[test]
    fn invoke_dispatches_to_invoke_handler() {
        let mut block = Block::new();
        block.push(Code::Invoke {
            ty: Type::function(vec![Type::Int], Type::Int, Type::Void),
            target: Some(1),
            operands: vec![0],
            name: QualifiedName::new(wyvc_ir::name::PathId::from_segments(["m"]), "g"),
        });
        block.push(Code::Return { operand: None });
        let mut arena = VcArena::new(&block);
        let master = arena.master(None);
        let mut tx = Tracing::default();
        assert!(arena.transform(master, &mut tx).is_ok());
    }
}
