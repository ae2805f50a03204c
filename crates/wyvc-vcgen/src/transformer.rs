//! The per-opcode translation interface.
//!
//! A [`VcTransformer`] turns bytecodes into logical constraints as the
//! branch engine walks a block. Each handler receives the [`Entry`] being
//! executed (code plus attributes, so obligations can carry source
//! locations) and the branch (or branches, at forks) it may read, write and
//! constrain. Scope hooks fire when scoped regions are entered, departed,
//! or terminated.
//!
//! The engine is language-agnostic: different transformers target different
//! logics over the same traversal.

use wyvc_ir::block::Entry;

use crate::branch::{Scope, VcBranch};
use crate::error::VcError;

pub trait VcTransformer {
    // === Straight-line opcode classes ===

    /// `assign`, `convert`, `dereference`, `fieldload`, `invert`,
    /// `lengthof`, `move`, `newobject`, `not`, `tupleload`, unary
    /// arithmetic.
    fn transform_unary_assign(&mut self, entry: &Entry, branch: &mut VcBranch)
        -> Result<(), VcError>;

    /// Binary arithmetic, `indexof`, list/set/string operators.
    fn transform_binary_assign(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError>;

    /// Construction opcodes, `sublist`, `substring`, `update`.
    fn transform_nary_assign(&mut self, entry: &Entry, branch: &mut VcBranch)
        -> Result<(), VcError>;

    /// `const`.
    fn transform_const(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError>;

    /// `debug`. No verification effect by default.
    fn transform_debug(&mut self, _entry: &Entry, _branch: &mut VcBranch) -> Result<(), VcError> {
        Ok(())
    }

    /// Direct invocation: contract obligations and havocking of the target.
    fn transform_invoke(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError>;

    /// Indirect invocation through a function-valued register.
    fn transform_indirect_invoke(
        &mut self,
        entry: &Entry,
        branch: &mut VcBranch,
    ) -> Result<(), VcError>;

    // === Control flow ===

    /// Conditional branch. The first branch stays on the fallthrough and
    /// takes the negated condition; the second jumps to the target and
    /// takes the condition.
    fn transform_if(
        &mut self,
        entry: &Entry,
        false_branch: &mut VcBranch,
        true_branch: &mut VcBranch,
    ) -> Result<(), VcError>;

    /// Multi-way dispatch. `cases` aligns with the opcode's case list; the
    /// default branch takes the negation of every case guard.
    fn transform_switch(
        &mut self,
        entry: &Entry,
        default_branch: &mut VcBranch,
        cases: &mut [VcBranch],
    ) -> Result<(), VcError>;

    /// Runtime type test, called only when both outcomes are feasible and a
    /// fork occurred. Register retyping has already been applied by the
    /// engine on both sides.
    fn transform_if_is(
        &mut self,
        _entry: &Entry,
        _false_branch: &mut VcBranch,
        _true_branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        Ok(())
    }

    /// `return`; the engine kills the branch afterwards.
    fn transform_return(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError>;

    /// `throw`; the engine terminates (but does not kill) the branch.
    fn transform_throw(&mut self, _entry: &Entry, _branch: &mut VcBranch) -> Result<(), VcError> {
        Ok(())
    }

    /// `fail`; proves the path unreachable. The engine kills the branch
    /// afterwards.
    fn transform_fail(&mut self, entry: &Entry, branch: &mut VcBranch) -> Result<(), VcError>;

    // === Scope entry hooks (the scope has been pushed) ===

    fn enter_loop(&mut self, _entry: &Entry, _branch: &mut VcBranch) -> Result<(), VcError> {
        Ok(())
    }

    fn enter_forall(&mut self, _entry: &Entry, _branch: &mut VcBranch) -> Result<(), VcError> {
        Ok(())
    }

    fn enter_try(&mut self, _entry: &Entry, _branch: &mut VcBranch) -> Result<(), VcError> {
        Ok(())
    }

    fn enter_assert_or_assume(
        &mut self,
        _entry: &Entry,
        _branch: &mut VcBranch,
    ) -> Result<(), VcError> {
        Ok(())
    }

    // === Scope departure hooks (the scope has been popped) ===

    /// The program counter crossed a scope's end.
    fn exit_scope(&mut self, _scope: &Scope, _branch: &mut VcBranch) -> Result<(), VcError> {
        Ok(())
    }

    /// A `loop-end` terminated a `forall` region; the branch continues.
    fn end_forall(&mut self, _scope: &Scope, _branch: &mut VcBranch) -> Result<(), VcError> {
        Ok(())
    }

    /// A `loop-end` terminated a plain loop; the branch ends here.
    fn end_loop(&mut self, _scope: &Scope, _branch: &mut VcBranch) -> Result<(), VcError> {
        Ok(())
    }
}
