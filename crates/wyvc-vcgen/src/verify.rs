//! The per-function verification driver.
//!
//! For each function or method case: assume the precondition over the
//! parameter variables, walk the body with the [`VcGenerator`], then submit
//! each emitted obligation's negation to the checker. `Unsat` proves the
//! obligation; `Sat` is a verification failure carrying the counterexample;
//! `Unknown` is reported distinctly. Failures are collected per function
//! and never abort generation for the others.

use std::sync::Arc;

use wyvc_logic::Expr;

use wyvc_ir::block::Attribute;
use wyvc_ir::module::{Case, Declaration, FunctionOrMethodDecl, WyilFile};
use wyvc_ir::types::Type;
use wyvc_solver::{Model, SolverBackend, SolverResult};

use crate::branch::VcArena;
use crate::error::VcError;
use crate::vcgen::{collect_fail_condition, FunctionRegistry, Obligation, VcGenerator, VcKind};

/// How one obligation fared against the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObligationStatus {
    /// The property was proved.
    Valid,
    /// The property does not hold; the model, when present, is the
    /// counterexample.
    Failed(Option<Model>),
    /// The checker gave up, with its reason.
    Unknown(String),
}

/// One checked obligation with its report metadata.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub description: String,
    pub kind: VcKind,
    pub status: ObligationStatus,
    /// Location attributes preserved from the originating entry.
    pub attributes: Vec<Attribute>,
}

/// All outcomes for one function or method.
#[derive(Debug, Clone)]
pub struct FunctionReport {
    pub name: String,
    pub outcomes: Vec<VerificationOutcome>,
}

impl FunctionReport {
    /// Whether every obligation was proved.
    pub fn is_verified(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status == ObligationStatus::Valid)
    }
}

/// Verify every function and method in the module, returning one report
/// per declaration.
pub fn verify_module(
    file: &WyilFile,
    registry: &dyn FunctionRegistry,
    solver: &dyn SolverBackend,
) -> Result<Vec<FunctionReport>, VcError> {
    let mut reports = Vec::new();
    for declaration in file.declarations() {
        let Declaration::FunctionOrMethod(decl) = declaration else {
            continue;
        };
        let mut outcomes = Vec::new();
        for case in &decl.cases {
            for obligation in generate_case_obligations(decl, case, registry)? {
                let status = check_obligation(&obligation, solver)?;
                outcomes.push(VerificationOutcome {
                    description: obligation.description,
                    kind: obligation.kind,
                    status,
                    attributes: obligation.attributes,
                });
            }
        }
        tracing::info!(function = %decl.name, obligations = outcomes.len(),
            verified = outcomes.iter().all(|o| o.status == ObligationStatus::Valid),
            "checked function");
        reports.push(FunctionReport { name: decl.name.clone(), outcomes });
    }
    Ok(reports)
}

/// Generate the obligations for one case of a declaration.
pub fn generate_case_obligations(
    declaration: &FunctionOrMethodDecl,
    case: &Case,
    registry: &dyn FunctionRegistry,
) -> Result<Vec<Obligation>, VcError> {
    tracing::info!(function = %declaration.name, "generating verification conditions");
    let mut arena = VcArena::new(&case.body);
    let master = arena.master(Some(Arc::new(declaration.clone())));

    // The precondition is an assumed fact over the parameter variables.
    if let Some(precondition) = &case.precondition {
        let inputs: Vec<(Expr, Type)> = declaration
            .params()
            .iter()
            .enumerate()
            .map(|(i, ty)| (Expr::var(format!("r{i}")), ty.clone()))
            .collect();
        if let Some(failed) = collect_fail_condition(precondition, &inputs)? {
            arena.branch_mut(master).add(Expr::not(failed));
        }
    }

    let mut tx = VcGenerator::for_function(registry, declaration, case);
    arena.transform(master, &mut tx)?;
    Ok(tx.into_obligations())
}

fn check_obligation(
    obligation: &Obligation,
    solver: &dyn SolverBackend,
) -> Result<ObligationStatus, VcError> {
    // Valid iff the negation is unsatisfiable.
    match solver.check(&Expr::not(obligation.expr.clone()))? {
        SolverResult::Unsat => Ok(ObligationStatus::Valid),
        SolverResult::Sat(model) => Ok(ObligationStatus::Failed(model)),
        SolverResult::Unknown(reason) => Ok(ObligationStatus::Unknown(reason)),
    }
}
