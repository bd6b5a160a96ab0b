//! Shared driver infrastructure
//!
//! `bmc` and `induction` share three things: how a window's obligation gets
//! turned into a single negated solver expression, how a window's obligations
//! get "committed" (asserted for real once a check has passed), and the
//! shape of what comes back on failure. Centralized here so the two drivers
//! don't duplicate netref-resolution plumbing.

#![allow(missing_docs)]

use crate::constraint::{ConstraintDb, StepKey};
use crate::frame::FrameError;
use crate::freevals::FreeValue;
use crate::locator::{LocatedAssert, LocatedUserAssert};
use crate::modinfo::{ModInfoError, ModuleInfo};
use crate::netref::{self, NetrefError};
use crate::predicates;
use crate::solver::{SatResult, SolverError};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Netref(#[from] NetrefError),
    #[error(transparent)]
    ModInfo(#[from] ModInfoError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("no top module available (pass -m or ensure the input file declares one)")]
    NoTopModule,
    #[error("failed to write {path:?}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

/// What a driver run produced, distinct from an `Err` (which means the
/// driver itself malfunctioned, not that verification failed).
#[derive(Debug)]
pub enum RunOutcome {
    Pass,
    Fail(FailReport),
}

/// Why an obligation failed, and everything needed to report it.
#[derive(Debug, Default)]
pub struct FailReport {
    /// Inclusive window of steps the failure pertains to.
    pub window: (u32, u32),
    pub reason: FailReason,
    pub free_values: Vec<FreeValue>,
    pub hierarchical_asserts: Vec<LocatedAssert>,
    pub user_asserts: Vec<LocatedUserAssert>,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FailReason {
    #[default]
    Obligation,
    FinalState,
    Induction,
    NoSolution,
}

/// Resolve every netref in `constraints` against `home_step`, returning the
/// bare (unwrapped) solver expressions in order.
pub fn resolve_user_exprs(
    modinfo: &ModuleInfo,
    module: &str,
    constraints: &[crate::constraint::Constraint],
    home_step: u32,
) -> Result<Vec<String>, DriverError> {
    constraints
        .iter()
        .map(|c| {
            netref::resolve_expr(&c.expr, home_step, |step, path| {
                modinfo
                    .net_expr(module, &predicates::state_var(step), path)
                    .map_err(|e| NetrefError::UnknownNet { step, path: e.to_string() })
            })
            .map_err(DriverError::from)
        })
        .collect()
}

/// Assert the per-step assumption conjunction (§3: every declared frame must
/// have its assumptions asserted before any obligation referencing it).
pub fn assert_assumptions<S: crate::solver::SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    step: u32,
) -> Result<(), DriverError> {
    for expr in resolve_user_exprs(modinfo, module, db.assumes_at(StepKey::Step(step)), step)? {
        smt.write(&format!("(assert {expr})"))?;
    }
    Ok(())
}

/// Assert, outside any push scope, that every step in `steps` satisfies the
/// module-wide assert conjunction and its own user asserts (§4.5 step 5 /
/// gentrace's unconditional-assert form).
pub fn commit_window<S: crate::solver::SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    steps: &[u32],
) -> Result<(), DriverError> {
    for &i in steps {
        smt.write(&predicates::assert_all(module, i))?;
        for expr in resolve_user_exprs(modinfo, module, db.asserts_at(StepKey::Step(i)), i)? {
            smt.write(&format!("(assert {expr})"))?;
        }
    }
    Ok(())
}

fn negate_conjunction(atoms: &[String]) -> String {
    match atoms {
        [] => "false".to_string(),
        [one] => format!("(not {one})"),
        many => format!("(not (and {}))", many.join(" ")),
    }
}

/// Build `(not (and a(s_i) ∧ user-asserts(i) for i in steps))`.
pub fn negated_window_obligation(
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    steps: &[u32],
) -> Result<String, DriverError> {
    let mut atoms = Vec::new();
    for &i in steps {
        atoms.push(predicates::assert_all_atom(module, i));
        atoms.extend(resolve_user_exprs(modinfo, module, db.asserts_at(StepKey::Step(i)), i)?);
    }
    Ok(negate_conjunction(&atoms))
}

/// Build the negated final-state obligation at step `i` (no module-wide
/// predicate: final-state obligations are purely user-supplied, §4.5 step 6).
pub fn negated_final_obligation(
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    step: u32,
) -> Result<String, DriverError> {
    let atoms = resolve_user_exprs(modinfo, module, db.asserts_at(StepKey::Final(step)), step)?;
    Ok(negate_conjunction(&atoms))
}

/// Assert the final-state assumption conjunction at `step`.
pub fn assert_final_assumptions<S: crate::solver::SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    step: u32,
) -> Result<(), DriverError> {
    for expr in resolve_user_exprs(modinfo, module, db.assumes_at(StepKey::Final(step)), step)? {
        smt.write(&format!("(assert {expr})"))?;
    }
    Ok(())
}

/// `check_sat` only tells a driver anything when the answer is definite.
/// `unknown` means the solver gave up, which the reference tool treats as
/// fatal rather than silently falling through to either branch.
pub fn require_definite(sat: SatResult) -> Result<bool, DriverError> {
    match sat {
        SatResult::Sat => Ok(true),
        SatResult::Unsat => Ok(false),
        SatResult::Unknown => {
            Err(DriverError::Solver(SolverError::UnexpectedOutput("unknown".to_string())))
        }
    }
}
