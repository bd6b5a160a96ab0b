//! Temporal induction driver (C6)
//!
//! Searches for the smallest induction depth `k` at which the following
//! closes: assuming the module-wide and user obligations hold at `k`
//! consecutive, freely-chosen (not necessarily reachable) arbitrary states
//! linked by the transition relation, do they also hold one step further?
//! Unlike BMC, these frames are never anchored to an initial state — the
//! base case (`k` itself reachable from a real initial state) is the BMC
//! driver's job, run separately by the session.
//!
//! Depth is searched upward from `cfg.skip_steps` (induction's `-t` reuses
//! BMC's horizon flag: skip/step/num map onto the depths actually tried,
//! counted the same way as BMC's windowing, just without an initial-state
//! anchor) up to `cfg.num_steps`, widened by `cfg.step_size` per attempt so
//! `-t S:K:N` paces an induction search exactly like it paces BMC.

#![allow(missing_docs)]

use tracing::info;

use crate::config::RunConfig;
use crate::constraint::ConstraintDb;
use crate::driver::{
    assert_assumptions, commit_window, negated_window_obligation, require_definite, DriverError,
    FailReason, FailReport, RunOutcome,
};
use crate::frame::FrameTable;
use crate::freevals;
use crate::locator;
use crate::modinfo::ModuleInfo;
use crate::predicates;
use crate::solver::{with_scope, SmtBackend};
use crate::witness::WitnessWriter;

/// Declare an unanchored frame: no initial predicate `i` is ever asserted
/// (every state in an induction chain is an arbitrary element of the
/// transition relation's domain, not a reachable one), but `¬is` is —
/// induction frames must still be forced away from the initial-marker tag,
/// the same as every non-initial BMC frame, or the solver is free to pick an
/// initial state for a hypothesis/goal frame and weaken the inductive step.
/// Besides that: well-formedness, hierarchy, assumptions, and — for every
/// frame but the first in the chain — the transition from its predecessor.
fn declare_unanchored<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    frames: &mut FrameTable,
    step: u32,
    prev: Option<u32>,
) -> Result<(), DriverError> {
    frames.declare(step)?;
    smt.write(&predicates::declare_fun(module, step))?;
    smt.write(&predicates::well_formed(module, step))?;
    smt.write(&predicates::hierarchy(module, step))?;
    smt.write(&predicates::not_initial(module, step))?;
    assert_assumptions(smt, modinfo, module, db, step)?;
    if let Some(p) = prev {
        smt.write(&predicates::transition(module, p, step))?;
    }
    frames.mark_constrained(step)?;
    Ok(())
}

/// Attempt one induction depth: a chain of `depth + 1` unanchored frames
/// `0..=depth`, assuming the obligation holds at every frame but the last and
/// checking whether it's forced to hold at the last one too. Returns
/// `Ok(true)` when induction closes at this depth (the assumption-and-negated
/// goal combination is unsatisfiable), `Ok(false)` when the solver finds a
/// counterexample to the inductive step.
#[allow(clippy::too_many_arguments)]
fn try_depth<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    frames: &mut FrameTable,
    depth: u32,
    witness: Option<&WitnessWriter<'_>>,
) -> Result<Option<FailReport>, DriverError> {
    let mut prev = None;
    for step in 0..=depth {
        declare_unanchored(smt, modinfo, module, db, frames, step, prev)?;
        prev = Some(step);
    }

    let hypotheses: Vec<u32> = (0..depth).collect();
    commit_window(smt, modinfo, module, db, &hypotheses)?;
    for &i in &hypotheses {
        frames.mark_committed(i)?;
    }

    let goal = negated_window_obligation(modinfo, module, db, &[depth])?;
    let mut fail = None;
    with_scope(smt, 1, |smt| -> Result<(), DriverError> {
        smt.write(&format!("(assert {goal})"))?;
        if require_definite(smt.check_sat()?)? {
            let free_values =
                freevals::report(smt, modinfo, module, &predicates::state_var(depth))?;
            let hierarchical_asserts = locator::locate_failing_asserts(
                smt,
                modinfo,
                module,
                &predicates::state_var(depth),
            )?;
            let user_asserts = locator::locate_user_asserts(smt, modinfo, module, db, depth)?;
            if let Some(witness) = witness {
                witness.write_trace(smt, modinfo, module, 0, depth + 1, None)?;
            }
            fail = Some(FailReport {
                window: (0, depth),
                reason: FailReason::Induction,
                free_values,
                hierarchical_asserts,
                user_asserts,
            });
        }
        Ok(())
    })?;
    if fail.is_none() {
        frames.mark_committed(depth)?;
    }
    Ok(fail)
}

/// Run the induction search. Depths `cfg.skip_steps, cfg.skip_steps +
/// cfg.step_size, ...` are tried up to `cfg.num_steps`; the search stops at
/// the first depth that closes (`Ok(Pass)`), or reports the deepest
/// counterexample found once `cfg.num_steps` is exhausted without closing
/// (`Ok(Fail(..))`). Each attempted depth gets its own fresh `FrameTable` and
/// solver scope via push/pop, since an unclosed depth's frames must not leak
/// into the next attempt. The witness is only materialized for the final
/// attempt (the one actually reported), never for an intermediate failing
/// depth that's about to be retried wider.
pub fn run<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    cfg: &RunConfig,
    witness: &WitnessWriter<'_>,
) -> Result<RunOutcome, DriverError> {
    let mut depth = cfg.skip_steps;

    loop {
        let mut frames = FrameTable::new();
        let is_final_attempt = depth >= cfg.num_steps;
        info!(depth, "trying induction depth");
        let outcome = with_scope(smt, 1, |smt| {
            try_depth(smt, modinfo, module, db, &mut frames, depth, is_final_attempt.then_some(witness))
        })?;

        match outcome {
            None => {
                info!(depth, "induction closed");
                return Ok(RunOutcome::Pass);
            }
            Some(report) if is_final_attempt => return Ok(RunOutcome::Fail(report)),
            Some(_) => {}
        }

        depth += cfg.step_size;
    }
}
