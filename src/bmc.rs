//! Bounded-model-checking driver (C5)
//!
//! Unrolls frames forward from step 0 in windows of `step_size`, checking
//! each window's obligation (module-wide asserts plus user asserts) by
//! asserting its negation inside a push/pop scope and looking for `sat`. In
//! gentrace mode the negation is skipped entirely and obligations are
//! asserted unconditionally; the driver instead asks for one witness at the
//! horizon (and, with `--dump-all`, one after every window).

#![allow(missing_docs)]

use tracing::{debug, info};

use crate::config::{Mode, RunConfig};
use crate::constraint::ConstraintDb;
use crate::driver::{
    assert_assumptions, assert_final_assumptions, commit_window, negated_final_obligation,
    negated_window_obligation, require_definite, DriverError, FailReason, FailReport, RunOutcome,
};
use crate::frame::FrameTable;
use crate::freevals;
use crate::locator;
use crate::modinfo::ModuleInfo;
use crate::predicates;
use crate::solver::{with_scope, SmtBackend};
use crate::witness::WitnessWriter;

/// Declare `s_step` and assert everything the frame invariant (§3) requires
/// of it before any obligation may reference it: well-formedness, hierarchy
/// consistency, the per-step assumption conjunction, and either the initial
/// predicate (for `step == 0`) or the transition from `prev`.
fn declare_frame<S: SmtBackend>(
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
    assert_assumptions(smt, modinfo, module, db, step)?;
    match prev {
        None => {
            smt.write(&predicates::initial(module, step))?;
            smt.write(&predicates::is_initial(module, step))?;
        }
        Some(p) => {
            smt.write(&predicates::transition(module, p, step))?;
            smt.write(&predicates::not_initial(module, step))?;
        }
    }
    frames.mark_constrained(step)?;
    Ok(())
}

/// Run the BMC (or gentrace) loop to completion. Returns `Ok(Pass)` when the
/// horizon is exhausted with no obligation violated (BMC) or a full witness
/// was produced (gentrace); `Ok(Fail(..))` on the first counterexample or
/// gentrace unsatisfiability; `Err` only for driver malfunctions (solver
/// I/O, unresolvable netrefs, missing metadata).
pub fn run<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    cfg: &RunConfig,
    frames: &mut FrameTable,
    witness: &WitnessWriter<'_>,
) -> Result<RunOutcome, DriverError> {
    let gentrace = matches!(cfg.mode, Mode::Gentrace);
    let mut step = 0u32;
    let mut prev: Option<u32> = None;
    let mut dump_index = 0u32;

    while step < cfg.num_steps {
        declare_frame(smt, modinfo, module, db, frames, step, prev)?;

        if step < cfg.skip_steps {
            if let Some(assume_from) = cfg.assume_skipped {
                if step >= assume_from {
                    commit_window(smt, modinfo, module, db, &[step])?;
                    frames.mark_committed(step)?;
                }
            }
            debug!(step, "skipped step");
            prev = Some(step);
            step += 1;
            continue;
        }

        let mut last = step;
        for j in 1..cfg.step_size {
            let s = step + j;
            if s >= cfg.num_steps {
                break;
            }
            declare_frame(smt, modinfo, module, db, frames, s, Some(last))?;
            last = s;
        }
        let window: Vec<u32> = (step..=last).collect();
        info!(step, last_check_step = last, "checking window");

        if !gentrace && !cfg.final_only {
            let obligation = negated_window_obligation(modinfo, module, db, &window)?;
            let mut fail: Option<FailReport> = None;
            with_scope(smt, 1, |smt| -> Result<(), DriverError> {
                smt.write(&format!("(assert {obligation})"))?;
                if require_definite(smt.check_sat()?)? {
                    let free_values =
                        freevals::report(smt, modinfo, module, &predicates::state_var(step))?;
                    let mut hierarchical_asserts = Vec::new();
                    let mut user_asserts = Vec::new();
                    for &i in &window {
                        hierarchical_asserts.extend(locator::locate_failing_asserts(
                            smt,
                            modinfo,
                            module,
                            &predicates::state_var(i),
                        )?);
                        user_asserts
                            .extend(locator::locate_user_asserts(smt, modinfo, module, db, i)?);
                    }
                    witness.write_trace(smt, modinfo, module, 0, last + 1, None)?;
                    fail = Some(FailReport {
                        window: (step, last),
                        reason: FailReason::Obligation,
                        free_values,
                        hierarchical_asserts,
                        user_asserts,
                    });
                }
                Ok(())
            })?;
            if let Some(report) = fail {
                return Ok(RunOutcome::Fail(report));
            }
        }

        commit_window(smt, modinfo, module, db, &window)?;
        for &i in &window {
            frames.mark_committed(i)?;
        }

        if !gentrace {
            if let Some(final_start) = db.final_start {
                for &i in &window {
                    if i < final_start {
                        continue;
                    }
                    let neg = negated_final_obligation(modinfo, module, db, i)?;
                    let mut fail: Option<FailReport> = None;
                    with_scope(smt, 1, |smt| -> Result<(), DriverError> {
                        assert_final_assumptions(smt, modinfo, module, db, i)?;
                        smt.write(&format!("(assert {neg})"))?;
                        if require_definite(smt.check_sat()?)? {
                            let free_values =
                                freevals::report(smt, modinfo, module, &predicates::state_var(i))?;
                            let user_asserts =
                                locator::locate_final_user_asserts(smt, modinfo, module, db, i)?;
                            witness.write_trace(smt, modinfo, module, 0, i + 1, None)?;
                            fail = Some(FailReport {
                                window: (0, i),
                                reason: FailReason::FinalState,
                                free_values,
                                hierarchical_asserts: Vec::new(),
                                user_asserts,
                            });
                        }
                        Ok(())
                    })?;
                    if let Some(report) = fail {
                        return Ok(RunOutcome::Fail(report));
                    }
                }
            }
        }

        if gentrace && cfg.dump_all {
            if !require_definite(smt.check_sat()?)? {
                return Ok(RunOutcome::Fail(FailReport {
                    window: (0, last),
                    reason: FailReason::NoSolution,
                    ..Default::default()
                }));
            }
            witness.write_trace(smt, modinfo, module, 0, last + 1, Some(dump_index))?;
            dump_index += 1;
        }

        prev = Some(last);
        step += cfg.step_size;
    }

    if gentrace {
        if !require_definite(smt.check_sat()?)? {
            return Ok(RunOutcome::Fail(FailReport {
                window: (0, cfg.num_steps.saturating_sub(1)),
                reason: FailReason::NoSolution,
                ..Default::default()
            }));
        }
        let horizon = frames.highest_declared().unwrap_or(0);
        witness.write_trace(smt, modinfo, module, 0, horizon + 1, None)?;
    }

    Ok(RunOutcome::Pass)
}
