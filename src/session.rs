//! Session orchestrator (C12)
//!
//! Bundles everything a run needs — config, parsed constraints, module
//! metadata, a live solver, and the configured witness sinks — behind one
//! object, and drives the top-level sequence: read the input file, split it
//! into sideband comments (fed to [`ModuleInfo`]) and solver text (forwarded
//! verbatim), set up the solver, then dispatch to the BMC or induction
//! driver. Per the §9 redesign note, this replaces what the reference tool
//! keeps as module-level interpreter globals with one explicit object a
//! caller constructs and runs.

#![allow(missing_docs)]

use tracing::info;

use crate::bmc;
use crate::config::{Mode, RunConfig};
use crate::constraint::{ConstraintDb, ConstraintError};
use crate::driver::{DriverError, RunOutcome};
use crate::frame::FrameTable;
use crate::induction;
use crate::modinfo::{ModInfoError, ModuleInfo};
use crate::solver::{SmtBackend, SolverError};
use crate::witness::WitnessWriter;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to read input file {path:?}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    #[error(transparent)]
    ModInfo(#[from] ModInfoError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// One verification run, holding everything its driver needs.
pub struct Session<'a, S: SmtBackend> {
    smt: S,
    modinfo: ModuleInfo,
    db: ConstraintDb,
    cfg: &'a RunConfig,
}

impl<'a, S: SmtBackend> Session<'a, S> {
    /// Declare the solver's logic, read `cfg.input_file`, split it into
    /// module metadata and solver text, forward the solver text to `smt`,
    /// and parse every file in `cfg.constraint_files` in order.
    pub fn new(mut smt: S, cfg: &'a RunConfig) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(&cfg.input_file)
            .map_err(|source| SessionError::Io { path: cfg.input_file.clone(), source })?;

        smt.write("(set-logic QF_AUFBV)")?;

        let mut modinfo = ModuleInfo::new();
        for line in text.lines() {
            modinfo.feed_line(line)?;
            smt.write(line)?;
        }

        let top_module = cfg.top_module.clone().or_else(|| modinfo.topmod.clone());
        modinfo.topmod = top_module;

        let db = ConstraintDb::parse_files(&cfg.constraint_files, cfg.num_steps)?;

        Ok(Self { smt, modinfo, db, cfg })
    }

    fn witness(&self) -> WitnessWriter<'a> {
        WitnessWriter {
            dump_vcd: self.cfg.dump_vcd.as_deref(),
            dump_vlogtb: self.cfg.dump_vlogtb.as_deref(),
            dump_smtc: self.cfg.dump_smtc.as_deref(),
        }
    }

    /// Run the configured driver to completion against the top module
    /// (`-m` override, or the `topmod` sideband comment). Borrows `self`
    /// mutably rather than consuming it so the caller can still retrieve
    /// the backend afterward (e.g. to shut the solver process down) via
    /// [`Session::into_backend`] regardless of the outcome.
    pub fn run(&mut self) -> Result<RunOutcome, SessionError> {
        let module = self.modinfo.topmod.clone().ok_or(DriverError::NoTopModule)?;
        let witness = self.witness();
        info!(module = %module, mode = ?self.cfg.mode, "starting run");

        let outcome = match self.cfg.mode {
            Mode::Bmc | Mode::Gentrace => {
                let mut frames = FrameTable::new();
                bmc::run(&mut self.smt, &self.modinfo, &module, &self.db, self.cfg, &mut frames, &witness)?
            }
            Mode::Induction => {
                induction::run(&mut self.smt, &self.modinfo, &module, &self.db, self.cfg, &witness)?
            }
        };

        Ok(outcome)
    }

    /// Hand back the underlying backend, e.g. so the caller can call
    /// `SolverSession::shutdown` on it.
    pub fn into_backend(self) -> S {
        self.smt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::testing::FakeSolver;
    use crate::solver::SatResult;

    fn write_design(path: &std::path::Path) {
        let text = "\
; yosys-smt2-module top
; yosys-smt2-topmod top
; yosys-smt2-register r 1 top
(declare-sort |top_s| 0)
";
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn new_splits_sideband_comments_into_modinfo_and_forwards_all_text() {
        let dir = std::env::temp_dir().join(format!("smtbmc-session-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let design = dir.join("design.smt2");
        write_design(&design);

        let cfg = RunConfig { input_file: design.to_str().unwrap().to_string(), ..Default::default() };
        let fake = FakeSolver::with_script(vec![SatResult::Unsat; 100]);
        let session = Session::new(fake, &cfg).unwrap();
        assert_eq!(session.modinfo.topmod.as_deref(), Some("top"));
        assert!(session.smt.writes.iter().any(|w| w.contains("declare-sort")));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn explicit_top_module_overrides_sideband_topmod() {
        let dir = std::env::temp_dir().join(format!("smtbmc-session-test2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let design = dir.join("design.smt2");
        let text = "\
; yosys-smt2-module top
; yosys-smt2-topmod top
; yosys-smt2-module other
; yosys-smt2-register r 1 other
";
        std::fs::write(&design, text).unwrap();

        let cfg = RunConfig {
            input_file: design.to_str().unwrap().to_string(),
            top_module: Some("other".to_string()),
            ..Default::default()
        };
        let fake = FakeSolver::default();
        let session = Session::new(fake, &cfg).unwrap();
        assert_eq!(session.modinfo.topmod.as_deref(), Some("other"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_with_no_top_module_is_an_error() {
        let dir = std::env::temp_dir().join(format!("smtbmc-session-test3-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let design = dir.join("design.smt2");
        std::fs::write(&design, "(declare-sort |x| 0)\n").unwrap();

        let cfg = RunConfig { input_file: design.to_str().unwrap().to_string(), ..Default::default() };
        let fake = FakeSolver::default();
        let mut session = Session::new(fake, &cfg).unwrap();
        assert!(session.run().is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_dispatches_bmc_to_completion_on_small_design() {
        let dir = std::env::temp_dir().join(format!("smtbmc-session-test4-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let design = dir.join("design.smt2");
        write_design(&design);

        let cfg = RunConfig {
            input_file: design.to_str().unwrap().to_string(),
            num_steps: 3,
            ..Default::default()
        };
        let fake = FakeSolver::with_script(vec![SatResult::Unsat; 10]);
        let mut session = Session::new(fake, &cfg).unwrap();
        let outcome = session.run().unwrap();
        assert!(matches!(outcome, RunOutcome::Pass));
        std::fs::remove_dir_all(&dir).ok();
    }
}
