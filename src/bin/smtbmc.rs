//! smtbmc: command-line driver for bounded model checking and temporal
//! induction over SMT-LIB2 hardware transition systems.

#![forbid(unsafe_code)]

use std::process::ExitCode;

use smtbmc::driver::{FailReason, FailReport, RunOutcome};
use smtbmc::{ConfigError, RunConfig, Session, SolverSession};
use tracing::{error, info, warn};

fn init_logging(verbosity: i32) {
    let default_filter = match verbosity {
        v if v <= -1 => "error",
        0 => "smtbmc=info",
        v if v == 1 => "smtbmc=debug",
        _ => "smtbmc=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()))
        .with_target(false)
        .compact()
        .init();
}

fn report_failure(report: &FailReport) {
    let (lo, hi) = report.window;
    match report.reason {
        FailReason::Obligation => error!(step_lo = lo, step_hi = hi, "assertion failed"),
        FailReason::FinalState => error!(step = hi, "final-state assertion failed"),
        FailReason::Induction => error!(depth = hi, "induction step failed to close"),
        FailReason::NoSolution => error!(step_hi = hi, "no trace satisfies the given assumptions"),
    }
    for fv in &report.free_values {
        info!(path = %fv.path, tag = %fv.tag, value = %fv.value, "free value");
    }
    for a in &report.hierarchical_asserts {
        error!(path = %a.path, info = %a.info, "design assertion failed");
    }
    for a in &report.user_asserts {
        error!(loc = %a.loc, expr = %a.expr, "constraint assertion failed");
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = match RunConfig::parse(&args) {
        Ok(cfg) => cfg,
        Err(e @ ConfigError::Usage) => {
            eprintln!("{e}");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            eprintln!("smtbmc: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    init_logging(cfg.verbosity);
    info!(input = %cfg.input_file, mode = ?cfg.mode, "smtbmc starting");

    let smt = SolverSession::spawn(&cfg.solver_cmd)?;
    let mut session = Session::new(smt, &cfg)?;

    let result = session.run();
    if let Err(e) = session.into_backend().shutdown() {
        warn!("failed to shut down solver: {e}");
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    match outcome {
        RunOutcome::Pass => {
            info!("PASS");
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Fail(report) => {
            report_failure(&report);
            warn!("FAIL");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("smtbmc: {e:#}");
            ExitCode::FAILURE
        }
    }
}
