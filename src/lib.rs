//! Crate root: public surface and module layout
//!
//! This crate is a bounded model checker and temporal induction prover for
//! hardware transition systems described in SMT-LIB2, in the shape produced
//! by a synthesis pipeline's `write_smt2` output: plain SMT-LIB2 text carrying
//! sideband `; yosys-smt2-*` comments that describe module hierarchy, net
//! widths, memories, and the predicate-function naming convention a design's
//! `<module>_i`/`_t`/`_a`/`_u`/`_h` functions follow.
//!
//! ## Layout
//!
//! - [`config`] — CLI parsing and the immutable [`config::RunConfig`].
//! - [`constraint`] — the user constraint-script ("`.smtc`") parser.
//! - [`netref`] — `[name]`/`[-k:name]`/`[k:name]` net-reference resolution.
//! - [`modinfo`] — sideband-comment accessor (module hierarchy, widths).
//! - [`predicates`] — the five per-step predicate expression builders.
//! - [`solver`] — the [`solver::SmtBackend`] trait and its production and
//!   test-fake implementations.
//! - [`frame`] — explicit per-step declared/constrained/committed bookkeeping.
//! - [`driver`] — infrastructure shared by the BMC and induction drivers.
//! - [`bmc`] — the bounded-model-checking (and gentrace) driver.
//! - [`induction`] — the temporal-induction driver.
//! - [`locator`] / [`freevals`] — counterexample diagnostics.
//! - [`vcd`] / [`witness`] — counterexample/gentrace materialization.
//! - [`session`] — the top-level orchestrator tying the above together.
//!
//! ## Invariants
//!
//! - A frame is never referenced by an obligation before its well-formedness,
//!   hierarchy, and assumption predicates have been asserted (§3 of the
//!   design notes this crate implements).
//! - Every `push` is matched by exactly one `pop` on every return path,
//!   including error paths — see [`solver::with_scope`].
//! - A netref that would resolve to a negative step is a hard error, not a
//!   silently-misbehaving substitution.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

pub mod bmc;
pub mod config;
pub mod constraint;
pub mod driver;
pub mod frame;
pub mod freevals;
pub mod induction;
pub mod locator;
pub mod modinfo;
pub mod netref;
pub mod predicates;
pub mod session;
pub mod solver;
pub mod vcd;
pub mod witness;

pub use config::{ConfigError, Mode, RunConfig};
pub use driver::{DriverError, FailReason, FailReport, RunOutcome};
pub use session::{Session, SessionError};
pub use solver::{SatResult, SmtBackend, SolverError, SolverSession};
