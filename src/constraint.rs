//! Constraint-file parser
//!
//! Reads zero or more user "constraint script" files and builds a
//! [`ConstraintDb`]: an ordered, per-step table of assert/assume expressions
//! plus the bookkeeping (`final_start`) the drivers need to know when
//! final-state obligations become active.
//!
//! Directive grammar (one directive per non-empty, non-`#`-comment line):
//! `initial`, `final [-K]`, `state <items...>`, `always [-K]`, `assert <expr>`,
//! `assume <expr>`. See the crate-level docs for the full semantics.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A step key: either an ordinary time step or a final-state obligation
/// anchored at a given step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepKey {
    Step(u32),
    Final(u32),
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKey::Step(i) => write!(f, "{i}"),
            StepKey::Final(i) => write!(f, "final-{i}"),
        }
    }
}

/// One constraint: its source location (`file:line`) and raw expression text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub loc: String,
    pub expr: String,
}

/// Parse-time errors, reported with `file:line` where applicable.
#[derive(Debug, thiserror::Error)]
pub enum ConstraintError {
    #[error("{loc}: unknown directive {directive:?}")]
    UnknownDirective { loc: String, directive: String },
    #[error("{loc}: {kind} before any state scope was established")]
    NoActiveScope { loc: String, kind: &'static str },
    #[error("{loc}: malformed state range {item:?}")]
    BadRange { loc: String, item: String },
    #[error("{loc}: malformed integer {token:?}")]
    BadInt { loc: String, token: String },
    #[error("{loc}: `final` takes no argument or one negative integer, got {token:?}")]
    BadFinalArg { loc: String, token: String },
    #[error("{loc}: `always` takes no argument or one negative integer, got {token:?}")]
    BadAlwaysArg { loc: String, token: String },
    #[error("failed to read constraint file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

/// Per-step assert/assume tables, built once and read-only thereafter.
#[derive(Clone, Debug, Default)]
pub struct ConstraintDb {
    asserts: BTreeMap<StepKey, Vec<Constraint>>,
    assumes: BTreeMap<StepKey, Vec<Constraint>>,
    /// Earliest step whose final-state obligations are active, if any.
    pub final_start: Option<u32>,
}

impl ConstraintDb {
    pub fn asserts_at(&self, key: StepKey) -> &[Constraint] {
        self.asserts.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn assumes_at(&self, key: StepKey) -> &[Constraint] {
        self.assumes.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn push_assert(&mut self, key: StepKey, c: Constraint) {
        self.asserts.entry(key).or_default().push(c);
    }

    fn push_assume(&mut self, key: StepKey, c: Constraint) {
        self.assumes.entry(key).or_default().push(c);
    }

    fn note_final_start(&mut self, k: u32) {
        self.final_start = Some(match self.final_start {
            Some(prior) => prior.min(k),
            None => k,
        });
    }

    /// Parse every file in `paths`, in order, accumulating into one db.
    pub fn parse_files<P: AsRef<Path>>(paths: &[P], num_steps: u32) -> Result<Self, ConstraintError> {
        let mut db = ConstraintDb::default();
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path)
                .map_err(|source| ConstraintError::Io { path: path.display().to_string(), source })?;
            db.parse_one(&path.display().to_string(), &text, num_steps)?;
        }
        Ok(db)
    }

    /// Parse a single file's already-read text into `self`. Exposed for tests
    /// so directive semantics can be checked without touching the filesystem.
    pub fn parse_one(&mut self, fname: &str, text: &str, num_steps: u32) -> Result<(), ConstraintError> {
        let mut current_states: Option<Vec<StepKey>> = None;

        for (lineno0, raw_line) in text.lines().enumerate() {
            let lineno = lineno0 + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let loc = format!("{fname}:{lineno}");
            let mut tokens = line.split_whitespace();
            let Some(directive) = tokens.next() else { continue };

            match directive {
                "initial" => {
                    current_states = Some(vec![StepKey::Step(0)]);
                }
                "final" => {
                    let rest: Vec<&str> = tokens.collect();
                    let start = match rest.as_slice() {
                        [] => {
                            self.note_final_start(0);
                            0
                        }
                        [tok] => {
                            let k = parse_signed(&loc, tok)?;
                            if k >= 0 {
                                return Err(ConstraintError::BadFinalArg { loc, token: tok.to_string() });
                            }
                            let k = (-k) as u32;
                            self.note_final_start(k);
                            k
                        }
                        _ => return Err(ConstraintError::BadFinalArg { loc, token: line.to_string() }),
                    };
                    current_states = Some((start..=num_steps).map(StepKey::Final).collect());
                }
                "state" => {
                    let mut states = Vec::new();
                    for item in tokens {
                        match item.split_once(':') {
                            None => {
                                let i = parse_unsigned(&loc, item)?;
                                states.push(StepKey::Step(i));
                            }
                            Some((lo, hi)) => {
                                let lo = parse_unsigned(&loc, lo)?;
                                let hi = if hi == "*" {
                                    num_steps
                                } else {
                                    parse_unsigned(&loc, hi)?
                                };
                                if lo > hi {
                                    return Err(ConstraintError::BadRange { loc, item: item.to_string() });
                                }
                                states.extend((lo..=hi).map(StepKey::Step));
                            }
                        }
                    }
                    current_states = Some(states);
                }
                "always" => {
                    let rest: Vec<&str> = tokens.collect();
                    let start = match rest.as_slice() {
                        [] => 0,
                        [tok] => {
                            let k = parse_signed(&loc, tok)?;
                            if k >= 0 {
                                return Err(ConstraintError::BadAlwaysArg { loc, token: tok.to_string() });
                            }
                            (-k) as u32
                        }
                        _ => return Err(ConstraintError::BadAlwaysArg { loc, token: line.to_string() }),
                    };
                    current_states = Some((start..=num_steps).map(StepKey::Step).collect());
                }
                "assert" | "assume" => {
                    let Some(states) = current_states.as_ref() else {
                        return Err(ConstraintError::NoActiveScope { loc, kind: directive });
                    };
                    let expr = line[directive.len()..].trim().to_string();
                    let c = Constraint { loc: loc.clone(), expr };
                    let states = states.clone();
                    for key in states {
                        if directive == "assert" {
                            self.push_assert(key, c.clone());
                        } else {
                            self.push_assume(key, c.clone());
                        }
                    }
                }
                other => {
                    return Err(ConstraintError::UnknownDirective { loc, directive: other.to_string() });
                }
            }
        }

        Ok(())
    }
}

fn parse_unsigned(loc: &str, token: &str) -> Result<u32, ConstraintError> {
    token.parse::<u32>().map_err(|_| ConstraintError::BadInt { loc: loc.to_string(), token: token.to_string() })
}

fn parse_signed(loc: &str, token: &str) -> Result<i64, ConstraintError> {
    token.parse::<i64>().map_err(|_| ConstraintError::BadInt { loc: loc.to_string(), token: token.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(text: &str, num_steps: u32) -> ConstraintDb {
        let mut db = ConstraintDb::default();
        db.parse_one("t.constr", text, num_steps).unwrap();
        db
    }

    #[test]
    fn always_block_assume_spans_every_step() {
        let db = db("always\nassume [x] = 1\n", 4);
        for i in 0..=4u32 {
            assert_eq!(db.assumes_at(StepKey::Step(i)).len(), 1);
        }
    }

    #[test]
    fn state_range_with_star() {
        let db = db("state 2:*\nassert [done]\n", 5);
        for i in 0..2u32 {
            assert!(db.asserts_at(StepKey::Step(i)).is_empty());
        }
        for i in 2..=5u32 {
            assert_eq!(db.asserts_at(StepKey::Step(i)).len(), 1);
        }
    }

    #[test]
    fn state_list_of_singletons_and_ranges() {
        let db = db("state 0 2:3 7\nassert [a]\n", 10);
        for i in [0u32, 2, 3, 7] {
            assert_eq!(db.asserts_at(StepKey::Step(i)).len(), 1);
        }
        assert!(db.asserts_at(StepKey::Step(1)).is_empty());
    }

    #[test]
    fn bare_final_activates_0_through_num_steps_and_sets_start_zero() {
        let db = db("final\nassert [done]\n", 5);
        assert_eq!(db.final_start, Some(0));
        for i in 0..=5u32 {
            assert_eq!(db.asserts_at(StepKey::Final(i)).len(), 1);
        }
    }

    #[test]
    fn final_with_negative_arg_sets_window_and_start() {
        let db = db("final -2\nassert [done]\n", 5);
        assert_eq!(db.final_start, Some(2));
        assert!(db.asserts_at(StepKey::Final(0)).is_empty());
        assert!(db.asserts_at(StepKey::Final(1)).is_empty());
        for i in 2..=5u32 {
            assert_eq!(db.asserts_at(StepKey::Final(i)).len(), 1);
        }
    }

    #[test]
    fn final_start_accumulates_as_minimum() {
        let mut db = ConstraintDb::default();
        db.parse_one("t.constr", "final -2\nassert [a]\n", 5).unwrap();
        db.parse_one("t.constr", "final -4\nassert [b]\n", 5).unwrap();
        assert_eq!(db.final_start, Some(2));
    }

    #[test]
    fn final_start_accumulates_with_bare_final_as_zero() {
        let mut db = ConstraintDb::default();
        db.parse_one("t.constr", "final -4\nassert [a]\n", 5).unwrap();
        db.parse_one("t.constr", "final\nassert [b]\n", 5).unwrap();
        assert_eq!(db.final_start, Some(0));
    }

    #[test]
    fn assert_before_scope_is_an_error() {
        let mut db = ConstraintDb::default();
        let err = db.parse_one("t.constr", "assert [x]\n", 5).unwrap_err();
        assert!(matches!(err, ConstraintError::NoActiveScope { kind: "assert", .. }));
    }

    #[test]
    fn unknown_directive_is_an_error() {
        let mut db = ConstraintDb::default();
        let err = db.parse_one("t.constr", "bogus foo\n", 5).unwrap_err();
        assert!(matches!(err, ConstraintError::UnknownDirective { .. }));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let db = db("# a comment\n\ninitial\nassert [x]\n", 5);
        assert_eq!(db.asserts_at(StepKey::Step(0)).len(), 1);
    }

    #[test]
    fn order_within_a_step_is_preserved() {
        let db = db("initial\nassert [a]\nassert [b]\nassert [c]\n", 5);
        let exprs: Vec<&str> = db.asserts_at(StepKey::Step(0)).iter().map(|c| c.expr.as_str()).collect();
        assert_eq!(exprs, vec!["[a]", "[b]", "[c]"]);
    }
}
