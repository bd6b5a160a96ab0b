//! Run configuration & CLI parsing
//!
//! This module owns the immutable [`RunConfig`] that every driver reads from
//! and the hand-rolled scanner that builds one from `std::env::args()`. There
//! is no declarative argument-parsing crate here: the flag surface is small,
//! `-t` has three shapes (`N`, `S:N`, `S:K:N`), and a manual scanner keeps the
//! shape-dispatch readable without fighting a derive macro.

#![allow(missing_docs)]

/// What the driver does with the unrolled frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Bounded model checking: negate obligations per window, look for `sat`.
    Bmc,
    /// Temporal induction: search for the shortest `k` at which induction closes.
    Induction,
    /// Generate a single trace satisfying all obligations (no negation).
    Gentrace,
}

/// Errors in command-line usage. Each variant renders as the one-line
/// message the operator sees before exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("usage: smtbmc [options] <smt2-file>")]
    Usage,
    #[error("option {0} requires an argument")]
    MissingArg(&'static str),
    #[error("invalid -t specification {0:?} (expected N, S:N, or S:K:N)")]
    BadHorizon(String),
    #[error("unknown option {0:?}")]
    UnknownOption(String),
    #[error("options -i and --smtc are exclusive")]
    InductionWithConstraints,
    #[error("expected exactly one input file, got {0}")]
    WrongPositionalCount(usize),
    #[error("invalid integer in {flag}: {value:?}")]
    BadInt { flag: &'static str, value: String },
    #[error("-t step size must be at least 1, got 0")]
    ZeroStepSize,
}

/// Immutable run configuration, built once at startup.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub skip_steps: u32,
    pub step_size: u32,
    pub num_steps: u32,
    pub mode: Mode,
    pub final_only: bool,
    pub assume_skipped: Option<u32>,
    pub top_module: Option<String>,
    pub constraint_files: Vec<String>,
    pub dump_vcd: Option<String>,
    pub dump_vlogtb: Option<String>,
    pub dump_smtc: Option<String>,
    pub dump_all: bool,
    pub input_file: String,
    /// External solver command line, e.g. `["z3", "-smt2", "-in"]`.
    pub solver_cmd: Vec<String>,
    /// Ambient addition: `-v`/`-q` count, folded into the tracing filter
    /// independent of `RUST_LOG` (positive = more verbose, negative = quieter).
    pub verbosity: i32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            skip_steps: 0,
            step_size: 1,
            num_steps: 20,
            mode: Mode::Bmc,
            final_only: false,
            assume_skipped: None,
            top_module: None,
            constraint_files: Vec::new(),
            dump_vcd: None,
            dump_vlogtb: None,
            dump_smtc: None,
            dump_all: false,
            input_file: String::new(),
            solver_cmd: vec!["z3".to_string(), "-smt2".to_string(), "-in".to_string()],
            verbosity: 0,
        }
    }
}

fn parse_u32(flag: &'static str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::BadInt { flag, value: value.to_string() })
}

/// Parse `-t`'s `N`, `S:N`, or `S:K:N` forms into `(skip_steps, step_size, num_steps)`.
fn parse_horizon(arg: &str) -> Result<(u32, u32, u32), ConfigError> {
    let parts: Vec<&str> = arg.split(':').collect();
    let to_u32 = |s: &str| s.parse::<u32>().map_err(|_| ConfigError::BadHorizon(arg.to_string()));
    match parts.as_slice() {
        [n] => Ok((0, 1, to_u32(n)?)),
        [s, n] => Ok((to_u32(s)?, 1, to_u32(n)?)),
        [s, k, n] => Ok((to_u32(s)?, to_u32(k)?, to_u32(n)?)),
        _ => Err(ConfigError::BadHorizon(arg.to_string())),
    }
}

impl RunConfig {
    /// Parse a full argv (excluding argv[0]) into a validated `RunConfig`.
    pub fn parse<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cfg = RunConfig::default();
        let mut positional = Vec::new();
        let mut induction = false;

        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        let mut it = args.into_iter();

        while let Some(arg) = it.next() {
            match arg.as_str() {
                "-t" => {
                    let v = it.next().ok_or(ConfigError::MissingArg("-t"))?;
                    let (s, k, n) = parse_horizon(&v)?;
                    cfg.skip_steps = s;
                    cfg.step_size = k;
                    cfg.num_steps = n;
                }
                "-g" => cfg.mode = Mode::Gentrace,
                "-i" => {
                    induction = true;
                    cfg.mode = Mode::Induction;
                }
                "-m" => {
                    cfg.top_module = Some(it.next().ok_or(ConfigError::MissingArg("-m"))?);
                }
                "--smtc" => {
                    cfg.constraint_files.push(it.next().ok_or(ConfigError::MissingArg("--smtc"))?);
                }
                "--final-only" => cfg.final_only = true,
                "--assume-skipped" => {
                    let v = it.next().ok_or(ConfigError::MissingArg("--assume-skipped"))?;
                    cfg.assume_skipped = Some(parse_u32("--assume-skipped", &v)?);
                }
                "--dump-vcd" => cfg.dump_vcd = Some(it.next().ok_or(ConfigError::MissingArg("--dump-vcd"))?),
                "--dump-vlogtb" => {
                    cfg.dump_vlogtb = Some(it.next().ok_or(ConfigError::MissingArg("--dump-vlogtb"))?)
                }
                "--dump-smtc" => {
                    cfg.dump_smtc = Some(it.next().ok_or(ConfigError::MissingArg("--dump-smtc"))?)
                }
                "--dump-all" => cfg.dump_all = true,
                "--solver" => {
                    let v = it.next().ok_or(ConfigError::MissingArg("--solver"))?;
                    cfg.solver_cmd = v.split_whitespace().map(str::to_string).collect();
                    if cfg.solver_cmd.is_empty() {
                        return Err(ConfigError::MissingArg("--solver"));
                    }
                }
                "--solver-arg" => {
                    cfg.solver_cmd.push(it.next().ok_or(ConfigError::MissingArg("--solver-arg"))?);
                }
                "-v" => cfg.verbosity += 1,
                "-q" => cfg.verbosity -= 1,
                other if other.starts_with('-') => return Err(ConfigError::UnknownOption(other.to_string())),
                other => positional.push(other.to_string()),
            }
        }

        if positional.len() != 1 {
            return Err(ConfigError::WrongPositionalCount(positional.len()));
        }
        cfg.input_file = positional.remove(0);

        if induction && !cfg.constraint_files.is_empty() {
            return Err(ConfigError::InductionWithConstraints);
        }
        if cfg.step_size == 0 {
            return Err(ConfigError::ZeroStepSize);
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<RunConfig, ConfigError> {
        RunConfig::parse(args.iter().copied())
    }

    #[test]
    fn defaults_are_0_1_20() {
        let cfg = parse(&["design.smt2"]).unwrap();
        assert_eq!((cfg.skip_steps, cfg.step_size, cfg.num_steps), (0, 1, 20));
        assert_eq!(cfg.mode, Mode::Bmc);
    }

    #[test]
    fn horizon_forms() {
        assert_eq!(parse_horizon("5").unwrap(), (0, 1, 5));
        assert_eq!(parse_horizon("2:5").unwrap(), (2, 1, 5));
        assert_eq!(parse_horizon("2:3:10").unwrap(), (2, 3, 10));
        assert!(parse_horizon("1:2:3:4").is_err());
        assert!(parse_horizon("x").is_err());
    }

    #[test]
    fn t_flag_threads_through_cli() {
        let cfg = parse(&["-t", "0:2:10", "design.smt2"]).unwrap();
        assert_eq!((cfg.skip_steps, cfg.step_size, cfg.num_steps), (0, 2, 10));
    }

    #[test]
    fn induction_rejects_constraint_files() {
        let err = parse(&["-i", "--smtc", "x.constr", "design.smt2"]).unwrap_err();
        assert!(matches!(err, ConfigError::InductionWithConstraints));
    }

    #[test]
    fn requires_exactly_one_positional() {
        assert!(matches!(parse(&[]).unwrap_err(), ConfigError::WrongPositionalCount(0)));
        assert!(matches!(
            parse(&["a.smt2", "b.smt2"]).unwrap_err(),
            ConfigError::WrongPositionalCount(2)
        ));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(matches!(parse(&["--bogus", "design.smt2"]).unwrap_err(), ConfigError::UnknownOption(_)));
    }

    #[test]
    fn solver_override_splits_on_whitespace() {
        let cfg = parse(&["--solver", "boolector --smt2", "design.smt2"]).unwrap();
        assert_eq!(cfg.solver_cmd, vec!["boolector", "--smt2"]);
    }

    #[test]
    fn zero_step_size_is_rejected() {
        assert!(matches!(parse(&["-t", "0:0:10", "design.smt2"]).unwrap_err(), ConfigError::ZeroStepSize));
    }

    #[test]
    fn repeatable_smtc_preserves_order() {
        let cfg = parse(&["--smtc", "a.constr", "--smtc", "b.constr", "design.smt2"]).unwrap();
        assert_eq!(cfg.constraint_files, vec!["a.constr", "b.constr"]);
    }
}
