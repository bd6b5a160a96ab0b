//! Solver session
//!
//! The drivers (`bmc`, `induction`) are generic over the narrow [`SmtBackend`]
//! trait rather than hard-wired to a concrete transport — the same pattern
//! the teacher crate uses to keep its streaming core generic over
//! `Restreamer` instead of a concrete iterator type. [`SolverSession`] is the
//! production implementation: it spawns the configured external solver as a
//! child process, writes SMT-LIB2 text to its stdin, and parses its stdout as
//! a stream of s-expressions.
//!
//! `declare-fun` must precede any assertion referencing it; that ordering is
//! the driver's responsibility, not this module's.

#![allow(missing_docs)]

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// Outcome of a `(check-sat)` query.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("failed to spawn solver {cmd:?}: {source}")]
    Spawn { cmd: String, #[source] source: std::io::Error },
    #[error("solver I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected solver output: {0:?}")]
    UnexpectedOutput(String),
    #[error("solver process exited unexpectedly")]
    ProcessGone,
    #[error("malformed s-expression in solver output: {0:?}")]
    BadSexpr(String),
}

/// The contract the BMC and induction drivers are generic over. A production
/// run uses [`SolverSession`]; tests use an in-memory fake (see
/// [`testing::FakeSolver`]) so driver logic is checked without spawning a
/// process.
pub trait SmtBackend {
    fn write(&mut self, text: &str) -> Result<(), SolverError>;
    fn check_sat(&mut self) -> Result<SatResult, SolverError>;
    fn push(&mut self, n: u32) -> Result<(), SolverError>;
    fn pop(&mut self, n: u32) -> Result<(), SolverError>;
    fn get(&mut self, expr: &str) -> Result<String, SolverError>;
    fn get_list(&mut self, exprs: &[String]) -> Result<Vec<String>, SolverError>;
}

/// Run `body` between a matching `push(n)`/`pop(n)` pair, issuing the `pop`
/// on every return path — including an `Err` from `body` or from
/// `check_sat` inside it — so push/pop depth never leaks across an
/// obligation check (§5: "every push is matched by exactly one pop on all
/// return paths, including the failure path").
pub fn with_scope<S, T, E, F>(smt: &mut S, n: u32, body: F) -> Result<T, E>
where
    S: SmtBackend,
    E: From<SolverError>,
    F: FnOnce(&mut S) -> Result<T, E>,
{
    smt.push(n)?;
    let result = body(smt);
    smt.pop(n)?;
    result
}

/// Decode an SMT-LIB2 bit-vector literal (`#b0101`, `#xAB`, or the function
/// form `(_ bvN W)`) into a binary string of exactly its declared width.
pub fn bv2bin(lit: &str) -> Result<String, SolverError> {
    let lit = lit.trim();
    if let Some(bits) = lit.strip_prefix("#b") {
        return Ok(bits.to_string());
    }
    if let Some(hex) = lit.strip_prefix("#x") {
        let mut out = String::with_capacity(hex.len() * 4);
        for c in hex.chars() {
            let v = c.to_digit(16).ok_or_else(|| SolverError::BadSexpr(lit.to_string()))?;
            out.push_str(&format!("{v:04b}"));
        }
        return Ok(out);
    }
    if lit.starts_with("(_") {
        // "(_ bvN W)"
        let inner = lit.trim_start_matches('(').trim_end_matches(')');
        let parts: Vec<&str> = inner.split_whitespace().collect();
        if parts.len() == 3 && parts[1].starts_with("bv") {
            let value: u128 =
                parts[1][2..].parse().map_err(|_| SolverError::BadSexpr(lit.to_string()))?;
            let width: u32 = parts[2].parse().map_err(|_| SolverError::BadSexpr(lit.to_string()))?;
            return Ok(format!("{value:0width$b}", width = width as usize));
        }
    }
    if lit == "true" {
        return Ok("1".to_string());
    }
    if lit == "false" {
        return Ok("0".to_string());
    }
    Err(SolverError::BadSexpr(lit.to_string()))
}

/// Decode a literal into an (unsigned) integer value.
pub fn bv2int(lit: &str) -> Result<u128, SolverError> {
    let bits = bv2bin(lit)?;
    u128::from_str_radix(&bits, 2).map_err(|_| SolverError::BadSexpr(lit.to_string()))
}

// ============================================================================
// Minimal s-expression reader/parser for solver stdout.
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum Sexpr {
    Atom(String),
    List(Vec<Sexpr>),
}

impl Sexpr {
    fn render(&self) -> String {
        match self {
            Sexpr::Atom(s) => s.clone(),
            Sexpr::List(items) => {
                format!("({})", items.iter().map(Sexpr::render).collect::<Vec<_>>().join(" "))
            }
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '(' | ')' => {
                tokens.push(c.to_string());
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                let mut atom = String::from("|");
                chars.next();
                for c2 in chars.by_ref() {
                    atom.push(c2);
                    if c2 == '|' {
                        break;
                    }
                }
                tokens.push(atom);
            }
            '"' => {
                let mut atom = String::from("\"");
                chars.next();
                for c2 in chars.by_ref() {
                    atom.push(c2);
                    if c2 == '"' {
                        break;
                    }
                }
                tokens.push(atom);
            }
            _ => {
                let mut atom = String::new();
                while let Some(&c2) = chars.peek() {
                    if c2 == '(' || c2 == ')' || c2.is_whitespace() {
                        break;
                    }
                    atom.push(c2);
                    chars.next();
                }
                tokens.push(atom);
            }
        }
    }
    tokens
}

fn parse_sexpr(tokens: &[String], pos: &mut usize) -> Result<Sexpr, SolverError> {
    let tok = tokens.get(*pos).ok_or_else(|| SolverError::BadSexpr("<eof>".to_string()))?;
    if tok == "(" {
        *pos += 1;
        let mut items = Vec::new();
        loop {
            match tokens.get(*pos) {
                Some(t) if t == ")" => {
                    *pos += 1;
                    break;
                }
                Some(_) => items.push(parse_sexpr(tokens, pos)?),
                None => return Err(SolverError::BadSexpr("unbalanced parens".to_string())),
            }
        }
        Ok(Sexpr::List(items))
    } else {
        *pos += 1;
        Ok(Sexpr::Atom(tok.clone()))
    }
}

/// Parse `text` (exactly one top-level s-expression) into a [`Sexpr`].
fn parse_one_sexpr(text: &str) -> Result<Sexpr, SolverError> {
    let tokens = tokenize(text);
    let mut pos = 0;
    let value = parse_sexpr(&tokens, &mut pos)?;
    Ok(value)
}

/// Read one balanced-paren s-expression (or a bare atom line like `sat`)
/// from `reader`.
fn read_balanced(reader: &mut impl BufRead) -> Result<String, SolverError> {
    let mut out = String::new();
    let mut depth: i64 = 0;
    let mut started = false;
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte)?;
        if n == 0 {
            if started {
                return Err(SolverError::ProcessGone);
            }
            return Err(SolverError::ProcessGone);
        }
        let c = byte[0] as char;
        if !started {
            if c.is_whitespace() {
                continue;
            }
            started = true;
        }
        out.push(c);
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(out);
                }
            }
            '\n' if depth == 0 => return Ok(out.trim().to_string()),
            _ => {}
        }
    }
}

// ============================================================================
// Production child-process transport.
// ============================================================================

pub struct SolverSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl SolverSession {
    /// Spawn the solver described by `cmd` (e.g. `["z3", "-smt2", "-in"]`).
    pub fn spawn(cmd: &[String]) -> Result<Self, SolverError> {
        let (program, args) = cmd.split_first().ok_or_else(|| SolverError::Spawn {
            cmd: "<empty>".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty solver command"),
        })?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SolverError::Spawn { cmd: cmd.join(" "), source })?;
        let stdin = child.stdin.take().ok_or(SolverError::ProcessGone)?;
        let stdout = BufReader::new(child.stdout.take().ok_or(SolverError::ProcessGone)?);
        Ok(Self { child, stdin, stdout })
    }

    /// Write the solver-ready input file's logic declaration. Called once,
    /// before any `declare-fun`.
    pub fn setup(&mut self, logic: &str) -> Result<(), SolverError> {
        self.write(&format!("(set-logic {logic})\n"))
    }

    /// Send `(exit)` and wait for the child to terminate. Safe to call more
    /// than once; idempotent after the first successful call.
    pub fn shutdown(mut self) -> Result<(), SolverError> {
        let _ = self.write("(exit)\n");
        let _ = self.stdin.flush();
        self.child.wait()?;
        Ok(())
    }
}

impl SmtBackend for SolverSession {
    fn write(&mut self, text: &str) -> Result<(), SolverError> {
        self.stdin.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            self.stdin.write_all(b"\n")?;
        }
        self.stdin.flush()?;
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, SolverError> {
        self.write("(check-sat)")?;
        let line = read_balanced(&mut self.stdout)?;
        match line.trim() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => Ok(SatResult::Unknown),
            other => Err(SolverError::UnexpectedOutput(other.to_string())),
        }
    }

    fn push(&mut self, n: u32) -> Result<(), SolverError> {
        self.write(&format!("(push {n})"))
    }

    fn pop(&mut self, n: u32) -> Result<(), SolverError> {
        self.write(&format!("(pop {n})"))
    }

    fn get(&mut self, expr: &str) -> Result<String, SolverError> {
        self.write(&format!("(get-value ({expr}))"))?;
        let raw = read_balanced(&mut self.stdout)?;
        let parsed = parse_one_sexpr(&raw)?;
        extract_single_value(&parsed)
    }

    fn get_list(&mut self, exprs: &[String]) -> Result<Vec<String>, SolverError> {
        let joined = exprs.join(" ");
        self.write(&format!("(get-value ({joined}))"))?;
        let raw = read_balanced(&mut self.stdout)?;
        let parsed = parse_one_sexpr(&raw)?;
        extract_values(&parsed, exprs.len())
    }
}

fn extract_single_value(parsed: &Sexpr) -> Result<String, SolverError> {
    let values = extract_values(parsed, 1)?;
    values.into_iter().next().ok_or_else(|| SolverError::BadSexpr(parsed.render()))
}

fn extract_values(parsed: &Sexpr, expected: usize) -> Result<Vec<String>, SolverError> {
    let Sexpr::List(pairs) = parsed else {
        return Err(SolverError::BadSexpr(parsed.render()));
    };
    if pairs.len() != expected {
        return Err(SolverError::BadSexpr(parsed.render()));
    }
    pairs
        .iter()
        .map(|pair| match pair {
            Sexpr::List(kv) if kv.len() == 2 => Ok(kv[1].render()),
            other => Err(SolverError::BadSexpr(other.render())),
        })
        .collect()
}

/// Net/memory convenience wrappers layered over a generic [`SmtBackend`] and
/// the [`crate::modinfo::ModuleInfo`] they need to resolve paths to
/// expressions. Kept as free functions (not inherent methods on the
/// backend) so `SmtBackend` stays a minimal trait object.
pub mod query {
    use super::{SmtBackend, SolverError};
    use crate::modinfo::ModuleInfo;

    pub fn get_net_binary_list<S: SmtBackend>(
        smt: &mut S,
        modinfo: &ModuleInfo,
        module: &str,
        paths: &[Vec<String>],
        state_expr: &str,
    ) -> Result<Vec<String>, SolverError> {
        let exprs: Vec<String> = paths
            .iter()
            .map(|p| modinfo.net_expr(module, state_expr, p).map_err(|e| SolverError::BadSexpr(e.to_string())))
            .collect::<Result<_, _>>()?;
        let raw = smt.get_list(&exprs)?;
        raw.iter().map(|v| super::bv2bin(v)).collect()
    }
}

/// In-memory fakes for exercising driver logic without a solver process.
/// Compiled only under `cfg(test)`, but `pub` so other modules' test code in
/// the same crate can reuse it (cfg(test) is crate-wide during `cargo test`).
#[cfg(test)]
pub mod testing {
    use super::*;

    /// Records every call so tests can assert push/pop balance and command
    /// ordering, and answers `check_sat` from a scripted queue.
    #[derive(Default)]
    pub struct FakeSolver {
        pub writes: Vec<String>,
        pub calls: Vec<String>,
        pub sat_script: std::collections::VecDeque<SatResult>,
        /// Scripted answers for `get`, consumed in call order. Exhausted
        /// calls fall back to `"#b0"`.
        pub get_script: std::collections::VecDeque<String>,
        pub push_depth: i64,
        pub max_push_depth: i64,
        /// If set, `check_sat` returns this error instead of consuming the script.
        pub fail_next_check: Option<String>,
    }

    impl FakeSolver {
        pub fn with_script(sats: Vec<SatResult>) -> Self {
            Self { sat_script: sats.into(), ..Default::default() }
        }
    }

    impl SmtBackend for FakeSolver {
        fn write(&mut self, text: &str) -> Result<(), SolverError> {
            self.writes.push(text.to_string());
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, SolverError> {
            self.calls.push("check-sat".to_string());
            if let Some(msg) = self.fail_next_check.take() {
                return Err(SolverError::UnexpectedOutput(msg));
            }
            Ok(self.sat_script.pop_front().unwrap_or(SatResult::Unsat))
        }

        fn push(&mut self, n: u32) -> Result<(), SolverError> {
            self.calls.push(format!("push {n}"));
            self.push_depth += n as i64;
            self.max_push_depth = self.max_push_depth.max(self.push_depth);
            Ok(())
        }

        fn pop(&mut self, n: u32) -> Result<(), SolverError> {
            self.calls.push(format!("pop {n}"));
            self.push_depth -= n as i64;
            Ok(())
        }

        fn get(&mut self, expr: &str) -> Result<String, SolverError> {
            self.calls.push(format!("get {expr}"));
            Ok(self.get_script.pop_front().unwrap_or_else(|| "#b0".to_string()))
        }

        fn get_list(&mut self, exprs: &[String]) -> Result<Vec<String>, SolverError> {
            self.calls.push(format!("get-list {}", exprs.len()));
            (0..exprs.len())
                .map(|_| Ok(self.get_script.pop_front().unwrap_or_else(|| "#b0".to_string())))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeSolver;
    use super::*;

    #[test]
    fn bv2bin_decodes_binary_hex_and_function_forms() {
        assert_eq!(bv2bin("#b0101").unwrap(), "0101");
        assert_eq!(bv2bin("#xA").unwrap(), "1010");
        assert_eq!(bv2bin("(_ bv5 4)").unwrap(), "0101");
        assert_eq!(bv2bin("true").unwrap(), "1");
        assert_eq!(bv2bin("false").unwrap(), "0");
    }

    #[test]
    fn bv2int_reads_unsigned_value() {
        assert_eq!(bv2int("#b0111").unwrap(), 7);
        assert_eq!(bv2int("(_ bv255 8)").unwrap(), 255);
    }

    #[test]
    fn with_scope_pops_on_success() {
        let mut fake = FakeSolver::default();
        let r: Result<(), SolverError> = with_scope(&mut fake, 1, |_s| Ok(()));
        r.unwrap();
        assert_eq!(fake.calls, vec!["push 1", "pop 1"]);
    }

    #[test]
    fn with_scope_pops_even_when_body_errs() {
        let mut fake = FakeSolver::default();
        let r: Result<(), SolverError> =
            with_scope(&mut fake, 1, |_s| Err(SolverError::UnexpectedOutput("boom".to_string())));
        assert!(r.is_err());
        assert_eq!(fake.calls, vec!["push 1", "pop 1"]);
    }

    #[test]
    fn with_scope_pops_even_when_inner_check_sat_errs() {
        let mut fake = FakeSolver::default();
        fake.fail_next_check = Some("solver crashed".to_string());
        let r: Result<SatResult, SolverError> = with_scope(&mut fake, 1, |s| s.check_sat());
        assert!(r.is_err());
        assert_eq!(fake.calls, vec!["push 1", "check-sat", "pop 1"]);
    }

    #[test]
    fn sexpr_roundtrip_extracts_paired_values() {
        let parsed = parse_one_sexpr("((a #b01) (b #b10))").unwrap();
        let values = extract_values(&parsed, 2).unwrap();
        assert_eq!(values, vec!["#b01".to_string(), "#b10".to_string()]);
    }

    #[test]
    fn sexpr_parses_nested_function_form_values() {
        let parsed = parse_one_sexpr("((x (_ bv5 8)))").unwrap();
        let values = extract_values(&parsed, 1).unwrap();
        assert_eq!(values, vec!["(_ bv5 8)".to_string()]);
    }

    #[test]
    fn tokenizer_handles_pipe_quoted_atoms() {
        let tokens = tokenize("(|top_h inst| s3)");
        assert_eq!(tokens, vec!["(", "|top_h inst|", "s3", ")"]);
    }
}
