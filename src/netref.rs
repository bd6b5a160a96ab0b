//! Net-reference resolver
//!
//! User constraint expressions contain bracketed *netref* tokens —
//! `[name]`, `[-k:name]`, `[k:name]` — naming a design net at an implied or
//! explicit time step. This module tokenizes an expression into literal and
//! netref pieces (§9 redesign note: structured rewriting instead of regex
//! substitution) and renders it against a caller-supplied resolver that maps
//! `(step, dotted_path)` to a solver-ground expression string.
//!
//! A netref only matches when it sits at an expression boundary: preceded by
//! start-of-string, a space, or `(`, and followed by end-of-string, a space,
//! or `)`. This mirrors the reference tool's context-sensitive regex without
//! reproducing it as a regex.

#![allow(missing_docs)]

/// One piece of a tokenized expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Piece {
    /// Verbatim text, copied through unchanged.
    Literal(String),
    /// A netref token to be resolved against a specific step.
    Netref(Netref),
}

/// The offset a netref token carries, prior to resolution against a home step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Offset {
    /// `[name]` — resolve at the obligation's home step.
    Implicit,
    /// `[-k:name]` — resolve at `home_step - k`.
    Relative(u32),
    /// `[k:name]` (k >= 0) — resolve at the absolute step `k`.
    Absolute(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Netref {
    pub offset: Offset,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NetrefError {
    #[error("netref [{offset}:{name}] at home step {home_step} would resolve to a negative step")]
    NegativeStep { home_step: u32, offset: i64, name: String },
    #[error("unresolved net {path:?} at step {step}")]
    UnknownNet { step: u32, path: String },
}

/// Split `expr` into literal/netref pieces.
pub fn tokenize(expr: &str) -> Vec<Piece> {
    let bytes = expr.as_bytes();
    let mut pieces = Vec::new();
    let mut literal_start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }
        let preceded_ok = i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'(';
        if !preceded_ok {
            i += 1;
            continue;
        }
        // Scan for the closing ']' with no nested ']' allowed inside.
        let content_start = i + 1;
        let mut j = content_start;
        while j < bytes.len() && bytes[j] != b']' {
            j += 1;
        }
        if j >= bytes.len() {
            // No closing bracket at all; not a netref.
            i += 1;
            continue;
        }
        let followed_ok = j + 1 == bytes.len() || bytes[j + 1] == b' ' || bytes[j + 1] == b')';
        if !followed_ok || content_start == j {
            i += 1;
            continue;
        }

        let content = &expr[content_start..j];
        let (offset, name) = parse_netref_content(content);

        if literal_start < i {
            pieces.push(Piece::Literal(expr[literal_start..i].to_string()));
        }
        pieces.push(Piece::Netref(Netref { offset, name: name.to_string() }));

        i = j + 1;
        literal_start = i;
    }

    if literal_start < bytes.len() {
        pieces.push(Piece::Literal(expr[literal_start..].to_string()));
    }

    pieces
}

/// Parse the content between `[` and `]`: an optional `-?[0-9]+:` offset
/// prefix, then the net name (everything else).
fn parse_netref_content(content: &str) -> (Offset, &str) {
    let bytes = content.as_bytes();
    let mut k = 0usize;
    if k < bytes.len() && bytes[k] == b'-' {
        k += 1;
    }
    let digits_start = k;
    while k < bytes.len() && bytes[k].is_ascii_digit() {
        k += 1;
    }
    let has_digits = k > digits_start;
    if has_digits && k < bytes.len() && bytes[k] == b':' {
        let num_str = &content[..k]; // includes leading '-' if present
        let name = &content[k + 1..];
        if let Some(stripped) = num_str.strip_prefix('-') {
            let mag: u32 = stripped.parse().unwrap_or(0);
            return (Offset::Relative(mag), name);
        } else {
            let abs: u32 = num_str.parse().unwrap_or(0);
            return (Offset::Absolute(abs), name);
        }
    }
    (Offset::Implicit, content)
}

/// Resolve every netref in `pieces` against `home_step`, calling `resolve_net`
/// for each one to get the solver-ground expression, and concatenating the
/// result. `resolve_net` receives the absolute step and the dotted path split
/// into segments.
pub fn render<F>(pieces: &[Piece], home_step: u32, mut resolve_net: F) -> Result<String, NetrefError>
where
    F: FnMut(u32, &[String]) -> Result<String, NetrefError>,
{
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Netref(nr) => {
                let step = match nr.offset {
                    Offset::Implicit => home_step as i64,
                    Offset::Relative(k) => home_step as i64 - k as i64,
                    Offset::Absolute(k) => k as i64,
                };
                if step < 0 {
                    let offset = match nr.offset {
                        Offset::Implicit => 0,
                        Offset::Relative(k) => -(k as i64),
                        Offset::Absolute(k) => k as i64,
                    };
                    return Err(NetrefError::NegativeStep { home_step, offset, name: nr.name.clone() });
                }
                let path = get_path(&nr.name);
                out.push_str(&resolve_net(step as u32, &path)?);
            }
        }
    }
    Ok(out)
}

/// Split a dotted hierarchical net name into path segments.
pub fn get_path(name: &str) -> Vec<String> {
    name.split('.').map(str::to_string).collect()
}

/// Convenience: tokenize and render in one call.
pub fn resolve_expr<F>(expr: &str, home_step: u32, resolve_net: F) -> Result<String, NetrefError>
where
    F: FnMut(u32, &[String]) -> Result<String, NetrefError>,
{
    render(&tokenize(expr), home_step, resolve_net)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_resolver(step: u32, path: &[String]) -> Result<String, NetrefError> {
        Ok(format!("(net s{} {})", step, path.join(".")))
    }

    #[test]
    fn no_netref_is_identity() {
        let pieces = tokenize("(= a b)");
        assert_eq!(pieces, vec![Piece::Literal("(= a b)".to_string())]);
        assert_eq!(resolve_expr("(= a b)", 3, identity_resolver).unwrap(), "(= a b)");
    }

    #[test]
    fn implicit_netref_resolves_at_home_step() {
        let out = resolve_expr("[x]", 5, identity_resolver).unwrap();
        assert_eq!(out, "(net s5 x)");
    }

    #[test]
    fn relative_netref_subtracts_offset() {
        let out = resolve_expr("[-1:x]", 5, identity_resolver).unwrap();
        assert_eq!(out, "(net s4 x)");
    }

    #[test]
    fn absolute_netref_ignores_home_step() {
        let out = resolve_expr("[3:x]", 5, identity_resolver).unwrap();
        assert_eq!(out, "(net s3 x)");
    }

    #[test]
    fn negative_offset_at_step_zero_is_an_error() {
        let err = resolve_expr("[-1:x]", 0, identity_resolver).unwrap_err();
        assert!(matches!(err, NetrefError::NegativeStep { home_step: 0, .. }));
    }

    #[test]
    fn context_glyphs_are_preserved() {
        let out = resolve_expr("(assume (= [x] [-1:x]))", 2, identity_resolver).unwrap();
        assert_eq!(out, "(assume (= (net s2 x) (net s1 x)))");
    }

    #[test]
    fn brackets_without_boundary_glyphs_are_left_alone() {
        // `a[x]b` — `[` is preceded by `a`, not a boundary glyph, so no substitution.
        let out = resolve_expr("a[x]b", 5, identity_resolver).unwrap();
        assert_eq!(out, "a[x]b");
    }

    #[test]
    fn hierarchical_name_splits_on_dot() {
        assert_eq!(get_path("cell.sub.reg"), vec!["cell", "sub", "reg"]);
    }

    #[test]
    fn always_block_reference_at_every_step_property() {
        // §8 property 7: `assume [x] = 1` in an `always` block references
        // `x` at every step when rendered once per step.
        for step in 0..5u32 {
            let out = resolve_expr("[x] = 1", step, identity_resolver).unwrap();
            assert_eq!(out, format!("(net s{step} x) = 1"));
        }
    }
}
