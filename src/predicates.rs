//! Module-wide predicate expression builders
//!
//! Tiny formatting helpers for the five predicates every frame is built
//! from: well-formedness `u`, hierarchy consistency `h`, the initial
//! predicate `i`, the initial marker `is`, the transition relation `t`, and
//! the module-wide assert conjunction `a`. Centralized so the naming
//! convention (`|module_u|` etc.) lives in one place instead of being
//! repeated as ad hoc `format!` calls across `bmc` and `induction`.

#![allow(missing_docs)]

pub fn state_var(step: u32) -> String {
    format!("s{step}")
}

pub fn declare_fun(module: &str, step: u32) -> String {
    format!("(declare-fun {} () |{module}_s|)", state_var(step))
}

pub fn well_formed(module: &str, step: u32) -> String {
    format!("(assert (|{module}_u| {}))", state_var(step))
}

pub fn hierarchy(module: &str, step: u32) -> String {
    format!("(assert (|{module}_h| {}))", state_var(step))
}

pub fn initial(module: &str, step: u32) -> String {
    format!("(assert (|{module}_i| {}))", state_var(step))
}

pub fn is_initial(module: &str, step: u32) -> String {
    format!("(assert (|{module}_is| {}))", state_var(step))
}

pub fn not_initial(module: &str, step: u32) -> String {
    format!("(assert (not (|{module}_is| {})))", state_var(step))
}

pub fn transition(module: &str, from: u32, to: u32) -> String {
    format!("(assert (|{module}_t| {} {}))", state_var(from), state_var(to))
}

pub fn assert_all(module: &str, step: u32) -> String {
    format!("(assert (|{module}_a| {}))", state_var(step))
}

pub fn not_assert_all(module: &str, step: u32) -> String {
    format!("(assert (not (|{module}_a| {})))", state_var(step))
}

/// The bare (unwrapped-in-`assert`) module-wide assert-conjunction atom, for
/// composing into a larger boolean expression (e.g. the negated obligation
/// conjunction in the BMC window check).
pub fn assert_all_atom(module: &str, step: u32) -> String {
    format!("(|{module}_a| {})", state_var(step))
}

/// Like [`assert_all_atom`], but against an arbitrary state expression
/// (e.g. a nested `_h`-selector) rather than a plain `sN` — used by the
/// assertion locator as it descends the cell hierarchy.
pub fn assert_all_atom_expr(module: &str, state_expr: &str) -> String {
    format!("(|{module}_a| {state_expr})")
}

/// A single leaf assertion predicate applied to an arbitrary state
/// expression.
pub fn leaf_assert_expr(fun: &str, state_expr: &str) -> String {
    format!("(|{fun}| {state_expr})")
}

/// A registered free-symbolic-constant function applied to an arbitrary
/// state expression.
pub fn anyconst_expr(fun: &str, state_expr: &str) -> String {
    format!("(|{fun}| {state_expr})")
}

/// The hierarchy selector that projects a parent state onto a named child
/// cell's sub-state.
pub fn cell_state_expr(module: &str, cellname: &str, state_expr: &str) -> String {
    format!("(|{module}_h {cellname}| {state_expr})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_reference_the_expected_state_var() {
        assert_eq!(state_var(7), "s7");
        assert_eq!(well_formed("top", 2), "(assert (|top_u| s2))");
        assert_eq!(transition("top", 2, 3), "(assert (|top_t| s2 s3))");
        assert_eq!(not_initial("top", 1), "(assert (not (|top_is| s1)))");
        assert_eq!(assert_all_atom("top", 4), "(|top_a| s4)");
    }
}
