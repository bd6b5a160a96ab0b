//! Assertion locator (C8)
//!
//! On a counterexample, reports exactly which obligation(s) failed: a
//! hierarchical walk evaluating each cell's module-wide assert conjunction
//! in the current model, descending only into cells where it is false, plus
//! a flat check of the user-supplied asserts active at a given step.

#![allow(missing_docs)]

use crate::constraint::{ConstraintDb, StepKey};
use crate::driver::{resolve_user_exprs, DriverError};
use crate::modinfo::ModuleInfo;
use crate::predicates;
use crate::solver::{bv2bin, SmtBackend};

/// A failing hierarchical (design) assertion, with its dotted path from the
/// top module and its human-readable source annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatedAssert {
    pub path: String,
    pub info: String,
}

/// A failing user-supplied (constraint-file) assertion, with its
/// `file:line` origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatedUserAssert {
    pub loc: String,
    pub expr: String,
}

fn is_truthy(lit: &str) -> bool {
    match bv2bin(lit) {
        Ok(bin) => bin.chars().any(|c| c == '1'),
        Err(_) => false,
    }
}

/// Walk the cell hierarchy rooted at `(module, state_expr)`, reporting every
/// leaf assertion that evaluates false. A cell whose module-wide assert
/// conjunction already evaluates true is not descended into (§4.8).
pub fn locate_failing_asserts<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    state_expr: &str,
) -> Result<Vec<LocatedAssert>, DriverError> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    locate_into(smt, modinfo, module, state_expr, &mut prefix, &mut out)?;
    Ok(out)
}

fn locate_into<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    state_expr: &str,
    prefix: &mut Vec<String>,
    out: &mut Vec<LocatedAssert>,
) -> Result<(), DriverError> {
    let atom = predicates::assert_all_atom_expr(module, state_expr);
    if is_truthy(&smt.get(&atom)?) {
        return Ok(());
    }

    let meta = modinfo.module(module)?;
    for (fun, info) in &meta.asserts {
        let expr = predicates::leaf_assert_expr(fun, state_expr);
        if !is_truthy(&smt.get(&expr)?) {
            out.push(LocatedAssert { path: prefix.join("."), info: info.clone() });
        }
    }

    for (cellname, celltype) in &meta.cells {
        let sub_state = predicates::cell_state_expr(module, cellname, state_expr);
        prefix.push(cellname.clone());
        locate_into(smt, modinfo, celltype, &sub_state, prefix, out)?;
        prefix.pop();
    }
    Ok(())
}

/// Evaluate every user assert active at step `i`, reporting the ones whose
/// resolved expression is false in the current model.
pub fn locate_user_asserts<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    step: u32,
) -> Result<Vec<LocatedUserAssert>, DriverError> {
    locate_user_asserts_at(smt, modinfo, module, db.asserts_at(StepKey::Step(step)), step)
}

/// Same as [`locate_user_asserts`] but for final-state obligations anchored
/// at `step`.
pub fn locate_final_user_asserts<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    db: &ConstraintDb,
    step: u32,
) -> Result<Vec<LocatedUserAssert>, DriverError> {
    locate_user_asserts_at(smt, modinfo, module, db.asserts_at(StepKey::Final(step)), step)
}

fn locate_user_asserts_at<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    constraints: &[crate::constraint::Constraint],
    home_step: u32,
) -> Result<Vec<LocatedUserAssert>, DriverError> {
    let resolved = resolve_user_exprs(modinfo, module, constraints, home_step)?;
    let mut out = Vec::new();
    for (c, expr) in constraints.iter().zip(resolved) {
        if !is_truthy(&smt.get(&expr)?) {
            out.push(LocatedUserAssert { loc: c.loc.clone(), expr: c.expr.clone() });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Constraint;
    use crate::modinfo::ModuleInfo;
    use crate::solver::testing::FakeSolver;

    fn sample_modinfo() -> ModuleInfo {
        let mut mi = ModuleInfo::new();
        for l in [
            "; yosys-smt2-module top",
            "; yosys-smt2-topmod top",
            "; yosys-smt2-assert top_a0 \"r == 0\" top",
            "; yosys-smt2-cell sub inst top_sub",
            "; yosys-smt2-module top_sub",
            "; yosys-smt2-assert sub_a0 \"q < 4\" top_sub",
        ] {
            mi.feed_line(l).unwrap();
        }
        mi
    }

    #[test]
    fn skips_subtree_when_module_assert_holds() {
        let mi = sample_modinfo();
        let mut fake = FakeSolver::default();
        // |top_a| true -> no descent, no leaf queries issued at all.
        fake.get_script.push_back("true".to_string());
        let out = locate_failing_asserts(&mut fake, &mi, "top", "s0").unwrap();
        assert!(out.is_empty());
        assert_eq!(fake.calls.len(), 1);
    }

    #[test]
    fn reports_failing_leaf_with_path_and_info() {
        let mi = sample_modinfo();
        let mut fake = FakeSolver::default();
        fake.get_script = vec![
            "false".to_string(), // top_a
            "false".to_string(), // top_a0 leaf
            "true".to_string(),  // sub's top_sub_a (no asserts fail under it)
        ]
        .into();
        let out = locate_failing_asserts(&mut fake, &mi, "top", "s0").unwrap();
        assert_eq!(out, vec![LocatedAssert { path: String::new(), info: "\"r == 0\"".to_string() }]);
    }

    #[test]
    fn locates_failing_user_assert_by_source_location() {
        let mi = ModuleInfo::new();
        let mut fake = FakeSolver::default();
        fake.get_script.push_back("#b0".to_string());
        let constraints = vec![Constraint { loc: "t.constr:3".to_string(), expr: "1 = 0".to_string() }];
        let out = locate_user_asserts_at(&mut fake, &mi, "top", &constraints, 0).unwrap();
        assert_eq!(out, vec![LocatedUserAssert { loc: "t.constr:3".to_string(), expr: "1 = 0".to_string() }]);
    }

    #[test]
    fn passing_user_assert_is_not_reported() {
        let mi = ModuleInfo::new();
        let mut fake = FakeSolver::default();
        fake.get_script.push_back("#b1".to_string());
        let constraints = vec![Constraint { loc: "t.constr:3".to_string(), expr: "1 = 1".to_string() }];
        let out = locate_user_asserts_at(&mut fake, &mi, "top", &constraints, 0).unwrap();
        assert!(out.is_empty());
    }
}
