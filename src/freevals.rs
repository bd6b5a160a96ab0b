//! Free-value reporter (C9)
//!
//! On a counterexample, walks the module hierarchy and reports the
//! solver-chosen value of every registered "free symbolic constant"
//! (`anyconst`-style function) in every sub-instance, so the operator can
//! see which concrete choice triggered the failure.

#![allow(missing_docs)]

use crate::driver::DriverError;
use crate::modinfo::ModuleInfo;
use crate::predicates;
use crate::solver::{bv2bin, SmtBackend};

/// One free-constant value, with its instance path, declared width, and
/// human-supplied tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreeValue {
    pub path: String,
    pub width: u32,
    pub tag: String,
    pub value: String,
}

pub fn report<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    state_expr: &str,
) -> Result<Vec<FreeValue>, DriverError> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    report_into(smt, modinfo, module, state_expr, &mut prefix, &mut out)?;
    Ok(out)
}

fn report_into<S: SmtBackend>(
    smt: &mut S,
    modinfo: &ModuleInfo,
    module: &str,
    state_expr: &str,
    prefix: &mut Vec<String>,
    out: &mut Vec<FreeValue>,
) -> Result<(), DriverError> {
    let meta = modinfo.module(module)?;
    for (fun, (width, tag)) in &meta.anyconsts {
        let expr = predicates::anyconst_expr(fun, state_expr);
        let raw = smt.get(&expr)?;
        let value = bv2bin(&raw)?;
        out.push(FreeValue { path: prefix.join("."), width: *width, tag: tag.clone(), value });
    }
    for (cellname, celltype) in &meta.cells {
        let sub_state = predicates::cell_state_expr(module, cellname, state_expr);
        prefix.push(cellname.clone());
        report_into(smt, modinfo, celltype, &sub_state, prefix, out)?;
        prefix.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modinfo::ModuleInfo;
    use crate::solver::testing::FakeSolver;

    fn sample_modinfo() -> ModuleInfo {
        let mut mi = ModuleInfo::new();
        for l in [
            "; yosys-smt2-module top",
            "; yosys-smt2-topmod top",
            "; yosys-smt2-anyconst top_any 8 \"free byte\" top",
            "; yosys-smt2-cell sub inst top_sub",
            "; yosys-smt2-module top_sub",
            "; yosys-smt2-anyconst sub_any 1 \"free bit\" top_sub",
        ] {
            mi.feed_line(l).unwrap();
        }
        mi
    }

    #[test]
    fn reports_free_values_with_paths_and_tags() {
        let mi = sample_modinfo();
        let mut fake = FakeSolver::default();
        fake.get_script = vec!["#xAB".to_string(), "#b1".to_string()].into();
        let out = report(&mut fake, &mi, "top", "s2").unwrap();
        assert_eq!(
            out,
            vec![
                FreeValue { path: String::new(), width: 8, tag: "\"free byte\"".to_string(), value: "10101011".to_string() },
                FreeValue { path: "inst".to_string(), width: 1, tag: "\"free bit\"".to_string(), value: "1".to_string() },
            ]
        );
    }

    #[test]
    fn no_anyconsts_yields_empty_report() {
        let mi = ModuleInfo::new();
        let mut fake = FakeSolver::default();
        let out = report(&mut fake, &mi, "missing", "s0");
        assert!(out.is_err());
    }
}
