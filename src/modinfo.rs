//! Module-metadata accessor
//!
//! The solver-ready input file is plain SMT-LIB2 interleaved with sideband
//! comment lines emitted by the synthesis pipeline that produced it, of the
//! form `; yosys-smt2-<kind> <args...>`. This module consumes exactly those
//! comment lines (the session forwards every line, comment or not, to the
//! solver verbatim; only comment lines are also routed here) and builds a
//! queryable [`ModuleInfo`]: per-module cell hierarchy, net/memory widths,
//! and the assert/anyconst function names the locator and free-value
//! reporter need.

#![allow(missing_docs)]

use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ModInfoError {
    #[error("malformed sideband comment: {0:?}")]
    Malformed(String),
    #[error("invalid integer in sideband comment: {0:?}")]
    BadInt(String),
    #[error("unknown module {0:?}")]
    UnknownModule(String),
    #[error("unknown cell {cell:?} in module {module:?}")]
    UnknownCell { module: String, cell: String },
    #[error("unknown net {net:?} in module {module:?}")]
    UnknownNet { module: String, net: String },
    #[error("unknown memory {mem:?} in module {module:?}")]
    UnknownMemory { module: String, mem: String },
}

#[derive(Clone, Debug, Default)]
pub struct MemoryMeta {
    pub abits: u32,
    pub width: u32,
    pub ports: u32,
    pub is_async: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ModuleMeta {
    pub name: String,
    /// Instance name -> celltype (module name), in declaration order.
    pub cells: Vec<(String, String)>,
    /// Net name -> width, for every input/output/register/wire, in
    /// declaration order. A net that is both e.g. an input and a register is
    /// recorded once under whichever kind was seen first.
    pub nets: Vec<(String, u32)>,
    pub registers: Vec<String>,
    pub inputs: Vec<(String, u32)>,
    pub outputs: Vec<(String, u32)>,
    pub memories: Vec<(String, MemoryMeta)>,
    /// Assert-predicate function name -> human-readable source annotation.
    pub asserts: Vec<(String, String)>,
    /// Anyconst function name -> (width, human-readable tag).
    pub anyconsts: Vec<(String, (u32, String))>,
}

impl ModuleMeta {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    fn net_width(&self, name: &str) -> Option<u32> {
        self.nets.iter().find(|(n, _)| n == name).map(|(_, w)| *w)
    }
}

/// All modules seen in the input stream, plus the declared top module (if
/// the sideband comments say so — a `-m` override on the CLI still wins).
#[derive(Clone, Debug, Default)]
pub struct ModuleInfo {
    pub modules: BTreeMap<String, ModuleMeta>,
    pub topmod: Option<String>,
}

impl ModuleInfo {
    pub fn new() -> Self {
        Self::default()
    }

    fn module_mut(&mut self, name: &str) -> &mut ModuleMeta {
        self.modules.entry(name.to_string()).or_insert_with(|| ModuleMeta::new(name))
    }

    pub fn module(&self, name: &str) -> Result<&ModuleMeta, ModInfoError> {
        self.modules.get(name).ok_or_else(|| ModInfoError::UnknownModule(name.to_string()))
    }

    /// Feed one line of the input stream. Non-comment lines and comment
    /// lines with an unrecognized prefix are silently ignored (forward
    /// compatibility with synthesis-pipeline comment extensions this crate
    /// does not know about).
    pub fn feed_line(&mut self, line: &str) -> Result<(), ModInfoError> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(';') else { return Ok(()) };
        let rest = rest.trim();
        let Some(rest) = rest.strip_prefix("yosys-smt2-") else { return Ok(()) };

        let mut tokens = rest.split_whitespace();
        let Some(kind) = tokens.next() else { return Ok(()) };
        let args: Vec<&str> = tokens.collect();

        match kind {
            "module" => {
                let [name] = require(&args, line)?;
                self.module_mut(name);
            }
            "topmod" => {
                let [name] = require(&args, line)?;
                self.topmod = Some(name.to_string());
            }
            "cell" => {
                let [celltype, instname, module] = require(&args, line)?;
                self.module_mut(module).cells.push((instname.to_string(), celltype.to_string()));
            }
            "input" | "output" | "wire" | "register" => {
                let [name, width, module] = require(&args, line)?;
                let width: u32 = width.parse().map_err(|_| ModInfoError::BadInt(width.to_string()))?;
                let m = self.module_mut(module);
                if m.net_width(name).is_none() {
                    m.nets.push((name.to_string(), width));
                }
                match kind {
                    "input" => m.inputs.push((name.to_string(), width)),
                    "output" => m.outputs.push((name.to_string(), width)),
                    "register" => m.registers.push(name.to_string()),
                    _ => {}
                }
            }
            "memory" => {
                let [name, abits, width, ports, is_async, module] = require(&args, line)?;
                let meta = MemoryMeta {
                    abits: abits.parse().map_err(|_| ModInfoError::BadInt(abits.to_string()))?,
                    width: width.parse().map_err(|_| ModInfoError::BadInt(width.to_string()))?,
                    ports: ports.parse().map_err(|_| ModInfoError::BadInt(ports.to_string()))?,
                    is_async: is_async == "1" || is_async.eq_ignore_ascii_case("true"),
                };
                self.module_mut(module).memories.push((name.to_string(), meta));
            }
            "assert" => {
                let module = args.first().ok_or_else(|| ModInfoError::Malformed(line.to_string()))?;
                let fun = args.get(1).ok_or_else(|| ModInfoError::Malformed(line.to_string()))?;
                let info = args[2..].join(" ");
                self.module_mut(module).asserts.push((fun.to_string(), info));
            }
            "anyconst" => {
                let module = args.first().ok_or_else(|| ModInfoError::Malformed(line.to_string()))?;
                let fun = args.get(1).ok_or_else(|| ModInfoError::Malformed(line.to_string()))?;
                let width: u32 = args
                    .get(2)
                    .ok_or_else(|| ModInfoError::Malformed(line.to_string()))?
                    .parse()
                    .map_err(|_| ModInfoError::BadInt(args[2].to_string()))?;
                let info = args[3..].join(" ");
                self.module_mut(module).anyconsts.push((fun.to_string(), (width, info)));
            }
            _ => {} // unrecognized kind: forward-compatible no-op.
        }
        Ok(())
    }

    pub fn net_width(&self, module: &str, path: &[String]) -> Result<u32, ModInfoError> {
        let (leaf_module, leaf_net) = self.leaf(module, path)?;
        self.module(&leaf_module)?
            .net_width(&leaf_net)
            .ok_or_else(|| ModInfoError::UnknownNet { module: leaf_module, net: leaf_net })
    }

    /// Resolve a hierarchical path down to the `(module, net_name)` pair of
    /// the leaf net, walking cell instances along the way.
    fn leaf(&self, module: &str, path: &[String]) -> Result<(String, String), ModInfoError> {
        if path.len() == 1 {
            return Ok((module.to_string(), path[0].clone()));
        }
        let cellname = &path[0];
        let m = self.module(module)?;
        let celltype = m
            .cells
            .iter()
            .find(|(n, _)| n == cellname)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| ModInfoError::UnknownCell { module: module.to_string(), cell: cellname.clone() })?;
        self.leaf(&celltype, &path[1..])
    }

    /// The solver-ground expression for net `path` in `module` at a state
    /// described by `state_expr` (e.g. `"s3"` or a nested `_h` selector).
    pub fn net_expr(&self, module: &str, state_expr: &str, path: &[String]) -> Result<String, ModInfoError> {
        if path.is_empty() {
            return Err(ModInfoError::Malformed("empty net path".to_string()));
        }
        if path.len() == 1 {
            self.module(module)?; // validate module exists
            return Ok(format!("(|{module}_n {}| {state_expr})", path[0]));
        }
        let cellname = &path[0];
        let m = self.module(module)?;
        let celltype = m
            .cells
            .iter()
            .find(|(n, _)| n == cellname)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| ModInfoError::UnknownCell { module: module.to_string(), cell: cellname.clone() })?;
        let sub_state = format!("(|{module}_h {cellname}| {state_expr})");
        self.net_expr(&celltype, &sub_state, &path[1..])
    }

    /// Full memory-array expression at `state_expr` for memory `path`.
    pub fn mem_expr(&self, module: &str, state_expr: &str, path: &[String]) -> Result<String, ModInfoError> {
        self.mem_scoped(module, state_expr, path, |m, s, name| format!("(|{m}_m {name}| {s})"))
    }

    /// Address expression at port `port` for memory `path`.
    pub fn mem_port_addr_expr(
        &self,
        module: &str,
        state_expr: &str,
        path: &[String],
        port: u32,
    ) -> Result<String, ModInfoError> {
        self.mem_scoped(module, state_expr, path, |m, s, name| format!("(|{m}_m {name}_ADDR {port}| {s})"))
    }

    fn mem_scoped(
        &self,
        module: &str,
        state_expr: &str,
        path: &[String],
        render: impl FnOnce(&str, &str, &str) -> String,
    ) -> Result<String, ModInfoError> {
        if path.len() == 1 {
            let m = self.module(module)?;
            if !m.memories.iter().any(|(n, _)| n == &path[0]) {
                return Err(ModInfoError::UnknownMemory { module: module.to_string(), mem: path[0].clone() });
            }
            return Ok(render(module, state_expr, &path[0]));
        }
        let cellname = &path[0];
        let m = self.module(module)?;
        let celltype = m
            .cells
            .iter()
            .find(|(n, _)| n == cellname)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| ModInfoError::UnknownCell { module: module.to_string(), cell: cellname.clone() })?;
        let sub_state = format!("(|{module}_h {cellname}| {state_expr})");
        self.mem_scoped(&celltype, &sub_state, &path[1..], render)
    }

    pub fn mem_info(&self, module: &str, path: &[String]) -> Result<MemoryMeta, ModInfoError> {
        let (leaf_module, leaf_name) = self.leaf(module, path)?;
        self.module(&leaf_module)?
            .memories
            .iter()
            .find(|(n, _)| n == &leaf_name)
            .map(|(_, meta)| meta.clone())
            .ok_or_else(|| ModInfoError::UnknownMemory { module: leaf_module, mem: leaf_name })
    }

    /// Enumerate every non-hidden net reachable from `module`, as dotted path
    /// segments, recursing into cell instances. If `regs_only`, only
    /// registers are returned.
    pub fn hiernets(&self, module: &str, regs_only: bool) -> Result<Vec<Vec<String>>, ModInfoError> {
        let mut out = Vec::new();
        self.hiernets_into(module, &mut Vec::new(), regs_only, &mut out)?;
        Ok(out)
    }

    fn hiernets_into(
        &self,
        module: &str,
        prefix: &mut Vec<String>,
        regs_only: bool,
        out: &mut Vec<Vec<String>>,
    ) -> Result<(), ModInfoError> {
        let m = self.module(module)?;
        let names: Vec<&str> = if regs_only {
            m.registers.iter().map(String::as_str).collect()
        } else {
            m.nets.iter().map(|(n, _)| n.as_str()).collect()
        };
        for name in names {
            if name.starts_with('$') {
                continue;
            }
            let mut path = prefix.clone();
            path.push(name.to_string());
            out.push(path);
        }
        for (cellname, celltype) in &m.cells {
            if cellname.starts_with('$') {
                continue;
            }
            prefix.push(cellname.clone());
            self.hiernets_into(celltype, prefix, regs_only, out)?;
            prefix.pop();
        }
        Ok(())
    }

    /// Enumerate every memory reachable from `module`, as dotted path segments.
    pub fn hiermems(&self, module: &str) -> Result<Vec<Vec<String>>, ModInfoError> {
        let mut out = Vec::new();
        self.hiermems_into(module, &mut Vec::new(), &mut out)?;
        Ok(out)
    }

    fn hiermems_into(
        &self,
        module: &str,
        prefix: &mut Vec<String>,
        out: &mut Vec<Vec<String>>,
    ) -> Result<(), ModInfoError> {
        let m = self.module(module)?;
        for (name, _) in &m.memories {
            if name.starts_with('$') {
                continue;
            }
            let mut path = prefix.clone();
            path.push(name.clone());
            out.push(path);
        }
        for (cellname, celltype) in &m.cells {
            if cellname.starts_with('$') {
                continue;
            }
            prefix.push(cellname.clone());
            self.hiermems_into(celltype, prefix, out)?;
            prefix.pop();
        }
        Ok(())
    }
}

/// Destructure `args` into exactly `N` elements, or error with `line` for context.
fn require<'a, const N: usize>(args: &[&'a str], line: &str) -> Result<[&'a str; N], ModInfoError> {
    args.try_into().map_err(|_| ModInfoError::Malformed(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModuleInfo {
        let mut mi = ModuleInfo::new();
        let lines = [
            "; yosys-smt2-module top",
            "; yosys-smt2-topmod top",
            "; yosys-smt2-input clk 1 top",
            "; yosys-smt2-register r 1 top",
            "; yosys-smt2-cell sub inst top_sub top",
            "; yosys-smt2-assert top_a \"r == 0\" top",
            "; yosys-smt2-module top_sub",
            "; yosys-smt2-register q 4 top_sub",
            "; yosys-smt2-memory mem 3 8 1 0 top_sub",
            "; yosys-smt2-anyconst top_sub_any 8 \"free byte\" top_sub",
            "(declare-sort |top_s| 0)",
        ];
        for l in lines {
            mi.feed_line(l).unwrap();
        }
        mi
    }

    #[test]
    fn parses_modules_cells_and_widths() {
        let mi = sample();
        assert_eq!(mi.topmod.as_deref(), Some("top"));
        assert_eq!(mi.net_width("top", &["r".to_string()]).unwrap(), 1);
        assert_eq!(mi.net_width("top", &["inst".to_string(), "q".to_string()]).unwrap(), 4);
    }

    #[test]
    fn non_comment_lines_are_ignored() {
        let mi = sample();
        assert!(mi.modules.contains_key("top"));
        assert_eq!(mi.modules.len(), 2);
    }

    #[test]
    fn unknown_prefix_is_a_silent_no_op() {
        let mut mi = ModuleInfo::new();
        mi.feed_line("; yosys-smt2-future-thing 1 2 3").unwrap();
        assert!(mi.modules.is_empty());
    }

    #[test]
    fn net_expr_nests_through_cell_hierarchy() {
        let mi = sample();
        let expr = mi.net_expr("top", "s3", &["inst".to_string(), "q".to_string()]).unwrap();
        assert_eq!(expr, "(|top_h inst| s3)");
        // net_expr recurses into top_sub with that as the new state_expr.
        assert!(expr.contains("top_h inst"));
        let full = mi.net_expr("top_sub", "(|top_h inst| s3)", &["q".to_string()]).unwrap();
        assert_eq!(full, "(|top_sub_n q| (|top_h inst| s3))");
    }

    #[test]
    fn mem_info_reports_geometry() {
        let mi = sample();
        let info = mi.mem_info("top_sub", &["mem".to_string()]).unwrap();
        assert_eq!((info.abits, info.width, info.ports), (3, 8, 1));
    }

    #[test]
    fn hiernets_recurses_and_skips_hidden() {
        let mi = sample();
        let nets = mi.hiernets("top", false).unwrap();
        assert!(nets.contains(&vec!["r".to_string()]));
        assert!(nets.contains(&vec!["inst".to_string(), "q".to_string()]));
    }

    #[test]
    fn hiernets_regs_only_filters() {
        let mi = sample();
        let regs = mi.hiernets("top", true).unwrap();
        assert!(regs.contains(&vec!["r".to_string()]));
        assert!(!regs.iter().any(|p| p == &vec!["clk".to_string()]));
    }

    #[test]
    fn hiermems_finds_nested_memory() {
        let mi = sample();
        let mems = mi.hiermems("top").unwrap();
        assert_eq!(mems, vec![vec!["inst".to_string(), "mem".to_string()]]);
    }

    #[test]
    fn unknown_module_is_an_error() {
        let mi = ModuleInfo::new();
        assert!(matches!(mi.module("nope"), Err(ModInfoError::UnknownModule(_))));
    }
}
