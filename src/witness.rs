//! Witness writer (C7)
//!
//! Materializes a counterexample or gentrace witness into up to three
//! sinks — VCD, a self-checking Verilog test bench, and a replay constraint
//! script — from a single `write_trace` call. Any subset may be enabled;
//! disabled sinks are simply skipped. All three read the *current* solver
//! model, so the caller must invoke `write_trace` before popping the scope
//! the model belongs to.

#![allow(missing_docs)]

use std::collections::BTreeSet;

use crate::driver::DriverError;
use crate::modinfo::{MemoryMeta, ModuleInfo};
use crate::predicates;
use crate::solver::{self, bv2bin, query, SmtBackend};
use crate::vcd::{NetDecl, VcdWriter};

fn is_clock_name(name: &str) -> bool {
    matches!(name, "clk" | "clock" | "CLK" | "CLOCK")
}

fn substitute_tag(path: &str, tag: Option<u32>) -> String {
    match tag {
        Some(i) => path.replace('%', &i.to_string()),
        None => path.to_string(),
    }
}

fn bin_literal(bits: &str) -> String {
    format!("#b{bits}")
}

fn addr_to_int(bits: &str) -> u128 {
    u128::from_str_radix(bits, 2).unwrap_or(0)
}

/// The set of configured output sinks for one run. Borrowed paths (`&str`)
/// so the caller (typically `RunConfig`) stays the single owner.
#[derive(Copy, Clone, Debug, Default)]
pub struct WitnessWriter<'a> {
    pub dump_vcd: Option<&'a str>,
    pub dump_vlogtb: Option<&'a str>,
    pub dump_smtc: Option<&'a str>,
}

impl<'a> WitnessWriter<'a> {
    /// Materialize whichever sinks are configured, for the half-open step
    /// range `[start, stop)`, against the model currently active on `smt`.
    /// `index_tag` substitutes for a literal `%` in configured paths
    /// (multi-dump `--dump-all` runs); `None` for a single-shot dump.
    pub fn write_trace<S: SmtBackend>(
        &self,
        smt: &mut S,
        modinfo: &ModuleInfo,
        module: &str,
        start: u32,
        stop: u32,
        index_tag: Option<u32>,
    ) -> Result<(), DriverError> {
        if let Some(path) = self.dump_vcd {
            self.write_vcd(smt, modinfo, module, start, stop, &substitute_tag(path, index_tag))?;
        }
        if let Some(path) = self.dump_vlogtb {
            self.write_vlogtb(smt, modinfo, module, start, stop, &substitute_tag(path, index_tag))?;
        }
        if let Some(path) = self.dump_smtc {
            self.write_smtc(smt, modinfo, module, start, stop, &substitute_tag(path, index_tag))?;
        }
        Ok(())
    }

    fn write_vcd<S: SmtBackend>(
        &self,
        smt: &mut S,
        modinfo: &ModuleInfo,
        module: &str,
        start: u32,
        stop: u32,
        path: &str,
    ) -> Result<(), DriverError> {
        let paths = modinfo.hiernets(module, false)?;
        let decls: Vec<NetDecl> = paths
            .iter()
            .map(|p| Ok(NetDecl { path: p.clone(), width: modinfo.net_width(module, p)? }))
            .collect::<Result<_, crate::modinfo::ModInfoError>>()?;
        let (mut writer, ids) = VcdWriter::new(module, &decls);

        for step in start..stop {
            writer.set_time(step);
            let state_expr = predicates::state_var(step);
            let values = query::get_net_binary_list(smt, modinfo, module, &paths, &state_expr)?;
            for (id, bits) in ids.iter().zip(values) {
                writer.write_value(id, &bits);
            }
        }
        writer.set_time(stop);

        std::fs::write(path, writer.finish())
            .map_err(|source| DriverError::Io { path: path.to_string(), source })
    }

    fn reachable_addresses<S: SmtBackend>(
        &self,
        smt: &mut S,
        modinfo: &ModuleInfo,
        module: &str,
        mem_path: &[String],
        info: &MemoryMeta,
        start: u32,
        stop: u32,
    ) -> Result<Vec<String>, DriverError> {
        let mut addrs = BTreeSet::new();
        for step in start..stop {
            for port in 0..info.ports {
                let expr = modinfo.mem_port_addr_expr(module, &predicates::state_var(step), mem_path, port)?;
                let val = smt.get(&expr)?;
                addrs.insert(bv2bin(&val)?);
            }
        }
        Ok(addrs.into_iter().collect())
    }

    fn write_vlogtb<S: SmtBackend>(
        &self,
        smt: &mut S,
        modinfo: &ModuleInfo,
        module: &str,
        start: u32,
        stop: u32,
        path: &str,
    ) -> Result<(), DriverError> {
        let meta = modinfo.module(module)?.clone();
        let mut out = String::new();
        out.push_str("`timescale 1ns/1ns\n");
        out.push_str("module testbench;\n");

        let (clk_inputs, plain_inputs): (Vec<_>, Vec<_>) =
            meta.inputs.iter().partition(|(n, _)| is_clock_name(n));

        for (name, _) in &clk_inputs {
            out.push_str(&format!("  reg {name} = 0;\n"));
        }
        for (name, width) in &plain_inputs {
            if *width == 1 {
                out.push_str(&format!("  reg {name};\n"));
            } else {
                out.push_str(&format!("  reg [{}:0] {name};\n", width - 1));
            }
        }
        out.push('\n');

        let port_names: Vec<&str> =
            meta.inputs.iter().chain(meta.outputs.iter()).map(|(n, _)| n.as_str()).collect();
        let ports: Vec<String> = port_names.iter().map(|n| format!(".{n}({n})")).collect();
        out.push_str(&format!("  {module} uut ({});\n\n", ports.join(", ")));

        for (name, _) in &clk_inputs {
            out.push_str(&format!("  always #5 {name} = !{name};\n"));
        }
        out.push('\n');

        out.push_str("  initial begin\n");
        for reg in &meta.registers {
            if reg.starts_with('$') {
                continue;
            }
            let path = vec![reg.clone()];
            let values = query::get_net_binary_list(smt, modinfo, module, &[path], &predicates::state_var(start))?;
            let bits = &values[0];
            out.push_str(&format!("    uut.{reg} = {}'b{bits};\n", bits.len()));
        }
        for mem_path in modinfo.hiermems(module)? {
            let info = modinfo.mem_info(module, &mem_path)?;
            let addrs = self.reachable_addresses(smt, modinfo, module, &mem_path, &info, start, stop)?;
            let data_expr = modinfo.mem_expr(module, &predicates::state_var(start), &mem_path)?;
            let mem_name = mem_path.join(".");
            for addr in &addrs {
                let sel = format!("(select {data_expr} {})", bin_literal(addr));
                let bits = bv2bin(&smt.get(&sel)?)?;
                out.push_str(&format!(
                    "    uut.{mem_name}[{}] = {}'b{bits};\n",
                    addr_to_int(addr),
                    bits.len()
                ));
            }
        }
        out.push('\n');

        for step in start..stop {
            if step > start {
                for (name, _) in &clk_inputs {
                    out.push_str(&format!("    @(posedge {name});\n"));
                }
            }
            for (name, _) in &plain_inputs {
                if name.starts_with('$') {
                    continue;
                }
                let path = vec![name.to_string()];
                let values =
                    query::get_net_binary_list(smt, modinfo, module, &[path], &predicates::state_var(step))?;
                let bits = &values[0];
                out.push_str(&format!("    {name} = {}'b{bits};\n", bits.len()));
            }
        }
        out.push_str("    $finish;\n");
        out.push_str("  end\n");
        out.push_str("endmodule\n");

        std::fs::write(path, out).map_err(|source| DriverError::Io { path: path.to_string(), source })
    }

    fn write_smtc<S: SmtBackend>(
        &self,
        smt: &mut S,
        modinfo: &ModuleInfo,
        module: &str,
        start: u32,
        stop: u32,
        path: &str,
    ) -> Result<(), DriverError> {
        let meta = modinfo.module(module)?.clone();
        let mut out = String::new();

        if start == 0 {
            out.push_str("initial\n");
        } else {
            out.push_str(&format!("state {start}\n"));
        }

        for reg in &meta.registers {
            if reg.starts_with('$') {
                continue;
            }
            let rpath = vec![reg.clone()];
            let values = query::get_net_binary_list(smt, modinfo, module, &[rpath], &predicates::state_var(start))?;
            out.push_str(&format!("assume (= [{reg}] {})\n", bin_literal(&values[0])));
        }

        for mem_path in modinfo.hiermems(module)? {
            let info = modinfo.mem_info(module, &mem_path)?;
            let addrs = self.reachable_addresses(smt, modinfo, module, &mem_path, &info, start, stop)?;
            let data_expr = modinfo.mem_expr(module, &predicates::state_var(start), &mem_path)?;
            let mem_name = mem_path.join(".");
            for addr in &addrs {
                let sel = format!("(select {data_expr} {})", bin_literal(addr));
                let bits = bv2bin(&smt.get(&sel)?)?;
                out.push_str(&format!(
                    "assume (= (select [{mem_name}] {}) {})\n",
                    bin_literal(addr),
                    bin_literal(&bits)
                ));
            }
        }

        for step in (start + 1)..stop {
            out.push_str(&format!("state {step}\n"));
            for (name, _) in &meta.inputs {
                if name.starts_with('$') {
                    continue;
                }
                let ipath = vec![name.clone()];
                let values =
                    query::get_net_binary_list(smt, modinfo, module, &[ipath], &predicates::state_var(step))?;
                out.push_str(&format!("assume (= [{name}] {})\n", bin_literal(&values[0])));
            }
        }

        std::fs::write(path, out).map_err(|source| DriverError::Io { path: path.to_string(), source })
    }
}
