//! Value-change-dump encoder
//!
//! A small self-contained VCD writer: identifier allocation, header/scope
//! emission mirroring the design's cell hierarchy, and `$dumpvars`/`#<time>`
//! value-change framing. `witness` is the only caller; kept separate so the
//! wire format has no dependency on `modinfo` or the solver.

#![allow(missing_docs)]

use std::collections::BTreeMap;

/// One net to be dumped: its full hierarchical path and declared bit width.
#[derive(Clone, Debug)]
pub struct NetDecl {
    pub path: Vec<String>,
    pub width: u32,
}

/// Printable ASCII identifier characters, per the VCD spec (`!` through `~`).
const ID_CHARS: &[u8] = b"!\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

fn alloc_id(mut n: usize) -> String {
    let base = ID_CHARS.len();
    let mut chars = Vec::new();
    loop {
        chars.push(ID_CHARS[n % base] as char);
        n /= base;
        if n == 0 {
            break;
        }
        n -= 1;
    }
    chars.into_iter().collect()
}

#[derive(Default)]
struct ScopeNode {
    vars: Vec<(String, u32, String)>,
    children: BTreeMap<String, ScopeNode>,
}

fn build_tree(nets: &[NetDecl], ids: &[String]) -> ScopeNode {
    let mut root = ScopeNode::default();
    for (net, id) in nets.iter().zip(ids) {
        let mut node = &mut root;
        for seg in &net.path[..net.path.len() - 1] {
            node = node.children.entry(seg.clone()).or_default();
        }
        let name = net.path.last().cloned().unwrap_or_default();
        node.vars.push((name, net.width, id.clone()));
    }
    root
}

fn write_scope_node(buf: &mut String, name: Option<&str>, node: &ScopeNode) {
    if let Some(name) = name {
        buf.push_str(&format!("$scope module {name} $end\n"));
    }
    for (vname, width, id) in &node.vars {
        buf.push_str(&format!("$var wire {width} {id} {vname} $end\n"));
    }
    for (cname, child) in &node.children {
        write_scope_node(buf, Some(cname), child);
    }
    if name.is_some() {
        buf.push_str("$upscope $end\n");
    }
}

/// Incrementally builds a VCD file: construct with the full net list (which
/// fixes identifier assignment and the header), then feed `set_time`/
/// `write_value` calls in non-decreasing time order, and `finish` to get the
/// final text.
pub struct VcdWriter {
    buf: String,
}

impl VcdWriter {
    /// `top_module` names the outermost `$scope`; `nets` is the full dump
    /// list. Returns the writer plus the per-net identifier, in the same
    /// order as `nets`, for `write_value` calls.
    pub fn new(top_module: &str, nets: &[NetDecl]) -> (Self, Vec<String>) {
        let mut buf = String::new();
        buf.push_str("$date\n  (generated by smtbmc)\n$end\n");
        buf.push_str("$version\n  smtbmc\n$end\n");
        buf.push_str("$timescale 1 ns $end\n");

        let ids: Vec<String> = (0..nets.len()).map(alloc_id).collect();
        let tree = build_tree(nets, &ids);
        write_scope_node(&mut buf, Some(top_module), &tree);
        buf.push_str("$enddefinitions $end\n");

        (Self { buf }, ids)
    }

    pub fn set_time(&mut self, t: u32) {
        self.buf.push_str(&format!("#{t}\n"));
    }

    /// Write one value change. `bits` is a binary string (MSB-first); single
    /// bit values use the compact `0a`/`1a` form, wider ones use `b<bits> a`.
    pub fn write_value(&mut self, id: &str, bits: &str) {
        if bits.len() == 1 {
            self.buf.push_str(bits);
            self.buf.push_str(id);
            self.buf.push('\n');
        } else {
            self.buf.push('b');
            self.buf.push_str(bits);
            self.buf.push(' ');
            self.buf.push_str(id);
            self.buf.push('\n');
        }
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_id_is_stable_and_distinct() {
        let ids: Vec<String> = (0..200).map(alloc_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }

    #[test]
    fn header_nests_scopes_by_path_prefix() {
        let nets = vec![
            NetDecl { path: vec!["r".to_string()], width: 1 },
            NetDecl { path: vec!["inst".to_string(), "q".to_string()], width: 4 },
        ];
        let (writer, ids) = VcdWriter::new("top", &nets);
        assert_eq!(ids.len(), 2);
        let text = writer.finish();
        assert!(text.contains("$scope module top $end"));
        assert!(text.contains("$scope module inst $end"));
        assert!(text.contains("$var wire 1"));
        assert!(text.contains("$var wire 4"));
        assert!(text.matches("$upscope $end").count() == 2);
    }

    #[test]
    fn single_bit_value_uses_compact_form() {
        let nets = vec![NetDecl { path: vec!["r".to_string()], width: 1 }];
        let (mut writer, ids) = VcdWriter::new("top", &nets);
        writer.set_time(0);
        writer.write_value(&ids[0], "1");
        let text = writer.finish();
        assert!(text.contains(&format!("1{}", ids[0])));
    }

    #[test]
    fn wide_value_uses_b_form() {
        let nets = vec![NetDecl { path: vec!["q".to_string()], width: 4 }];
        let (mut writer, ids) = VcdWriter::new("top", &nets);
        writer.write_value(&ids[0], "1010");
        let text = writer.finish();
        assert!(text.contains(&format!("b1010 {}", ids[0])));
    }
}
