use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::consts::DUMMY_PREFIX;
use crate::model::{AnalysisConfig, FuncId, RawTarget};

/// A function definition encountered in the disassembly stream, in
/// stream order. Dummy definitions already carry the real function's
/// name.
#[derive(Debug, Clone)]
pub struct Definition {
    pub id: FuncId,
    /// Came from a `__stack_check_dummy__` symbol
    pub dummy: bool,
}

/// Everything extracted from one object file's disassembly.
#[derive(Debug, Default)]
pub struct ObjectSummary {
    pub object: String,
    /// Raw call graph: defined identity -> textual call targets
    pub calls: BTreeMap<FuncId, BTreeSet<RawTarget>>,
    /// Zero-stripped address -> identity (dummies excluded)
    pub addresses: BTreeMap<String, FuncId>,
    /// Definitions in the order they appeared
    pub defs: Vec<Definition>,
}

/// Parser for the textual output of `objdump -dr` and for GCC
/// `-fstack-usage` records. The grammar is deliberately narrow: function
/// definition lines, call relocation lines, and `.su` size lines; format
/// drift in the disassembler stays contained here.
pub struct DisasmParser {
    def_re: Regex,
    call_re: Regex,
    text_offset_re: Regex,
    su_re: Regex,
}

impl DisasmParser {
    pub fn new() -> Self {
        Self {
            // e.g. "00000024 <uart_send>:"
            def_re: Regex::new(r"^([0-9a-fA-F]+) <(.*)>:").unwrap(),
            // e.g. "      12: R_AVR_CALL        .text+0x2a"
            call_re: Regex::new(r": R_[A-Za-z0-9_]+_CALL[ \t]+(.*)").unwrap(),
            text_offset_re: Regex::new(r"^\.text\+0x(.*)$").unwrap(),
            // e.g. "main.c:12:5:main        16      static"
            su_re: Regex::new(r"^.*:([^\t ]+)[ \t]+([0-9]+)").unwrap(),
        }
    }

    /// Parse one object file's disassembly into defined identities,
    /// their addresses, and the raw edges hanging off each definition.
    ///
    /// Call relocations belong to whichever definition most recently
    /// preceded them in the stream; relocations before any definition
    /// are dropped.
    pub fn parse_object(
        &self,
        object: &str,
        disassembly: &str,
        config: &AnalysisConfig,
    ) -> ObjectSummary {
        let mut summary = ObjectSummary {
            object: object.to_string(),
            ..ObjectSummary::default()
        };
        // most recent ingested definition; None while skipped by the
        // allow-list
        let mut current: Option<FuncId> = None;

        for line in disassembly.lines() {
            let line = line.trim();

            if let Some(caps) = self.def_re.captures(line) {
                let addr = &caps[1];
                let mut name = caps[2].to_string();

                // A dummy stands in for the real function it names; its
                // manual edges merge into that function's callee set.
                let dummy = name.starts_with(DUMMY_PREFIX);
                if dummy {
                    name = name[DUMMY_PREFIX.len()..].to_string();
                }

                if !allowed(config, &name) {
                    current = None;
                    continue;
                }

                let id = FuncId::new(name, object);
                summary.calls.entry(id.clone()).or_default();
                if !dummy {
                    summary
                        .addresses
                        .insert(addr.trim_start_matches('0').to_string(), id.clone());
                }
                summary.defs.push(Definition {
                    id: id.clone(),
                    dummy,
                });
                current = Some(id);
                continue;
            }

            if let Some(caps) = self.call_re.captures(line) {
                let target = self.classify_target(&caps[1], object);
                if let Some(source) = &current {
                    if let Some(callees) = summary.calls.get_mut(source) {
                        callees.insert(target);
                    }
                }
            }
        }

        log::debug!(
            "{}: {} definitions, {} call sites",
            object,
            summary.defs.len(),
            summary.calls.values().map(|c| c.len()).sum::<usize>()
        );

        summary
    }

    /// Rewrite a relocation target into its resolvable form. A bare
    /// `.text` is a self-reference to the section start (empty offset,
    /// matching a zero-stripped address of 0); `.text+0x<offset>` is an
    /// offset within this object; anything else is a global symbol name.
    fn classify_target(&self, target: &str, object: &str) -> RawTarget {
        if target == ".text" {
            return RawTarget::Offset {
                addr: String::new(),
                object: object.to_string(),
            };
        }
        if let Some(caps) = self.text_offset_re.captures(target) {
            return RawTarget::Offset {
                addr: caps[1].to_string(),
                object: object.to_string(),
            };
        }
        RawTarget::Name(target.to_string())
    }

    /// Parse `.su` frame-size records for one object. Every stored size
    /// includes the configured call overhead.
    pub fn parse_frame_records(
        &self,
        object: &str,
        records: &str,
        config: &AnalysisConfig,
    ) -> BTreeMap<FuncId, u64> {
        let mut sizes = BTreeMap::new();
        for line in records.lines() {
            if let Some(caps) = self.su_re.captures(line.trim()) {
                let Ok(size) = caps[2].parse::<u64>() else {
                    continue;
                };
                sizes.insert(
                    FuncId::new(&caps[1], object),
                    size + config.call_cost,
                );
            }
        }
        sizes
    }
}

fn allowed(config: &AnalysisConfig, name: &str) -> bool {
    config
        .allowlist
        .as_ref()
        .map_or(true, |list| list.contains(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISASM: &str = "\
sample.o:     file format elf32-avr

Disassembly of section .text:

00000000 <main>:
   0:\tcf 93       \tpush\tr28
   2:\t0e 94 00 00 \tcall\t0\t; 0x0
\t\t\t2: R_AVR_CALL\t.text+0x2a
   6:\t0e 94 00 00 \tcall\t0
\t\t\t6: R_AVR_CALL\tuart_send
   a:\t0e 94 00 00 \tcall\t0
\t\t\ta: R_AVR_CALL\t.text

0000002a <helper>:
  2a:\t08 95       \tret
";

    #[test]
    fn definitions_and_addresses() {
        let parser = DisasmParser::new();
        let summary = parser.parse_object("sample.o", DISASM, &AnalysisConfig::default());

        let main = FuncId::new("main", "sample.o");
        let helper = FuncId::new("helper", "sample.o");
        assert!(summary.calls.contains_key(&main));
        assert!(summary.calls.contains_key(&helper));
        assert_eq!(summary.addresses.get(""), Some(&main));
        assert_eq!(summary.addresses.get("2a"), Some(&helper));
    }

    #[test]
    fn edges_attach_to_preceding_definition() {
        let parser = DisasmParser::new();
        let summary = parser.parse_object("sample.o", DISASM, &AnalysisConfig::default());

        let callees = &summary.calls[&FuncId::new("main", "sample.o")];
        assert!(callees.contains(&RawTarget::Offset {
            addr: "2a".into(),
            object: "sample.o".into()
        }));
        assert!(callees.contains(&RawTarget::Name("uart_send".into())));
        // bare .text rewrites to the empty self-offset
        assert!(callees.contains(&RawTarget::Offset {
            addr: String::new(),
            object: "sample.o".into()
        }));
        assert!(summary.calls[&FuncId::new("helper", "sample.o")].is_empty());
    }

    #[test]
    fn dummy_prefix_is_stripped_and_address_skipped() {
        let text = "\
00000000 <dispatch>:
00000010 <__stack_check_dummy__dispatch>:
\t\t\t10: R_AVR_CALL\thandler
";
        let parser = DisasmParser::new();
        let summary = parser.parse_object("d.o", text, &AnalysisConfig::default());

        let dispatch = FuncId::new("dispatch", "d.o");
        // both definitions collapse onto the real function's key
        assert_eq!(summary.calls.len(), 1);
        assert!(summary.calls[&dispatch].contains(&RawTarget::Name("handler".into())));
        // the dummy's address must not shadow anything
        assert_eq!(summary.addresses.len(), 1);
        assert_eq!(summary.addresses.get(""), Some(&dispatch));
        assert_eq!(summary.defs.len(), 2);
        assert!(!summary.defs[0].dummy);
        assert!(summary.defs[1].dummy);
    }

    #[test]
    fn allowlist_skips_definitions_and_their_edges() {
        let mut config = AnalysisConfig::default();
        config.allowlist = Some(["helper".to_string()].into());

        let parser = DisasmParser::new();
        let summary = parser.parse_object("sample.o", DISASM, &AnalysisConfig::default());
        let filtered = parser.parse_object("sample.o", DISASM, &config);

        assert!(summary.calls.contains_key(&FuncId::new("main", "sample.o")));
        assert!(!filtered.calls.contains_key(&FuncId::new("main", "sample.o")));
        assert!(filtered.calls.contains_key(&FuncId::new("helper", "sample.o")));
        // main's relocations must not leak onto helper
        assert!(filtered.calls[&FuncId::new("helper", "sample.o")].is_empty());
    }

    #[test]
    fn frame_records_add_call_cost() {
        let records = "\
main.c:12:5:main\t16\tstatic
main.c:30:6:helper\t8\tstatic,ignoring_inline_asm
not a record line
";
        let parser = DisasmParser::new();
        let sizes =
            parser.parse_frame_records("sample.o", records, &AnalysisConfig::default());

        assert_eq!(sizes[&FuncId::new("main", "sample.o")], 20);
        assert_eq!(sizes[&FuncId::new("helper", "sample.o")], 12);
        assert_eq!(sizes.len(), 2);
    }
}
