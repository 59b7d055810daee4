use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_CALL_COST, DEFAULT_OBJDUMP, INTERRUPT_ROOT, VECTOR_PREFIX};

/// A function qualified by the object file that defines it. Two functions
/// with the same bare name in different object files are distinct nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FuncId {
    /// Bare symbol name as it appears in the disassembly
    pub name: String,
    /// Object file the definition came from (empty for synthetic nodes)
    pub object: String,
}

impl FuncId {
    pub fn new(name: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object: object.into(),
        }
    }

    /// The synthetic root standing for all interrupt vector entry points
    pub fn interrupt_root() -> Self {
        Self {
            name: INTERRUPT_ROOT.to_string(),
            object: String::new(),
        }
    }

    /// True for interrupt vector entry points (`__vector_N`)
    pub fn is_vector(&self) -> bool {
        self.name.starts_with(VECTOR_PREFIX)
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.object.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.object)
        }
    }
}

/// A call-site reference as parsed from a relocation line, before symbol
/// resolution. Resolves to exactly one [`FuncId`] or lands in the
/// unresolved set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RawTarget {
    /// Section-relative offset within a specific object file, leading
    /// zeros stripped to match the address table
    Offset { addr: String, object: String },
    /// Bare global symbol name
    Name(String),
    /// Already qualified (seen when re-resolving a resolved graph)
    Qualified(FuncId),
}

impl fmt::Display for RawTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTarget::Offset { addr, object } => write!(f, "{}@{}", addr, object),
            RawTarget::Name(name) => write!(f, "{}", name),
            RawTarget::Qualified(id) => write!(f, "{}", id),
        }
    }
}

/// Knobs for a single analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Disassembler executable invoked once per object file
    pub objdump: String,
    /// Bytes charged to every call on top of the compiler-reported frame
    pub call_cost: u64,
    /// Warn when a bare name resolves against multiple definitions
    pub log_ambiguous: bool,
    /// When set, only these bare names are ingested
    pub allowlist: Option<HashSet<String>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            objdump: DEFAULT_OBJDUMP.to_string(),
            call_cost: DEFAULT_CALL_COST,
            log_ambiguous: true,
            allowlist: None,
        }
    }
}

/// Per-function results of the cost trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceResult {
    /// Worst-case stack bytes from entry through the deepest callee chain
    pub cost: u64,
    /// Longest call chain in hops, counting the function itself as 1
    pub height: u64,
    /// Lies on a call cycle; cost then covers a single unrolling
    pub recursive: bool,
}

/// Everything a run produces. Built once, immutable afterwards.
#[derive(Debug)]
pub struct AnalysisResult {
    /// Resolved call graph, including the interrupt root
    pub graph: BTreeMap<FuncId, BTreeSet<FuncId>>,
    /// Frame sizes with the call overhead already added; absent means 0
    pub frame_sizes: BTreeMap<FuncId, u64>,
    /// Cost, height and recursion flag per function
    pub results: BTreeMap<FuncId, TraceResult>,
    /// Functions that appear as someone's callee (reporting only)
    pub has_caller: BTreeSet<FuncId>,
    /// Bare name -> last identity registered under it
    pub global_names: BTreeMap<String, FuncId>,
    /// Bare names defined by more than one translation unit
    pub ambiguous: BTreeSet<String>,
    /// Call targets that matched no known address, name or graph key
    pub unresolved: BTreeSet<RawTarget>,
}

impl AnalysisResult {
    /// Frame size stored for `id`, 0 when no record exists (library or
    /// unanalyzed routines).
    pub fn frame_size(&self, id: &FuncId) -> u64 {
        self.frame_sizes.get(id).copied().unwrap_or(0)
    }
}
