use std::collections::{BTreeMap, BTreeSet};

use crate::model::{FuncId, RawTarget};

/// Fold one object's raw edges into the whole-program graph. The same
/// key from two sources unions its callee sets, which is what merges a
/// dummy's manual edges into the real function.
pub fn merge_into(
    graph: &mut BTreeMap<FuncId, BTreeSet<RawTarget>>,
    calls: BTreeMap<FuncId, BTreeSet<RawTarget>>,
) {
    for (id, targets) in calls {
        graph.entry(id).or_default().extend(targets);
    }
}

/// Add the synthetic node whose callees are all interrupt vector entry
/// points. Tracing it yields the single worst-case interrupt-context
/// cost without anyone having to enumerate vectors by hand.
pub fn add_interrupt_root(graph: &mut BTreeMap<FuncId, BTreeSet<FuncId>>) {
    let vectors: BTreeSet<FuncId> = graph
        .keys()
        .filter(|id| id.is_vector())
        .cloned()
        .collect();
    graph.insert(FuncId::interrupt_root(), vectors);
}
