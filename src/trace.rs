use std::collections::{btree_set, BTreeMap, BTreeSet};

use crate::model::{FuncId, TraceResult};

/// Visitation state per node. Absent from the map means unvisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    /// On the traversal stack
    InProgress,
    /// On the traversal stack and known to lie on a cycle
    Promoted,
    /// Finished
    Done,
    /// Finished, on a cycle
    Recursive,
}

struct Frame<'a> {
    id: &'a FuncId,
    callees: btree_set::Iter<'a, FuncId>,
    max_cost: u64,
    max_height: u64,
}

/// Trace the resolved call graph and compute, per function, the
/// inherited worst-case cost, the call height, and whether it is
/// recursive. Also collects the set of functions that have a caller,
/// which reporting uses to mark roots.
///
/// The traversal is a memoized depth-first walk over an explicit work
/// stack, so deep or heavily recursive graphs cannot overflow the host
/// stack. A back edge to an in-progress node is cut on the spot: it
/// contributes neither cost nor height, and every node on the stack from
/// the target upward is promoted to recursive since all of them sit on
/// the detected cycle. Costs of recursive functions therefore cover
/// exactly one level of unrolling.
pub fn trace_graph(
    graph: &BTreeMap<FuncId, BTreeSet<FuncId>>,
    frame_sizes: &BTreeMap<FuncId, u64>,
) -> (BTreeMap<FuncId, TraceResult>, BTreeSet<FuncId>) {
    let mut state: BTreeMap<&FuncId, Visit> = BTreeMap::new();
    let mut results: BTreeMap<FuncId, TraceResult> = BTreeMap::new();
    let mut has_caller: BTreeSet<FuncId> = BTreeSet::new();

    for root in graph.keys() {
        if state.contains_key(root) {
            continue;
        }
        state.insert(root, Visit::InProgress);
        let mut stack = vec![Frame {
            id: root,
            callees: graph[root].iter(),
            max_cost: 0,
            max_height: 0,
        }];

        while let Some(top) = stack.last_mut() {
            let next = top.callees.next();
            match next {
                Some(callee) => {
                    has_caller.insert(callee.clone());
                    match state.get(callee).copied() {
                        None => {
                            if let Some(callees) = graph.get(callee) {
                                state.insert(callee, Visit::InProgress);
                                stack.push(Frame {
                                    id: callee,
                                    callees: callees.iter(),
                                    max_cost: 0,
                                    max_height: 0,
                                });
                            } else {
                                // resolved graphs key every callee; a
                                // stray node is costed as a leaf
                                let result = TraceResult {
                                    cost: frame_sizes.get(callee).copied().unwrap_or(0),
                                    height: 1,
                                    recursive: false,
                                };
                                results.insert(callee.clone(), result);
                                state.insert(callee, Visit::Done);
                                let top = stack.last_mut().unwrap();
                                top.max_cost = top.max_cost.max(result.cost);
                                top.max_height = top.max_height.max(result.height);
                            }
                        }
                        Some(Visit::InProgress) | Some(Visit::Promoted) => {
                            // back edge: cut it, and everything on the
                            // stack from the target upward is on the cycle
                            if let Some(pos) = stack.iter().position(|f| f.id == callee) {
                                for frame in &stack[pos..] {
                                    state.insert(frame.id, Visit::Promoted);
                                }
                            }
                        }
                        Some(Visit::Done) | Some(Visit::Recursive) => {
                            let memoized = results[callee];
                            let top = stack.last_mut().unwrap();
                            top.max_cost = top.max_cost.max(memoized.cost);
                            top.max_height = top.max_height.max(memoized.height);
                        }
                    }
                }
                None => {
                    let finished = stack.pop().unwrap();
                    let recursive =
                        matches!(state.get(finished.id), Some(Visit::Promoted));
                    let result = TraceResult {
                        cost: frame_sizes.get(finished.id).copied().unwrap_or(0)
                            + finished.max_cost,
                        height: finished.max_height + 1,
                        recursive,
                    };
                    state.insert(
                        finished.id,
                        if recursive { Visit::Recursive } else { Visit::Done },
                    );
                    results.insert(finished.id.clone(), result);
                    if let Some(parent) = stack.last_mut() {
                        parent.max_cost = parent.max_cost.max(result.cost);
                        parent.max_height = parent.max_height.max(result.height);
                    }
                }
            }
        }
    }

    (results, has_caller)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> FuncId {
        FuncId::new(name, "t.o")
    }

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<FuncId, BTreeSet<FuncId>> {
        edges
            .iter()
            .map(|(from, to)| (id(from), to.iter().map(|t| id(t)).collect()))
            .collect()
    }

    fn frames(sizes: &[(&str, u64)]) -> BTreeMap<FuncId, u64> {
        sizes.iter().map(|(name, size)| (id(name), *size)).collect()
    }

    #[test]
    fn leaf_costs_its_own_frame() {
        let g = graph(&[("leaf", &[]), ("caller", &["leaf"])]);
        let f = frames(&[("leaf", 8), ("caller", 16)]);
        let (results, has_caller) = trace_graph(&g, &f);

        assert_eq!(results[&id("leaf")].cost, 8);
        assert_eq!(results[&id("leaf")].height, 1);
        assert_eq!(results[&id("caller")].cost, 24);
        assert_eq!(results[&id("caller")].height, 2);
        assert!(!results[&id("caller")].recursive);
        assert!(has_caller.contains(&id("leaf")));
        assert!(!has_caller.contains(&id("caller")));
    }

    #[test]
    fn missing_frame_size_defaults_to_zero() {
        let g = graph(&[("caller", &["mystery"]), ("mystery", &[])]);
        let f = frames(&[("caller", 10)]);
        let (results, _) = trace_graph(&g, &f);

        assert_eq!(results[&id("mystery")].cost, 0);
        assert_eq!(results[&id("caller")].cost, 10);
    }

    #[test]
    fn deepest_branch_wins() {
        let g = graph(&[
            ("top", &["shallow", "deep"]),
            ("shallow", &[]),
            ("deep", &["deeper"]),
            ("deeper", &[]),
        ]);
        let f = frames(&[("top", 4), ("shallow", 100), ("deep", 8), ("deeper", 8)]);
        let (results, _) = trace_graph(&g, &f);

        // shallow costs more, deep reaches further
        assert_eq!(results[&id("top")].cost, 104);
        assert_eq!(results[&id("top")].height, 3);
    }

    #[test]
    fn self_recursion_is_cut_once() {
        let g = graph(&[("loop", &["loop"])]);
        let f = frames(&[("loop", 12)]);
        let (results, has_caller) = trace_graph(&g, &f);

        assert!(results[&id("loop")].recursive);
        assert_eq!(results[&id("loop")].cost, 12);
        assert_eq!(results[&id("loop")].height, 1);
        assert!(has_caller.contains(&id("loop")));
    }

    #[test]
    fn mutual_recursion_marks_both_nodes() {
        let g = graph(&[("a", &["b"]), ("b", &["a"])]);
        let f = frames(&[("a", 10), ("b", 20)]);
        let (results, _) = trace_graph(&g, &f);

        assert!(results[&id("a")].recursive);
        assert!(results[&id("b")].recursive);
        // one level of unrolling, not an unbounded sum
        assert_eq!(results[&id("a")].cost, 30);
        assert_eq!(results[&id("b")].cost, 20);
    }

    #[test]
    fn indirect_cycle_promotes_every_member() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("out", &["a"])]);
        let f = frames(&[("a", 1), ("b", 2), ("c", 4), ("out", 8)]);
        let (results, _) = trace_graph(&g, &f);

        for name in ["a", "b", "c"] {
            assert!(results[&id(name)].recursive, "{} should be recursive", name);
        }
        assert!(!results[&id("out")].recursive);
        assert_eq!(results[&id("out")].cost, 8 + results[&id("a")].cost);
    }

    #[test]
    fn shared_callee_is_memoized_not_recursive() {
        let g = graph(&[
            ("a", &["left", "right"]),
            ("left", &["shared"]),
            ("right", &["shared"]),
            ("shared", &[]),
        ]);
        let f = frames(&[("a", 1), ("left", 2), ("right", 4), ("shared", 8)]);
        let (results, _) = trace_graph(&g, &f);

        assert!(results.values().all(|r| !r.recursive));
        assert_eq!(results[&id("a")].cost, 1 + 4 + 8);
        assert_eq!(results[&id("a")].height, 3);
    }

    #[test]
    fn deep_chain_does_not_overflow_the_host_stack() {
        let depth = 50_000u64;
        let mut g = BTreeMap::new();
        for i in 0..depth {
            let callees: BTreeSet<FuncId> = if i + 1 < depth {
                [id(&format!("f{:06}", i + 1))].into()
            } else {
                BTreeSet::new()
            };
            g.insert(id(&format!("f{:06}", i)), callees);
        }
        let f = g.keys().map(|k| (k.clone(), 1u64)).collect();
        let (results, _) = trace_graph(&g, &f);

        assert_eq!(results[&id("f000000")].cost, depth);
        assert_eq!(results[&id("f000000")].height, depth);
    }
}
