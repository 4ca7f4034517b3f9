//! Cycle detection.
//!
//! Recursive call chains form strongly connected components in the call
//! graph; traversed naively they would accumulate unbounded inclusive
//! costs. [`Data::update_function_cycles`] finds the SCCs on demand and
//! collapses each cluster (or self-calling function) behind a synthesized
//! [`FunctionKind::Cycle`] node. Intra-cycle calls are suppressed from the
//! cycle's external view; the skip-cycle accessors substitute the cycle
//! node for member functions so call-graph views stay acyclic.
//!
//! Node order follows the function store and edge order each function's
//! outgoing call list, both stable across reruns, so cycle numbering is
//! deterministic and a second detection run reproduces the first.

use std::collections::BTreeSet;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::data::Data;
use crate::function::{Function, FunctionKind};
use crate::group::GroupCycle;
use crate::item::{CallId, ClassId, FileId, FunctionId, ObjectId};

impl Data {
    /// The cycle number when both endpoints of the call sit in the same
    /// cycle, `None` otherwise.
    #[must_use]
    pub fn call_in_cycle(&self, c: CallId) -> Option<u32> {
        let call = &self.calls[c.index()];
        let caller_cycle = self.functions[call.caller.index()].cycle?;
        let called_cycle = self.functions[call.called.index()].cycle?;
        if caller_cycle == called_cycle {
            self.functions[caller_cycle.index()].cycle_number()
        } else {
            None
        }
    }

    /// The calling function; with `skip_cycle`, the cycle node when the
    /// caller is a cycle member.
    #[must_use]
    pub fn call_caller(&self, c: CallId, skip_cycle: bool) -> FunctionId {
        let caller = self.calls[c.index()].caller;
        if skip_cycle {
            if let Some(cycle) = self.functions[caller.index()].cycle {
                return cycle;
            }
        }
        caller
    }

    /// The called function; with `skip_cycle`, the cycle node when the
    /// callee is a cycle member.
    #[must_use]
    pub fn call_called(&self, c: CallId, skip_cycle: bool) -> FunctionId {
        let called = self.calls[c.index()].called;
        if skip_cycle {
            if let Some(cycle) = self.functions[called.index()].cycle {
                return cycle;
            }
        }
        called
    }

    /// True while a cycle detection run is in progress.
    #[must_use]
    pub fn in_function_cycle_update(&self) -> bool {
        self.in_function_cycle_update
    }

    /// Detects recursive call clusters and synthesizes their cycle nodes.
    ///
    /// Every function's cycle assignment is reset, then Tarjan's SCC runs
    /// over the call graph. Each component of more than one function, and
    /// each single function that calls itself, becomes a new cycle with the
    /// next cycle number (numbering restarts at 1 per run). A re-entrant
    /// call is a no-op, guarded by
    /// [`in_function_cycle_update`](Data::in_function_cycle_update).
    pub fn update_function_cycles(&mut self) {
        if self.in_function_cycle_update {
            return;
        }
        self.in_function_cycle_update = true;

        // Reset pass: drop every assignment and the previous run's nodes.
        // Superseded node records stay in the store (ids must not shift)
        // but are no longer reachable from any enumeration.
        for f in &mut self.functions {
            f.cycle = None;
        }
        self.function_cycles.clear();
        self.function_cycle_count = 0;

        // Graph over normal functions; superseded cycle nodes get no node.
        let mut graph =
            DiGraph::<FunctionId, ()>::with_capacity(self.functions.len(), 0);
        let mut node_of: Vec<Option<NodeIndex>> =
            vec![None; self.functions.len()];
        for (i, f) in self.functions.iter().enumerate() {
            if !f.is_cycle() {
                node_of[i] = Some(graph.add_node(FunctionId::new(i)));
            }
        }
        for call in &self.calls {
            let (Some(a), Some(b)) = (
                node_of[call.caller.index()],
                node_of[call.called.index()],
            ) else {
                continue;
            };
            if a != b {
                graph.add_edge(a, b, ());
            }
        }

        let sccs = tarjan_scc(&graph);
        debug!(scc_count = sccs.len(), "function cycle detection");

        for scc in sccs {
            let is_cycle = scc.len() > 1 || {
                let f = graph[scc[0]];
                self.functions[f.index()]
                    .callings
                    .iter()
                    .any(|&c| self.calls[c.index()].is_recursion())
            };
            if !is_cycle {
                continue;
            }
            let members: Vec<FunctionId> =
                scc.iter().map(|&n| graph[n]).collect();
            self.create_function_cycle(members);
        }

        self.in_function_cycle_update = false;

        // Cycle membership feeds the cumulative sums, so everything
        // computed before this run is stale.
        self.invalidate_dynamic_cost();
    }

    /// Builds one cycle node: assigns the number, attaches the members,
    /// and collects the external caller/calling view.
    fn create_function_cycle(&mut self, members: Vec<FunctionId>) {
        self.function_cycle_count += 1;
        let number = self.function_cycle_count;

        let base = *members.last().expect("an SCC is never empty");
        let proto = &self.functions[base.index()];
        let (class, file, object) = (proto.class, proto.file, proto.object);

        let cycle_id = FunctionId::new(self.functions.len());
        let mut node =
            Function::new(&format!("<cycle {number}>"), class, file, object);
        node.kind = FunctionKind::Cycle {
            number,
            base,
            members: members.clone(),
        };
        self.functions.push(node);

        let mut in_cycle = vec![false; self.functions.len()];
        for &m in &members {
            in_cycle[m.index()] = true;
            self.functions[m.index()].cycle = Some(cycle_id);
        }

        // External view: member edges whose far endpoint is outside the
        // cycle. Intra-cycle calls stay visible on the members only.
        let mut callers: Vec<CallId> = Vec::new();
        let mut callings: Vec<CallId> = Vec::new();
        for &m in &members {
            for &c in &self.functions[m.index()].callers {
                if !in_cycle[self.calls[c.index()].caller.index()] {
                    callers.push(c);
                }
            }
            for &c in &self.functions[m.index()].callings {
                if !in_cycle[self.calls[c.index()].called.index()] {
                    callings.push(c);
                }
            }
        }
        self.functions[cycle_id.index()].callers = callers;
        self.functions[cycle_id.index()].callings = callings;
        self.function_cycles.push(cycle_id);

        debug!(number, member_count = members.len(), "function cycle");
    }

    /// Detects cycles among objects, with edges projected from the
    /// functions' calls. Independent numbering, restarting at 1 per run.
    pub fn update_object_cycles(&mut self) {
        let edges = self.project_edges(|d, c| {
            (
                d.functions[d.calls[c].caller.index()].object.index(),
                d.functions[d.calls[c].called.index()].object.index(),
            )
        });
        let sccs = scc_members(self.objects.len(), &edges);
        for o in &mut self.objects {
            o.cycle = None;
        }
        self.object_cycles.clear();
        for (number, scc) in number_cycles(sccs) {
            let members: Vec<ObjectId> =
                scc.iter().map(|&i| ObjectId::new(i)).collect();
            for &m in &members {
                self.objects[m.index()].cycle = Some(number);
            }
            self.object_cycles.push(GroupCycle { number, members });
        }
    }

    /// Detects cycles among classes; see
    /// [`update_object_cycles`](Data::update_object_cycles).
    pub fn update_class_cycles(&mut self) {
        let edges = self.project_edges(|d, c| {
            (
                d.functions[d.calls[c].caller.index()].class.index(),
                d.functions[d.calls[c].called.index()].class.index(),
            )
        });
        let sccs = scc_members(self.classes.len(), &edges);
        for cl in &mut self.classes {
            cl.cycle = None;
        }
        self.class_cycles.clear();
        for (number, scc) in number_cycles(sccs) {
            let members: Vec<ClassId> =
                scc.iter().map(|&i| ClassId::new(i)).collect();
            for &m in &members {
                self.classes[m.index()].cycle = Some(number);
            }
            self.class_cycles.push(GroupCycle { number, members });
        }
    }

    /// Detects cycles among files; see
    /// [`update_object_cycles`](Data::update_object_cycles).
    pub fn update_file_cycles(&mut self) {
        let edges = self.project_edges(|d, c| {
            (
                d.functions[d.calls[c].caller.index()].file.index(),
                d.functions[d.calls[c].called.index()].file.index(),
            )
        });
        let sccs = scc_members(self.files.len(), &edges);
        for f in &mut self.files {
            f.cycle = None;
        }
        self.file_cycles.clear();
        for (number, scc) in number_cycles(sccs) {
            let members: Vec<FileId> =
                scc.iter().map(|&i| FileId::new(i)).collect();
            for &m in &members {
                self.files[m.index()].cycle = Some(number);
            }
            self.file_cycles.push(GroupCycle { number, members });
        }
    }

    /// Projects the call edges onto a grouping dimension, deduplicated and
    /// in deterministic order.
    fn project_edges(
        &self,
        project: impl Fn(&Data, usize) -> (usize, usize),
    ) -> BTreeSet<(usize, usize)> {
        let mut edges = BTreeSet::new();
        for c in 0..self.calls.len() {
            edges.insert(project(self, c));
        }
        edges
    }
}

/// Runs Tarjan's SCC over `n` nodes with the given edges and returns the
/// member index lists. Self-edges are dropped: recursion *within* one group
/// entity is ordinary, only mutual dependence between entities groups them.
fn scc_members(
    n: usize,
    edges: &BTreeSet<(usize, usize)>,
) -> Vec<Vec<usize>> {
    let mut graph = DiGraph::<usize, ()>::with_capacity(n, edges.len());
    let nodes: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();
    for &(a, b) in edges {
        if a != b {
            graph.add_edge(nodes[a], nodes[b], ());
        }
    }
    tarjan_scc(&graph)
        .into_iter()
        .map(|scc| scc.into_iter().map(|x| graph[x]).collect())
        .collect()
}

/// Filters the SCCs down to real cycles (more than one member) and assigns
/// numbers starting at 1.
fn number_cycles(
    sccs: Vec<Vec<usize>>,
) -> impl Iterator<Item = (u32, Vec<usize>)> {
    sccs.into_iter()
        .filter(|scc| scc.len() > 1)
        .zip(1u32..)
        .map(|(scc, number)| (number, scc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemRef;

    fn graph_fixture() -> (Data, FunctionId, FunctionId, FunctionId, FunctionId)
    {
        let mut data = Data::new();
        let obj = data.intern_object("app");
        let file = data.intern_file("main.c");
        let a = data.intern_function("a", file, obj);
        let b = data.intern_function("b", file, obj);
        let c = data.intern_function("c", file, obj);
        let d = data.intern_function("d", file, obj);
        (data, a, b, c, d)
    }

    #[test]
    fn test_self_call_forms_cycle() {
        let mut data = Data::new();
        let obj = data.intern_object("app");
        let file = data.intern_file("main.c");
        let main = data.intern_function("main", file, obj);
        let call = data.intern_call(main, main);

        data.update_function_cycles();

        assert_eq!(data.function_cycles().len(), 1);
        let cycle = data.function_cycles()[0];
        assert_eq!(data.function(cycle).cycle_number(), Some(1));
        assert_eq!(data.function(main).cycle(), Some(cycle));
        assert_eq!(data.call_in_cycle(call), Some(1));
    }

    #[test]
    fn test_mutual_recursion_with_external_callee() {
        // a→b, b→c, c→a is one cycle; d stays outside, and the cycle's
        // external view shows the call to d.
        let (mut data, a, b, c, d) = graph_fixture();
        data.intern_call(a, b);
        data.intern_call(b, c);
        data.intern_call(c, a);
        let to_d = data.intern_call(a, d);

        data.update_function_cycles();

        assert_eq!(data.function_cycles().len(), 1);
        let cycle = data.function_cycles()[0];
        let members = data.function(cycle).cycle_members();
        assert_eq!(members.len(), 3);
        assert!(!data.function(d).is_cycle_member());

        assert_eq!(data.function(cycle).callings(), &[to_d]);
        assert_eq!(data.call_caller(to_d, true), cycle);
        assert_eq!(data.call_caller(to_d, false), a);
        assert_eq!(data.call_called(to_d, true), d);
        assert_eq!(data.call_in_cycle(to_d), None);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let (mut data, a, b, c, d) = graph_fixture();
        data.intern_call(a, b);
        data.intern_call(b, a);
        data.intern_call(c, d);

        data.update_function_cycles();
        let first: Vec<(Option<u32>, Vec<FunctionId>)> = data
            .function_cycles()
            .iter()
            .map(|&id| {
                (
                    data.function(id).cycle_number(),
                    data.function(id).cycle_members().to_vec(),
                )
            })
            .collect();

        data.update_function_cycles();
        let second: Vec<(Option<u32>, Vec<FunctionId>)> = data
            .function_cycles()
            .iter()
            .map(|&id| {
                (
                    data.function(id).cycle_number(),
                    data.function(id).cycle_members().to_vec(),
                )
            })
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_cycle_nodes_not_in_function_map() {
        let (mut data, a, b, _, _) = graph_fixture();
        data.intern_call(a, b);
        data.intern_call(b, a);
        data.update_function_cycles();

        let cycle = data.function_cycles()[0];
        assert_eq!(data.kind_of(ItemRef::Function(cycle)),
            crate::item::CostKind::FunctionCycle);
        assert!(data
            .function_map()
            .values()
            .all(|ids| !ids.contains(&cycle)));
        assert_eq!(data.function_pretty_name(cycle), "<cycle 1>");
    }

    #[test]
    fn test_group_cycles_via_projected_edges() {
        let mut data = Data::new();
        let obj1 = data.intern_object("a.so");
        let obj2 = data.intern_object("b.so");
        let file1 = data.intern_file("a.c");
        let file2 = data.intern_file("b.c");
        let f1 = data.intern_function("f1", file1, obj1);
        let f2 = data.intern_function("f2", file2, obj2);
        data.intern_call(f1, f2);
        data.intern_call(f2, f1);

        data.update_object_cycles();
        data.update_file_cycles();
        data.update_class_cycles();

        assert_eq!(data.object_cycles().len(), 1);
        assert_eq!(data.object_cycles()[0].number(), 1);
        assert_eq!(data.object(obj1).cycle(), Some(1));
        assert_eq!(data.object(obj2).cycle(), Some(1));
        assert_eq!(data.file_cycles().len(), 1);
        // Both functions are in (global), a self-edge, which is no cycle.
        assert!(data.class_cycles().is_empty());
    }
}
