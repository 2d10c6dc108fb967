//! Lazy graph traversal over the control-flow graph (basic blocks linked
//! by branch targets) and the use-def graph (instructions linked by the
//! operands they consume).
//!
//! Every iterator here is built around a small `Successors` trait so the
//! same BFS/DFS machinery serves both graphs; only how a node's
//! successors are computed differs between them.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::arena::Id;
use crate::inst::{BranchTarget, InstructionKind};
use crate::ir::{BasicBlockData, InstructionData, Module};

/// A directed graph where each node knows how to list its own
/// successors. `Id<T>` already gives nodes cheap `Copy` + `Eq` + `Hash`,
/// so a visited-set is just an `FxHashSet<Id<T>>`.
pub trait Successors {
    type Node: Copy + Eq + std::hash::Hash;

    fn successors(&self, node: Self::Node) -> Vec<Self::Node>;
}

/// The control-flow graph of one function: block `A`'s successors are
/// the targets of the branch/conditional that terminates it.
pub struct ControlFlowGraph<'m> {
    pub module: &'m Module,
}

impl<'m> Successors for ControlFlowGraph<'m> {
    type Node = Id<BasicBlockData>;

    fn successors(&self, node: Self::Node) -> Vec<Self::Node> {
        let block = self.module.block(node);
        let Some(&last) = block.instructions.last() else { return Vec::new() };
        match &self.module.instruction(last).kind {
            InstructionKind::Branch { target } => vec![target.block],
            InstructionKind::Conditional { when_true, when_false, .. } => {
                vec![when_true.block, when_false.block]
            }
            _ => Vec::new(),
        }
    }
}

impl<'m> ControlFlowGraph<'m> {
    /// The predecessors of `node`: every block whose terminator names it
    /// as a target. Computed by scanning every block, since the data
    /// model stores branch edges only in the forward direction.
    #[must_use]
    pub fn predecessors(&self, node: Id<BasicBlockData>) -> Vec<Id<BasicBlockData>> {
        let function = self.module.function(self.module.block(node).function);
        function
            .blocks_in_order()
            .filter(|&candidate| self.successors(candidate).contains(&node))
            .collect()
    }
}

/// The use-def graph of one function: instruction `A`'s successors are
/// the *users* of its result (the forward, "data flows to" direction);
/// its predecessors are the producers of its operands.
pub struct UseDefGraph<'m> {
    pub module: &'m Module,
}

impl<'m> Successors for UseDefGraph<'m> {
    type Node = Id<InstructionData>;

    fn successors(&self, node: Self::Node) -> Vec<Self::Node> {
        let function = self.module.function(self.module.block(self.module.instruction(node).block).function);
        function
            .blocks_in_order()
            .flat_map(|block_id| self.module.block(block_id).instructions.iter().copied())
            .filter(|&candidate| operand_instructions(&self.module.instruction(candidate).kind).contains(&node))
            .collect()
    }
}

impl<'m> UseDefGraph<'m> {
    /// The producers of `node`'s operands: the instructions `node`
    /// itself consumes.
    #[must_use]
    pub fn predecessors(&self, node: Id<InstructionData>) -> Vec<Id<InstructionData>> {
        operand_instructions(&self.module.instruction(node).kind)
    }
}

fn operand_instructions(kind: &InstructionKind) -> Vec<Id<InstructionData>> {
    use crate::value::Use;
    let mut out = Vec::new();
    let mut push = |u: &Use| {
        if let Use::Instruction(_, id) = u {
            out.push(*id);
        }
    };
    let push_target = |out: &mut Vec<Id<InstructionData>>, t: &BranchTarget| {
        for a in &t.arguments {
            if let Use::Instruction(_, id) = a {
                out.push(*id);
            }
        }
    };
    match kind {
        InstructionKind::Binary { lhs, rhs, .. } => { push(lhs); push(rhs); }
        InstructionKind::Unary { operand, .. } => push(operand),
        InstructionKind::MatrixMultiply { lhs, rhs } => { push(lhs); push(rhs); }
        InstructionKind::Transpose { operand } => push(operand),
        InstructionKind::Reduce { operand, .. } | InstructionKind::Scan { operand, .. } => push(operand),
        InstructionKind::Concatenate { operands, .. } => operands.iter().for_each(|o| push(o)),
        InstructionKind::ShapeCast { operand, .. } | InstructionKind::DataTypeCast { operand, .. } => push(operand),
        InstructionKind::Tuple { elements } => elements.iter().for_each(|e| push(e)),
        InstructionKind::Extract { source, .. } => push(source),
        InstructionKind::Insert { value, destination, .. } => { push(value); push(destination); }
        InstructionKind::ElementPointer { source, .. } => push(source),
        InstructionKind::Load { pointer } => push(pointer),
        InstructionKind::Store { value, destination } => { push(value); push(destination); }
        InstructionKind::AllocateHeap { count, .. } => push(count),
        InstructionKind::AllocateBox { .. } => {}
        InstructionKind::ProjectBox { boxed } => push(boxed),
        InstructionKind::Deallocate { value } => push(value),
        InstructionKind::Apply { callee, arguments } => {
            push(callee);
            arguments.iter().for_each(|a| push(a));
        }
        InstructionKind::Gradient { function, output, .. } => { push(function); push(output); }
        InstructionKind::Branch { target } => push_target(&mut out, target),
        InstructionKind::Conditional { condition, when_true, when_false } => {
            push(condition);
            push_target(&mut out, when_true);
            push_target(&mut out, when_false);
        }
        InstructionKind::Return { value } => {
            if let Some(v) = value {
                push(v);
            }
        }
    }
    out
}

/// Breadth-first traversal from `start`, yielding each reachable node
/// exactly once in visitation order.
pub struct Bfs<'g, G: Successors> {
    graph: &'g G,
    queue: VecDeque<G::Node>,
    visited: FxHashSet<G::Node>,
}

impl<'g, G: Successors> Bfs<'g, G> {
    pub fn new(graph: &'g G, start: G::Node) -> Self {
        let mut visited = FxHashSet::default();
        visited.insert(start);
        Bfs { graph, queue: VecDeque::from([start]), visited }
    }
}

impl<'g, G: Successors> Iterator for Bfs<'g, G> {
    type Item = G::Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        for succ in self.graph.successors(node) {
            if self.visited.insert(succ) {
                self.queue.push_back(succ);
            }
        }
        Some(node)
    }
}

/// Pre-order depth-first traversal: a node is yielded before its
/// successors are explored.
pub struct PreOrderDfs<'g, G: Successors> {
    graph: &'g G,
    stack: Vec<G::Node>,
    visited: FxHashSet<G::Node>,
}

impl<'g, G: Successors> PreOrderDfs<'g, G> {
    pub fn new(graph: &'g G, start: G::Node) -> Self {
        PreOrderDfs { graph, stack: vec![start], visited: FxHashSet::default() }
    }
}

impl<'g, G: Successors> Iterator for PreOrderDfs<'g, G> {
    type Item = G::Node;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.stack.pop()?;
            if !self.visited.insert(node) {
                continue;
            }
            let mut successors = self.graph.successors(node);
            successors.reverse();
            self.stack.extend(successors);
            return Some(node);
        }
    }
}

/// Post-order depth-first traversal: a node is yielded only after every
/// node reachable through it has already been yielded.
pub struct PostOrderDfs<G: Successors> {
    order: std::vec::IntoIter<G::Node>,
}

impl<G: Successors> PostOrderDfs<G> {
    pub fn new(graph: &G, start: G::Node) -> Self {
        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        post_order_visit(graph, start, &mut visited, &mut order);
        PostOrderDfs { order: order.into_iter() }
    }
}

fn post_order_visit<G: Successors>(
    graph: &G,
    node: G::Node,
    visited: &mut FxHashSet<G::Node>,
    order: &mut Vec<G::Node>,
) {
    if !visited.insert(node) {
        return;
    }
    for succ in graph.successors(node) {
        post_order_visit(graph, succ, visited, order);
    }
    order.push(node);
}

impl<G: Successors> Iterator for PostOrderDfs<G> {
    type Item = G::Node;

    fn next(&mut self) -> Option<Self::Item> {
        self.order.next()
    }
}

/// Which of a graph's two edge directions a traversal should follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// An arbitrary graph, keyed by node identity, whose edges a pass has
/// recorded explicitly in both directions up front.
///
/// `ControlFlowGraph` and `UseDefGraph` derive their edges on the fly
/// from IR structure; a transform pass that instead builds its own
/// graph over some other node type (e.g. a dominance frontier, a call
/// graph assembled while walking several functions) can record it here
/// once and then reuse the same `Bfs`/`PreOrderDfs`/`PostOrderDfs`
/// machinery over either direction via [`EdgeSetView`].
pub struct EdgeSet<N> {
    forward: rustc_hash::FxHashMap<N, Vec<N>>,
    backward: rustc_hash::FxHashMap<N, Vec<N>>,
}

impl<N: Copy + Eq + std::hash::Hash> Default for EdgeSet<N> {
    fn default() -> Self {
        EdgeSet { forward: Default::default(), backward: Default::default() }
    }
}

impl<N: Copy + Eq + std::hash::Hash> EdgeSet<N> {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Records a directed edge `from -> to`, indexing it for lookup from
    /// either end.
    pub fn add_edge(&mut self, from: N, to: N) {
        self.forward.entry(from).or_default().push(to);
        self.backward.entry(to).or_default().push(from);
    }

    /// A view of this edge set that walks the given direction, usable
    /// anywhere a [`Successors`] graph is expected.
    #[must_use]
    pub fn view(&self, direction: Direction) -> EdgeSetView<'_, N> {
        EdgeSetView { edges: self, direction }
    }
}

/// A [`Successors`] adapter over an [`EdgeSet`] fixed to one direction.
pub struct EdgeSetView<'e, N> {
    edges: &'e EdgeSet<N>,
    direction: Direction,
}

impl<'e, N: Copy + Eq + std::hash::Hash> Successors for EdgeSetView<'e, N> {
    type Node = N;

    fn successors(&self, node: N) -> Vec<N> {
        let table = match self.direction {
            Direction::Forward => &self.edges.forward,
            Direction::Backward => &self.edges.backward,
        };
        table.get(&node).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Chain(Vec<Vec<u32>>);

    impl Successors for Chain {
        type Node = u32;
        fn successors(&self, node: u32) -> Vec<u32> {
            self.0[node as usize].clone()
        }
    }

    // 0 -> {1, 2}, 1 -> {3}, 2 -> {3}, 3 -> {}
    fn diamond() -> Chain {
        Chain(vec![vec![1, 2], vec![3], vec![3], vec![]])
    }

    #[test]
    fn bfs_visits_each_node_once_in_breadth_order() {
        let g = diamond();
        let order: Vec<u32> = Bfs::new(&g, 0).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn pre_order_dfs_descends_before_backtracking() {
        let g = diamond();
        let order: Vec<u32> = PreOrderDfs::new(&g, 0).collect();
        assert_eq!(order, vec![0, 1, 3, 2]);
    }

    #[test]
    fn post_order_dfs_yields_children_before_parents() {
        let g = diamond();
        let order: Vec<u32> = PostOrderDfs::new(&g, 0).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn edge_set_walks_either_direction() {
        let mut edges = EdgeSet::new();
        edges.add_edge(0u32, 1);
        edges.add_edge(0, 2);
        edges.add_edge(1, 3);
        edges.add_edge(2, 3);

        let forward: Vec<u32> = Bfs::new(&edges.view(Direction::Forward), 0).collect();
        assert_eq!(forward, vec![0, 1, 2, 3]);

        let backward: Vec<u32> = Bfs::new(&edges.view(Direction::Backward), 3).collect();
        assert_eq!(backward, vec![3, 1, 2, 0]);
    }
}
