//! Static graph introspection for composed runnables.
//!
//! [`Graph::of`] walks a runnable through [`Runnable::add_to_graph`] and
//! records the data-flow shape: sequences chain their children, parallels
//! fan out to every branch and join again, and branches fan out along
//! conditional edges labelled with the route label or `default`. Nothing is
//! invoked while the graph is built.
//!
//! Nodes stand for runnable instances: a child shared between several places
//! (the same [`RunnableRef`]) is laid out once, and every place that uses it
//! links to that one sub-graph.
//!
//! ```text
//! Input ──► prompt ──► chat_model ──► parallel ──┬─(notes)─► ... ──┐
//!                                                └─(quiz)──► ... ──┴─► join ──► Output
//! ```

use crate::runnable::{Runnable, RunnableRef};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A node in the introspection graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Runnable kind, or `"input"`/`"output"` for the boundary nodes.
    pub kind: &'static str,
    /// Runnable instance name.
    pub name: String,
}

/// A data-flow edge between two nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphEdge {
    /// Parallel branch key, branch route label, or `"default"`.
    pub label: Option<String>,
    /// Whether data only flows along this edge when a branch selects it.
    pub conditional: bool,
}

/// Entry and exit points of the sub-graph contributed by one runnable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Node that receives the runnable's input.
    pub entry: NodeIndex,
    /// Nodes whose output leaves the runnable. Branches have several.
    pub exits: Vec<NodeIndex>,
}

impl Fragment {
    /// Fragment made of one node.
    pub fn single(node: NodeIndex) -> Self {
        Self {
            entry: node,
            exits: vec![node],
        }
    }
}

/// The node/edge shape of a composed runnable.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: DiGraph<GraphNode, GraphEdge>,
    // fragments of children already laid out, keyed by Arc address
    laid_out: HashMap<usize, Fragment>,
}

impl Graph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of `root`, framed by `Input` and `Output` nodes.
    pub fn of<R: Runnable + ?Sized>(root: &R) -> Self {
        let mut graph = Graph::new();
        let input = graph.add_node("input", "Input");
        let fragment = root.add_to_graph(&mut graph);
        graph.connect(input, fragment.entry);
        let output = graph.add_node("output", "Output");
        for exit in fragment.exits {
            graph.connect(exit, output);
        }
        graph
    }

    /// Lay out a composite's child, reusing its sub-graph if the same
    /// instance was added before.
    pub fn add_child(&mut self, child: &RunnableRef) -> Fragment {
        let key = Arc::as_ptr(child) as *const () as usize;
        if let Some(fragment) = self.laid_out.get(&key) {
            return fragment.clone();
        }
        let fragment = child.add_to_graph(self);
        self.laid_out.insert(key, fragment.clone());
        fragment
    }

    /// Add a node and return its index.
    pub fn add_node(&mut self, kind: &'static str, name: impl Into<String>) -> NodeIndex {
        self.inner.add_node(GraphNode {
            kind,
            name: name.into(),
        })
    }

    /// Add an unconditional, unlabelled edge unless one already exists.
    pub fn connect(&mut self, from: NodeIndex, to: NodeIndex) {
        let plain = GraphEdge::default();
        if self.inner.edges_connecting(from, to).any(|e| *e.weight() == plain) {
            return;
        }
        self.inner.add_edge(from, to, plain);
    }

    /// Add an unconditional edge carrying a label (e.g. a parallel key).
    pub fn connect_labeled(&mut self, from: NodeIndex, to: NodeIndex, label: impl Into<String>) {
        self.inner.add_edge(
            from,
            to,
            GraphEdge {
                label: Some(label.into()),
                conditional: false,
            },
        );
    }

    /// Add a conditional edge labelled with the condition it stands for.
    pub fn connect_conditional(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        label: impl Into<String>,
    ) {
        self.inner.add_edge(
            from,
            to,
            GraphEdge {
                label: Some(label.into()),
                conditional: true,
            },
        );
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Look up a node.
    pub fn node(&self, index: NodeIndex) -> Option<&GraphNode> {
        self.inner.node_weight(index)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode)> {
        self.inner
            .node_indices()
            .map(move |i| (i, &self.inner[i]))
    }

    /// Edges in insertion order as `(from, to, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &GraphEdge)> {
        self.inner
            .edge_references()
            .map(|e| (e.source(), e.target(), e.weight()))
    }

    /// Index of the first node with the given name.
    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.nodes().find(|(_, n)| n.name == name).map(|(i, _)| i)
    }

    /// Outgoing edges of `node`, in insertion order.
    pub fn successors(&self, node: NodeIndex) -> Vec<(NodeIndex, &GraphEdge)> {
        let mut out: Vec<_> = self
            .inner
            .edges(node)
            .map(|e| (e.id(), e.target(), e.weight()))
            .collect();
        // petgraph walks outgoing edges newest first
        out.sort_by_key(|(id, _, _)| *id);
        out.into_iter().map(|(_, t, w)| (t, w)).collect()
    }

    /// Plain-text rendering: one line per node, then its outgoing edges.
    ///
    /// ```text
    /// [0] Input (input)
    ///     -> [1]
    /// [1] classify (branch)
    ///     -?positive-> [2]
    ///     -?default-> [3]
    /// ```
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (index, node) in self.nodes() {
            out.push_str(&format!("[{}] {} ({})\n", index.index(), node.name, node.kind));
            for (target, edge) in self.successors(index) {
                let marker = if edge.conditional { "?" } else { "" };
                match &edge.label {
                    Some(label) => out.push_str(&format!(
                        "    -{}{}-> [{}]\n",
                        marker,
                        label,
                        target.index()
                    )),
                    None => out.push_str(&format!("    -> [{}]\n", target.index())),
                }
            }
        }
        out
    }

    /// Mermaid flowchart rendering. Conditional edges are dotted.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        for (index, node) in self.nodes() {
            out.push_str(&format!(
                "    n{}[\"{}\"]\n",
                index.index(),
                node.name.replace('"', "'")
            ));
        }
        for (from, to, edge) in self.edges() {
            let arrow = if edge.conditional { "-.->" } else { "-->" };
            match &edge.label {
                Some(label) => out.push_str(&format!(
                    "    n{} {}|{}| n{}\n",
                    from.index(),
                    arrow,
                    label.replace('|', "/"),
                    to.index()
                )),
                None => out.push_str(&format!("    n{} {} n{}\n", from.index(), arrow, to.index())),
            }
        }
        out
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes().map(|(_, n)| n).eq(other.nodes().map(|(_, n)| n))
            && self.edges().eq(other.edges())
    }
}

impl Eq for Graph {}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of_two() -> Graph {
        let mut g = Graph::new();
        let a = g.add_node("lambda", "a");
        let b = g.add_node("lambda", "b");
        g.connect(a, b);
        g
    }

    #[test]
    fn test_counts_and_lookup() {
        let g = chain_of_two();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
        let a = g.find("a").unwrap();
        assert_eq!(g.node(a).unwrap().kind, "lambda");
        assert!(g.find("missing").is_none());
    }

    #[test]
    fn test_successors_in_insertion_order() {
        let mut g = Graph::new();
        let d = g.add_node("branch", "d");
        let x = g.add_node("lambda", "x");
        let y = g.add_node("lambda", "y");
        g.connect_conditional(d, x, "first");
        g.connect_conditional(d, y, "default");

        let succ = g.successors(d);
        assert_eq!(succ[0].0, x);
        assert_eq!(succ[0].1.label.as_deref(), Some("first"));
        assert_eq!(succ[1].0, y);
        assert!(succ[1].1.conditional);
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(chain_of_two(), chain_of_two());

        let mut other = chain_of_two();
        other.add_node("lambda", "c");
        assert_ne!(chain_of_two(), other);
    }

    #[test]
    fn test_text_rendering() {
        let mut g = Graph::new();
        let p = g.add_node("parallel", "p");
        let a = g.add_node("lambda", "a");
        g.connect_labeled(p, a, "len");
        assert_eq!(g.to_text(), "[0] p (parallel)\n    -len-> [1]\n[1] a (lambda)\n");
        assert_eq!(g.to_string(), g.to_text());
    }

    #[test]
    fn test_mermaid_rendering() {
        let mut g = Graph::new();
        let b = g.add_node("branch", "route \"x\"");
        let a = g.add_node("lambda", "a");
        g.connect_conditional(b, a, "big");
        let m = g.to_mermaid();
        assert!(m.starts_with("graph TD\n"));
        assert!(m.contains("n0[\"route 'x'\"]"));
        assert!(m.contains("n0 -.->|big| n1"));
    }
}
