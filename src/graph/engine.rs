//
//  engine.rs
//  typegraph
//

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

use super::types::*;
use crate::model::TypeIdentity;

/// Parents or children of a node, grouped by the other end's identity.
pub type EdgeMap<'g> = BTreeMap<&'g TypeIdentity, Vec<&'g Edge>>;

/// The type-dependency graph of one generation run.
///
/// Edges point from a parent type to the child type it structurally
/// contains. `P` is caller-supplied per-node private data.
#[derive(Clone)]
pub struct TypeGraph<P = ()> {
    /// The directed graph storing type relationships.
    pub(crate) graph: DiGraph<TypeNode<P>, Edge>,
    /// Index: identity -> node index.
    pub(crate) index: HashMap<TypeIdentity, NodeIndex>,
    /// Index: in-scope nodes satisfying the match predicate.
    pub(crate) matched: BTreeMap<TypeIdentity, NodeIndex>,
    /// Index: nodes declared outside the analyzed units.
    pub(crate) external: BTreeMap<TypeIdentity, NodeIndex>,
}

impl<P> TypeGraph<P> {
    /// Create a new empty type graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            matched: BTreeMap::new(),
            external: BTreeMap::new(),
        }
    }

    // ─── Node Operations ────────────────────────────────────────

    /// Register a node. Returns the index and whether it was inserted.
    ///
    /// An identity is registered at most once; registering it again returns
    /// the existing node and drops `node`.
    pub(crate) fn add_node(&mut self, node: TypeNode<P>) -> (NodeIndex, bool) {
        if let Some(&idx) = self.index.get(&node.identity) {
            return (idx, false);
        }
        let identity = node.identity.clone();
        let external = node.is_external();
        let idx = self.graph.add_node(node);
        if external {
            self.external.insert(identity.clone(), idx);
        }
        self.index.insert(identity, idx);
        (idx, true)
    }

    /// Set the matched bit. In-scope nodes join the matched index.
    pub(crate) fn mark_matched(&mut self, idx: NodeIndex) {
        let node = &mut self.graph[idx];
        node.kind.insert(MatchKind::MATCHED);
        if !node.is_external() {
            self.matched.insert(node.identity.clone(), idx);
        }
    }

    // ─── Edge Operations ────────────────────────────────────────

    /// Draw an edge from `parent` to `child`.
    pub(crate) fn add_edge(&mut self, parent: NodeIndex, child: NodeIndex, edge: Edge) {
        debug_assert_eq!(self.graph[parent].identity, edge.parent);
        debug_assert_eq!(self.graph[child].identity, edge.child);
        self.graph.add_edge(parent, child, edge);
    }

    // ─── Lookups ────────────────────────────────────────────────

    pub(crate) fn index_of(&self, id: &TypeIdentity) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_at(&self, idx: NodeIndex) -> &TypeNode<P> {
        &self.graph[idx]
    }

    pub fn node(&self, id: &TypeIdentity) -> Option<&TypeNode<P>> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn node_mut(&mut self, id: &TypeIdentity) -> Option<&mut TypeNode<P>> {
        let idx = self.index_of(id)?;
        self.graph.node_weight_mut(idx)
    }

    pub fn contains(&self, id: &TypeIdentity) -> bool {
        self.index.contains_key(id)
    }

    /// All nodes in identity order.
    pub fn nodes(&self) -> Vec<&TypeNode<P>> {
        let mut nodes: Vec<&TypeNode<P>> = self.graph.node_weights().collect();
        nodes.sort_by(|a, b| a.identity.cmp(&b.identity));
        nodes
    }

    /// In-scope matched nodes in identity order.
    pub fn matched(&self) -> impl Iterator<Item = &TypeNode<P>> + '_ {
        self.matched.values().map(|&idx| &self.graph[idx])
    }

    /// External nodes in identity order.
    pub fn external(&self) -> impl Iterator<Item = &TypeNode<P>> + '_ {
        self.external.values().map(|&idx| &self.graph[idx])
    }

    /// Nodes carrying the dependent bit, in identity order.
    pub fn dependent(&self) -> Vec<&TypeNode<P>> {
        self.nodes()
            .into_iter()
            .filter(|n| n.is_dependent())
            .collect()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.graph.edge_weights()
    }

    /// Types referring to `id`, with the edges by which they do.
    pub fn parents(&self, id: &TypeIdentity) -> EdgeMap<'_> {
        self.edge_map(id, Direction::Incoming)
    }

    /// Types `id` refers to, with the edges by which it does.
    pub fn children(&self, id: &TypeIdentity) -> EdgeMap<'_> {
        self.edge_map(id, Direction::Outgoing)
    }

    fn edge_map(&self, id: &TypeIdentity, dir: Direction) -> EdgeMap<'_> {
        let mut map: EdgeMap<'_> = BTreeMap::new();
        let Some(idx) = self.index_of(id) else {
            return map;
        };
        // petgraph walks adjacency lists newest first; report insertion order.
        let mut edges: Vec<_> = self.graph.edges_directed(idx, dir).collect();
        edges.sort_by_key(|edge| edge.id());
        for edge in edges {
            let other = match dir {
                Direction::Incoming => edge.source(),
                Direction::Outgoing => edge.target(),
            };
            map.entry(&self.graph[other].identity)
                .or_default()
                .push(edge.weight());
        }
        map
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            total_nodes: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
            ..GraphStats::default()
        };
        for node in self.graph.node_weights() {
            if node.is_matched() {
                stats.matched += 1;
            }
            if node.is_dependent() {
                stats.dependent += 1;
            }
            if node.is_external() {
                stats.external += 1;
            }
        }
        stats
    }
}

impl<P> Default for TypeGraph<P> {
    fn default() -> Self {
        Self::new()
    }
}
