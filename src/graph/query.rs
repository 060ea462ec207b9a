//
//  query.rs
//  typegraph
//

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashSet;
use std::vec;
use tracing::debug;

use super::engine::TypeGraph;
use super::types::*;
use crate::model::TypeIdentity;

/// Lazy walk from the matched and external nodes towards the types that
/// contain them. See [`TypeGraph::iter_upward`].
pub struct UpwardIter<'g, P, F> {
    graph: &'g TypeGraph<P>,
    filter: F,
    include_matched: bool,
    seeds: vec::IntoIter<NodeIndex>,
    stack: Vec<vec::IntoIter<NodeIndex>>,
    visited: HashSet<NodeIndex>,
}

impl<'g, P, F> UpwardIter<'g, P, F>
where
    F: FnMut(&Edge) -> bool,
{
    /// Parents with at least one accepted edge into `idx`, in identity order.
    fn accepted_parents(&mut self, idx: NodeIndex) -> vec::IntoIter<NodeIndex> {
        let graph = &self.graph.graph;
        let mut parents: Vec<NodeIndex> = Vec::new();
        for edge in graph.edges_directed(idx, Direction::Incoming) {
            if !parents.contains(&edge.source()) && (self.filter)(edge.weight()) {
                parents.push(edge.source());
            }
        }
        parents.sort_by(|a, b| graph[*a].identity.cmp(&graph[*b].identity));
        parents.into_iter()
    }

    pub(crate) fn next_index(&mut self) -> Option<NodeIndex> {
        loop {
            if let Some(top) = self.stack.last_mut() {
                match top.next() {
                    Some(idx) => {
                        if self.visited.insert(idx) {
                            let parents = self.accepted_parents(idx);
                            self.stack.push(parents);
                            return Some(idx);
                        }
                    }
                    None => {
                        self.stack.pop();
                    }
                }
                continue;
            }

            let seed = self.seeds.next()?;
            if self.include_matched {
                if !self.visited.insert(seed) {
                    continue;
                }
                let parents = self.accepted_parents(seed);
                self.stack.push(parents);
                return Some(seed);
            }
            let parents = self.accepted_parents(seed);
            self.stack.push(parents);
        }
    }
}

impl<'g, P, F> Iterator for UpwardIter<'g, P, F>
where
    F: FnMut(&Edge) -> bool,
{
    type Item = (&'g TypeIdentity, &'g TypeNode<P>);

    fn next(&mut self) -> Option<Self::Item> {
        let graph = self.graph;
        self.next_index().map(|idx| {
            let node = graph.node_at(idx);
            (&node.identity, node)
        })
    }
}

impl<P> TypeGraph<P> {
    /// Walk upward from every external node, then every matched node, along
    /// edges accepted by `filter`.
    ///
    /// Each node is produced at most once, in depth-first preorder. With
    /// `include_matched`, the seeds themselves are produced first.
    pub fn iter_upward<F>(&self, include_matched: bool, filter: F) -> UpwardIter<'_, P, F>
    where
        F: FnMut(&Edge) -> bool,
    {
        let seeds: Vec<NodeIndex> = self
            .external
            .values()
            .chain(self.matched.values())
            .copied()
            .collect();
        UpwardIter {
            graph: self,
            filter,
            include_matched,
            seeds: seeds.into_iter(),
            stack: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Recompute the dependent bit for `filter`. Returns the number of
    /// dependent nodes.
    ///
    /// Matched and external nodes never carry the bit.
    pub fn mark_dependent<F>(&mut self, filter: F) -> usize
    where
        F: FnMut(&Edge) -> bool,
    {
        for node in self.graph.node_weights_mut() {
            node.kind.remove(MatchKind::DEPENDENT);
        }

        let reached: Vec<NodeIndex> = {
            let mut walk = self.iter_upward(false, filter);
            std::iter::from_fn(|| walk.next_index()).collect()
        };

        let mut count = 0;
        for idx in reached {
            let node = &mut self.graph[idx];
            if node.is_matched() || node.is_external() {
                continue;
            }
            node.kind.insert(MatchKind::DEPENDENT);
            count += 1;
        }
        debug!(dependent = count, "marked dependent types");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{filter, match_fn};
    use crate::model::{Field, SourceUnit, TypeDecl, TypeExpr, Workspace};

    const PKG: &str = "example.com/app";

    fn id(name: &str) -> TypeIdentity {
        TypeIdentity::new(PKG, name)
    }

    fn strukt(fields: Vec<(&str, TypeExpr)>) -> TypeExpr {
        TypeExpr::struct_of(
            fields
                .into_iter()
                .map(|(name, ty)| Field::new(name, ty))
                .collect(),
        )
    }

    fn graph_of(decls: Vec<TypeDecl>, matched: &[&str]) -> TypeGraph {
        let unit = decls
            .into_iter()
            .fold(SourceUnit::new("a.go", PKG), SourceUnit::with_decl);
        let ws = Workspace::new(vec![unit]);
        let mut delegate = match_fn(|c: &Candidate<'_>| {
            Ok(!c.external && matched.contains(&c.identity.name.as_str()))
        });
        TypeGraph::build(&ws, &mut delegate).unwrap()
    }

    /// A -> B -> C (matched), D -[*]-> C.
    fn chain() -> TypeGraph {
        graph_of(
            vec![
                TypeDecl::new("A", strukt(vec![("B", TypeExpr::named(PKG, "B"))])),
                TypeDecl::new("B", strukt(vec![("C", TypeExpr::named(PKG, "C"))])),
                TypeDecl::new("C", strukt(vec![("N", TypeExpr::basic("int"))])),
                TypeDecl::new(
                    "D",
                    strukt(vec![("C", TypeExpr::pointer(TypeExpr::named(PKG, "C")))]),
                ),
            ],
            &["C"],
        )
    }

    fn no_pointers(edge: &Edge) -> bool {
        !edge.contains_kind(SegmentKind::Pointer)
    }

    fn names<'g, I: Iterator<Item = (&'g TypeIdentity, &'g TypeNode)>>(iter: I) -> Vec<&'g str> {
        iter.map(|(id, _)| id.name.as_str()).collect()
    }

    #[test]
    fn test_dependents_follow_accepted_edges() {
        let mut graph = chain();
        assert_eq!(graph.mark_dependent(no_pointers), 2);

        assert!(graph.node(&id("A")).unwrap().is_dependent());
        assert!(graph.node(&id("B")).unwrap().is_dependent());
        assert!(!graph.node(&id("C")).unwrap().is_dependent());
        assert!(!graph.node(&id("D")).unwrap().is_dependent());
    }

    #[test]
    fn test_remarking_replaces_previous_result() {
        let mut graph = chain();
        graph.mark_dependent(no_pointers);
        assert_eq!(graph.mark_dependent(filter::accept_all), 3);
        assert!(graph.node(&id("D")).unwrap().is_dependent());

        assert_eq!(graph.mark_dependent(|_: &Edge| false), 0);
        assert!(graph.dependent().is_empty());
    }

    #[test]
    fn test_iter_upward_order() {
        let graph = chain();
        assert_eq!(names(graph.iter_upward(false, filter::accept_all)), vec!["B", "A", "D"]);
        assert_eq!(
            names(graph.iter_upward(true, filter::accept_all)),
            vec!["C", "B", "A", "D"]
        );
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut graph = graph_of(
            vec![TypeDecl::new(
                "Tree",
                strukt(vec![
                    ("Left", TypeExpr::pointer(TypeExpr::named(PKG, "Tree"))),
                    ("Right", TypeExpr::pointer(TypeExpr::named(PKG, "Tree"))),
                ]),
            )],
            &["Tree"],
        );
        assert_eq!(names(graph.iter_upward(true, filter::accept_all)), vec!["Tree"]);
        assert_eq!(graph.mark_dependent(filter::accept_all), 0);
    }

    #[test]
    fn test_mutual_recursion_visits_each_once() {
        let mut graph = graph_of(
            vec![
                TypeDecl::new("Leaf", strukt(vec![])),
                TypeDecl::new(
                    "Ping",
                    strukt(vec![
                        ("Pong", TypeExpr::pointer(TypeExpr::named(PKG, "Pong"))),
                        ("Leaf", TypeExpr::named(PKG, "Leaf")),
                    ]),
                ),
                TypeDecl::new(
                    "Pong",
                    strukt(vec![("Ping", TypeExpr::pointer(TypeExpr::named(PKG, "Ping")))]),
                ),
            ],
            &["Leaf"],
        );
        assert_eq!(names(graph.iter_upward(false, filter::accept_all)), vec!["Ping", "Pong"]);
        assert_eq!(graph.mark_dependent(filter::accept_all), 2);
    }

    #[test]
    fn test_external_seeds_come_first() {
        let unit = SourceUnit::new("a.go", PKG)
            .with_decl(TypeDecl::new(
                "Holder",
                strukt(vec![("T", TypeExpr::named("time", "Time"))]),
            ))
            .with_decl(TypeDecl::new("Target", strukt(vec![])))
            .with_decl(TypeDecl::new(
                "User",
                strukt(vec![("T", TypeExpr::named(PKG, "Target"))]),
            ));
        let ws = Workspace::new(vec![unit]);
        let mut delegate =
            match_fn(|c: &Candidate<'_>| Ok(c.external || c.identity.name == "Target"));
        let mut graph = TypeGraph::build(&ws, &mut delegate).unwrap();

        assert_eq!(
            names(graph.iter_upward(true, filter::accept_all)),
            vec!["Time", "Holder", "Target", "User"]
        );
        assert_eq!(graph.mark_dependent(filter::accept_all), 2);
        assert!(!graph.node(&TypeIdentity::new("time", "Time")).unwrap().is_dependent());
    }

    #[test]
    fn test_empty_graph_yields_nothing() {
        let mut graph: TypeGraph = TypeGraph::new();
        assert_eq!(graph.iter_upward(true, filter::accept_all).count(), 0);
        assert_eq!(graph.mark_dependent(filter::accept_all), 0);
    }
}
