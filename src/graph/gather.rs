//
//  gather.rs
//  typegraph
//

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use super::engine::TypeGraph;
use super::types::*;
use crate::error::{BoxError, Result, TypegraphError};
use crate::model::{TypeIdentity, UnitId};

/// The nodes of one source unit a generation pass touches.
#[derive(Debug)]
pub struct ReplacementUnit<'g, C, P = ()> {
    pub unit: UnitId,
    pub file: PathBuf,
    pub package: String,
    /// Import-resolution context built for this unit.
    pub scope: C,
    /// Ordered by declaration ordinal, without duplicate ordinals.
    pub nodes: Vec<&'g TypeNode<P>>,
}

impl<'g, C, P> ReplacementUnit<'g, C, P> {
    pub fn identities(&self) -> impl Iterator<Item = &'g TypeIdentity> + '_ {
        self.nodes.iter().map(|&node| &node.identity)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<P> TypeGraph<P> {
    /// Group a traversal sequence by declaring unit.
    ///
    /// External nodes are skipped. `scope_for` runs once per unit, on the
    /// first node seen for it; its failure aborts the whole call.
    pub fn gather_replacement_units<'g, I, C, F>(
        &'g self,
        seq: I,
        mut scope_for: F,
    ) -> Result<BTreeMap<UnitId, ReplacementUnit<'g, C, P>>>
    where
        I: IntoIterator<Item = (&'g TypeIdentity, &'g TypeNode<P>)>,
        F: FnMut(&DeclSite) -> Result<C, BoxError>,
    {
        let mut units: BTreeMap<UnitId, ReplacementUnit<'g, C, P>> = BTreeMap::new();
        for (_, node) in seq {
            let Some(site) = node.site() else {
                continue;
            };
            match units.entry(site.unit) {
                Entry::Occupied(mut entry) => entry.get_mut().nodes.push(node),
                Entry::Vacant(entry) => {
                    let scope = scope_for(site).map_err(|source| {
                        TypegraphError::ImportResolution {
                            unit: site.file.clone(),
                            source,
                        }
                    })?;
                    entry.insert(ReplacementUnit {
                        unit: site.unit,
                        file: site.file.clone(),
                        package: site.package.clone(),
                        scope,
                        nodes: vec![node],
                    });
                }
            }
        }

        for unit in units.values_mut() {
            unit.nodes.sort_by_key(|node| node.ordinal());
            unit.nodes.dedup_by_key(|node| node.ordinal());
        }
        debug!(units = units.len(), "gathered replacement units");
        Ok(units)
    }

    /// [`Self::iter_upward`] followed by [`Self::gather_replacement_units`].
    pub fn gather_upward<C, E, F>(
        &self,
        include_matched: bool,
        filter: E,
        scope_for: F,
    ) -> Result<BTreeMap<UnitId, ReplacementUnit<'_, C, P>>>
    where
        E: FnMut(&Edge) -> bool,
        F: FnMut(&DeclSite) -> Result<C, BoxError>,
    {
        self.gather_replacement_units(self.iter_upward(include_matched, filter), scope_for)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{filter, match_fn};
    use crate::model::{Field, SourceUnit, TypeDecl, TypeExpr, Workspace};

    const PKG: &str = "example.com/app";

    fn decl(name: &str, ordinal: usize, child: Option<&str>) -> TypeDecl {
        let fields = child
            .map(|c| vec![Field::new(c, TypeExpr::named(PKG, c))])
            .unwrap_or_default();
        TypeDecl::new(name, TypeExpr::struct_of(fields)).at(ordinal)
    }

    /// a.go: Z@30 -> M, A@10 -> M; b.go: M@5 (matched), Q@20 -> Z.
    fn graph() -> TypeGraph {
        let a = SourceUnit::new("a.go", PKG)
            .with_decl(decl("Z", 30, Some("M")))
            .with_decl(decl("A", 10, Some("M")));
        let b = SourceUnit::new("b.go", PKG)
            .with_decl(decl("M", 5, None))
            .with_decl(decl("Q", 20, Some("Z")));
        let ws = Workspace::new(vec![a, b]);
        let mut delegate = match_fn(|c: &Candidate<'_>| Ok(c.identity.name == "M"));
        TypeGraph::build(&ws, &mut delegate).unwrap()
    }

    fn names<C>(unit: &ReplacementUnit<'_, C>) -> Vec<String> {
        unit.identities().map(|id| id.name.clone()).collect()
    }

    #[test]
    fn test_units_are_ordered_by_declaration() {
        let graph = graph();
        let mut calls = Vec::new();
        let units = graph
            .gather_upward(true, filter::accept_all, |site: &DeclSite| {
                calls.push(site.unit);
                Ok(site.file.display().to_string())
            })
            .unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(calls.len(), 2);
        let a = &units[&UnitId(0)];
        assert_eq!(a.scope, "a.go");
        assert_eq!(names(a), vec!["A", "Z"]);
        let b = &units[&UnitId(1)];
        assert_eq!(names(b), vec!["M", "Q"]);
        assert_eq!(b.package, PKG);
    }

    #[test]
    fn test_duplicates_in_sequence_are_removed() {
        let graph = graph();
        let a = graph.node(&TypeIdentity::new(PKG, "A")).unwrap();
        let z = graph.node(&TypeIdentity::new(PKG, "Z")).unwrap();
        let seq = vec![(&z.identity, z), (&a.identity, a), (&z.identity, z)];
        let units = graph
            .gather_replacement_units(seq, |_: &DeclSite| Ok(()))
            .unwrap();
        assert_eq!(names(&units[&UnitId(0)]), vec!["A", "Z"]);
    }

    #[test]
    fn test_scope_failure_aborts() {
        let graph = graph();
        let err = graph
            .gather_upward(true, filter::accept_all, |site: &DeclSite| {
                if site.file.ends_with("b.go") {
                    Err::<(), BoxError>("bad import".into())
                } else {
                    Ok(())
                }
            })
            .err()
            .unwrap();
        match err {
            TypegraphError::ImportResolution { unit, .. } => {
                assert_eq!(unit, PathBuf::from("b.go"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_external_nodes_are_skipped() {
        let unit = SourceUnit::new("a.go", PKG).with_decl(TypeDecl::new(
            "Stamp",
            TypeExpr::struct_of(vec![Field::new("At", TypeExpr::named("time", "Time"))]),
        ));
        let ws = Workspace::new(vec![unit]);
        let mut delegate = match_fn(|c: &Candidate<'_>| Ok(c.external));
        let graph = TypeGraph::build(&ws, &mut delegate).unwrap();

        let units = graph
            .gather_upward(true, filter::accept_all, |_: &DeclSite| Ok(()))
            .unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(names(&units[&UnitId(0)]), vec!["Stamp"]);
    }

    #[test]
    fn test_empty_sequence() {
        let graph: TypeGraph = TypeGraph::new();
        let units = graph
            .gather_upward(false, filter::accept_all, |_: &DeclSite| Ok(()))
            .unwrap();
        assert!(units.is_empty());
    }
}
