//
//  builder.rs
//  typegraph
//

use petgraph::graph::NodeIndex;
use tracing::{debug, trace};

use super::engine::TypeGraph;
use super::types::*;
use crate::error::{BoxError, Result, TypegraphError};
use crate::model::{DeclGroup, NamedRef, SourceUnit, TypeDecl, TypeExpr, TypeIdentity, Workspace};

/// Caller hooks consulted while a graph is built.
///
/// Only the match predicate is mandatory. Any error aborts the build.
pub trait GraphDelegate {
    /// Per-node data attached at registration time.
    type Private;

    /// Keep or drop a whole declaration group.
    fn keep_group(&mut self, _unit: &SourceUnit, _group: &DeclGroup) -> Result<bool, BoxError> {
        Ok(true)
    }

    /// Keep or drop one declaration of a kept group.
    fn keep_decl(&mut self, _unit: &SourceUnit, _decl: &TypeDecl) -> Result<bool, BoxError> {
        Ok(true)
    }

    /// Primary predicate. Asked once per identity: at declaration scan for
    /// in-scope types, at first edge arrival for external ones.
    fn is_match(&mut self, candidate: &Candidate<'_>) -> Result<bool, BoxError>;

    /// Parse private data for a newly registered in-scope node.
    fn parse_private(
        &mut self,
        _unit: &SourceUnit,
        _decl: &TypeDecl,
    ) -> Result<Option<Self::Private>, BoxError> {
        Ok(None)
    }
}

/// A delegate made of a single match closure.
pub struct MatchFn<F>(F);

/// Wrap a match closure into a [`GraphDelegate`] with default filters.
pub fn match_fn<F>(f: F) -> MatchFn<F>
where
    F: FnMut(&Candidate<'_>) -> Result<bool, BoxError>,
{
    MatchFn(f)
}

impl<F> GraphDelegate for MatchFn<F>
where
    F: FnMut(&Candidate<'_>) -> Result<bool, BoxError>,
{
    type Private = ();

    fn is_match(&mut self, candidate: &Candidate<'_>) -> Result<bool, BoxError> {
        (self.0)(candidate)
    }
}

impl<P> TypeGraph<P> {
    /// Build the graph of `workspace`.
    ///
    /// Phase 1 registers every kept declaration; phase 2 draws edges. Edges
    /// may point at types declared in units scanned later, so phase 2 only
    /// starts once every unit is registered.
    pub fn build<D>(workspace: &Workspace, delegate: &mut D) -> Result<Self>
    where
        D: GraphDelegate<Private = P>,
    {
        let mut builder = Builder {
            workspace,
            delegate,
            graph: TypeGraph::new(),
        };
        builder.register_all()?;
        builder.connect_all()?;

        let stats = builder.graph.stats();
        debug!(
            nodes = stats.total_nodes,
            edges = stats.total_edges,
            matched = stats.matched,
            external = stats.external,
            "type graph built"
        );
        Ok(builder.graph)
    }
}

struct Builder<'w, 'd, D: GraphDelegate> {
    workspace: &'w Workspace,
    delegate: &'d mut D,
    graph: TypeGraph<D::Private>,
}

impl<D: GraphDelegate> Builder<'_, '_, D> {
    // ─── Phase 1: Registry ──────────────────────────────────────

    fn register_all(&mut self) -> Result<()> {
        let workspace = self.workspace;
        for unit in workspace.units() {
            for group in &unit.groups {
                let keep = self
                    .delegate
                    .keep_group(unit, group)
                    .map_err(|source| TypegraphError::GroupFilter {
                        unit: unit.path.clone(),
                        source,
                    })?;
                if !keep {
                    continue;
                }
                for decl in &group.decls {
                    self.register_decl(unit, decl)?;
                }
            }
        }
        debug!(
            registered = self.graph.len(),
            matched = self.graph.matched.len(),
            "registered type declarations"
        );
        Ok(())
    }

    fn register_decl(&mut self, unit: &SourceUnit, decl: &TypeDecl) -> Result<()> {
        if decl.name.is_empty() {
            return Err(TypegraphError::MalformedDecl {
                unit: unit.path.clone(),
                reason: format!("unnamed type declaration at ordinal {}", decl.ordinal),
            });
        }
        let keep = self
            .delegate
            .keep_decl(unit, decl)
            .map_err(|source| TypegraphError::DeclFilter {
                unit: unit.path.clone(),
                name: decl.name.clone(),
                source,
            })?;
        // Aliases and blank declarations do not denote named types.
        if !keep || decl.is_alias() || decl.name == "_" {
            return Ok(());
        }

        let identity = unit.identity_of(decl);
        if self.graph.contains(&identity) {
            return Ok(());
        }

        let private = self
            .delegate
            .parse_private(unit, decl)
            .map_err(|source| TypegraphError::PrivateData {
                identity: identity.clone(),
                source,
            })?;
        let candidate = Candidate {
            identity: &identity,
            decl: Some(decl),
            unit: Some(unit),
            instance: None,
            external: false,
        };
        let matched = self
            .delegate
            .is_match(&candidate)
            .map_err(|source| TypegraphError::Predicate {
                identity: identity.clone(),
                source,
            })?;

        let site = DeclSite::new(unit, decl);
        let node = TypeNode::declared(identity, site, decl.clone(), private);
        let (idx, _) = self.graph.add_node(node);
        if matched {
            self.graph.mark_matched(idx);
        }
        Ok(())
    }

    // ─── Phase 2: Edges ─────────────────────────────────────────

    fn connect_all(&mut self) -> Result<()> {
        let declared: Vec<(NodeIndex, TypeIdentity)> = self
            .graph
            .graph
            .node_indices()
            .filter(|&idx| self.graph.node_at(idx).site().is_some())
            .map(|idx| (idx, self.graph.node_at(idx).identity.clone()))
            .collect();

        for (idx, identity) in declared {
            let Some(underlying) = self.workspace.underlying(&identity) else {
                trace!(%identity, "no underlying definition in workspace");
                continue;
            };
            let mut walk = Walk {
                parent: idx,
                parent_id: &identity,
                route: Vec::new(),
                aliases: Vec::new(),
            };
            self.walk(&mut walk, &underlying)?;
        }
        debug!(
            edges = self.graph.graph.edge_count(),
            external = self.graph.external.len(),
            "connected type graph"
        );
        Ok(())
    }

    /// Unwrap `ty` until named termini are reached, drawing one edge per terminus.
    fn walk(&mut self, walk: &mut Walk<'_>, ty: &TypeExpr) -> Result<()> {
        match ty {
            TypeExpr::Pointer { elem } => self.descend(walk, Segment::Pointer, elem),
            TypeExpr::Slice { elem } => self.descend(walk, Segment::Slice, elem),
            TypeExpr::Array { len, elem } => {
                self.descend(walk, Segment::Array { len: len.clone() }, elem)
            }
            TypeExpr::Chan { dir, elem } => self.descend(walk, Segment::Chan { dir: *dir }, elem),
            TypeExpr::Map { key, value } => {
                self.descend(walk, Segment::Map { side: MapSide::Key }, key)?;
                self.descend(walk, Segment::Map { side: MapSide::Value }, value)
            }
            TypeExpr::Struct { fields } => {
                for (index, field) in fields.iter().enumerate() {
                    let segment = Segment::Field {
                        index,
                        ordinal: field.ordinal,
                        name: field.name.clone(),
                    };
                    self.descend(walk, segment, &field.ty)?;
                }
                Ok(())
            }
            TypeExpr::Named(named) => {
                if let Some(target) = self.workspace.resolve_alias(named) {
                    if walk.aliases.contains(&named.id) {
                        return Ok(());
                    }
                    walk.aliases.push(named.id.clone());
                    let segment = Segment::Alias {
                        target: named.id.clone(),
                    };
                    self.descend(walk, segment, &target)?;
                    walk.aliases.pop();
                    return Ok(());
                }
                self.connect(walk, named)
            }
            TypeExpr::Interface
            | TypeExpr::Func
            | TypeExpr::Basic { .. }
            | TypeExpr::TypeParam { .. } => Ok(()),
        }
    }

    fn descend(&mut self, walk: &mut Walk<'_>, segment: Segment, ty: &TypeExpr) -> Result<()> {
        walk.route.push(segment);
        self.walk(walk, ty)?;
        walk.route.pop();
        Ok(())
    }

    fn connect(&mut self, walk: &Walk<'_>, named: &NamedRef) -> Result<()> {
        let Some(child) = self.resolve_terminus(named)? else {
            return Ok(());
        };
        let type_args = self.type_arg_edges(&named.args)?;
        let edge = Edge {
            route: walk.route.clone(),
            type_args,
            parent: walk.parent_id.clone(),
            child: named.id.clone(),
            instance: named.clone(),
        };
        trace!(%edge, "edge");
        self.graph.add_edge(walk.parent, child, edge);
        Ok(())
    }

    /// Node for a named terminus, registering an external node if the
    /// predicate accepts it. `None` abandons the branch.
    fn resolve_terminus(&mut self, named: &NamedRef) -> Result<Option<NodeIndex>> {
        if let Some(idx) = self.graph.index_of(&named.id) {
            return Ok(Some(idx));
        }
        // Unregistered: out of the workspace, or dropped by the caller's filters.
        let filtered = self.workspace.lookup_with_unit(&named.id);
        let candidate = Candidate {
            identity: &named.id,
            decl: filtered.map(|(_, decl)| decl),
            unit: filtered.map(|(unit, _)| unit),
            instance: Some(named),
            external: true,
        };
        let accepted = self
            .delegate
            .is_match(&candidate)
            .map_err(|source| TypegraphError::Predicate {
                identity: named.id.clone(),
                source,
            })?;
        if !accepted {
            trace!(identity = %named.id, "external type rejected");
            return Ok(None);
        }
        let (idx, _) = self.graph.add_node(TypeNode::external(named.clone()));
        self.graph.mark_matched(idx);
        Ok(Some(idx))
    }

    fn type_arg_edges(&mut self, args: &[TypeExpr]) -> Result<Vec<TypeArgEdge>> {
        args.iter()
            .enumerate()
            .map(|(index, arg)| self.type_arg_edge(index, arg))
            .collect()
    }

    fn type_arg_edge(&mut self, index: usize, arg: &TypeExpr) -> Result<TypeArgEdge> {
        let mut route = Vec::new();
        let terminus = self.unwrap_arg(arg, &mut route, &mut Vec::new());
        let (child, type_args) = match terminus {
            Some(named) => {
                let child = self.resolve_terminus(&named)?.map(|_| named.id.clone());
                (child, self.type_arg_edges(&named.args)?)
            }
            None => (None, Vec::new()),
        };
        Ok(TypeArgEdge {
            index,
            arg: arg.clone(),
            route,
            child,
            type_args,
        })
    }

    /// Single named terminus of a type argument. Struct literals are not
    /// descended; for maps the value side is followed.
    fn unwrap_arg(
        &self,
        ty: &TypeExpr,
        route: &mut Vec<Segment>,
        aliases: &mut Vec<TypeIdentity>,
    ) -> Option<NamedRef> {
        match ty {
            TypeExpr::Pointer { elem } => {
                route.push(Segment::Pointer);
                self.unwrap_arg(elem, route, aliases)
            }
            TypeExpr::Slice { elem } => {
                route.push(Segment::Slice);
                self.unwrap_arg(elem, route, aliases)
            }
            TypeExpr::Array { len, elem } => {
                route.push(Segment::Array { len: len.clone() });
                self.unwrap_arg(elem, route, aliases)
            }
            TypeExpr::Chan { dir, elem } => {
                route.push(Segment::Chan { dir: *dir });
                self.unwrap_arg(elem, route, aliases)
            }
            TypeExpr::Map { value, .. } => {
                route.push(Segment::Map {
                    side: MapSide::Value,
                });
                self.unwrap_arg(value, route, aliases)
            }
            TypeExpr::Named(named) => match self.workspace.resolve_alias(named) {
                Some(_) if aliases.contains(&named.id) => None,
                Some(target) => {
                    aliases.push(named.id.clone());
                    route.push(Segment::Alias {
                        target: named.id.clone(),
                    });
                    self.unwrap_arg(&target, route, aliases)
                }
                None => Some(named.clone()),
            },
            TypeExpr::Struct { .. }
            | TypeExpr::Interface
            | TypeExpr::Func
            | TypeExpr::Basic { .. }
            | TypeExpr::TypeParam { .. } => None,
        }
    }
}

/// State of one structural walk from a parent node.
struct Walk<'a> {
    parent: NodeIndex,
    parent_id: &'a TypeIdentity,
    route: Vec<Segment>,
    aliases: Vec<TypeIdentity>,
}
