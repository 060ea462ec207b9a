//! Report builders for the CLI commands, rendered as text or JSON.

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

use super::{scope_factory, Session};
use crate::directive::NodeDirectives;
use crate::graph::{EdgeMap, GraphStats, MatchKind, TypeNode};

/// Output of one CLI command.
pub trait Report: Serialize {
    fn text(&self) -> String;

    fn render(&self, json: bool) -> Result<String> {
        if json {
            Ok(serde_json::to_string_pretty(self)?)
        } else {
            Ok(self.text())
        }
    }
}

// ─── stats ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub files: usize,
    pub packages: usize,
    #[serde(flatten)]
    pub graph: GraphStats,
}

pub fn stats(session: &Session) -> StatsReport {
    StatsReport {
        files: session.workspace.units().len(),
        packages: session.workspace.packages().count(),
        graph: session.graph.stats(),
    }
}

impl Report for StatsReport {
    fn text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Files:     {}", self.files);
        let _ = writeln!(out, "Packages:  {}", self.packages);
        let _ = writeln!(out, "Types:     {}", self.graph.total_nodes);
        let _ = writeln!(out, "Edges:     {}", self.graph.total_edges);
        let _ = writeln!(out, "Matched:   {}", self.graph.matched);
        let _ = writeln!(out, "External:  {}", self.graph.external);
        let _ = write!(out, "Dependent: {}", self.graph.dependent);
        out
    }
}

// ─── matched ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TypeEntry {
    pub identity: String,
    pub kind: MatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub line: usize,
}

impl TypeEntry {
    fn of(node: &TypeNode<NodeDirectives>) -> Self {
        Self {
            identity: node.identity.to_string(),
            kind: node.kind(),
            file: node.site().map(|s| s.file.clone()),
            line: node.site().map(|s| s.line).unwrap_or(0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MatchedReport {
    pub types: Vec<TypeEntry>,
}

pub fn matched(session: &Session) -> MatchedReport {
    let graph = &session.graph;
    let types = graph
        .external()
        .chain(graph.matched())
        .chain(graph.dependent())
        .map(TypeEntry::of)
        .collect();
    MatchedReport { types }
}

impl Report for MatchedReport {
    fn text(&self) -> String {
        if self.types.is_empty() {
            return "No matched types.".to_string();
        }
        self.types
            .iter()
            .map(|t| match &t.file {
                Some(file) => format!("{} [{}] {}:{}", t.identity, t.kind, file.display(), t.line),
                None => format!("{} [{}]", t.identity, t.kind),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ─── units ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UnitEntry {
    pub file: PathBuf,
    pub package: String,
    pub types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UnitsReport {
    pub units: Vec<UnitEntry>,
}

pub fn units(session: &Session) -> Result<UnitsReport> {
    let filter = session.edge_filter()?;
    let gathered = session
        .graph
        .gather_upward(true, filter, scope_factory(session))?;
    let units = gathered
        .into_values()
        .map(|unit| UnitEntry {
            types: unit.identities().map(|id| id.name.clone()).collect(),
            file: unit.file,
            package: unit.package,
        })
        .collect();
    Ok(UnitsReport { units })
}

impl Report for UnitsReport {
    fn text(&self) -> String {
        if self.units.is_empty() {
            return "No replacement units.".to_string();
        }
        self.units
            .iter()
            .map(|u| format!("{} ({}): {}", u.file.display(), u.package, u.types.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ─── edges ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EdgeEntry {
    pub parent: String,
    pub child: String,
    pub route: String,
    pub instance: String,
}

#[derive(Debug, Serialize)]
pub struct EdgesReport {
    pub identity: String,
    pub parents: Vec<EdgeEntry>,
    pub children: Vec<EdgeEntry>,
}

pub fn edges(session: &Session, type_name: &str) -> Result<EdgesReport> {
    let graph = &session.graph;
    let found: Vec<&TypeNode<NodeDirectives>> = graph
        .nodes()
        .into_iter()
        .filter(|n| n.identity.name == type_name || n.identity.to_string() == type_name)
        .collect();
    let node = match found.as_slice() {
        [node] => *node,
        [] => bail!("no type named {type_name}"),
        many => bail!(
            "{type_name} is ambiguous: {}",
            many.iter()
                .map(|n| n.identity.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };

    Ok(EdgesReport {
        identity: node.identity.to_string(),
        parents: edge_entries(graph.parents(&node.identity)),
        children: edge_entries(graph.children(&node.identity)),
    })
}

fn edge_entries(map: EdgeMap<'_>) -> Vec<EdgeEntry> {
    map.into_values()
        .flatten()
        .map(|e| EdgeEntry {
            parent: e.parent.to_string(),
            child: e.child.to_string(),
            route: e.route_string(),
            instance: e.instance.to_string(),
        })
        .collect()
}

impl Report for EdgesReport {
    fn text(&self) -> String {
        let mut out = format!("{}\n", self.identity);
        for e in &self.parents {
            let _ = writeln!(out, "  <- {} [{}]", e.parent, e.route);
        }
        for e in &self.children {
            let _ = writeln!(out, "  -> {} [{}]", e.instance, e.route);
        }
        out.trim_end().to_string()
    }
}
