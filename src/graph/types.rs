//
//  types.rs
//  typegraph
//

use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::ops::BitOr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::model::{ChanDir, NamedRef, SourceUnit, TypeDecl, TypeExpr, TypeIdentity, UnitId};

// ─── Match Kind ─────────────────────────────────────────────────

/// Classification flags of a node. Not exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MatchKind(u8);

impl MatchKind {
    /// Satisfies the caller's primary predicate.
    pub const MATCHED: MatchKind = MatchKind(1 << 0);
    /// Reaches a matched or external node through accepted edges.
    pub const DEPENDENT: MatchKind = MatchKind(1 << 1);
    /// Declared outside the analyzed units.
    pub const EXTERNAL: MatchKind = MatchKind(1 << 2);

    pub const fn empty() -> Self {
        MatchKind(0)
    }

    pub const fn contains(self, other: MatchKind) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: MatchKind) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: MatchKind) {
        self.0 &= !other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_matched(self) -> bool {
        self.contains(Self::MATCHED)
    }

    pub const fn is_dependent(self) -> bool {
        self.contains(Self::DEPENDENT)
    }

    pub const fn is_external(self) -> bool {
        self.contains(Self::EXTERNAL)
    }

    pub fn labels(self) -> Vec<&'static str> {
        [
            (Self::MATCHED, "matched"),
            (Self::DEPENDENT, "dependent"),
            (Self::EXTERNAL, "external"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, label)| label)
        .collect()
    }
}

impl BitOr for MatchKind {
    type Output = MatchKind;

    fn bitor(self, rhs: MatchKind) -> MatchKind {
        MatchKind(self.0 | rhs.0)
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        write!(f, "{}", self.labels().join("|"))
    }
}

impl Serialize for MatchKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.labels())
    }
}

// ─── Route Segments ─────────────────────────────────────────────

/// Which side of a map a segment descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapSide {
    Key,
    Value,
}

/// One structural hop of an edge route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Alias { target: TypeIdentity },
    Array { len: Option<String> },
    Slice,
    Map { side: MapSide },
    Chan { dir: ChanDir },
    Pointer,
    /// Struct field at `index`; `ordinal` is the field's source ordinal.
    Field {
        index: usize,
        ordinal: usize,
        name: String,
    },
}

impl Segment {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Segment::Alias { .. } => SegmentKind::Alias,
            Segment::Array { .. } => SegmentKind::Array,
            Segment::Slice => SegmentKind::Slice,
            Segment::Map { .. } => SegmentKind::Map,
            Segment::Chan { .. } => SegmentKind::Chan,
            Segment::Pointer => SegmentKind::Pointer,
            Segment::Field { .. } => SegmentKind::Field,
        }
    }

    pub fn field(index: usize, name: impl Into<String>) -> Self {
        Segment::Field {
            index,
            ordinal: index,
            name: name.into(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Alias { target } => write!(f, "alias({})", target.name),
            Segment::Array { len } => write!(f, "[{}]", len.as_deref().unwrap_or("...")),
            Segment::Slice => write!(f, "[]"),
            Segment::Map { side: MapSide::Key } => write!(f, "map[key]"),
            Segment::Map { side: MapSide::Value } => write!(f, "map[value]"),
            Segment::Chan { .. } => write!(f, "chan"),
            Segment::Pointer => write!(f, "*"),
            Segment::Field { index, name, .. } => write!(f, ".{name}@{index}"),
        }
    }
}

/// Segment discriminant, used by edge filters and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Alias,
    Array,
    Slice,
    Map,
    Chan,
    Pointer,
    Field,
}

impl SegmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Alias => "alias",
            SegmentKind::Array => "array",
            SegmentKind::Slice => "slice",
            SegmentKind::Map => "map",
            SegmentKind::Chan => "chan",
            SegmentKind::Pointer => "pointer",
            SegmentKind::Field => "field",
        }
    }
}

impl FromStr for SegmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alias" => Ok(SegmentKind::Alias),
            "array" => Ok(SegmentKind::Array),
            "slice" => Ok(SegmentKind::Slice),
            "map" => Ok(SegmentKind::Map),
            "chan" | "channel" => Ok(SegmentKind::Chan),
            "pointer" | "ptr" => Ok(SegmentKind::Pointer),
            "field" | "struct" => Ok(SegmentKind::Field),
            other => Err(format!("unknown edge segment kind {other:?}")),
        }
    }
}

/// Render a route as `.X@0 *`.
pub fn route_string(route: &[Segment]) -> String {
    route
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

// ─── Edges ──────────────────────────────────────────────────────

/// One generic argument of an edge's child instantiation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TypeArgEdge {
    /// Position of the argument.
    pub index: usize,
    pub arg: TypeExpr,
    /// Hops from the argument to its named terminus.
    pub route: Vec<Segment>,
    /// Graph node the argument resolves to, if any.
    pub child: Option<TypeIdentity>,
    /// Arguments of the terminus instantiation.
    pub type_args: Vec<TypeArgEdge>,
}

/// A structural path from a parent named type to a child named type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Edge {
    pub route: Vec<Segment>,
    pub type_args: Vec<TypeArgEdge>,
    /// Generic (non-instantiated) parent declaration.
    pub parent: TypeIdentity,
    /// Non-instantiated child node.
    pub child: TypeIdentity,
    /// Child as written at the use site, with type arguments.
    pub instance: NamedRef,
}

impl Edge {
    pub fn contains_kind(&self, kind: SegmentKind) -> bool {
        self.route.iter().any(|s| s.kind() == kind)
    }

    /// Index of the parent struct field the route leaves through.
    pub fn field_index(&self) -> Option<usize> {
        match self.route.first() {
            Some(Segment::Field { index, .. }) => Some(*index),
            _ => None,
        }
    }

    /// Route a handling policy applies to: a trailing pointer is stripped.
    pub fn policy_route(&self) -> &[Segment] {
        match self.route.split_last() {
            Some((Segment::Pointer, rest)) => rest,
            _ => &self.route,
        }
    }

    pub fn route_string(&self) -> String {
        route_string(&self.route)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.parent, self.route_string(), self.instance)
    }
}

// ─── Nodes ──────────────────────────────────────────────────────

/// Where an in-scope type is declared.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeclSite {
    pub unit: UnitId,
    pub file: PathBuf,
    pub package: String,
    /// Stable in-unit ordinal; orders and de-duplicates replacement units.
    pub ordinal: usize,
    pub line: usize,
}

impl DeclSite {
    pub fn new(unit: &SourceUnit, decl: &TypeDecl) -> Self {
        Self {
            unit: unit.id,
            file: unit.path.clone(),
            package: unit.package_path.clone(),
            ordinal: decl.ordinal,
            line: decl.line,
        }
    }
}

/// A named type in the graph.
#[derive(Debug, Clone)]
pub struct TypeNode<P = ()> {
    pub identity: TypeIdentity,
    pub(crate) site: Option<DeclSite>,
    pub(crate) decl: Option<TypeDecl>,
    pub(crate) instance: Option<NamedRef>,
    pub(crate) kind: MatchKind,
    pub(crate) private: Option<P>,
}

impl<P> TypeNode<P> {
    pub(crate) fn declared(
        identity: TypeIdentity,
        site: DeclSite,
        decl: TypeDecl,
        private: Option<P>,
    ) -> Self {
        Self {
            identity,
            site: Some(site),
            decl: Some(decl),
            instance: None,
            kind: MatchKind::empty(),
            private,
        }
    }

    pub(crate) fn external(instance: NamedRef) -> Self {
        Self {
            identity: instance.id.clone(),
            site: None,
            decl: None,
            instance: Some(instance),
            kind: MatchKind::EXTERNAL,
            private: None,
        }
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    pub fn is_matched(&self) -> bool {
        self.kind.is_matched()
    }

    pub fn is_dependent(&self) -> bool {
        self.kind.is_dependent()
    }

    pub fn is_external(&self) -> bool {
        self.kind.is_external()
    }

    /// Declaration site; `None` for external nodes.
    pub fn site(&self) -> Option<&DeclSite> {
        self.site.as_ref()
    }

    /// Declaration ordinal, 0 for external nodes.
    pub fn ordinal(&self) -> usize {
        self.site.as_ref().map(|s| s.ordinal).unwrap_or(0)
    }

    pub fn decl(&self) -> Option<&TypeDecl> {
        self.decl.as_ref()
    }

    /// Instantiation that first reached an external node.
    pub fn instance(&self) -> Option<&NamedRef> {
        self.instance.as_ref()
    }

    pub fn private(&self) -> Option<&P> {
        self.private.as_ref()
    }

    pub fn private_mut(&mut self) -> Option<&mut P> {
        self.private.as_mut()
    }
}

/// What the match predicate sees.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub identity: &'a TypeIdentity,
    /// Declaration, for in-scope candidates.
    pub decl: Option<&'a TypeDecl>,
    pub unit: Option<&'a SourceUnit>,
    /// Reference that reached the candidate, for external candidates.
    pub instance: Option<&'a NamedRef>,
    pub external: bool,
}

/// Graph statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub matched: usize,
    pub dependent: usize,
    pub external: usize,
}
