//! Type-dependency graph: registry, edge builder, upward traversal and
//! replacement-unit gathering.

pub mod builder;
pub mod engine;
pub mod filter;
pub mod gather;
pub mod query;
pub mod types;

pub use builder::{match_fn, GraphDelegate, MatchFn};
pub use engine::{EdgeMap, TypeGraph};
pub use filter::{accept_all, no_nested_struct_literals, DenyKinds};
pub use gather::ReplacementUnit;
pub use query::UpwardIter;
pub use types::{
    route_string, Candidate, DeclSite, Edge, GraphStats, MapSide, MatchKind, Segment,
    SegmentKind, TypeArgEdge, TypeNode,
};
