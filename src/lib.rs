//! # typegraph
//!
//! Type-dependency graphs for Go source-to-source code generators.
//!
//! Given a loaded Go workspace and a predicate picking the "interesting"
//! types, typegraph records which named types structurally contain which,
//! finds every type that transitively depends on a match, and groups those
//! types by the file that declares them so a generator knows what to rewrite.
//!
//! ## Key Features
//!
//! - **Structural edges**: every containment path is kept, with a route of
//!   fields, pointers, slices, arrays, maps, channels and aliases
//! - **Generics**: instantiations like `Box[*Item]` become edges carrying
//!   their type arguments
//! - **External types**: types outside the workspace enter the graph only
//!   when the predicate asks for them
//! - **Deterministic**: traversal and grouping orders are stable
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use typegraph::{load_workspace, match_fn, Candidate, ParseCache, TypeGraph, TypegraphConfig};
//!
//! let config = TypegraphConfig::default();
//! let ws = load_workspace(Path::new("."), &config.scan, &mut ParseCache::new()).unwrap();
//!
//! let mut delegate = match_fn(|c: &Candidate<'_>| Ok(c.identity.name == "Time"));
//! let mut graph = TypeGraph::build(&ws, &mut delegate).unwrap();
//! graph.mark_dependent(typegraph::graph::accept_all);
//!
//! for node in graph.dependent() {
//!     println!("{}", node.identity);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod directive;
pub mod error;
pub mod graph;
pub mod imports;
pub mod model;
pub mod parser;

// Re-exports for convenience
pub use config::{TypegraphConfig, CONFIG_FILE};
pub use directive::{HandlePolicy, NodeDirectives, PolicyFilter};
pub use error::{BoxError, Result, TypegraphError};
pub use graph::{
    match_fn, Candidate, Edge, GraphDelegate, MatchKind, ReplacementUnit, Segment, TypeGraph,
    TypeNode,
};
pub use imports::ImportScope;
pub use model::{SourceUnit, TypeDecl, TypeExpr, TypeIdentity, Workspace};
pub use parser::{load_workspace, parse_source, ParseCache};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::accept_all;
    use std::path::Path;

    const MODELS: &str = r#"package models

import (
	"time"

	"example.com/shop/money"
)

// Order is placed by a customer.
type Order struct {
	ID    int64
	Lines []Line
	Total money.Amount
}

type Line struct {
	SKU   string
	Price money.Amount
}

type Tag string

type Audit struct {
	At time.Time
}
"#;

    const MONEY: &str = r#"package money

type Amount struct {
	Cents    int64
	Currency string
}
"#;

    #[test]
    fn test_parse_build_gather() {
        let models = parse_source(
            "example.com/shop/models",
            Path::new("models/models.go"),
            MODELS,
        )
        .unwrap();
        let money = parse_source("example.com/shop/money", Path::new("money/money.go"), MONEY)
            .unwrap();
        let ws = Workspace::new(vec![models, money]);

        let mut delegate = match_fn(|c: &Candidate<'_>| Ok(c.identity.name == "Amount"));
        let mut graph = TypeGraph::build(&ws, &mut delegate).unwrap();
        assert_eq!(graph.mark_dependent(accept_all), 2);

        let dependent: Vec<String> = graph
            .dependent()
            .iter()
            .map(|n| n.identity.name.clone())
            .collect();
        assert_eq!(dependent, vec!["Line", "Order"]);

        let allowed = vec!["*".to_string()];
        let units = graph
            .gather_upward(false, accept_all, ImportScope::factory(&ws, &allowed))
            .unwrap();
        assert_eq!(units.len(), 1);
        let unit = units.values().next().unwrap();
        assert_eq!(unit.file, Path::new("models/models.go"));
        let names: Vec<&str> = unit.identities().map(|id| id.name.as_str()).collect();
        assert_eq!(names, vec!["Order", "Line"]);

        let mut scope = units.into_values().next().unwrap().scope;
        let amount = TypeIdentity::new("example.com/shop/money", "Amount");
        assert_eq!(scope.qualify(&amount).unwrap(), "money.Amount");
        assert!(scope.added().is_empty());
    }
}
