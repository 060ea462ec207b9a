//! CLI module for typegraph.
//!
//! Commands:
//! - stats: graph and workspace counts
//! - matched: matched and dependent types
//! - units: replacement units a generation pass would rewrite
//! - edges: parents and children of one type

pub mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use self::report::Report as _;
use crate::config::{TypegraphConfig, CONFIG_FILE};
use crate::directive::{NodeDirectives, PolicyFilter};
use crate::graph::{Edge, TypeGraph};
use crate::imports::ImportScope;
use crate::model::Workspace;
use crate::parser::{load_workspace, ParseCache};

#[derive(Parser)]
#[command(name = "typegraph")]
#[command(about = "typegraph - type-dependency graphs for Go code generators", long_about = None)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/typegraph.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Extra type names to match (repeatable)
    #[arg(short = 'm', long = "match")]
    pub matches: Vec<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show workspace and graph statistics
    Stats,

    /// List matched, external and dependent types
    Matched,

    /// List replacement units (files to rewrite, types in declaration order)
    Units,

    /// Show parents and children of a type
    Edges {
        /// Type name (`User`) or full identity (`example.com/app.User`)
        type_name: String,
    },
}

/// A loaded workspace with its graph, dependents marked.
pub struct Session {
    pub config: TypegraphConfig,
    pub workspace: Workspace,
    pub graph: TypeGraph<NodeDirectives>,
    policy: PolicyFilter,
}

impl Session {
    pub fn open(root: &Path, config_path: Option<&Path>, matches: &[String]) -> Result<Self> {
        let (mut config, base) = match config_path {
            Some(path) => {
                let config = TypegraphConfig::open(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                let base = path.parent().unwrap_or(Path::new(".")).to_path_buf();
                (config, base)
            }
            None => (TypegraphConfig::load(&root.join(CONFIG_FILE)), root.to_path_buf()),
        };
        config.matching.names.extend(matches.iter().cloned());

        let mut cache = ParseCache::new();
        let workspace = load_workspace(&base, &config.scan, &mut cache)
            .with_context(|| format!("loading Go sources under {}", base.display()))?;
        Self::from_workspace(config, workspace)
    }

    pub fn from_workspace(config: TypegraphConfig, workspace: Workspace) -> Result<Self> {
        let mut graph = TypeGraph::build(&workspace, &mut config.delegate())?;
        let policy = PolicyFilter::from_graph(&graph);
        let rules = config.edges.filter()?;
        let dependent = graph.mark_dependent(|e: &Edge| rules.accept(e) && policy.accept(e));

        let stats = graph.stats();
        info!(
            nodes = stats.total_nodes,
            matched = stats.matched,
            external = stats.external,
            dependent,
            "graph ready"
        );
        Ok(Self {
            config,
            workspace,
            graph,
            policy,
        })
    }

    /// Edge filter combining the config rules and node directives.
    pub fn edge_filter(&self) -> Result<impl Fn(&Edge) -> bool + '_> {
        let rules = self.config.edges.filter()?;
        Ok(move |e: &Edge| rules.accept(e) && self.policy.accept(e))
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let session = Session::open(&cli.root, cli.config.as_deref(), &cli.matches)?;
    let output = match &cli.command {
        Commands::Stats => report::stats(&session).render(cli.json)?,
        Commands::Matched => report::matched(&session).render(cli.json)?,
        Commands::Units => report::units(&session)?.render(cli.json)?,
        Commands::Edges { type_name } => report::edges(&session, type_name)?.render(cli.json)?,
    };
    println!("{output}");
    Ok(())
}

/// Imports allowed for replacement units of `session`.
pub(crate) fn scope_factory(
    session: &Session,
) -> impl FnMut(&crate::graph::DeclSite) -> Result<ImportScope, crate::error::BoxError> + '_ {
    ImportScope::factory(&session.workspace, &session.config.imports.allowed)
}
