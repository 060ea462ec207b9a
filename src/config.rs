//
//  config.rs
//  typegraph
//

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::directive::{parse_node_directives, NodeDirectives};
use crate::error::{BoxError, Result, TypegraphError};
use crate::graph::{filter, Candidate, DenyKinds, Edge, GraphDelegate, SegmentKind};
use crate::model::{has_directive, DeclGroup, SourceUnit, TypeDecl, TypeIdentity};

/// Default config file name, looked up in the first scan root.
pub const CONFIG_FILE: &str = "typegraph.toml";

/// Top-level typegraph configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypegraphConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub matching: MatchConfig,
    #[serde(default)]
    pub edges: EdgeConfig,
    #[serde(default)]
    pub imports: ImportConfig,
}

/// Which sources are analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Directories to walk, relative to the config file.
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,
    /// Module path used when no `go.mod` is found.
    #[serde(default)]
    pub module: String,
    /// Skip files carrying a `Code generated ... DO NOT EDIT.` header.
    #[serde(default = "default_true")]
    pub skip_generated: bool,
    /// Comment directive excluding a declaration group or declaration.
    #[serde(default = "default_ignore_directive")]
    pub ignore_directive: String,
}

/// The primary match predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Type names (`User`) or full identities (`example.com/app.User`).
    #[serde(default)]
    pub names: Vec<String>,
    /// Every type of these packages matches.
    #[serde(default)]
    pub packages: Vec<String>,
    /// Whether types declared outside the workspace may match.
    #[serde(default = "default_true")]
    pub external: bool,
}

/// The edge filter used for dependent propagation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Segment kinds an accepted route may not contain.
    #[serde(default)]
    pub deny: Vec<String>,
    /// Accept routes entering a struct literal inside a struct field.
    #[serde(default = "default_true")]
    pub nested_struct_literals: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Import path prefixes replacement units may depend on; `*` allows all.
    #[serde(default = "default_allowed")]
    pub allowed: Vec<String>,
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_true() -> bool {
    true
}

fn default_ignore_directive() -> String {
    "typegraph:ignore".to_string()
}

fn default_allowed() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            module: String::new(),
            skip_generated: true,
            ignore_directive: default_ignore_directive(),
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            packages: Vec::new(),
            external: true,
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            deny: Vec::new(),
            nested_struct_literals: true,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            allowed: default_allowed(),
        }
    }
}

impl TypegraphConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Load config from a TOML file the caller asked for explicitly.
    pub fn open(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|e| TypegraphError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| TypegraphError::Config(e.to_string()))
    }

    pub fn delegate(&self) -> ConfigDelegate<'_> {
        ConfigDelegate { config: self }
    }
}

impl ScanConfig {
    /// Scan roots resolved against `base` (the config file's directory).
    /// A `.` root is `base` itself.
    pub fn resolve_roots(&self, base: &Path) -> Vec<PathBuf> {
        self.roots
            .iter()
            .map(|root| {
                if root == Path::new(".") {
                    base.to_path_buf()
                } else {
                    base.join(root)
                }
            })
            .collect()
    }
}

impl MatchConfig {
    pub fn matches(&self, identity: &TypeIdentity) -> bool {
        self.packages.iter().any(|p| *p == identity.package)
            || self
                .names
                .iter()
                .any(|n| *n == identity.name || *n == identity.to_string())
    }
}

impl EdgeConfig {
    pub fn filter(&self) -> Result<EdgeRules> {
        let kinds = self
            .deny
            .iter()
            .map(|kind| kind.parse::<SegmentKind>().map_err(TypegraphError::Config))
            .collect::<Result<Vec<_>>>()?;
        Ok(EdgeRules {
            deny: DenyKinds::new(kinds),
            nested_struct_literals: self.nested_struct_literals,
        })
    }
}

/// Compiled [`EdgeConfig`].
#[derive(Debug, Clone)]
pub struct EdgeRules {
    deny: DenyKinds,
    nested_struct_literals: bool,
}

impl EdgeRules {
    pub fn accept(&self, edge: &Edge) -> bool {
        if !self.nested_struct_literals && !filter::no_nested_struct_literals(edge) {
            return false;
        }
        self.deny.accept(edge)
    }
}

/// [`GraphDelegate`] driven by a [`TypegraphConfig`]. Attaches parsed
/// [`NodeDirectives`] to every registered node.
#[derive(Debug, Clone, Copy)]
pub struct ConfigDelegate<'c> {
    config: &'c TypegraphConfig,
}

impl GraphDelegate for ConfigDelegate<'_> {
    type Private = NodeDirectives;

    fn keep_group(&mut self, unit: &SourceUnit, group: &DeclGroup) -> Result<bool, BoxError> {
        let scan = &self.config.scan;
        if scan.skip_generated && unit.generated {
            return Ok(false);
        }
        Ok(!has_directive(&group.doc, &scan.ignore_directive))
    }

    fn keep_decl(&mut self, _unit: &SourceUnit, decl: &TypeDecl) -> Result<bool, BoxError> {
        Ok(!has_directive(&decl.doc, &self.config.scan.ignore_directive))
    }

    fn is_match(&mut self, candidate: &Candidate<'_>) -> Result<bool, BoxError> {
        if candidate.external && !self.config.matching.external {
            return Ok(false);
        }
        Ok(self.config.matching.matches(candidate.identity))
    }

    fn parse_private(
        &mut self,
        _unit: &SourceUnit,
        decl: &TypeDecl,
    ) -> Result<Option<NodeDirectives>, BoxError> {
        Ok(Some(parse_node_directives(decl)?))
    }
}
