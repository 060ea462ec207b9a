//
//  loader.rs
//  typegraph
//

use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::cache::ParseCache;
use super::extractor::{is_go_source, parse_source};
use crate::config::ScanConfig;
use crate::error::Result;
use crate::model::{SourceUnit, Workspace};

/// Directories that are never analyzed, even without .gitignore.
const BUILTIN_IGNORE: &[&str] = &["vendor", "testdata", "node_modules", ".git"];

/// Check if a path contains any built-in ignored directory.
fn is_builtin_ignored(path: &Path) -> bool {
    path.components().any(|c| {
        if let std::path::Component::Normal(name) = c {
            BUILTIN_IGNORE.contains(&name.to_str().unwrap_or(""))
        } else {
            false
        }
    })
}

/// Go files under `roots`, sorted and de-duplicated.
pub fn discover(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = roots
        .iter()
        .flat_map(|root| {
            WalkBuilder::new(root)
                .hidden(true)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .add_custom_ignore_filename(".typegraphignore")
                .build()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
                .filter(move |entry| {
                    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                    !is_builtin_ignored(rel)
                })
                .filter(|entry| is_go_source(entry.path()))
                .map(|entry| entry.into_path())
        })
        .collect();
    files.sort();
    files.dedup();
    files
}

/// `module` path declared by a `go.mod` file.
fn module_path(go_mod: &str) -> Option<String> {
    go_mod.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.trim().trim_matches('"');
        (!path.is_empty()).then(|| path.to_string())
    })
}

fn join_package(base: &str, rel: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !base.is_empty() {
        parts.push(base.trim_end_matches('/').to_string());
    }
    parts.extend(
        rel.components()
            .filter_map(|c| match c {
                std::path::Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            }),
    );
    parts.join("/")
}

/// Derives package import paths from directories.
struct PackageResolver<'c> {
    fallback_module: &'c str,
    /// Directory -> (module root, module path) of its nearest `go.mod`.
    modules: HashMap<PathBuf, Option<(PathBuf, String)>>,
}

impl<'c> PackageResolver<'c> {
    fn new(fallback_module: &'c str) -> Self {
        Self {
            fallback_module,
            modules: HashMap::new(),
        }
    }

    fn nearest_module(&mut self, dir: &Path) -> Option<(PathBuf, String)> {
        if let Some(found) = self.modules.get(dir) {
            return found.clone();
        }
        let found = match fs::read_to_string(dir.join("go.mod")) {
            Ok(contents) => module_path(&contents).map(|m| (dir.to_path_buf(), m)),
            Err(_) => dir.parent().and_then(|parent| self.nearest_module(parent)),
        };
        self.modules.insert(dir.to_path_buf(), found.clone());
        found
    }

    fn package_of(&mut self, root: &Path, dir: &Path) -> String {
        if let Some((module_root, module)) = self.nearest_module(dir) {
            let rel = dir.strip_prefix(&module_root).unwrap_or(Path::new(""));
            return join_package(&module, rel);
        }
        let rel = dir.strip_prefix(root).unwrap_or(Path::new(""));
        let package = join_package(self.fallback_module, rel);
        if !package.is_empty() {
            return package;
        }
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string())
    }
}

/// Walk `scan.roots` (relative to `base`), parse every Go file and assemble
/// the workspace. Unchanged files are served from `cache`.
pub fn load_workspace(base: &Path, scan: &ScanConfig, cache: &mut ParseCache) -> Result<Workspace> {
    let roots = scan.resolve_roots(base);
    let mut resolver = PackageResolver::new(&scan.module);

    let mut sources: Vec<(PathBuf, String, String)> = Vec::new();
    for root in &roots {
        for file in discover(std::slice::from_ref(root)) {
            if sources.iter().any(|(path, _, _)| *path == file) {
                continue;
            }
            let dir = file.parent().unwrap_or(root);
            let package = resolver.package_of(root, dir);
            let source = fs::read_to_string(&file)?;
            sources.push((file, package, source));
        }
    }
    sources.sort_by(|a, b| a.0.cmp(&b.0));

    let mut slots: Vec<Option<SourceUnit>> = sources
        .iter()
        .map(|(path, package, source)| cache.get(path, package, source))
        .collect();

    let parsed: Vec<(usize, SourceUnit)> = sources
        .par_iter()
        .enumerate()
        .filter(|(i, _)| slots[*i].is_none())
        .map(|(i, (path, package, source))| {
            parse_source(package, path, source).map(|unit| (i, unit))
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(
        parsed = parsed.len(),
        cached = sources.len() - parsed.len(),
        "parsed Go sources"
    );

    for (i, unit) in parsed {
        let (path, _, source) = &sources[i];
        cache.insert(path.clone(), source, unit.clone());
        slots[i] = Some(unit);
    }

    let units: Vec<SourceUnit> = slots.into_iter().flatten().collect();
    let workspace = Workspace::new(units);
    info!(
        files = workspace.units().len(),
        packages = workspace.packages().count(),
        "loaded workspace"
    );
    Ok(workspace)
}
