//! Import-resolution context of one source unit.
//!
//! [`ImportScope`] is the default context handed to replacement units: it
//! knows which local name each import binds and can add imports on demand.

use std::collections::BTreeMap;

use crate::error::BoxError;
use crate::graph::DeclSite;
use crate::model::{default_package_name, Import, TypeIdentity, UnitId, Workspace};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("import {0:?} is not a workspace package and not allowed")]
    Unresolved(String),

    #[error("local name {name} bound to both {first:?} and {second:?}")]
    Conflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("empty import path")]
    EmptyPath,

    #[error("unknown source unit {0}")]
    UnknownUnit(UnitId),
}

/// Whether `path` may be imported: a workspace package, a standard library
/// path, or a path under one of the `allowed` prefixes (`*` allows all).
pub fn is_allowed(workspace: &Workspace, path: &str, allowed: &[String]) -> bool {
    if workspace.has_package(path) || is_std(path) {
        return true;
    }
    allowed.iter().any(|prefix| {
        prefix == "*"
            || path == prefix
            || path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| prefix.ends_with('/') || rest.starts_with('/'))
    })
}

/// Standard library paths have no dot in their first element.
fn is_std(path: &str) -> bool {
    path.split('/').next().is_some_and(|first| !first.contains('.'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportScope {
    unit: UnitId,
    package: String,
    allowed: Vec<String>,
    /// local name -> import path
    names: BTreeMap<String, String>,
    /// import path -> local name
    paths: BTreeMap<String, String>,
    added: Vec<Import>,
}

impl ImportScope {
    pub fn resolve(
        workspace: &Workspace,
        unit: UnitId,
        allowed: &[String],
    ) -> Result<Self, ImportError> {
        let source = workspace.unit(unit).ok_or(ImportError::UnknownUnit(unit))?;
        let mut scope = Self {
            unit,
            package: source.package_path.clone(),
            allowed: allowed.to_vec(),
            names: BTreeMap::new(),
            paths: BTreeMap::new(),
            added: Vec::new(),
        };
        for import in &source.imports {
            if import.path.is_empty() {
                return Err(ImportError::EmptyPath);
            }
            if !is_allowed(workspace, &import.path, allowed) {
                return Err(ImportError::Unresolved(import.path.clone()));
            }
            let local = match import.name {
                None => workspace
                    .package_name(&import.path)
                    .or_else(|| import.local_name()),
                Some(_) => import.local_name(),
            };
            let Some(local) = local else {
                continue;
            };
            scope.bind(local, &import.path)?;
        }
        Ok(scope)
    }

    /// Factory for [`crate::graph::TypeGraph::gather_replacement_units`].
    pub fn factory<'w>(
        workspace: &'w Workspace,
        allowed: &'w [String],
    ) -> impl FnMut(&DeclSite) -> Result<ImportScope, BoxError> + 'w {
        move |site: &DeclSite| Ok(Self::resolve(workspace, site.unit, allowed)?)
    }

    fn bind(&mut self, local: &str, path: &str) -> Result<(), ImportError> {
        match self.names.get(local) {
            Some(first) if first != path => {
                return Err(ImportError::Conflict {
                    name: local.to_string(),
                    first: first.clone(),
                    second: path.to_string(),
                })
            }
            Some(_) => return Ok(()),
            None => {}
        }
        self.names.insert(local.to_string(), path.to_string());
        self.paths
            .entry(path.to_string())
            .or_insert_with(|| local.to_string());
        Ok(())
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn local_name(&self, path: &str) -> Option<&str> {
        self.paths.get(path).map(String::as_str)
    }

    /// How `id` is spelled in this unit, importing its package if needed.
    pub fn qualify(&mut self, id: &TypeIdentity) -> Result<String, ImportError> {
        if id.package.is_empty() || id.package == self.package {
            return Ok(id.name.clone());
        }
        let local = self.ensure(&id.package)?;
        Ok(format!("{local}.{}", id.name))
    }

    /// Local name of `path`, adding an import with a free alias if absent.
    pub fn ensure(&mut self, path: &str) -> Result<String, ImportError> {
        if path.is_empty() {
            return Err(ImportError::EmptyPath);
        }
        if let Some(local) = self.paths.get(path) {
            return Ok(local.clone());
        }
        let base: String = default_package_name(path)
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let mut local = base.clone();
        let mut n = 2;
        while self.names.contains_key(&local) {
            local = format!("{base}{n}");
            n += 1;
        }
        self.bind(&local, path)?;
        self.added.push(if local == default_package_name(path) {
            Import::new(path)
        } else {
            Import::named(local.clone(), path)
        });
        Ok(local)
    }

    /// Imports added by [`Self::ensure`], in insertion order.
    pub fn added(&self) -> &[Import] {
        &self.added
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceUnit;

    const PKG: &str = "example.com/app";

    fn workspace(imports: Vec<Import>) -> Workspace {
        let unit = imports
            .into_iter()
            .fold(SourceUnit::new("a.go", PKG), SourceUnit::with_import);
        let lib = SourceUnit::new("lib/b.go", "example.com/app/lib");
        Workspace::new(vec![unit, lib])
    }

    fn all() -> Vec<String> {
        vec!["*".to_string()]
    }

    #[test]
    fn test_allowed_paths() {
        let ws = workspace(vec![]);
        let only = vec!["github.com/acme".to_string()];
        assert!(is_allowed(&ws, "example.com/app/lib", &[]));
        assert!(is_allowed(&ws, "encoding/json", &[]));
        assert!(is_allowed(&ws, "github.com/acme/x", &only));
        assert!(!is_allowed(&ws, "github.com/acmecorp/x", &only));
        assert!(!is_allowed(&ws, "github.com/other/y", &only));
        assert!(is_allowed(&ws, "github.com/other/y", &all()));
    }

    #[test]
    fn test_resolve_binds_local_names() {
        let ws = workspace(vec![
            Import::new("time"),
            Import::named("h", "net/http"),
            Import::named("_", "embed"),
        ]);
        let scope = ImportScope::resolve(&ws, UnitId(0), &all()).unwrap();
        assert_eq!(scope.local_name("time"), Some("time"));
        assert_eq!(scope.local_name("net/http"), Some("h"));
        assert_eq!(scope.local_name("embed"), None);
        assert_eq!(scope.package(), PKG);
    }

    #[test]
    fn test_resolve_uses_real_package_names() {
        let mut money = SourceUnit::new("go-money/m.go", "example.com/app/go-money");
        money.package_name = "money".to_string();
        let unit =
            SourceUnit::new("a.go", PKG).with_import(Import::new("example.com/app/go-money"));
        let ws = Workspace::new(vec![unit, money]);

        let mut scope = ImportScope::resolve(&ws, UnitId(0), &all()).unwrap();
        assert_eq!(scope.local_name("example.com/app/go-money"), Some("money"));
        let amount = TypeIdentity::new("example.com/app/go-money", "Amount");
        assert_eq!(scope.qualify(&amount).unwrap(), "money.Amount");
        assert!(scope.added().is_empty());
    }

    #[test]
    fn test_resolve_failures() {
        let ws = workspace(vec![Import::new("github.com/other/y")]);
        assert_eq!(
            ImportScope::resolve(&ws, UnitId(0), &[]),
            Err(ImportError::Unresolved("github.com/other/y".to_string()))
        );

        let ws = workspace(vec![Import::new("a/x"), Import::named("x", "b/x")]);
        assert!(matches!(
            ImportScope::resolve(&ws, UnitId(0), &all()),
            Err(ImportError::Conflict { .. })
        ));
        assert_eq!(
            ImportScope::resolve(&ws, UnitId(9), &all()),
            Err(ImportError::UnknownUnit(UnitId(9)))
        );
    }

    #[test]
    fn test_qualify_and_ensure() {
        let ws = workspace(vec![Import::named("lib", "other.org/lib")]);
        let mut scope = ImportScope::resolve(&ws, UnitId(0), &all()).unwrap();

        assert_eq!(scope.qualify(&TypeIdentity::new(PKG, "User")).unwrap(), "User");
        assert_eq!(
            scope.qualify(&TypeIdentity::new("other.org/lib", "Thing")).unwrap(),
            "lib.Thing"
        );
        assert_eq!(
            scope.qualify(&TypeIdentity::new("example.com/app/lib", "Item")).unwrap(),
            "lib2.Item"
        );
        assert_eq!(
            scope.qualify(&TypeIdentity::new("time", "Time")).unwrap(),
            "time.Time"
        );
        assert_eq!(
            scope.added(),
            &[
                Import::named("lib2", "example.com/app/lib"),
                Import::new("time")
            ]
        );
        assert_eq!(scope.ensure(""), Err(ImportError::EmptyPath));
    }

    #[test]
    fn test_factory() {
        let ws = workspace(vec![Import::new("fmt")]);
        let allowed = all();
        let mut factory = ImportScope::factory(&ws, &allowed);
        let unit = &ws.units()[0];
        let decl = crate::model::TypeDecl::new("T", crate::model::TypeExpr::basic("int"));
        let scope = factory(&DeclSite::new(unit, &decl)).unwrap();
        assert_eq!(scope.local_name("fmt"), Some("fmt"));
    }
}
