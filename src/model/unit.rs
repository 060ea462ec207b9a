//
//  unit.rs
//  typegraph
//

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::types::{TypeExpr, TypeIdentity};

/// Index of a source unit inside its [`super::Workspace`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UnitId(pub usize);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// One import line of a source unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Explicit local name (`foo "a/b"`), `.` or `_`.
    pub name: Option<String>,
    pub path: String,
}

impl Import {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            name: None,
            path: path.into(),
        }
    }

    pub fn named(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            path: path.into(),
        }
    }

    /// Name this import binds in the file, or `None` for dot and blank imports.
    pub fn local_name(&self) -> Option<&str> {
        match self.name.as_deref() {
            Some(".") | Some("_") => None,
            Some(name) => Some(name),
            None => Some(default_package_name(&self.path)),
        }
    }
}

/// Package name Go assumes for an import path without an explicit name.
///
/// Major-version suffixes (`/v2`) and `gopkg.in` version tails (`yaml.v3`)
/// are skipped.
pub fn default_package_name(path: &str) -> &str {
    let mut parts = path.rsplit('/');
    let last = parts.next().unwrap_or(path);
    let is_major = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    let name = if is_major {
        parts.next().unwrap_or(last)
    } else {
        last
    };
    match name.split_once(".v") {
        Some((base, version)) if version.chars().all(|c| c.is_ascii_digit()) => base,
        _ => name,
    }
}

/// Whether a comment block carries `directive` (e.g. `typegraph:ignore`).
pub fn has_directive(doc: &[String], directive: &str) -> bool {
    doc.iter()
        .any(|line| line.split_whitespace().next() == Some(directive))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    /// `type T U`: a new named type.
    Defined,
    /// `type T = U`: another name for `U`, not a named type of its own.
    Alias,
}

/// One type declaration (`type_spec` or `type_alias` in Go terms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub kind: DeclKind,
    pub type_params: Vec<String>,
    pub ty: TypeExpr,
    pub doc: Vec<String>,
    /// Stable in-unit ordinal (byte offset for parsed sources).
    pub ordinal: usize,
    /// 1-based line; 0 when built programmatically.
    pub line: usize,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            kind: DeclKind::Defined,
            type_params: Vec::new(),
            ty,
            doc: Vec::new(),
            ordinal: 0,
            line: 0,
        }
    }

    pub fn alias(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            kind: DeclKind::Alias,
            ..Self::new(name, ty)
        }
    }

    pub fn with_params<S: Into<String>>(mut self, params: impl IntoIterator<Item = S>) -> Self {
        self.type_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_doc(mut self, line: impl Into<String>) -> Self {
        self.doc.push(line.into());
        self
    }

    pub fn at(mut self, ordinal: usize) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn is_alias(&self) -> bool {
        self.kind == DeclKind::Alias
    }

    /// Right-hand side with type parameters bound to `args`.
    pub fn instantiate(&self, args: &[TypeExpr]) -> TypeExpr {
        let bindings: HashMap<String, TypeExpr> = self
            .type_params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();
        self.ty.substitute(&bindings)
    }
}

/// A `type ( ... )` group, or a single `type` declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclGroup {
    pub doc: Vec<String>,
    pub decls: Vec<TypeDecl>,
    pub ordinal: usize,
}

impl DeclGroup {
    pub fn new(decls: Vec<TypeDecl>) -> Self {
        Self {
            decls,
            ..Self::default()
        }
    }

    pub fn with_doc(mut self, line: impl Into<String>) -> Self {
        self.doc.push(line.into());
        self
    }
}

/// One parsed Go file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Assigned by [`super::Workspace::new`].
    pub id: UnitId,
    pub path: PathBuf,
    pub package_path: String,
    pub package_name: String,
    pub imports: Vec<Import>,
    pub groups: Vec<DeclGroup>,
    /// Header says `Code generated ... DO NOT EDIT.`
    pub generated: bool,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, package_path: impl Into<String>) -> Self {
        let package_path = package_path.into();
        let package_name = default_package_name(&package_path).to_string();
        Self {
            id: UnitId::default(),
            path: path.into(),
            package_path,
            package_name,
            imports: Vec::new(),
            groups: Vec::new(),
            generated: false,
        }
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    /// Append a group; declarations without an ordinal get the next free one.
    pub fn with_group(mut self, mut group: DeclGroup) -> Self {
        let mut next = self.decls().map(|d| d.ordinal).max().unwrap_or(0);
        for decl in &mut group.decls {
            if decl.ordinal == 0 {
                next += 1;
                decl.ordinal = next;
            }
        }
        if group.ordinal == 0 {
            group.ordinal = group.decls.first().map(|d| d.ordinal).unwrap_or(next);
        }
        self.groups.push(group);
        self
    }

    /// Append a single-declaration group.
    pub fn with_decl(self, decl: TypeDecl) -> Self {
        self.with_group(DeclGroup::new(vec![decl]))
    }

    pub fn decls(&self) -> impl Iterator<Item = &TypeDecl> {
        self.groups.iter().flat_map(|g| g.decls.iter())
    }

    pub fn identity_of(&self, decl: &TypeDecl) -> TypeIdentity {
        TypeIdentity::new(self.package_path.clone(), decl.name.clone())
    }

    pub fn file_name(&self) -> &Path {
        self.path
            .file_name()
            .map(Path::new)
            .unwrap_or(self.path.as_path())
    }
}
