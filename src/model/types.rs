//
//  types.rs
//  typegraph
//

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identity of a declared named type: package path plus type name.
///
/// Ordering is package first, then name, so maps keyed by identity iterate
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeIdentity {
    pub package: String,
    pub name: String,
}

impl TypeIdentity {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.package, self.name)
        }
    }
}

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// Reference to a named type, possibly instantiated with type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: TypeIdentity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TypeExpr>,
}

impl NamedRef {
    pub fn new(id: TypeIdentity) -> Self {
        Self {
            id,
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<TypeExpr>) -> Self {
        self.args = args;
        self
    }

    pub fn is_instantiated(&self) -> bool {
        !self.args.is_empty()
    }
}

impl fmt::Display for NamedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "[{}]", args.join(", "))?;
        }
        Ok(())
    }
}

/// A resolved type expression.
///
/// Closed over the shapes the edge builder knows how to unwrap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TypeExpr {
    /// A declared named type (`Foo`, `pkg.Foo`, `Foo[int]`).
    Named(NamedRef),
    /// A type parameter in scope of a generic declaration.
    TypeParam { name: String },
    /// A predeclared type (`int`, `string`, `error`, ...).
    Basic { name: String },
    Pointer { elem: Box<TypeExpr> },
    /// `[N]T`; `len` is the source text of the length expression.
    Array {
        len: Option<String>,
        elem: Box<TypeExpr>,
    },
    Slice { elem: Box<TypeExpr> },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Struct { fields: Vec<Field> },
    Interface,
    Func,
}

impl TypeExpr {
    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        TypeExpr::Named(NamedRef::new(TypeIdentity::new(package, name)))
    }

    pub fn instance(id: TypeIdentity, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Named(NamedRef::new(id).with_args(args))
    }

    pub fn basic(name: impl Into<String>) -> Self {
        TypeExpr::Basic { name: name.into() }
    }

    pub fn param(name: impl Into<String>) -> Self {
        TypeExpr::TypeParam { name: name.into() }
    }

    pub fn pointer(elem: TypeExpr) -> Self {
        TypeExpr::Pointer {
            elem: Box::new(elem),
        }
    }

    pub fn slice(elem: TypeExpr) -> Self {
        TypeExpr::Slice {
            elem: Box::new(elem),
        }
    }

    pub fn array(len: impl Into<String>, elem: TypeExpr) -> Self {
        TypeExpr::Array {
            len: Some(len.into()),
            elem: Box::new(elem),
        }
    }

    pub fn map(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn chan(dir: ChanDir, elem: TypeExpr) -> Self {
        TypeExpr::Chan {
            dir,
            elem: Box::new(elem),
        }
    }

    /// Struct literal whose field ordinals are their positions.
    pub fn struct_of(fields: Vec<Field>) -> Self {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(i, mut f)| {
                f.ordinal = i;
                f
            })
            .collect();
        TypeExpr::Struct { fields }
    }

    pub fn as_named(&self) -> Option<&NamedRef> {
        match self {
            TypeExpr::Named(r) => Some(r),
            _ => None,
        }
    }

    /// Replace type parameters bound in `bindings`. Unbound parameters are kept.
    pub fn substitute(&self, bindings: &HashMap<String, TypeExpr>) -> TypeExpr {
        if bindings.is_empty() {
            return self.clone();
        }
        let sub = |t: &TypeExpr| Box::new(t.substitute(bindings));
        match self {
            TypeExpr::TypeParam { name } => bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeExpr::Named(r) => TypeExpr::Named(NamedRef {
                id: r.id.clone(),
                args: r.args.iter().map(|a| a.substitute(bindings)).collect(),
            }),
            TypeExpr::Pointer { elem } => TypeExpr::Pointer { elem: sub(elem) },
            TypeExpr::Array { len, elem } => TypeExpr::Array {
                len: len.clone(),
                elem: sub(elem),
            },
            TypeExpr::Slice { elem } => TypeExpr::Slice { elem: sub(elem) },
            TypeExpr::Map { key, value } => TypeExpr::Map {
                key: sub(key),
                value: sub(value),
            },
            TypeExpr::Chan { dir, elem } => TypeExpr::Chan {
                dir: *dir,
                elem: sub(elem),
            },
            TypeExpr::Struct { fields } => TypeExpr::Struct {
                fields: fields
                    .iter()
                    .map(|f| Field {
                        ty: f.ty.substitute(bindings),
                        ..f.clone()
                    })
                    .collect(),
            },
            TypeExpr::Basic { .. } | TypeExpr::Interface | TypeExpr::Func => self.clone(),
        }
    }

    /// Rewrite the package of every named reference whose package is a key
    /// of `packages` (a bare qualifier) to the mapped import path.
    pub fn requalify(&mut self, packages: &HashMap<String, String>) {
        match self {
            TypeExpr::Named(r) => {
                if let Some(path) = packages.get(&r.id.package) {
                    r.id.package = path.clone();
                }
                for arg in &mut r.args {
                    arg.requalify(packages);
                }
            }
            TypeExpr::Pointer { elem }
            | TypeExpr::Array { elem, .. }
            | TypeExpr::Slice { elem }
            | TypeExpr::Chan { elem, .. } => elem.requalify(packages),
            TypeExpr::Map { key, value } => {
                key.requalify(packages);
                value.requalify(packages);
            }
            TypeExpr::Struct { fields } => {
                for field in fields {
                    field.ty.requalify(packages);
                }
            }
            TypeExpr::TypeParam { .. }
            | TypeExpr::Basic { .. }
            | TypeExpr::Interface
            | TypeExpr::Func => {}
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(r) => write!(f, "{r}"),
            TypeExpr::TypeParam { name } | TypeExpr::Basic { name } => write!(f, "{name}"),
            TypeExpr::Pointer { elem } => write!(f, "*{elem}"),
            TypeExpr::Array { len, elem } => {
                write!(f, "[{}]{elem}", len.as_deref().unwrap_or("..."))
            }
            TypeExpr::Slice { elem } => write!(f, "[]{elem}"),
            TypeExpr::Map { key, value } => write!(f, "map[{key}]{value}"),
            TypeExpr::Chan { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {elem}"),
                ChanDir::Send => write!(f, "chan<- {elem}"),
                ChanDir::Recv => write!(f, "<-chan {elem}"),
            },
            TypeExpr::Struct { fields } => write!(f, "struct{{ {} fields }}", fields.len()),
            TypeExpr::Interface => write!(f, "interface{{...}}"),
            TypeExpr::Func => write!(f, "func(...)"),
        }
    }
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Field name; for embedded fields, the embedded type's name.
    pub name: String,
    pub embedded: bool,
    pub ty: TypeExpr,
    /// Raw struct tag without the surrounding quotes.
    pub tag: Option<String>,
    /// Comment lines directly above or trailing the field, markers stripped.
    pub doc: Vec<String>,
    /// Source ordinal (byte offset for parsed sources).
    pub ordinal: usize,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            embedded: false,
            ty,
            tag: None,
            doc: Vec::new(),
            ordinal: 0,
        }
    }

    pub fn embedded(ty: TypeExpr) -> Self {
        let name = match &ty {
            TypeExpr::Named(r) => r.id.name.clone(),
            TypeExpr::Pointer { elem } => elem
                .as_named()
                .map(|r| r.id.name.clone())
                .unwrap_or_default(),
            other => other.to_string(),
        };
        Self {
            embedded: true,
            ..Self::new(name, ty)
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_doc(mut self, line: impl Into<String>) -> Self {
        self.doc.push(line.into());
        self
    }
}
