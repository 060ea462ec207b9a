//! Source model consumed by the graph engine.
//!
//! A [`Workspace`] is the type-checked input of one generation run: a set of
//! [`SourceUnit`]s (one per Go file) whose type expressions are already
//! resolved to [`TypeIdentity`] values. The Go front end in
//! [`crate::parser`] produces it from source; tests build it by hand.

pub mod types;
pub mod unit;
pub mod workspace;

pub use types::{ChanDir, Field, NamedRef, TypeExpr, TypeIdentity};
pub use unit::{
    default_package_name, has_directive, DeclGroup, DeclKind, Import, SourceUnit, TypeDecl,
    UnitId,
};
pub use workspace::Workspace;
