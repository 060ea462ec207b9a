//
//  mod.rs
//  typegraph
//

//! Go front end: tree-sitter parsing into [`crate::model::SourceUnit`]s and
//! workspace loading.

pub mod cache;
pub mod extractor;
pub mod loader;

pub use cache::ParseCache;
pub use extractor::{is_go_source, parse_source};
pub use loader::{discover, load_workspace};
