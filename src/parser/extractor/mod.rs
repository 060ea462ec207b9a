//
//  mod.rs
//  typegraph
//

mod helpers;
mod types;

use std::path::Path;

use tracing::warn;
use tree_sitter::{Node, Parser};

use self::helpers::{comment_lines, is_generated_marker, node_text, unquote};
use self::types::TypeLowering;
use crate::error::{Result, TypegraphError};
use crate::model::{DeclGroup, Import, SourceUnit, TypeDecl};

/// Whether `path` is a Go source file the front end analyzes.
pub fn is_go_source(path: &Path) -> bool {
    let is_go = path.extension().is_some_and(|ext| ext == "go");
    let is_test = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("_test.go"));
    is_go && !is_test
}

/// Parse one Go file into a [`SourceUnit`] of package `package_path`.
pub fn parse_source(package_path: &str, path: &Path, source: &str) -> Result<SourceUnit> {
    if path.extension().map_or(true, |ext| ext != "go") {
        return Err(TypegraphError::UnsupportedFile(path.to_path_buf()));
    }

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| TypegraphError::ParserInit(path.to_path_buf(), e.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| TypegraphError::ParseFailed(path.to_path_buf()))?;
    let root = tree.root_node();
    if root.has_error() {
        warn!(file = %path.display(), "syntax errors in Go source; continuing");
    }

    let mut unit = SourceUnit::new(path, package_path);
    let mut lowering = TypeLowering::new(source.as_bytes(), package_path);
    let mut pending: Vec<String> = Vec::new();
    let mut pending_end: Option<usize> = None;
    let mut seen_package = false;

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let row = child.start_position().row;
        if child.kind() == "comment" {
            let text = node_text(&child, lowering.source);
            if !seen_package && is_generated_marker(text) {
                unit.generated = true;
            }
            if pending_end.is_some_and(|end| row > end + 1) {
                pending.clear();
            }
            pending.extend(comment_lines(text));
            pending_end = Some(child.end_position().row);
            continue;
        }

        let doc = if pending_end.is_some_and(|end| end + 1 >= row) {
            std::mem::take(&mut pending)
        } else {
            Vec::new()
        };
        pending.clear();
        pending_end = None;

        match child.kind() {
            "package_clause" => {
                seen_package = true;
                let mut inner = child.walk();
                let name = child
                    .named_children(&mut inner)
                    .find(|n| n.kind() == "package_identifier");
                if let Some(name) = name {
                    unit.package_name = node_text(&name, lowering.source).to_string();
                }
            }
            "import_declaration" => {
                for import in imports_of(child, lowering.source) {
                    if let Some(local) = import.local_name() {
                        lowering.imports.insert(local.to_string(), import.path.clone());
                    }
                    unit.imports.push(import);
                }
            }
            "type_declaration" => {
                let group = type_group(child, doc, &mut lowering);
                unit.groups.push(group);
            }
            _ => {}
        }
    }
    Ok(unit)
}

fn imports_of(node: Node, source: &[u8]) -> Vec<Import> {
    let mut specs = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_spec" => specs.push(child),
            "import_spec_list" => {
                let mut inner = child.walk();
                specs.extend(
                    child
                        .named_children(&mut inner)
                        .filter(|n| n.kind() == "import_spec"),
                );
            }
            _ => {}
        }
    }
    specs
        .into_iter()
        .filter_map(|spec| {
            let path = unquote(node_text(&spec.child_by_field_name("path")?, source)).to_string();
            Some(match spec.child_by_field_name("name") {
                Some(name) => Import::named(node_text(&name, source), path),
                None => Import::new(path),
            })
        })
        .collect()
}

fn type_group(node: Node, doc: Vec<String>, lowering: &mut TypeLowering<'_>) -> DeclGroup {
    let mut group = DeclGroup {
        doc,
        decls: Vec::new(),
        ordinal: node.start_byte(),
    };
    let mut pending: Vec<String> = Vec::new();
    let mut pending_end: Option<usize> = None;

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let row = child.start_position().row;
        match child.kind() {
            "comment" => {
                if pending_end.is_some_and(|end| row > end + 1) {
                    pending.clear();
                }
                pending.extend(comment_lines(node_text(&child, lowering.source)));
                pending_end = Some(child.end_position().row);
            }
            "type_spec" | "type_alias" => {
                let doc = if pending_end.is_some_and(|end| end + 1 >= row) {
                    std::mem::take(&mut pending)
                } else {
                    Vec::new()
                };
                pending.clear();
                pending_end = None;
                if let Some(decl) = type_spec(child, doc, lowering) {
                    group.decls.push(decl);
                }
            }
            _ => {}
        }
    }
    // A lone `type T U` carries the group's comment as its own doc.
    if group.decls.len() == 1 && group.decls[0].doc.is_empty() {
        group.decls[0].doc = group.doc.clone();
    }
    group
}

fn type_spec(node: Node, doc: Vec<String>, lowering: &mut TypeLowering<'_>) -> Option<TypeDecl> {
    let name = node_text(&node.child_by_field_name("name")?, lowering.source).to_string();

    let mut params = Vec::new();
    if let Some(list) = node.child_by_field_name("type_parameters") {
        let mut cursor = list.walk();
        for decl in list
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "type_parameter_declaration")
        {
            let mut inner = decl.walk();
            params.extend(
                decl.children_by_field_name("name", &mut inner)
                    .map(|n| node_text(&n, lowering.source).to_string()),
            );
        }
    }

    lowering.params = params.clone();
    let ty = node
        .child_by_field_name("type")
        .map(|t| lowering.lower(t))
        .unwrap_or(crate::model::TypeExpr::Interface);
    lowering.params.clear();

    let mut decl = if node.kind() == "type_alias" {
        TypeDecl::alias(name, ty)
    } else {
        TypeDecl::new(name, ty)
    };
    decl.type_params = params;
    decl.doc = doc;
    decl.ordinal = node.start_byte();
    decl.line = node.start_position().row + 1;
    Some(decl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChanDir, Field, TypeExpr, TypeIdentity};

    const PKG: &str = "example.com/app/store";

    fn parse(source: &str) -> SourceUnit {
        parse_source(PKG, Path::new("store/model.go"), source).unwrap()
    }

    fn decl<'u>(unit: &'u SourceUnit, name: &str) -> &'u TypeDecl {
        unit.decls().find(|d| d.name == name).unwrap()
    }

    fn fields(decl: &TypeDecl) -> &[Field] {
        match &decl.ty {
            TypeExpr::Struct { fields } => fields,
            other => panic!("expected struct, got {other}"),
        }
    }

    const SOURCE: &str = r#"// Code generated by hand; DO NOT EDIT.

package store

import (
	"time"
	ext "github.com/acme/ext/v2"
	_ "embed"
)

// User is stored.
//typegraph:synthesize
type User struct {
	ID   int64
	Name, Email string `json:"name"`
	// Owner is shared.
	Owner *Account // trailing note
	Tags  map[string][]Tag
	*Audit
	Seen  time.Time
	Feed  <-chan ext.Event
	Box   Box[*Account, ext.Item]
	Cb    func(int) error
	Any   any
	Grid  [4]Tag
}

type (
	// Account owns users.
	Account struct{}

	//typegraph:ignore
	Tag = string
)

type Box[K comparable, V any] struct {
	Key K
	Vals []V
}

type Audit struct{}
"#;

    #[test]
    fn test_package_and_imports() {
        let unit = parse(SOURCE);
        assert_eq!(unit.package_name, "store");
        assert_eq!(unit.package_path, PKG);
        assert!(unit.generated);
        assert_eq!(
            unit.imports,
            vec![
                Import::new("time"),
                Import::named("ext", "github.com/acme/ext/v2"),
                Import::named("_", "embed"),
            ]
        );
    }

    #[test]
    fn test_declarations_and_docs() {
        let unit = parse(SOURCE);
        let names: Vec<&str> = unit.decls().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Account", "Tag", "Box", "Audit"]);

        let user = decl(&unit, "User");
        assert_eq!(user.doc, vec!["User is stored.", "typegraph:synthesize"]);
        assert_eq!(user.line, 13);
        assert!(decl(&unit, "Tag").is_alias());
        assert_eq!(decl(&unit, "Tag").doc, vec!["typegraph:ignore"]);
        assert_eq!(decl(&unit, "Account").doc, vec!["Account owns users."]);
        assert_eq!(decl(&unit, "Box").type_params, vec!["K", "V"]);

        let ordinals: Vec<usize> = unit.decls().map(|d| d.ordinal).collect();
        assert!(ordinals.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_field_types() {
        let unit = parse(SOURCE);
        let user = fields(decl(&unit, "User"));
        let local = |name: &str| TypeExpr::named(PKG, name);
        let by_name = |name: &str| user.iter().find(|f| f.name == name).unwrap();

        assert_eq!(by_name("ID").ty, TypeExpr::basic("int64"));
        assert_eq!(by_name("Name").tag.as_deref(), Some(r#"json:"name""#));
        assert_eq!(by_name("Email").ty, TypeExpr::basic("string"));
        assert_eq!(by_name("Owner").ty, TypeExpr::pointer(local("Account")));
        assert_eq!(by_name("Owner").doc, vec!["Owner is shared.", "trailing note"]);
        assert_eq!(
            by_name("Tags").ty,
            TypeExpr::map(TypeExpr::basic("string"), TypeExpr::slice(local("Tag")))
        );

        let audit = by_name("Audit");
        assert!(audit.embedded);
        assert_eq!(audit.ty, TypeExpr::pointer(local("Audit")));

        assert_eq!(by_name("Seen").ty, TypeExpr::named("time", "Time"));
        assert_eq!(
            by_name("Feed").ty,
            TypeExpr::chan(
                ChanDir::Recv,
                TypeExpr::named("github.com/acme/ext/v2", "Event")
            )
        );
        assert_eq!(
            by_name("Box").ty,
            TypeExpr::instance(
                TypeIdentity::new(PKG, "Box"),
                vec![
                    TypeExpr::pointer(local("Account")),
                    TypeExpr::named("github.com/acme/ext/v2", "Item"),
                ]
            )
        );
        assert_eq!(by_name("Cb").ty, TypeExpr::Func);
        assert_eq!(by_name("Any").ty, TypeExpr::Interface);
        assert_eq!(by_name("Grid").ty, TypeExpr::array("4", local("Tag")));
        assert_eq!(user.len(), 12);
    }

    #[test]
    fn test_type_parameters_lower_to_params() {
        let unit = parse(SOURCE);
        let box_fields = fields(decl(&unit, "Box"));
        assert_eq!(box_fields[0].ty, TypeExpr::param("K"));
        assert_eq!(box_fields[1].ty, TypeExpr::slice(TypeExpr::param("V")));
    }

    #[test]
    fn test_send_channel_and_plain_file() {
        let unit = parse("package store\n\ntype Q struct { In chan<- int; Both chan int }\n");
        assert!(!unit.generated);
        let q = fields(decl(&unit, "Q"));
        assert_eq!(q[0].ty, TypeExpr::chan(ChanDir::Send, TypeExpr::basic("int")));
        assert_eq!(q[1].ty, TypeExpr::chan(ChanDir::Both, TypeExpr::basic("int")));
    }

    #[test]
    fn test_rejects_non_go_files() {
        let err = parse_source(PKG, Path::new("model.rs"), "fn main() {}").unwrap_err();
        assert!(matches!(err, TypegraphError::UnsupportedFile(_)));
    }

    #[test]
    fn test_is_go_source() {
        assert!(is_go_source(Path::new("a/b.go")));
        assert!(!is_go_source(Path::new("a/b_test.go")));
        assert!(!is_go_source(Path::new("a/b.rs")));
    }
}
