//
//  types.rs
//  typegraph
//

//! Lowering of tree-sitter-go type nodes into [`TypeExpr`].

use std::collections::HashMap;
use tree_sitter::Node;

use super::helpers::{comment_lines, node_text, unquote};
use crate::model::{ChanDir, Field, NamedRef, TypeExpr, TypeIdentity};

/// Predeclared Go types that lower to [`TypeExpr::Basic`].
const BUILTIN_TYPES: &[&str] = &[
    "bool", "byte", "complex64", "complex128", "error", "float32", "float64", "int", "int8",
    "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16", "uint32", "uint64",
    "uintptr",
];

/// Name resolution context of one file.
pub struct TypeLowering<'s> {
    pub source: &'s [u8],
    pub package_path: &'s str,
    /// local package name -> import path
    pub imports: HashMap<String, String>,
    /// Type parameters of the declaration being lowered.
    pub params: Vec<String>,
}

impl<'s> TypeLowering<'s> {
    pub fn new(source: &'s [u8], package_path: &'s str) -> Self {
        Self {
            source,
            package_path,
            imports: HashMap::new(),
            params: Vec::new(),
        }
    }

    fn text(&self, node: &Node) -> &'s str {
        node_text(node, self.source)
    }

    pub fn lower(&self, node: Node) -> TypeExpr {
        match node.kind() {
            "type_identifier" | "identifier" => self.identifier(self.text(&node)),
            "qualified_type" => self.qualified(node),
            "generic_type" => self.generic(node),
            "pointer_type" => TypeExpr::pointer(self.first_named(node)),
            "slice_type" => TypeExpr::slice(self.field(node, "element")),
            "array_type" => TypeExpr::Array {
                len: node
                    .child_by_field_name("length")
                    .map(|n| self.text(&n).to_string()),
                elem: Box::new(self.field(node, "element")),
            },
            "implicit_length_array_type" => TypeExpr::Array {
                len: None,
                elem: Box::new(self.field(node, "element")),
            },
            "map_type" => TypeExpr::map(self.field(node, "key"), self.field(node, "value")),
            "channel_type" => TypeExpr::chan(self.chan_dir(node), self.field(node, "value")),
            "struct_type" => self.struct_type(node),
            "parenthesized_type" | "type_elem" | "type_constraint" => {
                let mut cursor = node.walk();
                let types: Vec<Node> = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .collect();
                match types.as_slice() {
                    [single] => self.lower(*single),
                    // Unions and approximations only occur in constraints.
                    _ => TypeExpr::Interface,
                }
            }
            "function_type" => TypeExpr::Func,
            _ => TypeExpr::Interface,
        }
    }

    fn field(&self, node: Node, name: &str) -> TypeExpr {
        node.child_by_field_name(name)
            .map(|n| self.lower(n))
            .unwrap_or(TypeExpr::Interface)
    }

    fn first_named(&self, node: Node) -> TypeExpr {
        let mut cursor = node.walk();
        let first = node
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment");
        first.map(|n| self.lower(n)).unwrap_or(TypeExpr::Interface)
    }

    fn identifier(&self, name: &str) -> TypeExpr {
        if self.params.iter().any(|p| p == name) {
            return TypeExpr::param(name);
        }
        match name {
            "any" | "comparable" => TypeExpr::Interface,
            _ if BUILTIN_TYPES.contains(&name) => TypeExpr::basic(name),
            _ => TypeExpr::named(self.package_path, name),
        }
    }

    fn qualified_identity(&self, node: Node) -> Option<TypeIdentity> {
        let package = self.text(&node.child_by_field_name("package")?);
        let name = self.text(&node.child_by_field_name("name")?);
        let path = self
            .imports
            .get(package)
            .map(String::as_str)
            .unwrap_or(package);
        Some(TypeIdentity::new(path, name))
    }

    fn qualified(&self, node: Node) -> TypeExpr {
        self.qualified_identity(node)
            .map(|id| TypeExpr::Named(NamedRef::new(id)))
            .unwrap_or(TypeExpr::Interface)
    }

    fn generic(&self, node: Node) -> TypeExpr {
        let base = match node.child_by_field_name("type") {
            Some(t) if t.kind() == "qualified_type" => self.qualified_identity(t),
            Some(t) => Some(TypeIdentity::new(self.package_path, self.text(&t))),
            None => None,
        };
        let Some(id) = base else {
            return TypeExpr::Interface;
        };
        let mut args = Vec::new();
        if let Some(list) = node.child_by_field_name("type_arguments") {
            let mut cursor = list.walk();
            for arg in list.named_children(&mut cursor) {
                if arg.kind() != "comment" {
                    args.push(self.lower(arg));
                }
            }
        }
        TypeExpr::instance(id, args)
    }

    fn chan_dir(&self, node: Node) -> ChanDir {
        let text = self.text(&node);
        if text.starts_with("<-") {
            ChanDir::Recv
        } else if text.starts_with("chan") && text["chan".len()..].trim_start().starts_with("<-")
        {
            ChanDir::Send
        } else {
            ChanDir::Both
        }
    }

    fn struct_type(&self, node: Node) -> TypeExpr {
        let mut cursor = node.walk();
        let Some(list) = node
            .named_children(&mut cursor)
            .find(|n| n.kind() == "field_declaration_list")
        else {
            return TypeExpr::Struct { fields: Vec::new() };
        };

        let mut fields: Vec<Field> = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        let mut pending_end: Option<usize> = None;
        let mut last_field_row: Option<usize> = None;
        let mut last_field_count = 0;

        let mut cursor = list.walk();
        for child in list.named_children(&mut cursor) {
            let row = child.start_position().row;
            match child.kind() {
                "comment" => {
                    let lines = comment_lines(self.text(&child));
                    if last_field_row == Some(row) {
                        // Trailing comment of the previous declaration line.
                        let start = fields.len() - last_field_count;
                        for field in &mut fields[start..] {
                            field.doc.extend(lines.iter().cloned());
                        }
                        continue;
                    }
                    if pending_end.is_some_and(|end| row > end + 1) {
                        pending.clear();
                    }
                    pending.extend(lines);
                    pending_end = Some(child.end_position().row);
                }
                "field_declaration" => {
                    let doc = if pending_end.is_some_and(|end| end + 1 >= row) {
                        std::mem::take(&mut pending)
                    } else {
                        Vec::new()
                    };
                    pending.clear();
                    pending_end = None;
                    let declared = self.field_declaration(child, doc);
                    last_field_count = declared.len();
                    last_field_row = Some(child.end_position().row);
                    fields.extend(declared);
                }
                _ => {}
            }
        }
        TypeExpr::Struct { fields }
    }

    fn field_declaration(&self, node: Node, doc: Vec<String>) -> Vec<Field> {
        let tag = node
            .child_by_field_name("tag")
            .map(|t| unquote(self.text(&t)).to_string());
        let ty_node = node.child_by_field_name("type");
        let mut ty = ty_node.map(|t| self.lower(t)).unwrap_or(TypeExpr::Interface);

        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        let with_meta = |mut field: Field, ordinal: usize| {
            field.tag = tag.clone();
            field.doc = doc.clone();
            field.ordinal = ordinal;
            field
        };

        if names.is_empty() {
            let mut cursor = node.walk();
            let is_pointer = node.children(&mut cursor).any(|c| c.kind() == "*");
            if is_pointer {
                ty = TypeExpr::pointer(ty);
            }
            return vec![with_meta(Field::embedded(ty), node.start_byte())];
        }
        names
            .iter()
            .map(|name| {
                with_meta(
                    Field::new(self.text(name), ty.clone()),
                    name.start_byte(),
                )
            })
            .collect()
    }
}
