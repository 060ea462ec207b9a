//! Handling directives: `//typegraph:<policy>` comments and `typegraph:"..."`
//! struct tags.
//!
//! Directives are parsed once into [`NodeDirectives`], the private data the
//! default delegate attaches to every registered node.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::graph::{Edge, TypeGraph};
use crate::model::{Field, TypeDecl, TypeExpr, TypeIdentity};

/// Comment prefix of a handling directive.
pub const DIRECTIVE_PREFIX: &str = "typegraph:";
/// Struct tag key of a handling directive.
pub const TAG_KEY: &str = "typegraph";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("unknown handling policy {0:?}")]
    UnknownPolicy(String),

    #[error("conflicting policies for {target}: {first} and {second}")]
    Conflicting {
        target: String,
        first: HandlePolicy,
        second: HandlePolicy,
    },
}

/// How generated code treats a type or a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlePolicy {
    /// Leave the value out entirely.
    Ignore,
    /// Refuse to generate code reaching it.
    Disallow,
    /// Copy the pointer instead of the pointee.
    CopyPointer,
    /// Build a fresh value instead of copying.
    Synthesize,
}

impl HandlePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            HandlePolicy::Ignore => "ignore",
            HandlePolicy::Disallow => "disallow",
            HandlePolicy::CopyPointer => "copy-pointer",
            HandlePolicy::Synthesize => "synthesize",
        }
    }

    /// Edges through this policy are cut from traversal.
    pub fn blocks(self) -> bool {
        matches!(self, HandlePolicy::Ignore | HandlePolicy::Disallow)
    }
}

impl fmt::Display for HandlePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlePolicy {
    type Err = DirectiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ignore" | "-" => Ok(HandlePolicy::Ignore),
            "disallow" => Ok(HandlePolicy::Disallow),
            "copy-pointer" | "copy_pointer" => Ok(HandlePolicy::CopyPointer),
            "synthesize" | "make" => Ok(HandlePolicy::Synthesize),
            other => Err(DirectiveError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Directives of one declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct NodeDirectives {
    /// Policy of the type itself.
    pub policy: Option<HandlePolicy>,
    /// Policies of struct fields, by field index.
    pub fields: BTreeMap<usize, HandlePolicy>,
}

impl NodeDirectives {
    pub fn is_empty(&self) -> bool {
        self.policy.is_none() && self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<HandlePolicy> {
        self.fields.get(&index).copied()
    }
}

/// Policy named by a comment block, if any.
pub fn comment_policy(doc: &[String]) -> Result<Option<HandlePolicy>, DirectiveError> {
    let mut found: Option<HandlePolicy> = None;
    for line in doc {
        let Some(word) = line.split_whitespace().next() else {
            continue;
        };
        let Some(value) = word.strip_prefix(DIRECTIVE_PREFIX) else {
            continue;
        };
        let policy: HandlePolicy = value.parse()?;
        found = merge("comment", found, policy)?;
    }
    Ok(found)
}

/// Value of `key` in a Go struct tag (`json:"a" typegraph:"ignore"`).
pub fn tag_lookup<'t>(tag: &'t str, key: &str) -> Option<&'t str> {
    let mut rest = tag;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let colon = rest.find(':')?;
        let name = &rest[..colon];
        if name.is_empty() || name.contains(char::is_whitespace) || name.contains('"') {
            return None;
        }
        let after = rest[colon + 1..].strip_prefix('"')?;
        let mut end = None;
        let mut escaped = false;
        for (i, c) in after.char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    end = Some(i);
                    break;
                }
                _ => escaped = false,
            }
        }
        let end = end?;
        if name == key {
            return Some(&after[..end]);
        }
        rest = &after[end + 1..];
    }
}

fn field_policy(field: &Field) -> Result<Option<HandlePolicy>, DirectiveError> {
    let from_doc = comment_policy(&field.doc)?;
    let from_tag = match field.tag.as_deref().and_then(|t| tag_lookup(t, TAG_KEY)) {
        Some(value) => {
            let first = value.split(',').next().unwrap_or(value);
            Some(first.parse::<HandlePolicy>()?)
        }
        None => None,
    };
    match (from_doc, from_tag) {
        (Some(doc), Some(tag)) => merge(&field.name, Some(doc), tag),
        (doc, tag) => Ok(doc.or(tag)),
    }
}

fn merge(
    target: &str,
    current: Option<HandlePolicy>,
    next: HandlePolicy,
) -> Result<Option<HandlePolicy>, DirectiveError> {
    match current {
        Some(first) if first != next => Err(DirectiveError::Conflicting {
            target: target.to_string(),
            first,
            second: next,
        }),
        _ => Ok(Some(next)),
    }
}

/// Read the directives of a declaration and of its struct fields.
pub fn parse_node_directives(decl: &TypeDecl) -> Result<NodeDirectives, DirectiveError> {
    let mut directives = NodeDirectives {
        policy: comment_policy(&decl.doc)?,
        fields: BTreeMap::new(),
    };
    if let TypeExpr::Struct { fields } = &decl.ty {
        for (index, field) in fields.iter().enumerate() {
            if let Some(policy) = field_policy(field)? {
                directives.fields.insert(index, policy);
            }
        }
    }
    Ok(directives)
}

/// Policy governing an edge, as seen from its parent's directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectivePolicy {
    pub policy: HandlePolicy,
    /// The field holds the child itself, or a pointer to it.
    pub direct: bool,
}

/// Field policy of the field `edge` leaves through.
///
/// A trailing pointer does not count as a hop: `X *B` is as direct as `X B`.
pub fn effective_policy(edge: &Edge, directives: &NodeDirectives) -> Option<EffectivePolicy> {
    let policy = directives.field(edge.field_index()?)?;
    Some(EffectivePolicy {
        policy,
        direct: edge.policy_route().len() == 1,
    })
}

/// Owned edge filter cutting edges that leave through blocking fields or
/// enter ignored types.
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    blocked_fields: HashMap<TypeIdentity, HashSet<usize>>,
    ignored_types: HashSet<TypeIdentity>,
}

impl PolicyFilter {
    pub fn from_graph(graph: &TypeGraph<NodeDirectives>) -> Self {
        let mut filter = Self::default();
        for node in graph.nodes() {
            let Some(directives) = node.private() else {
                continue;
            };
            if directives.policy == Some(HandlePolicy::Ignore) {
                filter.ignored_types.insert(node.identity.clone());
            }
            let blocked: HashSet<usize> = directives
                .fields
                .iter()
                .filter(|(_, policy)| policy.blocks())
                .map(|(&index, _)| index)
                .collect();
            if !blocked.is_empty() {
                filter.blocked_fields.insert(node.identity.clone(), blocked);
            }
        }
        filter
    }

    pub fn accept(&self, edge: &Edge) -> bool {
        if self.ignored_types.contains(&edge.child) {
            return false;
        }
        match (edge.field_index(), self.blocked_fields.get(&edge.parent)) {
            (Some(index), Some(blocked)) => !blocked.contains(&index),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{match_fn, Candidate, GraphDelegate, Segment};
    use crate::error::BoxError;
    use crate::model::{NamedRef, SourceUnit, Workspace};

    #[test]
    fn test_policy_parse() {
        assert_eq!("ignore".parse::<HandlePolicy>(), Ok(HandlePolicy::Ignore));
        assert_eq!("-".parse::<HandlePolicy>(), Ok(HandlePolicy::Ignore));
        assert_eq!("copy_pointer".parse::<HandlePolicy>(), Ok(HandlePolicy::CopyPointer));
        assert_eq!("make".parse::<HandlePolicy>(), Ok(HandlePolicy::Synthesize));
        assert_eq!(
            "clone".parse::<HandlePolicy>(),
            Err(DirectiveError::UnknownPolicy("clone".to_string()))
        );
    }

    #[test]
    fn test_tag_lookup() {
        let tag = r#"json:"name,omitempty" typegraph:"disallow" db:"a\"b""#;
        assert_eq!(tag_lookup(tag, "typegraph"), Some("disallow"));
        assert_eq!(tag_lookup(tag, "json"), Some("name,omitempty"));
        assert_eq!(tag_lookup(tag, "db"), Some(r#"a\"b"#));
        assert_eq!(tag_lookup(tag, "yaml"), None);
        assert_eq!(tag_lookup("broken", "json"), None);
    }

    fn decl() -> TypeDecl {
        TypeDecl::new(
            "Session",
            TypeExpr::struct_of(vec![
                Field::new("ID", TypeExpr::basic("string")),
                Field::new("Conn", TypeExpr::pointer(TypeExpr::named("net", "Conn")))
                    .with_doc("typegraph:copy-pointer"),
                Field::new("Cache", TypeExpr::named("p", "Cache")).with_tag(r#"typegraph:"-""#),
            ]),
        )
        .with_doc("Session is a live connection.")
        .with_doc("typegraph:synthesize")
    }

    #[test]
    fn test_parse_node_directives() {
        let directives = parse_node_directives(&decl()).unwrap();
        assert_eq!(directives.policy, Some(HandlePolicy::Synthesize));
        assert_eq!(directives.field(0), None);
        assert_eq!(directives.field(1), Some(HandlePolicy::CopyPointer));
        assert_eq!(directives.field(2), Some(HandlePolicy::Ignore));
    }

    #[test]
    fn test_conflicting_field_directives() {
        let decl = TypeDecl::new(
            "T",
            TypeExpr::struct_of(vec![Field::new("F", TypeExpr::basic("int"))
                .with_doc("typegraph:ignore")
                .with_tag(r#"typegraph:"synthesize""#)]),
        );
        assert!(matches!(
            parse_node_directives(&decl),
            Err(DirectiveError::Conflicting { .. })
        ));
    }

    #[test]
    fn test_effective_policy_strips_trailing_pointer() {
        let directives = parse_node_directives(&decl()).unwrap();
        let mut edge = Edge {
            route: vec![Segment::field(1, "Conn"), Segment::Pointer],
            type_args: Vec::new(),
            parent: TypeIdentity::new("p", "Session"),
            child: TypeIdentity::new("net", "Conn"),
            instance: NamedRef::new(TypeIdentity::new("net", "Conn")),
        };
        let effective = effective_policy(&edge, &directives).unwrap();
        assert_eq!(effective.policy, HandlePolicy::CopyPointer);
        assert!(effective.direct);

        edge.route = vec![Segment::field(1, "Conn"), Segment::Slice, Segment::Pointer];
        assert!(!effective_policy(&edge, &directives).unwrap().direct);

        edge.route = vec![Segment::field(0, "ID")];
        assert_eq!(effective_policy(&edge, &directives), None);
    }

    struct Directives;

    impl GraphDelegate for Directives {
        type Private = NodeDirectives;

        fn is_match(&mut self, candidate: &Candidate<'_>) -> Result<bool, BoxError> {
            Ok(candidate.identity.name == "Leaf")
        }

        fn parse_private(
            &mut self,
            _unit: &SourceUnit,
            decl: &TypeDecl,
        ) -> Result<Option<NodeDirectives>, BoxError> {
            Ok(Some(parse_node_directives(decl)?))
        }
    }

    #[test]
    fn test_policy_filter_cuts_blocked_fields() {
        let leaf = TypeExpr::named("p", "Leaf");
        let unit = SourceUnit::new("a.go", "p")
            .with_decl(TypeDecl::new("Leaf", TypeExpr::struct_of(vec![])))
            .with_decl(TypeDecl::new(
                "Open",
                TypeExpr::struct_of(vec![Field::new("L", leaf.clone())]),
            ))
            .with_decl(TypeDecl::new(
                "Closed",
                TypeExpr::struct_of(vec![Field::new("L", TypeExpr::pointer(leaf.clone()))
                    .with_tag(r#"typegraph:"disallow""#)]),
            ));
        let ws = Workspace::new(vec![unit]);
        let mut graph = TypeGraph::build(&ws, &mut Directives).unwrap();

        let filter = PolicyFilter::from_graph(&graph);
        assert_eq!(graph.mark_dependent(|e: &Edge| filter.accept(e)), 1);
        assert!(graph.node(&TypeIdentity::new("p", "Open")).unwrap().is_dependent());
        assert!(!graph.node(&TypeIdentity::new("p", "Closed")).unwrap().is_dependent());

        // Without private data nothing is blocked.
        let plain = TypeGraph::build(&ws, &mut match_fn(|_| Ok(false))).unwrap();
        assert!(plain.edges().all(|e| PolicyFilter::default().accept(e)));
    }
}
