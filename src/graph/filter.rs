//
//  filter.rs
//  typegraph
//

//! Stock edge filters for [`super::TypeGraph::iter_upward`] and
//! [`super::TypeGraph::mark_dependent`].

use std::collections::BTreeSet;

use super::types::{Edge, Segment, SegmentKind};

pub fn accept_all(_edge: &Edge) -> bool {
    true
}

/// Reject routes that leave a struct and enter another struct literal.
pub fn no_nested_struct_literals(edge: &Edge) -> bool {
    !edge
        .route
        .iter()
        .skip(1)
        .any(|segment| matches!(segment, Segment::Field { .. }))
}

/// Reject routes containing any of the listed segment kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenyKinds {
    kinds: BTreeSet<SegmentKind>,
}

impl DenyKinds {
    pub fn new(kinds: impl IntoIterator<Item = SegmentKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = SegmentKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn accept(&self, edge: &Edge) -> bool {
        !edge.route.iter().any(|s| self.kinds.contains(&s.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MapSide;
    use crate::model::{NamedRef, TypeIdentity};

    fn edge(route: Vec<Segment>) -> Edge {
        Edge {
            route,
            type_args: Vec::new(),
            parent: TypeIdentity::new("p", "A"),
            child: TypeIdentity::new("p", "B"),
            instance: NamedRef::new(TypeIdentity::new("p", "B")),
        }
    }

    #[test]
    fn test_nested_struct_literals() {
        assert!(no_nested_struct_literals(&edge(vec![Segment::field(0, "X"), Segment::Pointer])));
        assert!(!no_nested_struct_literals(&edge(vec![
            Segment::field(0, "Inner"),
            Segment::field(2, "Leaf"),
        ])));
        assert!(no_nested_struct_literals(&edge(vec![])));
    }

    #[test]
    fn test_deny_kinds() {
        let deny = DenyKinds::new([SegmentKind::Map, SegmentKind::Chan]);
        let through_map = edge(vec![
            Segment::field(0, "M"),
            Segment::Map {
                side: MapSide::Value,
            },
        ]);
        assert!(!deny.accept(&through_map));
        assert!(deny.accept(&edge(vec![Segment::field(0, "S"), Segment::Slice])));
        assert!(DenyKinds::default().accept(&through_map));
    }
}
