use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of a structural member (a node with a place in the generation
/// hierarchy) inside the stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MemberPath {
    Root,
    Parent { parent: usize },
    Child { parent: usize, child: usize },
    Grandchild { parent: usize, child: usize, grand: usize },
    Couple { path: Vec<usize> },
}

impl MemberPath {
    pub fn is_root(&self) -> bool {
        match self {
            Self::Root => true,
            Self::Couple { path } => path.is_empty(),
            _ => false,
        }
    }

    /// True when `other` equals this path or lies below it.
    pub fn contains(&self, other: &MemberPath) -> bool {
        match (self, other) {
            (Self::Root, Self::Root | Self::Parent { .. } | Self::Child { .. } | Self::Grandchild { .. }) => {
                true
            }
            (Self::Parent { parent: a }, Self::Parent { parent: b })
            | (Self::Parent { parent: a }, Self::Child { parent: b, .. })
            | (Self::Parent { parent: a }, Self::Grandchild { parent: b, .. }) => a == b,
            (
                Self::Child { parent: a, child: c },
                Self::Child { parent: b, child: d } | Self::Grandchild { parent: b, child: d, .. },
            ) => a == b && c == d,
            (Self::Grandchild { .. }, Self::Grandchild { .. }) => self == other,
            (Self::Couple { path: a }, Self::Couple { path: b }) => b.starts_with(a),
            _ => false,
        }
    }
}

/// Addresses any person in the stored document: structural members, their
/// spouses and the people in their `parents` chains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PersonRef {
    Member { path: MemberPath },
    /// Entry `index` of the owner's stored `spouse` list.
    Spouse { owner: Box<PersonRef>, index: usize },
    /// The legacy `prevSpouse` record of the owner.
    PreviousSpouse { owner: Box<PersonRef> },
    /// Level `depth` of the owner's `parents` chain, 0 being the owner's own parents.
    Ancestor { of: Box<PersonRef>, depth: usize },
}

impl PersonRef {
    pub fn member(path: MemberPath) -> Self {
        Self::Member { path }
    }

    pub fn root() -> Self {
        Self::Member {
            path: MemberPath::Root,
        }
    }

    pub fn spouse(owner: PersonRef, index: usize) -> Self {
        Self::Spouse {
            owner: Box::new(owner),
            index,
        }
    }

    pub fn previous_spouse(owner: PersonRef) -> Self {
        Self::PreviousSpouse {
            owner: Box::new(owner),
        }
    }

    /// The next level up. Ancestor levels stay flat under the same owner.
    pub fn ancestor(&self) -> Self {
        match self {
            Self::Ancestor { of, depth } => Self::Ancestor {
                of: of.clone(),
                depth: depth + 1,
            },
            other => Self::Ancestor {
                of: Box::new(other.clone()),
                depth: 0,
            },
        }
    }

    pub fn as_member(&self) -> Option<&MemberPath> {
        match self {
            Self::Member { path } => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Parent { parent } => write!(f, "parent[{parent}]"),
            Self::Child { parent, child } => write!(f, "child[{parent}.{child}]"),
            Self::Grandchild { parent, child, grand } => {
                write!(f, "grandchild[{parent}.{child}.{grand}]")
            }
            Self::Couple { path } => {
                let joined: Vec<String> = path.iter().map(usize::to_string).collect();
                write!(f, "couple[{}]", joined.join("."))
            }
        }
    }
}

impl fmt::Display for PersonRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member { path } => write!(f, "{path}"),
            Self::Spouse { owner, index } => write!(f, "{owner}/spouse[{index}]"),
            Self::PreviousSpouse { owner } => write!(f, "{owner}/prevSpouse"),
            Self::Ancestor { of, depth } => write!(f, "{of}/parents[{depth}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_paths_contain_descendants() {
        let parent = MemberPath::Parent { parent: 1 };
        assert!(MemberPath::Root.contains(&parent));
        assert!(parent.contains(&MemberPath::Grandchild { parent: 1, child: 0, grand: 2 }));
        assert!(!parent.contains(&MemberPath::Child { parent: 0, child: 0 }));
        assert!(!MemberPath::Child { parent: 1, child: 0 }.contains(&parent));
    }

    #[test]
    fn couple_paths_use_prefixes() {
        let node = MemberPath::Couple { path: vec![0, 2] };
        assert!(node.contains(&MemberPath::Couple { path: vec![0, 2, 1] }));
        assert!(!node.contains(&MemberPath::Couple { path: vec![0] }));
        assert!(MemberPath::Couple { path: vec![] }.is_root());
    }

    #[test]
    fn ancestor_levels_stay_flat() {
        let first = PersonRef::root().ancestor();
        let second = first.ancestor();
        assert_eq!(
            second,
            PersonRef::Ancestor {
                of: Box::new(PersonRef::root()),
                depth: 1
            }
        );
        assert_eq!(second.to_string(), "root/parents[1]");
    }

    #[test]
    fn refs_serialize_with_type_tags() {
        let spouse = PersonRef::spouse(PersonRef::member(MemberPath::Parent { parent: 0 }), 1);
        let json = serde_json::to_value(&spouse).unwrap();
        assert_eq!(json["type"], "spouse");
        assert_eq!(json["owner"]["path"]["type"], "parent");
        let back: PersonRef = serde_json::from_value(json).unwrap();
        assert_eq!(back, spouse);
    }
}
