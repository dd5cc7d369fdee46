use crate::position::PersonRef;
use serde::Serialize;

/// Display-ready person data produced by normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub name: String,
    pub image: String,
    pub thumb: String,
    pub birthday: String,
    pub tags: Vec<String>,
    pub visited: Vec<String>,
}

impl Person {
    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn has_data(&self) -> bool {
        self.has_name() || !self.image.is_empty() || !self.birthday.is_empty() || !self.tags.is_empty()
    }
}

/// Where a normalized spouse came from in the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "camelCase")]
pub enum SpouseSource {
    List(usize),
    PreviousSpouse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpouseEntry {
    pub id: String,
    pub person: Person,
    pub source: SpouseSource,
    pub position: PersonRef,
    pub parents: Option<Box<TreeNode>>,
}

/// A normalized family-tree node: one primary person, their spouses in
/// order (0 is the current spouse), an optional ancestor chain and children
/// tagged with the union they descend from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    pub position: PersonRef,
    pub primary: Person,
    pub spouses: Vec<SpouseEntry>,
    pub is_origin: bool,
    pub from_spouse_index: usize,
    pub ancestors: Option<Box<TreeNode>>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(id: impl Into<String>, position: PersonRef, primary: Person) -> Self {
        Self {
            id: id.into(),
            position,
            primary,
            spouses: Vec::new(),
            is_origin: false,
            from_spouse_index: 0,
            ancestors: None,
            children: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.primary.has_name() && self.spouses.is_empty() && self.children.is_empty()
    }

    /// Pre-order walk over the main hierarchy. Ancestor chains are not visited.
    pub fn walk(&self, visit: &mut impl FnMut(&TreeNode, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at(&self, depth: usize, visit: &mut impl FnMut(&TreeNode, usize)) {
        visit(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, visit);
        }
    }

    pub fn count_nodes(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, _| count += 1);
        count
    }

    pub fn ancestor_depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.ancestors.as_deref();
        while let Some(node) = cursor {
            depth += 1;
            cursor = node.ancestors.as_deref();
        }
        depth
    }

    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&TreeNode> {
        if self.primary.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_name(name))
    }

    pub fn named_spouses(&self) -> impl Iterator<Item = (usize, &SpouseEntry)> {
        self.spouses
            .iter()
            .enumerate()
            .filter(|(_, spouse)| spouse.person.has_name())
    }
}
