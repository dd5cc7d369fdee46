use crate::model::{Person, SpouseEntry, SpouseSource, TreeNode};
use crate::position::{MemberPath, PersonRef};
use crate::schema::{LegacyRoot, RawPerson, SpouseField, SpouseItem, TreeDocument};
use serde_json::Value;
use tracing::debug;

/// Builds the uniform tree for either stored schema. Returns `None` when the
/// document holds no people at all.
pub fn normalize(doc: &TreeDocument) -> Option<TreeNode> {
    let root = match doc {
        TreeDocument::Legacy(legacy) => normalize_legacy(legacy),
        TreeDocument::Couple(root) => normalize_couple(root, Vec::new()),
        TreeDocument::Empty(_) => None,
    };
    debug!(
        nodes = root.as_ref().map_or(0, TreeNode::count_nodes),
        "normalized tree document"
    );
    root
}

fn normalize_legacy(legacy: &LegacyRoot) -> Option<TreeNode> {
    let mut root = member_node("root".to_string(), MemberPath::Root, &legacy.root);
    root.children = legacy
        .parent_list()
        .iter()
        .enumerate()
        .filter_map(|(p, raw)| {
            let mut node = member_node(format!("p-{p}"), MemberPath::Parent { parent: p }, raw);
            node.children = legacy_kids(raw)
                .iter()
                .enumerate()
                .filter_map(|(c, kid)| {
                    let path = MemberPath::Child { parent: p, child: c };
                    let mut child = member_node(format!("c-{p}-{c}"), path, kid);
                    child.children = kid
                        .grandchildren
                        .as_deref()
                        .unwrap_or_default()
                        .iter()
                        .enumerate()
                        .filter_map(|(g, grand)| {
                            let path = MemberPath::Grandchild { parent: p, child: c, grand: g };
                            finish(member_node(format!("g-{p}-{c}-{g}"), path, grand))
                        })
                        .collect();
                    finish(child)
                })
                .collect();
            finish(node)
        })
        .collect();
    finish(root)
}

/// A legacy `Parent` entry lists its children under `children`, or under
/// `grandchildren` in older documents.
pub(crate) fn legacy_kids(raw: &RawPerson) -> &[RawPerson] {
    match (&raw.children, &raw.grandchildren) {
        (Some(children), _) => children.as_slice(),
        (None, Some(grandchildren)) => grandchildren.as_slice(),
        (None, None) => &[],
    }
}

fn normalize_couple(raw: &RawPerson, path: Vec<usize>) -> Option<TreeNode> {
    let id = if path.is_empty() {
        "n-root".to_string()
    } else {
        let joined: Vec<String> = path.iter().map(usize::to_string).collect();
        format!("n-{}", joined.join("-"))
    };
    let mut node = member_node(id, MemberPath::Couple { path: path.clone() }, raw);
    node.children = raw
        .children
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(index, child)| {
            let mut child_path = path.clone();
            child_path.push(index);
            normalize_couple(child, child_path)
        })
        .collect();
    finish(node)
}

fn member_node(id: String, path: MemberPath, raw: &RawPerson) -> TreeNode {
    let position = PersonRef::member(path);
    let mut node = TreeNode::new(id, position, person_from(raw));
    node.spouses = spouse_entries(&node.id, &node.position, &raw.spouse, raw.prev_spouse.as_ref());
    node.is_origin = raw.is_origin.unwrap_or(false);
    // Stored index for now; `finish` on the parent maps it onto the
    // normalized spouse list.
    node.from_spouse_index = raw.stored_spouse_index();
    node.ancestors = ancestor_chain(raw.parents.as_deref(), &node.id, node.position.ancestor(), 0);
    node
}

/// Resolves children's union tags against this node's spouses, orders them
/// by union and prunes the node when it carries nothing.
fn finish(mut node: TreeNode) -> Option<TreeNode> {
    for child in &mut node.children {
        child.from_spouse_index = resolve_union_index(child.from_spouse_index, &node.spouses);
    }
    node.children
        .sort_by(|a, b| b.from_spouse_index.cmp(&a.from_spouse_index));
    if node.is_empty() {
        debug!(id = %node.id, "pruned empty node");
        return None;
    }
    Some(node)
}

/// Maps a stored `fromSpouseIndex` onto the normalized spouse list. A stored
/// index of 1 also selects a folded-in `prevSpouse`. Anything unresolved is 0.
pub fn resolve_union_index(stored: usize, spouses: &[SpouseEntry]) -> usize {
    if let Some(index) = spouses
        .iter()
        .position(|spouse| spouse.source == SpouseSource::List(stored))
    {
        return index;
    }
    if stored == 1
        && let Some(index) = spouses
            .iter()
            .position(|spouse| spouse.source == SpouseSource::PreviousSpouse)
    {
        return index;
    }
    0
}

fn spouse_entries(
    owner_id: &str,
    owner: &PersonRef,
    field: &SpouseField,
    prev_spouse: Option<&SpouseItem>,
) -> Vec<SpouseEntry> {
    let mut entries = Vec::new();
    for (index, item) in field.items().iter().enumerate() {
        let id = format!("{owner_id}-spouse-{index}");
        let position = PersonRef::spouse(owner.clone(), index);
        if let Some(entry) = spouse_entry(id, position, SpouseSource::List(index), item) {
            entries.push(entry);
        }
    }
    if entries.len() < 2
        && let Some(item) = prev_spouse
    {
        let id = format!("{owner_id}-prev-spouse");
        let position = PersonRef::previous_spouse(owner.clone());
        if let Some(entry) = spouse_entry(id, position, SpouseSource::PreviousSpouse, item) {
            entries.push(entry);
        }
    }
    entries
}

fn spouse_entry(
    id: String,
    position: PersonRef,
    source: SpouseSource,
    item: &SpouseItem,
) -> Option<SpouseEntry> {
    match item {
        SpouseItem::Name(name) => {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(SpouseEntry {
                id,
                person: Person {
                    name: name.to_string(),
                    ..Person::default()
                },
                source,
                position,
                parents: None,
            })
        }
        SpouseItem::Record(record) => {
            let person = person_from(record);
            if !person.has_data() && record.parents.is_none() {
                return None;
            }
            let parents = ancestor_chain(record.parents.as_deref(), &id, position.ancestor(), 0);
            Some(SpouseEntry {
                id,
                person,
                source,
                position,
                parents,
            })
        }
        SpouseItem::Opaque(_) => None,
    }
}

/// Builds one `parents` level and everything above it. An ancestor record
/// with several spouses but no `parents` of its own has spouses past the
/// first folded into a synthetic single-parent chain, one level per spouse.
fn ancestor_chain(
    raw: Option<&RawPerson>,
    base_id: &str,
    position: PersonRef,
    depth: usize,
) -> Option<Box<TreeNode>> {
    let raw = raw?;
    let id = format!("{base_id}-parents-{depth}");
    let mut node = TreeNode::new(id, position, person_from(raw));
    let mut spouses = spouse_entries(&node.id, &node.position, &raw.spouse, raw.prev_spouse.as_ref());

    let higher = if raw.parents.is_some() {
        ancestor_chain(raw.parents.as_deref(), base_id, node.position.ancestor(), depth + 1)
    } else if spouses.len() > 1 {
        let overflow: Vec<SpouseEntry> = spouses
            .split_off(1)
            .into_iter()
            .filter(|entry| entry.person.has_name())
            .collect();
        debug!(id = %node.id, folded = overflow.len(), "folded overflow ancestor spouses");
        fold_overflow(overflow, base_id, depth + 1)
    } else {
        None
    };

    node.spouses = spouses;
    node.ancestors = higher;
    if !node.primary.has_name() && node.spouses.is_empty() && node.ancestors.is_none() {
        return None;
    }
    Some(Box::new(node))
}

fn fold_overflow(overflow: Vec<SpouseEntry>, base_id: &str, first_depth: usize) -> Option<Box<TreeNode>> {
    let mut higher: Option<Box<TreeNode>> = None;
    for (offset, entry) in overflow.into_iter().enumerate().rev() {
        let mut level = TreeNode::new(
            format!("{base_id}-parents-{}", first_depth + offset),
            entry.position,
            entry.person,
        );
        level.ancestors = higher;
        higher = Some(Box::new(level));
    }
    higher
}

pub(crate) fn person_from(raw: &RawPerson) -> Person {
    let image = trimmed(raw.image.as_deref());
    let birthday = match trimmed(raw.birthday.as_deref()) {
        birthday if birthday.is_empty() => trimmed(raw.dob.as_deref()),
        birthday => birthday,
    };
    let thumb = match raw.extra.get("thumb") {
        Some(Value::String(explicit)) if !explicit.trim().is_empty() => explicit.trim().to_string(),
        _ => thumb_path(&image),
    };
    Person {
        name: raw.trimmed_name().to_string(),
        thumb,
        image,
        birthday,
        tags: read_tags(raw.tags.as_ref()),
        visited: read_visited(raw.visited.as_ref()),
    }
}

fn trimmed(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Thumbnail path for a stored image: `images/x` maps to `images/thumbs/x`,
/// inline `data:` images have none.
pub fn thumb_path(image: &str) -> String {
    let image = image.trim();
    if image.is_empty() || image.starts_with("data:") {
        return String::new();
    }
    if image.starts_with("images/thumbs/") {
        return image.to_string();
    }
    match image.strip_prefix("images/") {
        Some(rest) => format!("images/thumbs/{rest}"),
        None => image.to_string(),
    }
}

pub fn read_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(tag)) => non_empty(tag.trim()).into_iter().collect(),
        Some(Value::Array(tags)) => tags.iter().filter_map(scalar_text).collect(),
        Some(Value::Object(map)) => match map.get("tag") {
            Some(inner) if crate::schema::is_truthy(Some(inner)) => read_tags(Some(inner)),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Visited countries are a list, or a comma separated string.
pub fn read_visited(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(countries)) => countries.iter().filter_map(scalar_text).collect(),
        Some(Value::String(countries)) => countries
            .split(',')
            .filter_map(|country| non_empty(country.trim()))
            .collect(),
        _ => Vec::new(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(text.trim()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> TreeNode {
        let doc = TreeDocument::from_value(value).unwrap();
        normalize(&doc).unwrap()
    }

    #[test]
    fn legacy_generations_become_nested_children() {
        let root = tree(json!({
            "Grandparent": "Ana",
            "Parent": [{"name": "Ion", "children": [{"name": "Dan"}]}]
        }));
        assert_eq!(root.id, "root");
        assert_eq!(root.primary.name, "Ana");
        let ion = &root.children[0];
        assert_eq!((ion.id.as_str(), ion.primary.name.as_str()), ("p-0", "Ion"));
        assert_eq!(ion.from_spouse_index, 0);
        assert_eq!(ion.children[0].primary.name, "Dan");
        assert_eq!(ion.children[0].id, "c-0-0");
        assert!(root.spouses.is_empty());
    }

    #[test]
    fn legacy_grandchildren_nest_one_more_level() {
        let root = tree(json!({
            "Grandparent": "Ana",
            "Parent": [{"name": "Ion", "grandchildren": [
                {"name": "Dan", "grandchildren": [{"name": "Eva"}]}
            ]}]
        }));
        let dan = &root.children[0].children[0];
        assert_eq!(dan.primary.name, "Dan");
        assert_eq!(dan.children[0].id, "g-0-0-0");
        assert_eq!(
            dan.children[0].position,
            PersonRef::member(MemberPath::Grandchild { parent: 0, child: 0, grand: 0 })
        );
    }

    #[test]
    fn couple_schema_recurses() {
        let root = tree(json!({
            "name": "Maria",
            "spouse": "George",
            "children": [{"name": "Elena", "children": [{"name": "Ilie"}]}]
        }));
        assert_eq!(root.id, "n-root");
        assert_eq!(root.spouses[0].person.name, "George");
        assert_eq!(root.spouses[0].id, "n-root-spouse-0");
        assert_eq!(root.children[0].children[0].id, "n-0-0");
    }

    #[test]
    fn spouse_entries_drop_empty_records_and_fold_prev_spouse() {
        let root = tree(json!({
            "name": "Maria",
            "spouse": [{"name": ""}, "George"],
            "prevSpouse": {"name": "Vlad"}
        }));
        let names: Vec<_> = root.spouses.iter().map(|s| s.person.name.as_str()).collect();
        assert_eq!(names, vec!["George", "Vlad"]);
        assert_eq!(root.spouses[0].source, SpouseSource::List(1));
        assert_eq!(root.spouses[1].source, SpouseSource::PreviousSpouse);
    }

    #[test]
    fn prev_spouse_ignored_when_second_entry_exists() {
        let root = tree(json!({
            "name": "Maria",
            "spouse": ["George", "Radu"],
            "prevSpouse": {"name": "Vlad"}
        }));
        assert_eq!(root.spouses.len(), 2);
    }

    #[test]
    fn union_index_falls_back_to_zero() {
        let root = tree(json!({
            "name": "Maria",
            "spouse": "George",
            "children": [
                {"name": "A", "fromSpouseIndex": 4},
                {"name": "B", "fromPrevSpouse": true},
                {"name": "C", "fromSpouseIndex": "0"}
            ]
        }));
        assert!(root.children.iter().all(|child| child.from_spouse_index == 0));
    }

    #[test]
    fn children_are_grouped_by_union_descending() {
        let root = tree(json!({
            "name": "Maria",
            "spouse": ["George", "Radu"],
            "children": [
                {"name": "A"},
                {"name": "B", "fromSpouseIndex": 1},
                {"name": "C"},
                {"name": "D", "fromPrevSpouse": true}
            ]
        }));
        let order: Vec<_> = root.children.iter().map(|c| c.primary.name.as_str()).collect();
        assert_eq!(order, vec!["B", "D", "A", "C"]);
        assert_eq!(root.children[0].from_spouse_index, 1);
    }

    #[test]
    fn prev_spouse_children_map_to_folded_entry() {
        let root = tree(json!({
            "Grandparent": "Ana",
            "prevSpouse": {"name": "Vlad"},
            "Parent": [{"name": "Ion", "fromPrevSpouse": true}]
        }));
        assert_eq!(root.spouses[0].source, SpouseSource::PreviousSpouse);
        assert_eq!(root.children[0].from_spouse_index, 0);
    }

    #[test]
    fn empty_nodes_are_pruned() {
        let root = tree(json!({
            "name": "Maria",
            "children": [{"name": "  "}, {"image": "x.png"}, {"name": "", "spouse": "Ion"}]
        }));
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].spouses[0].person.name, "Ion");
        assert!(normalize(&TreeDocument::parse(r#"{"name": "", "children": []}"#).unwrap()).is_none());
    }

    #[test]
    fn ancestor_chain_keeps_independent_depths() {
        let root = tree(json!({
            "name": "Dan",
            "parents": {"name": "Ion", "spouse": "Ana", "parents": {"name": "Vasile"}},
            "spouse": {"name": "Eva", "parents": {"name": "Mihai"}}
        }));
        assert_eq!(root.ancestor_depth(), 2);
        let first = root.ancestors.as_deref().unwrap();
        assert_eq!(first.id, "n-root-parents-0");
        assert_eq!(first.spouses[0].person.name, "Ana");
        assert_eq!(first.ancestors.as_deref().unwrap().id, "n-root-parents-1");
        let spouse_chain = root.spouses[0].parents.as_deref().unwrap();
        assert_eq!(spouse_chain.primary.name, "Mihai");
        assert_eq!(spouse_chain.ancestor_depth(), 0);
    }

    #[test]
    fn overflow_ancestor_spouses_fold_upwards() {
        let root = tree(json!({
            "name": "Dan",
            "parents": {"name": "Ion", "spouse": ["Ana", "Maria", {"name": "Elena"}]}
        }));
        let first = root.ancestors.as_deref().unwrap();
        assert_eq!(first.spouses.len(), 1);
        let second = first.ancestors.as_deref().unwrap();
        assert_eq!(second.primary.name, "Maria");
        assert_eq!(second.id, "n-root-parents-1");
        let third = second.ancestors.as_deref().unwrap();
        assert_eq!(third.primary.name, "Elena");
        assert!(third.ancestors.is_none());
        assert!(matches!(second.position, PersonRef::Spouse { index: 1, .. }));
    }

    #[test]
    fn person_fields_are_cleaned() {
        let root = tree(json!({
            "name": " Maria ",
            "image": "images/maria.jpg",
            "birthday": "",
            "dob": "04/05/1960",
            "tags": {"tag": ["veteran", " ", 7]},
            "visited": "Italia, Spania,,"
        }));
        assert_eq!(root.primary.name, "Maria");
        assert_eq!(root.primary.thumb, "images/thumbs/maria.jpg");
        assert_eq!(root.primary.birthday, "04/05/1960");
        assert_eq!(root.primary.tags, vec!["veteran", "7"]);
        assert_eq!(root.primary.visited, vec!["Italia", "Spania"]);
    }

    #[test]
    fn thumb_paths() {
        assert_eq!(thumb_path("data:image/png;base64,AAA"), "");
        assert_eq!(thumb_path("images/thumbs/a.jpg"), "images/thumbs/a.jpg");
        assert_eq!(thumb_path("https://x/y.jpg"), "https://x/y.jpg");
        assert_eq!(thumb_path(""), "");
    }
}
