use crate::model::TreeNode;
use crate::normalize::normalize;
use crate::position::PersonRef;
use crate::schema::TreeDocument;
use tracing::debug;

/// Makes the origin person the root of the tree. The former parents along
/// the path become the origin's ancestor chain, above any chain the origin
/// already had. Without an explicit `isOrigin` flag the first person whose
/// name matches `center_name` is used. When nothing matches the tree is
/// returned unchanged.
pub fn resolve_origin(mut root: TreeNode, center_name: Option<&str>) -> TreeNode {
    let hint = normalized_hint(center_name);
    let Some(path) = locate(&root, hint.as_deref()) else {
        debug!("no origin found, keeping declared root");
        return root;
    };
    clear_flags(&mut root);
    if path.is_empty() {
        root.is_origin = true;
        return root;
    }

    let mut former = Vec::with_capacity(path.len());
    let mut current = root;
    for index in path {
        let child = current.children.remove(index);
        former.push(current);
        current = child;
    }
    current.is_origin = true;
    debug!(origin = %current.id, levels = former.len(), "re-rooted tree at origin");

    let mut chain: Option<Box<TreeNode>> = None;
    for mut parent in former {
        if let Some(upper) = chain.take() {
            attach_above(&mut parent.ancestors, upper);
        }
        chain = Some(Box::new(parent));
    }
    if let Some(chain) = chain {
        attach_above(&mut current.ancestors, chain);
    }
    current
}

/// Stored position of the origin person, explicit or inferred by name.
pub fn origin_position(doc: &TreeDocument) -> Option<PersonRef> {
    let root = normalize(doc)?;
    let hint = doc.center_name_hint();
    let path = locate(&root, hint.as_deref())?;
    let mut node = &root;
    for index in path {
        node = node.children.get(index)?;
    }
    Some(node.position.clone())
}

fn normalized_hint(center_name: Option<&str>) -> Option<String> {
    center_name
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
}

/// Child-index path to the origin. Explicit flags win over the name hint.
fn locate(root: &TreeNode, hint: Option<&str>) -> Option<Vec<usize>> {
    if let Some(path) = path_where(root, &|node| node.is_origin) {
        return Some(path);
    }
    let hint = hint?;
    path_where(root, &|node| node.primary.name.trim().to_lowercase() == hint)
}

fn path_where(node: &TreeNode, matches: &impl Fn(&TreeNode) -> bool) -> Option<Vec<usize>> {
    if matches(node) {
        return Some(Vec::new());
    }
    node.children.iter().enumerate().find_map(|(index, child)| {
        path_where(child, matches).map(|mut path| {
            path.insert(0, index);
            path
        })
    })
}

fn clear_flags(node: &mut TreeNode) {
    node.is_origin = false;
    for child in &mut node.children {
        clear_flags(child);
    }
}

fn attach_above(slot: &mut Option<Box<TreeNode>>, upper: Box<TreeNode>) {
    match slot {
        Some(node) => attach_above(&mut node.ancestors, upper),
        None => *slot = Some(upper),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> TreeNode {
        normalize(&TreeDocument::from_value(value).unwrap()).unwrap()
    }

    fn chain_names(node: &TreeNode) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = node.ancestors.as_deref();
        while let Some(level) = cursor {
            names.push(level.primary.name.clone());
            cursor = level.ancestors.as_deref();
        }
        names
    }

    #[test]
    fn grandchild_origin_gets_two_level_chain() {
        let root = tree(json!({
            "name": "Ana",
            "children": [
                {"name": "Ion", "children": [{"name": "Dan", "isOrigin": true}, {"name": "Eva"}]},
                {"name": "Radu"}
            ]
        }));
        let resolved = resolve_origin(root, None);
        assert_eq!(resolved.primary.name, "Dan");
        assert!(resolved.is_origin);
        assert_eq!(chain_names(&resolved), vec!["Ion", "Ana"]);
        let ion = resolved.ancestors.as_deref().unwrap();
        assert_eq!(ion.children.len(), 1);
        assert_eq!(ion.children[0].primary.name, "Eva");
    }

    #[test]
    fn existing_chain_stays_closest_to_origin() {
        let root = tree(json!({
            "name": "Ana",
            "children": [{"name": "Dan", "isOrigin": true, "parents": {"name": "Mihai"}}]
        }));
        let resolved = resolve_origin(root, None);
        assert_eq!(chain_names(&resolved), vec!["Mihai", "Ana"]);
    }

    #[test]
    fn resolution_is_idempotent() {
        let root = tree(json!({
            "name": "Ana",
            "children": [{"name": "Ion", "children": [{"name": "Dan", "isOrigin": true}]}]
        }));
        let once = resolve_origin(root, None);
        let twice = resolve_origin(once.clone(), None);
        assert_eq!(once, twice);
    }

    #[test]
    fn name_hint_matches_first_in_pre_order() {
        let root = tree(json!({
            "name": "Ana",
            "children": [
                {"name": "Ion", "children": [{"name": "dan "}]},
                {"name": "Dan"}
            ]
        }));
        let resolved = resolve_origin(root, Some(" DAN"));
        // Two people share the name; the deeper one comes first in pre-order.
        assert_eq!(chain_names(&resolved), vec!["Ion", "Ana"]);
        assert!(resolved.is_origin);
    }

    #[test]
    fn explicit_flag_beats_name_hint_and_duplicates_are_cleared() {
        let root = tree(json!({
            "name": "Ana",
            "children": [
                {"name": "Ion", "isOrigin": true},
                {"name": "Dan", "isOrigin": true}
            ]
        }));
        let resolved = resolve_origin(root, Some("Dan"));
        assert_eq!(resolved.primary.name, "Ion");
        let ana = resolved.ancestors.as_deref().unwrap();
        assert!(ana.children.iter().all(|child| !child.is_origin));
    }

    #[test]
    fn no_match_keeps_tree() {
        let root = tree(json!({"name": "Ana", "children": [{"name": "Ion"}]}));
        let resolved = resolve_origin(root.clone(), Some("Nobody"));
        assert_eq!(resolved, root);
    }

    #[test]
    fn origin_position_uses_center_name() {
        let doc = TreeDocument::from_value(json!({
            "Grandparent": "Ana",
            "Parent": [{"name": "Ion"}, {"name": "Dan"}],
            "setupContext": {"centerName": "dan"}
        }))
        .unwrap();
        assert_eq!(
            origin_position(&doc),
            Some(PersonRef::member(crate::position::MemberPath::Parent { parent: 1 }))
        );
    }
}
