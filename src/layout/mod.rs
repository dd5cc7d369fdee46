mod align;
mod edges;
mod spouses;
mod tidy;
pub(crate) mod types;
pub use types::*;
use align::*;
use edges::*;
use spouses::*;
use tidy::*;

use crate::config::LayoutConfig;
use crate::model::{Person, SpouseEntry, TreeNode};
use crate::position::PersonRef;
use std::collections::VecDeque;
use tracing::debug;

/// A node of the generation hierarchy the tidy pass runs over. Every tree
/// node with an ancestor chain is wrapped by it, so the chain occupies the
/// rows above the node.
struct HierNode<'a> {
    tree: &'a TreeNode,
    kind: NodeKind,
    /// Rendered spouses in render order, with their index in `tree.spouses`.
    rendered: Vec<(usize, &'a SpouseEntry)>,
    from_spouse_index: usize,
    parent: Option<usize>,
    children: Vec<usize>,
    depth: usize,
    x: f32,
    y: f32,
    node: usize,
    spouse_nodes: Vec<usize>,
}

/// Ancestors of a spouse, drawn above that spouse's card.
struct OverlayGroup {
    primary: usize,
    spouses: Vec<usize>,
    anchor: usize,
}

struct Scene<'a> {
    config: &'a LayoutConfig,
    hier: Vec<HierNode<'a>>,
    order: Vec<usize>,
    top: usize,
    origin: usize,
    nodes: Vec<LayoutNode>,
    overlays: Vec<OverlayGroup>,
}

pub fn compute_layout(tree: &TreeNode, config: &LayoutConfig) -> FamilyLayout {
    let mut scene = Scene::build(tree, config);
    scene.place_hierarchy();
    align_child_columns(&mut scene);
    place_cards(&mut scene);
    place_spouse_ancestors(&mut scene);
    align_ancestor_rows(&mut scene);
    scene.translate_to_origin();

    let edges = build_edges(&scene);
    let bounds = card_bounds(&scene.nodes, config);
    let origin_id = Some(scene.hier[scene.origin].tree.id.clone());
    debug!(
        nodes = scene.nodes.len(),
        branches = edges.branches.len(),
        "computed family layout"
    );
    FamilyLayout {
        nodes: scene.nodes,
        merges: edges.merges,
        branches: edges.branches,
        marriages: edges.marriages,
        bounds,
        origin_id,
    }
}

impl<'a> Scene<'a> {
    fn build(tree: &'a TreeNode, config: &'a LayoutConfig) -> Self {
        let mut hier = Vec::new();
        let (top, origin) = wrap(tree, &mut hier);
        let mut scene = Self {
            config,
            hier,
            order: Vec::new(),
            top,
            origin,
            nodes: Vec::new(),
            overlays: Vec::new(),
        };
        scene.order = scene.breadth_first();
        scene
    }

    /// Breadth-first order from the top; fills in depths on the way.
    fn breadth_first(&mut self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.hier.len());
        let mut queue = VecDeque::from([(self.top, 0)]);
        while let Some((v, depth)) = queue.pop_front() {
            self.hier[v].depth = depth;
            order.push(v);
            queue.extend(self.hier[v].children.iter().map(|&child| (child, depth + 1)));
        }
        order
    }

    fn group_width(&self, v: usize) -> f32 {
        self.config.group_width(1 + self.hier[v].rendered.len())
    }

    fn row_of(&self, v: usize) -> i32 {
        self.hier[v].depth as i32 - self.hier[self.origin].depth as i32
    }

    fn place_hierarchy(&mut self) {
        let config = self.config;
        let children: Vec<Vec<usize>> = self.hier.iter().map(|h| h.children.clone()).collect();
        let widths: Vec<f32> = (0..self.hier.len()).map(|v| self.group_width(v)).collect();
        let parents: Vec<Option<usize>> = self.hier.iter().map(|h| h.parent).collect();
        let base = config.base_couple_width();
        let min_gap = config.min_gap();
        let offsets = tidy_offsets(&children, self.top, |a, b| {
            let gap = (widths[a] / 2.0 + min_gap + widths[b] / 2.0) / base;
            if parents[a] == parents[b] {
                gap
            } else {
                gap * config.unrelated_factor
            }
        });

        let stride = config.person_width + config.spouse_gap;
        for v in 0..self.hier.len() {
            let spouses = self.hier[v].rendered.len();
            let left = spouses - spouses.min(1);
            let group_x = offsets[v] * base;
            let node = &mut self.hier[v];
            node.x = group_x - widths[v] / 2.0 + left as f32 * stride + config.person_width / 2.0;
            node.y = node.depth as f32 * config.generation_step();
        }
    }

    fn translate_to_origin(&mut self) {
        let Some(origin) = self.nodes.get(self.hier[self.origin].node) else {
            return;
        };
        let (dx, dy) = (-origin.x, -origin.y);
        for node in &mut self.nodes {
            node.x += dx;
            node.y += dy;
        }
    }
}

fn wrap<'a>(tree: &'a TreeNode, hier: &mut Vec<HierNode<'a>>) -> (usize, usize) {
    let own = push_hier(
        hier,
        tree,
        NodeKind::Primary,
        tree.named_spouses().collect(),
        tree.from_spouse_index,
    );
    for child in &tree.children {
        let (top, _) = wrap(child, hier);
        link(hier, own, top);
    }
    let mut top = own;
    let mut level = tree.ancestors.as_deref();
    while let Some(ancestor) = level {
        let rendered = ancestor
            .spouses
            .first()
            .filter(|spouse| spouse.person.has_name())
            .map(|spouse| (0, spouse))
            .into_iter()
            .collect();
        let index = push_hier(hier, ancestor, NodeKind::Ancestor, rendered, tree.from_spouse_index);
        link(hier, index, top);
        top = index;
        level = ancestor.ancestors.as_deref();
    }
    (top, own)
}

fn push_hier<'a>(
    hier: &mut Vec<HierNode<'a>>,
    tree: &'a TreeNode,
    kind: NodeKind,
    rendered: Vec<(usize, &'a SpouseEntry)>,
    from_spouse_index: usize,
) -> usize {
    hier.push(HierNode {
        tree,
        kind,
        rendered,
        from_spouse_index,
        parent: None,
        children: Vec::new(),
        depth: 0,
        x: 0.0,
        y: 0.0,
        node: 0,
        spouse_nodes: Vec::new(),
    });
    hier.len() - 1
}

fn link(hier: &mut [HierNode<'_>], parent: usize, child: usize) {
    hier[parent].children.push(child);
    hier[child].parent = Some(parent);
}

/// Render slot of a child's union: the rendered spouse with that index, or
/// the nearest slot when that spouse is not drawn.
fn resolve_render_index(rendered: &[(usize, &SpouseEntry)], from_spouse_index: usize) -> usize {
    rendered
        .iter()
        .position(|(index, _)| *index == from_spouse_index)
        .unwrap_or_else(|| from_spouse_index.min(rendered.len().saturating_sub(1)))
}

/// Centre of the spouse in render slot `slot`: slot 0 on the right, later
/// slots further out on the left.
fn spouse_center(primary_x: f32, slot: usize, config: &LayoutConfig) -> f32 {
    let stride = config.person_width + config.spouse_gap;
    if slot == 0 {
        primary_x + stride
    } else {
        primary_x - stride * slot as f32
    }
}

struct CardSpec<'p> {
    id: &'p str,
    kind: NodeKind,
    person: &'p Person,
    position: &'p PersonRef,
    x: f32,
    y: f32,
    row: i32,
    group_width: f32,
    is_origin: bool,
}

fn card(spec: CardSpec<'_>) -> LayoutNode {
    let label = if spec.person.has_name() {
        spec.person.name.clone()
    } else if spec.kind.is_ancestor() {
        "Parent".to_string()
    } else {
        "Member".to_string()
    };
    // Former parents of a re-rooted origin still hold the origin's subtree.
    let holds_origin = spec.kind == NodeKind::Ancestor
        && spec.position.as_member().is_some_and(|path| !path.is_root());
    LayoutNode {
        id: spec.id.to_string(),
        kind: spec.kind,
        person: spec.person.clone(),
        label,
        x: spec.x,
        y: spec.y,
        row: spec.row,
        group_width: spec.group_width,
        position: spec.position.clone(),
        is_origin: spec.is_origin,
        deletable: !spec.is_origin && !holds_origin,
    }
}

fn card_bounds(nodes: &[LayoutNode], config: &LayoutConfig) -> Bounds {
    let half_w = config.person_width / 2.0;
    let half_h = config.person_height / 2.0;
    let mut iter = nodes.iter();
    let Some(first) = iter.next() else {
        return Bounds::default();
    };
    let start = Bounds {
        min_x: first.x - half_w,
        min_y: first.y - half_h,
        max_x: first.x + half_w,
        max_y: first.y + half_h,
    };
    iter.fold(start, |bounds, node| Bounds {
        min_x: bounds.min_x.min(node.x - half_w),
        min_y: bounds.min_y.min(node.y - half_h),
        max_x: bounds.max_x.max(node.x + half_w),
        max_y: bounds.max_y.max(node.y + half_h),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::origin::resolve_origin;
    use crate::schema::TreeDocument;
    use serde_json::json;

    fn layout(value: serde_json::Value) -> FamilyLayout {
        let doc = TreeDocument::from_value(value).unwrap();
        let tree = normalize(&doc).unwrap();
        let tree = resolve_origin(tree, doc.center_name_hint().as_deref());
        compute_layout(&tree, &LayoutConfig::default())
    }

    fn by_name<'l>(layout: &'l FamilyLayout, name: &str) -> &'l LayoutNode {
        layout.node_by_name(name).unwrap()
    }

    #[test]
    fn single_person_sits_at_origin() {
        let layout = layout(json!({"name": "Maria"}));
        assert_eq!(layout.nodes.len(), 1);
        let maria = &layout.nodes[0];
        assert_eq!((maria.x, maria.y, maria.row), (0.0, 0.0, 0));
        assert!(layout.branches.is_empty());
        assert_eq!(layout.bounds.width(), 170.0);
        assert_eq!(layout.bounds.height(), 120.0);
        assert_eq!(layout.origin_id.as_deref(), Some("n-root"));
    }

    #[test]
    fn couple_without_children_gets_marriage_line() {
        let layout = layout(json!({"name": "Maria", "spouse": "George"}));
        let george = by_name(&layout, "George");
        assert_eq!(george.kind, NodeKind::Spouse);
        assert_eq!(george.x, 218.0);
        assert_eq!(layout.marriages.len(), 1);
        let line = &layout.marriages[0];
        assert_eq!(line.start, (85.0, 0.0));
        assert_eq!(line.end, (133.0, 0.0));
        assert!(layout.merges.is_empty());
    }

    #[test]
    fn previous_spouses_stack_on_the_left() {
        let layout = layout(json!({"name": "Maria", "spouse": ["George", "Radu", "Vlad"]}));
        assert_eq!(by_name(&layout, "George").x, 218.0);
        assert_eq!(by_name(&layout, "Radu").x, -218.0);
        assert_eq!(by_name(&layout, "Vlad").x, -436.0);
        assert_eq!(by_name(&layout, "Maria").group_width, 170.0 * 4.0 + 48.0 * 3.0);
    }

    #[test]
    fn unnamed_primary_gets_placeholder_label() {
        let layout = layout(json!({"name": "", "spouse": "George"}));
        let primary = layout.nodes.iter().find(|n| n.kind == NodeKind::Primary).unwrap();
        assert_eq!(primary.label, "Member");
    }

    #[test]
    fn origin_is_not_deletable_but_spouse_is() {
        let layout = layout(json!({"name": "Maria", "isOrigin": true, "spouse": "George"}));
        assert!(!by_name(&layout, "Maria").deletable);
        assert!(by_name(&layout, "George").deletable);
    }

    #[test]
    fn mixed_widths_keep_cards_apart() {
        let layout = layout(json!({
            "name": "Ana",
            "children": [
                {"name": "A", "spouse": ["B", "C"]},
                {"name": "D"},
                {"name": "E", "spouse": "F"}
            ]
        }));
        let mut row = layout.row(1);
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
        for pair in row.windows(2) {
            assert!(pair[1].x - pair[0].x >= 170.0, "{} overlaps {}", pair[0].label, pair[1].label);
        }
    }

    #[test]
    fn spouse_ancestors_take_the_columns_below() {
        let layout = layout(json!({
            "name": "Dan",
            "spouse": {"name": "Eva", "parents": {"name": "Mihai", "spouse": "Ioana"}}
        }));
        let dan = by_name(&layout, "Dan");
        let eva = by_name(&layout, "Eva");
        let mihai = by_name(&layout, "Mihai");
        let ioana = by_name(&layout, "Ioana");
        assert_eq!(mihai.kind, NodeKind::Ancestor);
        assert_eq!(ioana.kind, NodeKind::AncestorSpouse);
        assert_eq!(mihai.row, -1);
        // Two cards above two cards: the row snaps onto the columns below.
        assert_eq!((mihai.x, ioana.x), (dan.x, eva.x));
        let into_eva = layout.branches.iter().find(|b| b.child_id == eva.id).unwrap();
        assert_eq!(into_eva.curve.end, (eva.x, eva.y - 60.0));
    }

    #[test]
    fn empty_ancestor_level_uses_parent_label() {
        let layout = layout(json!({
            "name": "Dan",
            "parents": {"name": "", "spouse": "Ana"}
        }));
        let level = layout.nodes.iter().find(|n| n.kind == NodeKind::Ancestor).unwrap();
        assert_eq!(level.label, "Parent");
        assert_eq!(level.row, -1);
    }

    #[test]
    fn bounds_cover_every_card() {
        let layout = layout(json!({
            "name": "Ana",
            "spouse": "Petru",
            "children": [{"name": "Ion"}, {"name": "Eva", "spouse": "Dan"}]
        }));
        for node in &layout.nodes {
            assert!(node.x - 85.0 >= layout.bounds.min_x - 1e-3);
            assert!(node.x + 85.0 <= layout.bounds.max_x + 1e-3);
            assert!(node.y + 60.0 <= layout.bounds.max_y + 1e-3);
        }
    }
}
