use super::*;

/// Emits the primary cards in breadth-first order, then every rendered
/// spouse card next to its primary.
pub(super) fn place_cards(scene: &mut Scene<'_>) {
    let config = scene.config;
    for index in 0..scene.order.len() {
        let v = scene.order[index];
        let row = scene.row_of(v);
        let group_width = scene.group_width(v);
        let h = &scene.hier[v];
        let node = card(CardSpec {
            id: &h.tree.id,
            kind: h.kind,
            person: &h.tree.primary,
            position: &h.tree.position,
            x: h.x,
            y: h.y,
            row,
            group_width,
            is_origin: h.kind == NodeKind::Primary && h.tree.is_origin,
        });
        scene.nodes.push(node);
        scene.hier[v].node = scene.nodes.len() - 1;
    }

    for index in 0..scene.order.len() {
        let v = scene.order[index];
        let row = scene.row_of(v);
        let group_width = scene.group_width(v);
        let h = &scene.hier[v];
        let kind = if h.kind == NodeKind::Ancestor {
            NodeKind::AncestorSpouse
        } else {
            NodeKind::Spouse
        };
        let cards: Vec<LayoutNode> = h
            .rendered
            .iter()
            .enumerate()
            .map(|(slot, (_, entry))| {
                card(CardSpec {
                    id: &entry.id,
                    kind,
                    person: &entry.person,
                    position: &entry.position,
                    x: spouse_center(h.x, slot, config),
                    y: h.y,
                    row,
                    group_width,
                    is_origin: false,
                })
            })
            .collect();
        let first = scene.nodes.len();
        scene.nodes.extend(cards);
        scene.hier[v].spouse_nodes = (first..scene.nodes.len()).collect();
    }
}

/// Draws the `parents` chains of rendered spouses above their cards.
pub(super) fn place_spouse_ancestors(scene: &mut Scene<'_>) {
    for index in 0..scene.order.len() {
        let v = scene.order[index];
        let h = &scene.hier[v];
        let pending: Vec<(usize, &TreeNode)> = h
            .rendered
            .iter()
            .zip(&h.spouse_nodes)
            .filter_map(|(&(_, entry), &node)| entry.parents.as_deref().map(|parents| (node, parents)))
            .collect();
        for (anchor, level) in pending {
            place_overlay(scene, anchor, level);
        }
    }
}

fn place_overlay(scene: &mut Scene<'_>, anchor: usize, level: &TreeNode) {
    let config = scene.config;
    let (anchor_x, anchor_y, anchor_row) = {
        let node = &scene.nodes[anchor];
        (node.x, node.y, node.row)
    };
    let spouse = level.spouses.first().filter(|spouse| spouse.person.has_name());
    let group_width = config.group_width(1 + usize::from(spouse.is_some()));
    let x = match spouse {
        Some(_) => anchor_x - (config.person_width + config.spouse_gap) / 2.0,
        None => anchor_x,
    };
    let y = anchor_y - config.generation_step();
    let row = anchor_row - 1;

    scene.nodes.push(card(CardSpec {
        id: &level.id,
        kind: NodeKind::Ancestor,
        person: &level.primary,
        position: &level.position,
        x,
        y,
        row,
        group_width,
        is_origin: false,
    }));
    let primary = scene.nodes.len() - 1;

    let mut spouses = Vec::new();
    if let Some(entry) = spouse {
        scene.nodes.push(card(CardSpec {
            id: &entry.id,
            kind: NodeKind::AncestorSpouse,
            person: &entry.person,
            position: &entry.position,
            x: spouse_center(x, 0, config),
            y,
            row,
            group_width,
            is_origin: false,
        }));
        spouses.push(scene.nodes.len() - 1);
    }
    scene.overlays.push(OverlayGroup {
        primary,
        spouses: spouses.clone(),
        anchor,
    });

    if let Some(higher) = level.ancestors.as_deref() {
        place_overlay(scene, primary, higher);
    }
    if let (Some(entry), Some(&spouse_node)) = (spouse, spouses.first())
        && let Some(parents) = entry.parents.as_deref()
    {
        place_overlay(scene, spouse_node, parents);
    }
}
