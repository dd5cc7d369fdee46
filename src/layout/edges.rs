use super::*;

#[derive(Default)]
pub(super) struct Edges {
    pub(super) merges: Vec<MergeCurve>,
    pub(super) branches: Vec<BranchCurve>,
    pub(super) marriages: Vec<MarriageLine>,
}

pub(super) fn build_edges(scene: &Scene<'_>) -> Edges {
    let mut edges = Edges::default();
    let config = scene.config;

    for &v in &scene.order {
        let h = &scene.hier[v];
        let primary = &scene.nodes[h.node];
        let children: Vec<&LayoutNode> = h.children.iter().map(|&c| &scene.nodes[scene.hier[c].node]).collect();

        if h.spouse_nodes.is_empty() {
            let junction = (primary.x, primary.y + config.person_height / 2.0 + config.split_pad);
            for child in children {
                edges.branch(None, primary, junction, child, config);
            }
            continue;
        }

        let mut by_slot: Vec<Vec<&LayoutNode>> = vec![Vec::new(); h.spouse_nodes.len()];
        for &child in &h.children {
            let slot = resolve_render_index(&h.rendered, scene.hier[child].from_spouse_index);
            by_slot[slot].push(&scene.nodes[scene.hier[child].node]);
        }
        for (slot, &spouse) in h.spouse_nodes.iter().enumerate() {
            edges.union(primary, &scene.nodes[spouse], &by_slot[slot], config);
        }
    }

    for group in &scene.overlays {
        let primary = &scene.nodes[group.primary];
        let anchor = &scene.nodes[group.anchor];
        let Some((&first, rest)) = group.spouses.split_first() else {
            let junction = (primary.x, primary.y + config.person_height / 2.0 + config.split_pad);
            edges.branch(None, primary, junction, anchor, config);
            continue;
        };
        edges.union(primary, &scene.nodes[first], &[anchor], config);
        for &spouse in rest {
            edges.union(primary, &scene.nodes[spouse], &[], config);
        }
    }
    edges
}

impl Edges {
    fn union(&mut self, primary: &LayoutNode, spouse: &LayoutNode, children: &[&LayoutNode], config: &LayoutConfig) {
        let half = config.person_width / 2.0;
        let (primary_inner, spouse_inner) = if spouse.x >= primary.x {
            (primary.x + half, spouse.x - half)
        } else {
            (primary.x - half, spouse.x + half)
        };
        let union_id = format!("{}+{}", primary.id, spouse.id);

        if children.is_empty() {
            self.marriages.push(MarriageLine {
                union_id,
                person_id: primary.id.clone(),
                spouse_id: spouse.id.clone(),
                position: spouse.position.clone(),
                start: (primary_inner.min(spouse_inner), primary.y),
                end: (primary_inner.max(spouse_inner), primary.y),
            });
            return;
        }

        let merge = ((primary.x + spouse.x) / 2.0, primary.y + config.merge_pad());
        for (person, inner) in [(primary, primary_inner), (spouse, spouse_inner)] {
            self.merges.push(MergeCurve {
                union_id: union_id.clone(),
                person_id: person.id.clone(),
                position: person.position.clone(),
                curve: union_curve((inner, person.y), merge),
            });
        }
        for child in children {
            self.branch(Some(union_id.clone()), primary, merge, child, config);
        }
    }

    fn branch(
        &mut self,
        union_id: Option<String>,
        parent: &LayoutNode,
        from: (f32, f32),
        child: &LayoutNode,
        config: &LayoutConfig,
    ) {
        let to = (child.x, child.y - config.person_height / 2.0);
        self.branches.push(BranchCurve {
            union_id,
            parent_id: parent.id.clone(),
            child_id: child.id.clone(),
            position: child.position.clone(),
            curve: branch_curve(from, to),
        });
    }
}

/// Leaves the card edge horizontally, then drops into the merge point.
pub(super) fn union_curve(start: (f32, f32), end: (f32, f32)) -> Curve {
    let dx = end.0 - start.0;
    let direction = if dx > 0.0 {
        1.0
    } else if dx < 0.0 {
        -1.0
    } else {
        0.0
    };
    let lead = (dx.abs() * 0.33).clamp(12.0, 30.0);
    let dy = (end.1 - start.1).max(30.0);
    Curve {
        start,
        c1: (start.0 + direction * lead, start.1),
        c2: (end.0, end.1 - dy * 0.6),
        end,
    }
}

/// Vertical link: both control points at the vertical midpoint.
pub(super) fn branch_curve(start: (f32, f32), end: (f32, f32)) -> Curve {
    let mid = (start.1 + end.1) / 2.0;
    Curve {
        start,
        c1: (start.0, mid),
        c2: (end.0, mid),
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_curve_lead_is_clamped() {
        let short = union_curve((0.0, 0.0), (10.0, 42.0));
        assert_eq!(short.c1, (12.0, 0.0));
        assert!((short.c2.1 - (42.0 - 42.0 * 0.6)).abs() < 1e-4);
        let long = union_curve((300.0, 0.0), (100.0, 10.0));
        assert_eq!(long.c1, (270.0, 0.0));
        assert_eq!(long.c2, (100.0, 10.0 - 18.0));
    }

    #[test]
    fn branch_curve_bends_at_midpoint() {
        let curve = branch_curve((0.0, 42.0), (100.0, 240.0));
        assert_eq!(curve.c1, (0.0, 141.0));
        assert_eq!(curve.c2, (100.0, 141.0));
    }
}
