use super::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Centres each family's children under the parent: under the primary card
/// for a single parent, under the union midpoint when the parent has
/// spouses. Whole subtrees move together.
pub(super) fn align_child_columns(scene: &mut Scene<'_>) {
    let config = scene.config;
    for index in 0..scene.order.len() {
        let v = scene.order[index];
        if scene.hier[v].children.is_empty() {
            continue;
        }
        let primary_x = scene.hier[v].x;
        if scene.hier[v].rendered.is_empty() {
            let children = scene.hier[v].children.clone();
            center_group(scene, &children, primary_x);
            continue;
        }
        let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
        for &child in &scene.hier[v].children {
            let slot = resolve_render_index(&scene.hier[v].rendered, scene.hier[child].from_spouse_index);
            match groups.iter_mut().find(|(existing, _)| *existing == slot) {
                Some((_, members)) => members.push(child),
                None => groups.push((slot, vec![child])),
            }
        }
        let mut placed: Vec<(f32, Vec<usize>)> = groups
            .into_iter()
            .map(|(slot, members)| ((primary_x + spouse_center(primary_x, slot, config)) / 2.0, members))
            .collect();
        placed.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (merge_x, members) in &placed {
            center_group(scene, members, *merge_x);
        }
        let ordered: Vec<Vec<usize>> = placed.into_iter().map(|(_, members)| members).collect();
        separate_groups(scene, &ordered);
    }
}

/// Horizontal extent of a group's subtrees per hierarchy depth.
#[derive(Default)]
struct Contour {
    left: BTreeMap<usize, f32>,
    right: BTreeMap<usize, f32>,
}

fn contour_of(scene: &Scene<'_>, members: &[usize]) -> Contour {
    let config = scene.config;
    let stride = config.person_width + config.spouse_gap;
    let half = config.person_width / 2.0;
    let mut contour = Contour::default();
    let mut stack = members.to_vec();
    while let Some(v) = stack.pop() {
        let node = &scene.hier[v];
        let spouses = node.rendered.len();
        let left = node.x - (spouses - spouses.min(1)) as f32 * stride - half;
        let right = node.x + spouses.min(1) as f32 * stride + half;
        let min = contour.left.entry(node.depth).or_insert(left);
        *min = min.min(left);
        let max = contour.right.entry(node.depth).or_insert(right);
        *max = max.max(right);
        stack.extend(node.children.iter().copied());
    }
    contour
}

/// Pushes union groups (ordered left to right) apart until no two subtrees
/// come closer than the spouse gap on any row, then re-centres the family.
fn separate_groups(scene: &mut Scene<'_>, groups: &[Vec<usize>]) {
    if groups.len() < 2 {
        return;
    }
    let gap = scene.config.spouse_gap;
    let mut placed_right: BTreeMap<usize, f32> = BTreeMap::new();
    let mut pushes = Vec::with_capacity(groups.len());
    let mut total = 0.0_f32;
    for members in groups {
        let contour = contour_of(scene, members);
        let overlap = contour
            .left
            .iter()
            .filter_map(|(depth, left)| placed_right.get(depth).map(|right| right + gap - (left + total)))
            .fold(0.0_f32, f32::max);
        if overlap > 1e-3 {
            total += overlap;
        }
        pushes.push(total);
        for (depth, right) in contour.right {
            let edge = placed_right.entry(depth).or_insert(right + total);
            *edge = edge.max(right + total);
        }
    }
    if total == 0.0 {
        return;
    }
    let mean = pushes.iter().sum::<f32>() / pushes.len() as f32;
    debug!(groups = groups.len(), spread = total, "separated overlapping unions");
    for (members, push) in groups.iter().zip(pushes) {
        let dx = push - mean;
        if dx != 0.0 {
            for &member in members {
                shift_subtree(scene, member, dx);
            }
        }
    }
}

fn center_group(scene: &mut Scene<'_>, members: &[usize], target: f32) {
    let (min, max) = members.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &v| {
        (min.min(scene.hier[v].x), max.max(scene.hier[v].x))
    });
    if !min.is_finite() {
        return;
    }
    let shift = target - (min + max) / 2.0;
    if shift == 0.0 {
        return;
    }
    for &member in members {
        shift_subtree(scene, member, shift);
    }
}

fn shift_subtree(scene: &mut Scene<'_>, root: usize, dx: f32) {
    let mut stack = vec![root];
    while let Some(v) = stack.pop() {
        scene.hier[v].x += dx;
        stack.extend(scene.hier[v].children.iter().copied());
    }
}

/// Redistributes every ancestor row above the origin, bottom-up, against
/// the card centres of the row directly below it.
pub(super) fn align_ancestor_rows(scene: &mut Scene<'_>) {
    let config = scene.config;
    let tolerance = config.row_tolerance;
    let step = config.generation_step();
    let Some(origin_y) = scene.nodes.get(scene.hier[scene.origin].node).map(|node| node.y) else {
        return;
    };

    let mut rows: Vec<f32> = Vec::new();
    for node in &scene.nodes {
        if node.kind.is_ancestor()
            && node.y < origin_y - tolerance
            && !rows.iter().any(|row| (row - node.y).abs() <= tolerance)
        {
            rows.push(node.y);
        }
    }
    rows.sort_by(|a, b| b.total_cmp(a));

    for row_y in rows {
        let mut cards: Vec<usize> = (0..scene.nodes.len())
            .filter(|&i| (scene.nodes[i].y - row_y).abs() <= tolerance)
            .collect();
        cards.sort_by(|&a, &b| scene.nodes[a].x.total_cmp(&scene.nodes[b].x));

        let below = row_y + step;
        let mut anchors: Vec<f32> = scene
            .nodes
            .iter()
            .filter(|node| (node.y - below).abs() <= tolerance)
            .map(|node| node.x)
            .collect();
        if anchors.is_empty() {
            continue;
        }
        anchors.sort_by(f32::total_cmp);

        let targets = if anchors.len() == cards.len() {
            anchors
        } else {
            spread_around(&anchors, cards.len(), config.min_center_gap())
        };
        for (card, target) in cards.into_iter().zip(targets) {
            let node = &mut scene.nodes[card];
            if (target - node.x).abs() >= config.align_epsilon {
                node.x = target;
            }
        }
    }
}

/// `count` evenly spaced centres around the middle of `anchors`.
fn spread_around(anchors: &[f32], count: usize, min_step: f32) -> Vec<f32> {
    let (Some(first), Some(last)) = (anchors.first(), anchors.last()) else {
        return Vec::new();
    };
    let center = (first + last) / 2.0;
    let mut gaps: Vec<f32> = anchors
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|gap| *gap > 1.0)
        .collect();
    gaps.sort_by(f32::total_cmp);
    let step = median(&gaps).map_or(min_step, |gap| gap.max(min_step));
    let middle = (count as f32 - 1.0) / 2.0;
    (0..count)
        .map(|i| center + (i as f32 - middle) * step)
        .collect()
}

fn median(sorted: &[f32]) -> Option<f32> {
    let len = sorted.len();
    match len {
        0 => None,
        _ if len % 2 == 1 => Some(sorted[len / 2]),
        _ => Some((sorted[len / 2 - 1] + sorted[len / 2]) / 2.0),
    }
}
