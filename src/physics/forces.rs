use eframe::egui::{Rect, Vec2};

use crate::node::Node;

use super::LayoutEdge;
use super::quadtree::QuadTree;

const DEGENERATE_DISTANCE: f32 = 0.0001;

/// Coulomb-style push of magnitude `strength * weight / (d^2 + 1)` along `delta`.
fn repulsion_law(delta: Vec2, weight: f32, strength: f32) -> Vec2 {
    let distance_sq = delta.length_sq();
    let distance = distance_sq.sqrt();
    if !(distance > DEGENERATE_DISTANCE && distance.is_finite()) {
        return Vec2::ZERO;
    }
    delta / distance * (strength * weight / (distance_sq + 1.0))
}

pub(super) fn accumulate_pairwise_repulsion(nodes: &mut [Node], strength: f32) {
    let count = nodes.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let push = repulsion_law(nodes[i].position - nodes[j].position, 1.0, strength);
            nodes[i].force += push;
            nodes[j].force -= push;
        }
    }
}

pub(super) fn accumulate_tree_repulsion(
    nodes: &mut [Node],
    positions: &mut Vec<Vec2>,
    strength: f32,
    theta: f32,
) {
    positions.clear();
    positions.extend(nodes.iter().map(|node| node.position));
    let Some(tree) = QuadTree::build(positions) else {
        return;
    };

    for (index, node) in nodes.iter_mut().enumerate() {
        node.force += tree.accumulate(index, positions, theta, |delta, weight| {
            repulsion_law(delta, weight, strength)
        });
    }
}

/// Hooke springs with zero rest length, scaled by edge strength.
pub(super) fn accumulate_attraction(nodes: &mut [Node], edges: &[LayoutEdge], stiffness: f32) {
    let count = nodes.len();
    for edge in edges {
        if edge.source >= count || edge.target >= count || edge.source == edge.target {
            continue;
        }

        let delta = nodes[edge.target].position - nodes[edge.source].position;
        let distance = delta.length();
        if !(distance > DEGENERATE_DISTANCE && distance.is_finite()) {
            continue;
        }

        let pull = delta / distance * (stiffness * edge.strength * distance);
        nodes[edge.source].force += pull;
        nodes[edge.target].force -= pull;
    }
}

pub(super) fn accumulate_gravity(nodes: &mut [Node], center: Vec2, strength: f32) {
    for node in nodes {
        node.force += (center - node.position) * strength;
    }
}

/// Inward push proportional to how far a node has crossed into the margin band.
pub(super) fn accumulate_boundary(nodes: &mut [Node], area: Rect, margin: f32, strength: f32) {
    let inner = area.shrink(margin);
    if !(inner.width() > 0.0 && inner.height() > 0.0) {
        return;
    }

    for node in nodes {
        let position = node.position;
        if position.x < inner.left() {
            node.force.x += (inner.left() - position.x) * strength;
        } else if position.x > inner.right() {
            node.force.x -= (position.x - inner.right()) * strength;
        }
        if position.y < inner.top() {
            node.force.y += (inner.top() - position.y) * strength;
        } else if position.y > inner.bottom() {
            node.force.y -= (position.y - inner.bottom()) * strength;
        }
    }
}

/// Pulls each grouped node towards the centroid of its facet group.
pub(super) fn accumulate_clustering(
    nodes: &mut [Node],
    centroids: &mut Vec<(Vec2, usize)>,
    strength: f32,
) {
    centroids.clear();
    for node in nodes.iter() {
        let Some(group) = node.facet_group else {
            continue;
        };
        if centroids.len() <= group {
            centroids.resize(group + 1, (Vec2::ZERO, 0));
        }
        centroids[group].0 += node.position;
        centroids[group].1 += 1;
    }

    for node in nodes {
        let Some(group) = node.facet_group else {
            continue;
        };
        let (sum, members) = centroids[group];
        if members < 2 {
            continue;
        }
        let centroid = sum / members as f32;
        node.force += (centroid - node.position) * strength;
    }
}
