//! The uniform grid must agree with an all-pairs scan and leave no deep
//! overlaps behind after resolution.

use std::collections::BTreeSet;

use eframe::egui::vec2;
use facet_bubbles::Node;
use facet_bubbles::physics::{CollisionConfig, SpatialCollisionGrid, contact_between};
use proptest::collection::SizeRange;
use proptest::prelude::*;

fn nodes_strategy(
    count: impl Into<SizeRange>,
    extent: f32,
    radius: (f32, f32),
) -> impl Strategy<Value = Vec<Node>> {
    let sample = (0.0f32..extent, 0.0f32..extent, radius.0..radius.1);
    prop::collection::vec(sample, count).prop_map(|samples| {
        samples
            .into_iter()
            .enumerate()
            .map(|(index, (x, y, radius))| {
                Node::new(format!("n{index}"), vec2(x, y), radius, 1.0).unwrap()
            })
            .collect()
    })
}

fn brute_force_pairs(nodes: &[Node], min_separation: f32) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    for a in 0..nodes.len() {
        for b in (a + 1)..nodes.len() {
            if contact_between(nodes, a, b, min_separation).is_some() {
                pairs.insert((a, b));
            }
        }
    }
    pairs
}

/// Deepest overlap between any two circles, with its ids.
fn deepest_overlap(nodes: &[Node]) -> Option<(f32, &str, &str)> {
    let mut deepest: Option<(f32, &str, &str)> = None;
    for a in 0..nodes.len() {
        for b in (a + 1)..nodes.len() {
            let distance = (nodes[a].position - nodes[b].position).length();
            let overlap = nodes[a].radius + nodes[b].radius - distance;
            if deepest.is_none_or(|(worst, _, _)| overlap > worst) {
                deepest = Some((overlap, nodes[a].id.as_str(), nodes[b].id.as_str()));
            }
        }
    }
    deepest
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn grid_detection_matches_brute_force(
        nodes in nodes_strategy(1..=200, 600.0, (2.0, 40.0)),
        cell_size in 8.0f32..128.0,
    ) {
        let config = CollisionConfig {
            cell_size,
            ..CollisionConfig::default()
        };
        let mut grid = SpatialCollisionGrid::new(config.clone());
        let detected = grid
            .detect(&nodes)
            .iter()
            .map(|contact| (contact.a, contact.b))
            .collect::<Vec<_>>();
        let unique = detected.iter().copied().collect::<BTreeSet<_>>();

        prop_assert_eq!(unique.len(), detected.len());
        prop_assert_eq!(unique, brute_force_pairs(&nodes, config.min_separation));
    }

    #[test]
    fn resolution_leaves_no_overlap_beyond_separation(
        mut nodes in nodes_strategy(1..=200, 1200.0, (4.0, 16.0)),
    ) {
        let config = CollisionConfig::default();
        let mut grid = SpatialCollisionGrid::new(config.clone());
        grid.resolve(&mut nodes);

        if let Some((overlap, a, b)) = deepest_overlap(&nodes) {
            prop_assert!(
                overlap <= config.min_separation + 1e-3,
                "{} and {} overlap by {}",
                a,
                b,
                overlap
            );
        }
        prop_assert!(nodes.iter().all(|node| node.position.is_finite()));
    }

    #[test]
    fn dense_crowd_relaxes_apart(
        mut nodes in nodes_strategy(40, 400.0, (16.0, 16.001)),
    ) {
        let config = CollisionConfig {
            relaxation_passes: 128,
            ..CollisionConfig::default()
        };
        let mut grid = SpatialCollisionGrid::new(config.clone());
        grid.resolve(&mut nodes);

        if let Some((overlap, a, b)) = deepest_overlap(&nodes) {
            prop_assert!(
                overlap <= config.min_separation + 1e-3,
                "{} and {} overlap by {}",
                a,
                b,
                overlap
            );
        }
        prop_assert!(nodes.iter().all(|node| node.position.is_finite()));
    }
}
