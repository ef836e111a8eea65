//! End-to-end runs of the force layout from fixed starting positions.

use eframe::egui::{Vec2, vec2};
use facet_bubbles::physics::{
    CollisionConfig, ForceLayout, LayoutEdge, PhysicsConfig, SpatialCollisionGrid,
};
use facet_bubbles::{Node, Notification, Notifier, channel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FRAME: f32 = 1.0 / 60.0;
const VIEWPORT: Vec2 = vec2(800.0, 600.0);

fn node(id: impl Into<String>, x: f32, y: f32) -> Node {
    Node::new(id, vec2(x, y), 20.0, 1.0).unwrap()
}

fn quiet_layout(config: PhysicsConfig) -> ForceLayout {
    ForceLayout::new(
        config,
        SpatialCollisionGrid::new(CollisionConfig::default()),
        VIEWPORT,
        Notifier::disabled(),
    )
}

#[test]
fn connected_pair_settles_at_finite_distance() {
    let (notifier, receiver) = channel(16);
    let mut layout = ForceLayout::new(
        PhysicsConfig::default(),
        SpatialCollisionGrid::new(CollisionConfig::default()),
        VIEWPORT,
        notifier,
    );
    layout.set_edges(vec![LayoutEdge {
        source: 0,
        target: 1,
        strength: 0.8,
    }]);
    let mut nodes = vec![node("a", 300.0, 300.0), node("b", 500.0, 300.0)];

    let outcome = layout.run_until_stable(&mut nodes, 5000, FRAME);
    assert!(outcome.stable, "still running after {} steps", outcome.steps);

    let distance = (nodes[0].position - nodes[1].position).length();
    assert!(distance.is_finite());
    assert!(
        (42.0..=300.0).contains(&distance),
        "pair settled {distance} apart"
    );

    let stable = receiver
        .drain()
        .filter(|notification| matches!(notification, Notification::SimulationStable { .. }))
        .count();
    assert_eq!(stable, 1);
}

#[test]
fn unconnected_crowd_ends_without_overlap() {
    let mut layout = quiet_layout(PhysicsConfig {
        gravity_strength: 0.0,
        attraction_strength: 0.0,
        clustering: false,
        ..PhysicsConfig::default()
    });
    let mut rng = StdRng::seed_from_u64(7);
    let mut nodes = (0..50)
        .map(|index| {
            let column = (index % 10) as f32;
            let row = (index / 10) as f32;
            let x = 85.0 + column * 70.0 + rng.random_range(-10.0..10.0);
            let y = 125.0 + row * 90.0 + rng.random_range(-10.0..10.0);
            node(format!("n{index}"), x, y)
        })
        .collect::<Vec<_>>();

    layout.run_until_stable(&mut nodes, 5000, FRAME);

    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            let distance = (nodes[i].position - nodes[j].position).length();
            let floor = nodes[i].radius + nodes[j].radius - 1.0;
            assert!(
                distance >= floor,
                "{} and {} are {distance} apart",
                nodes[i].id,
                nodes[j].id
            );
        }
    }
}

#[test]
fn gravity_alone_pulls_a_node_to_the_centre() {
    let mut layout = quiet_layout(PhysicsConfig {
        boundary_strength: 0.0,
        clustering: false,
        ..PhysicsConfig::default()
    });
    let mut nodes = vec![node("solo", 100.0, 80.0)];

    let outcome = layout.run_until_stable(&mut nodes, 5000, FRAME);
    assert!(outcome.stable);

    let offset = nodes[0].position - VIEWPORT * 0.5;
    assert!(offset.length() < 1.0, "ended {offset:?} from the centre");
}
