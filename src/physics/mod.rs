mod collision;
mod forces;
mod quadtree;

use eframe::egui::{Rect, Vec2, pos2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::events::{Notification, Notifier};
use crate::node::{Node, NodeArena};
use crate::similarity::SimilarityMatrix;

pub use collision::{CollisionConfig, Contact, SpatialCollisionGrid, contact_between};
use forces::{
    accumulate_attraction, accumulate_boundary, accumulate_clustering, accumulate_gravity,
    accumulate_pairwise_repulsion, accumulate_tree_repulsion,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RepulsionMode {
    #[default]
    Exact,
    /// Quadtree approximation; cells with `side / distance < theta` act as one body.
    BarnesHut { theta: f32 },
}

/// Force constants. A strength of zero switches the corresponding pass off.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub repulsion_strength: f32,
    pub repulsion_mode: RepulsionMode,
    pub attraction_strength: f32,
    pub edge_threshold: f32,
    pub gravity_strength: f32,
    pub boundary_margin: f32,
    pub boundary_strength: f32,
    pub clustering: bool,
    pub cluster_strength: f32,
    pub damping: f32,
    pub max_velocity: f32,
    pub cooling_rate: f32,
    pub min_temperature: f32,
    /// Hard-clamp nodes inside the viewport after collision correction.
    pub contain: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            repulsion_strength: 6000.0,
            repulsion_mode: RepulsionMode::Exact,
            attraction_strength: 0.004,
            edge_threshold: 0.3,
            gravity_strength: 0.02,
            boundary_margin: 40.0,
            boundary_strength: 0.3,
            clustering: true,
            cluster_strength: 0.02,
            damping: 0.9,
            max_velocity: 12.0,
            cooling_rate: 0.995,
            min_temperature: 0.01,
            contain: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutEdge {
    pub source: usize,
    pub target: usize,
    pub strength: f32,
}

/// Edges for every matrix pair above `threshold`, translated to arena indices.
pub fn edges_from_matrix(
    matrix: &SimilarityMatrix,
    arena: &NodeArena,
    threshold: f32,
) -> Vec<LayoutEdge> {
    let ids = matrix.ids();
    matrix
        .pairs_above(threshold)
        .filter_map(|(i, j, strength)| {
            Some(LayoutEdge {
                source: arena.index_of(&ids[i])?,
                target: arena.index_of(&ids[j])?,
                strength,
            })
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationState {
    pub temperature: f32,
    pub step_count: u64,
    pub is_stable: bool,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            step_count: 0,
            is_stable: false,
        }
    }
}

/// Outcome of [`ForceLayout::run_until_stable`]; `stable == false` means the
/// step budget ran out first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Convergence {
    pub steps: u64,
    pub stable: bool,
}

pub struct ForceLayout {
    config: PhysicsConfig,
    collision: SpatialCollisionGrid,
    state: SimulationState,
    edges: Vec<LayoutEdge>,
    viewport: Vec2,
    notifier: Notifier,
    position_scratch: Vec<Vec2>,
    centroid_scratch: Vec<(Vec2, usize)>,
}

impl ForceLayout {
    pub fn new(
        config: PhysicsConfig,
        collision: SpatialCollisionGrid,
        viewport: Vec2,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            collision,
            state: SimulationState::default(),
            edges: Vec::new(),
            viewport,
            notifier,
            position_scratch: Vec::new(),
            centroid_scratch: Vec::new(),
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Swaps force constants without restarting; wakes a settled simulation.
    pub fn set_config(&mut self, config: PhysicsConfig) {
        self.config = config;
        self.reheat(0.5);
    }

    pub fn collision(&self) -> &SpatialCollisionGrid {
        &self.collision
    }

    pub fn collision_mut(&mut self) -> &mut SpatialCollisionGrid {
        &mut self.collision
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn edges(&self) -> &[LayoutEdge] {
        &self.edges
    }

    pub fn set_edges(&mut self, edges: Vec<LayoutEdge>) {
        self.edges = edges;
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn area(&self) -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), self.viewport)
    }

    pub fn set_viewport(&mut self, viewport: Vec2, nodes: &mut [Node]) {
        self.viewport = viewport;
        self.restart(nodes);
    }

    /// Zeroes every velocity and resets the temperature to 1.0.
    pub fn restart(&mut self, nodes: &mut [Node]) {
        for node in nodes.iter_mut() {
            node.velocity = Vec2::ZERO;
            node.force = Vec2::ZERO;
        }
        self.state = SimulationState::default();
        debug!(nodes = nodes.len(), "simulation restarted");
    }

    /// Raises the temperature to at least `temperature` and resumes stepping,
    /// keeping current velocities.
    pub fn reheat(&mut self, temperature: f32) {
        let temperature = temperature.clamp(0.0, 1.0);
        if temperature > self.state.temperature {
            self.state.temperature = temperature;
        }
        if self.state.temperature >= self.config.min_temperature {
            self.state.is_stable = false;
        }
    }

    /// Advances one tick. Returns whether the simulation is still running.
    pub fn step(&mut self, nodes: &mut [Node], delta_seconds: f32) -> bool {
        if nodes.is_empty() || self.state.is_stable {
            return false;
        }

        let time_scale = if delta_seconds.is_finite() {
            (delta_seconds * 60.0).clamp(0.25, 3.0)
        } else {
            1.0
        };

        for node in nodes.iter_mut() {
            node.force = Vec2::ZERO;
        }
        self.accumulate_forces(nodes);
        self.integrate(nodes, time_scale);

        self.state.temperature *= self.config.cooling_rate;
        self.state.step_count += 1;
        if self.state.temperature < self.config.min_temperature {
            self.state.is_stable = true;
            info!(steps = self.state.step_count, "simulation reached equilibrium");
            self.notifier.notify(Notification::SimulationStable {
                steps: self.state.step_count,
            });
        }

        self.collision.resolve(nodes);
        if self.config.contain {
            self.collision.resolve_boundaries(nodes, self.area());
        }

        trace!(
            step = self.state.step_count,
            temperature = self.state.temperature,
            "simulation step"
        );
        !self.state.is_stable
    }

    pub fn run_until_stable(
        &mut self,
        nodes: &mut [Node],
        max_steps: u64,
        delta_seconds: f32,
    ) -> Convergence {
        let mut taken = 0u64;
        while taken < max_steps && self.step(nodes, delta_seconds) {
            taken += 1;
        }
        Convergence {
            steps: self.state.step_count,
            stable: self.state.is_stable,
        }
    }

    fn accumulate_forces(&mut self, nodes: &mut [Node]) {
        let config = &self.config;

        if config.repulsion_strength > 0.0 {
            match config.repulsion_mode {
                RepulsionMode::Exact => {
                    accumulate_pairwise_repulsion(nodes, config.repulsion_strength);
                }
                RepulsionMode::BarnesHut { theta } => accumulate_tree_repulsion(
                    nodes,
                    &mut self.position_scratch,
                    config.repulsion_strength,
                    theta,
                ),
            }
        }

        if config.attraction_strength > 0.0 {
            accumulate_attraction(nodes, &self.edges, config.attraction_strength);
        }

        if config.gravity_strength > 0.0 {
            accumulate_gravity(nodes, self.viewport * 0.5, config.gravity_strength);
        }

        if config.boundary_strength > 0.0 {
            accumulate_boundary(
                nodes,
                self.area(),
                config.boundary_margin,
                config.boundary_strength,
            );
        }

        if config.clustering && config.cluster_strength > 0.0 {
            accumulate_clustering(nodes, &mut self.centroid_scratch, config.cluster_strength);
        }
    }

    fn integrate(&self, nodes: &mut [Node], time_scale: f32) {
        let temperature = self.state.temperature;
        let damping = self.config.damping.clamp(0.0, 1.0).powf(time_scale);
        let max_velocity = self.config.max_velocity.max(0.0);

        for node in nodes.iter_mut().filter(|node| node.is_force_driven()) {
            let acceleration = node.force / node.mass;
            let mut velocity = (node.velocity + acceleration * time_scale) * temperature * damping;

            let speed = velocity.length();
            if speed > max_velocity {
                velocity *= max_velocity / speed;
            }

            if !(velocity.x.is_finite() && velocity.y.is_finite()) {
                warn!(id = %node.id, "non-finite velocity discarded");
                node.velocity = Vec2::ZERO;
                continue;
            }

            node.velocity = velocity;
            node.position += velocity * time_scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn layout(config: PhysicsConfig) -> ForceLayout {
        ForceLayout::new(
            config,
            SpatialCollisionGrid::new(CollisionConfig::default()),
            vec2(800.0, 600.0),
            Notifier::disabled(),
        )
    }

    fn node(id: &str, x: f32, y: f32) -> Node {
        Node::new(id, vec2(x, y), 20.0, 1.0).unwrap()
    }

    #[test]
    fn empty_set_is_not_running() {
        let mut layout = layout(PhysicsConfig::default());
        assert!(!layout.step(&mut [], FRAME));
        assert_eq!(layout.state().step_count, 0);
    }

    #[test]
    fn cools_until_stable() {
        let mut layout = layout(PhysicsConfig {
            cooling_rate: 0.5,
            min_temperature: 0.1,
            ..PhysicsConfig::default()
        });
        let mut nodes = vec![node("a", 400.0, 300.0)];

        assert!(layout.step(&mut nodes, FRAME));
        assert!(layout.step(&mut nodes, FRAME));
        assert!(layout.step(&mut nodes, FRAME));
        assert!(!layout.step(&mut nodes, FRAME));
        assert!(layout.state().is_stable);
        assert!(!layout.step(&mut nodes, FRAME));
        assert_eq!(layout.state().step_count, 4);
    }

    #[test]
    fn pinned_and_dragged_nodes_are_not_moved() {
        let mut layout = layout(PhysicsConfig::default());
        let mut nodes = vec![node("pinned", 100.0, 100.0), node("dragged", 140.0, 100.0)];
        nodes[0].pinned = true;
        nodes[1].dragging = true;

        for _ in 0..20 {
            layout.step(&mut nodes, FRAME);
        }
        assert_eq!(nodes[0].position, vec2(100.0, 100.0));
        assert_eq!(nodes[1].position, vec2(140.0, 100.0));
    }

    #[test]
    fn restart_resets_temperature_and_velocity() {
        let mut layout = layout(PhysicsConfig::default());
        let mut nodes = vec![node("a", 100.0, 100.0), node("b", 160.0, 90.0)];
        for _ in 0..10 {
            layout.step(&mut nodes, FRAME);
        }
        assert!(layout.state().temperature < 1.0);

        layout.restart(&mut nodes);
        assert_eq!(layout.state(), SimulationState::default());
        assert!(nodes.iter().all(|node| node.velocity == Vec2::ZERO));
    }

    #[test]
    fn reheat_wakes_stable_simulation() {
        let mut layout = layout(PhysicsConfig {
            cooling_rate: 0.1,
            ..PhysicsConfig::default()
        });
        let mut nodes = vec![node("a", 400.0, 300.0)];
        layout.run_until_stable(&mut nodes, 100, FRAME);
        assert!(layout.state().is_stable);

        layout.reheat(0.5);
        assert!(!layout.state().is_stable);
        assert!(layout.step(&mut nodes, FRAME));
    }

    #[test]
    fn velocity_is_clamped() {
        let mut layout = layout(PhysicsConfig {
            gravity_strength: 50.0,
            max_velocity: 5.0,
            contain: false,
            ..PhysicsConfig::default()
        });
        let mut nodes = vec![node("a", 0.0, 0.0)];
        layout.step(&mut nodes, FRAME);
        assert!(nodes[0].velocity.length() <= 5.0 + 1e-4);
    }

    #[test]
    fn barnes_hut_mode_separates_nodes() {
        let mut layout = layout(PhysicsConfig {
            repulsion_mode: RepulsionMode::BarnesHut { theta: 0.7 },
            gravity_strength: 0.0,
            ..PhysicsConfig::default()
        });
        let mut nodes = (0..30)
            .map(|index| {
                let x = 380.0 + (index % 6) as f32 * 8.0;
                let y = 280.0 + (index / 6) as f32 * 8.0;
                node(&format!("n{index}"), x, y)
            })
            .collect::<Vec<_>>();
        layout.run_until_stable(&mut nodes, 2000, FRAME);

        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let distance = (nodes[i].position - nodes[j].position).length();
                assert!(distance >= 40.0 - 2.0);
            }
        }
    }

    #[test]
    fn matrix_edges_use_arena_indices() {
        use serde_json::json;

        use crate::entity::Entity;
        use crate::similarity::SimilarityEngine;

        let entities = vec![
            Entity::new("a").with_facet("tags", json!(["x", "y"])),
            Entity::new("b").with_facet("tags", json!(["x"])),
            Entity::new("c").with_facet("tags", json!(["z"])),
        ];
        let matrix =
            SimilarityEngine::default().calculate_matrix(&entities, &["tags".to_owned()]);

        let mut arena = NodeArena::new();
        arena.insert(node("b", 0.0, 0.0));
        arena.insert(node("c", 50.0, 0.0));
        arena.insert(node("a", 100.0, 0.0));

        let edges = edges_from_matrix(&matrix, &arena, 0.3);
        assert_eq!(
            edges,
            vec![LayoutEdge {
                source: 2,
                target: 0,
                strength: 1.0
            }]
        );
    }
}
