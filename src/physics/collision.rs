use std::collections::HashMap;

use eframe::egui::{Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::node::Node;

const DEGENERATE_DISTANCE: f32 = 0.0001;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Requested grid cell size. Raised at rebuild time to the largest possible
    /// contact distance so the 3x3 neighbourhood never misses a pair.
    pub cell_size: f32,
    pub min_separation: f32,
    pub restitution: f32,
    pub friction: f32,
    pub boundary_restitution: f32,
    pub boundary_margin: f32,
    pub relaxation_passes: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            cell_size: 64.0,
            min_separation: 2.0,
            restitution: 0.5,
            friction: 0.98,
            boundary_restitution: 0.6,
            boundary_margin: 0.0,
            relaxation_passes: 4,
        }
    }
}

/// Overlap between nodes `a < b`; `normal` points from `a` towards `b`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub a: usize,
    pub b: usize,
    pub depth: f32,
    pub normal: Vec2,
}

/// Narrow-phase test shared by the grid and by brute-force checks.
///
/// Coincident or non-finite centres have no defined normal and report no
/// contact.
pub fn contact_between(nodes: &[Node], a: usize, b: usize, min_separation: f32) -> Option<Contact> {
    let delta = nodes[b].position - nodes[a].position;
    let reach = nodes[a].radius + nodes[b].radius + min_separation;
    let distance_sq = delta.length_sq();
    if !(distance_sq < reach * reach) {
        return None;
    }

    let distance = distance_sq.sqrt();
    if !(distance > DEGENERATE_DISTANCE && distance.is_finite()) {
        return None;
    }

    Some(Contact {
        a,
        b,
        depth: reach - distance,
        normal: delta / distance,
    })
}

type CellKey = (i32, i32);

/// Uniform hash grid over node centres, rebuilt on every detection pass.
#[derive(Clone, Debug, Default)]
pub struct SpatialCollisionGrid {
    config: CollisionConfig,
    cell_size: f32,
    cells: HashMap<CellKey, Vec<usize>>,
    contacts: Vec<Contact>,
}

impl SpatialCollisionGrid {
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            cell_size: config.cell_size.max(1.0),
            config,
            cells: HashMap::new(),
            contacts: Vec::new(),
        }
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CollisionConfig) {
        self.config = config;
    }

    /// Cell size used by the most recent rebuild.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell_of(&self, position: Vec2) -> CellKey {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    pub fn rebuild(&mut self, nodes: &[Node]) {
        let max_radius = nodes
            .iter()
            .map(|node| node.radius)
            .fold(0.0_f32, f32::max);
        let reach = max_radius * 2.0 + self.config.min_separation.max(0.0);
        self.cell_size = self.config.cell_size.max(reach).max(1.0);

        self.cells.clear();
        for (index, node) in nodes.iter().enumerate() {
            let key = self.cell_of(node.position);
            self.cells.entry(key).or_default().push(index);
        }
    }

    /// Every overlapping pair, each reported once with `a < b`.
    pub fn detect(&mut self, nodes: &[Node]) -> &[Contact] {
        self.rebuild(nodes);
        self.contacts.clear();

        for index in 0..nodes.len() {
            let (cell_x, cell_y) = self.cell_of(nodes[index].position);
            for offset_x in -1..=1 {
                for offset_y in -1..=1 {
                    let key = (cell_x.saturating_add(offset_x), cell_y.saturating_add(offset_y));
                    let Some(members) = self.cells.get(&key) else {
                        continue;
                    };
                    for &other in members {
                        if other <= index {
                            continue;
                        }
                        if let Some(contact) =
                            contact_between(nodes, index, other, self.config.min_separation)
                        {
                            self.contacts.push(contact);
                        }
                    }
                }
            }
        }

        &self.contacts
    }

    /// Pushes overlapping nodes apart and exchanges impulses, relaxing up to
    /// `relaxation_passes` times. Returns the number of contacts corrected.
    pub fn resolve(&mut self, nodes: &mut [Node]) -> usize {
        let mut corrected = 0usize;
        for _ in 0..self.config.relaxation_passes.max(1) {
            self.detect(nodes);
            if self.contacts.is_empty() {
                break;
            }

            let contacts = std::mem::take(&mut self.contacts);
            for contact in &contacts {
                if self.resolve_pair(nodes, contact.a, contact.b) {
                    corrected += 1;
                }
            }
            self.contacts = contacts;
        }
        corrected
    }

    fn resolve_pair(&self, nodes: &mut [Node], a: usize, b: usize) -> bool {
        let Some(contact) = contact_between(nodes, a, b, self.config.min_separation) else {
            return false;
        };

        let inverse_a = nodes[a].inverse_mass();
        let inverse_b = nodes[b].inverse_mass();
        let inverse_sum = inverse_a + inverse_b;
        if inverse_sum <= 0.0 {
            return false;
        }

        let correction = contact.normal * contact.depth;
        nodes[a].position -= correction * (inverse_a / inverse_sum);
        nodes[b].position += correction * (inverse_b / inverse_sum);

        let relative_velocity = nodes[b].velocity - nodes[a].velocity;
        let approach_speed = relative_velocity.dot(contact.normal);
        if approach_speed < 0.0 {
            let impulse = -(1.0 + self.config.restitution) * approach_speed / inverse_sum;
            nodes[a].velocity -= contact.normal * (impulse * inverse_a);
            nodes[b].velocity += contact.normal * (impulse * inverse_b);

            let friction = self.config.friction.clamp(0.0, 1.0);
            for index in [a, b] {
                if nodes[index].is_force_driven() {
                    nodes[index].velocity *= friction;
                }
            }
        }
        true
    }

    /// Soft variant: overlaps become velocity impulses, positions are untouched.
    pub fn apply_repulsion(&mut self, nodes: &mut [Node], strength: f32) -> usize {
        self.detect(nodes);
        let contacts = std::mem::take(&mut self.contacts);
        for contact in &contacts {
            let impulse = contact.normal * (contact.depth * strength);
            let inverse_a = nodes[contact.a].inverse_mass();
            let inverse_b = nodes[contact.b].inverse_mass();
            nodes[contact.a].velocity -= impulse * inverse_a;
            nodes[contact.b].velocity += impulse * inverse_b;
        }
        let count = contacts.len();
        self.contacts = contacts;
        count
    }

    /// Clamps nodes inside `bounds` shrunk by the boundary margin and reflects
    /// outward velocity. Returns how many nodes were touched.
    pub fn resolve_boundaries(&self, nodes: &mut [Node], bounds: Rect) -> usize {
        if !(bounds.width() > 0.0 && bounds.height() > 0.0) {
            return 0;
        }

        let margin = self.config.boundary_margin.max(0.0);
        let restitution = self.config.boundary_restitution.clamp(0.0, 1.0);
        let mut touched = 0usize;

        for node in nodes.iter_mut().filter(|node| node.is_force_driven()) {
            let inset = margin + node.radius;
            let (min_x, max_x) = axis_limits(bounds.left(), bounds.right(), inset);
            let (min_y, max_y) = axis_limits(bounds.top(), bounds.bottom(), inset);
            let mut hit = false;

            if node.position.x < min_x {
                node.position.x = min_x;
                node.velocity.x = node.velocity.x.abs() * restitution;
                hit = true;
            } else if node.position.x > max_x {
                node.position.x = max_x;
                node.velocity.x = -node.velocity.x.abs() * restitution;
                hit = true;
            }

            if node.position.y < min_y {
                node.position.y = min_y;
                node.velocity.y = node.velocity.y.abs() * restitution;
                hit = true;
            } else if node.position.y > max_y {
                node.position.y = max_y;
                node.velocity.y = -node.velocity.y.abs() * restitution;
                hit = true;
            }

            if hit {
                touched += 1;
            }
        }
        touched
    }
}

fn axis_limits(low: f32, high: f32, inset: f32) -> (f32, f32) {
    let min = low + inset;
    let max = high - inset;
    if min > max {
        let middle = (low + high) * 0.5;
        (middle, middle)
    } else {
        (min, max)
    }
}
