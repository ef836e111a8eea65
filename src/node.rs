use std::collections::HashMap;

use eframe::egui::{Color32, Rect, Vec2, pos2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStyle {
    pub radius: f32,
    pub mass: f32,
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            radius: 22.0,
            mass: 1.0,
        }
    }
}

/// One simulated bubble.
///
/// `pinned`, `dragging` and `throwing` decide who may write position: the force
/// integrator only touches nodes where all three are clear.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub force: Vec2,
    pub mass: f32,
    pub radius: f32,
    pub facet_group: Option<usize>,
    pub pinned: bool,
    pub dragging: bool,
    pub throwing: bool,
}

impl Node {
    pub fn new(id: impl Into<String>, position: Vec2, radius: f32, mass: f32) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(Error::InvalidRadius(radius));
        }
        if !(mass.is_finite() && mass > 0.0) {
            return Err(Error::InvalidMass(mass));
        }

        Ok(Self {
            id: id.into(),
            position,
            velocity: Vec2::ZERO,
            force: Vec2::ZERO,
            mass,
            radius,
            facet_group: None,
            pinned: false,
            dragging: false,
            throwing: false,
        })
    }

    pub fn is_force_driven(&self) -> bool {
        !(self.pinned || self.dragging || self.throwing)
    }

    pub fn inverse_mass(&self) -> f32 {
        if self.is_force_driven() {
            1.0 / self.mass
        } else {
            0.0
        }
    }
}

/// Index-addressed node storage with a stable id lookup.
#[derive(Clone, Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    index_by_id: HashMap<String, usize>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts or replaces the node with the same id, returning its index.
    pub fn insert(&mut self, node: Node) -> usize {
        if let Some(&index) = self.index_by_id.get(&node.id) {
            self.nodes[index] = node;
            return index;
        }
        let index = self.nodes.len();
        self.index_by_id.insert(node.id.clone(), index);
        self.nodes.push(node);
        index
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn require(&self, id: &str) -> Result<usize> {
        self.index_of(id)
            .ok_or_else(|| Error::UnknownNode(id.to_owned()))
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        let index = self.index_of(id)?;
        Some(&mut self.nodes[index])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Keeps only nodes whose id passes `keep`, compacting indices.
    pub fn retain(&mut self, mut keep: impl FnMut(&Node) -> bool) {
        self.nodes.retain(|node| keep(node));
        self.reindex();
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index_by_id.clear();
    }

    pub fn set_pinned(&mut self, id: &str, pinned: bool) -> Result<()> {
        let index = self.require(id)?;
        let node = &mut self.nodes[index];
        node.pinned = pinned;
        if pinned {
            node.velocity = Vec2::ZERO;
        }
        Ok(())
    }

    pub fn zero_velocities(&mut self) {
        for node in &mut self.nodes {
            node.velocity = Vec2::ZERO;
            node.force = Vec2::ZERO;
        }
    }

    /// Bounding box of every bubble including its radius.
    pub fn bounds(&self) -> Option<Rect> {
        let mut iter = self.nodes.iter();
        let first = iter.next()?;
        let mut rect = Rect::from_center_size(
            pos2(first.position.x, first.position.y),
            Vec2::splat(first.radius * 2.0),
        );
        for node in iter {
            rect = rect.union(Rect::from_center_size(
                pos2(node.position.x, node.position.y),
                Vec2::splat(node.radius * 2.0),
            ));
        }
        Some(rect)
    }

    fn reindex(&mut self) {
        self.index_by_id.clear();
        for (index, node) in self.nodes.iter().enumerate() {
            self.index_by_id.insert(node.id.clone(), index);
        }
    }
}

/// Per-tick view of one node for an external renderer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub opacity: f32,
    pub similarity: f32,
    #[serde(skip)]
    pub color: Color32,
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;

    #[test]
    fn rejects_degenerate_geometry() {
        assert!(matches!(
            Node::new("a", Vec2::ZERO, 0.0, 1.0),
            Err(Error::InvalidRadius(_))
        ));
        assert!(matches!(
            Node::new("a", Vec2::ZERO, 4.0, f32::NAN),
            Err(Error::InvalidMass(_))
        ));
    }

    #[test]
    fn retain_keeps_ids_addressable() {
        let mut arena = NodeArena::new();
        for (index, id) in ["a", "b", "c"].into_iter().enumerate() {
            arena
                .insert(Node::new(id, vec2(index as f32, 0.0), 5.0, 1.0).unwrap());
        }
        arena.retain(|node| node.id != "a");

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.index_of("b"), Some(0));
        assert_eq!(arena.get("c").map(|node| node.position.x), Some(2.0));
        assert!(matches!(arena.require("a"), Err(Error::UnknownNode(_))));
    }

    #[test]
    fn flags_remove_nodes_from_force_integration() {
        let mut node = Node::new("a", Vec2::ZERO, 5.0, 2.0).unwrap();
        assert_eq!(node.inverse_mass(), 0.5);
        node.dragging = true;
        assert!(!node.is_force_driven());
        assert_eq!(node.inverse_mass(), 0.0);
    }

    #[test]
    fn bounds_cover_radii() {
        let mut arena = NodeArena::new();
        arena.insert(Node::new("a", vec2(0.0, 0.0), 10.0, 1.0).unwrap());
        arena.insert(Node::new("b", vec2(100.0, 50.0), 5.0, 1.0).unwrap());
        let bounds = arena.bounds().unwrap();
        assert_eq!(bounds.min, pos2(-10.0, -10.0));
        assert_eq!(bounds.max, pos2(105.0, 55.0));
    }
}
