use std::collections::{BTreeSet, HashSet};

use eframe::egui::{Rect, Vec2, vec2};
use tracing::{debug, info};

use crate::color::cluster_color;
use crate::config::EngineConfig;
use crate::connection::ConnectionModel;
use crate::entity::{Entity, facet_group_key};
use crate::error::{Error, Result};
use crate::events::Notifier;
use crate::node::{Node, NodeArena, NodeSnapshot};
use crate::physics::{
    Convergence, ForceLayout, PhysicsConfig, SpatialCollisionGrid, edges_from_matrix,
};
use crate::placement::{JitterSource, clear_position, ring_position};
use crate::similarity::{SimilarityEngine, SimilarityMatrix};

const DEFAULT_VIEWPORT: Vec2 = vec2(800.0, 600.0);
const FIXED_STEP_SECONDS: f32 = 1.0 / 60.0;

/// Snapshot opacity of an entity with zero similarity to the focus.
const UNFOCUSED_OPACITY: f32 = 0.25;

/// Owns the working set and keeps the matrix, layout edges and connections in
/// sync with it. Drag and viewport controllers stay outside and borrow the
/// arena between ticks.
pub struct BubbleEngine {
    config: EngineConfig,
    similarity: SimilarityEngine,
    entities: Vec<Entity>,
    active_facets: Vec<String>,
    matrix: SimilarityMatrix,
    arena: NodeArena,
    layout: ForceLayout,
    connections: ConnectionModel,
    jitter: JitterSource,
    focus: Option<String>,
    group_labels: Vec<String>,
}

impl BubbleEngine {
    pub fn new(config: EngineConfig, jitter: JitterSource, notifier: Notifier) -> Result<Self> {
        config.validate()?;

        let similarity = SimilarityEngine::new(config.similarity.clone());
        let matrix = similarity.calculate_matrix(&[], &[]);
        let layout = ForceLayout::new(
            config.physics.clone(),
            SpatialCollisionGrid::new(config.collision.clone()),
            DEFAULT_VIEWPORT,
            notifier,
        );
        let connections = ConnectionModel::new(config.connections.clone());

        Ok(Self {
            config,
            similarity,
            entities: Vec::new(),
            active_facets: Vec::new(),
            matrix,
            arena: NodeArena::new(),
            layout,
            connections,
            jitter,
            focus: None,
            group_labels: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Oldest activation first.
    pub fn active_facets(&self) -> &[String] {
        &self.active_facets
    }

    pub fn matrix(&self) -> &SimilarityMatrix {
        &self.matrix
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    pub fn connections(&self) -> &ConnectionModel {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut ConnectionModel {
        &mut self.connections
    }

    pub fn layout(&self) -> &ForceLayout {
        &self.layout
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// Facet group labels; a node's `facet_group` indexes into this list.
    pub fn group_labels(&self) -> &[String] {
        &self.group_labels
    }

    /// Replaces the working set. Surviving ids keep their positions, new ids
    /// are seeded on a ring around the viewport centre.
    pub fn set_entities(&mut self, entities: Vec<Entity>) -> Result<()> {
        let mut seen = HashSet::with_capacity(entities.len());
        for entity in &entities {
            if !seen.insert(entity.id.as_str()) {
                return Err(Error::DuplicateEntity(entity.id.clone()));
            }
        }

        let before = self.arena.len();
        self.arena.retain(|node| seen.contains(node.id.as_str()));
        let departed = before - self.arena.len();

        let arrivals = entities
            .iter()
            .filter(|entity| self.arena.index_of(&entity.id).is_none())
            .map(|entity| entity.id.clone())
            .collect::<Vec<_>>();
        let center = self.layout.viewport() * 0.5;
        let style = self.config.node;
        let clearance = self.config.collision.min_separation;
        let mut occupied = self
            .arena
            .iter()
            .map(|node| (node.position, node.radius))
            .collect::<Vec<_>>();
        for (index, id) in arrivals.iter().enumerate() {
            let preferred =
                ring_position(index, arrivals.len(), center, style.radius, &mut self.jitter);
            let position = clear_position(preferred, style.radius, clearance, &occupied);
            self.arena
                .insert(Node::new(id.as_str(), position, style.radius, style.mass)?);
            occupied.push((position, style.radius));
        }

        if self
            .focus
            .as_deref()
            .is_some_and(|focus| self.arena.index_of(focus).is_none())
        {
            self.focus = None;
        }

        self.entities = entities;
        info!(
            entities = self.entities.len(),
            added = arrivals.len(),
            removed = departed,
            "working set replaced"
        );
        self.rebuild();
        Ok(())
    }

    /// Sets the active facets, oldest activation first. Repeats keep their
    /// first position.
    pub fn set_active_facets(&mut self, facets: Vec<String>) {
        let mut seen = HashSet::new();
        self.active_facets = facets
            .into_iter()
            .filter(|facet| seen.insert(facet.clone()))
            .collect();
        self.rebuild();
    }

    /// Activates `facet` as the most recent one, or deactivates it when it is
    /// already active.
    pub fn toggle_facet(&mut self, facet: &str) {
        let mut facets = self.active_facets.clone();
        if let Some(position) = facets.iter().position(|active| active == facet) {
            facets.remove(position);
        } else {
            facets.push(facet.to_owned());
        }
        self.set_active_facets(facets);
    }

    /// Every facet name present on at least one entity, sorted.
    pub fn available_facets(&self) -> Vec<String> {
        self.entities
            .iter()
            .flat_map(|entity| entity.facets.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn set_viewport_size(&mut self, size: Vec2) {
        if !(size.x > 0.0 && size.y > 0.0) || size == self.layout.viewport() {
            return;
        }
        debug!(width = size.x, height = size.y, "viewport resized");
        self.layout.set_viewport(size, self.arena.nodes_mut());
    }

    pub fn set_physics_config(&mut self, config: PhysicsConfig) {
        let threshold_changed = config.edge_threshold != self.layout.config().edge_threshold;
        self.config.physics = config.clone();
        self.layout.set_config(config);
        if threshold_changed {
            let threshold = self.config.physics.edge_threshold;
            let edges = edges_from_matrix(&self.matrix, &self.arena, threshold);
            self.layout.set_edges(edges);
        }
    }

    pub fn set_focus(&mut self, focus: Option<&str>) -> Result<()> {
        if let Some(id) = focus {
            self.arena.require(id)?;
        }
        self.focus = focus.map(str::to_owned);
        Ok(())
    }

    /// One simulation tick. Returns whether the simulation is still running.
    pub fn step(&mut self, delta_seconds: f32) -> bool {
        self.layout.step(self.arena.nodes_mut(), delta_seconds)
    }

    pub fn run_until_stable(&mut self, max_steps: u64) -> Convergence {
        let convergence = self.layout.run_until_stable(
            self.arena.nodes_mut(),
            max_steps,
            FIXED_STEP_SECONDS,
        );
        if !convergence.stable {
            info!(steps = convergence.steps, "no equilibrium within step budget");
        }
        convergence
    }

    /// Wakes the simulation without zeroing velocities.
    pub fn reheat(&mut self, temperature: f32) {
        self.layout.reheat(temperature);
    }

    pub fn is_running(&self) -> bool {
        !self.layout.state().is_stable && !self.arena.is_empty()
    }

    pub fn content_bounds(&self) -> Option<Rect> {
        self.arena.bounds()
    }

    pub fn snapshots(&self) -> Vec<NodeSnapshot> {
        self.arena
            .iter()
            .map(|node| {
                let similarity = match &self.focus {
                    Some(focus) => self.matrix.get(focus, &node.id).unwrap_or(0.0),
                    None => 1.0,
                };
                NodeSnapshot {
                    id: node.id.clone(),
                    x: node.position.x,
                    y: node.position.y,
                    size: node.radius * 2.0,
                    opacity: UNFOCUSED_OPACITY + (1.0 - UNFOCUSED_OPACITY) * similarity,
                    similarity,
                    color: cluster_color(node.facet_group),
                }
            })
            .collect()
    }

    /// Recomputes everything derived from entities and facets, then restarts.
    fn rebuild(&mut self) {
        self.matrix = self
            .similarity
            .calculate_matrix(&self.entities, &self.active_facets);
        self.assign_groups();

        let threshold = self.config.physics.edge_threshold;
        let edges = edges_from_matrix(&self.matrix, &self.arena, threshold);
        debug!(
            facets = self.active_facets.len(),
            edges = edges.len(),
            "similarity matrix rebuilt"
        );
        self.layout.set_edges(edges);
        self.connections.rebuild(&self.matrix, &self.arena);
        self.layout.restart(self.arena.nodes_mut());
    }

    fn assign_groups(&mut self) {
        let keys = self
            .entities
            .iter()
            .map(|entity| (entity.id.as_str(), facet_group_key(entity, &self.active_facets)))
            .collect::<Vec<_>>();
        self.group_labels = keys
            .iter()
            .filter_map(|(_, key)| key.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        for (id, key) in keys {
            let Some(node) = self.arena.get_mut(id) else {
                continue;
            };
            node.facet_group = key.and_then(|key| self.group_labels.binary_search(&key).ok());
        }
    }
}
