use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionConfig;
use crate::drag::DragConfig;
use crate::error::{Error, Result};
use crate::events::DEFAULT_NOTIFICATION_CAPACITY;
use crate::node::NodeStyle;
use crate::physics::{CollisionConfig, PhysicsConfig, RepulsionMode};
use crate::similarity::SimilarityConfig;
use crate::viewport::ViewportConfig;

/// Every tunable of the engine and its controllers. Missing JSON fields fall
/// back to their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub physics: PhysicsConfig,
    pub collision: CollisionConfig,
    pub connections: ConnectionConfig,
    pub viewport: ViewportConfig,
    pub drag: DragConfig,
    pub similarity: SimilarityConfig,
    pub node: NodeStyle,
    pub notification_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            collision: CollisionConfig::default(),
            connections: ConnectionConfig::default(),
            viewport: ViewportConfig::default(),
            drag: DragConfig::default(),
            similarity: SimilarityConfig::default(),
            node: NodeStyle::default(),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfig(message.into())
}

fn require_non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and >= 0, got {value}")))
    }
}

fn require_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must lie in [0, 1], got {value}")))
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let physics = &self.physics;
        for (name, value) in [
            ("physics.repulsion_strength", physics.repulsion_strength),
            ("physics.attraction_strength", physics.attraction_strength),
            ("physics.gravity_strength", physics.gravity_strength),
            ("physics.boundary_margin", physics.boundary_margin),
            ("physics.boundary_strength", physics.boundary_strength),
            ("physics.cluster_strength", physics.cluster_strength),
            ("physics.max_velocity", physics.max_velocity),
            ("physics.min_temperature", physics.min_temperature),
        ] {
            require_non_negative(name, value)?;
        }
        require_unit("physics.damping", physics.damping)?;
        require_unit("physics.edge_threshold", physics.edge_threshold)?;
        if !(physics.cooling_rate > 0.0 && physics.cooling_rate < 1.0) {
            return Err(invalid(format!(
                "physics.cooling_rate must lie in (0, 1), got {}",
                physics.cooling_rate
            )));
        }
        if let RepulsionMode::BarnesHut { theta } = physics.repulsion_mode {
            if !(theta.is_finite() && theta > 0.0) {
                return Err(invalid(format!("barnes-hut theta must be > 0, got {theta}")));
            }
        }

        let collision = &self.collision;
        if !(collision.cell_size.is_finite() && collision.cell_size > 0.0) {
            return Err(invalid(format!(
                "collision.cell_size must be > 0, got {}",
                collision.cell_size
            )));
        }
        require_non_negative("collision.min_separation", collision.min_separation)?;
        require_non_negative("collision.boundary_margin", collision.boundary_margin)?;
        require_unit("collision.restitution", collision.restitution)?;
        require_unit("collision.friction", collision.friction)?;
        require_unit("collision.boundary_restitution", collision.boundary_restitution)?;

        let connections = &self.connections;
        require_unit("connections.min_strength", connections.min_strength)?;
        require_non_negative("connections.hit_threshold", connections.hit_threshold)?;
        if connections.max_connections == 0 {
            return Err(invalid("connections.max_connections must be at least 1"));
        }
        if connections.curve_samples < 2 {
            return Err(invalid("connections.curve_samples must be at least 2"));
        }

        let viewport = &self.viewport;
        if !(viewport.min_zoom.is_finite() && viewport.min_zoom > 0.0) {
            return Err(invalid(format!(
                "viewport.min_zoom must be > 0, got {}",
                viewport.min_zoom
            )));
        }
        if !(viewport.max_zoom.is_finite() && viewport.max_zoom >= viewport.min_zoom) {
            return Err(invalid(format!(
                "viewport.max_zoom ({}) must be >= min_zoom ({})",
                viewport.max_zoom, viewport.min_zoom
            )));
        }
        require_unit("viewport.smoothing", viewport.smoothing)?;
        if !(viewport.zoom_step.is_finite() && viewport.zoom_step > 1.0) {
            return Err(invalid(format!(
                "viewport.zoom_step must be > 1, got {}",
                viewport.zoom_step
            )));
        }

        let drag = &self.drag;
        if let Some(grid) = drag.grid_snap {
            if !(grid.is_finite() && grid > 0.0) {
                return Err(invalid(format!("drag.grid_snap must be > 0, got {grid}")));
            }
        }
        require_non_negative("drag.throw_threshold", drag.throw_threshold)?;
        require_non_negative("drag.stop_speed", drag.stop_speed)?;
        require_unit("drag.friction", drag.friction)?;
        if drag.history_len < 2 {
            return Err(invalid("drag.history_len must be at least 2"));
        }

        require_unit("similarity.array_threshold", self.similarity.array_threshold)?;
        require_unit("similarity.object_threshold", self.similarity.object_threshold)?;

        if !(self.node.radius.is_finite() && self.node.radius > 0.0) {
            return Err(Error::InvalidRadius(self.node.radius));
        }
        if !(self.node.mass.is_finite() && self.node.mass > 0.0) {
            return Err(Error::InvalidMass(self.node.mass));
        }
        if self.notification_capacity == 0 {
            return Err(invalid("notification_capacity must be at least 1"));
        }
        Ok(())
    }
}
