//! Similarity-clustered bubble layout: facet similarity scoring, a
//! force-directed simulation with grid-based collision handling, connection
//! curves, and the viewport and drag controllers that sit beside it.
//!
//! The engine never owns a timer or a renderer. Hosts call
//! [`BubbleEngine::step`] once per frame and read [`BubbleEngine::snapshots`].

pub mod color;
pub mod config;
pub mod connection;
pub mod drag;
pub mod engine;
pub mod entity;
pub mod error;
pub mod events;
pub mod node;
pub mod physics;
pub mod placement;
pub mod similarity;
pub mod viewport;

pub use config::EngineConfig;
pub use connection::{Connection, ConnectionCurve, ConnectionModel};
pub use drag::{DragConfig, DragController};
pub use engine::BubbleEngine;
pub use entity::Entity;
pub use error::{Error, Result};
pub use events::{EventSink, Notification, NotificationReceiver, Notifier, channel};
pub use node::{Node, NodeArena, NodeSnapshot};
pub use physics::{ForceLayout, PhysicsConfig, SpatialCollisionGrid};
pub use placement::JitterSource;
pub use similarity::{SimilarityEngine, SimilarityMatrix};
pub use viewport::{ViewportController, ViewportKey};
