use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};
use std::panic::{AssertUnwindSafe, catch_unwind};

use eframe::egui::{Color32, Pos2, Vec2, vec2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::color::connection_color;
use crate::node::NodeArena;
use crate::similarity::SimilarityMatrix;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveStyle {
    #[default]
    Straight,
    Bezier,
    Spring,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub min_strength: f32,
    pub max_connections: usize,
    /// Screen distance in pixels under which a pointer hits a connection.
    pub hit_threshold: f32,
    pub curve: CurveStyle,
    /// Control-point offset as a fraction of the segment length.
    pub bezier_offset: f32,
    pub spring_waves: f32,
    pub spring_amplitude: f32,
    pub curve_samples: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            min_strength: 0.3,
            max_connections: 400,
            hit_threshold: 6.0,
            curve: CurveStyle::Straight,
            bezier_offset: 0.2,
            spring_waves: 5.0,
            spring_amplitude: 6.0,
            curve_samples: 24,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Both endpoints share a facet group.
    Cluster,
    /// Endpoints sit in different groups (or have none).
    Bridge,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub source: String,
    pub target: String,
    pub strength: f32,
    pub kind: ConnectionKind,
    pub color: Color32,
}

impl Connection {
    fn joins(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    pub fn stroke_width(&self) -> f32 {
        0.8 + self.strength.clamp(0.0, 1.0) * 2.4
    }

    pub fn opacity(&self) -> f32 {
        0.25 + self.strength.clamp(0.0, 1.0) * 0.65
    }
}

/// Parametric shape of a connection, handed to the renderer for sampling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConnectionCurve {
    Straight {
        from: Pos2,
        to: Pos2,
    },
    Bezier {
        from: Pos2,
        control: Pos2,
        to: Pos2,
    },
    Spring {
        from: Pos2,
        to: Pos2,
        amplitude: f32,
        waves: f32,
        phase: f32,
    },
}

fn unit_normal(from: Pos2, to: Pos2) -> Vec2 {
    let delta = to - from;
    let length = delta.length();
    if length <= f32::EPSILON {
        return Vec2::ZERO;
    }
    vec2(-delta.y, delta.x) / length
}

impl ConnectionCurve {
    pub fn bezier(from: Pos2, to: Pos2, offset_ratio: f32) -> Self {
        let length = (to - from).length();
        let control = from.lerp(to, 0.5) + unit_normal(from, to) * (length * offset_ratio);
        Self::Bezier { from, control, to }
    }

    pub fn spring(
        from: Pos2,
        to: Pos2,
        strength: f32,
        amplitude: f32,
        waves: f32,
        phase: f32,
    ) -> Self {
        Self::Spring {
            from,
            to,
            amplitude: amplitude * strength.clamp(0.0, 1.0),
            waves,
            phase,
        }
    }

    pub fn point_at(&self, t: f32) -> Pos2 {
        let t = t.clamp(0.0, 1.0);
        match *self {
            Self::Straight { from, to } => from.lerp(to, t),
            Self::Bezier { from, control, to } => {
                let inverse = 1.0 - t;
                let weighted = from.to_vec2() * (inverse * inverse)
                    + control.to_vec2() * (2.0 * inverse * t)
                    + to.to_vec2() * (t * t);
                weighted.to_pos2()
            }
            Self::Spring {
                from,
                to,
                amplitude,
                waves,
                phase,
            } => {
                let envelope = (t * PI).sin();
                let offset = (t * waves * TAU + phase).sin() * amplitude * envelope;
                from.lerp(to, t) + unit_normal(from, to) * offset
            }
        }
    }

    /// Polyline approximation; a straight curve is always its two endpoints.
    pub fn sample(&self, segments: usize) -> Vec<Pos2> {
        if let Self::Straight { from, to } = *self {
            return vec![from, to];
        }
        let segments = segments.max(2);
        (0..=segments)
            .map(|step| self.point_at(step as f32 / segments as f32))
            .collect()
    }
}

pub fn point_segment_distance(point: Pos2, start: Pos2, end: Pos2) -> f32 {
    let segment = end - start;
    let length_sq = segment.length_sq();
    if length_sq <= f32::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(segment) / length_sq).clamp(0.0, 1.0);
    point.distance(start + segment * t)
}

pub type FilterError = Box<dyn std::error::Error + Send + Sync>;
type ConnectionFilter = Box<dyn Fn(&Connection) -> Result<bool, FilterError>>;

/// Filtered, FIFO-capped set of renderable connections.
pub struct ConnectionModel {
    config: ConnectionConfig,
    connections: VecDeque<Connection>,
    filter: Option<ConnectionFilter>,
}

impl ConnectionModel {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            connections: VecDeque::new(),
            filter: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ConnectionConfig) {
        self.config = config;
        while self.connections.len() > self.config.max_connections {
            self.connections.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn clear(&mut self) {
        self.connections.clear();
    }

    /// Installs a predicate every candidate must pass. Errors and panics inside
    /// it exclude that one candidate and are logged.
    pub fn set_filter(
        &mut self,
        filter: impl Fn(&Connection) -> Result<bool, FilterError> + 'static,
    ) {
        self.filter = Some(Box::new(filter));
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    fn passes_filter(&self, connection: &Connection) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        match catch_unwind(AssertUnwindSafe(|| filter(connection))) {
            Ok(Ok(keep)) => keep,
            Ok(Err(error)) => {
                warn!(
                    source = %connection.source,
                    target = %connection.target,
                    %error,
                    "connection filter failed"
                );
                false
            }
            Err(_) => {
                warn!(
                    source = %connection.source,
                    target = %connection.target,
                    "connection filter panicked"
                );
                false
            }
        }
    }

    /// Adds or refreshes a connection. Returns `false` when it was rejected.
    pub fn add(&mut self, connection: Connection) -> bool {
        if !(connection.strength.is_finite() && connection.strength >= self.config.min_strength) {
            return false;
        }
        if connection.source == connection.target || !self.passes_filter(&connection) {
            return false;
        }

        if let Some(existing) = self
            .connections
            .iter_mut()
            .find(|existing| existing.joins(&connection.source, &connection.target))
        {
            *existing = connection;
            return true;
        }

        if self.config.max_connections == 0 {
            return false;
        }
        while self.connections.len() >= self.config.max_connections {
            if let Some(evicted) = self.connections.pop_front() {
                trace!(source = %evicted.source, target = %evicted.target, "evicted connection");
            }
        }
        self.connections.push_back(connection);
        true
    }

    /// Replaces the set from a similarity matrix. Candidates are inserted
    /// weakest first, so capacity eviction drops the weakest links.
    pub fn rebuild(&mut self, matrix: &SimilarityMatrix, arena: &NodeArena) -> usize {
        self.connections.clear();

        let ids = matrix.ids();
        let mut candidates = Vec::new();
        for (i, j, strength) in matrix.pairs_above(0.0) {
            if strength < self.config.min_strength {
                continue;
            }
            let (Some(source), Some(target)) = (arena.get(&ids[i]), arena.get(&ids[j])) else {
                continue;
            };
            let kind = if source.facet_group.is_some() && source.facet_group == target.facet_group {
                ConnectionKind::Cluster
            } else {
                ConnectionKind::Bridge
            };
            candidates.push(Connection {
                source: source.id.clone(),
                target: target.id.clone(),
                strength,
                kind,
                color: connection_color(source.facet_group, target.facet_group),
            });
        }
        candidates.sort_by(|a, b| a.strength.total_cmp(&b.strength));

        for candidate in candidates {
            self.add(candidate);
        }
        debug!(connections = self.connections.len(), "rebuilt connections");
        self.connections.len()
    }

    pub fn curve(
        &self,
        connection: &Connection,
        from: Pos2,
        to: Pos2,
        phase: f32,
    ) -> ConnectionCurve {
        match self.config.curve {
            CurveStyle::Straight => ConnectionCurve::Straight { from, to },
            CurveStyle::Bezier => ConnectionCurve::bezier(from, to, self.config.bezier_offset),
            CurveStyle::Spring => ConnectionCurve::spring(
                from,
                to,
                connection.strength,
                self.config.spring_amplitude,
                self.config.spring_waves,
                phase,
            ),
        }
    }

    /// Nearest connection within `hit_threshold` of `point`, with endpoints
    /// resolved through `position_of` (usually screen-space).
    pub fn hit_test(
        &self,
        point: Pos2,
        phase: f32,
        position_of: impl Fn(&str) -> Option<Pos2>,
    ) -> Option<&Connection> {
        let mut best: Option<(&Connection, f32)> = None;

        for connection in &self.connections {
            let (Some(from), Some(to)) = (
                position_of(&connection.source),
                position_of(&connection.target),
            ) else {
                continue;
            };
            let polyline = self
                .curve(connection, from, to, phase)
                .sample(self.config.curve_samples);
            let distance = polyline
                .windows(2)
                .map(|segment| point_segment_distance(point, segment[0], segment[1]))
                .fold(f32::INFINITY, f32::min);

            if distance < self.config.hit_threshold
                && best.is_none_or(|(_, best_distance)| distance < best_distance)
            {
                best = Some((connection, distance));
            }
        }
        best.map(|(connection, _)| connection)
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;
    use serde_json::json;

    use super::*;
    use crate::entity::Entity;
    use crate::node::Node;
    use crate::similarity::SimilarityEngine;

    fn connection(source: &str, target: &str, strength: f32) -> Connection {
        Connection {
            source: source.to_owned(),
            target: target.to_owned(),
            strength,
            kind: ConnectionKind::Bridge,
            color: Color32::WHITE,
        }
    }

    fn model(max_connections: usize) -> ConnectionModel {
        ConnectionModel::new(ConnectionConfig {
            max_connections,
            ..ConnectionConfig::default()
        })
    }

    #[test]
    fn weak_connections_are_never_added() {
        let mut model = model(10);
        assert!(!model.add(connection("a", "b", 0.1)));
        assert!(!model.add(connection("a", "b", f32::NAN)));
        assert!(model.add(connection("a", "b", 0.3)));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut model = model(2);
        model.add(connection("a", "b", 0.9));
        model.add(connection("b", "c", 0.5));
        model.add(connection("c", "d", 0.4));

        let pairs = model
            .iter()
            .map(|c| (c.source.as_str(), c.target.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(pairs, vec![("b", "c"), ("c", "d")]);
    }

    #[test]
    fn re_adding_a_pair_updates_in_place() {
        let mut model = model(4);
        model.add(connection("a", "b", 0.4));
        model.add(connection("b", "a", 0.8));
        assert_eq!(model.len(), 1);
        assert_eq!(model.iter().next().map(|c| c.strength), Some(0.8));
    }

    #[test]
    fn failing_filter_skips_only_that_candidate() {
        let mut model = model(4);
        model.set_filter(|connection| {
            if connection.source == "bad" {
                return Err("boom".into());
            }
            if connection.source == "panic" {
                panic!("filter exploded");
            }
            Ok(true)
        });

        assert!(!model.add(connection("bad", "x", 0.9)));
        assert!(!model.add(connection("panic", "x", 0.9)));
        assert!(model.add(connection("good", "x", 0.9)));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn rebuild_keeps_strongest_when_capped() {
        let entities = vec![
            Entity::new("a").with_facet("tags", json!(["x", "y"])).with_facet("era", json!("old")),
            Entity::new("b").with_facet("tags", json!(["x"])).with_facet("era", json!("old")),
            Entity::new("c").with_facet("tags", json!(["x", "y"])).with_facet("era", json!("new")),
        ];
        let facets = vec!["tags".to_owned(), "era".to_owned()];
        let matrix = SimilarityEngine::default().calculate_matrix(&entities, &facets);

        let mut arena = NodeArena::new();
        for (index, entity) in entities.iter().enumerate() {
            let position = vec2(index as f32 * 50.0, 0.0);
            let mut node = Node::new(&entity.id, position, 10.0, 1.0).unwrap();
            node.facet_group = Some(if entity.id == "c" { 1 } else { 0 });
            arena.insert(node);
        }

        let mut model = model(1);
        assert_eq!(model.rebuild(&matrix, &arena), 1);
        let kept = model.iter().next().unwrap();
        assert_eq!((kept.source.as_str(), kept.target.as_str()), ("a", "b"));
        assert_eq!(kept.strength, 1.0);
        assert_eq!(kept.kind, ConnectionKind::Cluster);
    }

    #[test]
    fn segment_distance_handles_endpoints_and_degenerate_segments() {
        let start = pos2(0.0, 0.0);
        let end = pos2(10.0, 0.0);
        assert_eq!(point_segment_distance(pos2(5.0, 3.0), start, end), 3.0);
        assert_eq!(point_segment_distance(pos2(13.0, 4.0), start, end), 5.0);
        assert_eq!(point_segment_distance(pos2(3.0, 4.0), start, start), 5.0);
    }

    #[test]
    fn hit_test_picks_nearest_within_threshold() {
        let mut model = model(4);
        model.add(connection("a", "b", 0.9));
        model.add(connection("a", "c", 0.9));
        let position_of = |id: &str| match id {
            "a" => Some(pos2(0.0, 0.0)),
            "b" => Some(pos2(100.0, 0.0)),
            "c" => Some(pos2(0.0, 100.0)),
            _ => None,
        };

        let hit = model.hit_test(pos2(50.0, 4.0), 0.0, position_of);
        assert_eq!(hit.map(|c| c.target.as_str()), Some("b"));
        assert!(model.hit_test(pos2(50.0, 50.0), 0.0, position_of).is_none());
    }

    #[test]
    fn curves_start_and_end_at_endpoints() {
        let from = pos2(0.0, 0.0);
        let to = pos2(100.0, 0.0);
        for curve in [
            ConnectionCurve::bezier(from, to, 0.2),
            ConnectionCurve::spring(from, to, 0.8, 6.0, 5.0, 1.3),
        ] {
            let points = curve.sample(16);
            assert_eq!(points.len(), 17);
            assert!(points[0].distance(from) < 1e-3);
            assert!(points[16].distance(to) < 1e-3);
        }

        let ConnectionCurve::Bezier { control, .. } = ConnectionCurve::bezier(from, to, 0.2) else {
            unreachable!();
        };
        assert_eq!(control, pos2(50.0, 20.0));
    }

    #[test]
    fn spring_displacement_scales_with_strength() {
        let from = pos2(0.0, 0.0);
        let to = pos2(100.0, 0.0);
        let weak = ConnectionCurve::spring(from, to, 0.2, 10.0, 1.0, 0.0);
        let strong = ConnectionCurve::spring(from, to, 1.0, 10.0, 1.0, 0.0);
        assert!(strong.point_at(0.25).y.abs() > weak.point_at(0.25).y.abs());
    }
}
