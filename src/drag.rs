use std::collections::{BTreeSet, VecDeque};

use eframe::egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::Result;
use crate::events::{Notification, Notifier};
use crate::node::NodeArena;

/// A release this long after the last pointer sample counts as a standstill.
const STALE_RELEASE_SECONDS: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DragBounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl DragBounds {
    pub fn from_size(size: Vec2) -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: size.x,
            max_y: size.y,
        }
    }

    /// Clamps a bubble centre so the whole circle stays inside.
    fn clamp(&self, position: Vec2, radius: f32) -> Vec2 {
        let clamp_axis = |value: f32, min: f32, max: f32| {
            let (low, high) = (min + radius, max - radius);
            if low > high {
                (min + max) * 0.5
            } else {
                value.clamp(low, high)
            }
        };
        vec2(
            clamp_axis(position.x, self.min_x, self.max_x),
            clamp_axis(position.y, self.min_y, self.max_y),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    pub grid_snap: Option<f32>,
    pub bounds: Option<DragBounds>,
    pub throw_enabled: bool,
    /// Release speed in px/s above which a throw starts.
    pub throw_threshold: f32,
    /// Velocity multiplier per 60 Hz frame while thrown.
    pub friction: f32,
    pub bounce: f32,
    pub stop_speed: f32,
    pub history_len: usize,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            grid_snap: None,
            bounds: None,
            throw_enabled: true,
            throw_threshold: 120.0,
            friction: 0.92,
            bounce: -0.7,
            stop_speed: 6.0,
            history_len: 5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Sample {
    position: Vec2,
    time: f64,
}

#[derive(Debug)]
struct DragSession {
    primary: String,
    /// Each dragged id with its offset from the pointer at grab time.
    members: Vec<(String, Vec2)>,
    history: VecDeque<Sample>,
}

impl DragSession {
    fn ids(&self) -> Vec<String> {
        self.members.iter().map(|(id, _)| id.clone()).collect()
    }

    fn primary_offset(&self) -> Vec2 {
        self.members
            .iter()
            .find(|(id, _)| *id == self.primary)
            .map_or(Vec2::ZERO, |(_, offset)| *offset)
    }

    /// Velocity in px/s between the two latest samples.
    fn release_velocity(&self, release_time: f64) -> Vec2 {
        let count = self.history.len();
        if count < 2 {
            return Vec2::ZERO;
        }
        let (before, last) = (self.history[count - 2], self.history[count - 1]);
        let elapsed = last.time - before.time;
        if elapsed <= f64::EPSILON || release_time - last.time > STALE_RELEASE_SECONDS {
            return Vec2::ZERO;
        }
        let velocity = (last.position - before.position) / elapsed as f32;
        if velocity.x.is_finite() && velocity.y.is_finite() {
            velocity
        } else {
            Vec2::ZERO
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Throw {
    id: String,
    velocity: Vec2,
}

/// Pointer-driven repositioning plus the momentum animation that follows a
/// fast release.
pub struct DragController {
    config: DragConfig,
    notifier: Notifier,
    selection: BTreeSet<String>,
    session: Option<DragSession>,
    throws: Vec<Throw>,
}

impl DragController {
    pub fn new(config: DragConfig, notifier: Notifier) -> Self {
        Self {
            config,
            notifier,
            selection: BTreeSet::new(),
            session: None,
            throws: Vec::new(),
        }
    }

    pub fn config(&self) -> &DragConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DragConfig) {
        self.config = config;
    }

    pub fn set_bounds(&mut self, bounds: Option<DragBounds>) {
        self.config.bounds = bounds;
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_throwing(&self) -> bool {
        !self.throws.is_empty()
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Grabs `id` at `pointer`. With `additive` the node joins the current
    /// selection and the whole selection moves together.
    pub fn pointer_down(
        &mut self,
        arena: &mut NodeArena,
        id: &str,
        pointer: Vec2,
        time: f64,
        additive: bool,
    ) -> Result<()> {
        let index = arena.require(id)?;
        if self.session.is_some() {
            self.cancel(arena);
        }
        let pointer = if pointer.is_finite() {
            pointer
        } else {
            arena.nodes()[index].position
        };

        if additive {
            self.selection.insert(id.to_owned());
        } else if !self.selection.contains(id) {
            self.selection.clear();
            self.selection.insert(id.to_owned());
        }
        self.selection.retain(|selected| arena.index_of(selected).is_some());

        let mut members = Vec::with_capacity(self.selection.len());
        for selected in &self.selection {
            let Some(node) = arena.get_mut(selected) else {
                continue;
            };
            node.dragging = true;
            node.throwing = false;
            node.velocity = Vec2::ZERO;
            members.push((selected.clone(), node.position - pointer));
        }
        self.throws
            .retain(|throw| !members.iter().any(|(member, _)| *member == throw.id));

        let mut history = VecDeque::with_capacity(self.config.history_len.max(2));
        let grabbed = arena.get(id).map_or(pointer, |node| node.position);
        history.push_back(Sample {
            position: grabbed,
            time,
        });

        let session = DragSession {
            primary: id.to_owned(),
            members,
            history,
        };
        debug!(id, members = session.members.len(), "drag started");
        self.notifier.notify(Notification::DragStart {
            ids: session.ids(),
            x: grabbed.x,
            y: grabbed.y,
        });
        self.session = Some(session);
        Ok(())
    }

    /// Moves every dragged node to follow `pointer`. Returns `false` when no
    /// drag is in progress or the sample is not finite.
    pub fn pointer_move(&mut self, arena: &mut NodeArena, pointer: Vec2, time: f64) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !(pointer.is_finite() && time.is_finite()) {
            trace!(?pointer, time, "non-finite pointer sample ignored");
            return false;
        }

        let unsnapped = pointer + session.primary_offset();
        let snapped = match self.config.grid_snap {
            Some(grid) if grid > 0.0 => (unsnapped / grid).round() * grid,
            _ => unsnapped,
        };
        let snap_shift = snapped - unsnapped;

        let mut primary_position = snapped;
        for (id, offset) in &session.members {
            let Some(node) = arena.get_mut(id) else {
                continue;
            };
            let mut position = pointer + *offset + snap_shift;
            if let Some(bounds) = &self.config.bounds {
                position = bounds.clamp(position, node.radius);
            }
            if !position.is_finite() {
                continue;
            }
            node.position = position;
            node.velocity = Vec2::ZERO;
            if *id == session.primary {
                primary_position = position;
            }
        }

        session.history.push_back(Sample {
            position: primary_position,
            time,
        });
        while session.history.len() > self.config.history_len.max(2) {
            session.history.pop_front();
        }

        self.notifier.notify(Notification::DragMove {
            ids: session.ids(),
            x: primary_position.x,
            y: primary_position.y,
        });
        true
    }

    /// Ends the drag. Returns the throw velocity (px/s) when a throw started.
    pub fn pointer_up(&mut self, arena: &mut NodeArena, time: f64) -> Option<Vec2> {
        let session = self.session.take()?;
        let velocity = session.release_velocity(time);
        let speed = velocity.length();
        let throws = self.config.throw_enabled && speed > self.config.throw_threshold;

        for (id, _) in &session.members {
            let Some(node) = arena.get_mut(id) else {
                continue;
            };
            node.dragging = false;
            node.velocity = Vec2::ZERO;
            if throws && !node.pinned {
                node.throwing = true;
                self.throws.push(Throw {
                    id: id.clone(),
                    velocity,
                });
            }
        }

        let released = arena
            .get(&session.primary)
            .map_or(Vec2::ZERO, |node| node.position);
        self.notifier.notify(Notification::DragEnd {
            ids: session.ids(),
            x: released.x,
            y: released.y,
        });

        if !throws {
            debug!(id = %session.primary, speed, "drag released");
            return None;
        }
        debug!(id = %session.primary, speed, "drag thrown");
        self.notifier.notify(Notification::Throw {
            id: session.primary,
            vx: velocity.x,
            vy: velocity.y,
        });
        Some(velocity)
    }

    /// Abandons the current drag without throwing.
    pub fn cancel(&mut self, arena: &mut NodeArena) {
        let Some(session) = self.session.take() else {
            return;
        };
        for (id, _) in &session.members {
            if let Some(node) = arena.get_mut(id) {
                node.dragging = false;
                node.velocity = Vec2::ZERO;
            }
        }
    }

    /// Advances every throw animation. Returns whether any is still running.
    pub fn step(&mut self, arena: &mut NodeArena, delta_seconds: f32) -> bool {
        if self.throws.is_empty() {
            return false;
        }
        let delta_seconds = if delta_seconds.is_finite() {
            delta_seconds.clamp(0.0, 0.1)
        } else {
            1.0 / 60.0
        };
        let friction = self.config.friction.clamp(0.0, 1.0).powf(delta_seconds * 60.0);
        let bounds = self.config.bounds;
        let bounce = self.config.bounce;
        let stop_speed = self.config.stop_speed.max(0.0);

        self.throws.retain_mut(|throw| {
            let Some(node) = arena.get_mut(&throw.id) else {
                return false;
            };
            if !node.throwing || node.dragging {
                return false;
            }

            throw.velocity *= friction;
            let mut position = node.position + throw.velocity * delta_seconds;
            if let Some(bounds) = &bounds {
                let clamped = bounds.clamp(position, node.radius);
                if clamped.x != position.x {
                    throw.velocity.x *= bounce;
                }
                if clamped.y != position.y {
                    throw.velocity.y *= bounce;
                }
                position = clamped;
            }
            node.position = position;

            if throw.velocity.length() < stop_speed {
                node.throwing = false;
                node.velocity = Vec2::ZERO;
                return false;
            }
            true
        });
        !self.throws.is_empty()
    }
}
