use eframe::egui::{Pos2, Rect, Vec2, vec2};
use serde::{Deserialize, Serialize};

use crate::events::{Notification, Notifier};

const ZOOM_SNAP: f32 = 0.0005;
const PAN_SNAP: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanBounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl PanBounds {
    fn clamp(&self, pan: Vec2) -> Vec2 {
        vec2(
            pan.x.clamp(self.min_x.min(self.max_x), self.max_x.max(self.min_x)),
            pan.y.clamp(self.min_y.min(self.max_y), self.max_y.max(self.min_y)),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Fraction of the remaining distance covered per 60 Hz frame.
    pub smoothing: f32,
    pub zoom_step: f32,
    pub default_zoom: f32,
    pub default_pan: [f32; 2],
    pub pan_bounds: Option<PanBounds>,
    pub wheel_sensitivity: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 5.0,
            smoothing: 0.18,
            zoom_step: 1.2,
            default_zoom: 1.0,
            default_pan: [0.0, 0.0],
            pan_bounds: None,
            wheel_sensitivity: 0.0018,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    pub zoom: f32,
    pub pan: Vec2,
    pub target_zoom: f32,
    pub target_pan: Vec2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewportKey {
    ZoomIn,
    ZoomOut,
    Reset,
}

impl ViewportKey {
    pub fn from_char(key: char) -> Option<Self> {
        match key {
            '+' | '=' => Some(Self::ZoomIn),
            '-' | '_' => Some(Self::ZoomOut),
            '0' => Some(Self::Reset),
            _ => None,
        }
    }
}

/// Smoothed zoom/pan state. `screen = pan + world * zoom`.
pub struct ViewportController {
    config: ViewportConfig,
    state: ViewportState,
    size: Vec2,
    notifier: Notifier,
    pinch_distance: Option<f32>,
}

impl ViewportController {
    pub fn new(config: ViewportConfig, size: Vec2, notifier: Notifier) -> Self {
        let mut controller = Self {
            state: ViewportState {
                zoom: 1.0,
                pan: Vec2::ZERO,
                target_zoom: 1.0,
                target_pan: Vec2::ZERO,
            },
            config,
            size,
            notifier,
            pinch_distance: None,
        };
        let zoom = controller.clamp_zoom(controller.config.default_zoom);
        let pan = controller.clamp_pan(Vec2::from(controller.config.default_pan));
        controller.state = ViewportState {
            zoom,
            pan,
            target_zoom: zoom,
            target_pan: pan,
        };
        controller
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn zoom(&self) -> f32 {
        self.state.zoom
    }

    pub fn pan(&self) -> Vec2 {
        self.state.pan
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    pub fn world_to_screen(&self, world: Vec2) -> Pos2 {
        (self.state.pan + world * self.state.zoom).to_pos2()
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Vec2 {
        (screen.to_vec2() - self.state.pan) / self.state.zoom
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        let min = self.config.min_zoom.min(self.config.max_zoom);
        let max = self.config.max_zoom.max(self.config.min_zoom);
        if zoom.is_nan() {
            return self.state.target_zoom.clamp(min, max);
        }
        zoom.clamp(min, max)
    }

    fn clamp_pan(&self, pan: Vec2) -> Vec2 {
        let pan = vec2(
            if pan.x.is_finite() { pan.x } else { self.state.target_pan.x },
            if pan.y.is_finite() { pan.y } else { self.state.target_pan.y },
        );
        match &self.config.pan_bounds {
            Some(bounds) => bounds.clamp(pan),
            None => pan,
        }
    }

    fn set_target(&mut self, zoom: f32, pan: Vec2) {
        let zoom = self.clamp_zoom(zoom);
        let pan = self.clamp_pan(pan);

        if zoom != self.state.target_zoom {
            self.state.target_zoom = zoom;
            self.notifier.notify(Notification::ZoomChanged { zoom });
        }
        if pan != self.state.target_pan {
            self.state.target_pan = pan;
            self.notifier.notify(Notification::PanChanged { x: pan.x, y: pan.y });
        }
    }

    /// Eases the current values toward the targets. Returns whether anything is
    /// still moving.
    pub fn tick(&mut self, delta_seconds: f32) -> bool {
        let frames = if delta_seconds.is_finite() {
            (delta_seconds * 60.0).max(0.0)
        } else {
            1.0
        };
        let factor = 1.0 - (1.0 - self.config.smoothing.clamp(0.0, 1.0)).powf(frames);

        let state = &mut self.state;
        state.zoom += (state.target_zoom - state.zoom) * factor;
        state.pan += (state.target_pan - state.pan) * factor;

        if (state.target_zoom - state.zoom).abs() < ZOOM_SNAP {
            state.zoom = state.target_zoom;
        }
        if (state.target_pan - state.pan).length() < PAN_SNAP {
            state.pan = state.target_pan;
        }
        state.zoom != state.target_zoom || state.pan != state.target_pan
    }

    pub fn snap_to_target(&mut self) {
        self.state.zoom = self.state.target_zoom;
        self.state.pan = self.state.target_pan;
    }

    /// Retargets the zoom so the content under `point` stays put on screen.
    pub fn zoom_to_point(&mut self, point: Pos2, new_zoom: f32) {
        let zoom = self.clamp_zoom(new_zoom);
        let ratio = zoom / self.state.target_zoom;
        let anchor = point.to_vec2();
        let pan = anchor - (anchor - self.state.target_pan) * ratio;
        self.set_target(zoom, pan);
    }

    pub fn zoom_by(&mut self, point: Pos2, factor: f32) {
        self.zoom_to_point(point, self.state.target_zoom * factor);
    }

    pub fn wheel(&mut self, point: Pos2, scroll_delta: f32) {
        if scroll_delta.abs() <= f32::EPSILON {
            return;
        }
        let factor = (1.0 + scroll_delta * self.config.wheel_sensitivity).clamp(0.85, 1.15);
        self.zoom_by(point, factor);
    }

    /// Direct manipulation pan: moves both the target and the current value.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.set_target(self.state.target_zoom, self.state.target_pan + delta);
        self.state.pan = self.clamp_pan(self.state.pan + delta);
    }

    pub fn pan_to(&mut self, pan: Vec2) {
        self.set_target(self.state.target_zoom, pan);
    }

    pub fn pinch_start(&mut self, touches: [Pos2; 2]) {
        self.pinch_distance = Some(touches[0].distance(touches[1]));
    }

    pub fn pinch_move(&mut self, touches: [Pos2; 2]) {
        let distance = touches[0].distance(touches[1]);
        let Some(previous) = self.pinch_distance.replace(distance) else {
            return;
        };
        if previous <= f32::EPSILON || distance <= f32::EPSILON {
            return;
        }
        let midpoint = touches[0].lerp(touches[1], 0.5);
        self.zoom_by(midpoint, distance / previous);
    }

    pub fn pinch_end(&mut self) {
        self.pinch_distance = None;
    }

    pub fn center(&self) -> Pos2 {
        (self.size * 0.5).to_pos2()
    }

    pub fn handle_key(&mut self, key: ViewportKey) {
        match key {
            ViewportKey::ZoomIn => self.zoom_by(self.center(), self.config.zoom_step),
            ViewportKey::ZoomOut => self.zoom_by(self.center(), 1.0 / self.config.zoom_step),
            ViewportKey::Reset => self.reset(),
        }
    }

    pub fn reset(&mut self) {
        let zoom = self.clamp_zoom(self.config.default_zoom);
        let pan = self.clamp_pan(Vec2::from(self.config.default_pan));
        self.state.target_zoom = zoom;
        self.state.target_pan = pan;
        self.notifier.notify(Notification::ViewReset);
    }

    /// Targets the zoom and pan that fit `bounds` (world space) inside the
    /// viewport minus `padding` on every side, centred.
    pub fn zoom_to_fit(&mut self, bounds: Rect, padding: f32) {
        if !(bounds.min.x.is_finite()
            && bounds.min.y.is_finite()
            && bounds.max.x.is_finite()
            && bounds.max.y.is_finite())
        {
            return;
        }

        let available = (self.size - Vec2::splat(padding.max(0.0) * 2.0)).max(Vec2::splat(1.0));
        let width = bounds.width().max(1.0);
        let height = bounds.height().max(1.0);
        let zoom = self.clamp_zoom((available.x / width).min(available.y / height));
        let pan = self.size * 0.5 - bounds.center().to_vec2() * zoom;
        self.set_target(zoom, pan);
    }
}
