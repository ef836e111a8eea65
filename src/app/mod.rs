use std::collections::VecDeque;

use eframe::egui::{self, Context, Vec2};
use facet_bubbles::drag::DragBounds;
use facet_bubbles::events::channel;
use facet_bubbles::{
    BubbleEngine, DragController, EngineConfig, Entity, JitterSource, NotificationReceiver,
    PhysicsConfig, ViewportController,
};
use serde_json::Value;
use tracing::{debug, warn};

mod fps;
mod interaction;
mod panels;
mod render_utils;
mod view;

/// Pinch span tracked between frames; egui reports only the centre and a
/// per-frame scale.
const PINCH_BASE_SPAN: f32 = 100.0;

pub struct BubbleApp {
    engine: BubbleEngine,
    viewport: ViewportController,
    drag: DragController,
    notifications: NotificationReceiver,
    physics_draft: PhysicsConfig,
    live_physics: bool,
    selected: Option<String>,
    hovered: Option<String>,
    pinch_span: Option<f32>,
    animation_phase: f32,
    canvas_size: Vec2,
    /// Drag bounds track the canvas unless the config pins them.
    canvas_drag_bounds: bool,
    fitted_once: bool,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
}

impl BubbleApp {
    pub fn new(
        config: EngineConfig,
        jitter: JitterSource,
        entities: Vec<Entity>,
        facets: Vec<String>,
    ) -> anyhow::Result<Self> {
        let (notifier, notifications) = channel(config.notification_capacity);
        let viewport =
            ViewportController::new(config.viewport.clone(), Vec2::ZERO, notifier.clone());
        let drag = DragController::new(config.drag.clone(), notifier.clone());
        let physics_draft = config.physics.clone();
        let canvas_drag_bounds = config.drag.bounds.is_none();

        let mut engine = BubbleEngine::new(config, jitter, notifier)?;
        engine.set_entities(entities)?;
        engine.set_active_facets(facets);

        Ok(Self {
            engine,
            viewport,
            drag,
            notifications,
            physics_draft,
            live_physics: true,
            selected: None,
            hovered: None,
            pinch_span: None,
            animation_phase: 0.0,
            canvas_size: Vec2::ZERO,
            canvas_drag_bounds,
            fitted_once: false,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
        })
    }

    /// Keeps the simulated world the same size as the canvas.
    fn sync_canvas_size(&mut self, size: Vec2) {
        if size == self.canvas_size || !(size.x > 0.0 && size.y > 0.0) {
            return;
        }
        self.canvas_size = size;
        self.engine.set_viewport_size(size);
        self.viewport.set_size(size);
        if self.canvas_drag_bounds {
            self.drag.set_bounds(Some(DragBounds::from_size(size)));
        }
    }

    fn set_selected(&mut self, selected: Option<String>) {
        if self.selected == selected {
            return;
        }
        if let Err(error) = self.engine.set_focus(selected.as_deref()) {
            warn!(%error, "cannot focus node");
            return;
        }
        self.selected = selected;
    }

    fn zoom_to_content(&mut self) {
        if let Some(bounds) = self.engine.content_bounds() {
            self.viewport.zoom_to_fit(bounds, 40.0);
        }
    }

    fn publish_notifications(&mut self) {
        self.notifications
            .forward_to(&mut |name: &str, payload: Value| {
                debug!(name, %payload, "notification");
            });
    }

    /// Advances physics, throws and viewport easing. Returns whether anything
    /// still moves.
    fn advance(&mut self, delta_seconds: f32) -> bool {
        let mut moving = false;
        if self.live_physics {
            moving |= self.engine.step(delta_seconds);
        }
        moving |= self.drag.step(self.engine.arena_mut(), delta_seconds);
        moving |= self.viewport.tick(delta_seconds);
        self.animation_phase = (self.animation_phase + delta_seconds).rem_euclid(1000.0);
        moving
    }
}

impl eframe::App for BubbleApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.update_fps_counter(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_top_bar(ui));

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_canvas(ui));

        self.publish_notifications();
    }
}
