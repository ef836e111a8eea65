use eframe::egui::{self, PointerButton, Pos2, Rect, Response, Ui, vec2};
use facet_bubbles::ViewportKey;
use tracing::warn;

use super::{BubbleApp, PINCH_BASE_SPAN};

/// Nudge applied to the simulation after a release so neighbours react.
const RELEASE_REHEAT: f32 = 0.3;

fn canvas_local(rect: Rect, screen: Pos2) -> Pos2 {
    (screen - rect.min).to_pos2()
}

impl BubbleApp {
    pub(in crate::app) fn node_at(&self, rect: Rect, screen: Pos2) -> Option<String> {
        let world = self.viewport.screen_to_world(canvas_local(rect, screen));
        self.engine
            .arena()
            .iter()
            .filter_map(|node| {
                let distance = (node.position - world).length();
                (distance <= node.radius).then_some((node, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(node, _)| node.id.clone())
    }

    pub(in crate::app) fn handle_viewport_input(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if response.dragged_by(PointerButton::Secondary)
            || response.dragged_by(PointerButton::Middle)
        {
            self.viewport.pan_by(response.drag_delta());
        }

        let (scroll, zoom_delta, multi_touch, hover, typed, command) = ui.input(|input| {
            let typed = input
                .events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect::<String>();
            (
                input.raw_scroll_delta.y,
                input.zoom_delta(),
                input.multi_touch(),
                input.pointer.hover_pos(),
                typed,
                input.modifiers.command,
            )
        });

        match multi_touch {
            Some(touch) if touch.num_touches >= 2 => {
                let center = canvas_local(rect, touch.center_pos);
                let span = match self.pinch_span {
                    Some(span) => span * touch.zoom_delta,
                    None => {
                        let half = vec2(PINCH_BASE_SPAN * 0.5, 0.0);
                        self.viewport.pinch_start([center - half, center + half]);
                        PINCH_BASE_SPAN
                    }
                };
                let half = vec2(span * 0.5, 0.0);
                self.viewport.pinch_move([center - half, center + half]);
                self.pinch_span = Some(span);
            }
            _ => {
                if self.pinch_span.take().is_some() {
                    self.viewport.pinch_end();
                }
                if response.hovered() {
                    let anchor = canvas_local(rect, hover.unwrap_or_else(|| rect.center()));
                    if command && (zoom_delta - 1.0).abs() > f32::EPSILON {
                        self.viewport.zoom_by(anchor, zoom_delta);
                    } else if !command {
                        self.viewport.wheel(anchor, scroll);
                    }
                }
            }
        }

        let keyboard_free = ui.ctx().memory(|memory| memory.focused().is_none());
        if keyboard_free {
            for key in typed.chars().filter_map(ViewportKey::from_char) {
                self.viewport.handle_key(key);
            }
        }
    }

    pub(in crate::app) fn handle_node_drag(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        let (time, additive) = ui.input(|input| (input.time, input.modifiers.shift));

        if response.drag_started_by(PointerButton::Primary)
            && let Some(pointer) = response.interact_pointer_pos()
            && let Some(id) = self.node_at(rect, pointer)
        {
            let world = self.viewport.screen_to_world(canvas_local(rect, pointer));
            let arena = self.engine.arena_mut();
            if let Err(error) = self.drag.pointer_down(arena, &id, world, time, additive) {
                warn!(%error, "drag start rejected");
            }
        }

        if !self.drag.is_dragging() {
            return;
        }

        if response.dragged_by(PointerButton::Primary)
            && let Some(pointer) = response.interact_pointer_pos()
        {
            let world = self.viewport.screen_to_world(canvas_local(rect, pointer));
            self.drag.pointer_move(self.engine.arena_mut(), world, time);
        }

        if response.drag_stopped() {
            self.drag.pointer_up(self.engine.arena_mut(), time);
            self.engine.reheat(RELEASE_REHEAT);
        }
    }

    pub(in crate::app) fn handle_click(&mut self, rect: Rect, response: &Response) {
        if response.double_clicked()
            && let Some(pointer) = response.interact_pointer_pos()
            && let Some(id) = self.node_at(rect, pointer)
        {
            let arena = self.engine.arena_mut();
            let pinned = arena.get(&id).is_some_and(|node| node.pinned);
            if let Err(error) = arena.set_pinned(&id, !pinned) {
                warn!(%error, "pin toggle rejected");
            }
            self.engine.reheat(RELEASE_REHEAT);
            return;
        }

        if !response.clicked_by(PointerButton::Primary) {
            return;
        }
        let clicked = response
            .interact_pointer_pos()
            .and_then(|pointer| self.node_at(rect, pointer));
        self.set_selected(clicked);
    }
}
