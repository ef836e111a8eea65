use eframe::egui::{self, Align2, Color32, FontId, Sense, Shape, Stroke, Ui, Vec2, vec2};
use facet_bubbles::color::{blend_color, with_opacity};
use facet_bubbles::connection::{ConnectionCurve, CurveStyle};

use super::BubbleApp;
use super::render_utils::{circle_visible, draw_background, edge_visible};

const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 206, 93);
const OUTLINE_COLOR: Color32 = Color32::from_rgba_premultiplied(13, 13, 13, 190);
const PINNED_COLOR: Color32 = Color32::from_rgb(103, 196, 255);

impl BubbleApp {
    pub(in crate::app) fn draw_canvas(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.sync_canvas_size(rect.size());

        self.handle_viewport_input(ui, rect, &response);
        self.handle_node_drag(ui, rect, &response);
        self.handle_click(rect, &response);

        let delta_seconds = ui
            .ctx()
            .input(|input| input.stable_dt)
            .clamp(1.0 / 240.0, 1.0 / 20.0);
        let moving = self.advance(delta_seconds);
        if !self.fitted_once && !self.engine.is_running() {
            self.zoom_to_content();
            self.fitted_once = true;
        }
        let animated_curves = self.engine.connections().config().curve == CurveStyle::Spring;
        if moving || animated_curves || response.dragged() {
            ui.ctx().request_repaint();
        }

        let hover = response.hover_pos();
        self.hovered = hover.and_then(|pointer| self.node_at(rect, pointer));

        let painter = ui.painter_at(rect);
        let zoom = self.viewport.zoom();
        draw_background(&painter, rect, self.viewport.pan(), zoom);

        let viewport = &self.viewport;
        let to_screen = |world: Vec2| rect.min + viewport.world_to_screen(world).to_vec2();
        let arena = self.engine.arena();
        let model = self.engine.connections();
        let selected = self.selected.as_deref();
        let stroke_scale = zoom.sqrt().clamp(0.5, 2.0);

        for connection in model.iter() {
            let (Some(source), Some(target)) =
                (arena.get(&connection.source), arena.get(&connection.target))
            else {
                continue;
            };
            let start = to_screen(source.position);
            let end = to_screen(target.position);
            if !edge_visible(rect, start, end, 8.0) {
                continue;
            }

            let touches_selection = selected
                .is_some_and(|id| connection.source == id || connection.target == id);
            let opacity = if touches_selection {
                1.0
            } else if selected.is_some() {
                connection.opacity() * 0.4
            } else {
                connection.opacity()
            };
            let stroke = Stroke::new(
                connection.stroke_width() * stroke_scale,
                with_opacity(connection.color, opacity),
            );

            match model.curve(connection, start, end, self.animation_phase) {
                ConnectionCurve::Straight { from, to } => {
                    painter.line_segment([from, to], stroke);
                }
                curve => {
                    painter.add(Shape::line(curve.sample(model.config().curve_samples), stroke));
                }
            }
        }

        for snapshot in self.engine.snapshots() {
            let position = to_screen(vec2(snapshot.x, snapshot.y));
            let radius = snapshot.size * 0.5 * zoom;
            if !circle_visible(rect, position, radius) {
                continue;
            }

            let is_selected = selected == Some(snapshot.id.as_str());
            let is_hovered = self.hovered.as_deref() == Some(snapshot.id.as_str());
            let is_pinned = arena.get(&snapshot.id).is_some_and(|node| node.pinned);

            let mut fill = with_opacity(snapshot.color, snapshot.opacity);
            if is_hovered {
                fill = blend_color(fill, Color32::WHITE, 0.25);
            }
            painter.circle_filled(position, radius, fill);
            painter.circle_stroke(position, radius, Stroke::new(1.0, OUTLINE_COLOR));
            if is_pinned {
                painter.circle_stroke(position, radius + 2.0, Stroke::new(1.5, PINNED_COLOR));
            }
            if is_selected {
                painter.circle_stroke(position, radius + 4.0, Stroke::new(2.0, SELECTED_COLOR));
            }

            if is_selected || is_hovered || radius > 16.0 {
                painter.text(
                    position,
                    Align2::CENTER_CENTER,
                    &snapshot.id,
                    FontId::proportional(11.0),
                    Color32::from_gray(238),
                );
            }
        }

        let info = if let Some(id) = &self.hovered {
            let group = arena
                .get(id)
                .and_then(|node| node.facet_group)
                .and_then(|group| self.engine.group_labels().get(group))
                .map_or("ungrouped", String::as_str);
            let similarity = selected
                .and_then(|focus| self.engine.matrix().get(focus, id))
                .map(|score| format!("  |  similarity {score:.2}"))
                .unwrap_or_default();
            Some(format!("{id}  |  {group}{similarity}"))
        } else {
            hover
                .and_then(|pointer| {
                    model.hit_test(pointer, self.animation_phase, |id| {
                        arena.get(id).map(|node| to_screen(node.position))
                    })
                })
                .map(|connection| {
                    format!(
                        "{} - {}  |  strength {:.2}",
                        connection.source, connection.target, connection.strength
                    )
                })
        };
        if let Some(info) = info {
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                info,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        if self.hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }
    }
}
