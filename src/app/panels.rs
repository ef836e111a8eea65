use eframe::egui::{self, Align, Layout, Sense, Ui, vec2};
use facet_bubbles::color::cluster_color;
use facet_bubbles::connection::CurveStyle;
use facet_bubbles::physics::RepulsionMode;

use super::BubbleApp;

const DEFAULT_THETA: f32 = 0.7;

impl BubbleApp {
    pub(in crate::app) fn draw_top_bar(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.heading("facet-bubbles");
            ui.separator();

            let state = self.engine.layout().state();
            ui.label(format!("entities: {}", self.engine.entities().len()));
            ui.label(format!("connections: {}", self.engine.connections().len()));
            ui.label(format!("springs: {}", self.engine.layout().edges().len()));
            ui.label(if state.is_stable {
                format!("stable after {} steps", state.step_count)
            } else {
                format!("temperature {:.3}", state.temperature)
            });
            ui.label(format!("zoom {:.0}%", self.viewport.zoom() * 100.0));

            if ui.button("Fit").clicked() {
                self.zoom_to_content();
            }
            if ui.button("Reset view").clicked() {
                self.viewport.reset();
            }
            if ui.button("Reheat").clicked() {
                self.engine.reheat(1.0);
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                ui.label(self.fps_display_text());
            });
        });
    }

    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::CollapsingHeader::new("Facets")
                .default_open(true)
                .show(ui, |ui| self.draw_facet_toggles(ui));

            egui::CollapsingHeader::new("Groups")
                .default_open(true)
                .show(ui, |ui| self.draw_group_legend(ui));

            egui::CollapsingHeader::new("Physics")
                .default_open(true)
                .show(ui, |ui| self.draw_physics_controls(ui));

            egui::CollapsingHeader::new("Connections")
                .default_open(false)
                .show(ui, |ui| self.draw_connection_controls(ui));

            egui::CollapsingHeader::new("Selection")
                .default_open(true)
                .show(ui, |ui| self.draw_selection(ui));
        });
    }

    fn draw_facet_toggles(&mut self, ui: &mut Ui) {
        let active = self.engine.active_facets().to_vec();
        let mut toggled = None;

        for facet in self.engine.available_facets() {
            let position = active.iter().position(|name| *name == facet);
            let mut enabled = position.is_some();
            let label = match position {
                Some(index) => format!("{facet}  #{}", index + 1),
                None => facet.clone(),
            };
            if ui.checkbox(&mut enabled, label).changed() {
                toggled = Some(facet);
            }
        }

        if let Some(facet) = toggled {
            self.engine.toggle_facet(&facet);
        }
        if active.is_empty() {
            ui.weak("No active facets: bubbles only repel.");
        }
    }

    fn draw_group_legend(&self, ui: &mut Ui) {
        let labels = self.engine.group_labels();
        if labels.is_empty() {
            ui.weak("No groups.");
            return;
        }
        for (index, label) in labels.iter().enumerate() {
            ui.horizontal(|ui| {
                let (rect, _) = ui.allocate_exact_size(vec2(12.0, 12.0), Sense::hover());
                ui.painter()
                    .circle_filled(rect.center(), 6.0, cluster_color(Some(index)));
                ui.label(label);
            });
        }
    }

    fn draw_physics_controls(&mut self, ui: &mut Ui) {
        ui.checkbox(&mut self.live_physics, "Live physics");

        let draft = &mut self.physics_draft;
        let mut changed = false;
        changed |= ui
            .add(egui::Slider::new(&mut draft.repulsion_strength, 0.0..=20_000.0).text("repulsion"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut draft.attraction_strength, 0.0..=0.02).text("attraction"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut draft.edge_threshold, 0.0..=1.0).text("edge threshold"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut draft.gravity_strength, 0.0..=0.1).text("gravity"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut draft.boundary_strength, 0.0..=1.0).text("boundary"))
            .changed();
        changed |= ui.checkbox(&mut draft.clustering, "Facet clustering").changed();
        changed |= ui
            .add_enabled(
                draft.clustering,
                egui::Slider::new(&mut draft.cluster_strength, 0.0..=0.1).text("cluster pull"),
            )
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut draft.damping, 0.5..=0.99).text("damping"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut draft.max_velocity, 1.0..=40.0).text("max velocity"))
            .changed();

        let mut barnes_hut = matches!(draft.repulsion_mode, RepulsionMode::BarnesHut { .. });
        if ui.checkbox(&mut barnes_hut, "Barnes-Hut repulsion").changed() {
            draft.repulsion_mode = if barnes_hut {
                RepulsionMode::BarnesHut {
                    theta: DEFAULT_THETA,
                }
            } else {
                RepulsionMode::Exact
            };
            changed = true;
        }
        if let RepulsionMode::BarnesHut { theta } = &mut draft.repulsion_mode {
            changed |= ui
                .add(egui::Slider::new(theta, 0.1..=1.5).text("theta"))
                .changed();
        }

        if changed {
            self.engine.set_physics_config(self.physics_draft.clone());
        }
    }

    fn draw_connection_controls(&mut self, ui: &mut Ui) {
        let mut config = self.engine.connections().config().clone();
        let before = config.curve;
        ui.horizontal(|ui| {
            ui.radio_value(&mut config.curve, CurveStyle::Straight, "straight");
            ui.radio_value(&mut config.curve, CurveStyle::Bezier, "bezier");
            ui.radio_value(&mut config.curve, CurveStyle::Spring, "spring");
        });
        if config.curve != before {
            self.engine.connections_mut().set_config(config);
        }
    }

    fn draw_selection(&mut self, ui: &mut Ui) {
        let Some(selected) = self.selected.clone() else {
            ui.weak("Click a bubble to focus it. Double-click pins it.");
            return;
        };

        ui.label(format!("focus: {selected}"));
        if let Some(entity) = self
            .engine
            .entities()
            .iter()
            .find(|entity| entity.id == selected)
        {
            for (facet, value) in &entity.facets {
                ui.label(format!("{facet}: {value}"));
            }
        }
        if ui.button("Clear focus").clicked() {
            self.set_selected(None);
        }
    }
}
