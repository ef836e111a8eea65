use eframe::egui::Context;

use super::BubbleApp;

const FPS_SAMPLE_WINDOW: usize = 180;

impl BubbleApp {
    pub(in crate::app) fn update_fps_counter(&mut self, ctx: &Context) {
        let dt = ctx.input(|input| input.stable_dt);
        if dt <= f32::EPSILON {
            return;
        }

        self.fps_current = (1.0 / dt).clamp(0.0, 1000.0);
        self.fps_samples.push_back(self.fps_current);
        while self.fps_samples.len() > FPS_SAMPLE_WINDOW {
            self.fps_samples.pop_front();
        }
    }

    pub(in crate::app) fn fps_display_text(&self) -> String {
        if self.fps_samples.is_empty() {
            return format!("FPS {:.0}", self.fps_current);
        }
        let average = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
        format!("FPS {:.0} | avg {average:.1}", self.fps_current)
    }
}
