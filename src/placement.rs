use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the small random offsets applied when seeding new bubbles.
///
/// Has no `Default`: hosts choose between reproducible and varied layouts.
#[derive(Debug)]
pub enum JitterSource {
    Seeded(StdRng),
    Entropy(StdRng),
    Disabled,
}

impl JitterSource {
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded(StdRng::seed_from_u64(seed))
    }

    pub fn entropy() -> Self {
        Self::Entropy(StdRng::from_os_rng())
    }

    pub fn disabled() -> Self {
        Self::Disabled
    }

    /// Uniform offset in `[-amplitude, amplitude]` on both axes.
    pub fn offset(&mut self, amplitude: f32) -> Vec2 {
        match self {
            Self::Seeded(rng) | Self::Entropy(rng) => vec2(
                rng.random_range(-1.0_f32..=1.0) * amplitude,
                rng.random_range(-1.0_f32..=1.0) * amplitude,
            ),
            Self::Disabled => Vec2::ZERO,
        }
    }
}

/// Position for the `index`-th of `count` new bubbles: a ring around `center`
/// sized to the population, plus jitter.
pub fn ring_position(
    index: usize,
    count: usize,
    center: Vec2,
    node_radius: f32,
    jitter: &mut JitterSource,
) -> Vec2 {
    if count <= 1 {
        return center + jitter.offset(node_radius);
    }

    let angle = (index as f32 / count as f32) * TAU;
    let circumference = count as f32 * node_radius * 2.6;
    let ring_radius = (circumference / TAU).max(node_radius * 3.0);
    center + vec2(angle.cos(), angle.sin()) * ring_radius + jitter.offset(node_radius * 0.5)
}

const GOLDEN_ANGLE: f32 = 2.399_963;
const MAX_PLACEMENT_ATTEMPTS: usize = 512;

/// First point on a sunflower spiral around `preferred` where a circle of
/// `radius` keeps `clearance` from every `occupied` circle. Falls back to
/// `preferred` when the spiral runs out.
pub fn clear_position(
    preferred: Vec2,
    radius: f32,
    clearance: f32,
    occupied: &[(Vec2, f32)],
) -> Vec2 {
    let clearance = clearance.max(0.0);
    let is_clear = |candidate: Vec2| {
        occupied.iter().all(|&(position, other_radius)| {
            (candidate - position).length() >= radius + other_radius + clearance
        })
    };

    let spacing = (radius + clearance) * 2.0;
    for attempt in 0..MAX_PLACEMENT_ATTEMPTS {
        let distance = spacing * (attempt as f32).sqrt();
        let angle = attempt as f32 * GOLDEN_ANGLE;
        let candidate = preferred + vec2(angle.cos(), angle.sin()) * distance;
        if is_clear(candidate) {
            return candidate;
        }
    }
    preferred
}
