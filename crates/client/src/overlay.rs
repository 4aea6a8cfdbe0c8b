//! Floating-text overlay particles
//!
//! Particles rise at a constant velocity and fade linearly; their remaining
//! life doubles as the drawing alpha. Advancing is driven by measured wall
//! clock time so the animation is frame-rate independent.

/// Default lifetime of a floating text, in seconds
pub const DEFAULT_LIFE: f64 = 1.0;

/// One transient text label
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingText {
    pub x: f64,
    pub y: f64,
    pub text: String,
    /// Seconds remaining
    pub life: f64,
    /// Vertical velocity in px/s (negative rises)
    pub vy: f64,
}

impl FloatingText {
    /// Drawing opacity
    pub fn alpha(&self) -> f64 {
        self.life.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Default)]
pub struct OverlayAnimator {
    particles: Vec<FloatingText>,
}

impl OverlayAnimator {
    pub const fn new() -> Self {
        Self {
            particles: Vec::new(),
        }
    }

    pub fn spawn(&mut self, x: f64, y: f64, text: impl Into<String>, life: f64, vy: f64) {
        self.particles.push(FloatingText {
            x,
            y,
            text: text.into(),
            life: life.min(DEFAULT_LIFE),
            vy,
        });
    }

    /// Move and age every particle by `dt` seconds, then prune expired ones
    pub fn advance(&mut self, dt: f64) {
        let dt = dt.max(0.0);
        for p in &mut self.particles {
            p.y += p.vy * dt;
            p.life -= dt;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    /// Live particles in spawn order
    pub fn particles(&self) -> &[FloatingText] {
        &self.particles
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
