#![forbid(unsafe_code)]

//! Height animator: a spring wrapper with redirect and snap support.
//!
//! # Invariants
//!
//! 1. [`HeightAnimator::jump_to`] makes the next frame emit exactly the jump
//!    target, once, with no intermediate values.
//! 2. [`HeightAnimator::animate_to`] never moves the current value; a
//!    redirect mid-flight only changes the direction of travel.
//! 3. A settled animator produces no frames.

use std::time::Duration;

use crate::spring::{Spring, SpringConfig};

/// Drives one height value toward a target.
#[derive(Debug, Clone)]
pub struct HeightAnimator {
    spring: Spring,
    pending_jump: bool,
}

impl HeightAnimator {
    /// Create an animator resting at `height`.
    #[must_use]
    pub fn new(height: f64, config: SpringConfig) -> Self {
        Self {
            spring: Spring::at_rest(height, config),
            pending_jump: false,
        }
    }

    /// Animate (or redirect) toward `target` using `config`.
    ///
    /// Cancels a pending jump.
    pub fn animate_to(&mut self, target: f64, config: SpringConfig) {
        self.pending_jump = false;
        self.spring.configure(config);
        self.spring.set_target(target);
    }

    /// Snap to `target`. The next frame emits `target` and nothing else.
    pub fn jump_to(&mut self, target: f64) {
        self.spring.snap(target);
        self.pending_jump = true;
    }

    /// Come to rest at the current target without emitting a frame.
    pub fn settle(&mut self) {
        let target = self.spring.target();
        self.spring.snap(target);
        self.pending_jump = false;
    }

    /// Current value.
    #[must_use]
    pub fn current(&self) -> f64 {
        self.spring.position()
    }

    /// Value being approached.
    #[must_use]
    pub fn target(&self) -> f64 {
        self.spring.target()
    }

    /// Current velocity in units per second.
    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.spring.velocity()
    }

    /// Whether no more frames will be produced.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.pending_jump && self.spring.is_at_rest()
    }

    /// Produce the value for one tick of length `dt`, or `None` when settled.
    pub fn next_frame(&mut self, dt: Duration) -> Option<f64> {
        if self.pending_jump {
            self.pending_jump = false;
            return Some(self.spring.position());
        }
        if self.spring.is_at_rest() {
            return None;
        }
        self.spring.advance(dt);
        Some(self.spring.position())
    }

    /// Lazily iterate the remaining frames at a fixed `dt`.
    ///
    /// The iterator ends once the animator settles. Redirecting between
    /// pulls is allowed through [`Frames::animator`].
    pub fn frames(&mut self, dt: Duration) -> Frames<'_> {
        Frames { animator: self, dt }
    }
}

/// Iterator returned by [`HeightAnimator::frames`].
#[derive(Debug)]
pub struct Frames<'a> {
    animator: &'a mut HeightAnimator,
    dt: Duration,
}

impl Frames<'_> {
    /// Access the animator mid-iteration, e.g. to redirect it.
    pub fn animator(&mut self) -> &mut HeightAnimator {
        &mut *self.animator
    }
}

impl Iterator for Frames<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        self.animator.next_frame(self.dt)
    }
}
