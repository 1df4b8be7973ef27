#![forbid(unsafe_code)]

//! Damped harmonic oscillator used to interpolate panel heights.
//!
//! The coordination logic treats this integrator as a black box: it is given
//! a target and a [`SpringConfig`] and yields a stream of positions. It is
//! based on the classical damped spring equation:
//!
//!   F = -stiffness × (position - target) - damping × velocity
//!
//! # Parameters
//!
//! - **stiffness** (k): restoring force strength. Higher = faster response.
//! - **damping** (c): velocity drag. Higher = less oscillation.
//! - **precision**: both the position delta and the velocity must fall below
//!   this value for the spring to come to rest. Default: 0.01 layout units.
//!
//! # Invariants
//!
//! 1. A spring at rest does not move until [`Spring::set_target`] moves the
//!    target by more than `precision`.
//! 2. Retargeting keeps position and velocity. A redirected spring changes
//!    direction smoothly, it never jumps.
//! 3. [`Spring::snap`] is the only way to move the position discontinuously.
//! 4. Stiffness is clamped to a positive minimum, damping to `>= 0`.
//!
//! # Failure Modes
//!
//! - Very large dt: steps are subdivided at 4ms so a stalled frame does not
//!   explode the integration.
//! - Zero damping: the spring oscillates forever and never rests.

use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Maximum dt per integration step (4ms).
const MAX_STEP_SECS: f64 = 0.004;

/// Minimum stiffness to prevent degenerate springs.
const MIN_STIFFNESS: f64 = 0.1;

/// Default rest precision in layout units.
pub const DEFAULT_PRECISION: f64 = 0.01;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning for a height spring.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SpringConfig {
    /// Restoring force strength.
    pub stiffness: f64,
    /// Velocity drag.
    pub damping: f64,
    /// Rest threshold for both position delta and velocity.
    pub precision: f64,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::no_wobble()
    }
}

impl SpringConfig {
    /// Create a config with the default precision.
    #[must_use]
    pub const fn new(stiffness: f64, damping: f64) -> Self {
        Self {
            stiffness,
            damping,
            precision: DEFAULT_PRECISION,
        }
    }

    /// Near-critical damping: settles quickly without visible bounce.
    #[must_use]
    pub const fn no_wobble() -> Self {
        Self::new(170.0, 26.0)
    }

    /// Low stiffness, light damping. Slow and soft.
    #[must_use]
    pub const fn gentle() -> Self {
        Self::new(120.0, 14.0)
    }

    /// Underdamped: overshoots the target before settling.
    #[must_use]
    pub const fn wobbly() -> Self {
        Self::new(180.0, 12.0)
    }

    /// Snappy response with a small overshoot.
    #[must_use]
    pub const fn stiff() -> Self {
        Self::new(210.0, 20.0)
    }

    /// Look up a preset by name (`no_wobble`, `gentle`, `wobbly`, `stiff`).
    ///
    /// Both snake_case and camelCase spellings are accepted.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "no_wobble" | "noWobble" => Some(Self::no_wobble()),
            "gentle" => Some(Self::gentle()),
            "wobbly" => Some(Self::wobbly()),
            "stiff" => Some(Self::stiff()),
            _ => None,
        }
    }

    /// Set the rest precision (builder pattern).
    #[must_use]
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision.abs();
        self
    }
}

// ---------------------------------------------------------------------------
// Spring
// ---------------------------------------------------------------------------

/// A damped spring tracking a single scalar (a panel height).
#[derive(Debug, Clone)]
pub struct Spring {
    position: f64,
    velocity: f64,
    target: f64,
    stiffness: f64,
    damping: f64,
    precision: f64,
    at_rest: bool,
}

impl Spring {
    /// Create a spring resting at `position`.
    #[must_use]
    pub fn at_rest(position: f64, config: SpringConfig) -> Self {
        let mut spring = Self {
            position,
            velocity: 0.0,
            target: position,
            stiffness: MIN_STIFFNESS,
            damping: 0.0,
            precision: DEFAULT_PRECISION,
            at_rest: true,
        };
        spring.configure(config);
        spring
    }

    /// Apply new tuning without touching position, velocity or target.
    pub fn configure(&mut self, config: SpringConfig) {
        self.stiffness = config.stiffness.max(MIN_STIFFNESS);
        self.damping = config.damping.max(0.0);
        self.precision = config.precision.abs();
    }

    /// Current position.
    #[inline]
    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Current velocity.
    #[inline]
    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Current target.
    #[inline]
    #[must_use]
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Stiffness parameter.
    #[inline]
    #[must_use]
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// Damping parameter.
    #[inline]
    #[must_use]
    pub fn damping(&self) -> f64 {
        self.damping
    }

    /// Whether the spring has settled at its target.
    #[inline]
    #[must_use]
    pub fn is_at_rest(&self) -> bool {
        self.at_rest
    }

    /// Change the target. Wakes the spring if the target moved by more than
    /// the rest precision, or if the spring is still away from it.
    pub fn set_target(&mut self, target: f64) {
        let moved = (self.target - target).abs() > self.precision;
        self.target = target;
        if moved || (self.position - target).abs() > self.precision {
            self.at_rest = false;
        }
    }

    /// Teleport to `position` and rest there.
    pub fn snap(&mut self, position: f64) {
        self.position = position;
        self.target = position;
        self.velocity = 0.0;
        self.at_rest = true;
    }

    /// Semi-implicit Euler step of `dt` seconds.
    fn step(&mut self, dt: f64) {
        let displacement = self.position - self.target;
        let acceleration = -self.stiffness * displacement - self.damping * self.velocity;
        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;
    }

    /// Advance the spring by `dt`, subdividing for stability.
    pub fn advance(&mut self, dt: Duration) {
        if self.at_rest {
            return;
        }

        let total_secs = dt.as_secs_f64();
        if total_secs <= 0.0 {
            return;
        }

        let mut remaining = total_secs;
        while remaining > 0.0 {
            let step_dt = remaining.min(MAX_STEP_SECS);
            self.step(step_dt);
            remaining -= step_dt;
        }

        let pos_delta = (self.position - self.target).abs();
        if pos_delta < self.precision && self.velocity.abs() < self.precision {
            self.position = self.target;
            self.velocity = 0.0;
            self.at_rest = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
