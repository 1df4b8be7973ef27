#![forbid(unsafe_code)]

//! Slide instance: the lifecycle of one collapsible panel.
//!
//! ```text
//!   Idle ──mount──▶ Measuring ──height read──▶ Settled
//!                                               │  ▲
//!                        set_visible(changed)   │  │ current == target
//!                                               ▼  │
//!                                            Animating
//! ```
//!
//! A slide measures its subtree synchronously whenever its visibility target
//! changes, before producing a single frame, so the animation always starts
//! from the latest real height. Gate outcomes may stop it (snap to where it
//! should be) or ask it to measure again.
//!
//! # Invariants
//!
//! 1. `measured_height` is only written by a successful measurement, never
//!    by animation frames.
//! 2. `stop()` snaps to the current target (measured height when shown,
//!    zero when hidden), never unconditionally to zero.
//! 3. Each frame writes the `sliding` marker; `Animating` becomes `Settled`
//!    on the first frame where current and target agree at two decimals.
//!
//! # Failure Modes
//!
//! - Measurement unavailable: the height, mode and target are kept and no
//!   animation starts. The requested visibility stays pending and the next
//!   successful measurement (from any gate trigger or a repeated request)
//!   applies it.
//! - Descendant in motion: gate-driven measurements are skipped while any
//!   node below reads `Moving`; the settle of that node triggers them again.

use std::time::Duration;

use tracing::{debug, trace};

use crate::animator::HeightAnimator;
use crate::collab::{HeightStyle, Measure};
use crate::gate::{GateAction, GateOutcome, MeasureTrigger};
use crate::marker::{NodeId, SignalRegistry, Slideable, Sliding, round2};
use crate::spring::SpringConfig;

/// Lifecycle phase of a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideMode {
    /// Created, not mounted yet.
    Idle,
    /// Waiting for a first successful height read.
    Measuring,
    /// Interpolating toward the target height.
    Animating,
    /// Current height equals the target height.
    Settled,
}

/// One panel under animation control.
#[derive(Debug, Clone)]
pub struct Slide {
    node: NodeId,
    target_visible: bool,
    measured_height: Option<f64>,
    mode: SlideMode,
    instant: bool,
    pending_request: Option<bool>,
    processing: bool,
    spring: SpringConfig,
    animator: HeightAnimator,
}

impl Slide {
    /// Create an idle slide wrapping `node`.
    #[must_use]
    pub fn new(node: NodeId, visible: bool, spring: SpringConfig) -> Self {
        Self {
            node,
            target_visible: visible,
            measured_height: None,
            mode: SlideMode::Idle,
            instant: false,
            pending_request: None,
            processing: false,
            spring,
            animator: HeightAnimator::new(0.0, spring),
        }
    }

    // -- Accessors ------------------------------------------------------

    /// The node this slide wraps.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn mode(&self) -> SlideMode {
        self.mode
    }

    /// Requested visibility.
    #[must_use]
    pub fn target_visible(&self) -> bool {
        self.target_visible
    }

    /// Last measured natural height, `None` if never measured.
    #[must_use]
    pub fn measured_height(&self) -> Option<f64> {
        self.measured_height
    }

    /// Last measured height with `-1.0` standing in for "never measured".
    #[must_use]
    pub fn measured_height_or_sentinel(&self) -> f64 {
        self.measured_height.unwrap_or(-1.0)
    }

    /// Whether the next frame snaps instead of interpolating.
    #[must_use]
    pub fn is_instant(&self) -> bool {
        self.instant
    }

    /// Whether the next frame will produce a new height.
    #[must_use]
    pub fn has_pending_frame(&self) -> bool {
        self.instant || !self.animator.is_settled()
    }

    /// Whether a visibility change is waiting for a successful measurement.
    #[must_use]
    pub fn has_pending_request(&self) -> bool {
        self.pending_request.is_some()
    }

    /// Visibility requested but not applied yet for lack of a measurement.
    #[must_use]
    pub fn pending_visible(&self) -> Option<bool> {
        self.pending_request
    }

    /// Current animated height.
    #[must_use]
    pub fn current_height(&self) -> f64 {
        self.animator.current()
    }

    /// Height the slide is heading to: the measured height when shown,
    /// zero when hidden or never measured.
    #[must_use]
    pub fn target_height(&self) -> f64 {
        match (self.target_visible, self.measured_height) {
            (true, Some(h)) => h,
            _ => 0.0,
        }
    }

    /// Whether current and target differ at two-decimal precision.
    #[must_use]
    pub fn is_sliding(&self) -> bool {
        round2(self.animator.current()) != round2(self.target_height())
    }

    /// Spring tuning used for new animations.
    #[must_use]
    pub fn spring(&self) -> SpringConfig {
        self.spring
    }

    /// Replace the spring tuning. Applies to the next animation or redirect.
    pub fn set_spring(&mut self, spring: SpringConfig) {
        self.spring = spring;
    }

    // -- Re-entrancy guard -----------------------------------------------

    /// Whether a batch is being processed for this slide.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Mark the start of batch processing. Returns `false` if a batch is
    /// already in flight.
    pub fn begin_processing(&mut self) -> bool {
        !std::mem::replace(&mut self.processing, true)
    }

    /// Mark the end of batch processing.
    pub fn end_processing(&mut self) {
        self.processing = false;
    }

    // -- Transitions ----------------------------------------------------

    /// Attach to the registry and take the first measurement.
    ///
    /// On success the slide snaps to its initial height and settles. On
    /// failure it stays in `Measuring` until a later trigger succeeds.
    pub fn mount(&mut self, registry: &mut SignalRegistry, measure: &mut dyn Measure) {
        registry.write_markers(self.node, Some(Slideable::Active), None);
        self.mode = SlideMode::Measuring;
        let outcome = crate::gate::evaluate(registry, self.node, None);
        self.handle(outcome, registry, measure);
    }

    /// Request a new visibility target.
    ///
    /// Returns whether an animation was started. An unchanged target is a
    /// no-op unless the slide has never been measured; it also drops a
    /// request still waiting for a measurement. The target only changes once
    /// a measurement succeeds.
    pub fn set_visible(
        &mut self,
        visible: bool,
        registry: &mut SignalRegistry,
        measure: &mut dyn Measure,
    ) -> bool {
        if visible == self.target_visible && self.mode != SlideMode::Measuring {
            if self.pending_request.take().is_some() {
                debug!(node = %self.node, visible, "pending request dropped");
            }
            return false;
        }

        // A fresh request re-arms the node; this is the only way off `Stop`.
        registry.write_markers(self.node, Some(Slideable::Active), None);

        let Some(height) = measure.measure(self.node) else {
            debug!(node = %self.node, visible, "measurement unavailable, request pending");
            self.pending_request = Some(visible);
            if self.mode == SlideMode::Idle {
                self.mode = SlideMode::Measuring;
            }
            return false;
        };

        debug!(node = %self.node, visible, height, "visibility request");
        self.apply_request(visible, height)
    }

    /// Commit a requested visibility once its measurement is known.
    fn apply_request(&mut self, visible: bool, height: f64) -> bool {
        let was_visible = self.target_visible;
        self.measured_height = Some(height);
        self.target_visible = visible;
        self.pending_request = None;

        if matches!(self.mode, SlideMode::Idle | SlideMode::Measuring) {
            // Never measured: start from what the unconstrained node shows.
            let on_screen = if was_visible { height } else { 0.0 };
            self.animator.jump_to(on_screen);
            if visible == was_visible {
                self.mode = SlideMode::Settled;
                return false;
            }
        }

        self.start_animation();
        true
    }

    /// Abort any interpolation: the next frame jumps straight to the target.
    pub fn stop(&mut self) {
        if !self.instant {
            debug!(node = %self.node, mode = ?self.mode, "stop");
        }
        self.instant = true;
    }

    /// Apply a gate outcome.
    pub fn handle(
        &mut self,
        outcome: GateOutcome,
        registry: &SignalRegistry,
        measure: &mut dyn Measure,
    ) {
        if outcome.stop {
            self.stop();
        }
        if let GateAction::ReMeasure(trigger) = outcome.action {
            self.remeasure(trigger, registry, measure);
        }
    }

    fn remeasure(
        &mut self,
        trigger: MeasureTrigger,
        registry: &SignalRegistry,
        measure: &mut dyn Measure,
    ) {
        // A subtree in motion would yield a transient height; its settle
        // event brings us back here.
        if let Some(moving) = registry.moving_descendant(self.node) {
            trace!(node = %self.node, ?trigger, %moving, "re-measure deferred");
            return;
        }
        let Some(height) = measure.measure(self.node) else {
            trace!(node = %self.node, ?trigger, "re-measure unavailable");
            return;
        };
        trace!(node = %self.node, ?trigger, height, "re-measured");

        if let Some(visible) = self.pending_request {
            self.apply_request(visible, height);
            return;
        }

        let target_visible = self.target_visible;
        match self.mode {
            SlideMode::Idle | SlideMode::Measuring => {
                self.apply_request(target_visible, height);
            }
            SlideMode::Animating => {
                self.measured_height = Some(height);
                if !self.instant {
                    self.animator.animate_to(self.target_height(), self.spring);
                }
            }
            SlideMode::Settled => {
                self.measured_height = Some(height);
                // Already showing the natural height; follow it without
                // animating.
                let target = self.target_height();
                if round2(self.animator.current()) != round2(target) {
                    self.animator.jump_to(target);
                }
            }
        }
    }

    fn start_animation(&mut self) {
        self.instant = false;
        self.mode = SlideMode::Animating;
        self.animator.animate_to(self.target_height(), self.spring);
    }

    /// Advance one tick and publish the `sliding` marker.
    ///
    /// Returns the height constraint to apply to the wrapped node.
    pub fn frame(&mut self, dt: Duration, registry: &mut SignalRegistry) -> HeightStyle {
        if std::mem::take(&mut self.instant) {
            self.animator.jump_to(self.target_height());
            if self.mode == SlideMode::Animating {
                self.mode = SlideMode::Settled;
            }
        }

        if let Some(value) = self.animator.next_frame(dt) {
            trace!(node = %self.node, value, target = self.target_height(), "frame");
        }

        let moving = self.is_sliding();
        registry.write_markers(self.node, None, Some(Sliding::from_moving(moving)));
        if !moving && self.mode == SlideMode::Animating {
            self.animator.settle();
            self.mode = SlideMode::Settled;
        }

        self.style()
    }

    /// Height constraint for the current state.
    #[must_use]
    pub fn style(&self) -> HeightStyle {
        let Some(measured) = self.measured_height else {
            return if self.target_visible {
                HeightStyle::Natural
            } else {
                HeightStyle::Clipped(0.0)
            };
        };
        let current = self.animator.current();
        let open = self.target_visible
            && self.mode == SlideMode::Settled
            && round2(current) == round2(measured);
        if open {
            HeightStyle::Natural
        } else {
            HeightStyle::Clipped(current.max(0.0))
        }
    }
}
