#![forbid(unsafe_code)]

//! Single-threaded coordinator for a tree of slides.
//!
//! # Design
//!
//! The coordinator owns the [`SignalRegistry`] and every [`Slide`], and runs
//! a FIFO task queue. There are two kinds of task:
//!
//! - **Frame**: advance one slide by `dt`, apply its height constraint, and
//!   record its rendered height.
//! - **Deliver**: run one mutation batch through the gate on behalf of one
//!   slide, then hand any non-trivial outcome to the slide.
//!
//! Each task runs to completion. Afterwards every mutation it recorded is
//! routed: each slide observes its own node and its whole subtree, and gets
//! one batch per task containing the mutations inside its scope, in order.
//!
//! # Invariants
//!
//! 1. No task is interrupted by another; marker writes made while a task
//!    runs are only seen by gates once that task has finished.
//! 2. A batch delivered to a slide that is already processing one is
//!    re-queued rather than processed recursively.
//! 3. External calls (`attach`, `request`, `stop`, ...) never run gates
//!    themselves; their marker writes are routed at the start of the next
//!    [`tick`](SlideCoordinator::tick) or [`flush`](SlideCoordinator::flush).
//!
//! # Failure Modes
//!
//! - **Runaway cascade**: a pump stops after `max_cascade` tasks, logs a
//!   warning, and leaves the rest of the queue for the next tick.
//! - **Unknown node**: calls naming a node without a slide are logged and
//!   ignored.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use ahash::AHashMap;
use tracing::{debug, debug_span, trace, warn};
use web_time::Instant;

use crate::collab::{HeightStyle, Measure, Render};
use crate::config::SlideConfig;
use crate::gate;
use crate::marker::{NodeId, SignalRegistry};
use crate::mutation::{Delivery, Mutation, MutationBatch};
use crate::slide::{Slide, SlideMode};

#[derive(Debug, Clone)]
enum Task {
    Frame(NodeId, Duration),
    Deliver(NodeId, MutationBatch),
}

impl Task {
    fn node(&self) -> NodeId {
        match self {
            Self::Frame(node, _) | Self::Deliver(node, _) => *node,
        }
    }
}

/// Counters describing coordinator activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Calls to `tick` (including via `frame_at`).
    pub ticks: u64,
    /// Frame tasks run.
    pub frames: u64,
    /// Batches whose gate outcome was handed to a slide.
    pub batches_handled: u64,
    /// Batches filtered out as no-ops by the gate.
    pub batches_filtered: u64,
    /// Batches re-queued by the re-entrancy guard.
    pub batches_requeued: u64,
    /// Pumps cut short by `max_cascade`.
    pub cascade_limit_hits: u64,
}

/// Owns the node registry and all slides and drives them.
#[derive(Debug)]
pub struct SlideCoordinator {
    registry: SignalRegistry,
    slides: BTreeMap<NodeId, Slide>,
    queue: VecDeque<Task>,
    deferred: VecDeque<Task>,
    applied: AHashMap<NodeId, HeightStyle>,
    config: SlideConfig,
    last_frame: Option<Instant>,
    stats: CoordinatorStats,
}

impl Default for SlideCoordinator {
    fn default() -> Self {
        Self::new(SlideConfig::default())
    }
}

impl SlideCoordinator {
    /// Create an empty coordinator.
    #[must_use]
    pub fn new(config: SlideConfig) -> Self {
        Self {
            registry: SignalRegistry::new(),
            slides: BTreeMap::new(),
            queue: VecDeque::new(),
            deferred: VecDeque::new(),
            applied: AHashMap::new(),
            config,
            last_frame: None,
            stats: CoordinatorStats::default(),
        }
    }

    // -- Accessors ------------------------------------------------------

    /// The node tree and its markers.
    #[must_use]
    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    /// Mutable access to the node tree.
    ///
    /// Marker writes made here are routed on the next tick like any other.
    pub fn registry_mut(&mut self) -> &mut SignalRegistry {
        &mut self.registry
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SlideConfig {
        &self.config
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    /// The slide managing `node`, if any.
    #[must_use]
    pub fn slide(&self, node: NodeId) -> Option<&Slide> {
        self.slides.get(&node)
    }

    /// All slides, ordered by node id.
    pub fn slides(&self) -> impl Iterator<Item = &Slide> {
        self.slides.values()
    }

    /// Last style applied to `node`.
    #[must_use]
    pub fn applied_style(&self, node: NodeId) -> Option<HeightStyle> {
        self.applied.get(&node).copied()
    }

    /// Insert a node into the tree (shorthand for the registry call).
    pub fn insert_node(&mut self, parent: Option<NodeId>) -> NodeId {
        self.registry.insert_node(parent)
    }

    /// Whether nothing is moving and nothing is queued.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.queue.is_empty()
            && self.deferred.is_empty()
            && !self.registry.has_pending()
            && self
                .slides
                .values()
                .all(|s| s.mode() != SlideMode::Animating && !s.has_pending_frame())
    }

    // -- External requests ----------------------------------------------

    /// Put `node` under slide control and take its first measurement.
    ///
    /// Returns `false` if the node is unknown or already managed.
    pub fn attach(&mut self, node: NodeId, visible: bool, measure: &mut dyn Measure) -> bool {
        if !self.registry.contains(node) {
            warn!(node = %node, "attach: unknown node");
            return false;
        }
        if self.slides.contains_key(&node) {
            return false;
        }
        let mut slide = Slide::new(node, visible, self.config.spring);
        slide.mount(&mut self.registry, measure);
        debug!(node = %node, visible, mode = ?slide.mode(), "attached");
        self.slides.insert(node, slide);
        true
    }

    /// Release `node` from slide control, clearing its markers.
    pub fn detach(&mut self, node: NodeId) -> Option<Slide> {
        let slide = self.slides.remove(&node)?;
        self.registry.clear_markers(node);
        self.queue.retain(|t| t.node() != node);
        self.deferred.retain(|t| t.node() != node);
        self.applied.remove(&node);
        debug!(node = %node, "detached");
        Some(slide)
    }

    /// Remove `node` and its subtree from the tree, detaching every slide
    /// inside it.
    pub fn remove_node(&mut self, node: NodeId) -> Vec<NodeId> {
        let managed: Vec<NodeId> = self
            .slides
            .keys()
            .copied()
            .filter(|n| self.registry.in_subtree(node, *n))
            .collect();
        for n in managed {
            self.detach(n);
        }
        let removed = self.registry.remove_node(node);
        for n in &removed {
            self.applied.remove(n);
        }
        removed
    }

    /// Show or hide the panel at `node`.
    ///
    /// Returns whether an animation started.
    pub fn request(&mut self, node: NodeId, visible: bool, measure: &mut dyn Measure) -> bool {
        let Some(slide) = self.slides.get_mut(&node) else {
            warn!(node = %node, visible, "request: no slide for node");
            return false;
        };
        slide.set_visible(visible, &mut self.registry, measure)
    }

    /// Flip the visibility of the panel at `node`, counting a request that
    /// is still waiting for a measurement.
    pub fn toggle(&mut self, node: NodeId, measure: &mut dyn Measure) -> bool {
        let Some(visible) = self
            .slides
            .get(&node)
            .map(|s| s.pending_visible().unwrap_or(s.target_visible()))
        else {
            warn!(node = %node, "toggle: no slide for node");
            return false;
        };
        self.request(node, !visible, measure)
    }

    /// Stop the panel at `node`: it snaps to its target on the next frame.
    pub fn stop(&mut self, node: NodeId) -> bool {
        let Some(slide) = self.slides.get_mut(&node) else {
            warn!(node = %node, "stop: no slide for node");
            return false;
        };
        slide.stop();
        true
    }

    // -- Driving ----------------------------------------------------------

    /// Advance every slide by `dt` and process the resulting mutations.
    pub fn tick(&mut self, dt: Duration, measure: &mut dyn Measure, render: &mut dyn Render) {
        self.stats.ticks += 1;
        self.route_pending();
        self.queue.extend(self.deferred.drain(..));
        self.queue
            .extend(self.slides.keys().map(|node| Task::Frame(*node, dt)));
        self.pump(measure, render);
    }

    /// Tick with a `dt` derived from the previous call, capped at
    /// `max_frame_dt`. The first call advances by zero.
    pub fn frame_at(&mut self, now: Instant, measure: &mut dyn Measure, render: &mut dyn Render) {
        let dt = match self.last_frame.replace(now) {
            Some(prev) => now
                .saturating_duration_since(prev)
                .min(self.config.max_frame_dt()),
            None => Duration::ZERO,
        };
        self.tick(dt, measure, render);
    }

    /// Route pending mutations and process queued deliveries without
    /// advancing any animation. Deferred batches stay deferred.
    pub fn flush(&mut self, measure: &mut dyn Measure, render: &mut dyn Render) {
        self.route_pending();
        self.pump(measure, render);
    }

    /// Tick at a fixed `dt` until settled. Returns the number of ticks, or
    /// `None` if still moving after `max_ticks`.
    pub fn run_until_settled(
        &mut self,
        dt: Duration,
        max_ticks: usize,
        measure: &mut dyn Measure,
        render: &mut dyn Render,
    ) -> Option<usize> {
        for ticks in 1..=max_ticks {
            self.tick(dt, measure, render);
            if self.is_settled() {
                return Some(ticks);
            }
        }
        None
    }

    fn pump(&mut self, measure: &mut dyn Measure, render: &mut dyn Render) {
        let span = debug_span!("slide.pump", queued = self.queue.len());
        let _guard = span.enter();

        let mut processed = 0usize;
        while let Some(task) = self.queue.pop_front() {
            if processed >= self.config.max_cascade {
                self.queue.push_front(task);
                self.stats.cascade_limit_hits += 1;
                warn!(
                    limit = self.config.max_cascade,
                    remaining = self.queue.len(),
                    "cascade limit reached, yielding to next tick"
                );
                break;
            }
            processed += 1;

            match task {
                Task::Frame(node, dt) => self.run_frame(node, dt, render),
                Task::Deliver(node, batch) => self.deliver(node, batch, measure),
            }
            self.route_pending();
        }
    }

    fn run_frame(&mut self, node: NodeId, dt: Duration, render: &mut dyn Render) {
        let Some(slide) = self.slides.get_mut(&node) else {
            return;
        };
        self.stats.frames += 1;

        let style = slide.frame(dt, &mut self.registry);
        if self.applied.get(&node) != Some(&style) {
            render.apply(node, style);
            self.applied.insert(node, style);
        }

        let rendered = match style {
            HeightStyle::Clipped(h) => Some(h),
            HeightStyle::Natural => slide.measured_height(),
        };
        if let Some(height) = rendered {
            self.registry.record_height(node, height);
        }
    }

    fn deliver(&mut self, node: NodeId, batch: MutationBatch, measure: &mut dyn Measure) {
        let Some(slide) = self.slides.get_mut(&node) else {
            return;
        };
        if !slide.begin_processing() {
            self.stats.batches_requeued += 1;
            self.queue.push_back(Task::Deliver(node, batch));
            return;
        }

        let outcome = gate::evaluate(&mut self.registry, node, Some(&batch));
        if outcome.is_noop() {
            self.stats.batches_filtered += 1;
            trace!(node = %node, first = ?batch.first(), "batch filtered");
        } else {
            self.stats.batches_handled += 1;
            debug!(node = %node, decision = ?outcome.decision(), "gate");
            slide.handle(outcome, &self.registry, measure);
        }
        slide.end_processing();
    }

    fn route_pending(&mut self) {
        let mutations = self.registry.take_mutations();
        if mutations.is_empty() {
            return;
        }

        for observer in self.slides.keys() {
            let scoped: Vec<Mutation> = mutations
                .iter()
                .filter(|m| self.registry.in_subtree(*observer, m.node))
                .copied()
                .collect();
            let Some(batch) = MutationBatch::new(scoped, self.config.delivery) else {
                continue;
            };
            let task = Task::Deliver(*observer, batch);
            match self.config.delivery {
                Delivery::Immediate => self.queue.push_back(task),
                Delivery::Deferred => self.deferred.push_back(task),
            }
        }
    }
}
