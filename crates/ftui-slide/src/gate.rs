#![forbid(unsafe_code)]

//! Mutation gate: decides how a slide reacts to an observed batch.
//!
//! The gate runs once per delivered batch, before the slide's own handler.
//! It always notifies first (stop propagation toward the root) and decides
//! second:
//!
//! 1. A `Stop` directive on the mutated node requests a local stop.
//! 2. Every strict ancestor of the mutated node is forced to `Stop`.
//! 3. A change on the slide's own node while it reads `Moving` asks for a
//!    fresh measurement of itself.
//! 4. A node inside the subtree that reads exactly `Still` has finished
//!    moving, so the slide can now trust a fresh measurement.
//! 5. The slide's own `sliding` writes are ignored.
//!
//! Only the first mutation of a batch is examined. Later mutations in the
//! same batch are dropped: within a tick, the first relevant writer wins.
//!
//! # Invariants
//!
//! 1. With no batch at all (first call after mount) the gate asks for a
//!    measurement and has no side effects.
//! 2. A descendant that reads `Moving` never triggers a measurement of the
//!    observing slide.
//! 3. [`GateOutcome::is_noop`] outcomes carry no work for the slide; the
//!    coordinator uses it as the delivery filter.

use crate::marker::{NodeId, SignalRegistry, Sliding, Slideable};
use crate::mutation::{AttributeKind, MutationBatch};

/// Why a slide must measure again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureTrigger {
    /// The slide's own node changed while it is moving (or it was never
    /// measured).
    SelfNode,
    /// A descendant finished moving.
    DescendantSettled(NodeId),
}

/// The work the gate hands to the slide besides a possible stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// Nothing to do.
    Ignore,
    /// Measure again.
    ReMeasure(MeasureTrigger),
}

/// Three-way summary of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// No reaction.
    Ignore,
    /// Snap and stop, nothing to measure.
    ForceStop,
    /// Measure again (possibly after stopping).
    ReMeasure(MeasureTrigger),
}

/// Full result of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    /// The slide must run its `stop` transition.
    pub stop: bool,
    /// Follow-up work.
    pub action: GateAction,
}

impl GateOutcome {
    /// Whether this outcome asks nothing of the slide.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.stop && self.action == GateAction::Ignore
    }

    /// Collapse into the three-way decision.
    #[must_use]
    pub fn decision(&self) -> GateDecision {
        match self.action {
            GateAction::ReMeasure(trigger) => GateDecision::ReMeasure(trigger),
            GateAction::Ignore if self.stop => GateDecision::ForceStop,
            GateAction::Ignore => GateDecision::Ignore,
        }
    }
}

/// Evaluate a batch on behalf of the slide managing `own`.
///
/// Mutates `registry` only through [`SignalRegistry::propagate_stop`].
pub fn evaluate(
    registry: &mut SignalRegistry,
    own: NodeId,
    batch: Option<&MutationBatch>,
) -> GateOutcome {
    let Some(batch) = batch else {
        return GateOutcome {
            stop: false,
            action: GateAction::ReMeasure(MeasureTrigger::SelfNode),
        };
    };

    let first = batch.first();
    let target = first.node;
    let markers = registry.read_markers(target);

    let stop = markers.slideable == Slideable::Stop;
    registry.propagate_stop(target);

    let action = match (target == own, markers.sliding) {
        (true, Sliding::Moving) => GateAction::ReMeasure(MeasureTrigger::SelfNode),
        // A slide's own `sliding` write must not retrigger it.
        (true, _) if first.kind() == AttributeKind::Sliding => GateAction::Ignore,
        (false, Sliding::Still) => {
            GateAction::ReMeasure(MeasureTrigger::DescendantSettled(target))
        }
        _ => GateAction::Ignore,
    };

    GateOutcome { stop, action }
}
