#![forbid(unsafe_code)]

//! Typed mutation records delivered to the gate.
//!
//! Every observable change in the coordination registry is recorded as a
//! [`Mutation`]: the node that changed plus a [`Change`] carrying the old and
//! new value of exactly one attribute. Observers receive them grouped into a
//! [`MutationBatch`].

use crate::marker::{NodeId, Slideable, Sliding};

/// Which attribute of a node changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// The `slideable` marker.
    Slideable,
    /// The `sliding` marker.
    Sliding,
    /// The rendered height of the node.
    Height,
}

/// Old and new value of a single attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    /// `slideable` marker transition.
    Slideable {
        /// Value before the write.
        old: Slideable,
        /// Value after the write.
        new: Slideable,
    },
    /// `sliding` marker transition.
    Sliding {
        /// Value before the write.
        old: Sliding,
        /// Value after the write.
        new: Sliding,
    },
    /// Rendered height transition. `old` is `None` for the first render.
    Height {
        /// Height before the frame was applied.
        old: Option<f64>,
        /// Height after the frame was applied.
        new: f64,
    },
}

impl Change {
    /// The attribute this change touches.
    #[must_use]
    pub const fn kind(&self) -> AttributeKind {
        match self {
            Self::Slideable { .. } => AttributeKind::Slideable,
            Self::Sliding { .. } => AttributeKind::Sliding,
            Self::Height { .. } => AttributeKind::Height,
        }
    }
}

/// A single observed change on one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mutation {
    /// Node whose attribute changed.
    pub node: NodeId,
    /// What changed.
    pub change: Change,
}

impl Mutation {
    /// Shorthand for `self.change.kind()`.
    #[must_use]
    pub const fn kind(&self) -> AttributeKind {
        self.change.kind()
    }
}

/// When a batch should be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum Delivery {
    /// Process within the current pump.
    #[default]
    Immediate,
    /// Hold until the start of the next tick.
    Deferred,
}

/// A non-empty, ordered group of mutations for one observer.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationBatch {
    mutations: Vec<Mutation>,
    delivery: Delivery,
}

impl MutationBatch {
    /// Build a batch. Returns `None` when `mutations` is empty.
    #[must_use]
    pub fn new(mutations: Vec<Mutation>, delivery: Delivery) -> Option<Self> {
        if mutations.is_empty() {
            return None;
        }
        Some(Self {
            mutations,
            delivery,
        })
    }

    /// The first mutation, the only one the gate inspects.
    #[must_use]
    pub fn first(&self) -> &Mutation {
        // Non-empty by construction.
        &self.mutations[0]
    }

    /// All mutations in arrival order.
    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Number of mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Requested processing time.
    #[must_use]
    pub fn delivery(&self) -> Delivery {
        self.delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sliding(node: u64) -> Mutation {
        Mutation {
            node: NodeId::from_raw(node),
            change: Change::Sliding {
                old: Sliding::Moving,
                new: Sliding::Still,
            },
        }
    }

    #[test]
    fn empty_batch_rejected() {
        assert!(MutationBatch::new(Vec::new(), Delivery::Immediate).is_none());
    }

    #[test]
    fn first_is_arrival_order() {
        let batch = MutationBatch::new(vec![sliding(3), sliding(1)], Delivery::Deferred)
            .expect("non-empty");
        assert_eq!(batch.first().node, NodeId::from_raw(3));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.delivery(), Delivery::Deferred);
    }

    #[test]
    fn change_kinds() {
        assert_eq!(sliding(1).kind(), AttributeKind::Sliding);
        let height = Change::Height {
            old: None,
            new: 10.0,
        };
        assert_eq!(height.kind(), AttributeKind::Height);
    }
}
