#![forbid(unsafe_code)]

//! Collaborator seams: measuring nodes and applying height constraints.
//!
//! The coordination core never touches a real layout engine. The embedding
//! toolkit implements [`Measure`] and [`Render`] over its own node storage,
//! keyed by the same [`NodeId`] handles the registry hands out.

use crate::marker::NodeId;

/// Reads the natural (unconstrained) height of a live node.
pub trait Measure {
    /// Natural height of `node`'s subtree, or `None` when it cannot be
    /// measured right now (detached, not laid out yet, ...).
    fn measure(&mut self, node: NodeId) -> Option<f64>;
}

impl<F> Measure for F
where
    F: FnMut(NodeId) -> Option<f64>,
{
    fn measure(&mut self, node: NodeId) -> Option<f64> {
        self(node)
    }
}

/// Height constraint a slide places on the node it wraps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeightStyle {
    /// No constraint; the node takes its natural height.
    Natural,
    /// Fixed height with overflow clipped.
    Clipped(f64),
}

impl HeightStyle {
    /// The height this style renders at, given the node's natural height.
    #[must_use]
    pub fn resolve(self, natural: f64) -> f64 {
        match self {
            Self::Natural => natural,
            Self::Clipped(h) => h,
        }
    }
}

/// Applies a height constraint to a rendered node.
///
/// Implementations must keep node identity stable across calls.
pub trait Render {
    /// Apply `style` to `node`.
    fn apply(&mut self, node: NodeId, style: HeightStyle);
}

/// A renderer that discards every style.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRender;

impl Render for NullRender {
    fn apply(&mut self, _node: NodeId, _style: HeightStyle) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_measure() {
        let mut calls = 0;
        let mut m = |node: NodeId| {
            calls += 1;
            Some(node.raw() as f64 * 10.0)
        };
        assert_eq!(Measure::measure(&mut m, NodeId::from_raw(3)), Some(30.0));
        assert_eq!(calls, 1);
    }

    #[test]
    fn style_resolution() {
        assert!((HeightStyle::Natural.resolve(80.0) - 80.0).abs() < f64::EPSILON);
        assert!((HeightStyle::Clipped(12.5).resolve(80.0) - 12.5).abs() < f64::EPSILON);
    }
}
