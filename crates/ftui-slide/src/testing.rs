#![forbid(unsafe_code)]

//! In-memory layout for tests: a [`Measure`] + [`Render`] pair over a toy
//! tree of fixed-height content blocks.
//!
//! A node's natural height is its own content height plus the rendered
//! height of each child, where a child's rendered height is whatever its
//! last applied [`HeightStyle`] resolves to. Collapsing a child therefore
//! shrinks every ancestor's natural height, which is exactly what nested
//! slides have to cope with.
//!
//! [`FakeLayout`] is a handle: clones share one layout, so one clone can be
//! passed as the measurer and another as the renderer of the same tick.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

use crate::collab::{HeightStyle, Measure, Render};
use crate::marker::{NodeId, SignalRegistry};

/// One observable call made against a [`FakeLayout`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutEvent {
    /// `measure(node)` returned this value.
    Measured(NodeId, Option<f64>),
    /// `apply(node, style)` was called.
    Applied(NodeId, HeightStyle),
}

#[derive(Debug, Default)]
struct LayoutState {
    content: AHashMap<NodeId, f64>,
    children: AHashMap<NodeId, Vec<NodeId>>,
    styles: AHashMap<NodeId, HeightStyle>,
    unavailable: AHashSet<NodeId>,
    events: Vec<LayoutEvent>,
}

impl LayoutState {
    fn natural(&self, node: NodeId) -> f64 {
        let own = self.content.get(&node).copied().unwrap_or(0.0);
        let kids: f64 = self
            .children
            .get(&node)
            .map(|kids| kids.iter().map(|c| self.rendered(*c)).sum())
            .unwrap_or(0.0);
        own + kids
    }

    fn rendered(&self, node: NodeId) -> f64 {
        let natural = self.natural(node);
        self.styles
            .get(&node)
            .map_or(natural, |style| style.resolve(natural))
    }
}

/// Toy layout engine.
#[derive(Debug, Clone, Default)]
pub struct FakeLayout {
    state: Rc<RefCell<LayoutState>>,
}

impl FakeLayout {
    /// Create an empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror the tree structure of `registry` below `root`, giving new
    /// nodes zero content.
    pub fn mirror(&self, registry: &SignalRegistry, root: NodeId) {
        let mut state = self.state.borrow_mut();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let kids = registry.children(node).to_vec();
            state.content.entry(node).or_insert(0.0);
            stack.extend(kids.iter().copied());
            state.children.insert(node, kids);
        }
    }

    /// Set the intrinsic content height of `node`.
    pub fn set_content(&self, node: NodeId, height: f64) {
        self.state.borrow_mut().content.insert(node, height);
    }

    /// Declare `child` as a child of `parent`.
    pub fn add_child(&self, parent: NodeId, child: NodeId) {
        let mut state = self.state.borrow_mut();
        let kids = state.children.entry(parent).or_default();
        if !kids.contains(&child) {
            kids.push(child);
        }
        state.content.entry(child).or_insert(0.0);
    }

    /// Make measurements of `node` fail (or succeed again).
    pub fn set_unavailable(&self, node: NodeId, unavailable: bool) {
        let mut state = self.state.borrow_mut();
        if unavailable {
            state.unavailable.insert(node);
        } else {
            state.unavailable.remove(&node);
        }
    }

    /// Natural height of `node`.
    #[must_use]
    pub fn natural(&self, node: NodeId) -> f64 {
        self.state.borrow().natural(node)
    }

    /// Height `node` currently occupies given its applied style.
    #[must_use]
    pub fn rendered(&self, node: NodeId) -> f64 {
        self.state.borrow().rendered(node)
    }

    /// Last style applied to `node`.
    #[must_use]
    pub fn style(&self, node: NodeId) -> Option<HeightStyle> {
        self.state.borrow().styles.get(&node).copied()
    }

    /// Every call observed so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<LayoutEvent> {
        self.state.borrow().events.clone()
    }

    /// Drain the event log.
    pub fn take_events(&self) -> Vec<LayoutEvent> {
        std::mem::take(&mut self.state.borrow_mut().events)
    }
}

impl Measure for FakeLayout {
    fn measure(&mut self, node: NodeId) -> Option<f64> {
        let mut state = self.state.borrow_mut();
        let height = if state.unavailable.contains(&node) || !state.content.contains_key(&node) {
            None
        } else {
            Some(state.natural(node))
        };
        state.events.push(LayoutEvent::Measured(node, height));
        height
    }
}

impl Render for FakeLayout {
    fn apply(&mut self, node: NodeId, style: HeightStyle) {
        let mut state = self.state.borrow_mut();
        state.styles.insert(node, style);
        state.events.push(LayoutEvent::Applied(node, style));
    }
}
