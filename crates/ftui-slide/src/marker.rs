#![forbid(unsafe_code)]

//! Signal protocol: per-node markers and the registry that owns them.
//!
//! Every node in the managed tree carries a [`Markers`] pair. Slide instances
//! write markers on their own node to announce whether they are animating,
//! and any instance may force its ancestors to abort by writing
//! [`Slideable::Stop`] upward with [`SignalRegistry::propagate_stop`].
//!
//! The registry doubles as the node tree: it hands out stable [`NodeId`]
//! handles and tracks parent links, so "walk to the root" and "is this node
//! inside my subtree" are explicit queries rather than side effects of a
//! rendered document.
//!
//! # Invariants
//!
//! 1. A write that leaves a marker unchanged records no [`Mutation`]; this is
//!    what keeps the marker feedback loop finite.
//! 2. `propagate_stop` never touches the starting node, only strict
//!    ancestors, and never touches an ancestor whose `slideable` is unset.
//! 3. Once an ancestor reads `Stop`, `propagate_stop` leaves it alone. Only an
//!    explicit marker write moves it off `Stop`.
//!
//! # Failure Modes
//!
//! - Reads of unknown nodes return all-`Unset` markers.
//! - Writes to unknown nodes are ignored and report no change.
//! - Malformed marker strings parse as `Unset`.

use ahash::AHashMap;

use crate::mutation::{Change, Mutation};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable opaque handle for a node in the managed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Marker values
// ---------------------------------------------------------------------------

/// Whether a node is managed by a slide, and whether it was told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slideable {
    /// Not managed.
    #[default]
    Unset,
    /// Managed (`"true"`).
    Active,
    /// Abort the running animation now (`"stop"`).
    Stop,
}

impl Slideable {
    /// Parse the attribute form. Anything unrecognized is `Unset`.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("true") => Self::Active,
            Some("stop") => Self::Stop,
            _ => Self::Unset,
        }
    }

    /// Attribute form, `None` when unset.
    #[must_use]
    pub const fn as_str(self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::Active => Some("true"),
            Self::Stop => Some("stop"),
        }
    }

    /// Whether the marker is present at all.
    #[must_use]
    pub const fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }
}

/// Whether the owning slide is currently away from its target height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sliding {
    /// Never written.
    #[default]
    Unset,
    /// Current height differs from target (`"true"`).
    Moving,
    /// Current height equals target (`"false"`).
    Still,
}

impl Sliding {
    /// Parse the attribute form. Anything unrecognized is `Unset`.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("true") => Self::Moving,
            Some("false") => Self::Still,
            _ => Self::Unset,
        }
    }

    /// Attribute form, `None` when unset.
    #[must_use]
    pub const fn as_str(self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::Moving => Some("true"),
            Self::Still => Some("false"),
        }
    }

    /// Marker value for a moving/still flag.
    #[must_use]
    pub const fn from_moving(moving: bool) -> Self {
        if moving { Self::Moving } else { Self::Still }
    }
}

/// The marker pair attached to one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Markers {
    /// Management / stop directive.
    pub slideable: Slideable,
    /// Motion status.
    pub sliding: Sliding,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct NodeEntry {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    markers: Markers,
    height: Option<f64>,
}

/// Node tree plus marker storage, with a pending log of recorded mutations.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    nodes: AHashMap<NodeId, NodeEntry>,
    next_id: u64,
    pending: Vec<Mutation>,
}

impl SignalRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under `parent` (or as a root). Returns its handle.
    ///
    /// An unknown `parent` inserts the node as a root.
    pub fn insert_node(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        let parent = parent.filter(|p| self.nodes.contains_key(p));
        if let Some(p) = parent
            && let Some(entry) = self.nodes.get_mut(&p)
        {
            entry.children.push(id);
        }

        self.nodes.insert(
            id,
            NodeEntry {
                parent,
                ..NodeEntry::default()
            },
        );
        id
    }

    /// Remove a node and its whole subtree. Returns the removed ids.
    pub fn remove_node(&mut self, id: NodeId) -> Vec<NodeId> {
        let Some(entry) = self.nodes.get(&id) else {
            return Vec::new();
        };
        if let Some(parent) = entry.parent
            && let Some(p) = self.nodes.get_mut(&parent)
        {
            p.children.retain(|c| *c != id);
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(entry) = self.nodes.remove(&next) {
                stack.extend(entry.children);
                removed.push(next);
            }
        }
        self.pending.retain(|m| !removed.contains(&m.node));
        removed
    }

    /// Whether the node exists.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parent of `id`, if any.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|e| e.parent)
    }

    /// Children of `id` in insertion order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether `node` is `root` or lies inside its subtree.
    #[must_use]
    pub fn in_subtree(&self, root: NodeId, node: NodeId) -> bool {
        root == node || self.is_ancestor(root, node)
    }

    /// First strict descendant of `id` whose `sliding` marker reads
    /// `Moving`, in depth-first order.
    #[must_use]
    pub fn moving_descendant(&self, id: NodeId) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if self.read_markers(next).sliding == Sliding::Moving {
                return Some(next);
            }
            stack.extend(self.children(next).iter().rev());
        }
        None
    }

    /// Current markers of `id`. Unknown nodes read as unset.
    #[must_use]
    pub fn read_markers(&self, id: NodeId) -> Markers {
        self.nodes.get(&id).map(|e| e.markers).unwrap_or_default()
    }

    /// Write one or both markers. `None` leaves that marker untouched.
    ///
    /// Records one mutation per marker that actually changed and returns
    /// whether anything changed.
    pub fn write_markers(
        &mut self,
        id: NodeId,
        slideable: Option<Slideable>,
        sliding: Option<Sliding>,
    ) -> bool {
        let Some(entry) = self.nodes.get_mut(&id) else {
            return false;
        };
        let mut changed = false;

        if let Some(new) = slideable
            && entry.markers.slideable != new
        {
            let old = std::mem::replace(&mut entry.markers.slideable, new);
            self.pending.push(Mutation {
                node: id,
                change: Change::Slideable { old, new },
            });
            changed = true;
        }

        if let Some(new) = sliding
            && entry.markers.sliding != new
        {
            let old = std::mem::replace(&mut entry.markers.sliding, new);
            self.pending.push(Mutation {
                node: id,
                change: Change::Sliding { old, new },
            });
            changed = true;
        }

        changed
    }

    /// Force every managed strict ancestor of `id` to `Stop`.
    ///
    /// Returns how many ancestors changed.
    pub fn propagate_stop(&mut self, id: NodeId) -> usize {
        let targets: Vec<NodeId> = self
            .ancestors(id)
            .filter(|a| {
                let slideable = self.read_markers(*a).slideable;
                slideable.is_set() && slideable != Slideable::Stop
            })
            .collect();

        for ancestor in &targets {
            self.write_markers(*ancestor, Some(Slideable::Stop), None);
        }
        targets.len()
    }

    /// Clear both markers on `id`.
    pub fn clear_markers(&mut self, id: NodeId) -> bool {
        self.write_markers(id, Some(Slideable::Unset), Some(Sliding::Unset))
    }

    /// Last recorded rendered height of `id`.
    #[must_use]
    pub fn rendered_height(&self, id: NodeId) -> Option<f64> {
        self.nodes.get(&id).and_then(|e| e.height)
    }

    /// Record a rendered height. Records a mutation only when the height
    /// changed at two-decimal precision.
    pub fn record_height(&mut self, id: NodeId, height: f64) -> bool {
        let Some(entry) = self.nodes.get_mut(&id) else {
            return false;
        };
        let old = entry.height;
        if old.is_some_and(|o| round2(o) == round2(height)) {
            return false;
        }
        entry.height = Some(height);
        self.pending.push(Mutation {
            node: id,
            change: Change::Height { old, new: height },
        });
        true
    }

    /// Drain every mutation recorded since the last call.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.pending)
    }

    /// Whether mutations are waiting to be drained.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Round to two decimal places, the precision used for all height
/// comparisons.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::AttributeKind;

    /// root -> a -> b -> c
    fn chain() -> (SignalRegistry, [NodeId; 4]) {
        let mut reg = SignalRegistry::new();
        let root = reg.insert_node(None);
        let a = reg.insert_node(Some(root));
        let b = reg.insert_node(Some(a));
        let c = reg.insert_node(Some(b));
        (reg, [root, a, b, c])
    }

    #[test]
    fn parse_accepts_attribute_forms() {
        assert_eq!(Slideable::parse(Some("true")), Slideable::Active);
        assert_eq!(Slideable::parse(Some("stop")), Slideable::Stop);
        assert_eq!(Slideable::parse(Some("STOP")), Slideable::Unset);
        assert_eq!(Slideable::parse(None), Slideable::Unset);
        assert_eq!(Sliding::parse(Some("false")), Sliding::Still);
        assert_eq!(Sliding::parse(Some("1")), Sliding::Unset);
        assert_eq!(Sliding::Moving.as_str(), Some("true"));
    }

    #[test]
    fn identical_write_records_nothing() {
        let (mut reg, [_, a, ..]) = chain();
        assert!(reg.write_markers(a, Some(Slideable::Active), Some(Sliding::Still)));
        assert_eq!(reg.take_mutations().len(), 2);

        assert!(!reg.write_markers(a, Some(Slideable::Active), Some(Sliding::Still)));
        assert!(!reg.has_pending());
    }

    #[test]
    fn write_records_old_and_new() {
        let (mut reg, [_, a, ..]) = chain();
        reg.write_markers(a, None, Some(Sliding::Moving));
        let log = reg.take_mutations();
        assert_eq!(
            log[0].change,
            Change::Sliding {
                old: Sliding::Unset,
                new: Sliding::Moving
            }
        );
    }

    #[test]
    fn unknown_node_reads_unset_and_ignores_writes() {
        let mut reg = SignalRegistry::new();
        let ghost = NodeId::from_raw(99);
        assert_eq!(reg.read_markers(ghost), Markers::default());
        assert!(!reg.write_markers(ghost, Some(Slideable::Stop), None));
        assert!(!reg.has_pending());
    }

    #[test]
    fn propagate_stop_reaches_every_managed_ancestor() {
        let (mut reg, [root, a, b, c]) = chain();
        reg.write_markers(root, Some(Slideable::Active), None);
        reg.write_markers(b, Some(Slideable::Active), None);
        reg.write_markers(c, Some(Slideable::Active), None);
        reg.take_mutations();

        assert_eq!(reg.propagate_stop(c), 2);
        assert_eq!(reg.read_markers(root).slideable, Slideable::Stop);
        assert_eq!(reg.read_markers(a).slideable, Slideable::Unset);
        assert_eq!(reg.read_markers(b).slideable, Slideable::Stop);
        // The starting node itself is never stopped.
        assert_eq!(reg.read_markers(c).slideable, Slideable::Active);
    }

    #[test]
    fn propagate_stop_is_monotone() {
        let (mut reg, [root, _, b, c]) = chain();
        reg.write_markers(root, Some(Slideable::Active), None);
        reg.write_markers(b, Some(Slideable::Active), None);
        reg.propagate_stop(c);
        reg.take_mutations();

        assert_eq!(reg.propagate_stop(c), 0);
        assert_eq!(reg.propagate_stop(b), 0);
        assert!(!reg.has_pending());
        assert_eq!(reg.read_markers(b).slideable, Slideable::Stop);
    }

    #[test]
    fn ancestry_queries() {
        let (reg, [root, a, b, c]) = chain();
        assert_eq!(reg.ancestors(c).collect::<Vec<_>>(), vec![b, a, root]);
        assert!(reg.is_ancestor(root, c));
        assert!(!reg.is_ancestor(c, c));
        assert!(reg.in_subtree(c, c));
        assert!(!reg.in_subtree(b, a));
    }

    #[test]
    fn moving_descendant_ignores_self_and_still_nodes() {
        let (mut reg, [root, a, b, c]) = chain();
        reg.write_markers(root, None, Some(Sliding::Moving));
        reg.write_markers(a, None, Some(Sliding::Still));
        assert_eq!(reg.moving_descendant(root), None);

        reg.write_markers(c, None, Some(Sliding::Moving));
        assert_eq!(reg.moving_descendant(root), Some(c));
        assert_eq!(reg.moving_descendant(b), Some(c));
        assert_eq!(reg.moving_descendant(c), None);
    }

    #[test]
    fn remove_drops_subtree_and_its_pending_log() {
        let (mut reg, [root, a, b, c]) = chain();
        reg.write_markers(c, None, Some(Sliding::Moving));
        let removed = reg.remove_node(b);
        assert_eq!(removed.len(), 2);
        assert!(!reg.contains(c));
        assert!(reg.children(a).is_empty());
        assert!(!reg.has_pending());
        assert!(reg.contains(root));
    }

    #[test]
    fn height_records_only_visible_changes() {
        let (mut reg, [_, a, ..]) = chain();
        assert!(reg.record_height(a, 10.0));
        assert!(!reg.record_height(a, 10.001));
        assert!(reg.record_height(a, 10.5));
        let log = reg.take_mutations();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|m| m.kind() == AttributeKind::Height));
    }

    #[test]
    fn round2_rounds_half_away() {
        assert!((round2(1.005_1) - 1.01).abs() < f64::EPSILON);
        assert!((round2(99.994) - 99.99).abs() < f64::EPSILON);
    }
}
