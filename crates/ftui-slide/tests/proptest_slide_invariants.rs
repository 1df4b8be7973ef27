//! Property-based invariant tests for slide coordination.
//!
//! 1. Arbitrary request/stop/tick sequences on a nested tree always settle,
//!    even when measurements start or stop failing in between
//! 2. After settling, no node reads `sliding = Moving` and every slide rests
//!    on its target
//! 3. A settled tree stays settled under further ticks
//! 4. `propagate_stop` never moves a marker off `Stop`
//! 5. Rewriting unchanged markers records no mutation
//! 6. Animator frame streams end exactly on their target

use std::time::Duration;

use ftui_slide::testing::FakeLayout;
use ftui_slide::{
    HeightAnimator, NodeId, SignalRegistry, SlideConfig, SlideCoordinator, SlideMode, Slideable,
    Sliding, SpringConfig, round2,
};
use proptest::prelude::*;

const MS_16: Duration = Duration::from_millis(16);
const MAX_TICKS: usize = 3000;

// ── Strategies ──────────────────────────────────────────────────────────

/// Operations applied to the nested fixture. Slide indices are taken
/// modulo the number of slides.
#[derive(Debug, Clone)]
enum Op {
    Request(usize, bool),
    Stop(usize),
    Tick(u8),
    SetContent(usize, u16),
    SetUnavailable(usize, bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..4, any::<bool>()).prop_map(|(i, v)| Op::Request(i, v)),
        1 => (0usize..4).prop_map(Op::Stop),
        4 => (1u8..12).prop_map(Op::Tick),
        1 => (0usize..4, 0u16..200).prop_map(|(i, h)| Op::SetContent(i, h)),
        1 => (0usize..4, any::<bool>()).prop_map(|(i, u)| Op::SetUnavailable(i, u)),
    ]
}

fn spring_strategy() -> impl Strategy<Value = SpringConfig> {
    prop_oneof![
        Just(SpringConfig::no_wobble()),
        Just(SpringConfig::gentle()),
        Just(SpringConfig::wobbly()),
        Just(SpringConfig::stiff()),
    ]
}

fn slideable_strategy() -> impl Strategy<Value = Slideable> {
    prop_oneof![
        Just(Slideable::Unset),
        Just(Slideable::Active),
        Just(Slideable::Stop),
    ]
}

// ── Fixture ─────────────────────────────────────────────────────────────

struct Fixture {
    coord: SlideCoordinator,
    layout: FakeLayout,
    /// root -> middle -> leaf, root -> side
    slides: [NodeId; 4],
}

impl Fixture {
    fn new(spring: SpringConfig) -> Self {
        let mut coord = SlideCoordinator::new(SlideConfig::default().with_spring(spring));
        let layout = FakeLayout::new();

        let root = coord.insert_node(None);
        let middle = coord.insert_node(Some(root));
        let leaf = coord.insert_node(Some(middle));
        let side = coord.insert_node(Some(root));
        layout.mirror(coord.registry(), root);
        for (node, content) in [(root, 10.0), (middle, 20.0), (leaf, 40.0), (side, 30.0)] {
            layout.set_content(node, content);
        }

        let mut measure = layout.clone();
        for node in [root, middle, leaf, side] {
            coord.attach(node, true, &mut measure);
        }

        Self {
            coord,
            layout,
            slides: [root, middle, leaf, side],
        }
    }

    fn apply(&mut self, op: &Op) {
        let mut measure = self.layout.clone();
        let mut render = self.layout.clone();
        match *op {
            Op::Request(i, visible) => {
                self.coord.request(self.slides[i % 4], visible, &mut measure);
            }
            Op::Stop(i) => {
                self.coord.stop(self.slides[i % 4]);
            }
            Op::Tick(n) => {
                for _ in 0..n {
                    self.coord.tick(MS_16, &mut measure, &mut render);
                }
            }
            Op::SetContent(i, h) => self.layout.set_content(self.slides[i % 4], f64::from(h)),
            Op::SetUnavailable(i, unavailable) => {
                self.layout.set_unavailable(self.slides[i % 4], unavailable);
            }
        }
    }

    fn settle(&mut self) -> Option<usize> {
        let mut measure = self.layout.clone();
        let mut render = self.layout.clone();
        self.coord
            .run_until_settled(MS_16, MAX_TICKS, &mut measure, &mut render)
    }
}

/// Random tree: node `i + 1` hangs under a node drawn from `0..=i`.
fn build_tree(parents: &[prop::sample::Index], marks: &[Slideable]) -> (SignalRegistry, Vec<NodeId>) {
    let mut reg = SignalRegistry::new();
    let mut nodes = vec![reg.insert_node(None)];
    for idx in parents {
        let parent = nodes[idx.index(nodes.len())];
        nodes.push(reg.insert_node(Some(parent)));
    }
    for (node, mark) in nodes.iter().zip(marks.iter().cycle()) {
        reg.write_markers(*node, Some(*mark), None);
    }
    reg.take_mutations();
    (reg, nodes)
}

// ═══════════════════════════════════════════════════════════════════════
// 1–3. Coordination converges and stays converged
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn arbitrary_sequences_settle(
        spring in spring_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..40),
    ) {
        let mut fx = Fixture::new(spring);
        for op in &ops {
            fx.apply(op);
        }
        prop_assert!(fx.settle().is_some(), "did not settle after {:?}", ops);
    }

    #[test]
    fn settled_tree_is_still_and_on_target(
        spring in spring_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..40),
    ) {
        let mut fx = Fixture::new(spring);
        for op in &ops {
            fx.apply(op);
        }
        prop_assume!(fx.settle().is_some());

        for node in fx.slides {
            let slide = fx.coord.slide(node).expect("attached");
            prop_assert_ne!(slide.mode(), SlideMode::Animating);
            prop_assert_eq!(round2(slide.current_height()), round2(slide.target_height()));
            prop_assert_eq!(fx.coord.registry().read_markers(node).sliding, Sliding::Still);
        }
    }

    #[test]
    fn settled_tree_stays_settled(
        spring in spring_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..30),
        extra in 1u8..60,
    ) {
        let mut fx = Fixture::new(spring);
        for op in &ops {
            fx.apply(op);
        }
        prop_assume!(fx.settle().is_some());

        let handled = fx.coord.stats().batches_handled;
        let heights: Vec<f64> = fx
            .slides
            .iter()
            .map(|n| fx.coord.slide(*n).map_or(0.0, |s| s.current_height()))
            .collect();
        fx.apply(&Op::Tick(extra));

        prop_assert!(fx.coord.is_settled());
        prop_assert_eq!(fx.coord.stats().batches_handled, handled);
        for (node, before) in fx.slides.iter().zip(heights) {
            let slide = fx.coord.slide(*node).expect("attached");
            prop_assert_eq!(slide.mode(), SlideMode::Settled);
            prop_assert!((slide.current_height() - before).abs() < f64::EPSILON);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4–5. Marker protocol
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn propagate_stop_is_monotone(
        parents in prop::collection::vec(any::<prop::sample::Index>(), 1..16),
        marks in prop::collection::vec(slideable_strategy(), 1..8),
        starts in prop::collection::vec(any::<prop::sample::Index>(), 1..20),
    ) {
        let (mut reg, nodes) = build_tree(&parents, &marks);

        for start in starts {
            let origin = nodes[start.index(nodes.len())];
            let before: Vec<Slideable> = nodes.iter().map(|n| reg.read_markers(*n).slideable).collect();
            reg.propagate_stop(origin);

            for (node, old) in nodes.iter().zip(before) {
                let now = reg.read_markers(*node).slideable;
                if old == Slideable::Stop {
                    prop_assert_eq!(now, Slideable::Stop);
                }
                if !old.is_set() || *node == origin || !reg.is_ancestor(*node, origin) {
                    prop_assert_eq!(now, old);
                } else {
                    prop_assert_eq!(now, Slideable::Stop);
                }
            }
        }
    }

    #[test]
    fn unchanged_writes_record_nothing(
        parents in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
        marks in prop::collection::vec(slideable_strategy(), 1..4),
        moving in any::<bool>(),
    ) {
        let (mut reg, nodes) = build_tree(&parents, &marks);
        for node in &nodes {
            reg.write_markers(*node, None, Some(Sliding::from_moving(moving)));
        }
        reg.take_mutations();

        for node in &nodes {
            let markers = reg.read_markers(*node);
            prop_assert!(!reg.write_markers(*node, Some(markers.slideable), Some(markers.sliding)));
        }
        prop_assert!(!reg.has_pending());
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 6. Animator termination
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn frames_end_on_target(
        spring in spring_strategy(),
        start in 0.0f64..2000.0,
        target in 0.0f64..2000.0,
        redirect in prop::option::of((1usize..30, 0.0f64..2000.0)),
    ) {
        let mut animator = HeightAnimator::new(start, spring);
        animator.animate_to(target, spring);
        let mut goal = target;

        let mut frames = animator.frames(MS_16);
        let mut count = 0usize;
        let mut last = None;
        while let Some(value) = frames.next() {
            count += 1;
            last = Some(value);
            if let Some((at, new_goal)) = redirect
                && count == at
            {
                frames.animator().animate_to(new_goal, spring);
                goal = new_goal;
            }
            prop_assert!(count < 20_000, "animation did not terminate");
        }

        if let Some(value) = last {
            prop_assert!((value - goal).abs() < 0.01, "ended at {value}, wanted {goal}");
        }
        prop_assert!(animator.is_settled());
    }
}
