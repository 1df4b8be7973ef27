#![forbid(unsafe_code)]

//! Slide: coordinated height animation for nested collapsible panels.
//!
//! # Role in FrankenTUI
//! `ftui-slide` animates the collapse and expand of panels that may nest
//! inside one another. The spring math is the easy part; the crate exists
//! for the coordination protocol around it.
//!
//! # Primary responsibilities
//! - **Signal protocol** ([`marker`]): per-node `slideable` / `sliding`
//!   markers in a [`SignalRegistry`], with upward stop propagation.
//! - **Mutation gate** ([`gate`]): decides, per observed batch, whether a
//!   slide re-measures, stops, or ignores it.
//! - **Slide instances** ([`slide`]): the `Idle → Measuring → Animating →
//!   Settled` lifecycle of one panel.
//! - **Height animation** ([`animator`], [`spring`]): interruptible spring
//!   interpolation with snap support.
//! - **Coordination** ([`coordinator`]): a single-threaded task queue that
//!   runs frames, routes mutations to observers and guards re-entrancy.
//!
//! # How it fits in the system
//! The embedding toolkit owns layout and drawing. It implements [`Measure`]
//! and [`Render`] over its node storage, mirrors its tree into the
//! coordinator's registry, and calls [`SlideCoordinator::tick`] once per
//! frame.
//!
//! ```
//! use std::time::Duration;
//! use ftui_slide::{NullRender, NodeId, SlideConfig, SlideCoordinator};
//!
//! let mut coord = SlideCoordinator::new(SlideConfig::default());
//! let panel = coord.insert_node(None);
//! let mut measure = |_: NodeId| Some(120.0);
//!
//! coord.attach(panel, true, &mut measure);
//! coord.request(panel, false, &mut measure);
//! let ticks = coord.run_until_settled(Duration::from_millis(16), 600, &mut measure, &mut NullRender);
//! assert!(ticks.is_some());
//! ```

pub mod animator;
pub mod collab;
pub mod config;
pub mod coordinator;
pub mod gate;
pub mod marker;
pub mod mutation;
pub mod slide;
pub mod spring;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use animator::{Frames, HeightAnimator};
pub use collab::{HeightStyle, Measure, NullRender, Render};
pub use config::{ConfigError, SlideConfig};
pub use coordinator::{CoordinatorStats, SlideCoordinator};
pub use gate::{GateAction, GateDecision, GateOutcome, MeasureTrigger};
pub use marker::{Markers, NodeId, SignalRegistry, Slideable, Sliding, round2};
pub use mutation::{AttributeKind, Change, Delivery, Mutation, MutationBatch};
pub use slide::{Slide, SlideMode};
pub use spring::{Spring, SpringConfig};
