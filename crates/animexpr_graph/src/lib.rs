// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expression graphs for animation.
//!
//! This crate provides a small numeric expression language for driving
//! animated values:
//! - Node factories for arithmetic, comparison, control flow and animation
//! - An interpreter compiling graphs into thunks per graph instance
//! - A serializer emitting plain trees for an external evaluator
//! - Derived operators (interpolation, change detection, clock-driven
//!   timing/spring/decay progression)
//!
//! ## Architecture
//!
//! Graphs are built from immutable, shareable [`Node`]s. A graph becomes live
//! through an [`Expression`], which owns the compiled thunks and the private
//! state of stateful operators, and subscribes to the cells the graph reads
//! while attached. Animation runs, host callbacks and configuration are shared
//! through a [`Runtime`]. The same graph can be handed to an external runtime
//! as a [`PlainNode`] tree; [`PlainEvaluator`] interprets such trees and must
//! agree with the interpreter.

pub mod animation;
pub mod callbacks;
pub mod cell;
pub mod collect;
pub mod config;
pub mod convert;
pub mod derived;
pub mod error;
pub mod evaluation;
pub mod expression;
pub mod factories;
pub mod node;
pub mod params;
pub mod procedure;
pub mod replay;
pub mod runtime;
pub mod trace;

pub use animation::{Animator, RunId};
pub use callbacks::CallbackRouter;
pub use cell::{AnimatedValue, CellHandle, CellTag, NumericCell, SubscriptionId};
pub use collect::{collect, Dependencies};
pub use config::RuntimeConfig;
pub use convert::{serialize, PlainKind, PlainNode};
pub use error::{GraphError, Result};
pub use expression::{evaluate_once, Expression, InstanceId};
pub use factories::Operand;
pub use node::{CompareOp, HostCallback, MultiOp, Node, NodeId, NodeKind, UnaryOp};
pub use params::{AnimationParams, DecayParams, SpringParams, TimingParams};
pub use procedure::Procedure;
pub use replay::{CellRegistry, PlainEvaluator};
pub use runtime::Runtime;
pub use trace::{TraceEntry, TraceLog};
