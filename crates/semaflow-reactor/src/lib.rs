//! The semaflow dataflow engine.
//!
//! A [`Reactor`] computes named attributes on the nodes of an AST (or any
//! object graph) by driving user-supplied *rules* to a fixed point. A rule
//! declares the attributes it consumes and the attributes it produces, plus
//! a computation filling the latter from the former; the reactor handles
//! scheduling, value propagation, error propagation, and diagnosis of
//! underspecified analyses.
//!
//! # Usage
//!
//! ```ignore
//! let reactor: Reactor<NodeId> = Reactor::new();
//! reactor.set_named(param, "type", AttrValue::of(Type::Int))?;
//! reactor
//!     .rule_for(body, "type")
//!     .using_one(param, "type")
//!     .by(|ctx| ctx.copy_first());
//! let report = reactor.run()?;
//! for error in reactor.errors() { /* report */ }
//! ```
//!
//! # Crate layout
//!
//! - [`reactor`]: the engine -- store, dependency index, ready-queue, run
//!   loop, error propagation, missing-attribute diagnostic.
//! - [`rule`]: rule state, the computation context [`RuleCtx`], and the
//!   fluent [`RuleBuilder`].
//! - [`policy`]: the redefinition extension point.
//! - [`report`]: the serializable [`RunReport`] summary.
//! - [`format`]: indented attributed-tree dumps.
//! - [`fixture`]: a success/failure test harness for analyses.

pub mod fixture;
pub mod format;
pub mod policy;
pub mod reactor;
pub mod report;
pub mod rule;

pub use fixture::AnalysisFixture;
pub use format::{format_attribute_tree, TreeWalker};
pub use policy::{FailOnRedefinition, RedefineAndRenotify, RedefinitionPolicy};
pub use reactor::Reactor;
pub use report::RunReport;
pub use rule::{RuleBuilder, RuleCtx};

pub use semaflow_core::{AnalysisValue, Attribute, AttrValue, NodeKey, ReactorError, SemanticError};
