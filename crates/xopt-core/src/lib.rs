//! # xopt-core: Cascades Optimizer Core
//!
//! Data structures and algorithms at the heart of a Cascades-style query optimizer.
//! The memo stores every alternative compactly, binding turns it back into concrete
//! trees, derived properties and constraints summarize what an expression
//! computes, and xforms grow the memo until the search driver can pick a plan.
//!
//! ## Module Overview
//!
//! - **`memo`**: groups, group expressions, deduplicating insert.
//! - **`expr`**: logical, physical and scalar operators plus the transient
//!   `Expression` tree produced by binding.
//! - **`pattern`**: shapes xforms bind against.
//! - **`binding`**: the restartable extraction cursor.
//! - **`properties`** / **`relational`**: derived scalar and relational properties.
//! - **`constraint`**: interval, conjunction and disjunction constraints.
//! - **`xform`**: the xform trait, promises, registry and application.
//! - **`join_order`**: greedy join-order enumeration.
//! - **`search`**: explore/implement driver and plan extraction.
//! - **`context`**, **`catalog`**, **`stats`**, **`cost`**: what derivation and
//!   costing read from the outside world.
//! - **`config`**, **`guard`**, **`error`**: search limits, cancellation and errors.

pub mod binding;
pub mod catalog;
pub mod config;
pub mod constraint;
pub mod context;
pub mod cost;
pub mod error;
pub mod expr;
pub mod guard;
pub mod join_order;
pub mod memo;
pub mod pattern;
pub mod properties;
pub mod relational;
pub mod search;
pub mod stats;
pub mod xform;

pub use error::{OptError, Result};
