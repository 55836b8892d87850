// flowline/src/conditional/mod.rs

//! Conditional steps: a step whose work is delegated to one of several scoped
//! pipelines, each running over a sub-context extracted from the main context.

pub mod builder;
pub(crate) mod scope;

pub use builder::{ConditionalScopeBuilder, ConditionalScopeConfigurator};
