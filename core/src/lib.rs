// flowline/src/lib.rs

//! Flowline: asynchronous step pipelines for request orchestration.
//!
//! A [`Pipeline`] is an ordered list of named steps run against one shared
//! context, [`ContextData<T>`]. Each step may have `before`, `on` and `after`
//! handlers, can be optional, and can be skipped by a condition evaluated on the
//! context. A step can also host conditional scopes: scoped pipelines over an
//! extracted sub-context, chosen by a predicate on the main context.
//!
//! [`Flows`] is a registry keyed by context type, so callers only need to build
//! a context and call `flows.run(ctx)`.
//!
//! ```text
//!   let mut p = Pipeline::<CheckoutCtx, AppError>::new(&[("validate", false, None), ("persist", false, None)]);
//!   p.on_root("validate", |ctx| Box::pin(async move { ... }));
//!   flows.register_pipeline(p);
//!   flows.run(ContextData::new(CheckoutCtx { .. })).await?;
//! ```

pub mod conditional;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::conditional::builder::{ConditionalScopeBuilder, ConditionalScopeConfigurator};
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::handler::Handler;
pub use crate::core::step::{SkipCondition, StepDef};
pub use crate::error::{FlowError, FlowResult};
pub use crate::pipeline::Pipeline;
pub use crate::registry::Flows;
