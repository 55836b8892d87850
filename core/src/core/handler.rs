// flowline/src/core/handler.rs
use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

pub type HandlerFuture<Err> = Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>;

/// A boxed step handler over `ContextData<TData>`.
///
/// Handlers take their own clone of the context, lock it briefly to read
/// inputs or write results, and must release the guard before awaiting.
pub type Handler<TData, Err> = Box<dyn Fn(ContextData<TData>) -> HandlerFuture<Err> + Send + Sync>;
