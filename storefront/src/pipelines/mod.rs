// storefront/src/pipelines/mod.rs

//! Defines and registers the flowline pipelines used by the storefront.

use crate::errors::AppError;
use flowline::Flows;

pub mod checkout_pipeline;
pub mod contexts;

/// Registers every pipeline with `flows`. Called once while building `AppState`.
pub fn register_all_pipelines(flows: &Flows<AppError>) {
  tracing::info!("Registering pipelines...");
  checkout_pipeline::register_checkout_pipeline(flows);
  tracing::info!("All application pipelines registered.");
}
