// flowline/src/conditional/scope.rs

//! One branch of a conditional step and its type-erased form.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::error::FlowError;
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

pub(crate) type Extractor<TData, SData> =
  Arc<dyn Fn(ContextData<TData>) -> Result<ContextData<SData>, FlowError> + Send + Sync + 'static>;

pub(crate) type Condition<TData> = Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

/// A scoped `Pipeline<SData, Err>` guarded by a predicate on the main context.
pub(crate) struct ConditionalScope<TData, SData, Err>
where
  TData: 'static + Send + Sync,
  SData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) step_name: String,
  pub(crate) pipeline: Arc<Pipeline<SData, Err>>,
  pub(crate) extractor: Extractor<TData, SData>,
  pub(crate) condition: Condition<TData>,
}

/// Erases `SData` so scopes over different sub-contexts can share one step.
#[async_trait]
pub(crate) trait AnyConditionalScope<TData, Err>: Send + Sync
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn is_condition_met(&self, main_ctx_data: ContextData<TData>) -> bool;

  async fn execute(&self, main_ctx_data: ContextData<TData>) -> Result<PipelineControl, Err>;
}

#[async_trait]
impl<TData, SData, Err> AnyConditionalScope<TData, Err> for ConditionalScope<TData, SData, Err>
where
  TData: 'static + Send + Sync,
  SData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn is_condition_met(&self, main_ctx_data: ContextData<TData>) -> bool {
    (self.condition)(main_ctx_data)
  }

  #[instrument(
    name = "ConditionalScope::execute",
    skip_all,
    fields(step_name = %self.step_name, scoped_context_type = %std::any::type_name::<SData>()),
    err(Display)
  )]
  async fn execute(&self, main_ctx_data: ContextData<TData>) -> Result<PipelineControl, Err> {
    let sub_ctx_data = (self.extractor)(main_ctx_data).map_err(|e| {
      event!(Level::ERROR, error = %e, "Sub-context extraction failed.");
      let enriched = match e {
        FlowError::ExtractorFailure { source, .. } | FlowError::HandlerError { source } => FlowError::ExtractorFailure {
          step_name: self.step_name.clone(),
          source,
        },
        other => other,
      };
      Err::from(enriched)
    })?;

    match self.pipeline.run(sub_ctx_data).await? {
      PipelineResult::Completed => Ok(PipelineControl::Continue),
      PipelineResult::Stopped => {
        event!(Level::INFO, "Scoped pipeline stopped; stopping the main pipeline.");
        Ok(PipelineControl::Stop)
      }
    }
  }
}
