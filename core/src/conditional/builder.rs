// flowline/src/conditional/builder.rs

//! Fluent API for declaring the scopes of a conditional step.
//!
//! ```text
//!   pipeline
//!     .conditional_scopes_for_step("open_payment_session")
//!     .add_static_scope(online_pipeline, |ctx| extract_session(ctx))
//!     .on_condition(|ctx| ctx.read().method == Method::Online)
//!     .add_static_scope(cod_pipeline, |ctx| extract_session(ctx))
//!     .on_condition(|ctx| ctx.read().method == Method::Cod)
//!     .if_no_scope_matches(PipelineControl::Continue)
//!     .finalize_conditional_step(false);
//! ```

use crate::conditional::scope::{AnyConditionalScope, ConditionalScope, Extractor};
use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use crate::core::handler::Handler;
use crate::error::FlowError;
use crate::pipeline::Pipeline;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[derive(Debug, Clone, Copy)]
enum NoMatch {
  Control(PipelineControl),
  Fail,
}

pub struct ConditionalScopeBuilder<'pipeline, TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pipeline: &'pipeline mut Pipeline<TData, Err>,
  step_name: String,
  scopes: Vec<Arc<dyn AnyConditionalScope<TData, Err>>>,
  on_no_match: NoMatch,
}

impl<'pipeline, TData, Err> ConditionalScopeBuilder<'pipeline, TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) fn new(pipeline: &'pipeline mut Pipeline<TData, Err>, step_name: String) -> Self {
    Self {
      pipeline,
      step_name,
      scopes: Vec::new(),
      on_no_match: NoMatch::Control(PipelineControl::Continue),
    }
  }

  /// Starts a scope that runs `scoped_pipeline` over the sub-context returned by `extractor_fn`.
  pub fn add_static_scope<SData>(
    self,
    scoped_pipeline: Arc<Pipeline<SData, Err>>,
    extractor_fn: impl Fn(ContextData<TData>) -> Result<ContextData<SData>, FlowError> + Send + Sync + 'static,
  ) -> ConditionalScopeConfigurator<'pipeline, TData, SData, Err>
  where
    SData: 'static + Send + Sync,
  {
    ConditionalScopeConfigurator {
      builder: self,
      pipeline: scoped_pipeline,
      extractor: Arc::new(extractor_fn),
    }
  }

  /// What the step returns when no condition matches. Defaults to `Continue`.
  pub fn if_no_scope_matches(mut self, control: PipelineControl) -> Self {
    self.on_no_match = NoMatch::Control(control);
    self
  }

  /// Makes an unmatched step fail with [`FlowError::NoConditionalScopeMatched`].
  pub fn fail_if_no_scope_matches(mut self) -> Self {
    self.on_no_match = NoMatch::Fail;
    self
  }

  /// Installs the dispatching `on` handler for the step, replacing any
  /// existing `on` handlers. Scopes are tested in declaration order and the
  /// first match runs. An optional conditional step swallows scope failures.
  #[instrument(
    name = "ConditionalScopeBuilder::finalize_conditional_step",
    skip_all,
    fields(step_name = %self.step_name, num_scopes = self.scopes.len())
  )]
  pub fn finalize_conditional_step(self, optional: bool) {
    let scopes = Arc::new(self.scopes);
    let step_name = self.step_name.clone();
    let on_no_match = self.on_no_match;

    let dispatcher: Handler<TData, Err> = Box::new(move |ctx_data: ContextData<TData>| {
      let scopes = scopes.clone();
      let step_name = step_name.clone();

      Box::pin(async move {
        let matched = scopes.iter().find(|scope| scope.is_condition_met(ctx_data.clone()));
        let Some(scope) = matched else {
          event!(Level::DEBUG, step_name = %step_name, "No conditional scope matched.");
          return match on_no_match {
            NoMatch::Control(control) => Ok(control),
            NoMatch::Fail => Err(Err::from(FlowError::NoConditionalScopeMatched { step_name })),
          };
        };

        match scope.execute(ctx_data.clone()).await {
          Ok(control) => Ok(control),
          Err(e) if optional => {
            event!(Level::WARN, step_name = %step_name, error = %e, "Optional conditional step failed; continuing.");
            Ok(PipelineControl::Continue)
          }
          Err(e) => Err(e),
        }
      })
    });

    self.pipeline.set_optional(&self.step_name, optional);
    self.pipeline.replace_on_handlers(&self.step_name, dispatcher);
    event!(Level::DEBUG, step_name = %self.step_name, "Conditional step finalized.");
  }
}

/// A scope waiting for its condition.
pub struct ConditionalScopeConfigurator<'pipeline, TData, SData, Err>
where
  TData: 'static + Send + Sync,
  SData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  builder: ConditionalScopeBuilder<'pipeline, TData, Err>,
  pipeline: Arc<Pipeline<SData, Err>>,
  extractor: Extractor<TData, SData>,
}

impl<'pipeline, TData, SData, Err> ConditionalScopeConfigurator<'pipeline, TData, SData, Err>
where
  TData: 'static + Send + Sync,
  SData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn on_condition(
    mut self,
    condition_fn: impl Fn(ContextData<TData>) -> bool + Send + Sync + 'static,
  ) -> ConditionalScopeBuilder<'pipeline, TData, Err> {
    let scope = ConditionalScope {
      step_name: self.builder.step_name.clone(),
      pipeline: self.pipeline,
      extractor: self.extractor,
      condition: Arc::new(condition_fn),
    };
    self.builder.scopes.push(Arc::new(scope));
    self.builder
  }
}
