// flowline/src/pipeline/execution.rs

//! `Pipeline::run`.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::handler::Handler;
use crate::core::step::Phase;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, span, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// For each step: the skip condition is evaluated, then `before`, `on` and
  /// `after` handlers run in registration order. The first `Stop` ends the run
  /// with [`PipelineResult::Stopped`]; the first error is returned as is and
  /// no later handler runs.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(context_type = %std::any::type_name::<TData>(), num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    for (step_index, step) in self.steps.iter().enumerate() {
      let step_span = span!(
        Level::INFO,
        "pipeline_step",
        step_name = step.name.as_str(),
        step_index,
        optional = step.optional
      );

      let control = self.run_step(step_index, ctx_data.clone()).instrument(step_span).await?;
      if control == PipelineControl::Stop {
        event!(Level::INFO, step_name = %step.name, "Pipeline stopped by handler.");
        return Ok(PipelineResult::Stopped);
      }
    }

    event!(Level::DEBUG, "Pipeline completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_index: usize, ctx_data: ContextData<TData>) -> Result<PipelineControl, Err> {
    let step = &self.steps[step_index];

    if let Some(skip_if) = &step.skip_if {
      if skip_if(ctx_data.clone()) {
        event!(Level::DEBUG, "Step skipped by condition.");
        return Ok(PipelineControl::Continue);
      }
    }

    let handlers = match self.handlers.get(&step.name) {
      Some(handlers) if !handlers.is_empty() => handlers,
      _ if step.optional => {
        event!(Level::DEBUG, "Optional step has no handlers.");
        return Ok(PipelineControl::Continue);
      }
      _ => {
        event!(Level::ERROR, "Required step has no handlers.");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step.name.clone(),
        }));
      }
    };

    for phase in Phase::ALL {
      if run_phase(phase, handlers.phase(phase), &ctx_data).await? == PipelineControl::Stop {
        return Ok(PipelineControl::Stop);
      }
    }
    Ok(PipelineControl::Continue)
  }
}

async fn run_phase<TData, Err>(
  phase: Phase,
  handlers: &[Handler<TData, Err>],
  ctx_data: &ContextData<TData>,
) -> Result<PipelineControl, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  for (handler_index, handler) in handlers.iter().enumerate() {
    match handler(ctx_data.clone()).await {
      Ok(PipelineControl::Continue) => {}
      Ok(PipelineControl::Stop) => {
        event!(Level::DEBUG, phase = phase.as_str(), handler_index, "Handler requested stop.");
        return Ok(PipelineControl::Stop);
      }
      Err(e) => {
        event!(Level::WARN, phase = phase.as_str(), handler_index, error = %e, "Handler failed.");
        return Err(e);
      }
    }
  }
  Ok(PipelineControl::Continue)
}
