// flowline/src/pipeline/definition.rs

//! `Pipeline<TData, Err>` and its structural operations.

use crate::conditional::builder::ConditionalScopeBuilder;
use crate::core::handler::Handler;
use crate::core::step::{Phase, SkipCondition, StepDef};
use crate::error::FlowError;
use std::collections::HashMap;

/// Handlers registered for one step, by phase.
pub(crate) struct StepHandlers<TData: 'static + Send + Sync, Err> {
  pub(crate) before: Vec<Handler<TData, Err>>,
  pub(crate) on: Vec<Handler<TData, Err>>,
  pub(crate) after: Vec<Handler<TData, Err>>,
}

impl<TData: 'static + Send + Sync, Err> Default for StepHandlers<TData, Err> {
  fn default() -> Self {
    Self {
      before: Vec::new(),
      on: Vec::new(),
      after: Vec::new(),
    }
  }
}

impl<TData: 'static + Send + Sync, Err> StepHandlers<TData, Err> {
  pub(crate) fn phase(&self, phase: Phase) -> &[Handler<TData, Err>] {
    match phase {
      Phase::Before => &self.before,
      Phase::On => &self.on,
      Phase::After => &self.after,
    }
  }

  pub(crate) fn phase_mut(&mut self, phase: Phase) -> &mut Vec<Handler<TData, Err>> {
    match phase {
      Phase::Before => &mut self.before,
      Phase::On => &mut self.on,
      Phase::After => &mut self.after,
    }
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.before.is_empty() && self.on.is_empty() && self.after.is_empty()
  }
}

/// An ordered list of named steps over `ContextData<TData>`.
///
/// Handlers return `Result<PipelineControl, Err>`. `Err` must absorb
/// [`FlowError`] so that framework failures (a required step without
/// handlers, a failed sub-context extraction) surface through the same type.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) handlers: HashMap<String, StepHandlers<TData, Err>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Builds a pipeline from `(name, optional, skip_if)` triples.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef::new(*name, *optional, skip_if.clone()))
      .collect();

    Self {
      steps,
      handlers: HashMap::new(),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn has_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  /// Panics on an unknown step name: that is a wiring mistake, not a runtime condition.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.has_step(step_name) {
      panic!("flowline setup error: step '{}' is not defined in this pipeline", step_name);
    }
  }

  pub fn set_optional(&mut self, step_name: &str, optional: bool) {
    self.ensure_step_exists(step_name);
    if let Some(step) = self.steps.iter_mut().find(|s| s.name == step_name) {
      step.optional = optional;
    }
  }

  pub fn set_skip_condition(&mut self, step_name: &str, skip_if: Option<SkipCondition<TData>>) {
    self.ensure_step_exists(step_name);
    if let Some(step) = self.steps.iter_mut().find(|s| s.name == step_name) {
      step.skip_if = skip_if;
    }
  }

  pub(crate) fn push_handler(&mut self, step_name: &str, phase: Phase, handler: Handler<TData, Err>) {
    self
      .handlers
      .entry(step_name.to_string())
      .or_default()
      .phase_mut(phase)
      .push(handler);
  }

  pub(crate) fn replace_on_handlers(&mut self, step_name: &str, handler: Handler<TData, Err>) {
    let entry = self.handlers.entry(step_name.to_string()).or_default();
    entry.on.clear();
    entry.on.push(handler);
  }

  /// Turns `step_name` into a conditional step. The step is appended if the
  /// pipeline does not define it yet.
  pub fn conditional_scopes_for_step(&mut self, step_name: &str) -> ConditionalScopeBuilder<'_, TData, Err> {
    if !self.has_step(step_name) {
      self.steps.push(StepDef::new(step_name, false, None));
    }
    ConditionalScopeBuilder::new(self, step_name.to_string())
  }
}
