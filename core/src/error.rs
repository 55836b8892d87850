// flowline/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Framework-level failures. Pipelines convert these into their own error type
/// through the `Err: From<FlowError>` bound.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Sub-context extraction failed for step '{step_name}': {source}")]
  ExtractorFailure {
    step_name: String,
    #[source]
    source: AnyhowError,
  },

  #[error("No pipeline registered for context type {context_type}")]
  PipelineNotRegistered { context_type: String },

  #[error("Context type mismatch, expected {expected_type}")]
  TypeMismatch { expected_type: String },

  #[error("No conditional scope matched for step '{step_name}'")]
  NoConditionalScopeMatched { step_name: String },

  #[error("Handler failed: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },
}

impl From<AnyhowError> for FlowError {
  fn from(source: AnyhowError) -> Self {
    FlowError::HandlerError { source }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
