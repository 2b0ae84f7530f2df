use thiserror::Error;

use crate::{pipeline::PipelineState, types::ShaderStage};

/// Every way a bootstrap-and-draw attempt can stop. All of them are terminal
/// for the attempt: nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
  #[error("{stage} shader compilation failed: {log}")]
  Compile { stage: ShaderStage, log: String },

  #[error("shader program linking failed: {log}")]
  Link { log: String },

  #[error("vertex attribute `{attribute}` is not active in the linked program")]
  Bind { attribute: String },

  #[error("context could not create a {0} object")]
  ObjectCreation(&'static str),

  #[error("invalid vertex data: {0}")]
  Geometry(String),

  #[error("pipeline cannot run from state {0:?}")]
  InvalidState(PipelineState),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
