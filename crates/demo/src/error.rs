//! Demo error type.

use std::fmt::Debug;

use thiserror::Error;

/// Anything that stops the demo.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to render report: {0}")]
    Report(#[from] serde_json::Error),

    /// An orchestrator failed where the flow expects success.
    #[error("{0}")]
    Orchestration(String),
}

impl<I: Debug> From<application::Error<I>> for DemoError {
    fn from(err: application::Error<I>) -> Self {
        DemoError::Orchestration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DemoError>;
