//! Pipeline error type and per-unit stage reports

use crate::stages::Stage;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

/// Errors raised while running pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("missing input {} needed by stage '{stage}' (produced by stage '{producer}')", .path.display())]
    MissingInput {
        path: PathBuf,
        stage: Stage,
        producer: Stage,
    },

    #[error("invalid year range: {0}")]
    InvalidYearRange(String),

    #[error("unknown change method '{0}' (expected difference, urban-classification, anomaly or all)")]
    UnknownMethod(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] landshift_core::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Outcome of one stage over its units (years, methods or tables)
#[derive(Debug)]
pub struct StageReport {
    pub stage: Stage,
    pub completed: Vec<String>,
    pub failed: Vec<(String, PipelineError)>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            completed: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Record the result of one unit; failures are logged and kept
    pub fn record(&mut self, unit: impl Into<String>, outcome: Result<()>) {
        let unit = unit.into();
        match outcome {
            Ok(()) => {
                info!(stage = %self.stage, unit = %unit, "unit completed");
                self.completed.push(unit);
            }
            Err(e) => {
                error!(stage = %self.stage, unit = %unit, "unit failed: {}", e);
                self.failed.push((unit, e));
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// True when at least one unit ran and none of them succeeded
    pub fn all_failed(&self) -> bool {
        self.completed.is_empty() && !self.failed.is_empty()
    }

    pub fn failure(&self, unit: &str) -> Option<&PipelineError> {
        self.failed.iter().find(|(u, _)| u == unit).map(|(_, e)| e)
    }
}
