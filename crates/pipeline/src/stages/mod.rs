//! Stage runners
//!
//! Stages run in order (indices, detect, zonal), each reading the files the
//! previous one wrote. Within a stage every unit (a year, a method or a
//! table) is independent: its failure is recorded in the [`StageReport`]
//! and the remaining units still run.

mod detect;
mod indices;
mod zonal;

use crate::config::PipelineConfig;
use crate::error::{Result, StageReport};
use crate::executor::ProcessingMode;
use crate::layout::Layout;
use crate::method::ChangeMethod;
use std::fmt;
use tracing::{info, warn};

/// Pipeline stage, used to name producers and consumers of files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// External download of composites and zone polygons
    Acquisition,
    Indices,
    Detect,
    Zonal,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Acquisition => "acquisition",
            Stage::Indices => "indices",
            Stage::Detect => "detect",
            Stage::Zonal => "zonal",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configured pipeline bound to a file layout
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    layout: Layout,
    mode: ProcessingMode,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let layout = Layout::new(&config.paths);
        let mode = config.execution.mode();
        Self { config, layout, mode }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Stage 1 for `years`, or for every year with a composite when empty
    pub fn indices(&self, years: &[i32]) -> Result<StageReport> {
        indices::run(self, years)
    }

    /// Stage 2 for the pair `t1` -> `t2`
    pub fn detect(&self, t1: i32, t2: i32, method: ChangeMethod) -> Result<StageReport> {
        detect::run(self, t1, t2, method)
    }

    /// Stage 3: one table per method in `methods`
    pub fn zonal(&self, t1: i32, t2: i32, methods: &[ChangeMethod]) -> Result<StageReport> {
        zonal::run(self, t1, t2, methods)
    }

    /// Stages 1-3.
    ///
    /// Indices are computed for `t1` and `t2`, plus every other year with a
    /// composite when the anomaly method is selected. A stage in which
    /// every unit failed ends the run.
    pub fn run(&self, t1: i32, t2: i32, method: ChangeMethod) -> Result<Vec<StageReport>> {
        self.config.years.check_pair(t1, t2)?;

        let mut years = vec![t1, t2];
        if method.includes(ChangeMethod::Anomaly) {
            years.extend(self.layout.reflectance_years(&self.config.years)?);
            years.sort_unstable();
            years.dedup();
        }
        info!(t1, t2, method = %method, years = ?years, "starting pipeline run");

        let mut reports = Vec::with_capacity(3);

        reports.push(self.indices(&years)?);
        if stage_exhausted(&reports) {
            return Ok(reports);
        }

        reports.push(self.detect(t1, t2, method)?);
        if stage_exhausted(&reports) {
            return Ok(reports);
        }

        reports.push(self.zonal(t1, t2, &method.expand())?);
        Ok(reports)
    }
}

fn stage_exhausted(reports: &[StageReport]) -> bool {
    match reports.last() {
        Some(r) if r.all_failed() => {
            warn!(stage = %r.stage, "every unit failed, stopping the run");
            true
        }
        _ => false,
    }
}
