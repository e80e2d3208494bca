//! # landshift pipeline
//!
//! Runs the three stages of the land-cover change pipeline over files on
//! disk: spectral indices per year, change detection between two years and
//! zonal aggregation into CSV reports.
//!
//! ```no_run
//! use landshift_pipeline::{ChangeMethod, Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let reports = pipeline.run(2019, 2025, ChangeMethod::All)?;
//! for report in &reports {
//!     println!("{}: {} ok, {} failed", report.stage, report.completed.len(), report.failed.len());
//! }
//! # Ok::<(), landshift_pipeline::PipelineError>(())
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod layout;
pub mod method;
pub mod reports;
pub mod stages;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result, StageReport};
pub use executor::ProcessingMode;
pub use layout::Layout;
pub use method::ChangeMethod;
pub use stages::{Pipeline, Stage};
