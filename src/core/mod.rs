//! Core air-quality logic.
//!
//! This module contains:
//! - Breakpoint tables and categories
//! - Concentration classification
//! - Window parsing and time-weighted exposure aggregation
//! - Measurement summaries

pub mod breakpoints;
pub mod classifier;
pub mod exposure;
pub mod stats;
pub mod window;

// Re-export commonly used types
pub use breakpoints::{Band, BreakpointTable, Category, Severity, TableError};
pub use classifier::{Classification, Classifier};
pub use exposure::{
    aggregate_exposure, CategorySample, ExposureReport, ExposureTotals, FIRST_SAMPLE_SECS,
};
pub use stats::{summarize, SeriesSummary, StatsReport};
pub use window::{ExposureWindow, WindowParseError};
