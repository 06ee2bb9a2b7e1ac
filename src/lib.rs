//! IAQ Monitor - indoor air quality ingest and exposure tracking.
//!
//! Readings from PM2.5 sensors are classified against the CPCB (India)
//! PM2.5 breakpoint table, stored in SQLite, and aggregated into
//! time-weighted minutes of exposure per AQI category.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        IAQ Monitor                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Simulator  │──▶│   Server    │──▶│  Ingestor   │       │
//! │  │  (reqwest)  │   │   (axum)    │   │ (classify)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │  Exposure   │◀────────────────────│    Store    │       │
//! │  │  / Stats    │                     │  (SQLite)   │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use iaq_monitor::core::{Category, Classifier};
//!
//! let classifier = Classifier::cpcb_pm25();
//! let result = classifier.classify(Some(45.0));
//! assert_eq!(result.index, Some(75));
//! assert_eq!(result.category, Some(Category::Satisfactory));
//! ```

pub mod config;
pub mod core;
pub mod generator;
pub mod ingest;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "simulator")]
pub mod simulator;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    aggregate_exposure, BreakpointTable, Category, Classification, Classifier, ExposureReport,
    ExposureTotals, ExposureWindow, StatsReport,
};
pub use ingest::{IngestError, Ingestor, ReadingIn};
pub use store::{Store, StoreError};

#[cfg(feature = "server")]
pub use server::{ServerConfig, ServerState};

#[cfg(feature = "simulator")]
pub use simulator::{SimulatorClient, SimulatorConfig, SimulatorError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
