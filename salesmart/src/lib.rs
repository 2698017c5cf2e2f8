#![forbid(unsafe_code)]

pub mod config;
mod connect;
mod error;
mod pipeline;
pub mod report;
pub mod staging;

pub use config::{Config, ConfigBuilder, ConfigError};
pub use connect::connect;
pub use error::*;
pub use pipeline::*;
pub use report::{export, snapshot, ExportReport, Report};
pub use staging::{QualityReport, StagingError};

pub use salesmart_store as store;
