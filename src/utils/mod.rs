//! Logging and reporting helpers.

pub mod charts;
pub mod logging;

pub use charts::write_training_curves;
pub use logging::{init_logging, LogConfig, LogLevel};
