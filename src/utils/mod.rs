pub mod format;
pub mod logger;
pub mod metrics;
pub mod progress;
