// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod counters;
pub mod error;
pub mod prom;

pub use config::MeasureConfig;
pub use counters::{CounterEngine, CounterReading, EngineOptions};
pub use error::{CacheMonError, Result};
pub use prom::ReadingExporter;
