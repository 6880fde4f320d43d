pub mod access;
pub mod engine;
pub mod events;
pub mod window;

pub use access::{AccessOp, RecordingAccess, RegisterAccess};
pub use engine::{combine_halves, CounterEngine, CounterReading, EngineOptions};
pub use events::{lookup, CacheLevel, EventMaskEntry, MetricKind, EVENT_TABLE};
pub use window::{MeasurementWindow, SpinWindow, TouchWindow};
