// Prometheus exposition of counter readings

pub mod reading;

pub use reading::ReadingExporter;
