//! Architecture-specific register definitions
//!
//! Event-select layouts and counter addresses are architectural, but event
//! codes and unit masks vary by microarchitecture.
//!
//! ## Supported Architectures
//!
//! - **Sandy Bridge** (`sandybridge` feature) - 2nd generation Intel Core

#[cfg(feature = "sandybridge")]
pub mod sandybridge;
