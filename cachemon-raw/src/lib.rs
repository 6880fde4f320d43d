//! # cachemon-raw
//!
//! Register definitions for Intel core performance monitoring and the
//! privileged MSR access primitive used to program them.
//!
//! This crate is the only part of cachemon that touches hardware. It knows
//! where the event-select and counter registers live and how an event-select
//! value is laid out, but nothing about which events are worth counting.
//!
//! ## Features
//!
//! - `sandybridge` (default) - Sandy Bridge core PMU definitions
//!
//! ## Usage
//!
//! ```ignore
//! use cachemon_raw::current_arch::core::{CounterSlot, EventSelectConfig};
//! use cachemon_raw::{MsrDevice, RegisterLayout};
//!
//! let config = EventSelectConfig {
//!     event_code: 0x2E,
//!     unit_mask: 0x41,
//!     usr_enabled: true,
//!     os_enabled: true,
//!     counter_enabled: true,
//! };
//!
//! let device = MsrDevice::open(0)?;
//! device.write(CounterSlot::Slot2.event_select(), config.to_msr_value())?;
//! ```

pub mod arch;
pub mod msr;
pub mod register;

pub use msr::{MsrDevice, MsrError, Result};
pub use register::RegisterLayout;

#[cfg(feature = "sandybridge")]
pub use arch::sandybridge as current_arch;
