//! Intel Sandy Bridge register definitions
//!
//! Sandy Bridge exposes four general-purpose counters per logical core
//! (eight with Hyper-Threading disabled; only the first four are used here).
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Chapter 19: Performance-Monitoring Events, Table 19-15

pub mod core;

/// CPUID display models for Sandy Bridge parts
pub const SANDY_BRIDGE_MODELS: &[u32] = &[
    0x2A, // client
    0x2D, // server (Sandy Bridge-E/EP)
];
