pub mod affinity;
pub mod arch;
pub mod cpuid;
pub mod msr;

pub use affinity::AffinityGuard;
pub use arch::{CpuArchitecture, CPU_ARCH};
pub use msr::DevMsrAccess;
