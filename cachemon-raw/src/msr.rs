//! MSR (Model-Specific Register) read/write primitives
//!
//! Access goes through the Linux `msr` driver (`/dev/cpu/*/msr`): the kernel
//! issues `rdmsr`/`wrmsr` on the target CPU on our behalf. Nothing outside
//! this module reaches a privileged instruction.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileExt, OpenOptionsExt};

pub type Result<T> = std::result::Result<T, MsrError>;

/// Errors that can occur during MSR operations
#[derive(Debug, thiserror::Error)]
pub enum MsrError {
    #[error("Failed to open MSR device for CPU {cpu}: {source}")]
    OpenFailed { cpu: u32, source: std::io::Error },

    #[error("Failed to read MSR 0x{msr:X} on CPU {cpu}: {source}")]
    ReadFailed {
        cpu: u32,
        msr: u32,
        source: std::io::Error,
    },

    #[error("Failed to write MSR 0x{msr:X} on CPU {cpu}: {source}")]
    WriteFailed {
        cpu: u32,
        msr: u32,
        source: std::io::Error,
    },
}

impl MsrError {
    /// MSR address involved, if the failure got that far
    pub fn msr(&self) -> Option<u32> {
        match self {
            MsrError::OpenFailed { .. } => None,
            MsrError::ReadFailed { msr, .. } | MsrError::WriteFailed { msr, .. } => Some(*msr),
        }
    }
}

/// Handle on `/dev/cpu/<cpu>/msr`
///
/// The driver maps the file offset to the MSR address and transfers exactly
/// eight bytes per access. Opening requires root or `CAP_SYS_RAWIO`; an
/// address the CPU does not implement comes back as `EIO`.
#[derive(Debug)]
pub struct MsrDevice {
    file: File,
    cpu: u32,
}

impl MsrDevice {
    pub fn open(cpu: u32) -> Result<Self> {
        let path = format!("/dev/cpu/{cpu}/msr");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC) // Ensure synchronous writes
            .open(&path)
            .map_err(|e| MsrError::OpenFailed { cpu, source: e })?;

        Ok(Self { file, cpu })
    }

    pub fn cpu(&self) -> u32 {
        self.cpu
    }

    /// Read a 64-bit value from an MSR
    pub fn read(&self, msr: u32) -> Result<u64> {
        let mut buffer = [0u8; 8];
        self.file
            .read_exact_at(&mut buffer, msr as u64)
            .map_err(|e| MsrError::ReadFailed {
                cpu: self.cpu,
                msr,
                source: e,
            })?;

        Ok(u64::from_le_bytes(buffer))
    }

    /// Write a 64-bit value to an MSR
    ///
    /// Writing incorrect values to MSRs can cause system instability.
    /// Validate layouts with `RegisterLayout::validate()` before writing.
    pub fn write(&self, msr: u32, value: u64) -> Result<()> {
        self.file
            .write_all_at(&value.to_le_bytes(), msr as u64)
            .map_err(|e| MsrError::WriteFailed {
                cpu: self.cpu,
                msr,
                source: e,
            })
    }
}
