// Register access seam between the counter engine and the hardware

use std::collections::HashMap;

use parking_lot::Mutex;

use cachemon_raw::MsrError;

use crate::error::{CacheMonError, Result};

/// The two privileged operations the counter engine needs
///
/// Implementations talk to live, core-local CPU state that other software
/// (the kernel's perf subsystem, other profilers) may reprogram at any time.
/// There is no way to lock it from here.
pub trait RegisterAccess {
    /// Write `value` to EAX with EDX = 0 for MSR `register`
    fn write_msr(&self, register: u32, value: u32) -> Result<()>;

    /// Read MSR `register` as its (low, high) 32-bit halves
    fn read_msr(&self, register: u32) -> Result<(u32, u32)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp {
    Write { register: u32, value: u32 },
    Read { register: u32 },
}

/// In-memory stand-in for the MSR interface
///
/// Records every operation in order. Reads return the halves scripted with
/// [`RecordingAccess::with_counter`], or zero. A register marked with
/// [`RecordingAccess::fail_on`] faults the way a missing MSR does.
#[derive(Debug, Default)]
pub struct RecordingAccess {
    ops: Mutex<Vec<AccessOp>>,
    counters: HashMap<u32, (u32, u32)>,
    faulting: Option<u32>,
}

impl RecordingAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counter(mut self, register: u32, low: u32, high: u32) -> Self {
        self.counters.insert(register, (low, high));
        self
    }

    pub fn fail_on(mut self, register: u32) -> Self {
        self.faulting = Some(register);
        self
    }

    pub fn ops(&self) -> Vec<AccessOp> {
        self.ops.lock().clone()
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match *op {
                AccessOp::Write { register, value } => Some((register, value)),
                AccessOp::Read { .. } => None,
            })
            .collect()
    }

    fn fault(register: u32, write: bool) -> CacheMonError {
        let source = std::io::Error::from_raw_os_error(libc::EIO);
        let source = if write {
            MsrError::WriteFailed {
                cpu: 0,
                msr: register,
                source,
            }
        } else {
            MsrError::ReadFailed {
                cpu: 0,
                msr: register,
                source,
            }
        };
        CacheMonError::PrivilegeFault(source)
    }
}

impl RegisterAccess for RecordingAccess {
    fn write_msr(&self, register: u32, value: u32) -> Result<()> {
        if self.faulting == Some(register) {
            return Err(Self::fault(register, true));
        }
        self.ops.lock().push(AccessOp::Write { register, value });
        Ok(())
    }

    fn read_msr(&self, register: u32) -> Result<(u32, u32)> {
        if self.faulting == Some(register) {
            return Err(Self::fault(register, false));
        }
        self.ops.lock().push(AccessOp::Read { register });
        Ok(self.counters.get(&register).copied().unwrap_or((0, 0)))
    }
}
