use cachemon_raw::MsrDevice;

use crate::counters::access::RegisterAccess;
use crate::error::{CacheMonError, Result};

/// `RegisterAccess` over the Linux msr driver for one CPU
pub struct DevMsrAccess {
    device: MsrDevice,
}

impl DevMsrAccess {
    pub fn new(cpu: u32) -> Result<Self> {
        let device = MsrDevice::open(cpu).map_err(CacheMonError::PrivilegeFault)?;

        tracing::info!("Opened MSR device for CPU {}", device.cpu());

        Ok(Self { device })
    }

    pub fn cpu(&self) -> u32 {
        self.device.cpu()
    }
}

impl RegisterAccess for DevMsrAccess {
    fn write_msr(&self, register: u32, value: u32) -> Result<()> {
        tracing::debug!(
            "MSR write: CPU {} MSR 0x{:08x} = 0x{:08x}",
            self.cpu(),
            register,
            value
        );
        // EDX is always zero: none of the event-select bits we drive live in
        // the upper half.
        self.device
            .write(register, value as u64)
            .map_err(CacheMonError::PrivilegeFault)
    }

    fn read_msr(&self, register: u32) -> Result<(u32, u32)> {
        let value = self
            .device
            .read(register)
            .map_err(CacheMonError::PrivilegeFault)?;
        tracing::debug!(
            "MSR read: CPU {} MSR 0x{:08x} = 0x{:016x}",
            self.cpu(),
            register,
            value
        );
        Ok((value as u32, (value >> 32) as u32))
    }
}

/// Check that `/dev/cpu/<cpu>/msr` exists and can be opened
///
/// Returns a human-readable hint when it cannot.
pub fn check_device(cpu: u32) -> std::result::Result<(), String> {
    let msr_path = format!("/dev/cpu/{cpu}/msr");
    if std::fs::metadata(&msr_path).is_err() {
        return Err(format!(
            "Cannot access {msr_path}. The MSR kernel module may not be loaded; run: sudo modprobe msr"
        ));
    }

    match std::fs::File::open(&msr_path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(format!(
            "Permission denied accessing {msr_path}. Run as root or grant CAP_SYS_RAWIO"
        )),
        Err(e) => Err(format!("Cannot open {msr_path}: {e}")),
    }
}
