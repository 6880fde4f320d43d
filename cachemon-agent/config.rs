use std::path::PathBuf;
use std::time::Duration;

use cachemon_raw::current_arch::core::CounterSlot;

use crate::counters::events::{CacheLevel, MetricKind};
use crate::counters::window::{
    MeasurementWindow, SpinWindow, TouchWindow, DEFAULT_TOUCH_BYTES,
};
use crate::error::{CacheMonError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowConfig {
    Spin(Duration),
    Touch { bytes: usize },
}

impl WindowConfig {
    pub fn build(&self) -> Box<dyn MeasurementWindow> {
        match *self {
            WindowConfig::Spin(duration) => Box::new(SpinWindow::new(duration)),
            WindowConfig::Touch { bytes } => Box::new(TouchWindow::new(bytes)),
        }
    }
}

/// Everything one measurement run needs
#[derive(Debug, Clone)]
pub struct MeasureConfig {
    pub cpu: u32,
    /// Pin this thread to `cpu` for the whole measurement
    pub pin: bool,
    pub level: CacheLevel,
    pub kind: MetricKind,
    pub slot: CounterSlot,
    pub window: WindowConfig,
    pub allow_provisional: bool,
    pub dry_run: bool,
    pub textfile: Option<PathBuf>,
}

impl Default for MeasureConfig {
    /// Retired uops on slot 1 of CPU 0 over a 1000-byte touch window
    fn default() -> Self {
        Self {
            cpu: 0,
            pin: true,
            level: CacheLevel::Uops,
            kind: MetricKind::Retired,
            slot: CounterSlot::Slot1,
            window: WindowConfig::Touch {
                bytes: DEFAULT_TOUCH_BYTES,
            },
            allow_provisional: false,
            dry_run: false,
            textfile: None,
        }
    }
}

impl MeasureConfig {
    /// Reject a CPU that is not online
    pub fn validate(&self, online: &[u32]) -> Result<()> {
        if !online.contains(&self.cpu) {
            return Err(CacheMonError::ConfigError(format!(
                "CPU {} is not online (online: {:?})",
                self.cpu, online
            )));
        }
        Ok(())
    }

    /// Detect online CPUs from /sys/devices/system/cpu/online
    pub fn detect_online_cpus() -> Vec<u32> {
        std::fs::read_to_string("/sys/devices/system/cpu/online")
            .ok()
            .and_then(|s| parse_cpu_list(&s))
            .unwrap_or_else(|| {
                tracing::warn!("Failed to detect online CPUs, assuming CPU 0 only");
                vec![0]
            })
    }
}

/// Parse CPU list like "0-3,8-11" into Vec<u32>
pub fn parse_cpu_list(s: &str) -> Option<Vec<u32>> {
    let mut cpus = Vec::new();
    for part in s.trim().split(',') {
        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start.trim().parse().ok()?;
            let end: u32 = end.trim().parse().ok()?;
            cpus.extend(start..=end);
        } else {
            cpus.push(part.trim().parse().ok()?);
        }
    }
    Some(cpus)
}

pub fn parse_level(s: &str) -> std::result::Result<CacheLevel, String> {
    CacheLevel::from_name(&s.to_ascii_lowercase()).ok_or_else(|| {
        let names: Vec<&str> = CacheLevel::all().iter().map(|l| l.name()).collect();
        format!("unknown cache level '{s}' (expected one of: {})", names.join(", "))
    })
}

pub fn parse_metric(s: &str) -> std::result::Result<MetricKind, String> {
    MetricKind::from_name(&s.to_ascii_lowercase()).ok_or_else(|| {
        let names: Vec<&str> = MetricKind::all().iter().map(|k| k.name()).collect();
        format!("unknown metric '{s}' (expected one of: {})", names.join(", "))
    })
}

pub fn parse_slot(s: &str) -> std::result::Result<CounterSlot, String> {
    s.parse::<usize>()
        .ok()
        .and_then(CounterSlot::from_index)
        .ok_or_else(|| format!("invalid counter slot '{s}' (expected 0-3)"))
}
