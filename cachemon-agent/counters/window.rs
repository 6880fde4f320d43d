// Measurement windows: what runs between enabling a counter and reading it

use std::hint::black_box;
use std::time::{Duration, Instant};

/// Holds the calling thread for the duration of a measurement
///
/// Windows block; they never yield to a scheduler, so whatever the thread
/// was pinned to stays occupied by this workload until `hold` returns.
pub trait MeasurementWindow {
    fn hold(&self);

    fn describe(&self) -> String;
}

impl<W: MeasurementWindow + ?Sized> MeasurementWindow for Box<W> {
    fn hold(&self) {
        (**self).hold()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Busy-waits for a fixed wall-clock duration
#[derive(Debug, Clone, Copy)]
pub struct SpinWindow {
    duration: Duration,
}

impl SpinWindow {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Zero-length window, returns immediately
    pub fn zero() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl MeasurementWindow for SpinWindow {
    fn hold(&self) {
        let start = Instant::now();
        while start.elapsed() < self.duration {
            std::hint::spin_loop();
        }
    }

    fn describe(&self) -> String {
        format!("spin {}us", self.duration.as_micros())
    }
}

/// Writes a fresh buffer byte by byte, generating a known amount of data
/// cache traffic (stores plus the RFOs they cause)
#[derive(Debug, Clone, Copy)]
pub struct TouchWindow {
    bytes: usize,
}

pub const DEFAULT_TOUCH_BYTES: usize = 1000;

impl TouchWindow {
    pub fn new(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Default for TouchWindow {
    fn default() -> Self {
        Self::new(DEFAULT_TOUCH_BYTES)
    }
}

impl MeasurementWindow for TouchWindow {
    fn hold(&self) {
        let mut buffer = vec![0u8; self.bytes];
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(2);
        }
        black_box(&buffer);
    }

    fn describe(&self) -> String {
        format!("touch {} bytes", self.bytes)
    }
}
