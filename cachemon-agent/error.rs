use std::io;
use thiserror::Error;

use cachemon_raw::MsrError;

use crate::counters::events::{CacheLevel, MetricKind};

#[derive(Error, Debug)]
pub enum CacheMonError {
    #[error("No event encoding for {kind} at {level}")]
    UnsupportedMetric { level: CacheLevel, kind: MetricKind },

    #[error("Event encoding for {level} {kind} is not hardware-confirmed (pass --allow-provisional to use it)")]
    UnconfirmedEncoding { level: CacheLevel, kind: MetricKind },

    #[error("Privileged MSR access failed: {0}")]
    PrivilegeFault(#[source] MsrError),

    #[error("Affinity operation failed: {0}")]
    AffinityError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),
}

impl CacheMonError {
    /// Faults that must abort the run rather than be reported and skipped
    pub fn is_fatal(&self) -> bool {
        matches!(self, CacheMonError::PrivilegeFault(_))
    }

    /// MSR address a privilege fault was raised for
    pub fn register(&self) -> Option<u32> {
        match self {
            CacheMonError::PrivilegeFault(source) => source.msr(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheMonError>;
