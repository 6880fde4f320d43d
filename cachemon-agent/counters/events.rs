// Sandy Bridge cache event encodings
//
// Source: Intel SDM Vol. 3B, Table 19-15 (Sandy Bridge non-architectural
// events). Rows with `confirmed: false` have not been checked against real
// hardware yet; the engine refuses them unless the caller opts in.

use crate::error::{CacheMonError, Result};
use crate::metric_enum;

metric_enum! {
    pub enum CacheLevel {
        Uops => "uops",
        L1I => "l1i",
        L1D => "l1d",
        L2 => "l2",
        L3 => "l3",
    }
}

metric_enum! {
    pub enum MetricKind {
        AllRequests => "all-requests",
        AllHits => "all-hits",
        AllMisses => "all-misses",
        LoadMisses => "load-misses",
        StoreMisses => "store-misses",
        Retired => "retired",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMaskEntry {
    pub level: CacheLevel,
    pub kind: MetricKind,
    pub event_code: u8,
    pub unit_mask: u8,
    pub confirmed: bool,
    pub name: &'static str,
}

pub const EVENT_TABLE: &[EventMaskEntry] = &[
    EventMaskEntry {
        level: CacheLevel::Uops,
        kind: MetricKind::Retired,
        event_code: 0x0E,
        unit_mask: 0x01,
        confirmed: true,
        name: "UOPS_ISSUED.ANY",
    },
    // L1 instruction cache
    EventMaskEntry {
        level: CacheLevel::L1I,
        kind: MetricKind::AllHits,
        event_code: 0x80,
        unit_mask: 0x01,
        confirmed: false,
        name: "ICACHE.HITS",
    },
    EventMaskEntry {
        level: CacheLevel::L1I,
        kind: MetricKind::AllMisses,
        event_code: 0x80,
        unit_mask: 0x02,
        confirmed: true,
        name: "ICACHE.MISSES",
    },
    // L1 data cache. There is no combined miss event; misses are split
    // into load and store events.
    EventMaskEntry {
        level: CacheLevel::L1D,
        kind: MetricKind::AllRequests,
        event_code: 0x43,
        unit_mask: 0x01,
        confirmed: false,
        name: "L1D_ALL_REF.ANY",
    },
    EventMaskEntry {
        level: CacheLevel::L1D,
        kind: MetricKind::LoadMisses,
        event_code: 0x40,
        unit_mask: 0x01,
        confirmed: false,
        name: "L1D_CACHE_LD.I_STATE",
    },
    EventMaskEntry {
        level: CacheLevel::L1D,
        kind: MetricKind::StoreMisses,
        event_code: 0x28,
        unit_mask: 0x01,
        confirmed: false,
        name: "L1D_CACHE_ST.I_STATE",
    },
    // L2 (private per core), code requests only
    EventMaskEntry {
        level: CacheLevel::L2,
        kind: MetricKind::AllRequests,
        event_code: 0x24,
        unit_mask: 0x30,
        confirmed: false,
        name: "L2_RQSTS.ALL_CODE_RD",
    },
    EventMaskEntry {
        level: CacheLevel::L2,
        kind: MetricKind::AllMisses,
        event_code: 0x24,
        unit_mask: 0x20,
        confirmed: false,
        name: "L2_RQSTS.CODE_RD_MISS",
    },
    // L3 (last level, shared)
    EventMaskEntry {
        level: CacheLevel::L3,
        kind: MetricKind::AllRequests,
        event_code: 0x2E,
        unit_mask: 0x4F,
        confirmed: true,
        name: "LONGEST_LAT_CACHE.REFERENCE",
    },
    EventMaskEntry {
        level: CacheLevel::L3,
        kind: MetricKind::AllMisses,
        event_code: 0x2E,
        unit_mask: 0x41,
        confirmed: true,
        name: "LONGEST_LAT_CACHE.MISS",
    },
];

/// Find the table row for `(level, kind)`
pub fn lookup(level: CacheLevel, kind: MetricKind) -> Result<&'static EventMaskEntry> {
    EVENT_TABLE
        .iter()
        .find(|e| e.level == level && e.kind == kind)
        .ok_or(CacheMonError::UnsupportedMetric { level, kind })
}

/// Metric kinds defined for `level`, in table order
pub fn kinds_for(level: CacheLevel) -> Vec<MetricKind> {
    EVENT_TABLE
        .iter()
        .filter(|e| e.level == level)
        .map(|e| e.kind)
        .collect()
}
