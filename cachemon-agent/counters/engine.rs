use cachemon_raw::current_arch::core::{CounterSlot, EventSelectConfig};
use cachemon_raw::RegisterLayout;

use crate::counters::access::RegisterAccess;
use crate::counters::events::{self, CacheLevel, MetricKind};
use crate::counters::window::MeasurementWindow;
use crate::error::{CacheMonError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Accept table rows that have not been confirmed on hardware
    pub allow_provisional: bool,
}

/// One 64-bit counter value and what it was measured for
///
/// Fields are fixed once the halves are combined; there are only getters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterReading {
    level: CacheLevel,
    kind: MetricKind,
    slot: CounterSlot,
    low: u32,
    high: u32,
    value: u64,
}

impl CounterReading {
    pub fn new(
        level: CacheLevel,
        kind: MetricKind,
        slot: CounterSlot,
        low: u32,
        high: u32,
    ) -> Self {
        Self {
            level,
            kind,
            slot,
            low,
            high,
            value: combine_halves(low, high),
        }
    }

    pub fn level(&self) -> CacheLevel {
        self.level
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn slot(&self) -> CounterSlot {
        self.slot
    }

    /// Raw (low, high) halves as read from the counter register
    pub fn halves(&self) -> (u32, u32) {
        (self.low, self.high)
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

/// `(high << 32) | low`
pub fn combine_halves(low: u32, high: u32) -> u64 {
    ((high as u64) << 32) | (low as u64)
}

/// Drives one general-purpose counter through reset, configure, window, read
///
/// The engine owns nothing on the hardware side: every call reprograms the
/// slot from scratch, which also discards whatever another tool had counting
/// there.
pub struct CounterEngine<A, W> {
    access: A,
    window: W,
    options: EngineOptions,
}

impl<A: RegisterAccess, W: MeasurementWindow> CounterEngine<A, W> {
    pub fn new(access: A, window: W) -> Self {
        Self {
            access,
            window,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    /// Program the slot's event-select register
    ///
    /// Always two writes, whatever `config` holds: zero first, which stops
    /// the counter and drops any previous event, then `config` with the
    /// enable bit forced on.
    pub fn write_select(&self, slot: CounterSlot, config: EventSelectConfig) -> Result<()> {
        let register = slot.event_select();
        let config = config.enabled();
        let value = config.to_msr_value() as u32;

        if let Err(msg) = config.validate() {
            tracing::warn!("evtsel=0x{:X}, config=0x{:08X}: {}", register, value, msg);
        }

        tracing::info!(
            "before wrmsr: evtsel=0x{:X}, config=0x{:08X}",
            register,
            value
        );

        self.access
            .write_msr(register, 0)
            .and_then(|()| self.access.write_msr(register, value))
            .map_err(|e| {
                tracing::error!(
                    "wrmsr failed: evtsel=0x{:X}, config=0x{:08X}: {}",
                    register,
                    value,
                    e
                );
                e
            })?;

        tracing::info!(
            "after wrmsr: evtsel=0x{:X}, config=0x{:08X}",
            register,
            value
        );
        Ok(())
    }

    /// Raw (low, high) halves of the slot's counter register
    pub fn read_counter(&self, slot: CounterSlot) -> Result<(u32, u32)> {
        let register = slot.counter();
        tracing::info!("rdmsr: pmc=0x{:X}", register);

        self.access.read_msr(register).map_err(|e| {
            tracing::error!("rdmsr failed: pmc=0x{:X}: {}", register, e);
            e
        })
    }

    /// Count `kind` events at `level` on `slot` for one window
    ///
    /// Table and acknowledgment checks happen before any register is touched.
    pub fn measure(
        &self,
        level: CacheLevel,
        kind: MetricKind,
        slot: CounterSlot,
    ) -> Result<CounterReading> {
        let entry = events::lookup(level, kind)?;
        if !entry.confirmed && !self.options.allow_provisional {
            return Err(CacheMonError::UnconfirmedEncoding { level, kind });
        }

        let config = EventSelectConfig {
            event_code: entry.event_code,
            unit_mask: entry.unit_mask,
            usr_enabled: true,
            os_enabled: true,
            counter_enabled: true,
        };

        tracing::info!(
            "{} {} ({}) on slot {}: event=0x{:02X}, umask=0x{:02X}{}",
            level,
            kind,
            entry.name,
            slot,
            entry.event_code,
            entry.unit_mask,
            if entry.confirmed { "" } else { " [provisional]" }
        );

        self.write_select(slot, config)?;

        tracing::debug!("holding measurement window: {}", self.window.describe());
        self.window.hold();

        let (low, high) = self.read_counter(slot)?;
        let reading = CounterReading::new(level, kind, slot, low, high);
        tracing::info!(
            "rdmsr: {} {} is {} (0x{:016X})",
            level,
            kind,
            reading.value(),
            reading.value()
        );

        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::access::{AccessOp, RecordingAccess};
    use crate::counters::window::SpinWindow;
    use cachemon_raw::current_arch::core::ENABLE_BIT;

    fn recording_engine(access: RecordingAccess) -> CounterEngine<RecordingAccess, SpinWindow> {
        CounterEngine::new(access, SpinWindow::zero())
    }

    #[test]
    fn test_combine_halves() {
        assert_eq!(combine_halves(1, 2), 0x0000_0002_0000_0001);
        assert_eq!(combine_halves(u32::MAX, 0), 0xFFFF_FFFF);
        assert_eq!(combine_halves(0, u32::MAX), 0xFFFF_FFFF_0000_0000);
    }

    #[test]
    fn test_write_select_resets_then_writes() {
        let configs = [
            EventSelectConfig::default(),
            EventSelectConfig {
                event_code: 0x2E,
                unit_mask: 0x41,
                ..Default::default()
            },
            EventSelectConfig {
                event_code: 0x2E,
                unit_mask: 0x4F,
                usr_enabled: true,
                ..Default::default()
            },
            EventSelectConfig {
                event_code: 0x24,
                unit_mask: 0x30,
                os_enabled: true,
                counter_enabled: true,
                ..Default::default()
            },
        ];

        for config in configs {
            for slot in CounterSlot::ALL {
                let engine = recording_engine(RecordingAccess::new());
                engine.write_select(slot, config).unwrap();
                assert_eq!(
                    engine.access().writes(),
                    vec![
                        (slot.event_select(), 0),
                        (slot.event_select(), config.encode() | ENABLE_BIT)
                    ],
                    "{config:?} on slot {slot}"
                );
            }
        }
    }

    #[test]
    fn test_write_select_without_ring_bits_still_writes() {
        let engine = recording_engine(RecordingAccess::new());
        let config = EventSelectConfig {
            event_code: 0x2E,
            unit_mask: 0x41,
            ..Default::default()
        };
        engine.write_select(CounterSlot::Slot0, config).unwrap();
        assert_eq!(
            engine.access().writes(),
            vec![(0x186, 0), (0x186, 0x0040_412E)]
        );
    }

    #[test]
    fn test_every_configured_write_is_enabled() {
        let engine = recording_engine(RecordingAccess::new()).with_options(EngineOptions {
            allow_provisional: true,
        });
        for entry in events::EVENT_TABLE {
            engine
                .measure(entry.level, entry.kind, CounterSlot::Slot0)
                .unwrap();
        }

        let writes = engine.access().writes();
        assert_eq!(writes.len(), events::EVENT_TABLE.len() * 2);
        for (_, value) in writes.iter().filter(|(_, v)| *v != 0) {
            assert_ne!(value & ENABLE_BIT, 0, "0x{value:08X} written disabled");
        }
    }

    #[test]
    fn test_measure_l3_miss_on_slot2() {
        let access = RecordingAccess::new().with_counter(0xC3, 0x1234_5678, 0x0000_0009);
        let engine = recording_engine(access);

        let reading = engine
            .measure(CacheLevel::L3, MetricKind::AllMisses, CounterSlot::Slot2)
            .unwrap();

        assert_eq!(reading.value(), 0x0000_0009_1234_5678);
        assert_eq!(reading.halves(), (0x1234_5678, 0x9));
        assert_eq!(reading.slot(), CounterSlot::Slot2);
        assert_eq!(
            engine.access().ops(),
            vec![
                AccessOp::Write {
                    register: 0x188,
                    value: 0
                },
                AccessOp::Write {
                    register: 0x188,
                    value: 0x0043_412E
                },
                AccessOp::Read { register: 0xC3 },
            ]
        );
    }

    #[test]
    fn test_unsupported_metric_touches_nothing() {
        let engine = recording_engine(RecordingAccess::new());
        let err = engine
            .measure(CacheLevel::L1D, MetricKind::AllMisses, CounterSlot::Slot0)
            .unwrap_err();
        assert!(matches!(err, CacheMonError::UnsupportedMetric { .. }));
        assert!(engine.access().ops().is_empty());
    }

    #[test]
    fn test_provisional_requires_acknowledgment() {
        let engine = recording_engine(RecordingAccess::new());
        let err = engine
            .measure(CacheLevel::L2, MetricKind::AllRequests, CounterSlot::Slot1)
            .unwrap_err();
        assert!(matches!(
            err,
            CacheMonError::UnconfirmedEncoding {
                level: CacheLevel::L2,
                kind: MetricKind::AllRequests
            }
        ));
        assert!(engine.access().ops().is_empty());

        let engine = engine.with_options(EngineOptions {
            allow_provisional: true,
        });
        engine
            .measure(CacheLevel::L2, MetricKind::AllRequests, CounterSlot::Slot1)
            .unwrap();
        assert_eq!(
            engine.access().writes(),
            vec![(0x187, 0), (0x187, 0x0043_3024)]
        );
    }

    #[test]
    fn test_write_fault_skips_read() {
        let engine = recording_engine(RecordingAccess::new().fail_on(0x186));
        let err = engine
            .measure(CacheLevel::L3, MetricKind::AllRequests, CounterSlot::Slot0)
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(engine.access().ops().is_empty());
    }

    #[test]
    fn test_read_fault_propagates() {
        let engine = recording_engine(RecordingAccess::new().fail_on(0xC2));
        let err = engine
            .measure(CacheLevel::Uops, MetricKind::Retired, CounterSlot::Slot1)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.register(), Some(0xC2));
        assert_eq!(engine.access().writes().len(), 2);
    }
}
