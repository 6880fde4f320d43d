//! Core PMU register definitions for Sandy Bridge
//!
//! General-purpose performance counters and their event-select registers.
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Chapter 18: Performance Monitoring

use std::fmt;

use crate::register::RegisterLayout;

/// Number of general-purpose performance counters driven by cachemon
pub const CORE_PMU_COUNTERS: usize = 4;

/// MSR addresses for Core PMU
pub mod msr {
    /// Performance Event Select registers (IA32_PERFEVTSELx)
    pub const IA32_PERFEVTSEL0: u32 = 0x186;
    pub const IA32_PERFEVTSEL1: u32 = 0x187;
    pub const IA32_PERFEVTSEL2: u32 = 0x188;
    pub const IA32_PERFEVTSEL3: u32 = 0x189;

    /// Performance Counter registers (IA32_PMCx)
    pub const IA32_PMC0: u32 = 0xC1;
    pub const IA32_PMC1: u32 = 0xC2;
    pub const IA32_PMC2: u32 = 0xC3;
    pub const IA32_PMC3: u32 = 0xC4;
}

/// One of the four (event-select, counter) register pairs
///
/// The pairing is fixed by hardware: `IA32_PERFEVTSELn` controls `IA32_PMCn`
/// and nothing else. Slots are shared with every other piece of software on
/// the core, including the kernel's own perf subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterSlot {
    Slot0,
    Slot1,
    Slot2,
    Slot3,
}

impl CounterSlot {
    pub const ALL: [CounterSlot; CORE_PMU_COUNTERS] = [
        CounterSlot::Slot0,
        CounterSlot::Slot1,
        CounterSlot::Slot2,
        CounterSlot::Slot3,
    ];

    /// Event-select register (IA32_PERFEVTSELx) of this slot
    pub const fn event_select(self) -> u32 {
        match self {
            CounterSlot::Slot0 => msr::IA32_PERFEVTSEL0,
            CounterSlot::Slot1 => msr::IA32_PERFEVTSEL1,
            CounterSlot::Slot2 => msr::IA32_PERFEVTSEL2,
            CounterSlot::Slot3 => msr::IA32_PERFEVTSEL3,
        }
    }

    /// Counter register (IA32_PMCx) of this slot
    pub const fn counter(self) -> u32 {
        match self {
            CounterSlot::Slot0 => msr::IA32_PMC0,
            CounterSlot::Slot1 => msr::IA32_PMC1,
            CounterSlot::Slot2 => msr::IA32_PMC2,
            CounterSlot::Slot3 => msr::IA32_PMC3,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            CounterSlot::Slot0 => 0,
            CounterSlot::Slot1 => 1,
            CounterSlot::Slot2 => 2,
            CounterSlot::Slot3 => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for CounterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Performance Event Select register layout (the fields cachemon drives)
///
/// ## Register Format
///
/// | Bits   | Field           | Description                    |
/// |--------|-----------------|--------------------------------|
/// | 0-7    | event_code      | Event select                   |
/// | 8-15   | unit_mask       | Unit mask                      |
/// | 16     | usr_enabled     | Count in user mode             |
/// | 17     | os_enabled      | Count in OS mode               |
/// | 22     | counter_enabled | Enable counter                 |
///
/// Edge detect, pin control, APIC interrupt, any-thread, invert and counter
/// mask are always written as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSelectConfig {
    /// Event select (bits 0-7)
    pub event_code: u8,

    /// Unit mask (bits 8-15)
    pub unit_mask: u8,

    /// Count in user mode (bit 16)
    pub usr_enabled: bool,

    /// Count in OS mode (bit 17)
    pub os_enabled: bool,

    /// Enable counter (bit 22)
    pub counter_enabled: bool,
}

pub const USR_BIT: u32 = 1 << 16;
pub const OS_BIT: u32 = 1 << 17;
pub const ENABLE_BIT: u32 = 1 << 22;

impl EventSelectConfig {
    /// Encode into the 32-bit value written to EAX (EDX is always zero)
    pub fn encode(&self) -> u32 {
        (self.event_code as u32)
            | ((self.unit_mask as u32) << 8)
            | (if self.usr_enabled { USR_BIT } else { 0 })
            | (if self.os_enabled { OS_BIT } else { 0 })
            | (if self.counter_enabled { ENABLE_BIT } else { 0 })
    }

    /// Same configuration with the enable bit set
    pub fn enabled(self) -> Self {
        Self {
            counter_enabled: true,
            ..self
        }
    }
}

impl RegisterLayout for EventSelectConfig {
    fn to_msr_value(&self) -> u64 {
        self.encode() as u64
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            event_code: (value & 0xFF) as u8,
            unit_mask: ((value >> 8) & 0xFF) as u8,
            usr_enabled: (value & USR_BIT as u64) != 0,
            os_enabled: (value & OS_BIT as u64) != 0,
            counter_enabled: (value & ENABLE_BIT as u64) != 0,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if !self.counter_enabled {
            return Err("event select written without the enable bit");
        }
        if !self.usr_enabled && !self.os_enabled {
            return Err("event select counts in neither user nor OS mode");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_pairing_is_fixed() {
        let pairs: Vec<(u32, u32)> = CounterSlot::ALL
            .iter()
            .map(|s| (s.event_select(), s.counter()))
            .collect();
        assert_eq!(
            pairs,
            vec![(0x186, 0xC1), (0x187, 0xC2), (0x188, 0xC3), (0x189, 0xC4)]
        );
    }

    #[test]
    fn test_slot_index() {
        for (i, slot) in CounterSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
            assert_eq!(CounterSlot::from_index(i), Some(*slot));
        }
        assert_eq!(CounterSlot::from_index(4), None);
    }

    #[test]
    fn test_event_select_bit_positions() {
        let config = EventSelectConfig {
            event_code: 0x2E,
            unit_mask: 0x4F,
            usr_enabled: true,
            os_enabled: true,
            counter_enabled: true,
        };
        assert_eq!(config.encode(), 0x0043_4F2E);

        let usr_only = EventSelectConfig {
            event_code: 0x0E,
            unit_mask: 0x01,
            usr_enabled: true,
            ..Default::default()
        };
        assert_eq!(usr_only.encode(), 0x0001_010E);
        assert_eq!(usr_only.enabled().encode(), 0x0041_010E);
    }

    #[test]
    fn test_event_select_decode() {
        let decoded = EventSelectConfig::from_msr_value(0x0043_412E);
        assert_eq!(decoded.event_code, 0x2E);
        assert_eq!(decoded.unit_mask, 0x41);
        assert!(decoded.usr_enabled);
        assert!(decoded.os_enabled);
        assert!(decoded.counter_enabled);
    }

    #[test]
    fn test_validate_requires_enable() {
        let config = EventSelectConfig {
            event_code: 0x24,
            unit_mask: 0x20,
            usr_enabled: true,
            os_enabled: true,
            counter_enabled: false,
        };
        assert!(config.validate().is_err());
        assert!(config.enabled().validate().is_ok());
    }
}
