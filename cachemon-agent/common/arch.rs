// CPU architecture detection
//
// Only used to warn: the event table is Sandy Bridge specific and is applied
// as-is on whatever CPU we run on.

use once_cell::sync::Lazy;

use cachemon_raw::current_arch::SANDY_BRIDGE_MODELS;

use crate::common::cpuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuArchitecture {
    SandyBridge,
    OtherIntel { model: u32 },
    Unknown,
}

impl CpuArchitecture {
    pub fn name(&self) -> &'static str {
        match self {
            CpuArchitecture::SandyBridge => "Sandy Bridge",
            CpuArchitecture::OtherIntel { .. } => "Intel (not Sandy Bridge)",
            CpuArchitecture::Unknown => "Unknown",
        }
    }

    /// Whether the built-in event encodings are meant for this CPU
    pub fn matches_event_table(&self) -> bool {
        matches!(self, CpuArchitecture::SandyBridge)
    }
}

pub static CPU_ARCH: Lazy<CpuArchitecture> = Lazy::new(detect_architecture);

/// (display family, display model, stepping) from CPUID leaf 1 EAX
pub fn decode_signature(eax: u32) -> (u32, u32, u32) {
    let stepping = eax & 0xF;
    let model = (eax >> 4) & 0xF;
    let family = (eax >> 8) & 0xF;
    let extended_model = (eax >> 16) & 0xF;
    let extended_family = (eax >> 20) & 0xFF;

    let display_family = if family == 0xF {
        family + extended_family
    } else {
        family
    };

    let display_model = if family == 0x6 || family == 0xF {
        (extended_model << 4) + model
    } else {
        model
    };

    (display_family, display_model, stepping)
}

pub fn classify(family: u32, model: u32) -> CpuArchitecture {
    // Intel core architectures are Family 6
    if family != 0x6 {
        return CpuArchitecture::Unknown;
    }
    if SANDY_BRIDGE_MODELS.contains(&model) {
        CpuArchitecture::SandyBridge
    } else {
        CpuArchitecture::OtherIntel { model }
    }
}

fn detect_architecture() -> CpuArchitecture {
    let (eax, _ebx, _ecx, _edx) = cpuid::cpuid(1, 0);
    let (family, model, stepping) = decode_signature(eax);

    tracing::info!(
        "CPU: Family {:X}, Model {:X}, Stepping {:X}",
        family,
        model,
        stepping
    );

    let arch = classify(family, model);
    if !arch.matches_event_table() {
        tracing::warn!(
            "Event encodings target Sandy Bridge; counts on {} may be meaningless",
            arch.name()
        );
    }
    arch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sandy_bridge_signature() {
        // i7-2600: Family 6, Model 2A, Stepping 7
        assert_eq!(decode_signature(0x0002_06A7), (0x6, 0x2A, 0x7));
        // Xeon E5-2670: Family 6, Model 2D, Stepping 7
        assert_eq!(decode_signature(0x0002_06D7), (0x6, 0x2D, 0x7));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(0x6, 0x2A), CpuArchitecture::SandyBridge);
        assert_eq!(classify(0x6, 0x2D), CpuArchitecture::SandyBridge);
        assert_eq!(
            classify(0x6, 0x55),
            CpuArchitecture::OtherIntel { model: 0x55 }
        );
        assert_eq!(classify(0x17, 0x31), CpuArchitecture::Unknown);
        assert!(!CpuArchitecture::Unknown.matches_event_table());
    }
}
