#[cfg(target_arch = "x86_64")]
pub fn cpuid(eax: u32, ecx: u32) -> (u32, u32, u32, u32) {
    let mut ebx: u32;
    let mut edx: u32;
    let mut eax_out = eax;
    let mut ecx_out = ecx;

    unsafe {
        std::arch::asm!(
            "mov {0:r}, rbx",
            "cpuid",
            "xchg {0:r}, rbx",
            out(reg) ebx,
            inout("eax") eax_out,
            inout("ecx") ecx_out,
            out("edx") edx,
            options(nostack, preserves_flags)
        );
    }

    (eax_out, ebx, ecx_out, edx)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn cpuid(_eax: u32, _ecx: u32) -> (u32, u32, u32, u32) {
    (0, 0, 0, 0)
}

/// Architectural PMU capabilities from CPUID leaf 0x0A
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmuInfo {
    pub version: u8,
    pub gp_counters: u8,
    pub counter_width: u8,
}

impl PmuInfo {
    pub fn from_leaf(eax: u32) -> Self {
        Self {
            version: (eax & 0xFF) as u8,
            gp_counters: ((eax >> 8) & 0xFF) as u8,
            counter_width: ((eax >> 16) & 0xFF) as u8,
        }
    }
}

pub fn pmu_info() -> PmuInfo {
    let (max_leaf, _ebx, _ecx, _edx) = cpuid(0, 0);
    if max_leaf < 0x0A {
        return PmuInfo::from_leaf(0);
    }
    let (eax, _ebx, _ecx, _edx) = cpuid(0x0A, 0);
    PmuInfo::from_leaf(eax)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_arch = "x86_64")]
    fn test_cpuid_vendor_leaf() {
        let (max_leaf, ebx, _ecx, _edx) = cpuid(0, 0);
        assert!(max_leaf >= 1);
        // Vendor string starts in EBX: "Genu", "Auth", ...
        assert_ne!(ebx, 0);
    }

    #[test]
    fn test_pmu_info_decode() {
        // Sandy Bridge: version 3, 4 counters per thread, 48 bits wide
        let info = PmuInfo::from_leaf(0x0730_0403);
        assert_eq!(info.version, 3);
        assert_eq!(info.gp_counters, 4);
        assert_eq!(info.counter_width, 48);
    }
}
