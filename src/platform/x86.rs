#[cfg(target_arch = "x86")]
use std::arch::x86::{__cpuid_count, _xgetbv};
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{__cpuid_count, _xgetbv};

use crate::core::bits;
use crate::core::hardware::{Processor, Registers};

const OSXSAVE_BIT: u32 = 27;

/// CPUID / XGETBV on the current logical processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProcessor {
    _private: (),
}

impl NativeProcessor {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    fn osxsave_enabled(&self) -> bool {
        bits::is_set(self.cpuid(1, 0).ecx, OSXSAVE_BIT)
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "xsave")]
unsafe fn read_xcr(xcr: u32) -> u64 {
    _xgetbv(xcr)
}

impl Processor for NativeProcessor {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[allow(unused_unsafe)]
    fn cpuid(&self, leaf: u32, subleaf: u32) -> Registers {
        // CPUID is unconditionally available on every x86_64 part and on any
        // 32-bit part able to run std.
        let r = unsafe { __cpuid_count(leaf, subleaf) };
        Registers::new(r.eax, r.ebx, r.ecx, r.edx)
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn cpuid(&self, _leaf: u32, _subleaf: u32) -> Registers {
        Registers::default()
    }

    /// Returns 0 when the OS has not enabled XGETBV, which would otherwise #UD.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    fn xgetbv(&self, xcr: u32) -> u64 {
        if !self.osxsave_enabled() {
            return 0;
        }
        // SAFETY: CR4.OSXSAVE is set, so XGETBV is enabled.
        unsafe { read_xcr(xcr) }
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn xgetbv(&self, _xcr: u32) -> u64 {
        0
    }
}
