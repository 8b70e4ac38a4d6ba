//! Hardware Query Interface
//! CPUID / XGETBV primitives and the values they return.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four CPUID output registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Register {
    Eax = 0,
    Ebx = 1,
    Ecx = 2,
    Edx = 3,
}

impl Register {
    pub const fn name(self) -> &'static str {
        match self {
            Register::Eax => "EAX",
            Register::Ebx => "EBX",
            Register::Ecx => "ECX",
            Register::Edx => "EDX",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a single CPUID query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

impl Registers {
    pub const fn new(eax: u32, ebx: u32, ecx: u32, edx: u32) -> Self {
        Self { eax, ebx, ecx, edx }
    }

    pub const fn get(&self, register: Register) -> u32 {
        match register {
            Register::Eax => self.eax,
            Register::Ebx => self.ebx,
            Register::Ecx => self.ecx,
            Register::Edx => self.edx,
        }
    }

    /// Vendor identification string from a leaf 0 result (EBX, EDX, ECX order).
    pub fn vendor(&self) -> String {
        let mut bytes = Vec::with_capacity(12);
        for reg in [self.ebx, self.edx, self.ecx] {
            bytes.extend_from_slice(&reg.to_le_bytes());
        }
        String::from_utf8_lossy(&bytes)
            .trim_end_matches('\0')
            .to_string()
    }
}

bitflags! {
    /// XCR0 state components (XFEATURE_ENABLED_MASK).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct XFeatures: u64 {
        const X87 = 1 << 0;
        const SSE = 1 << 1;
        const AVX = 1 << 2;
        const BNDREGS = 1 << 3;
        const BNDCSR = 1 << 4;
        const OPMASK = 1 << 5;
        const ZMM_HI256 = 1 << 6;
        const HI16_ZMM = 1 << 7;
        const PKRU = 1 << 9;
        const XTILECFG = 1 << 17;
        const XTILEDATA = 1 << 18;

        /// Both tile components must be enabled for AMX to be usable.
        const AMX_TILE = Self::XTILECFG.bits() | Self::XTILEDATA.bits();
    }
}

impl XFeatures {
    /// Names of the known components set in `self`, lowest bit first.
    pub fn component_names(self) -> Vec<&'static str> {
        self.iter_names()
            .filter(|(_, flag)| *flag != XFeatures::AMX_TILE)
            .map(|(name, _)| name)
            .collect()
    }
}

/// The two primitives the probe needs from a processor.
///
/// Implementations must not fail: a leaf the processor does not implement
/// reads back as whatever the hardware returns (usually zeros).
pub trait Processor {
    /// Execute CPUID with EAX = `leaf`, ECX = `subleaf`.
    fn cpuid(&self, leaf: u32, subleaf: u32) -> Registers;

    /// Read extended control register `xcr` (0 = XFEATURE_ENABLED_MASK).
    fn xgetbv(&self, xcr: u32) -> u64;
}

impl<P: Processor + ?Sized> Processor for &P {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> Registers {
        (**self).cpuid(leaf, subleaf)
    }

    fn xgetbv(&self, xcr: u32) -> u64 {
        (**self).xgetbv(xcr)
    }
}
