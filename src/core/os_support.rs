use crate::core::bits;
use crate::core::hardware::{Processor, XFeatures};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// CPUID.01H:ECX[26] - XSAVE/XRSTOR, XSETBV/XGETBV and XCR0 are implemented.
const XSAVE_BIT: u32 = 26;
/// CPUID.01H:ECX[27] - the OS has set CR4.OSXSAVE.
const OSXSAVE_BIT: u32 = 27;

const XCR_XFEATURE_ENABLED_MASK: u32 = 0;

/// Whether the OS lets this process use AMX tile state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OsSupport {
    /// The processor has no XSAVE.
    PlatformUnsupported,
    /// XSAVE exists but the OS has not enabled it.
    OsUnsupported,
    /// XCR0 is readable but lacks XTILECFG and/or XTILEDATA.
    StateDisabled { xcr0: u64 },
    Supported { xcr0: u64 },
}

impl OsSupport {
    pub fn is_supported(&self) -> bool {
        matches!(self, OsSupport::Supported { .. })
    }

    /// The XCR0 value read, if the gates got that far.
    pub fn xcr0(&self) -> Option<XFeatures> {
        match *self {
            OsSupport::StateDisabled { xcr0 } | OsSupport::Supported { xcr0 } => {
                Some(XFeatures::from_bits_retain(xcr0))
            }
            _ => None,
        }
    }
}

impl fmt::Display for OsSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            OsSupport::PlatformUnsupported => "Platform does not support XSAVE",
            OsSupport::OsUnsupported => "The OS does not support XSAVE",
            OsSupport::StateDisabled { .. } => "AMX state is not supported by the OS",
            OsSupport::Supported { .. } => "AMX state is supported by the OS",
        };
        f.write_str(msg)
    }
}

/// Check, in order: XSAVE present, OSXSAVE enabled, XCR0 tile bits set.
/// A failed gate ends the check; XGETBV only runs once both CPUID gates pass.
pub fn detect<P: Processor + ?Sized>(cpu: &P) -> OsSupport {
    let ecx = cpu.cpuid(1, 0).ecx;

    let outcome = if !bits::is_set(ecx, XSAVE_BIT) {
        OsSupport::PlatformUnsupported
    } else if !bits::is_set(ecx, OSXSAVE_BIT) {
        OsSupport::OsUnsupported
    } else {
        let xcr0 = cpu.xgetbv(XCR_XFEATURE_ENABLED_MASK);
        if XFeatures::from_bits_retain(xcr0).contains(XFeatures::AMX_TILE) {
            OsSupport::Supported { xcr0 }
        } else {
            OsSupport::StateDisabled { xcr0 }
        }
    };

    debug!(ecx, ?outcome, "OS support check");
    outcome
}
