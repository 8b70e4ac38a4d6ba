use crate::core::bits;
use crate::core::decoder::{self, FeatureRecord};
use crate::core::hardware::Processor;
use crate::core::os_support::{self, OsSupport};
use crate::core::table::FeatureTable;
use crate::platform::linux::XcompPermissions;
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Structured Extended Feature Flags leaf.
const LEAF_EXTENDED_FEATURES: u32 = 0x07;
/// CPUID.07H.00H:EDX[24] - AMX-TILE.
const AMX_TILE_BIT: u32 = 24;
/// TMUL information; the highest leaf the AMX table reads.
const LEAF_TMUL_INFO: u32 = 0x1E;

/// Whether the processor reports AMX at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Max basic leaf is below 7, so there are no extended feature flags.
    LeafTooLow,
    /// CPUID.07H.00H:EDX[24] is clear.
    TileAbsent,
    /// AMX-TILE is set but leaves 1DH/1EH are not reported.
    MissingLeaves,
    Present,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Availability::LeafTooLow | Availability::TileAbsent => "AMX not supported",
            Availability::MissingLeaves => "Invalid CPUID reporting, missing AMX CPUID leaves",
            Availability::Present => "AMX supported",
        };
        f.write_str(msg)
    }
}

/// Everything one probe run found.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub vendor: String,
    pub max_leaf: u32,
    pub availability: Availability,
    pub features: Vec<FeatureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_support: Option<OsSupport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<XcompPermissions>,
}

impl ProbeReport {
    /// AMX is present and the OS has enabled tile state.
    pub fn is_usable(&self) -> bool {
        self.availability == Availability::Present
            && self.os_support.map_or(false, |s| s.is_supported())
    }

    pub fn with_permissions(mut self, permissions: Option<XcompPermissions>) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Gate on leaf support and AMX-TILE, then decode `table` and check OS support.
pub fn run<P: Processor + ?Sized>(cpu: &P, table: &FeatureTable) -> ProbeReport {
    let leaf0 = cpu.cpuid(0, 0);
    let max_leaf = leaf0.eax;
    let mut report = ProbeReport {
        vendor: leaf0.vendor(),
        max_leaf,
        availability: Availability::LeafTooLow,
        features: Vec::new(),
        os_support: None,
        permissions: None,
    };

    report.availability = if max_leaf < LEAF_EXTENDED_FEATURES {
        Availability::LeafTooLow
    } else if !bits::is_set(cpu.cpuid(LEAF_EXTENDED_FEATURES, 0).edx, AMX_TILE_BIT) {
        Availability::TileAbsent
    } else if max_leaf < LEAF_TMUL_INFO {
        Availability::MissingLeaves
    } else {
        Availability::Present
    };

    info!(
        vendor = %report.vendor,
        max_leaf,
        availability = ?report.availability,
        "processor identified"
    );

    if report.availability == Availability::Present {
        report.features = decoder::decode(table, cpu);
        report.os_support = Some(os_support::detect(cpu));
    }
    report
}
