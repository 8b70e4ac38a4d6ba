use thiserror::Error;

/// Ordering faults in a feature table. These are mistakes in static data,
/// so the built-in table is checked at compile time.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    #[error("feature table is empty")]
    Empty,
    #[error("first entry (leaf {leaf:#x}) must start at sub-leaf 0")]
    FirstNotSubleafZero { leaf: u32 },
    #[error("entry {index}: leaf {leaf:#x} group starts at sub-leaf {subleaf}, expected 0")]
    GroupNotAtSubleafZero { index: usize, leaf: u32, subleaf: u32 },
    #[error("entry {index}: leaf {leaf:#x} appears in more than one run")]
    SplitGroup { index: usize, leaf: u32 },
    #[error("entry {index}: CPUID.{leaf:#x}.{subleaf:#x} appears in more than one run")]
    SplitQuery { index: usize, leaf: u32, subleaf: u32 },
    #[error("entry {index}: leaf {leaf:#x} is reserved as the end-of-table marker")]
    ReservedLeaf { index: usize, leaf: u32 },
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid feature table: {0}")]
    Table(#[from] TableError),
    #[error("CPUID is not available on {0}")]
    UnsupportedArch(&'static str),
    #[error("Failed to pin thread to logical CPU {cpu} (available: {available:?})")]
    CpuPin { cpu: usize, available: Vec<usize> },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
