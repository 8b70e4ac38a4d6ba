pub mod linux;
pub mod snapshot;
pub mod x86;

use crate::error::ProbeError;

/// The processor this code is running on.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn native() -> Result<x86::NativeProcessor, ProbeError> {
    Ok(x86::NativeProcessor::new())
}

// Fallback
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn native() -> Result<x86::NativeProcessor, ProbeError> {
    Err(ProbeError::UnsupportedArch(std::env::consts::ARCH))
}
