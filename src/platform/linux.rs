//! Linux per-process AMX permission state.
//!
//! Since 5.16 the kernel enables XTILEDATA in XCR0 but hands it to a process only
//! after an `arch_prctl(ARCH_REQ_XCOMP_PERM)` opt-in. We read the state and never
//! request it. See <https://docs.kernel.org/arch/x86/xstate.html>.

use crate::core::hardware::XFeatures;
use serde::Serialize;

/// Dynamic XSAVE components the kernel supports and the ones this process may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XcompPermissions {
    pub supported: u64,
    pub permitted: u64,
}

impl XcompPermissions {
    pub fn kernel_supports_tile_data(&self) -> bool {
        XFeatures::from_bits_retain(self.supported).contains(XFeatures::XTILEDATA)
    }

    pub fn tile_data_permitted(&self) -> bool {
        XFeatures::from_bits_retain(self.permitted).contains(XFeatures::XTILEDATA)
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod sys {
    use tracing::debug;

    pub const ARCH_GET_XCOMP_SUPP: libc::c_int = 0x1021;
    pub const ARCH_GET_XCOMP_PERM: libc::c_int = 0x1022;

    pub fn arch_prctl_get(code: libc::c_int) -> Option<u64> {
        let mut value: u64 = 0;
        // SAFETY: both GET codes write a single u64 through the pointer.
        let rc = unsafe { libc::syscall(libc::SYS_arch_prctl, code, &mut value as *mut u64) };
        if rc == 0 {
            Some(value)
        } else {
            debug!(
                code,
                error = %std::io::Error::last_os_error(),
                "arch_prctl query failed"
            );
            None
        }
    }
}

/// `None` on kernels without dynamic XSAVE features (pre-5.16) or off Linux.
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub fn xcomp_permissions() -> Option<XcompPermissions> {
    let supported = sys::arch_prctl_get(sys::ARCH_GET_XCOMP_SUPP)?;
    let permitted = sys::arch_prctl_get(sys::ARCH_GET_XCOMP_PERM)?;
    Some(XcompPermissions {
        supported,
        permitted,
    })
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
pub fn xcomp_permissions() -> Option<XcompPermissions> {
    None
}
