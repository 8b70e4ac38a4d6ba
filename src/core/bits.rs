//! Bit extraction over 32-bit CPUID registers.
//!
//! Ranges are inclusive on both ends: `[start, stop]` with `start <= stop <= 31`.
//! Results are right-justified, so a field occupies bits `0..=(stop - start)`.

/// Single bit at `position`, as 0 or 1.
#[inline(always)]
pub const fn bit(value: u32, position: u32) -> u32 {
    (value >> position) & 1
}

#[inline(always)]
pub const fn is_set(value: u32, position: u32) -> bool {
    bit(value, position) == 1
}

/// Mask covering `[start, stop]` in place (not shifted down).
///
/// Panics unless `start <= stop <= 31`.
#[inline(always)]
pub const fn mask(start: u32, stop: u32) -> u32 {
    assert!(start <= stop, "start bit above stop bit");
    assert!(stop <= 31, "CPUID registers are 32 bits wide");
    let width = stop - start + 1;
    let low = if width == 32 { u32::MAX } else { (1 << width) - 1 };
    low << start
}

/// Inclusive field `[start, stop]`, shifted down to bit 0.
#[inline(always)]
pub const fn field(value: u32, start: u32, stop: u32) -> u32 {
    (value & mask(start, stop)) >> start
}
