//! Binary size conversions for pool sizes and volume quotas.

/// Bytes in one gibibyte.
pub const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;
/// Bytes in one tebibyte.
pub const BYTES_PER_TIB: u64 = BYTES_PER_GIB * 1024;

/// Converts whole tebibytes to bytes, returning `None` on overflow.
#[must_use]
pub const fn tib_to_bytes(size_tib: u64) -> Option<u64> {
    size_tib.checked_mul(BYTES_PER_TIB)
}

/// Converts whole gibibytes to bytes, returning `None` on overflow.
#[must_use]
pub const fn gib_to_bytes(size_gib: u64) -> Option<u64> {
    size_gib.checked_mul(BYTES_PER_GIB)
}

/// Converts bytes to whole tebibytes, rounding down.
#[must_use]
pub const fn bytes_to_tib(size_bytes: u64) -> u64 {
    match size_bytes.checked_div(BYTES_PER_TIB) {
        Some(tib) => tib,
        None => 0,
    }
}
