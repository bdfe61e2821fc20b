//! Volume size rounding.
//!
//! Block backends allocate in fixed-size chunks; requested sizes are rounded
//! up to the next chunk boundary before provisioning so a volume is never
//! smaller than asked for.

/// Backend allocation granularity in bytes (4 MiB).
pub const ALLOC_GRANULARITY: u64 = 4 << 20;

/// Round `size` up to the next allocation-granularity boundary.
///
/// Zero stays zero. Sizes within one granule of `u64::MAX` saturate.
pub fn round_up(size: u64) -> u64 {
    size.div_ceil(ALLOC_GRANULARITY)
        .saturating_mul(ALLOC_GRANULARITY)
}
