//! FNV-1a hashing for the box layout fingerprint.
//!
//! The fingerprint is stored in snapshots and compared on restore, so it must
//! not depend on the process or the build the way `std::hash` does.

pub const FNV1A_OFFSET_BASIS_64: u64 = 0xcbf29ce484222325;
const FNV1A_PRIME_64: u64 = 0x0000_0100_0000_01b3;

/// Fold `bytes` into a hash state started from [`FNV1A_OFFSET_BASIS_64`].
pub fn fnv1a64_mix(hash: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(hash, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV1A_PRIME_64)
    })
}
