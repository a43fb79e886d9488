//! HMAC-SHA-256 helpers and the IEEE 802.11 key derivation function.

use alloc::vec;
use alloc::vec::Vec;
use hmac_sha256::HMAC;
use zeroize::Zeroizing;

/// Output length of HMAC-SHA-256.
pub const SHA256_MAC_LEN: usize = 32;

/// HMAC-SHA-256 over the concatenation of `parts`.
pub fn hmac_sha256_vector(key: &[u8], parts: &[&[u8]]) -> [u8; SHA256_MAC_LEN] {
    let mut mac = HMAC::new(key);
    for part in parts {
        mac.update(*part);
    }
    mac.finalize()
}

/// KDF-Hash-Length from IEEE Std 802.11, section 12.7.1.7.2, with SHA-256.
///
/// Produces `bits` bits of output. Each block is
/// `HMAC(key, counter || label || data || length)` with 16-bit little-endian
/// counter (starting at 1) and length. Unused low bits of the final octet are
/// cleared.
pub fn sha256_prf_bits(key: &[u8], label: &str, data: &[u8], bits: usize) -> Zeroizing<Vec<u8>> {
    let len = (bits + 7) / 8;
    let length_le = (bits as u16).to_le_bytes();
    let mut out = Zeroizing::new(vec![0u8; len]);
    let mut counter: u16 = 1;
    let mut pos = 0;
    while pos < len {
        let block = Zeroizing::new(hmac_sha256_vector(
            key,
            &[&counter.to_le_bytes()[..], label.as_bytes(), data, &length_le[..]],
        ));
        let take = (len - pos).min(SHA256_MAC_LEN);
        out[pos..pos + take].copy_from_slice(&block[..take]);
        pos += take;
        counter = counter.wrapping_add(1);
    }
    if bits % 8 != 0 {
        out[len - 1] &= 0xffu8 << (8 - bits % 8);
    }
    out
}
