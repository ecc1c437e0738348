//! BLAKE3-based opaque identifiers

use rand::RngCore;

/// Opaque identifier for an ephemeral key: BLAKE3 of 32 fresh random bytes,
/// hex-encoded.  Never computed over key material.
pub fn random_key_id() -> String {
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"bw-ephemeral-key-id-v1\x00");
    hasher.update(&entropy);
    hex::encode(hasher.finalize().as_bytes())
}

/// Random URL-safe token string of `len` bytes of entropy (access/refresh tokens).
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ids_are_unique_hex() {
        let a = random_key_id();
        let b = random_key_id();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
