//! Splits a payload into a fixed number of chunks and computes its keyed
//! content digest.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use wire::Digest;

type HmacSha256 = Hmac<Sha256>;

/// Splits `payload` into exactly `count` chunks of `ceil(len / count)`
/// bytes apiece, the last chunks shrinking to whatever is left — and to
/// nothing at all once the payload is exhausted, for a payload shorter
/// than `count` chunk-widths. `count` must be at least 1.
pub fn split(payload: &[u8], count: usize) -> Vec<Vec<u8>> {
    assert!(count > 0, "chunk count must be positive");
    let chunk_size = (payload.len() + count - 1) / count;

    (0..count)
        .map(|i| {
            let start = (i * chunk_size).min(payload.len());
            let end = ((i + 1) * chunk_size).min(payload.len());
            payload[start..end].to_vec()
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
#[error("HMAC secret must not be empty")]
pub struct EmptySecret;

/// Computes the HMAC-SHA-256 of `payload` keyed by `secret` — this is the
/// content digest used as the identifier for the whole file.
pub fn digest(secret: &[u8], payload: &[u8]) -> Result<Digest, EmptySecret> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| EmptySecret)?;
    mac.update(payload);
    let bytes = mac.finalize().into_bytes();
    Ok(Digest::from_slice(&bytes).expect("HMAC-SHA-256 output is always 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_even_payload() {
        let chunks = split(b"abcdef", 3);
        assert_eq!(chunks, vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec()]);
    }

    #[test]
    fn split_uneven_payload_shrinks_trailing_chunks() {
        // ceil(7 / 3) == 3, so chunks are 3, 3, then whatever remains.
        let chunks = split(b"abcdefg", 3);
        assert_eq!(chunks, vec![b"abc".to_vec(), b"def".to_vec(), b"g".to_vec()]);
    }

    #[test]
    fn split_short_payload_yields_trailing_empty_chunks() {
        let chunks = split(b"ab", 4);
        assert_eq!(chunks, vec![b"a".to_vec(), b"b".to_vec(), vec![], vec![]]);
    }

    #[test]
    fn split_empty_payload_yields_empty_chunks() {
        let chunks = split(b"", 4);
        assert_eq!(chunks, vec![vec![], vec![], vec![], vec![]]);
    }

    #[test]
    fn digest_is_deterministic_and_key_dependent() {
        let a = digest(b"secret-one", b"payload").unwrap();
        let b = digest(b"secret-one", b"payload").unwrap();
        let c = digest(b"secret-two", b"payload").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[quickcheck_macros::quickcheck]
    fn split_reassembles_to_original(payload: Vec<u8>, count_seed: u8) -> bool {
        let count = (count_seed as usize % 8) + 1;
        let chunks = split(&payload, count);
        let reassembled: Vec<u8> = chunks.into_iter().flatten().collect();
        reassembled == payload
    }
}
