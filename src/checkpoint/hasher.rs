//! Content hashing for context payloads using BLAKE3

use crate::context::ActiveContext;
use crate::error::StorageError;
use crate::types::ContentHash;
use blake3::Hasher;

/// Domain separator so a context digest never collides with another payload kind.
const CONTEXT_DOMAIN: &[u8] = b"keeper.context.v1";

/// Hash an already-canonical payload.
///
/// hash = BLAKE3("keeper.context.v1" || payload_len || payload)
pub fn hash_payload(payload: &str) -> ContentHash {
    let bytes = payload.as_bytes();
    let mut hasher = Hasher::new();
    hasher.update(CONTEXT_DOMAIN);
    // Length prefix (8 bytes, big-endian for determinism)
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
    ContentHash::from_bytes(*hasher.finalize().as_bytes())
}

/// Serialize `context` canonically and hash it.
pub fn canonical_form(context: &ActiveContext) -> Result<(String, ContentHash), StorageError> {
    let payload = context
        .to_canonical_json()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    let hash = hash_payload(&payload);
    Ok((payload, hash))
}

/// Check a stored payload against its recorded digest.
pub fn verify_payload(payload: &str, expected: &ContentHash) -> bool {
    hash_payload(payload) == *expected
}
