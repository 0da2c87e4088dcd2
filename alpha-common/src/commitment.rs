//! Email commitment hashing.

use sha3::{Digest, Keccak256};

/// Keccak-256 over `email:session_id:salt` (UTF-8).
///
/// The commitment is what the zk-email verifier proves against; the email
/// itself never leaves the process.
pub fn email_commitment(email: &str, session_id: &str, salt: &str) -> [u8; 32] {
    let preimage = format!("{email}:{session_id}:{salt}");
    let mut hasher = Keccak256::new();
    hasher.update(preimage.as_bytes());
    hasher.finalize().into()
}

/// Lowercase `0x`-prefixed hex of a 32-byte word.
pub fn format_bytes32(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
