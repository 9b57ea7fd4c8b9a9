pub mod atomic_json;
pub mod config;
pub mod error;
pub mod shutdown;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use shutdown::ShutdownToken;

/// Truncated SHA-256 hex digest, shared by every deterministic-ID and
/// cache-key computation in the pipeline (enrichment cache key, record ID,
/// incident group ID).
pub fn sha256_hex_truncated(input: &str, len: usize) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let full_hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    full_hex.chars().take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_truncated() {
        let a = sha256_hex_truncated("https://example.com:2026-01-01", 16);
        let b = sha256_hex_truncated("https://example.com:2026-01-01", 16);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn different_inputs_give_different_hashes() {
        let a = sha256_hex_truncated("a", 12);
        let b = sha256_hex_truncated("b", 12);
        assert_ne!(a, b);
    }
}
