//! Content fingerprinting for change detection.
//!
//! A fast, non-cryptographic hash over full file bytes. Two scans of an
//! unchanged file must produce the same fingerprint; any byte-level edit
//! must produce a different one. Never used for identity or security.

use anyhow::{Context, Result};
use std::hash::{BuildHasher, Hasher};
use std::path::Path;

// Fixed seeds keep the fingerprint stable across processes.
const SEEDS: (u64, u64, u64, u64) = (
    0x9e37_79b9_7f4a_7c15,
    0x2545_f491_4f6c_dd1d,
    0x27d4_eb2f_1656_67c5,
    0x1656_67b1_9e37_79f9,
);

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let state = ahash::RandomState::with_seeds(SEEDS.0, SEEDS.1, SEEDS.2, SEEDS.3);
    let mut hasher = state.build_hasher();
    hasher.write(bytes);
    format!("{:016x}", hasher.finish())
}

pub fn fingerprint_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
    Ok(fingerprint_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_across_calls() {
        let a = fingerprint_bytes(b"hello world");
        let b = fingerprint_bytes(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn test_detects_byte_change() {
        let a = fingerprint_bytes(b"hello world");
        let b = fingerprint_bytes(b"hello world!");
        assert_ne!(a, b);
    }

    #[test]
    fn test_order_sensitive() {
        assert_ne!(fingerprint_bytes(b"ab"), fingerprint_bytes(b"ba"));
    }

    #[test]
    fn test_fixed_width_hex() {
        let fp = fingerprint_bytes(b"");
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_file_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("note.md");
        std::fs::write(&path, "some content").unwrap();
        assert_eq!(
            fingerprint_file(&path).unwrap(),
            fingerprint_bytes(b"some content")
        );
    }
}
