//! Checksum utilities for input fingerprints and content addressing

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Checksum algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Compute checksum for a file
pub fn compute_file_checksum(
    path: impl AsRef<Path>,
    algorithm: ChecksumAlgorithm,
) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    compute_checksum(&mut file, algorithm)
}

/// Compute checksum for any readable source
pub fn compute_checksum<R: Read>(reader: &mut R, algorithm: ChecksumAlgorithm) -> Result<String> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => digest_reader::<Sha256, R>(reader),
    }
}

fn digest_reader<D: Digest, R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 hex digest of an in-memory buffer
///
/// Used as the content address for canonical serializations, so two equal
/// byte strings always map to the same key.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
