//! File fingerprints: a content digest or the byte length

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::{Result, SyncError};

const READ_CHUNK: usize = 8192;

/// Comparable stand-in for the state of a file's contents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Size-mode fingerprint for a byte length
    pub fn from_size(size: u64) -> Self {
        Self(size.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest used in content mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, hex encoded
    #[default]
    Sha256,
    /// BLAKE3, hex encoded
    Blake3,
}

/// How fingerprints are computed, fixed for a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "algorithm", rename_all = "lowercase")]
pub enum FingerprintMode {
    Content(HashAlgorithm),
    Size,
}

impl Default for FingerprintMode {
    fn default() -> Self {
        Self::Content(HashAlgorithm::default())
    }
}

impl FingerprintMode {
    pub fn is_size_only(&self) -> bool {
        matches!(self, Self::Size)
    }
}

/// Computes fingerprints of local files
#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter {
    mode: FingerprintMode,
}

impl Fingerprinter {
    pub fn new(mode: FingerprintMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FingerprintMode {
        self.mode
    }

    /// Fingerprint the file at `path`.
    ///
    /// A vanished or unreadable file yields [`SyncError::Fingerprint`]; callers
    /// check [`SyncError::is_vanished`] to treat the former as a skip.
    pub async fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        match self.mode {
            FingerprintMode::Size => {
                let metadata = fs::metadata(path)
                    .await
                    .map_err(|e| SyncError::fingerprint_error(path, e))?;
                Ok(Fingerprint::from_size(metadata.len()))
            }
            FingerprintMode::Content(algorithm) => hash_file(path, algorithm).await,
        }
    }
}

async fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<Fingerprint> {
    use sha2::{Digest, Sha256};

    let mut file = fs::File::open(path)
        .await
        .map_err(|e| SyncError::fingerprint_error(path, e))?;
    let mut buffer = vec![0; READ_CHUNK];

    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let bytes_read = file
                    .read(&mut buffer)
                    .await
                    .map_err(|e| SyncError::fingerprint_error(path, e))?;
                if bytes_read == 0 {
                    break;
                }
                hasher.update(&buffer[..bytes_read]);
            }
            Ok(Fingerprint(format!("{:x}", hasher.finalize())))
        }
        HashAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            loop {
                let bytes_read = file
                    .read(&mut buffer)
                    .await
                    .map_err(|e| SyncError::fingerprint_error(path, e))?;
                if bytes_read == 0 {
                    break;
                }
                hasher.update(&buffer[..bytes_read]);
            }
            Ok(Fingerprint(hasher.finalize().to_hex().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_sha256_of_known_input() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "abc.txt", b"abc").await;

        let fp = Fingerprinter::default().fingerprint(&path).await.unwrap();
        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_blake3_matches_one_shot_hash() {
        let dir = TempDir::new().unwrap();
        let contents = vec![7u8; READ_CHUNK * 3 + 11];
        let path = write(&dir, "big.bin", &contents).await;

        let fp = Fingerprinter::new(FingerprintMode::Content(HashAlgorithm::Blake3))
            .fingerprint(&path)
            .await
            .unwrap();
        assert_eq!(fp.as_str(), blake3::hash(&contents).to_hex().as_str());
    }

    #[tokio::test]
    async fn test_size_mode_is_decimal_length() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "hundred.bin", &[0u8; 100]).await;

        let fp = Fingerprinter::new(FingerprintMode::Size)
            .fingerprint(&path)
            .await
            .unwrap();
        assert_eq!(fp, Fingerprint::from_size(100));
        assert_eq!(fp.to_string(), "100");
    }

    #[tokio::test]
    async fn test_vanished_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.txt");

        for mode in [FingerprintMode::default(), FingerprintMode::Size] {
            let err = Fingerprinter::new(mode)
                .fingerprint(&missing)
                .await
                .unwrap_err();
            assert!(err.is_vanished());
        }
    }

    #[tokio::test]
    async fn test_content_change_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.txt", b"one").await;
        let fingerprinter = Fingerprinter::default();

        let before = fingerprinter.fingerprint(&path).await.unwrap();
        fs::write(&path, b"two").await.unwrap();
        let after = fingerprinter.fingerprint(&path).await.unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_mode_serialization() {
        let json = serde_json::to_string(&FingerprintMode::Size).unwrap();
        assert_eq!(json, r#"{"mode":"size"}"#);

        let mode: FingerprintMode =
            serde_json::from_str(r#"{"mode":"content","algorithm":"blake3"}"#).unwrap();
        assert_eq!(mode, FingerprintMode::Content(HashAlgorithm::Blake3));
    }
}
