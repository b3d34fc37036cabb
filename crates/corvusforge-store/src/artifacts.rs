// crates/corvusforge-store/src/artifacts.rs
// ============================================================================
// Module: Filesystem Artifact Store
// Description: Content-addressed blob store with a two-character shard
// prefix directory layout.
// Purpose: Give artifacts identity independent of any filename scheme: the
// content address is the only key.
// Dependencies: corvusforge-core, std::fs
// ============================================================================

//! ## Overview
//! Artifacts are written once, keyed by their SHA-256 content address, under
//! `<root>/<first-two-hex-chars>/<address>.bin`. A second `put` of identical
//! bytes is a no-op: the destination file already exists and is left alone.
//! `get` re-verifies the stored bytes against the address on every read.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use corvusforge_core::Artifact;
use corvusforge_core::ArtifactError;
use corvusforge_core::ArtifactStoreApi;
use corvusforge_core::ContentAddress;

/// A durable [`ArtifactStoreApi`] backed by a directory on disk.
///
/// # Invariants
/// - Every stored blob lives at a path derived solely from its content
///   address; no caller-supplied filename is ever used for storage.
pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    /// Opens (creating if absent) an artifact store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Storage`] if `root` cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|err| ArtifactError::Storage(err.to_string()))?;
        Ok(Self { root })
    }

    /// Returns the on-disk path of the blob stored at `address`.
    fn blob_path(&self, address: &ContentAddress) -> PathBuf {
        self.root.join(address.shard_prefix()).join(format!("{address}.bin"))
    }

    /// Returns the on-disk path of the sidecar media-type file for `address`.
    fn media_type_path(&self, address: &ContentAddress) -> PathBuf {
        self.root.join(address.shard_prefix()).join(format!("{address}.media-type"))
    }
}

impl ArtifactStoreApi for FilesystemArtifactStore {
    fn put(&self, bytes: &[u8], media_type: &str) -> Result<ContentAddress, ArtifactError> {
        let address = ContentAddress::new(corvusforge_core::sha256_hex(bytes));
        let blob_path = self.blob_path(&address);
        if blob_path.exists() {
            return Ok(address);
        }
        let Some(shard_dir) = blob_path.parent() else {
            return Err(ArtifactError::Storage("blob path has no parent directory".to_string()));
        };
        fs::create_dir_all(shard_dir).map_err(|err| ArtifactError::Storage(err.to_string()))?;
        let tmp_path = shard_dir.join(format!("{address}.tmp"));
        fs::write(&tmp_path, bytes).map_err(|err| ArtifactError::Storage(err.to_string()))?;
        fs::rename(&tmp_path, &blob_path).map_err(|err| ArtifactError::Storage(err.to_string()))?;
        fs::write(self.media_type_path(&address), media_type)
            .map_err(|err| ArtifactError::Storage(err.to_string()))?;
        Ok(address)
    }

    fn get(&self, address: &ContentAddress) -> Result<Artifact, ArtifactError> {
        let blob_path = self.blob_path(address);
        let bytes = fs::read(&blob_path).map_err(|_| ArtifactError::NotFound(address.clone()))?;
        let recomputed = corvusforge_core::sha256_hex(&bytes);
        if recomputed != address.as_str() {
            return Err(ArtifactError::Corrupted(address.clone()));
        }
        let media_type =
            fs::read_to_string(self.media_type_path(address)).unwrap_or_else(|_| String::new());
        let size_bytes = bytes.len() as u64;
        Ok(Artifact { content_address: address.clone(), size_bytes, media_type, bytes })
    }

    fn verify(&self, address: &ContentAddress) -> Result<bool, ArtifactError> {
        let blob_path = self.blob_path(address);
        let bytes = fs::read(&blob_path).map_err(|_| ArtifactError::NotFound(address.clone()))?;
        let recomputed = corvusforge_core::sha256_hex(&bytes);
        Ok(recomputed == address.as_str())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;

    #[test]
    fn put_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::open(dir.path()).unwrap();
        let address = store.put(b"hello world", "text/plain").unwrap();
        let artifact = store.get(&address).unwrap();
        assert_eq!(artifact.bytes, b"hello world");
        assert_eq!(artifact.media_type, "text/plain");
    }

    #[test]
    fn put_is_idempotent_for_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::open(dir.path()).unwrap();
        let first = store.put(b"same bytes", "text/plain").unwrap();
        let second = store.put(b"same bytes", "text/plain").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn get_missing_address_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::open(dir.path()).unwrap();
        let address = ContentAddress::new(corvusforge_core::sha256_hex(b"never stored"));
        assert!(matches!(store.get(&address), Err(ArtifactError::NotFound(_))));
    }

    #[test]
    fn tampered_blob_is_reported_as_corrupted_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::open(dir.path()).unwrap();
        let address = store.put(b"original", "text/plain").unwrap();
        let blob_path = store.blob_path(&address);
        fs::write(&blob_path, b"tampered").unwrap();
        assert!(matches!(store.get(&address), Err(ArtifactError::Corrupted(_))));
    }

    #[test]
    fn verify_reports_false_without_erroring_on_tamper() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::open(dir.path()).unwrap();
        let address = store.put(b"original", "text/plain").unwrap();
        fs::write(store.blob_path(&address), b"tampered").unwrap();
        assert!(!store.verify(&address).unwrap());
    }
}
