//! Content-addressed storage for released model files.
//!
//! Every model and weights file a release points at lives under
//! `objects/<aa>/<rest-of-sha256>`. Files are written once and never
//! modified; a later release that ships identical bytes reuses the blob.
//! Reads re-hash the bytes so a model damaged on disk is reported instead of
//! being served as production.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::RegistryError;
use crate::storage_traits::{ArtifactRef, ContentDigest, StorageResult};

const OBJECTS_DIR: &str = "objects";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    objects: PathBuf,
}

impl ArtifactStore {
    pub fn open(registry_root: impl AsRef<Path>) -> StorageResult<Self> {
        let objects = registry_root.as_ref().join(OBJECTS_DIR);
        fs::create_dir_all(&objects)?;
        Ok(Self { objects })
    }

    /// On-disk location of an artifact's bytes.
    pub fn locate(&self, digest: &ContentDigest) -> PathBuf {
        let hex = digest.as_str();
        self.objects.join(&hex[..2]).join(&hex[2..])
    }

    /// Store a submitted model or weights file and describe it.
    pub fn put(&self, bytes: &[u8], file_name: &str) -> StorageResult<ArtifactRef> {
        let artifact = ArtifactRef::for_bytes(bytes, file_name);
        if self.contains(&artifact) {
            return Ok(artifact);
        }

        let path = self.locate(&artifact.digest);
        let shard = path.parent().unwrap_or(&self.objects);
        fs::create_dir_all(shard)?;

        let mut tmp = NamedTempFile::new_in(shard)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(artifact)
    }

    /// Whether the blob is present with the size recorded for it.
    pub fn contains(&self, artifact: &ArtifactRef) -> bool {
        fs::metadata(self.locate(&artifact.digest))
            .is_ok_and(|m| m.is_file() && m.len() == artifact.size_bytes)
    }

    /// Read an artifact back, checking its bytes against the digest.
    pub fn load(&self, artifact: &ArtifactRef) -> StorageResult<Vec<u8>> {
        let path = self.locate(&artifact.digest);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RegistryError::NotFound {
                digest: artifact.digest.to_string(),
            },
            _ => RegistryError::Io(e),
        })?;

        let actual = ContentDigest::from_bytes(&bytes);
        if actual != artifact.digest {
            return Err(RegistryError::Corrupt {
                path,
                reason: format!("content hashes to {}", actual.short()),
            });
        }
        Ok(bytes)
    }
}
