//!
//! content-addressed artifact store
//!
//! Tasks exchange `Artifact` references, never payloads; the payload lives
//! in a `BlobStore`. An artifact id is the SHA-256 of its content, so
//! importing identical bytes twice yields the same reference and restart
//! state can be validated cheaply.
//!
use crate::error::{CgpError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

///
/// Opaque content-addressed reference to a blob (alignment chunk, feature
/// set, log, merged output). Immutable once written.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Artifact(String);

impl Artifact {
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

///
/// Durable blob storage boundary. Ownership of content transfers to the
/// store on `put`; everything handed out afterwards is read-only.
///
pub trait BlobStore: Send + Sync {
    fn put(&self, bytes: &[u8]) -> Result<Artifact>;
    fn get(&self, artifact: &Artifact) -> Result<Vec<u8>>;
    fn contains(&self, artifact: &Artifact) -> bool;
    /// content size in bytes, for resource estimation
    fn size(&self, artifact: &Artifact) -> Result<u64>;

    fn put_file(&self, path: &Path) -> Result<Artifact> {
        let bytes = std::fs::read(path)?;
        self.put(&bytes)
    }

    /// materialize an artifact at `dest` (parent directories created)
    fn export(&self, artifact: &Artifact, dest: &Path) -> Result<()> {
        if let Some(dir) = dest.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let bytes = self.get(artifact)?;
        std::fs::write(dest, bytes)?;
        Ok(())
    }
}

///
/// Directory-backed store: one file per artifact, named by content hash.
///
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(FsBlobStore {
            root: root.to_path_buf(),
        })
    }
    fn path_of(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<Artifact> {
        let id = sha256_hex(bytes);
        let path = self.path_of(&id);
        if !path.exists() {
            // write-then-rename so concurrent writers of the same content
            // never expose a half-written blob
            let tmp = tempfile::NamedTempFile::new_in(&self.root)?;
            std::fs::write(tmp.path(), bytes)?;
            tmp.persist(&path)
                .map_err(|e| CgpError::Io(e.error))?;
        }
        Ok(Artifact(id))
    }

    fn get(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.path_of(artifact.id()))?)
    }

    fn contains(&self, artifact: &Artifact) -> bool {
        self.path_of(artifact.id()).exists()
    }

    fn size(&self, artifact: &Artifact) -> Result<u64> {
        Ok(std::fs::metadata(self.path_of(artifact.id()))?.len())
    }
}

///
/// In-memory store for tests.
///
#[derive(Default)]
pub struct MemBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<Artifact> {
        let id = sha256_hex(bytes);
        self.blobs
            .lock()
            .unwrap()
            .insert(id.clone(), bytes.to_vec());
        Ok(Artifact(id))
    }

    fn get(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(artifact.id())
            .cloned()
            .ok_or_else(|| {
                CgpError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no blob {}", artifact),
                ))
            })
    }

    fn contains(&self, artifact: &Artifact) -> bool {
        self.blobs.lock().unwrap().contains_key(artifact.id())
    }

    fn size(&self, artifact: &Artifact) -> Result<u64> {
        Ok(self.get(artifact)?.len() as u64)
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_artifact() {
        let store = MemBlobStore::new();
        let a = store.put(b"ACGT").unwrap();
        let b = store.put(b"ACGT").unwrap();
        let c = store.put(b"ACGA").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        let art = store.put(b"## gff chunk\n").unwrap();
        assert!(store.contains(&art));
        assert_eq!(store.get(&art).unwrap(), b"## gff chunk\n");
        assert_eq!(store.size(&art).unwrap(), 13);

        let dest = dir.path().join("out/sub/chunk.gff");
        store.export(&art, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"## gff chunk\n");
    }

    #[test]
    fn fs_store_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        let a = store.put(b"x").unwrap();
        let b = store.put(b"x").unwrap();
        assert_eq!(a, b);
        let n = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(n, 1);
    }

    #[test]
    fn put_file_matches_put() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        let src = dir.path().join("input.maf");
        std::fs::write(&src, b"a score=0\n").unwrap();
        let a = store.put_file(&src).unwrap();
        let b = store.put(b"a score=0\n").unwrap();
        assert_eq!(a, b);
    }
}
