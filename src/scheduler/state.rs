//!
//! persisted run state
//!
//! A map from deterministic job identity to resolved output, written after
//! every completion. On restart the scheduler consults it before scheduling
//! and re-executes only unresolved units.
//!
use crate::error::Result;
use crate::scheduler::job::{JobId, JobOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunState {
    resolved: BTreeMap<JobId, JobOutput>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// load persisted state; a missing file is an empty (fresh) state
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn record(&mut self, id: JobId, output: JobOutput) {
        self.resolved.insert(id, output);
    }

    pub fn get(&self, id: &JobId) -> Option<&JobOutput> {
        self.resolved.get(id)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.resolved.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{BlobStore, MemBlobStore};

    #[test]
    fn round_trips_through_json() {
        let store = MemBlobStore::new();
        let maf = store.put(b"maf").unwrap();
        let mut state = RunState::new();
        let id = JobId::derive("extract", &[], &["chr1", "0", "300"]);
        state.record(id.clone(), JobOutput::MafChunk(maf));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/run.json");
        state.save(&path).unwrap();

        let loaded = RunState::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&id), state.get(&id));
    }

    #[test]
    fn missing_file_is_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = RunState::load(&dir.path().join("absent.json")).unwrap();
        assert!(state.is_empty());
    }
}
