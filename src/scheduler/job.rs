//!
//! job identity, specs and outputs
//!
use crate::artifact::{sha256_hex, Artifact};
use crate::common::{GenomeId, Window};
use crate::tasks::{MergedResult, PredictionOutput};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Stable job identity: a pure function of (task kind, ordered input
/// artifact references, parameters). Never random or time-based, so a
/// restarted run maps onto the persisted results of the interrupted one.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn derive(tag: &str, inputs: &[&Artifact], params: &[&str]) -> JobId {
        let mut buf = String::from(tag);
        for input in inputs {
            buf.push('\0');
            buf.push_str(input.id());
        }
        for param in params {
            buf.push('\0');
            buf.push_str(param);
        }
        JobId(sha256_hex(buf.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // short prefix is enough to identify a job in logs
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

///
/// What a job does, carrying the coordinates (or genome) that identify the
/// failing unit when it goes wrong.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    /// export one window of the alignment
    Extract { window: Window },
    /// predict genes on one extracted window
    Predict { window: Window },
    /// reduce/join one genome's ordered window results
    Join { genome: GenomeId },
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobKind::Extract { window } => write!(f, "extract {}", window),
            JobKind::Predict { window } => write!(f, "predict {}", window),
            JobKind::Join { genome } => write!(f, "join {}", genome),
        }
    }
}

///
/// Declarative per-job resource request, derived from input sizes plus a
/// safety buffer. Consumed only by admission/placement, never by
/// correctness logic.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub disk_bytes: u64,
    pub memory_bytes: u64,
}

pub const GIB: u64 = 1 << 30;

impl ResourceRequest {
    pub fn new(disk_bytes: u64, memory_bytes: u64) -> Self {
        ResourceRequest {
            disk_bytes,
            memory_bytes,
        }
    }

    /// sum of the inputs' sizes plus `buffer` of disk
    pub fn from_input_sizes<I: IntoIterator<Item = u64>>(
        sizes: I,
        buffer: u64,
        memory_bytes: u64,
    ) -> Self {
        let disk: u64 = sizes.into_iter().sum();
        ResourceRequest {
            disk_bytes: disk + buffer,
            memory_bytes,
        }
    }
}

impl Default for ResourceRequest {
    fn default() -> Self {
        ResourceRequest::new(GIB, GIB)
    }
}

///
/// A schedulable unit: identity, kind, declared future dependencies and the
/// resource request.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    pub kind: JobKind,
    pub deps: Vec<JobId>,
    pub resources: ResourceRequest,
}

impl JobSpec {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        JobSpec {
            id,
            kind,
            deps: Vec::new(),
            resources: ResourceRequest::default(),
        }
    }
    pub fn with_deps(mut self, deps: Vec<JobId>) -> Self {
        self.deps = deps;
        self
    }
    pub fn with_resources(mut self, resources: ResourceRequest) -> Self {
        self.resources = resources;
        self
    }
}

///
/// Value a resolved job hands to its dependents. Only artifact references
/// move between tasks; payloads stay in the blob store.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JobOutput {
    MafChunk(Artifact),
    Prediction(PredictionOutput),
    Merged(MergedResult),
}

impl JobOutput {
    pub fn as_maf_chunk(&self) -> Option<&Artifact> {
        match self {
            JobOutput::MafChunk(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_prediction(&self) -> Option<&PredictionOutput> {
        match self {
            JobOutput::Prediction(p) => Some(p),
            _ => None,
        }
    }
    pub fn as_merged(&self) -> Option<&MergedResult> {
        match self {
            JobOutput::Merged(m) => Some(m),
            _ => None,
        }
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
    fn job_id_is_deterministic() {
        let store = MemBlobStore::new();
        let hal = store.put(b"hal").unwrap();
        let a = JobId::derive("extract", &[&hal], &["ref", "chr1", "0", "300"]);
        let b = JobId::derive("extract", &[&hal], &["ref", "chr1", "0", "300"]);
        assert_eq!(a, b);
    }

    #[test]
    fn job_id_separates_windows_and_kinds() {
        let store = MemBlobStore::new();
        let hal = store.put(b"hal").unwrap();
        let a = JobId::derive("extract", &[&hal], &["ref", "chr1", "0", "300"]);
        let b = JobId::derive("extract", &[&hal], &["ref", "chr1", "250", "300"]);
        let c = JobId::derive("predict", &[&hal], &["ref", "chr1", "0", "300"]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn job_id_is_not_separator_ambiguous() {
        let a = JobId::derive("t", &[], &["ab", "c"]);
        let b = JobId::derive("t", &[], &["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn resource_request_sums_inputs_and_buffer() {
        let r = ResourceRequest::from_input_sizes(vec![100, 200], 4 * GIB, 8 * GIB);
        assert_eq!(r.disk_bytes, 300 + 4 * GIB);
        assert_eq!(r.memory_bytes, 8 * GIB);
    }
}
