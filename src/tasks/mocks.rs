//!
//! in-process collaborator mocks
//!
//! Stand-ins for the external binaries so the scheduler and pipeline can be
//! exercised end to end without `hal2maf`/`augustus`/`joingenes` installed.
//! Every mock counts its invocations, which is what restart tests assert on.
//!
use crate::artifact::{Artifact, BlobStore};
use crate::common::{GenomeId, Window};
use crate::error::{CgpError, Result};
use crate::tasks::join::chunk_marker;
use crate::tasks::{
    AlignmentExtractor, GeneJoiner, GenePredictor, GffChunkSet, MergedResult, PredictionInputs,
    PredictionOutput,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

///
/// Produces a fake MAF chunk whose content encodes the window, so artifact
/// ids stay deterministic per window.
///
#[derive(Default)]
pub struct MockExtractor {
    pub calls: AtomicUsize,
    /// windows whose extraction should fail
    pub fail_on: Mutex<Vec<Window>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn failing_on(window: Window) -> Self {
        let m = Self::default();
        m.fail_on.lock().unwrap().push(window);
        m
    }
    pub fn n_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AlignmentExtractor for MockExtractor {
    fn extract(
        &self,
        store: &dyn BlobStore,
        _hal: &Artifact,
        ref_genome: &str,
        window: &Window,
    ) -> Result<Artifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.lock().unwrap().contains(window) {
            return Err(CgpError::process("hal2maf", "mock failure"));
        }
        store.put(format!("maf {} {}\n", ref_genome, window).as_bytes())
    }

    fn tree(&self, store: &dyn BlobStore, _hal: &Artifact) -> Result<Artifact> {
        store.put(b"((a,b),c);\n")
    }
}

///
/// Produces one fake GFF line per target genome and window.
///
#[derive(Default)]
pub struct MockPredictor {
    pub calls: AtomicUsize,
}

impl MockPredictor {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn n_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GenePredictor for MockPredictor {
    fn predict(
        &self,
        store: &dyn BlobStore,
        _maf_chunk: &Artifact,
        inputs: &PredictionInputs,
        window: &Window,
    ) -> Result<PredictionOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut chunks: GffChunkSet = BTreeMap::new();
        for genome in &inputs.targets {
            let line = format!(
                "{}\tAUGUSTUS\tCDS\t{}\t{}\t.\t+\t0\tgene \"{}\";\n",
                window.chrom(),
                window.start() + 1,
                window.end(),
                genome
            );
            chunks.insert(genome.clone(), store.put(line.as_bytes())?);
        }
        let log = store.put(format!("predicted {}\n", window).as_bytes())?;
        Ok(PredictionOutput { chunks, log })
    }
}

///
/// Line-based joiner: the raw artifact is the marker-delimited window-order
/// concatenation, the joined artifact keeps each distinct record once (first
/// occurrence wins, so overlap duplicates collapse), the normalized artifact
/// is the joined set in canonical (sorted) line order.
///
#[derive(Default)]
pub struct MockJoiner {
    pub calls: AtomicUsize,
    pub fail_genomes: Mutex<Vec<GenomeId>>,
}

impl MockJoiner {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn failing_on(genome: &str) -> Self {
        let m = Self::default();
        m.fail_genomes.lock().unwrap().push(genome.to_string());
        m
    }
    pub fn n_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeneJoiner for MockJoiner {
    fn join(
        &self,
        store: &dyn BlobStore,
        genome: &GenomeId,
        chunks: &[(Window, Artifact)],
    ) -> Result<MergedResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_genomes.lock().unwrap().contains(genome) {
            return Err(CgpError::process("joingenes", "mock failure"));
        }

        let mut raw = String::new();
        let mut joined_lines: Vec<String> = Vec::new();
        for (window, chunk) in chunks {
            raw.push_str(&chunk_marker(window));
            let text = String::from_utf8_lossy(&store.get(chunk)?).into_owned();
            raw.push_str(&text);
            for line in text.lines() {
                if !joined_lines.iter().any(|l| l == line) {
                    joined_lines.push(line.to_string());
                }
            }
        }
        let mut normalized_lines = joined_lines.clone();
        normalized_lines.sort();

        let joined = joined_lines.join("\n");
        let normalized = normalized_lines.join("\n");
        Ok(MergedResult {
            raw: store.put(raw.as_bytes())?,
            joined: store.put(joined.as_bytes())?,
            normalized: store.put(normalized.as_bytes())?,
        })
    }
}

//
// tests
//
