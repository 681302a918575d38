//!
//! alignment-extraction collaborator (`hal2maf`, `halStats`)
//!
use crate::artifact::{Artifact, BlobStore};
use crate::common::Window;
use crate::error::Result;
use crate::tasks::proc;
use std::process::Command;

///
/// Extracts one window of the whole-genome alignment as a MAF artifact,
/// and the phylogenetic tree the alignment was built from.
///
pub trait AlignmentExtractor: Send + Sync {
    fn extract(
        &self,
        store: &dyn BlobStore,
        hal: &Artifact,
        ref_genome: &str,
        window: &Window,
    ) -> Result<Artifact>;

    /// NEWICK tree of the alignment, extracted once per run
    fn tree(&self, store: &dyn BlobStore, hal: &Artifact) -> Result<Artifact>;
}

///
/// `hal2maf` / `halStats` backed extractor. Each invocation works in a
/// private scratch directory; the HAL file and the produced MAF chunk only
/// ever move through the blob store.
///
pub struct Hal2Maf;

impl AlignmentExtractor for Hal2Maf {
    fn extract(
        &self,
        store: &dyn BlobStore,
        hal: &Artifact,
        ref_genome: &str,
        window: &Window,
    ) -> Result<Artifact> {
        let scratch = tempfile::tempdir()?;
        let hal_path = scratch.path().join("alignment.hal");
        let maf_path = scratch.path().join("chunk.maf");
        store.export(hal, &hal_path)?;

        let mut cmd = Command::new("hal2maf");
        cmd.arg("--noAncestors")
            .arg("--noDupes")
            .arg("--refGenome")
            .arg(ref_genome)
            .arg("--refSequence")
            .arg(window.chrom())
            .arg("--start")
            .arg(window.start().to_string())
            .arg("--length")
            .arg(window.length().to_string())
            .arg(&hal_path)
            .arg(&maf_path);
        proc::run(cmd)?;

        store.put_file(&maf_path)
    }

    fn tree(&self, store: &dyn BlobStore, hal: &Artifact) -> Result<Artifact> {
        let scratch = tempfile::tempdir()?;
        let hal_path = scratch.path().join("alignment.hal");
        let tree_path = scratch.path().join("tree.nwk");
        store.export(hal, &hal_path)?;

        let mut cmd = Command::new("halStats");
        cmd.arg("--tree").arg(&hal_path);
        proc::run_with_stdout(cmd, &tree_path)?;

        store.put_file(&tree_path)
    }
}
