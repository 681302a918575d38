//!
//! gene-prediction collaborator (`augustus` in comparative mode)
//!
use crate::artifact::{Artifact, BlobStore};
use crate::common::{GenomeId, Window};
use crate::error::Result;
use crate::tasks::{proc, GffChunkSet, PredictionOutput};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;
use std::process::Command;

///
/// Read-only shared inputs of every prediction task. All artifacts are
/// immutable for the duration of the run.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictionInputs {
    /// NEWICK tree of the alignment
    pub tree: Artifact,
    /// extrinsic-evidence database
    pub hints_db: Artifact,
    /// trained comparative model parameters
    pub cgp_param: Artifact,
    /// extrinsic configuration
    pub cgp_cfg: Artifact,
    /// genome id -> sequence source (fasta), for all participating genomes
    pub fastas: BTreeMap<GenomeId, Artifact>,
    /// prediction model/species name
    pub species: String,
    /// genomes a feature set is produced for
    pub targets: BTreeSet<GenomeId>,
}

///
/// Predicts genes on one extracted alignment chunk, producing one feature
/// set per target genome plus the invocation log.
///
/// Contract: deterministic given identical inputs; all-or-nothing — on
/// failure no partial chunk set is returned.
///
pub trait GenePredictor: Send + Sync {
    fn predict(
        &self,
        store: &dyn BlobStore,
        maf_chunk: &Artifact,
        inputs: &PredictionInputs,
        window: &Window,
    ) -> Result<PredictionOutput>;
}

///
/// `augustus` backed predictor. Works in a private scratch directory and
/// directs the tool's per-genome output files there, so concurrent windows
/// never share filesystem state.
///
pub struct AugustusCgp;

/// write the genome fofn consumed via `--speciesfilenames`:
/// one `genome<TAB>/local/path.fa` line per participating genome
fn write_genome_fofn(
    store: &dyn BlobStore,
    fastas: &BTreeMap<GenomeId, Artifact>,
    scratch: &Path,
) -> Result<std::path::PathBuf> {
    let fofn_path = scratch.join("genomes.fofn");
    let mut fofn = std::fs::File::create(&fofn_path)?;
    for (genome, fasta) in fastas {
        let local = scratch.join(format!("{}.fa", genome));
        store.export(fasta, &local)?;
        writeln!(fofn, "{}\t{}", genome, local.display())?;
    }
    Ok(fofn_path)
}

impl GenePredictor for AugustusCgp {
    fn predict(
        &self,
        store: &dyn BlobStore,
        maf_chunk: &Artifact,
        inputs: &PredictionInputs,
        window: &Window,
    ) -> Result<PredictionOutput> {
        log::debug!("predicting window {}", window);
        let scratch = tempfile::tempdir()?;
        let dir = scratch.path();

        let tree = dir.join("tree.nwk");
        let maf = dir.join("chunk.maf");
        let hints = dir.join("hints.db");
        let param = dir.join("cgp.param");
        let cfg = dir.join("extrinsic.cfg");
        store.export(&inputs.tree, &tree)?;
        store.export(maf_chunk, &maf)?;
        store.export(&inputs.hints_db, &hints)?;
        store.export(&inputs.cgp_param, &param)?;
        store.export(&inputs.cgp_cfg, &cfg)?;
        let fofn = write_genome_fofn(store, &inputs.fastas, dir)?;

        let stdout_path = dir.join("augustus.out");
        let mut cmd = Command::new("augustus");
        cmd.arg("--dbhints=1")
            .arg("--UTR=1")
            .arg("--allow_hinted_splicesites=atac")
            .arg(format!("--extrinsicCfgFile={}", cfg.display()))
            .arg(format!("--species={}", inputs.species))
            .arg(format!("--treefile={}", tree.display()))
            .arg(format!("--alnfile={}", maf.display()))
            .arg(format!("--dbaccess={}", hints.display()))
            .arg(format!("--speciesfilenames={}", fofn.display()))
            .arg("--softmasking=1")
            .arg("--exoncands=0")
            .arg("--alternatives-from-evidence=0")
            .arg("--/CompPred/logreg=on")
            .arg("--printOEs=false")
            .arg(format!("--/CompPred/outdir={}", dir.display()))
            .arg(format!("--optCfgFile={}", param.display()));
        proc::run_with_stdout(cmd, &stdout_path)?;

        // one entry per target genome, empty artifact when the tool
        // produced no features for it
        let mut chunks: GffChunkSet = BTreeMap::new();
        for genome in &inputs.targets {
            let gff = dir.join(format!("{}.cgp.gff", genome));
            let artifact = if gff.exists() {
                store.put_file(&gff)?
            } else {
                store.put(b"")?
            };
            chunks.insert(genome.clone(), artifact);
        }
        let log = store.put_file(&stdout_path)?;
        Ok(PredictionOutput { chunks, log })
    }
}
