//!
//! run configuration
//!
use crate::common::GenomeId;
use crate::error::{CgpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

///
/// Everything one prediction run needs, deserialized from a JSON config
/// file and validated before any job is scheduled.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// whole-genome alignment (HAL)
    pub hal: PathBuf,
    /// chromosome-size table of the reference genome
    pub chrom_sizes: PathBuf,
    /// extrinsic-evidence database
    pub hints_db: PathBuf,
    /// trained comparative model parameters
    pub cgp_param: PathBuf,
    /// extrinsic configuration
    pub cgp_cfg: PathBuf,
    /// prediction model/species name
    pub species: String,
    /// reference genome the windows are laid out on
    pub ref_genome: GenomeId,
    /// genome id -> fasta, for all genomes participating in prediction
    pub fastas: BTreeMap<GenomeId, PathBuf>,
    /// genomes a final gene set is produced for
    pub target_genomes: BTreeSet<GenomeId>,
    /// window size in bases
    pub chunksize: u64,
    /// shared bases between consecutive windows
    pub overlap: u64,
    /// blob-store directory
    pub store_dir: PathBuf,
    /// final per-genome outputs and the run log go here
    pub output_dir: PathBuf,
    /// persisted job state for restart
    pub state_file: PathBuf,
    /// worker threads (0 = rayon default)
    #[serde(default)]
    pub threads: usize,
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunksize == 0 || self.chunksize <= self.overlap {
            return Err(CgpError::config(format!(
                "chunksize ({}) must be greater than overlap ({})",
                self.chunksize, self.overlap
            )));
        }
        if self.target_genomes.is_empty() {
            return Err(CgpError::config("no target genomes configured"));
        }
        for genome in &self.target_genomes {
            if !self.fastas.contains_key(genome) {
                return Err(CgpError::config(format!(
                    "target genome {} has no sequence source",
                    genome
                )));
            }
        }
        Ok(())
    }

    /// per-genome output paths, keyed into `output_dir`
    pub fn raw_gtf(&self, genome: &str) -> PathBuf {
        self.output_dir.join(format!("{}.raw.gtf", genome))
    }
    pub fn joined_gtf(&self, genome: &str) -> PathBuf {
        self.output_dir.join(format!("{}.joined.gtf", genome))
    }
    pub fn joined_gp(&self, genome: &str) -> PathBuf {
        self.output_dir.join(format!("{}.joined.gp", genome))
    }
    pub fn run_log(&self) -> PathBuf {
        self.output_dir.join("prediction.log")
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        let mut fastas = BTreeMap::new();
        fastas.insert("hg38".to_string(), PathBuf::from("/data/hg38.fa"));
        fastas.insert("mm10".to_string(), PathBuf::from("/data/mm10.fa"));
        let mut targets = BTreeSet::new();
        targets.insert("hg38".to_string());
        RunConfig {
            hal: PathBuf::from("/data/aln.hal"),
            chrom_sizes: PathBuf::from("/data/sizes.txt"),
            hints_db: PathBuf::from("/data/hints.db"),
            cgp_param: PathBuf::from("/data/cgp.param"),
            cgp_cfg: PathBuf::from("/data/extrinsic.cfg"),
            species: "human".to_string(),
            ref_genome: "hg38".to_string(),
            fastas,
            target_genomes: targets,
            chunksize: 2_500_000,
            overlap: 500_000,
            store_dir: PathBuf::from("/work/store"),
            output_dir: PathBuf::from("/work/out"),
            state_file: PathBuf::from("/work/state.json"),
            threads: 0,
        }
    }

    #[test]
    fn valid_config_passes() {
        config().validate().unwrap();
    }

    #[test]
    fn rejects_chunk_not_greater_than_overlap() {
        let mut c = config();
        c.overlap = c.chunksize;
        assert!(matches!(c.validate(), Err(CgpError::Config { .. })));
    }

    #[test]
    fn rejects_target_without_fasta() {
        let mut c = config();
        c.target_genomes.insert("rn6".to_string());
        assert!(matches!(c.validate(), Err(CgpError::Config { .. })));
    }

    #[test]
    fn rejects_empty_targets() {
        let mut c = config();
        c.target_genomes.clear();
        assert!(matches!(c.validate(), Err(CgpError::Config { .. })));
    }

    #[test]
    fn output_paths_are_genome_keyed() {
        let c = config();
        assert_eq!(c.raw_gtf("hg38"), PathBuf::from("/work/out/hg38.raw.gtf"));
        assert_eq!(c.joined_gp("mm10"), PathBuf::from("/work/out/mm10.joined.gp"));
    }
}
