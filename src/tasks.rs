//!
//! external-collaborator contracts
//!
//! The extraction, prediction and merge steps are carried out by external
//! binaries (`hal2maf`, `augustus`, `joingenes` and the genePred converters).
//! Their command-line contracts are boundary interfaces: each is wrapped in
//! a trait so the scheduler and pipeline never touch a process directly and
//! tests can substitute mocks.
//!
use crate::artifact::Artifact;
use crate::common::GenomeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod extract;
pub mod join;
pub mod mocks;
pub mod predict;
pub mod proc;

pub use extract::{AlignmentExtractor, Hal2Maf};
pub use join::{GeneJoiner, JoinGenes};
pub use predict::{GenePredictor, PredictionInputs, AugustusCgp};

/// Per-window prediction result: one feature-set artifact per target
/// genome. Keys are exactly the configured target-genome set; a genome
/// without features maps to an empty artifact, never a missing key.
pub type GffChunkSet = BTreeMap<GenomeId, Artifact>;

///
/// Output of one prediction task for one window.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub chunks: GffChunkSet,
    pub log: Artifact,
}

///
/// Terminal per-genome result of the reduce/join stage.
///
/// `raw` is the byte-for-byte window-order concatenation with boundary
/// markers, `joined` the boundary-aware merged feature set, `normalized`
/// the format-normalized derivative of the merged set.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergedResult {
    pub raw: Artifact,
    pub joined: Artifact,
    pub normalized: Artifact,
}
