//!
//! run driver
//!
//! Wires the stages together: import inputs into the blob store, extract
//! the phylogeny, plan the windows, build the job graph (one
//! extraction→prediction chain per window, one join per target genome
//! fanning in on every prediction future), execute it, then export the
//! per-genome artifacts and the run-level log.
//!
use crate::artifact::{Artifact, BlobStore, FsBlobStore};
use crate::chunk;
use crate::common::{GenomeId, Window};
use crate::config::RunConfig;
use crate::error::{CgpError, Result};
use crate::merge;
use crate::scheduler::{
    JobId, JobKind, JobOutput, JobRunner, JobSpec, ResolvedInput, ResourceRequest, RunOptions,
    RunState, Scheduler, GIB,
};
use crate::tasks::{
    AlignmentExtractor, GeneJoiner, GenePredictor, PredictionInputs, PredictionOutput,
};
use indicatif::ProgressBar;
use itertools::Itertools;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// disk safety buffer for prediction jobs, on top of the input sizes
const PREDICT_DISK_BUFFER: u64 = 4 * GIB;
const JOB_MEMORY: u64 = 8 * GIB;

///
/// The external tools behind the task boundary.
///
pub struct Collaborators<'a> {
    pub extractor: &'a dyn AlignmentExtractor,
    pub predictor: &'a dyn GenePredictor,
    pub joiner: &'a dyn GeneJoiner,
}

#[derive(Default)]
pub struct PipelineOptions<'a> {
    /// resume from the persisted state file instead of starting fresh
    pub restart: bool,
    pub progress: Option<&'a ProgressBar>,
}

///
/// What a finished run produced. `failed_genomes` is non-empty when some
/// genome's merge failed: the other genomes' outputs were still exported,
/// but the run must be reported as failed.
///
#[derive(Debug)]
pub struct RunSummary {
    pub n_windows: usize,
    pub genomes: Vec<GenomeId>,
    pub failed_genomes: Vec<(GenomeId, String)>,
    pub run_log: PathBuf,
}

impl RunSummary {
    pub fn is_failed(&self) -> bool {
        !self.failed_genomes.is_empty()
    }
}

/// run inputs imported into the blob store
struct Imported {
    hal: Artifact,
    inputs: PredictionInputs,
}

fn import_inputs(
    config: &RunConfig,
    store: &dyn BlobStore,
    extractor: &dyn AlignmentExtractor,
) -> Result<Imported> {
    let hal = store.put_file(&config.hal)?;
    let hints_db = store.put_file(&config.hints_db)?;
    let cgp_param = store.put_file(&config.cgp_param)?;
    let cgp_cfg = store.put_file(&config.cgp_cfg)?;
    let mut fastas = BTreeMap::new();
    for (genome, path) in &config.fastas {
        fastas.insert(genome.clone(), store.put_file(path)?);
    }
    let tree = extractor.tree(store, &hal)?;
    Ok(Imported {
        hal,
        inputs: PredictionInputs {
            tree,
            hints_db,
            cgp_param,
            cgp_cfg,
            fastas,
            species: config.species.clone(),
            targets: config.target_genomes.clone(),
        },
    })
}

fn window_params(window: &Window) -> [String; 3] {
    [
        window.chrom().to_string(),
        window.start().to_string(),
        window.length().to_string(),
    ]
}

///
/// Build the job graph. Returns the scheduler plus the ids needed to pull
/// results back out: the prediction job per window and the join job per
/// target genome.
///
fn build_graph(
    config: &RunConfig,
    store: &dyn BlobStore,
    imported: &Imported,
    windows: &[Window],
) -> Result<(Scheduler, Vec<(Window, JobId)>, BTreeMap<GenomeId, JobId>)> {
    let mut scheduler = Scheduler::new();
    let inputs = &imported.inputs;

    let extract_resources = ResourceRequest::from_input_sizes(
        vec![store.size(&imported.hal)?],
        GIB,
        JOB_MEMORY,
    );
    let mut predict_input_sizes = vec![store.size(&inputs.hints_db)?];
    for fasta in inputs.fastas.values() {
        predict_input_sizes.push(store.size(fasta)?);
    }
    let predict_resources = ResourceRequest::from_input_sizes(
        predict_input_sizes,
        PREDICT_DISK_BUFFER,
        JOB_MEMORY,
    );

    let mut predictions = Vec::new();
    for window in windows {
        let coords = window_params(window);
        let mut extract_params = vec![config.ref_genome.as_str()];
        extract_params.extend(coords.iter().map(|s| s.as_str()));
        let extract_id = scheduler.add_job(
            JobSpec::new(
                JobId::derive("extract", &[&imported.hal], &extract_params),
                JobKind::Extract {
                    window: window.clone(),
                },
            )
            .with_resources(extract_resources),
        )?;

        let mut predict_inputs: Vec<&Artifact> =
            vec![&inputs.tree, &inputs.hints_db, &inputs.cgp_param, &inputs.cgp_cfg];
        predict_inputs.extend(inputs.fastas.values());
        let mut predict_params = vec![inputs.species.as_str()];
        predict_params.extend(coords.iter().map(|s| s.as_str()));
        let extract_key = extract_id.as_str().to_string();
        predict_params.push(extract_key.as_str());
        let predict_id = scheduler.add_job(
            JobSpec::new(
                JobId::derive("predict", &predict_inputs, &predict_params),
                JobKind::Predict {
                    window: window.clone(),
                },
            )
            .with_deps(vec![extract_id])
            .with_resources(predict_resources),
        )?;
        predictions.push((window.clone(), predict_id));
    }

    // one join per genome, fanning in on every prediction future: the
    // merge stage cannot start before the last window chain resolves
    let prediction_ids: Vec<JobId> = predictions.iter().map(|(_, id)| id.clone()).collect();
    let mut joins = BTreeMap::new();
    for genome in &config.target_genomes {
        let mut join_params = vec![genome.as_str()];
        join_params.extend(prediction_ids.iter().map(|id| id.as_str()));
        let join_id = scheduler.add_job(
            JobSpec::new(
                JobId::derive("join", &[], &join_params),
                JobKind::Join {
                    genome: genome.clone(),
                },
            )
            .with_deps(prediction_ids.clone())
            .with_resources(ResourceRequest::new(8 * GIB, JOB_MEMORY)),
        )?;
        joins.insert(genome.clone(), join_id);
    }
    Ok((scheduler, predictions, joins))
}

///
/// Dispatches scheduled jobs to the external collaborators. Runs on worker
/// threads; holds only read-only shared inputs.
///
struct TaskRunner<'a> {
    store: &'a dyn BlobStore,
    collaborators: &'a Collaborators<'a>,
    hal: Artifact,
    ref_genome: GenomeId,
    inputs: PredictionInputs,
}

impl<'a> JobRunner for TaskRunner<'a> {
    fn run(&self, kind: &JobKind, deps: &[ResolvedInput]) -> Result<JobOutput> {
        match kind {
            JobKind::Extract { window } => self
                .collaborators
                .extractor
                .extract(self.store, &self.hal, &self.ref_genome, window)
                .map(JobOutput::MafChunk),
            JobKind::Predict { window } => {
                let maf = deps
                    .iter()
                    .find_map(|dep| dep.output.as_maf_chunk())
                    .ok_or_else(|| CgpError::UnresolvedDependency {
                        job: kind.to_string(),
                    })?;
                self.collaborators
                    .predictor
                    .predict(self.store, maf, &self.inputs, window)
                    .map(JobOutput::Prediction)
            }
            JobKind::Join { genome } => {
                let results: Vec<(Window, PredictionOutput)> = deps
                    .iter()
                    .filter_map(|dep| match (&dep.kind, &dep.output) {
                        (JobKind::Predict { window }, JobOutput::Prediction(prediction)) => {
                            Some((window.clone(), prediction.clone()))
                        }
                        _ => None,
                    })
                    .collect();
                let grouped = merge::group_by_genome(&results);
                let chunks = grouped.get(genome).cloned().unwrap_or_default();
                self.collaborators
                    .joiner
                    .join(self.store, genome, &chunks)
                    .map(JobOutput::Merged)
            }
        }
    }
}

pub fn run(
    config: &RunConfig,
    collaborators: &Collaborators,
    opts: &PipelineOptions,
) -> Result<RunSummary> {
    let store = FsBlobStore::open(&config.store_dir)?;
    run_with_store(config, collaborators, &store, opts)
}

pub fn run_with_store(
    config: &RunConfig,
    collaborators: &Collaborators,
    store: &dyn BlobStore,
    opts: &PipelineOptions,
) -> Result<RunSummary> {
    config.validate()?;

    let imported = import_inputs(config, store, collaborators.extractor)?;
    let sizes = chunk::read_size_table(&config.chrom_sizes)?;
    let windows = chunk::plan_all(&sizes, config.chunksize, config.overlap)?;
    info!(
        "planned {} windows over {} chromosomes (chunksize={} overlap={})",
        windows.len(),
        sizes.len(),
        config.chunksize,
        config.overlap
    );

    let (scheduler, predictions, joins) = build_graph(config, store, &imported, &windows)?;
    if let Some(progress) = opts.progress {
        progress.set_length(scheduler.n_jobs() as u64);
    }
    info!(
        "job graph: {} jobs for target genomes {}",
        scheduler.n_jobs(),
        config.target_genomes.iter().join(", ")
    );

    let mut state = if opts.restart {
        let state = RunState::load(&config.state_file)?;
        info!("restarting with {} resolved jobs", state.len());
        state
    } else {
        RunState::new()
    };

    let runner = TaskRunner {
        store,
        collaborators,
        hal: imported.hal.clone(),
        ref_genome: config.ref_genome.clone(),
        inputs: imported.inputs.clone(),
    };
    let outcome = scheduler.run(
        &runner,
        &mut state,
        RunOptions {
            state_path: Some(&config.state_file),
            memory_limit: None,
            progress: opts.progress,
        },
    )?;

    // run-level log: every window's prediction log, in window order
    let results: Vec<(Window, PredictionOutput)> = predictions
        .iter()
        .filter_map(|(window, id)| {
            outcome
                .outputs
                .get(id)
                .and_then(|out| out.as_prediction())
                .map(|prediction| (window.clone(), prediction.clone()))
        })
        .collect();
    let run_log = merge::concat_logs(store, &results)?;
    store.export(&run_log, &config.run_log())?;

    // export what finished; failed genomes are only reported
    let mut failed_genomes = outcome.merge_failures;
    failed_genomes.sort();
    for (genome, join_id) in &joins {
        match outcome.outputs.get(join_id).and_then(|out| out.as_merged()) {
            Some(merged) => {
                store.export(&merged.raw, &config.raw_gtf(genome))?;
                store.export(&merged.joined, &config.joined_gtf(genome))?;
                store.export(&merged.normalized, &config.joined_gp(genome))?;
                info!("exported merged gene set for {}", genome);
            }
            None => {
                warn!("no merged output for {}", genome);
            }
        }
    }

    Ok(RunSummary {
        n_windows: windows.len(),
        genomes: config.target_genomes.iter().cloned().collect(),
        failed_genomes,
        run_log: config.run_log(),
    })
}

//
// tests
//
