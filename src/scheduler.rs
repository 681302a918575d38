//!
//! DAG engine
//!
//! Builds a dependency graph of jobs and drives it to completion on a rayon
//! worker pool. Each job resolves a single-resolution future; a job is
//! dispatched only once every declared future has resolved, and mutually
//! independent chains run concurrently in any order. Job identities are
//! deterministic, so an interrupted run resumes from persisted state
//! without re-executing resolved jobs.
//!
use crate::common::GenomeId;
use crate::error::{CgpError, Result};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;

pub mod job;
pub mod state;

pub use job::{JobId, JobKind, JobOutput, JobSpec, ResourceRequest, GIB};
pub use state::RunState;

/// what a future resolves to: a value, or the failure message of the job
pub type JobResult = std::result::Result<JobOutput, String>;

///
/// Single-resolution placeholder for a value not yet computed. Resolves
/// exactly once; dependents read it only after the scheduler declared it
/// resolved, so a partially-resolved state is never observable.
///
#[derive(Clone, Default)]
pub struct JobFuture {
    cell: Arc<OnceCell<JobResult>>,
}

impl JobFuture {
    pub fn new() -> Self {
        Self::default()
    }

    /// rejects a second resolution, returning the refused value
    pub fn resolve(&self, result: JobResult) -> std::result::Result<(), JobResult> {
        self.cell.set(result)
    }

    pub fn get(&self) -> Option<&JobResult> {
        self.cell.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

///
/// A resolved dependency handed to a job when it is dispatched: the
/// upstream job's kind (so the runner knows which window or genome the
/// output belongs to) and its output.
///
#[derive(Clone, Debug)]
pub struct ResolvedInput {
    pub kind: JobKind,
    pub output: JobOutput,
}

///
/// Executes one job. Implementations dispatch on the job kind and call the
/// external collaborators; they run on worker threads and must not share
/// mutable state.
///
pub trait JobRunner: Sync {
    fn run(&self, kind: &JobKind, deps: &[ResolvedInput]) -> Result<JobOutput>;
}

#[derive(Default)]
pub struct RunOptions<'a> {
    /// persist resolved state here after every completion
    pub state_path: Option<&'a Path>,
    /// admission gate: total memory of concurrently running jobs
    pub memory_limit: Option<u64>,
    pub progress: Option<&'a ProgressBar>,
}

///
/// Result of driving the graph: resolved outputs by job id, plus the
/// genomes whose (mutually independent) merge jobs failed. Any other
/// failure aborts the run and is returned as `Err` instead.
///
#[derive(Debug)]
pub struct SchedulerOutcome {
    pub outputs: HashMap<JobId, JobOutput>,
    pub merge_failures: Vec<(GenomeId, String)>,
}

///
/// The job graph. Nodes are job specs, edges point from a dependency to
/// its dependent.
///
pub struct Scheduler {
    graph: DiGraph<JobSpec, ()>,
    by_id: HashMap<JobId, NodeIndex>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            graph: DiGraph::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn n_jobs(&self) -> usize {
        self.graph.node_count()
    }

    ///
    /// Register a job. Its declared dependencies must already be
    /// registered; a dangling or duplicate id is a config error.
    ///
    pub fn add_job(&mut self, spec: JobSpec) -> Result<JobId> {
        if self.by_id.contains_key(&spec.id) {
            return Err(CgpError::config(format!(
                "duplicate job id for {}",
                spec.kind
            )));
        }
        let deps: Vec<NodeIndex> = spec
            .deps
            .iter()
            .map(|dep| {
                self.by_id.get(dep).copied().ok_or_else(|| {
                    CgpError::config(format!("{} depends on an unregistered job", spec.kind))
                })
            })
            .collect::<Result<_>>()?;
        let id = spec.id.clone();
        let node = self.graph.add_node(spec);
        for dep in deps {
            self.graph.add_edge(dep, node, ());
        }
        self.by_id.insert(id.clone(), node);
        Ok(id)
    }

    ///
    /// Drive the graph to completion. Jobs found in `state` are marked
    /// resolved without re-execution; every newly resolved job is recorded
    /// there (and persisted when a state path is given).
    ///
    pub fn run<'a, R: JobRunner>(
        &'a self,
        runner: &'a R,
        state: &mut RunState,
        opts: RunOptions,
    ) -> Result<SchedulerOutcome> {
        toposort(&self.graph, None)
            .map_err(|_| CgpError::config("job graph contains a cycle"))?;

        let n = self.graph.node_count();
        let futures: Vec<JobFuture> = (0..n).map(|_| JobFuture::new()).collect();

        // restart: jobs resolved before an interruption are not re-executed
        let mut remaining = 0;
        for node in self.graph.node_indices() {
            let spec = &self.graph[node];
            if let Some(output) = state.get(&spec.id) {
                futures[node.index()].resolve(Ok(output.clone())).ok();
                debug!("already resolved, skipping: {}", spec.kind);
            } else {
                remaining += 1;
            }
        }

        let mut pending = vec![0; n];
        let mut waiting = VecDeque::new();
        for node in self.graph.node_indices() {
            if futures[node.index()].is_resolved() {
                continue;
            }
            let unresolved_deps = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .filter(|dep| !futures[dep.index()].is_resolved())
                .count();
            pending[node.index()] = unresolved_deps;
            if unresolved_deps == 0 {
                waiting.push_back(node);
            }
        }

        let (tx, rx) = mpsc::channel();
        let mut exec = Exec {
            graph: &self.graph,
            futures: &futures,
            tx,
            pending,
            waiting,
            remaining,
            in_flight: 0,
            mem_in_flight: 0,
            memory_limit: opts.memory_limit,
            fatal: None,
            merge_failures: Vec::new(),
            state,
            state_path: opts.state_path,
            progress: opts.progress,
        };

        // the receiver is not Sync, so the coordinator takes ownership of
        // it and of the execution state, handing the verdict back out
        let (fatal, merge_failures) = rayon::scope(move |scope| {
            exec.admit(scope, runner);
            while exec.remaining > 0 {
                if exec.fatal.is_some() && exec.in_flight == 0 {
                    break;
                }
                if exec.in_flight == 0 {
                    // nothing running, nothing admissible: the remaining
                    // jobs' declared futures can never resolve
                    let job = exec
                        .graph
                        .node_indices()
                        .find(|x| !exec.futures[x.index()].is_resolved())
                        .map(|x| exec.graph[x].kind.to_string())
                        .unwrap_or_default();
                    exec.fatal = Some(CgpError::UnresolvedDependency { job });
                    break;
                }
                let (node, result) = match rx.recv() {
                    Ok(completion) => completion,
                    Err(_) => break,
                };
                exec.on_completion(node, result);
                exec.admit(scope, runner);
            }
            (exec.fatal, exec.merge_failures)
        });

        if let Some(fatal) = fatal {
            return Err(fatal);
        }
        let mut outputs = HashMap::new();
        for node in self.graph.node_indices() {
            if let Some(Ok(output)) = futures[node.index()].get() {
                outputs.insert(self.graph[node].id.clone(), output.clone());
            }
        }
        Ok(SchedulerOutcome {
            outputs,
            merge_failures,
        })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// failure of a window-level job wrapped with its identifying coordinates
fn wrap_failure(kind: &JobKind, message: String) -> CgpError {
    match kind {
        JobKind::Extract { window } => CgpError::Extraction {
            window: window.clone(),
            message,
        },
        JobKind::Predict { window } => CgpError::Prediction {
            window: window.clone(),
            message,
        },
        JobKind::Join { genome } => CgpError::Merge {
            genome: genome.clone(),
            message,
        },
    }
}

///
/// Mutable execution state of one `Scheduler::run`, driven from the
/// coordinator thread; workers only run jobs and report back over the
/// channel.
///
struct Exec<'g, 'r> {
    graph: &'g DiGraph<JobSpec, ()>,
    futures: &'g [JobFuture],
    tx: mpsc::Sender<(NodeIndex, Result<JobOutput>)>,
    pending: Vec<usize>,
    waiting: VecDeque<NodeIndex>,
    remaining: usize,
    in_flight: usize,
    mem_in_flight: u64,
    memory_limit: Option<u64>,
    fatal: Option<CgpError>,
    merge_failures: Vec<(GenomeId, String)>,
    state: &'r mut RunState,
    state_path: Option<&'r Path>,
    progress: Option<&'r ProgressBar>,
}

impl<'g, 'r> Exec<'g, 'r> {
    ///
    /// Dispatch waiting jobs whose memory request fits under the admission
    /// gate. A job is always admitted when nothing is running, so a single
    /// oversized request cannot stall the run.
    ///
    fn admit<'s, R: JobRunner>(&mut self, scope: &rayon::Scope<'s>, runner: &'g R)
    where
        'g: 's,
    {
        loop {
            if self.fatal.is_some() {
                return;
            }
            let slot = self.waiting.iter().position(|&node| {
                let mem = self.graph[node].resources.memory_bytes;
                match self.memory_limit {
                    None => true,
                    Some(limit) => self.in_flight == 0 || self.mem_in_flight + mem <= limit,
                }
            });
            let node = match slot {
                Some(i) => self.waiting.remove(i).unwrap(),
                None => return,
            };
            let spec = &self.graph[node];

            // gather the declared futures' values
            let mut inputs = Vec::new();
            let mut upstream_failure = None;
            for dep in self.graph.neighbors_directed(node, Direction::Incoming) {
                match self.futures[dep.index()].get() {
                    None => {
                        self.fatal = Some(CgpError::UnresolvedDependency {
                            job: spec.kind.to_string(),
                        });
                        return;
                    }
                    Some(Err(message)) => upstream_failure = Some(message.clone()),
                    Some(Ok(output)) => inputs.push(ResolvedInput {
                        kind: self.graph[dep].kind.clone(),
                        output: output.clone(),
                    }),
                }
            }
            if let Some(message) = upstream_failure {
                self.resolve_failure(node, format!("upstream dependency failed: {}", message));
                continue;
            }

            info!("dispatching {}", spec.kind);
            self.in_flight += 1;
            self.mem_in_flight += spec.resources.memory_bytes;
            let tx = self.tx.clone();
            let kind = spec.kind.clone();
            scope.spawn(move |_| {
                let result = runner.run(&kind, &inputs);
                let _ = tx.send((node, result));
            });
        }
    }

    fn on_completion(&mut self, node: NodeIndex, result: Result<JobOutput>) {
        self.in_flight -= 1;
        self.mem_in_flight -= self.graph[node].resources.memory_bytes;
        match result {
            Ok(output) => self.resolve_success(node, output),
            Err(err) => self.resolve_failure(node, err.to_string()),
        }
    }

    fn resolve_success(&mut self, node: NodeIndex, output: JobOutput) {
        let spec = &self.graph[node];
        if self.futures[node.index()].resolve(Ok(output.clone())).is_err() {
            self.fatal = Some(CgpError::config(format!(
                "future of {} resolved twice",
                spec.kind
            )));
            return;
        }
        info!("resolved {}", spec.kind);
        self.state.record(spec.id.clone(), output);
        if let Some(path) = self.state_path {
            if let Err(err) = self.state.save(path) {
                self.fatal = Some(err);
                return;
            }
        }
        if let Some(progress) = self.progress {
            progress.inc(1);
        }
        self.finish(node);
    }

    fn resolve_failure(&mut self, node: NodeIndex, message: String) {
        let spec = &self.graph[node];
        self.futures[node.index()].resolve(Err(message.clone())).ok();
        match &spec.kind {
            // merge jobs are mutually independent: the other genomes keep
            // running, the run is reported failed at the end
            JobKind::Join { genome } => {
                warn!("merge failed for genome {}: {}", genome, message);
                self.merge_failures.push((genome.clone(), message));
            }
            kind => {
                self.fatal = Some(wrap_failure(kind, message));
            }
        }
        self.finish(node);
    }

    fn finish(&mut self, node: NodeIndex) {
        self.remaining -= 1;
        let dependents: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        for dependent in dependents {
            self.pending[dependent.index()] -= 1;
            if self.pending[dependent.index()] == 0 {
                self.waiting.push_back(dependent);
            }
        }
    }
}

//
// tests
//
