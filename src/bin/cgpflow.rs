use cgpflow::config::RunConfig;
use cgpflow::pipeline::{self, Collaborators, PipelineOptions};
use cgpflow::tasks::{AugustusCgp, Hal2Maf, JoinGenes};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, about, version)]
struct Opts {
    /// run configuration (JSON)
    #[clap(long)]
    config: PathBuf,
    /// resume an interrupted run from its persisted job state
    #[clap(long)]
    restart: bool,
    /// override the configured window size
    #[clap(long)]
    chunksize: Option<u64>,
    /// override the configured window overlap
    #[clap(long)]
    overlap: Option<u64>,
    #[clap(long)]
    output_dir: Option<PathBuf>,
    /// worker threads (defaults to the configured value)
    #[clap(long)]
    threads: Option<usize>,
}

fn main() {
    env_logger::init();
    let opts: Opts = Opts::parse();
    println!("# started_at={}", chrono::Local::now());
    println!("# opts={:?}", opts);

    let mut config = match RunConfig::from_json_file(&opts.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ERROR: cannot load config: {}", err);
            std::process::exit(1);
        }
    };
    if let Some(chunksize) = opts.chunksize {
        config.chunksize = chunksize;
    }
    if let Some(overlap) = opts.overlap {
        config.overlap = overlap;
    }
    if let Some(output_dir) = opts.output_dir {
        config.output_dir = output_dir;
    }

    let threads = opts.threads.unwrap_or(config.threads);
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .expect("rayon pool already initialized");
    }

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40} {pos}/{len} jobs {msg}")
            .unwrap(),
    );

    let collaborators = Collaborators {
        extractor: &Hal2Maf,
        predictor: &AugustusCgp,
        joiner: &JoinGenes,
    };
    let pipeline_opts = PipelineOptions {
        restart: opts.restart,
        progress: Some(&progress),
    };
    match pipeline::run(&config, &collaborators, &pipeline_opts) {
        Ok(summary) => {
            progress.finish();
            println!(
                "# {} windows, {} genomes, log: {}",
                summary.n_windows,
                summary.genomes.len(),
                summary.run_log.display()
            );
            if summary.is_failed() {
                for (genome, message) in &summary.failed_genomes {
                    eprintln!("ERROR: merge failed for {}: {}", genome, message);
                }
                std::process::exit(1);
            }
        }
        Err(err) => {
            progress.abandon();
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
    }
    println!("# finished_at={}", chrono::Local::now());
}
