#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gold_harness::annotation::{AnnotationMatrix, IngestOptions};
use gold_harness::cleaning::{self, CleaningPipeline, Exclusion};
use gold_harness::config::GoldConfig;
use gold_harness::consensus::{
    estimate, ConsensusEstimator, EstimatorInput, MaceProcess, MajorityVoteEstimator,
};
use gold_harness::labeling::{attach_gold_labels, EstimatedGoldLabels, MockGoldLabelProvider};
use gold_harness::learning::{self, label_statistics};
use gold_harness::store::{load_corpus, save_corpus, write_atomic, write_json_atomic};
use gold_harness::workers::{rejection_sheet, worker_report};

#[derive(Parser)]
#[command(name = "gold", version, about = "Gold-label estimation and cleaning CLI")]
struct Cli {
    /// JSON config file (defaults apply to anything missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EstimatorKind {
    /// External MACE process (command from config or GOLD_ESTIMATOR_COMMAND)
    Mace,
    /// In-process plurality vote
    Majority,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Raw annotation exports (CSV)
    #[arg(long = "export", num_args = 1.., value_delimiter = ',')]
    exports: Vec<PathBuf>,
    /// Also read assignments still pending review
    #[arg(long)]
    accept_pending: bool,
}

#[derive(clap::Args)]
struct EstimatorArgs {
    #[arg(long, value_enum, default_value_t = EstimatorKind::Mace)]
    estimator: EstimatorKind,
    #[arg(long)]
    threshold: Option<f64>,
    /// Known-answer file passed through to the estimator
    #[arg(long)]
    controls: Option<PathBuf>,
    /// Keep only the first N assignments per item by submit time
    #[arg(long)]
    first_n: Option<usize>,
    /// With --first-n, keep the last N instead
    #[arg(long, requires = "first_n")]
    last: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate gold labels and attach them to a corpus
    Estimate {
        #[command(flatten)]
        exports: ExportArgs,
        #[command(flatten)]
        estimator: EstimatorArgs,
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Attach random labels instead (dry run of the later stages)
        #[arg(long, conflicts_with = "exports")]
        mock_seed: Option<u64>,
    },
    /// Run the three cleaning filters over a labelled corpus
    Clean {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Write every exclusion with its reason as JSON
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
    /// Build the learning set from a cleaned corpus
    Assemble {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Also write one TSV per debate into this directory
        #[arg(long)]
        tsv_dir: Option<PathBuf>,
        /// Print label combination statistics
        #[arg(long)]
        stats: bool,
    },
    /// Rank workers by estimated competence
    Workers {
        #[command(flatten)]
        exports: ExportArgs,
        #[command(flatten)]
        estimator: EstimatorArgs,
        #[arg(long, default_value_t = 10)]
        n: usize,
        #[arg(long)]
        worst: bool,
    },
    /// Print free-text feedback per worker
    Feedback {
        #[command(flatten)]
        exports: ExportArgs,
    },
    /// Write a rejection sheet for every assignment of the given workers
    Reject {
        #[command(flatten)]
        exports: ExportArgs,
        #[arg(long = "worker", required = true, num_args = 1.., value_delimiter = ',')]
        workers: Vec<String>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write the estimator input matrix for a manual run
    Prepare {
        #[command(flatten)]
        exports: ExportArgs,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = GoldConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Estimate {
            exports,
            estimator,
            corpus,
            out,
            mock_seed,
        } => {
            let mut data = load_corpus(&corpus)?;
            let report = match mock_seed {
                Some(seed) => attach_gold_labels(&mut data, &MockGoldLabelProvider::new(seed))?,
                None => {
                    let matrix = ingest(&exports)?;
                    let matrix = restrict(matrix, &estimator);
                    let result = run_estimator(&matrix, &estimator, &config)?;
                    let provider = EstimatedGoldLabels::new(matrix, result)?;
                    attach_gold_labels(&mut data, &provider)?
                }
            };
            save_corpus(&data, &out)?;
            print_json(&report)?;
        }
        Commands::Clean {
            corpus,
            out,
            ledger,
        } => {
            let data = load_corpus(&corpus)?;
            let outcome = CleaningPipeline::standard(&config.cleaning).run(&data)?;
            let cleaned = cleaning::apply(&data, &outcome.ledger)?;
            save_corpus(&cleaned, &out)?;
            if let Some(path) = ledger {
                let exclusions: Vec<&Exclusion> = outcome.ledger.iter().collect();
                write_json_atomic(&path, &exclusions)?;
            }
            print_json(&outcome.reports)?;
        }
        Commands::Assemble {
            corpus,
            out,
            tsv_dir,
            stats,
        } => {
            let data = load_corpus(&corpus)?;
            let set = learning::assemble(&data, &config.cleaning.reserved_positive_label)?;
            write_json_atomic(&out, &set)?;
            if let Some(dir) = tsv_dir {
                learning::export_tsv(&set, &dir)?;
            }
            if stats {
                print_json(&label_statistics(&set))?;
            }
        }
        Commands::Workers {
            exports,
            estimator,
            n,
            worst,
        } => {
            let matrix = restrict(ingest(&exports)?, &estimator);
            let result = run_estimator(&matrix, &estimator, &config)?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for summary in worker_report(&matrix, &result, n, worst) {
                serde_json::to_writer(&mut handle, &summary)?;
                writeln!(handle)?;
            }
        }
        Commands::Feedback { exports } => {
            let matrix = ingest(&exports)?;
            let feedback: &BTreeMap<String, Vec<String>> = matrix.feedback();
            print_json(feedback)?;
        }
        Commands::Reject {
            exports,
            workers,
            out,
        } => {
            let matrix = ingest(&exports)?;
            let sheet = rejection_sheet(&matrix, &workers)?;
            write_atomic(&out, sheet.as_bytes())?;
            for worker in &workers {
                eprintln!("[reject] blocked worker {worker}");
            }
        }
        Commands::Prepare { exports, out } => {
            let matrix = ingest(&exports)?;
            let input = EstimatorInput::from_matrix(&matrix);
            write_atomic(&out, input.to_csv().as_bytes())?;
            eprintln!(
                "[prepare] {} items x {} workers written to {}",
                input.n_items(),
                input.n_workers(),
                out.display()
            );
        }
    }

    Ok(())
}

fn ingest(args: &ExportArgs) -> Result<AnnotationMatrix, Box<dyn std::error::Error>> {
    if args.exports.is_empty() {
        return Err("at least one --export file is required".into());
    }
    let options = IngestOptions {
        accept_non_final_rows: args.accept_pending,
        ..IngestOptions::default()
    };
    Ok(AnnotationMatrix::ingest(&args.exports, &options)?)
}

fn restrict(matrix: AnnotationMatrix, args: &EstimatorArgs) -> AnnotationMatrix {
    match args.first_n {
        Some(n) => matrix.keep_first_n_per_item(n, args.last),
        None => matrix,
    }
}

fn run_estimator(
    matrix: &AnnotationMatrix,
    args: &EstimatorArgs,
    config: &GoldConfig,
) -> Result<gold_harness::ConsensusResult, Box<dyn std::error::Error>> {
    let mut params = config.estimator.params.clone();
    if let Some(threshold) = args.threshold {
        params.threshold = threshold;
    }
    if args.controls.is_some() {
        params.controls = args.controls.clone();
    }
    let estimator: Box<dyn ConsensusEstimator> = match args.estimator {
        EstimatorKind::Mace => Box::new(MaceProcess::new(&config.estimator.command)?),
        EstimatorKind::Majority => Box::new(MajorityVoteEstimator::new()),
    };
    Ok(estimate(matrix, estimator.as_ref(), &params)?)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
