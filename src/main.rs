use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use yelp_elite_processor::input::find_input_files;
use yelp_elite_processor::output::{write_results, OutputFormat};
use yelp_elite_processor::{run_pipeline, JoinPolicy, PipelineInputs, PipelineOptions, ScoringConfig};

#[derive(Parser)]
#[command(name = "yelp_elite_processor")]
#[command(about = "Scores Yelp users as elite / not elite from joined review features")]
struct Cli {
    /// User records (path or glob, .gz allowed)
    #[arg(long, default_value = "yelp_academic_dataset_user.json")]
    user_file: String,

    /// Business records (path or glob, .gz allowed)
    #[arg(long, default_value = "yelp_academic_dataset_business.json")]
    business_file: String,

    /// Review records (path or glob, .gz allowed)
    #[arg(long, default_value = "yelp_academic_dataset_review.json")]
    review_file: String,

    /// Output file for scored users
    #[arg(short, long, default_value = "elite.csv")]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Number of parallel workers for parsing, joins and aggregation (default: all cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Run every stage on a single worker
    #[arg(long)]
    sequential: bool,

    /// Fail on duplicate keys and on reviews of unknown businesses
    #[arg(long)]
    strict_joins: bool,

    /// TOML file with thresholds, learning_rate, initial_weight, target_year
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Date used as "now" for account age (YYYY-MM-DD, default: today)
    #[arg(long)]
    reference_date: Option<NaiveDate>,

    /// Elite year to use as ground truth (overrides the config file)
    #[arg(long)]
    target_year: Option<i32>,
}

fn load_scoring_config(args: &Cli) -> Result<ScoringConfig> {
    let mut scoring = match &args.config {
        Some(path) => {
            info!("Loading scoring config from {}", path.display());
            ScoringConfig::load(path)?
        }
        None => ScoringConfig::default(),
    };
    if let Some(year) = args.target_year {
        scoring.target_year = year;
    }
    scoring.validate()?;
    Ok(scoring)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    let max_workers = num_cpus::get();
    let num_workers = if args.sequential {
        1
    } else {
        args.workers.unwrap_or(max_workers)
    };
    if num_workers == 1 {
        warn!("Running every stage on a single worker");
    }
    info!("Using {} workers (max available: {})", num_workers, max_workers);

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .thread_name(|i| format!("elite-worker-{}", i))
        .build_global()?;

    let scoring = load_scoring_config(&args)?;
    let options = PipelineOptions {
        scoring,
        join_policy: JoinPolicy {
            strict: args.strict_joins,
        },
        reference_date: args
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive()),
    };
    info!(
        "Target year {}, learning rate {}, reference date {}",
        options.scoring.target_year, options.scoring.learning_rate, options.reference_date
    );

    let inputs = PipelineInputs {
        user_files: find_input_files(&args.user_file)?,
        business_files: find_input_files(&args.business_file)?,
        review_files: find_input_files(&args.review_file)?,
    };

    let output = run_pipeline(&inputs, &options)?;
    output.summary.log();

    write_results(&args.output, &output.scoring.rows, args.format)?;

    info!("Results written to {}", args.output.display());
    Ok(())
}
