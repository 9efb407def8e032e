use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use exog_search::config::{ExogAlignment, SearchConfig};
use exog_search::data::{CandidateSet, DataLoader};
use exog_search::logging::init_tracing;
use exog_search::models::SarimaxModel;
use exog_search::orchestrator::SearchPipeline;
use exog_search::results::{OutputFormat, ResultStore, SearchReport};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "exog_search",
    version,
    about = "Search nearby rainfall series that improve a location's seasonal forecast"
)]
struct Cli {
    /// Wide rainfall CSV: a date column plus one column per location
    #[arg(long)]
    data: PathBuf,
    /// JSON map from target location to its candidate exogenous locations
    #[arg(long)]
    candidates: PathBuf,
    /// JSON search configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where to write the improving configurations
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    #[arg(long)]
    workers: Option<usize>,
    /// Run the hyperparameter grid search before the subset search
    #[arg(long)]
    grid: bool,
    #[arg(long)]
    grid_range: Option<usize>,
    #[arg(long)]
    holdout_fraction: Option<f64>,
    /// Regress on exogenous values this many months earlier
    #[arg(long)]
    lag: Option<usize>,
    /// Only search these target locations
    #[arg(long, value_delimiter = ',')]
    locations: Option<Vec<String>>,
    /// Give up on queued tasks of a batch after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn search_config(&self) -> Result<SearchConfig> {
        let mut config = match &self.config {
            Some(path) => SearchConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => SearchConfig::default(),
        };

        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if self.grid {
            config.run_grid_search = true;
        }
        if let Some(range) = self.grid_range {
            config.grid_range = range;
        }
        if let Some(fraction) = self.holdout_fraction {
            config.holdout_fraction = fraction;
        }
        if let Some(lag) = self.lag {
            config.exog_alignment = ExogAlignment::Lagged(lag);
        }
        if let Some(locations) = &self.locations {
            config.locations = Some(locations.clone());
        }
        if self.deadline_secs.is_some() {
            config.deadline_secs = self.deadline_secs;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let config = cli.search_config()?;
    let table = DataLoader::from_csv(&cli.data)
        .with_context(|| format!("loading rainfall table {}", cli.data.display()))?;
    let candidates = CandidateSet::from_json_file(&cli.candidates)
        .with_context(|| format!("loading candidates {}", cli.candidates.display()))?;
    if candidates.is_empty() {
        bail!("candidate file {} lists no locations", cli.candidates.display());
    }

    info!(
        locations = candidates.len(),
        months = table.dates().len(),
        grid = config.run_grid_search,
        "starting search"
    );

    let model = SarimaxModel::new().with_strict_convergence(config.strict_convergence);
    let pipeline = SearchPipeline::new(Arc::new(model), config)?;
    let report = pipeline.run(&table, &candidates)?;

    print_summary(&report);

    if let Some(path) = &cli.output {
        ResultStore::new(cli.format)
            .write_to_path(&report, path)
            .with_context(|| format!("writing results to {}", path.display()))?;
        info!(path = %path.display(), "results written");
    } else {
        ResultStore::new(cli.format).write(&report, std::io::stdout().lock())?;
    }

    Ok(())
}

fn print_summary(report: &SearchReport) {
    eprintln!("{:<20} {:>10} {:>10} {:>10} {:>8}", "location", "baseline", "improving", "other", "failed");
    for location in &report.locations {
        eprintln!(
            "{:<20} {:>10.4} {:>10} {:>10} {:>8}",
            location.location,
            location.baseline_mae,
            location.improvements.len(),
            location.non_improving,
            location.failures.len()
        );
        if let Some((key, mae)) = location.improvements.best() {
            eprintln!("  best {} with MAE {:.4}", key, mae);
        }
    }
    for skipped in &report.skipped {
        eprintln!("{:<20} skipped: {}", skipped.location, skipped.reason);
    }
}
