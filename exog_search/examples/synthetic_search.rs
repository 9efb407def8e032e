use exog_search::data::{CandidateSet, RainfallTable};
use exog_search::grid::HyperparamConfig;
use exog_search::logging::init_tracing;
use exog_search::models::SarimaxModel;
use exog_search::orchestrator::SearchPipeline;
use exog_search::results::{OutputFormat, ResultStore};
use exog_search::SearchConfig;
use chrono::{Months, NaiveDate};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::sync::Arc;

/// Ten years of monthly rainfall where `Valley` follows `Ridge` closely and
/// `Coast` is unrelated noise.
fn synthetic_table() -> Result<RainfallTable, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(7);
    let noise = Normal::new(0.0, 4.0)?;
    let months = 120;

    let start = NaiveDate::from_ymd_opt(2010, 1, 1).ok_or("bad start date")?;
    let dates = (0..months)
        .map(|i| start.checked_add_months(Months::new(i)).ok_or("date overflow"))
        .collect::<Result<Vec<_>, _>>()?;

    let season = |t: u32| 60.0 + 35.0 * ((t % 12) as f64 * std::f64::consts::PI / 6.0).cos();
    let ridge: Vec<f64> = (0..months).map(|t| season(t) + noise.sample(&mut rng)).collect();
    let valley: Vec<f64> = ridge
        .iter()
        .map(|r| 0.8 * r + 5.0 + 0.5 * noise.sample(&mut rng))
        .collect();
    let coast: Vec<f64> = (0..months).map(|_| 50.0 + 3.0 * noise.sample(&mut rng)).collect();

    let mut columns = IndexMap::new();
    for (name, values) in [("Valley", valley), ("Ridge", ridge), ("Coast", coast)] {
        columns.insert(name.to_string(), values.into_iter().map(Some).collect());
    }
    Ok(RainfallTable::new(dates, columns)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(false)?;

    let table = synthetic_table()?;
    let candidates = CandidateSet::from_json_str(r#"{"Valley": ["Ridge", "Coast"]}"#)?;

    let config = SearchConfig {
        holdout_fraction: 0.1,
        fixed_config: HyperparamConfig::new(1, 0, 1, 0),
        ..SearchConfig::default()
    };
    let pipeline = SearchPipeline::new(Arc::new(SarimaxModel::new()), config)?;
    let report = pipeline.run(&table, &candidates)?;

    for location in &report.locations {
        println!(
            "{}: baseline MAE {:.3}, {} improving subsets",
            location.location,
            location.baseline_mae,
            location.improvements.len()
        );
        for (key, mae) in location.improvements.iter() {
            println!("  {} -> {:.3}", key, mae);
        }
    }

    ResultStore::new(OutputFormat::Json).write(&report, std::io::stdout().lock())?;
    Ok(())
}
