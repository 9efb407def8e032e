use exog_search::error::TaskFailure;
use exog_search::grid::HyperparamConfig;
use exog_search::results::{
    FailedCandidate, LocationReport, OutputFormat, ResultStore, ResultTable, SearchReport,
    SkippedLocation,
};
use exog_search::subsets::enumerate_subsets;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::tempdir;

fn report() -> SearchReport {
    let candidates = vec!["B".to_string(), "C".to_string()];
    let subsets = enumerate_subsets(&candidates);
    let mut table = ResultTable::new("A", 2.0);
    table.offer(subsets[1].clone(), 1.5);
    table.offer(subsets[0].clone(), 1.75);

    SearchReport {
        locations: vec![LocationReport {
            location: "A".to_string(),
            baseline_mae: 2.0,
            config: HyperparamConfig::default(),
            improvements: table,
            non_improving: 1,
            failures: vec![FailedCandidate::new(
                &subsets[2],
                &TaskFailure::cancelled(),
            )],
            cancelled: true,
            grid: None,
        }],
        skipped: vec![SkippedLocation {
            location: "Z".to_string(),
            reason: "no observations".to_string(),
        }],
    }
}

#[test]
fn csv_output_lists_improvements() {
    let mut buffer = Vec::new();
    ResultStore::new(OutputFormat::Csv)
        .write(&report(), &mut buffer)
        .unwrap();

    let text = String::from_utf8(buffer).unwrap();
    assert_eq!(
        text,
        "location,candidate_key,mae\nA,(B),1.5\nA,\"(B, C)\",1.75\n"
    );
}

#[test]
fn json_output_includes_the_run_report() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    ResultStore::new(OutputFormat::Json)
        .write_to_path(&report(), &path)
        .unwrap();

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["results"]["A"]["(B)"], 1.5);
    assert_eq!(json["results"]["A"]["(B, C)"], 1.75);
    assert_eq!(json["locations"][0]["non_improving"], 1);
    assert_eq!(json["locations"][0]["failures"][0]["kind"], "cancelled");
    assert_eq!(json["locations"][0]["failures"][0]["candidate_key"], "(C)");
    assert_eq!(json["skipped"][0]["location"], "Z");
}

#[test]
fn best_entry_is_lowest_error() {
    let report = report();
    let (key, mae) = report.locations[0].improvements.best().unwrap();
    assert_eq!(key.to_string(), "(B)");
    assert_eq!(mae, 1.5);
    assert_eq!(report.failure_count(), 1);
}
