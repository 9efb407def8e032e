//! Improvement tables, run reports and their persistence

use crate::error::{FailureKind, Result, TaskFailure};
use crate::grid::{GridSearchOutcome, HyperparamConfig};
use crate::subsets::PredictorSubset;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Key of a table entry: the predictor subset that was scored
pub type CandidateKey = PredictorSubset;

/// Entries of one location that beat its baseline.
///
/// Each key is written at most once. The table has a single owner and is
/// never shared with workers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    location: String,
    baseline_mae: f64,
    entries: BTreeMap<CandidateKey, f64>,
}

impl ResultTable {
    pub fn new(location: impl Into<String>, baseline_mae: f64) -> Self {
        Self {
            location: location.into(),
            baseline_mae,
            entries: BTreeMap::new(),
        }
    }

    /// Insert `mae` for `key` if it beats the baseline and `key` is new.
    ///
    /// Returns whether the entry was stored.
    pub fn offer(&mut self, key: CandidateKey, mae: f64) -> bool {
        if !(mae < self.baseline_mae) || self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, mae);
        true
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn baseline_mae(&self) -> f64 {
        self.baseline_mae
    }

    pub fn get(&self, key: &CandidateKey) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CandidateKey, f64)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    /// Entry with the lowest error
    pub fn best(&self) -> Option<(&CandidateKey, f64)> {
        self.iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.iter()
            .map(|(key, mae)| ResultRecord {
                location: self.location.clone(),
                candidate_key: key.to_string(),
                mae,
            })
            .collect()
    }
}

impl Serialize for ResultTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, mae) in &self.entries {
            map.serialize_entry(&key.to_string(), mae)?;
        }
        map.end()
    }
}

/// Persisted row: one configuration that beat its location's baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub location: String,
    pub candidate_key: String,
    pub mae: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedCandidate {
    pub candidate_key: String,
    pub kind: FailureKind,
    pub message: String,
}

impl FailedCandidate {
    pub fn new(key: &CandidateKey, failure: &TaskFailure) -> Self {
        Self {
            candidate_key: key.to_string(),
            kind: failure.kind,
            message: failure.message.clone(),
        }
    }
}

/// Final state of one location's search
#[derive(Debug, Clone, Serialize)]
pub struct LocationReport {
    pub location: String,
    pub baseline_mae: f64,
    /// Orders used for the subset search
    pub config: HyperparamConfig,
    pub improvements: ResultTable,
    /// Completed evaluations that did not beat the baseline
    pub non_improving: usize,
    pub failures: Vec<FailedCandidate>,
    /// The batch was cut short before every task started
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridSearchOutcome>,
}

/// A location that produced no report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLocation {
    pub location: String,
    pub reason: String,
}

/// Everything a run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchReport {
    pub locations: Vec<LocationReport>,
    pub skipped: Vec<SkippedLocation>,
}

impl SearchReport {
    /// Improving records across every location, in location order
    pub fn records(&self) -> Vec<ResultRecord> {
        self.locations
            .iter()
            .flat_map(|report| report.improvements.records())
            .collect()
    }

    pub fn location(&self, name: &str) -> Option<&LocationReport> {
        self.locations.iter().find(|r| r.location == name)
    }

    pub fn failure_count(&self) -> usize {
        self.locations.iter().map(|r| r.failures.len()).sum()
    }
}

/// Output format for persisted results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Writes run results to disk
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultStore {
    format: OutputFormat,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    results: BTreeMap<&'a str, &'a ResultTable>,
    locations: &'a [LocationReport],
    skipped: &'a [SkippedLocation],
}

impl ResultStore {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, report: &SearchReport, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write(report, file)
    }

    /// CSV holds only the improving records; JSON adds the full run report
    pub fn write<W: Write>(&self, report: &SearchReport, mut writer: W) -> Result<()> {
        match self.format {
            OutputFormat::Csv => {
                let mut csv = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(writer);
                csv.write_record(["location", "candidate_key", "mae"])?;
                for record in report.records() {
                    csv.serialize(&record)?;
                }
                csv.flush()?;
            }
            OutputFormat::Json => {
                let document = JsonDocument {
                    results: report
                        .locations
                        .iter()
                        .map(|r| (r.location.as_str(), &r.improvements))
                        .collect(),
                    locations: &report.locations,
                    skipped: &report.skipped,
                };
                serde_json::to_writer_pretty(&mut writer, &document)?;
                writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn subset(names: &[&str]) -> CandidateKey {
        let json = serde_json::to_string(names).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn only_improvements_are_kept() {
        let mut table = ResultTable::new("A", 2.0);
        assert!(table.offer(subset(&["B"]), 1.5));
        assert!(!table.offer(subset(&["C"]), 2.2));
        assert!(!table.offer(subset(&["D"]), 2.0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn entries_are_write_once() {
        let mut table = ResultTable::new("A", 2.0);
        assert!(table.offer(subset(&["B"]), 1.5));
        assert!(!table.offer(subset(&["B"]), 1.0));
        assert_eq!(table.get(&subset(&["B"])), Some(1.5));
    }

    #[test]
    fn serializes_as_string_keyed_map() {
        let mut table = ResultTable::new("A", 2.0);
        table.offer(subset(&["B", "C"]), 1.8);
        table.offer(subset(&["B"]), 1.2);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json, serde_json::json!({"(B)": 1.2, "(B, C)": 1.8}));
    }
}
