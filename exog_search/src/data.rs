//! Monthly rainfall data: series views, the location table and candidate sets

use crate::error::{Result, SearchError};
use crate::subsets::MAX_CANDIDATES;
use crate::utils::parse_month;
use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

/// One location's monthly values.
///
/// The backing storage is shared and immutable; [`TimeSeries::slice`] and the
/// split helpers return new views over the same storage.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    name: Arc<str>,
    dates: Arc<[NaiveDate]>,
    values: Arc<[f64]>,
    range: Range<usize>,
}

impl TimeSeries {
    /// Create a series, checking that timestamps strictly increase and values are finite
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if dates.len() != values.len() {
            return Err(SearchError::DataError(format!(
                "series '{}' has {} dates but {} values",
                name,
                dates.len(),
                values.len()
            )));
        }
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(SearchError::DataError(format!(
                "series '{}' is not strictly increasing at {}",
                name, pair[1]
            )));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(SearchError::DataError(format!(
                "series '{}' has a non-finite value at {}",
                name, dates[pos]
            )));
        }

        let len = values.len();
        Ok(Self {
            name: Arc::from(name),
            dates: Arc::from(dates),
            values: Arc::from(values),
            range: 0..len,
        })
    }

    /// Consecutive months starting at `start`; handy for synthetic data
    pub fn monthly(name: impl Into<String>, start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        let dates = (0..values.len())
            .map(|i| {
                start
                    .checked_add_months(chrono::Months::new(i as u32))
                    .ok_or_else(|| SearchError::DataError("month overflow".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(name, dates, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates[self.range.clone()]
    }

    pub fn values(&self) -> &[f64] {
        &self.values[self.range.clone()]
    }

    /// View of the observations in `range`, relative to this view
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(SearchError::InvalidParameter(format!(
                "slice {:?} out of bounds for series '{}' of length {}",
                range,
                self.name,
                self.len()
            )));
        }
        let base = self.range.start;
        Ok(Self {
            name: Arc::clone(&self.name),
            dates: Arc::clone(&self.dates),
            values: Arc::clone(&self.values),
            range: base + range.start..base + range.end,
        })
    }

    /// Split into `[..at]` and `[at..]`
    pub fn split_at(&self, at: usize) -> Result<(Self, Self)> {
        Ok((self.slice(0..at)?, self.slice(at..self.len())?))
    }

    /// Chronological split keeping the trailing `fraction` as holdout
    pub fn holdout_split(&self, fraction: f64) -> Result<(Self, Self)> {
        let holdout = crate::utils::holdout_len(self.len(), fraction)?;
        self.split_at(self.len() - holdout)
    }

    /// Value observed at `date`, if this view covers it
    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.dates()
            .binary_search(&date)
            .ok()
            .map(|idx| self.values()[idx])
    }
}

/// Wide table of monthly rainfall, one column per location.
///
/// Missing cells are kept as `None`; they only become an error when a
/// location's series is extracted.
#[derive(Debug, Clone)]
pub struct RainfallTable {
    dates: Vec<NaiveDate>,
    columns: IndexMap<String, Vec<Option<f64>>>,
}

/// Data loader for rainfall tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a wide rainfall table from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<RainfallTable> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Load a wide rainfall table from any CSV reader.
    ///
    /// The date column is the first header containing "date", "month" or
    /// "time" (case-insensitive), falling back to the first column.
    pub fn from_reader<R: Read>(reader: R) -> Result<RainfallTable> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv.headers()?.clone();
        if headers.len() < 2 {
            return Err(SearchError::DataError(
                "rainfall table needs a date column and at least one location".to_string(),
            ));
        }
        let date_idx = Self::detect_time_column(&headers);

        let mut dates = Vec::new();
        let mut columns: IndexMap<String, Vec<Option<f64>>> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_idx)
            .map(|(_, name)| (name.to_string(), Vec::new()))
            .collect();

        for (line, record) in csv.records().enumerate() {
            let record = record?;
            let raw_date = record.get(date_idx).unwrap_or_default();
            dates.push(parse_month(raw_date)?);

            let mut column = 0;
            for (i, cell) in record.iter().enumerate() {
                if i == date_idx {
                    continue;
                }
                let value = Self::parse_cell(cell).map_err(|_| {
                    SearchError::DataError(format!(
                        "row {}: cannot parse '{}' as rainfall",
                        line + 2,
                        cell
                    ))
                })?;
                if let Some((_, values)) = columns.get_index_mut(column) {
                    values.push(value);
                }
                column += 1;
            }
        }

        RainfallTable::new(dates, columns)
    }

    fn detect_time_column(headers: &csv::StringRecord) -> usize {
        headers
            .iter()
            .position(|h| {
                let lower = h.to_lowercase();
                ["date", "month", "time"].iter().any(|k| lower.contains(k))
            })
            .unwrap_or(0)
    }

    fn parse_cell(cell: &str) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
        let trimmed = cell.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }
        trimmed.parse::<f64>().map(Some)
    }
}

impl RainfallTable {
    /// Shorthand for [`DataLoader::from_csv`]
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        DataLoader::from_csv(path)
    }

    /// Create a table; every column must have one cell per date.
    ///
    /// Rows must cover consecutive calendar months. A month with no data
    /// belongs in the table as a row of empty cells.
    pub fn new(dates: Vec<NaiveDate>, columns: IndexMap<String, Vec<Option<f64>>>) -> Result<Self> {
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(SearchError::DataError(format!(
                "rainfall table dates are not strictly increasing at {}",
                pair[1]
            )));
        }
        if let Some(pair) = dates
            .windows(2)
            .find(|w| month_index(w[1]) - month_index(w[0]) != 1)
        {
            return Err(SearchError::DataError(format!(
                "rainfall table jumps from {} to {}; months must be consecutive",
                pair[0], pair[1]
            )));
        }
        for (name, values) in &columns {
            if values.len() != dates.len() {
                return Err(SearchError::DataError(format!(
                    "location '{}' has {} cells for {} dates",
                    name,
                    values.len(),
                    dates.len()
                )));
            }
        }
        Ok(Self { dates, columns })
    }

    /// Location names in column order
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn contains(&self, location: &str) -> bool {
        self.columns.contains_key(location)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Extract a location's series over its observed span.
    ///
    /// Leading and trailing empty months are trimmed; a gap inside the span is
    /// a data error because seasonal lags assume consecutive months.
    pub fn series(&self, location: &str) -> Result<TimeSeries> {
        let cells = self
            .columns
            .get(location)
            .ok_or_else(|| SearchError::UnknownLocation(location.to_string()))?;

        let first = cells.iter().position(Option::is_some);
        let last = cells.iter().rposition(Option::is_some);
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(SearchError::DataError(format!(
                    "location '{}' has no observations",
                    location
                )))
            }
        };

        let mut values = Vec::with_capacity(last - first + 1);
        for (offset, cell) in cells[first..=last].iter().enumerate() {
            match cell {
                Some(v) => values.push(*v),
                None => {
                    return Err(SearchError::DataError(format!(
                        "location '{}' is missing a value at {}",
                        location,
                        self.dates[first + offset]
                    )))
                }
            }
        }

        TimeSeries::new(location, self.dates[first..=last].to_vec(), values)
    }
}

/// Months since year zero, so consecutive months differ by one
fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Target location to ordered candidate exogenous locations
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    entries: IndexMap<String, Vec<String>>,
}

impl CandidateSet {
    /// Build a candidate set, rejecting self references, duplicates and empty lists.
    ///
    /// Names are trimmed the same way CSV headers are, so `" KING, NC"` and
    /// `"KING, NC"` refer to the same location.
    pub fn new(entries: IndexMap<String, Vec<String>>) -> Result<Self> {
        let mut normalized: IndexMap<String, Vec<String>> = IndexMap::with_capacity(entries.len());
        for (target, candidates) in entries {
            let target = target.trim().to_string();
            let candidates: Vec<String> = candidates.iter().map(|c| c.trim().to_string()).collect();

            if candidates.is_empty() {
                return Err(SearchError::DataError(format!(
                    "location '{}' has no exogenous candidates",
                    target
                )));
            }
            if candidates.len() > MAX_CANDIDATES {
                return Err(SearchError::DataError(format!(
                    "location '{}' has {} candidates, at most {} are supported",
                    target,
                    candidates.len(),
                    MAX_CANDIDATES
                )));
            }
            if candidates.iter().any(|c| *c == target) {
                return Err(SearchError::DataError(format!(
                    "location '{}' lists itself as a candidate",
                    target
                )));
            }
            for (i, candidate) in candidates.iter().enumerate() {
                if candidates[..i].contains(candidate) {
                    return Err(SearchError::DataError(format!(
                        "location '{}' lists '{}' more than once",
                        target, candidate
                    )));
                }
            }
            if normalized.contains_key(&target) {
                return Err(SearchError::DataError(format!(
                    "location '{}' is listed more than once",
                    target
                )));
            }
            normalized.insert(target, candidates);
        }
        Ok(Self {
            entries: normalized,
        })
    }

    /// Parse `{"target": ["candidate", ...], ...}` keeping key order
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: IndexMap<String, Vec<String>> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let entries: IndexMap<String, Vec<String>> = serde_json::from_reader(file)?;
        Self::new(entries)
    }

    pub fn candidates(&self, location: &str) -> Option<&[String]> {
        self.entries.get(location).map(Vec::as_slice)
    }

    /// Target locations in file order
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Exogenous series offered to the model for one predictor subset.
///
/// Members keep their own dates; they are matched to the target by timestamp
/// when a task runs.
#[derive(Debug, Clone)]
pub struct ExogBlock {
    members: Vec<TimeSeries>,
}

impl ExogBlock {
    pub fn new(members: Vec<TimeSeries>) -> Result<Self> {
        if members.is_empty() {
            return Err(SearchError::InvalidParameter(
                "an exogenous block needs at least one series".to_string(),
            ));
        }
        Ok(Self { members })
    }

    /// One column per member, holding the member's value at each of `dates`.
    ///
    /// Any month the member does not cover is a data alignment error.
    pub fn align_to(&self, dates: &[NaiveDate]) -> Result<Vec<Vec<f64>>> {
        self.members
            .iter()
            .map(|member| {
                dates
                    .iter()
                    .map(|date| {
                        member.value_at(*date).ok_or_else(|| {
                            SearchError::DataAlignment(format!(
                                "exogenous series '{}' has no value for {}",
                                member.name(),
                                date
                            ))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn slices_share_storage_and_offsets() {
        let series = TimeSeries::monthly("A", month(2000, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let tail = series.slice(1..4).unwrap();
        let inner = tail.slice(1..2).unwrap();

        assert_eq!(tail.values(), &[2.0, 3.0, 4.0]);
        assert_eq!(inner.values(), &[3.0]);
        assert_eq!(inner.dates(), &[month(2000, 3)]);
        assert_eq!(series.values(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn rejects_unordered_dates() {
        let err = TimeSeries::new("A", vec![month(2000, 2), month(2000, 1)], vec![1.0, 2.0]);
        assert!(matches!(err, Err(SearchError::DataError(_))));
    }

    #[test]
    fn table_series_trims_leading_and_trailing_gaps() {
        let mut columns = IndexMap::new();
        columns.insert("A".to_string(), vec![None, Some(1.0), Some(2.0), None]);
        columns.insert("B".to_string(), vec![Some(1.0), None, Some(2.0), Some(3.0)]);
        let dates = (1..=4).map(|m| month(2000, m)).collect();
        let table = RainfallTable::new(dates, columns).unwrap();

        let a = table.series("A").unwrap();
        assert_eq!(a.dates(), &[month(2000, 2), month(2000, 3)]);
        assert!(table.series("B").is_err());
        assert!(matches!(
            table.series("Z"),
            Err(SearchError::UnknownLocation(_))
        ));
    }

    #[test]
    fn candidate_set_rejects_self_reference() {
        let err = CandidateSet::from_json_str(r#"{"A": ["B", "A"]}"#).unwrap_err();
        assert!(err.to_string().contains("lists itself"));
    }

    #[test]
    fn table_rejects_skipped_months() {
        let mut columns = IndexMap::new();
        columns.insert("A".to_string(), vec![Some(1.0), Some(2.0), Some(3.0)]);
        let dates = vec![month(2000, 11), month(2000, 12), month(2001, 2)];

        let err = RainfallTable::new(dates, columns).unwrap_err();
        assert!(err.to_string().contains("consecutive"));
    }

    #[test]
    fn candidate_names_are_trimmed() {
        let set = CandidateSet::from_json_str(r#"{" KING, NC": ["STUART, VA ", " DILLON, SC"]}"#)
            .unwrap();
        assert_eq!(set.locations().collect::<Vec<_>>(), vec!["KING, NC"]);
        assert_eq!(
            set.candidates("KING, NC").unwrap(),
            &["STUART, VA".to_string(), "DILLON, SC".to_string()]
        );

        let err = CandidateSet::from_json_str(r#"{"A": ["B"], " A": ["C"]}"#).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn candidate_lists_are_bounded() {
        let many: Vec<String> = (0..=MAX_CANDIDATES).map(|i| format!("L{}", i)).collect();
        let mut entries = IndexMap::new();
        entries.insert("A".to_string(), many);
        assert!(CandidateSet::new(entries).is_err());
    }

    #[test]
    fn candidate_set_keeps_file_order() {
        let set = CandidateSet::from_json_str(r#"{"Z": ["A"], "B": ["C", "A"]}"#).unwrap();
        assert_eq!(set.locations().collect::<Vec<_>>(), vec!["Z", "B"]);
        assert_eq!(set.candidates("B").unwrap(), &["C".to_string(), "A".to_string()]);
    }

    #[test]
    fn exog_alignment_reports_missing_months() {
        let exog = TimeSeries::monthly("B", month(2000, 2), vec![5.0, 6.0]).unwrap();
        let block = ExogBlock::new(vec![exog]).unwrap();

        let aligned = block.align_to(&[month(2000, 2), month(2000, 3)]).unwrap();
        assert_eq!(aligned, vec![vec![5.0, 6.0]]);

        let err = block.align_to(&[month(2000, 1)]).unwrap_err();
        assert!(matches!(err, SearchError::DataAlignment(_)));
    }
}
