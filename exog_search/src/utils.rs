//! Utility functions for the exog_search crate

use crate::error::{Result, SearchError};
use chrono::NaiveDate;

/// Number of trailing observations reserved for a holdout of `fraction`.
///
/// Rounds up, so any positive fraction of a non-empty series holds out at
/// least one observation, and always leaves at least one for training.
pub fn holdout_len(total: usize, fraction: f64) -> Result<usize> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(SearchError::InvalidParameter(format!(
            "holdout fraction must be in (0, 1), got {}",
            fraction
        )));
    }
    if total < 2 {
        return Err(SearchError::DataError(format!(
            "cannot split a series of {} observations",
            total
        )));
    }

    let holdout = (total as f64 * fraction).ceil() as usize;
    Ok(holdout.clamp(1, total - 1))
}

/// Parse a date cell in one of the layouts seen in rainfall exports.
///
/// Month-only values (`1987-04`) resolve to the first day of the month.
pub fn parse_month(raw: &str) -> Result<NaiveDate> {
    let value = raw.trim();
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date);
        }
    }
    if let Some(date_part) = value.split_whitespace().next() {
        if date_part != value {
            if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                return Ok(date);
            }
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d") {
        return Ok(date);
    }

    Err(SearchError::DataError(format!("unrecognised date: '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdout_rounds_up() {
        assert_eq!(holdout_len(10, 0.2).unwrap(), 2);
        assert_eq!(holdout_len(11, 0.2).unwrap(), 3);
        assert_eq!(holdout_len(2, 0.01).unwrap(), 1);
    }

    #[test]
    fn holdout_rejects_bad_fraction() {
        assert!(holdout_len(10, 0.0).is_err());
        assert!(holdout_len(10, 1.0).is_err());
        assert!(holdout_len(10, f64::NAN).is_err());
    }

    #[test]
    fn parses_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(1990, 3, 1).unwrap();
        assert_eq!(parse_month("1990-03-01").unwrap(), expected);
        assert_eq!(parse_month("03/01/1990").unwrap(), expected);
        assert_eq!(parse_month("1990-03").unwrap(), expected);
        assert_eq!(parse_month("1990-03-01 00:00:00").unwrap(), expected);
        assert!(parse_month("March").is_err());
    }
}
