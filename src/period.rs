//! Typed, orderable reporting periods and the ordered, de-duplicated
//! index built from them.
//!
//! A [`Period`] is exactly one of annual, quarterly, or monthly. Parsing
//! accepts the three canonical string shapes (`YYYY`, `YYYYQn`,
//! `YYYY-MM`); formatting is the inverse.

use crate::error::{GraphError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

static QUARTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})Q([1-4])$").unwrap());
static MONTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").unwrap());

/// A single reporting period: annual, quarterly, or monthly.
///
/// `Period` is a plain value object — immutable, hashable, and totally
/// ordered. The ordering key places the year first, then a within-year
/// index (month number for monthly periods, `quarter * 3` for quarterly,
/// and `13` for annual) so that annual periods sort *after* every
/// intra-year period of the same year. This is the documented contract
/// (see SPEC_FULL.md's resolution of the `_order_key` open question), not
/// an oversight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Annual { year: i32 },
    Quarterly { year: i32, quarter: u8 },
    Monthly { year: i32, month: u8 },
}

impl Period {
    /// Parses one of `YYYY`, `YYYYQn`, or `YYYY-MM`.
    pub fn parse(s: &str) -> Result<Self> {
        Self::try_parse(s).ok_or_else(|| GraphError::InvalidPeriod(s.to_string()))
    }

    /// Non-panicking parse; `None` on any malformed input.
    pub fn try_parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(caps) = MONTH_RE.captures(s) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u8 = caps[2].parse().ok()?;
            if (1..=12).contains(&month) {
                return Some(Period::Monthly { year, month });
            }
            return None;
        }
        if let Some(caps) = QUARTER_RE.captures(s) {
            let year: i32 = caps[1].parse().ok()?;
            let quarter: u8 = caps[2].parse().ok()?;
            return Some(Period::Quarterly { year, quarter });
        }
        if let Some(caps) = YEAR_RE.captures(s) {
            let year: i32 = caps[1].parse().ok()?;
            return Some(Period::Annual { year });
        }
        None
    }

    pub fn is_annual(&self) -> bool {
        matches!(self, Period::Annual { .. })
    }

    pub fn is_quarterly(&self) -> bool {
        matches!(self, Period::Quarterly { .. })
    }

    pub fn is_monthly(&self) -> bool {
        matches!(self, Period::Monthly { .. })
    }

    pub fn year(&self) -> i32 {
        match self {
            Period::Annual { year } | Period::Quarterly { year, .. } | Period::Monthly { year, .. } => *year,
        }
    }

    /// The within-year component of the ordering key (month-equivalent).
    ///
    /// Monthly -> the month number; quarterly -> `quarter * 3` (the last
    /// month of the quarter); annual -> `13`, sorting after December.
    fn within_year_key(&self) -> u8 {
        match self {
            Period::Monthly { month, .. } => *month,
            Period::Quarterly { quarter, .. } => quarter * 3,
            Period::Annual { .. } => 13,
        }
    }

    fn order_key(&self) -> (i32, u8) {
        (self.year(), self.within_year_key())
    }

    /// Canonical string form — the inverse of `parse`.
    pub fn to_key_string(&self) -> String {
        format!("{self}")
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Annual { year } => write!(f, "{year}"),
            Period::Quarterly { year, quarter } => write!(f, "{year}Q{quarter}"),
            Period::Monthly { year, month } => write!(f, "{year}-{month:02}"),
        }
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Period {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl std::str::FromStr for Period {
    type Err = GraphError;
    fn from_str(s: &str) -> Result<Self> {
        Period::parse(s)
    }
}

/// Insertion-time-sorted, duplicate-free collection of periods.
///
/// Periods are kept sorted chronologically at all times; inserting a
/// period already present is a silent no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodIndex {
    periods: Vec<Period>,
}

impl PeriodIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a period, keeping the index sorted. Duplicates are ignored.
    pub fn add(&mut self, period: Period) {
        if self.periods.contains(&period) {
            return;
        }
        let pos = self.periods.partition_point(|p| p < &period);
        self.periods.insert(pos, period);
    }

    pub fn contains(&self, period: &Period) -> bool {
        self.periods.contains(period)
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Period> {
        self.periods.iter()
    }

    /// Returns an immutable shallow copy (same contents, independent backing
    /// storage — `PeriodIndex` has no interior mutability so this is
    /// equivalent to `clone`, kept as a distinct name to mirror the
    /// builder/state `freeze` vocabulary used elsewhere in this crate).
    pub fn freeze(&self) -> PeriodIndex {
        self.clone()
    }
}

impl<'a> IntoIterator for &'a PeriodIndex {
    type Item = &'a Period;
    type IntoIter = std::slice::Iter<'a, Period>;
    fn into_iter(self) -> Self::IntoIter {
        self.periods.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2023", Period::Annual { year: 2023 })]
    #[case("2023Q1", Period::Quarterly { year: 2023, quarter: 1 })]
    #[case("2023Q4", Period::Quarterly { year: 2023, quarter: 4 })]
    #[case("2023-03", Period::Monthly { year: 2023, month: 3 })]
    #[case("2023-12", Period::Monthly { year: 2023, month: 12 })]
    fn parses_canonical_shapes(#[case] input: &str, #[case] expected: Period) {
        assert_eq!(Period::parse(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("2023Q5")]
    #[case("2023-13")]
    #[case("2023-00")]
    #[case("23")]
    fn rejects_malformed(#[case] input: &str) {
        assert!(Period::try_parse(input).is_none());
    }

    #[test]
    fn formats_round_trip() {
        for s in ["2023", "2023Q1", "2023-03", "2023-12"] {
            assert_eq!(Period::parse(s).unwrap().to_key_string(), s);
        }
    }

    #[test]
    fn annual_sorts_after_all_intra_year_periods() {
        let mut ps: Vec<Period> = ["2023", "2023Q1", "2023-03", "2023Q4", "2023-12"]
            .iter()
            .map(|s| Period::parse(s).unwrap())
            .collect();
        ps.sort();
        let formatted: Vec<String> = ps.iter().map(|p| p.to_key_string()).collect();
        assert_eq!(
            formatted,
            vec!["2023Q1", "2023-03", "2023Q4", "2023-12", "2023"]
        );
    }

    #[test]
    fn period_index_dedupes_and_stays_sorted() {
        let mut idx = PeriodIndex::new();
        for s in ["2023Q4", "2023Q1", "2023Q1", "2023"] {
            idx.add(Period::parse(s).unwrap());
        }
        assert_eq!(idx.len(), 3);
        let formatted: Vec<String> = idx.iter().map(|p| p.to_key_string()).collect();
        assert_eq!(formatted, vec!["2023Q1", "2023Q4", "2023"]);
    }
}
