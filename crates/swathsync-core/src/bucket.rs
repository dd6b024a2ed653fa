//! Bucket keys: one (product, date) pair per manifest and destination directory.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::path::{Path, PathBuf};

/// Date format accepted on the command line.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Error parsing a `YYYYMMDD` date.
#[derive(Debug, thiserror::Error)]
#[error("invalid date {input:?}: expected YYYYMMDD ({source})")]
pub struct DateError {
    pub input: String,
    #[source]
    pub source: chrono::ParseError,
}

/// Parse a `YYYYMMDD` string into a calendar date.
pub fn parse_date(input: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|source| DateError {
        input: input.to_string(),
        source,
    })
}

/// Unit of work: one product on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    product: String,
    date: NaiveDate,
}

impl BucketKey {
    pub fn new(product: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            product: product.into(),
            date,
        }
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Four-digit year, e.g. `2024`.
    pub fn year(&self) -> String {
        format!("{:04}", self.date.year())
    }

    /// Zero-padded day of year, `001` through `366`.
    pub fn day_of_year(&self) -> String {
        format!("{:03}", self.date.ordinal())
    }

    /// Destination directory: `<root>/<product>/<year>`.
    pub fn dest_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.product).join(self.year())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product, self.date.format("%Y-%m-%d"))
    }
}

/// Inclusive day-by-day iterator from `start` to `end`. Empty if `start > end`.
#[derive(Debug, Clone)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl DateRange {
    pub fn inclusive(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            next: (start <= end).then_some(start),
            end,
        }
    }
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = current.succ_opt().filter(|d| *d <= self.end);
        Some(current)
    }
}

/// Every bucket for `products` × `start..=end`, product-major.
pub fn buckets(products: &[String], start: NaiveDate, end: NaiveDate) -> Vec<BucketKey> {
    products
        .iter()
        .flat_map(|p| DateRange::inclusive(start, end).map(move |d| BucketKey::new(p.clone(), d)))
        .collect()
}
