//! Error taxonomy for the MGCI core.
//!
//! Every variant describes a precondition violated by caller-supplied input.
//! Nothing here is retried or recovered inside the crate.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The resolver was handed no usable asset years.
    #[error("invalid year set: {0}")]
    InvalidYearSet(String),

    /// A bracket list whose interpolation anchor cannot be determined.
    #[error("invalid break point for period {period}: years {years:?}")]
    InvalidBreakpoint { period: String, years: Vec<i32> },

    /// An aggregation tree that does not match the expected schema.
    #[error("malformed aggregation result '{label}': {reason}")]
    MalformedResult { label: String, reason: String },

    #[error("cannot interpolate {target} between {year1} and {year2}: target must lie strictly inside")]
    InvalidInterpolationRange { year1: i32, year2: i32, target: i32 },

    /// Interpolation inputs disagree on their (belt, class) keys.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A year with neither a direct result nor a bracketing pair.
    #[error("year {0} cannot be served: no direct result and no interpolation bracket")]
    UnschedulableYear(i32),

    #[error("no aggregation result for {0}")]
    ResultNotFound(String),

    /// Reference table could not be loaded or a lookup into it failed.
    #[error("reference data '{table}': {reason}")]
    Reference { table: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot write report to {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
