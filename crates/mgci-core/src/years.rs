//! Sub-indicator A year planning.
//!
//! Maps the user's available land-cover assets onto the fixed SDG reporting
//! periods: which periods are served directly, which are interpolated between
//! the nearest assets below and above, and which single-year aggregations the
//! external engine therefore has to compute.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::config::ReferenceConfig;
use crate::error::{Error, Result};

// ── YearSpec ──────────────────────────────────────────────────────────────────

/// One available land-cover classification asset, keyed by acquisition year.
///
/// Ordered by `(year, asset)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearSpec {
    #[serde(deserialize_with = "year_from_int_or_str")]
    pub year: i32,
    pub asset: String,
}

impl YearSpec {
    pub fn new(year: i32, asset: impl Into<String>) -> Self {
        Self { year, asset: asset.into() }
    }
}

impl fmt::Display for YearSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.year, self.asset)
    }
}

/// Form widgets hand years over as strings; the engine and tests use numbers.
fn year_from_int_or_str<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i32),
        Str(String),
    }
    match Raw::deserialize(d)? {
        Raw::Int(y) => Ok(y),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Underscore-joined years, the label the engine keys its results by.
pub fn years_label(years: &[YearSpec]) -> String {
    years.iter().map(|y| y.year.to_string()).collect::<Vec<_>>().join("_")
}

// ── Break points ──────────────────────────────────────────────────────────────

/// How a reporting period is served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakPoint {
    /// Every asset whose year equals the period. Ties are all kept.
    Exact(Vec<YearSpec>),
    /// Nearest asset strictly below and strictly above the period.
    Bracket(YearSpec, YearSpec),
    /// Edge of the available range; no bracket exists.
    Unresolvable,
}

impl BreakPoint {
    /// The `(below, above)` years of a bracket.
    pub fn bracket_years(&self) -> Option<(i32, i32)> {
        match self {
            BreakPoint::Bracket(below, above) => Some((below.year, above.year)),
            _ => None,
        }
    }

    pub fn is_interpolated(&self) -> bool {
        matches!(self, BreakPoint::Bracket(..))
    }

    /// Every asset this break point depends on.
    pub fn years(&self) -> Vec<&YearSpec> {
        match self {
            BreakPoint::Exact(specs) => specs.iter().collect(),
            BreakPoint::Bracket(below, above) => vec![below, above],
            BreakPoint::Unresolvable => Vec::new(),
        }
    }
}

/// Resolve every configured reporting period inside `[min, max]` of the
/// available years.
///
/// Periods outside that range are left out entirely.
pub fn resolve_break_points(
    config: &ReferenceConfig,
    available: &[YearSpec],
) -> Result<BTreeMap<i32, BreakPoint>> {
    let (min, max) = match (
        available.iter().map(|y| y.year).min(),
        available.iter().map(|y| y.year).max(),
    ) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(Error::InvalidYearSet("no asset years were selected".into())),
    };

    let mut break_points = BTreeMap::new();
    for &period in config.reporting_periods().iter().filter(|&&p| p >= min && p <= max) {
        let exact: Vec<YearSpec> = available.iter().filter(|y| y.year == period).cloned().collect();

        let bp = if !exact.is_empty() {
            BreakPoint::Exact(exact)
        } else {
            let below = available.iter().filter(|y| y.year < period).max_by_key(|y| y.year);
            let above = available.iter().filter(|y| y.year > period).min_by_key(|y| y.year);
            match (below, above) {
                (Some(b), Some(a)) => BreakPoint::Bracket(b.clone(), a.clone()),
                _ => BreakPoint::Unresolvable,
            }
        };
        debug!(period, break_point = ?bp, "resolved reporting period");
        break_points.insert(period, bp);
    }

    Ok(break_points)
}

/// Single-year requests needed to serve every break point, deduplicated and
/// sorted by year.
pub fn sub_a_requests(break_points: &BTreeMap<i32, BreakPoint>) -> Vec<YearSpec> {
    break_points
        .values()
        .flat_map(|bp| bp.years())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ── Interpolation pairs ───────────────────────────────────────────────────────

/// A reporting period label with the assets that anchor it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakPointGroup {
    pub period: String,
    pub years: Vec<YearSpec>,
}

impl BreakPointGroup {
    pub fn new(period: impl Into<String>, years: Vec<YearSpec>) -> Self {
        Self { period: period.into(), years }
    }
}

/// Flatten resolver output into groups for [`extract_interp_pairs`].
///
/// Each exact asset becomes its own singleton group; unresolvable periods
/// contribute nothing.
pub fn break_point_groups(break_points: &BTreeMap<i32, BreakPoint>) -> Vec<BreakPointGroup> {
    let mut groups = Vec::new();
    for (period, bp) in break_points {
        match bp {
            BreakPoint::Exact(specs) => groups.extend(
                specs.iter().map(|s| BreakPointGroup::new(period.to_string(), vec![s.clone()])),
            ),
            BreakPoint::Bracket(below, above) => groups.push(BreakPointGroup::new(
                period.to_string(),
                vec![below.clone(), above.clone()],
            )),
            BreakPoint::Unresolvable => {}
        }
    }
    groups
}

/// Minimal set of year groups the engine must compute, across all periods.
///
/// Groups are compared as sets of `(year, asset)`, so the result does not
/// depend on the order of `groups` or of the years inside them.
pub fn extract_interp_pairs(groups: &[BreakPointGroup]) -> Result<Vec<Vec<YearSpec>>> {
    let mut segments: Vec<&[YearSpec]> = Vec::new();

    for group in groups {
        let years = group.years.as_slice();
        match years.len() {
            1 | 2 => segments.push(years),
            3 => {
                let mentions = |spec: &YearSpec| group.period.contains(&spec.year.to_string());
                if mentions(&years[0]) {
                    segments.push(&years[..1]);
                    segments.push(&years[1..]);
                } else if mentions(&years[2]) {
                    segments.push(&years[..2]);
                    segments.push(&years[2..]);
                } else {
                    return Err(invalid_breakpoint(group));
                }
            }
            4 => {
                segments.push(&years[..2]);
                segments.push(&years[2..]);
            }
            _ => return Err(invalid_breakpoint(group)),
        }
    }

    // Canonical form: members sorted by (year, asset). The set removes
    // duplicates and orders groups lexicographically by their years.
    let unique: BTreeSet<Vec<YearSpec>> = segments
        .into_iter()
        .map(|segment| {
            let mut canonical: Vec<YearSpec> = segment.to_vec();
            canonical.sort();
            canonical.dedup();
            canonical
        })
        .collect();

    Ok(unique.into_iter().collect())
}

fn invalid_breakpoint(group: &BreakPointGroup) -> Error {
    Error::InvalidBreakpoint {
        period: group.period.clone(),
        years: group.years.iter().map(|y| y.year).collect(),
    }
}
