//! Read-only reference tables shared by every component.
//!
//! Built once (from the embedded CSV copies or from a directory of overrides)
//! and handed to components by reference. Nothing mutates it afterwards, so a
//! test can construct a double with its own reporting periods.

pub mod geo;

use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub use geo::{AoiMethod, GeoArea};

// ── Built-in tables ───────────────────────────────────────────────────────────

const REPORTING_PERIODS_CSV: &str = include_str!("../../data/reporting_periods.csv");
const LC_CLASSIFICATION_CSV: &str = include_str!("../../data/lc_classification.csv");
const BIOBELTS_CSV: &str = include_str!("../../data/biobelts_label.csv");
const TRANSITION_MATRIX_CSV: &str = include_str!("../../data/transition_matrix.csv");
const M49_CSV: &str = include_str!("../../data/m49_countries.csv");

/// IPCC "green" classes: forest, grassland, cropland, wetland.
pub const DEFAULT_GREEN_CLASSES: [u32; 4] = [1, 2, 3, 4];

// ── Table records ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PeriodRecord {
    year: i32,
}

/// A labelled class code (land cover or bioclimatic belt) with its display colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    #[serde(alias = "lc_class", alias = "belt_class")]
    pub code: u32,
    pub desc: String,
    pub color: String,
}

/// Ecological effect of a land-cover change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Impact {
    Degradation,
    Stable,
    Improvement,
}

impl Impact {
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(Impact::Degradation),
            0 => Some(Impact::Stable),
            1 => Some(Impact::Improvement),
            _ => None,
        }
    }

    pub fn code(self) -> i8 {
        match self {
            Impact::Degradation => -1,
            Impact::Stable => 0,
            Impact::Improvement => 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransitionRecord {
    from_code: u32,
    target_code: u32,
    #[allow(dead_code)]
    impact: String,
    impact_code: i8,
}

/// One cell of the transition impact matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionImpact {
    pub from: u32,
    pub to: u32,
    pub impact: Impact,
}

/// Row of the M49 / ISO 3166-1 lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub iso31661: String,
    pub country: String,
    pub m49: String,
}

// ── Units ─────────────────────────────────────────────────────────────────────

/// Area unit for report values. Engine sums arrive in square metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AreaUnit {
    #[serde(rename = "ha")]
    Hectares,
    #[default]
    #[serde(rename = "sqkm")]
    SquareKilometres,
}

impl AreaUnit {
    /// Square metres per unit.
    pub fn factor(self) -> f64 {
        match self {
            AreaUnit::Hectares => 10_000.0,
            AreaUnit::SquareKilometres => 1_000_000.0,
        }
    }

    /// SDMX `UNIT_MEASURE` code.
    pub fn sdmx_code(self) -> &'static str {
        match self {
            AreaUnit::Hectares => "HA",
            AreaUnit::SquareKilometres => "KM2",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AreaUnit::Hectares => "hectares",
            AreaUnit::SquareKilometres => "square kilometers",
        }
    }
}

impl FromStr for AreaUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ha" => Ok(AreaUnit::Hectares),
            "sqkm" => Ok(AreaUnit::SquareKilometres),
            other => Err(Error::Reference {
                table: "units".into(),
                reason: format!("'{other}' is not an available unit, use 'ha' or 'sqkm'"),
            }),
        }
    }
}

// ── ReferenceConfig ───────────────────────────────────────────────────────────

/// Immutable reference data for one process.
#[derive(Debug, Clone)]
pub struct ReferenceConfig {
    reporting_periods: Vec<i32>,
    land_cover: Vec<ClassInfo>,
    belts: Vec<ClassInfo>,
    transitions: Vec<TransitionImpact>,
    countries: Vec<Country>,
    green_classes: Vec<u32>,
}

impl ReferenceConfig {
    /// Configuration from the tables compiled into the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_sources(
            REPORTING_PERIODS_CSV,
            LC_CLASSIFICATION_CSV,
            BIOBELTS_CSV,
            TRANSITION_MATRIX_CSV,
            M49_CSV,
        )
    }

    /// Configuration from a directory of CSV files. Any file that is absent
    /// falls back to the built-in copy.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let load = |name: &str, fallback: &'static str| -> Result<String> {
            let path = dir.join(name);
            if path.is_file() {
                debug!(path = %path.display(), "loading reference table");
                Ok(std::fs::read_to_string(&path)?)
            } else {
                debug!(table = name, "reference table not found, using built-in copy");
                Ok(fallback.to_string())
            }
        };

        Self::from_sources(
            &load("reporting_periods.csv", REPORTING_PERIODS_CSV)?,
            &load("lc_classification.csv", LC_CLASSIFICATION_CSV)?,
            &load("biobelts_label.csv", BIOBELTS_CSV)?,
            &load("transition_matrix.csv", TRANSITION_MATRIX_CSV)?,
            &load("m49_countries.csv", M49_CSV)?,
        )
    }

    fn from_sources(
        periods: &str,
        land_cover: &str,
        belts: &str,
        transitions: &str,
        countries: &str,
    ) -> Result<Self> {
        let mut reporting_periods: Vec<i32> = read_table::<PeriodRecord>("reporting_periods", periods, b',')?
            .into_iter()
            .map(|r| r.year)
            .collect();
        reporting_periods.sort_unstable();
        reporting_periods.dedup();

        let transitions = read_table::<TransitionRecord>("transition_matrix", transitions, b',')?
            .into_iter()
            .map(|r| {
                let impact = Impact::from_code(r.impact_code).ok_or_else(|| Error::Reference {
                    table: "transition_matrix".into(),
                    reason: format!(
                        "impact_code {} for {}->{} is not one of -1, 0, 1",
                        r.impact_code, r.from_code, r.target_code
                    ),
                })?;
                Ok(TransitionImpact { from: r.from_code, to: r.target_code, impact })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            reporting_periods,
            land_cover: read_table("lc_classification", land_cover, b',')?,
            belts: read_table("biobelts_label", belts, b',')?,
            transitions,
            countries: read_table("m49_countries", countries, b';')?,
            green_classes: DEFAULT_GREEN_CLASSES.to_vec(),
        })
    }

    /// Replace the reporting-period list.
    pub fn with_reporting_periods(mut self, periods: impl IntoIterator<Item = i32>) -> Self {
        let mut periods: Vec<i32> = periods.into_iter().collect();
        periods.sort_unstable();
        periods.dedup();
        self.reporting_periods = periods;
        self
    }

    pub fn with_green_classes(mut self, classes: impl IntoIterator<Item = u32>) -> Self {
        self.green_classes = classes.into_iter().collect();
        self
    }

    /// Reporting periods, ascending.
    pub fn reporting_periods(&self) -> &[i32] {
        &self.reporting_periods
    }

    pub fn land_cover_classes(&self) -> &[ClassInfo] {
        &self.land_cover
    }

    pub fn belts(&self) -> &[ClassInfo] {
        &self.belts
    }

    pub fn green_classes(&self) -> &[u32] {
        &self.green_classes
    }

    pub fn is_green(&self, lc_class: u32) -> bool {
        self.green_classes.contains(&lc_class)
    }

    pub fn transitions(&self) -> &[TransitionImpact] {
        &self.transitions
    }

    /// Impact of changing from `from` to `to`; `None` when the matrix has no entry.
    pub fn impact(&self, from: u32, to: u32) -> Option<Impact> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.to == to)
            .map(|t| t.impact)
    }

    pub fn belt_label(&self, code: u32) -> Option<&str> {
        self.belts.iter().find(|b| b.code == code).map(|b| b.desc.as_str())
    }

    pub fn land_cover_label(&self, code: u32) -> Option<&str> {
        self.land_cover.iter().find(|c| c.code == code).map(|c| c.desc.as_str())
    }

    pub fn country(&self, iso31661: &str) -> Option<&Country> {
        self.countries.iter().find(|c| c.iso31661.eq_ignore_ascii_case(iso31661))
    }
}

fn read_table<T: DeserializeOwned>(table: &str, text: &str, delimiter: u8) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    reader
        .deserialize()
        .map(|record| {
            record.map_err(|e| Error::Reference { table: table.to_string(), reason: e.to_string() })
        })
        .collect()
}
