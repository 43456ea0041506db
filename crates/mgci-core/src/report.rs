//! SDG 15.4.2 report tables.
//!
//! Sub-A periods feed three tables (mountain area, land-cover area, green
//! cover index), sub-B periods two (degraded area, degraded proportion). Rows
//! follow the SDMX-style column layout used for the global database.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{AreaUnit, GeoArea, Impact, ReferenceConfig};
use crate::dispatch::{resolve_sub_a_value, resolve_sub_b_variant};
use crate::error::{Error, Result};
use crate::plan::CalculationPlan;
use crate::result::{AreaRow, ResultSet, TransitionRow};
use crate::transitions::SubBTarget;

// ── Sheet names ───────────────────────────────────────────────────────────────

pub const SHEET_TOTL: &str = "Table1_ER_MTN_TOTL";
pub const SHEET_GRNCOV: &str = "Table2_ER_MTN_GRNCOV";
pub const SHEET_GRNCVI: &str = "Table3_ER_MTN_GRNCVI";
pub const SHEET_DGRDA: &str = "Table4_ER_MTN_DGRDA";
pub const SHEET_DGRDP: &str = "Table5_ER_MTN_DGRDP";

const TOTAL_BELT: &str = "Total";
const PERCENT: &str = "PT";

// ── Cells and tables ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Number(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

/// A named sheet with a fixed column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; its width must match the declared columns.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::SchemaMismatch(format!(
                "{}: row has {} cells, table has {} columns",
                self.name,
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Header values shared by every row of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportContext {
    pub geo_area: GeoArea,
    pub unit: AreaUnit,
}

const SUB_A_COLUMNS: [&str; 8] = [
    "SERIES",
    "REF_AREA",
    "GEOAREANAME",
    "TIME_PERIOD",
    "BIOCLIMATIC_BELT",
    "OBS_VALUE",
    "UNIT_MEASURE",
    "OBS_STATUS",
];

const GRNCOV_COLUMNS: [&str; 9] = [
    "SERIES",
    "REF_AREA",
    "GEOAREANAME",
    "TIME_PERIOD",
    "BIOCLIMATIC_BELT",
    "LAND_COVER",
    "OBS_VALUE",
    "UNIT_MEASURE",
    "OBS_STATUS",
];

/// Observation status: `A` normal value, `E` estimated by interpolation.
fn obs_status(interpolated: bool) -> &'static str {
    if interpolated {
        "E"
    } else {
        "A"
    }
}

fn round_to(v: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (v * scale).round() / scale
}

fn ratio_percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

struct RowHead<'a> {
    ctx: &'a ReportContext,
    period: Cell,
    status: &'static str,
}

impl RowHead<'_> {
    fn row(&self, sheet: &str, belt: &str, extra: Option<&str>, value: f64, unit: &str) -> Vec<Cell> {
        let mut row = vec![
            Cell::from(series_code(sheet)),
            Cell::from(self.ctx.geo_area.m49.as_str()),
            Cell::from(self.ctx.geo_area.name.as_str()),
            self.period.clone(),
            Cell::from(belt),
        ];
        row.extend(extra.map(Cell::from));
        row.extend([Cell::from(value), Cell::from(unit), Cell::from(self.status)]);
        row
    }
}

/// `Table1_ER_MTN_TOTL` -> `ER_MTN_TOTL`.
pub fn series_code(sheet: &str) -> &str {
    sheet.split_once('_').map_or(sheet, |(_, series)| series)
}

fn belt_name(config: &ReferenceConfig, code: u32) -> String {
    config.belt_label(code).map(str::to_string).unwrap_or_else(|| code.to_string())
}

fn sum_by_belt<'a>(rows: impl Iterator<Item = (u32, f64)> + 'a) -> BTreeMap<u32, f64> {
    let mut totals = BTreeMap::new();
    for (belt, sum) in rows {
        *totals.entry(belt).or_insert(0.0) += sum;
    }
    totals
}

// ── Sub-A tables ──────────────────────────────────────────────────────────────

/// Per-year sub-A tables: mountain area, land-cover area and green cover index.
pub struct SubATables {
    pub totl: ReportTable,
    pub grncov: ReportTable,
    pub grncvi: ReportTable,
}

impl SubATables {
    pub fn new() -> Self {
        Self {
            totl: ReportTable::new(SHEET_TOTL, &SUB_A_COLUMNS),
            grncov: ReportTable::new(SHEET_GRNCOV, &GRNCOV_COLUMNS),
            grncvi: ReportTable::new(SHEET_GRNCVI, &SUB_A_COLUMNS),
        }
    }

    /// Append the rows of one reporting year.
    pub fn add_year(
        &mut self,
        config: &ReferenceConfig,
        ctx: &ReportContext,
        year: i32,
        interpolated: bool,
        rows: &[AreaRow],
    ) -> Result<()> {
        let head = RowHead { ctx, period: Cell::Int(i64::from(year)), status: obs_status(interpolated) };
        let factor = ctx.unit.factor();
        let unit = ctx.unit.sdmx_code();

        let total_by_belt = sum_by_belt(rows.iter().map(|r| (r.belt_class, r.sum)));
        let green_by_belt = sum_by_belt(
            rows.iter()
                .filter(|r| config.is_green(r.lc_class))
                .map(|r| (r.belt_class, r.sum)),
        );

        for (&belt, &total) in &total_by_belt {
            let name = belt_name(config, belt);
            let green = green_by_belt.get(&belt).copied().unwrap_or(0.0);
            self.totl.push_row(head.row(SHEET_TOTL, &name, None, round_to(total / factor, 4), unit))?;
            self.grncvi
                .push_row(head.row(SHEET_GRNCVI, &name, None, round_to(ratio_percent(green, total), 4), PERCENT))?;
        }

        let total: f64 = total_by_belt.values().sum();
        let green: f64 = green_by_belt.values().sum();
        self.totl.push_row(head.row(SHEET_TOTL, TOTAL_BELT, None, round_to(total / factor, 4), unit))?;
        self.grncvi
            .push_row(head.row(SHEET_GRNCVI, TOTAL_BELT, None, round_to(ratio_percent(green, total), 4), PERCENT))?;

        for row in rows {
            let lc = config
                .land_cover_label(row.lc_class)
                .map(str::to_string)
                .unwrap_or_else(|| row.lc_class.to_string());
            self.grncov.push_row(head.row(
                SHEET_GRNCOV,
                &belt_name(config, row.belt_class),
                Some(lc.as_str()),
                round_to(row.sum / factor, 4),
                unit,
            ))?;
        }
        Ok(())
    }
}

impl Default for SubATables {
    fn default() -> Self {
        Self::new()
    }
}

// ── Sub-B tables ──────────────────────────────────────────────────────────────

/// Per-period sub-B tables: degraded area and degraded proportion.
pub struct SubBTables {
    pub dgrda: ReportTable,
    pub dgrdp: ReportTable,
}

impl SubBTables {
    pub fn new() -> Self {
        Self {
            dgrda: ReportTable::new(SHEET_DGRDA, &SUB_A_COLUMNS),
            dgrdp: ReportTable::new(SHEET_DGRDP, &SUB_A_COLUMNS),
        }
    }

    pub fn add_period(
        &mut self,
        config: &ReferenceConfig,
        ctx: &ReportContext,
        target: SubBTarget,
        rows: &[TransitionRow],
    ) -> Result<()> {
        let head = RowHead { ctx, period: Cell::Text(target.period_label()), status: obs_status(false) };
        let factor = ctx.unit.factor();
        let unit = ctx.unit.sdmx_code();

        let total_by_belt = sum_by_belt(rows.iter().map(|r| (r.belt_class, r.sum)));
        let degraded_by_belt = sum_by_belt(
            rows.iter()
                .filter(|r| config.impact(r.from_lc(), r.to_lc()) == Some(Impact::Degradation))
                .map(|r| (r.belt_class, r.sum)),
        );

        for (&belt, &total) in &total_by_belt {
            let name = belt_name(config, belt);
            let degraded = degraded_by_belt.get(&belt).copied().unwrap_or(0.0);
            self.dgrda.push_row(head.row(SHEET_DGRDA, &name, None, round_to(degraded / factor, 4), unit))?;
            self.dgrdp
                .push_row(head.row(SHEET_DGRDP, &name, None, round_to(ratio_percent(degraded, total), 4), PERCENT))?;
        }

        let total: f64 = total_by_belt.values().sum();
        let degraded: f64 = degraded_by_belt.values().sum();
        self.dgrda.push_row(head.row(SHEET_DGRDA, TOTAL_BELT, None, round_to(degraded / factor, 4), unit))?;
        self.dgrdp
            .push_row(head.row(SHEET_DGRDP, TOTAL_BELT, None, round_to(ratio_percent(degraded, total), 4), PERCENT))?;
        Ok(())
    }
}

impl Default for SubBTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Build all five tables for a planned run, in sheet order.
pub fn build_reports(
    config: &ReferenceConfig,
    ctx: &ReportContext,
    results: &ResultSet,
    plan: &CalculationPlan,
) -> Result<Vec<ReportTable>> {
    let mut sub_a = SubATables::new();
    for year in plan.sub_a_years() {
        info!(year, "reporting sub-A");
        let rows = resolve_sub_a_value(results, &plan.break_points, year)?;
        let interpolated = plan.break_points.get(&year).is_some_and(|bp| bp.is_interpolated());
        sub_a.add_year(config, ctx, year, interpolated, &rows)?;
    }

    let mut sub_b = SubBTables::new();
    for (index, &target) in plan.sub_b_targets.iter().enumerate() {
        info!(period = %target.period_label(), "reporting sub-B");
        let rows = resolve_sub_b_variant(results, target, plan.sub_b_variant(index))?;
        sub_b.add_period(config, ctx, target, &rows)?;
    }

    Ok(vec![sub_a.totl, sub_a.grncov, sub_a.grncvi, sub_b.dgrda, sub_b.dgrdp])
}
