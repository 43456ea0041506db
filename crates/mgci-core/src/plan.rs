//! Decide which aggregations to request from the engine for one run.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ReferenceConfig;
use crate::error::Result;
use crate::result::{split_variant, variant_label};
use crate::transitions::{assemble, items_for_selection, SubBSelection, SubBTarget, TransitionRequest};
use crate::years::{resolve_break_points, sub_a_requests, years_label, BreakPoint, YearSpec};

/// Which indicator a request serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    SubA,
    SubB,
}

/// One aggregation the engine must compute, keyed by its result label.
///
/// Requests covering the same years with different assets share a year label
/// and are told apart by a variant suffix (`2010`, `2010#1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRequest {
    pub label: String,
    pub indicator: Indicator,
    pub years: Vec<YearSpec>,
}

/// Everything decided before the engine runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationPlan {
    /// Sub-A reporting periods and how each is served.
    pub break_points: BTreeMap<i32, BreakPoint>,
    pub transitions: Vec<TransitionRequest>,
    /// Result label of each entry of `transitions`, index-aligned.
    pub transition_labels: Vec<String>,
    /// Sub-B periods offered for reporting, baseline first.
    pub sub_b_targets: Vec<SubBTarget>,
    /// Deduplicated on their full asset list; sub-A singletons first, then
    /// sub-B triples.
    pub requests: Vec<EngineRequest>,
}

impl CalculationPlan {
    /// Sub-A periods that can be reported (every resolved, non-edge period).
    pub fn sub_a_years(&self) -> Vec<i32> {
        self.break_points
            .iter()
            .filter(|(_, bp)| !matches!(bp, BreakPoint::Unresolvable))
            .map(|(year, _)| *year)
            .collect()
    }

    /// Variant of the result serving the `index`-th sub-B target. The baseline
    /// target reads the first transition result.
    pub fn sub_b_variant(&self, index: usize) -> usize {
        index
            .checked_sub(1)
            .and_then(|i| self.transition_labels.get(i))
            .map_or(0, |label| split_variant(label).1)
    }
}

/// Assigns labels, merging requests only when their assets are identical.
#[derive(Default)]
struct RequestBook {
    by_years: BTreeMap<Vec<YearSpec>, String>,
    variants: HashMap<String, usize>,
}

impl RequestBook {
    /// Label for `years`, and whether the request is new.
    fn label(&mut self, years: &[YearSpec]) -> (String, bool) {
        if let Some(label) = self.by_years.get(years) {
            return (label.clone(), false);
        }
        let base = years_label(years);
        let next = self.variants.entry(base.clone()).or_insert(0);
        let label = variant_label(&base, *next);
        *next += 1;
        self.by_years.insert(years.to_vec(), label.clone());
        (label, true)
    }
}

/// Plan a run. Either indicator may be skipped.
pub fn plan_calculation(
    config: &ReferenceConfig,
    sub_a: Option<&[YearSpec]>,
    sub_b: Option<&SubBSelection>,
) -> Result<CalculationPlan> {
    let mut plan = CalculationPlan::default();
    let mut book = RequestBook::default();

    if let Some(available) = sub_a {
        plan.break_points = resolve_break_points(config, available)?;
        for spec in sub_a_requests(&plan.break_points) {
            let years = vec![spec];
            let (label, new) = book.label(&years);
            if new {
                plan.requests.push(EngineRequest { label, indicator: Indicator::SubA, years });
            }
        }
    }

    if let Some(selection) = sub_b {
        plan.transitions = assemble(selection)?;
        plan.sub_b_targets = items_for_selection(&plan.transitions).1;
        for request in &plan.transitions {
            let years: Vec<YearSpec> = request.years().into_iter().cloned().collect();
            let (label, new) = book.label(&years);
            plan.transition_labels.push(label.clone());
            if new {
                plan.requests.push(EngineRequest { label, indicator: Indicator::SubB, years });
            }
        }
    }

    info!(
        sub_a_periods = plan.break_points.len(),
        transitions = plan.transitions.len(),
        requests = plan.requests.len(),
        "calculation planned"
    );
    Ok(plan)
}
