//! Serve a reporting year or period from the engine results.
//!
//! Sub-A years come straight from a single-year result or are interpolated
//! between the two results that bracket them. Sub-B periods are read from the
//! three-year transition result that covers them.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::interpolate::interpolate;
use crate::result::{label_years, parse_area, split_variant, parse_transitions, AreaRow, ResultSet, TransitionCategory, TransitionRow};
use crate::transitions::SubBTarget;
use crate::years::BreakPoint;

/// Area rows for one sub-A reporting year.
pub fn resolve_sub_a_value(
    results: &ResultSet,
    break_points: &BTreeMap<i32, BreakPoint>,
    year: i32,
) -> Result<Vec<AreaRow>> {
    if let Some(result) = results.get(&year.to_string()) {
        debug!(year, "serving sub-A year from direct result");
        return parse_area(result);
    }

    match break_points.get(&year) {
        Some(BreakPoint::Bracket(below, above)) => {
            debug!(year, below = below.year, above = above.year, "interpolating sub-A year");
            let df1 = direct_area(results, below.year)?;
            let df2 = direct_area(results, above.year)?;
            interpolate(&df1, &df2, below.year, above.year, year)
        }
        // Planned as a direct year, but the engine result never arrived.
        Some(BreakPoint::Exact(_)) => Err(Error::ResultNotFound(format!("sub-A year {year}"))),
        Some(BreakPoint::Unresolvable) | None => Err(Error::UnschedulableYear(year)),
    }
}

fn direct_area(results: &ResultSet, year: i32) -> Result<Vec<AreaRow>> {
    let label = year.to_string();
    let result = results
        .get(&label)
        .ok_or_else(|| Error::ResultNotFound(format!("sub-A year {year}")))?;
    parse_area(result)
}

/// Transition rows for one sub-B period.
///
/// A baseline target reads the `baseline_transition` rows of the result whose
/// label starts with the baseline pair; a report target reads the
/// `report_transition` rows of the three-year result ending in its report
/// year. No matching result is [`Error::ResultNotFound`].
pub fn resolve_sub_b_value(results: &ResultSet, target: SubBTarget) -> Result<Vec<TransitionRow>> {
    resolve_sub_b_variant(results, target, 0)
}

/// Like [`resolve_sub_b_value`], reading the result with the given label
/// variant when several requests cover the same years.
pub fn resolve_sub_b_variant(
    results: &ResultSet,
    target: SubBTarget,
    variant: usize,
) -> Result<Vec<TransitionRow>> {
    let category = match target {
        SubBTarget::Baseline(_) => TransitionCategory::BaselineTransition,
        SubBTarget::Report(_) => TransitionCategory::ReportTransition,
    };

    let result = results
        .multi_year()
        .find(|r| split_variant(r.label()).1 == variant && covers(target, &label_years(r.label())))
        .ok_or_else(|| {
            Error::ResultNotFound(format!("sub-B period {} (variant {variant})", target.period_label()))
        })?;
    debug!(label = result.label(), ?target, "serving sub-B period");

    Ok(parse_transitions(result)?
        .into_iter()
        .filter(|row| row.category == category)
        .collect())
}

fn covers(target: SubBTarget, years: &[i32]) -> bool {
    match target {
        SubBTarget::Baseline([base, report]) => years.starts_with(&[base, report]),
        SubBTarget::Report([_, report]) => years.len() >= 3 && years.last() == Some(&report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReferenceConfig;
    use crate::result::AggregationResult;
    use crate::years::{resolve_break_points, YearSpec};
    use approx::assert_relative_eq;
    use serde_json::json;

    fn single(label: &str, forest: f64, grass: f64) -> AggregationResult {
        AggregationResult::from_value(
            label,
            json!({"groups": [{"group": 1, "groups": [
                {"group": 1, "sum": forest},
                {"group": 2, "sum": grass}
            ]}]}),
        )
        .unwrap()
    }

    fn triple(label: &str) -> AggregationResult {
        AggregationResult::from_value(
            label,
            json!({"groups": {
                "baseline_transition": [{"group": 1, "groups": [{"group": 101, "sum": 5.0}, {"group": 103, "sum": 1.0}]}],
                "report_transition": [{"group": 1, "groups": [{"group": 305, "sum": 2.0}]}]
            }}),
        )
        .unwrap()
    }

    fn fixture() -> (ResultSet, BTreeMap<i32, BreakPoint>) {
        let config = ReferenceConfig::builtin().unwrap().with_reporting_periods([2010, 2015]);
        let available: Vec<YearSpec> =
            [2009, 2011, 2015].iter().map(|&y| YearSpec::new(y, format!("lc/{y}"))).collect();
        let bps = resolve_break_points(&config, &available).unwrap();
        let results = [single("2009", 10.0, 100.0), single("2011", 20.0, 80.0), single("2015", 30.0, 70.0)]
            .into_iter()
            .collect();
        (results, bps)
    }

    #[test]
    fn direct_year_is_parsed_as_is() {
        let (results, bps) = fixture();
        let rows = resolve_sub_a_value(&results, &bps, 2015).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sum, 30.0);
    }

    #[test]
    fn bracketed_year_is_interpolated() {
        let (results, bps) = fixture();
        let rows = resolve_sub_a_value(&results, &bps, 2010).unwrap();
        assert_relative_eq!(rows[0].sum, 15.0);
        assert_relative_eq!(rows[1].sum, 90.0);
    }

    #[test]
    fn year_without_plan_is_unschedulable() {
        let (results, bps) = fixture();
        let err = resolve_sub_a_value(&results, &bps, 2005).unwrap_err();
        assert!(matches!(err, Error::UnschedulableYear(2005)));
    }

    #[test]
    fn missing_bracket_result_is_not_found() {
        let (results, bps) = fixture();
        let partial: ResultSet = results.iter().filter(|r| r.label() != "2011").cloned().collect();
        let err = resolve_sub_a_value(&partial, &bps, 2010).unwrap_err();
        assert!(matches!(err, Error::ResultNotFound(_)), "got {err:?}");
    }

    #[test]
    fn baseline_target_keeps_baseline_rows() {
        let results: ResultSet = [triple("2000_2015_2018")].into_iter().collect();
        let rows = resolve_sub_b_value(&results, SubBTarget::Baseline([2000, 2015])).unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.category == TransitionCategory::BaselineTransition));
        assert_eq!((rows[1].from_lc(), rows[1].to_lc()), (1, 3));
    }

    #[test]
    fn report_target_matches_its_report_year() {
        let results: ResultSet = [triple("2000_2015_2018"), triple("2000_2015_2019")].into_iter().collect();
        let rows = resolve_sub_b_value(&results, SubBTarget::Report([2015, 2019])).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, TransitionCategory::ReportTransition);
        assert_eq!((rows[0].from_lc(), rows[0].to_lc()), (3, 5));
    }

    #[test]
    fn uncomputed_period_is_an_explicit_absence() {
        let results: ResultSet = [triple("2000_2015_2018")].into_iter().collect();
        let err = resolve_sub_b_value(&results, SubBTarget::Report([2015, 2021])).unwrap_err();
        assert!(matches!(err, Error::ResultNotFound(ref what) if what.contains("2015-2021")));

        let err = resolve_sub_b_value(&results, SubBTarget::Baseline([2005, 2015])).unwrap_err();
        assert!(matches!(err, Error::ResultNotFound(_)));
    }

    #[test]
    fn variant_picks_between_same_year_results() {
        let other = AggregationResult::from_value(
            "2000_2015_2018#1",
            json!({"groups": {
                "baseline_transition": [{"group": 1, "groups": [{"group": 101, "sum": 5.0}]}],
                "report_transition": [{"group": 2, "groups": [{"group": 505, "sum": 9.0}]}]
            }}),
        )
        .unwrap();
        let results: ResultSet = [triple("2000_2015_2018"), other].into_iter().collect();

        let first = resolve_sub_b_value(&results, SubBTarget::Report([2015, 2018])).unwrap();
        assert_eq!(first[0].transition, 305);
        let second = resolve_sub_b_variant(&results, SubBTarget::Report([2015, 2018]), 1).unwrap();
        assert_eq!((second[0].belt_class, second[0].transition), (2, 505));
        assert!(resolve_sub_b_variant(&results, SubBTarget::Report([2015, 2018]), 2).is_err());
    }
}
