//! Sub-indicator B year planning.
//!
//! A sub-B run compares a baseline pair of land-cover assets with one or more
//! later report assets. Every report asset produces its own three-year
//! transition request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::years::{years_label, YearSpec};

/// Baseline pair chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub base: YearSpec,
    pub report: YearSpec,
}

/// User selection for sub-indicator B.
///
/// Serialised the way the selection form produces it: a `baseline` entry
/// next to numbered report entries, e.g.
/// `{"baseline": {"base": …, "report": …}, "2": {…}, "3": {…}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubBSelection {
    pub baseline: Baseline,
    #[serde(flatten)]
    pub reports: BTreeMap<String, YearSpec>,
}

impl SubBSelection {
    /// Report entries ordered by year, then by their numeric key.
    pub fn ordered_reports(&self) -> Vec<(&str, &YearSpec)> {
        let mut reports: Vec<(&str, &YearSpec)> =
            self.reports.iter().map(|(k, v)| (k.as_str(), v)).collect();
        reports.sort_by_key(|(key, spec)| (spec.year, key.parse::<u64>().unwrap_or(u64::MAX), *key));
        reports
    }
}

/// One land-cover transition computation for the external engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub base: YearSpec,
    pub report: YearSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<YearSpec>,
}

impl TransitionRequest {
    /// Years must be strictly increasing.
    pub fn new(base: YearSpec, report: YearSpec, extra: Option<YearSpec>) -> Result<Self> {
        let request = Self { base, report, extra };
        let years: Vec<i32> = request.years().iter().map(|y| y.year).collect();
        if years.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidYearSet(format!(
                "transition years must be strictly increasing, got {years:?}"
            )));
        }
        Ok(request)
    }

    pub fn years(&self) -> Vec<&YearSpec> {
        let mut years = vec![&self.base, &self.report];
        years.extend(self.extra.as_ref());
        years
    }

    /// Engine label, e.g. `2000_2015_2018`.
    pub fn label(&self) -> String {
        let owned: Vec<YearSpec> = self.years().into_iter().cloned().collect();
        years_label(&owned)
    }
}

/// Which sub-B result a report row is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubBTarget {
    /// `[base, report]` of the baseline period.
    Baseline([i32; 2]),
    /// `[baseline report, report]` of a later period.
    Report([i32; 2]),
}

impl SubBTarget {
    pub fn years(&self) -> [i32; 2] {
        match self {
            SubBTarget::Baseline(y) | SubBTarget::Report(y) => *y,
        }
    }

    /// `2000-2015` style period label.
    pub fn period_label(&self) -> String {
        let [from, to] = self.years();
        format!("{from}-{to}")
    }
}

/// One request per report entry: `(baseline.base, baseline.report, report)`.
///
/// Repeated report years are not merged.
pub fn assemble(selection: &SubBSelection) -> Result<Vec<TransitionRequest>> {
    selection
        .ordered_reports()
        .into_iter()
        .map(|(_, extra)| {
            TransitionRequest::new(
                selection.baseline.base.clone(),
                selection.baseline.report.clone(),
                Some(extra.clone()),
            )
        })
        .collect()
}

/// Choices offered to the caller: the baseline pair first, then one
/// `(baseline report, extra)` pair per request. Labels and values are
/// index-aligned.
pub fn items_for_selection(requests: &[TransitionRequest]) -> (Vec<String>, Vec<SubBTarget>) {
    let Some(first) = requests.first() else {
        return (Vec::new(), Vec::new());
    };

    let baseline = [first.base.year, first.report.year];
    let mut values = vec![SubBTarget::Baseline(baseline)];
    values.extend(
        requests
            .iter()
            .filter_map(|r| r.extra.as_ref())
            .map(|extra| SubBTarget::Report([baseline[1], extra.year])),
    );

    let labels = values
        .iter()
        .map(|v| v.years().iter().map(|y| y.to_string()).collect::<Vec<_>>().join(" -> "))
        .collect();

    (labels, values)
}

/// Every `[base, report]` baseline pair across several named selections.
pub fn baseline_pairs<'a>(
    selections: impl IntoIterator<Item = &'a SubBSelection>,
) -> Vec<[YearSpec; 2]> {
    selections
        .into_iter()
        .map(|s| [s.baseline.base.clone(), s.baseline.report.clone()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(year: i32) -> YearSpec {
        YearSpec::new(year, format!("asset/{year}"))
    }

    fn selection(extras: &[(&str, i32)]) -> SubBSelection {
        SubBSelection {
            baseline: Baseline { base: spec(2000), report: spec(2015) },
            reports: extras.iter().map(|(k, y)| (k.to_string(), spec(*y))).collect(),
        }
    }

    #[test]
    fn one_request_per_report_entry() {
        let requests = assemble(&selection(&[("2", 2018), ("3", 2019)])).unwrap();
        let years: Vec<Vec<i32>> = requests
            .iter()
            .map(|r| r.years().iter().map(|y| y.year).collect())
            .collect();
        assert_eq!(years, vec![vec![2000, 2015, 2018], vec![2000, 2015, 2019]]);
        assert_eq!(requests[0].label(), "2000_2015_2018");
    }

    #[test]
    fn repeated_report_years_are_kept() {
        let requests = assemble(&selection(&[("2", 2018), ("3", 2018)])).unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn numeric_keys_order_numerically_within_a_year() {
        let sel = selection(&[("10", 2020), ("2", 2020), ("3", 2016)]);
        let keys: Vec<&str> = sel.ordered_reports().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["3", "2", "10"]);
    }

    #[test]
    fn report_before_baseline_is_rejected() {
        let err = assemble(&selection(&[("2", 2010)])).unwrap_err();
        assert!(matches!(err, Error::InvalidYearSet(_)));
    }

    #[test]
    fn selection_items_chain_from_baseline_report() {
        let requests = assemble(&selection(&[("2", 2018), ("3", 2019)])).unwrap();
        let (labels, values) = items_for_selection(&requests);

        assert_eq!(labels, vec!["2000 -> 2015", "2015 -> 2018", "2015 -> 2019"]);
        assert_eq!(
            values,
            vec![
                SubBTarget::Baseline([2000, 2015]),
                SubBTarget::Report([2015, 2018]),
                SubBTarget::Report([2015, 2019]),
            ]
        );
    }

    #[test]
    fn no_requests_no_items() {
        let (labels, values) = items_for_selection(&[]);
        assert!(labels.is_empty() && values.is_empty());
    }

    #[test]
    fn selection_deserialises_from_form_shape() {
        let json = r#"{
            "2": {"asset": "asset/2018", "year": 2018},
            "3": {"asset": "asset/2019", "year": "2019"},
            "baseline": {
                "base": {"asset": "asset/2000", "year": 2000},
                "report": {"asset": "asset/2015", "year": 2015}
            }
        }"#;
        let sel: SubBSelection = serde_json::from_str(json).unwrap();
        assert_eq!(sel, selection(&[("2", 2018), ("3", 2019)]));
        assert_eq!(baseline_pairs([&sel]), vec![[spec(2000), spec(2015)]]);
    }

    #[test]
    fn target_serialises_as_tagged_pair() {
        let json = serde_json::to_string(&SubBTarget::Report([2015, 2018])).unwrap();
        assert_eq!(json, r#"{"report":[2015,2018]}"#);
        assert_eq!(SubBTarget::Baseline([2000, 2015]).period_label(), "2000-2015");
    }
}
