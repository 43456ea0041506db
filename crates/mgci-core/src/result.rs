//! Aggregation results returned by the zonal statistics engine.
//!
//! The engine groups area sums by belt and then by land-cover class (sub-A)
//! or by belt and transition code per category (sub-B). Each document is
//! wrapped in a versioned envelope:
//!
//! ```json
//! {"schema_version": 1, "groups": [{"group": 1, "groups": [{"group": 2, "sum": 10.5}]}]}
//! {"schema_version": 1, "groups": {"baseline_transition": [{"group": 1, "groups": [{"group": 101, "sum": 3.0}]}]}}
//! ```
//!
//! Documents are decoded into a typed tree up front, so a missing `group`,
//! `groups` or `sum` surfaces as [`Error::MalformedResult`] before any row is
//! produced.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: u32 = 1;

/// Separator between years in a result label.
pub const LABEL_SEPARATOR: char = '_';

/// Separates a year label from its variant number when several requests
/// cover the same years with different assets (`2010`, `2010#1`).
pub const VARIANT_SEPARATOR: char = '#';

// ── Tree ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSum {
    pub group: u32,
    pub sum: f64,
}

/// Sub-A: one bioclimatic belt and its per-class area sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeltGroup {
    pub group: u32,
    pub groups: Vec<ClassSum>,
}

/// Area sum for one transition code (`from * 100 + to`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSum {
    pub group: u32,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeltTransitions {
    pub group: u32,
    pub groups: Vec<TransitionSum>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCategory {
    BaselineTransition,
    ReportTransition,
}

impl TransitionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionCategory::BaselineTransition => "baseline_transition",
            TransitionCategory::ReportTransition => "report_transition",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroups {
    pub category: TransitionCategory,
    pub belts: Vec<BeltTransitions>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationTree {
    Single(Vec<BeltGroup>),
    /// Categories in document order.
    Double(Vec<CategoryGroups>),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default = "default_version")]
    schema_version: u32,
    groups: Value,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

/// One labelled engine result.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    label: String,
    tree: AggregationTree,
}

impl AggregationResult {
    pub fn new(label: impl Into<String>, tree: AggregationTree) -> Self {
        Self { label: label.into(), tree }
    }

    /// Decode an engine document. Single-year labels (`2015`) hold a
    /// single-level tree, multi-year labels (`2000_2015_2018`) a double-level one.
    pub fn from_json(label: &str, text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| malformed(label, e))?;
        Self::from_value(label, value)
    }

    pub fn from_value(label: &str, value: Value) -> Result<Self> {
        let envelope: Envelope = serde_json::from_value(value).map_err(|e| malformed(label, e))?;
        if envelope.schema_version != SCHEMA_VERSION {
            return Err(malformed(
                label,
                format!(
                    "schema_version {} is not supported (expected {SCHEMA_VERSION})",
                    envelope.schema_version
                ),
            ));
        }

        let tree = if is_single_label(label) {
            AggregationTree::Single(serde_json::from_value(envelope.groups).map_err(|e| malformed(label, e))?)
        } else {
            AggregationTree::Double(decode_categories(label, envelope.groups)?)
        };
        debug!(label, "decoded aggregation result");
        Ok(Self::new(label, tree))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tree(&self) -> &AggregationTree {
        &self.tree
    }

    pub fn is_single(&self) -> bool {
        matches!(self.tree, AggregationTree::Single(_))
    }
}

fn decode_categories(label: &str, groups: Value) -> Result<Vec<CategoryGroups>> {
    let Value::Object(map) = groups else {
        return Err(malformed(label, "expected an object keyed by transition category"));
    };
    map.into_iter()
        .map(|(key, belts)| {
            let category: TransitionCategory = serde_json::from_value(Value::String(key.clone()))
                .map_err(|_| malformed(label, format!("unknown transition category '{key}'")))?;
            let belts: Vec<BeltTransitions> =
                serde_json::from_value(belts).map_err(|e| malformed(label, format!("{key}: {e}")))?;
            Ok(CategoryGroups { category, belts })
        })
        .collect()
}

fn malformed(label: &str, reason: impl ToString) -> Error {
    Error::MalformedResult { label: label.to_string(), reason: reason.to_string() }
}

pub fn is_single_label(label: &str) -> bool {
    !split_variant(label).0.contains(LABEL_SEPARATOR)
}

/// Years encoded in a label. Non-numeric segments are skipped.
pub fn label_years(label: &str) -> Vec<i32> {
    split_variant(label)
        .0
        .split(LABEL_SEPARATOR)
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// `2010` for variant 0, `2010#2` for variant 2.
pub fn variant_label(base: &str, variant: usize) -> String {
    if variant == 0 {
        base.to_string()
    } else {
        format!("{base}{VARIANT_SEPARATOR}{variant}")
    }
}

/// Year part and variant number of a label. A missing or unreadable suffix
/// is variant 0.
pub fn split_variant(label: &str) -> (&str, usize) {
    match label.split_once(VARIANT_SEPARATOR) {
        Some((base, variant)) => (base, variant.parse().unwrap_or(0)),
        None => (label, 0),
    }
}

// ── ResultSet ─────────────────────────────────────────────────────────────────

/// Engine results keyed by label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    results: BTreeMap<String, AggregationResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the result with the same label.
    pub fn insert(&mut self, result: AggregationResult) {
        self.results.insert(result.label.clone(), result);
    }

    pub fn insert_json(&mut self, label: &str, text: &str) -> Result<()> {
        self.insert(AggregationResult::from_json(label, text)?);
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&AggregationResult> {
        self.results.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.results.contains_key(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggregationResult> {
        self.results.values()
    }

    /// Results whose label spans several years.
    pub fn multi_year(&self) -> impl Iterator<Item = &AggregationResult> {
        self.results.values().filter(|r| !is_single_label(&r.label))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl FromIterator<AggregationResult> for ResultSet {
    fn from_iter<I: IntoIterator<Item = AggregationResult>>(iter: I) -> Self {
        let mut set = ResultSet::new();
        for result in iter {
            set.insert(result);
        }
        set
    }
}

// ── Flat rows ─────────────────────────────────────────────────────────────────

/// Sub-A row: area of one land-cover class inside one belt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRow {
    pub belt_class: u32,
    pub lc_class: u32,
    pub sum: f64,
}

/// Sub-B row: area of one transition inside one belt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRow {
    pub category: TransitionCategory,
    pub belt_class: u32,
    pub transition: u32,
    pub sum: f64,
}

impl TransitionRow {
    pub fn from_lc(&self) -> u32 {
        self.transition / 100
    }

    pub fn to_lc(&self) -> u32 {
        self.transition % 100
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlatRows {
    Area(Vec<AreaRow>),
    Transition(Vec<TransitionRow>),
}

/// Flatten a result into rows, in document order.
///
/// `single` states the shape the caller expects; a result of the other shape
/// is malformed.
pub fn parse(result: &AggregationResult, single: bool) -> Result<FlatRows> {
    if single != result.is_single() {
        let expected = if single { "single-level" } else { "double-level" };
        return Err(malformed(&result.label, format!("caller expected a {expected} tree")));
    }
    if single {
        parse_area(result).map(FlatRows::Area)
    } else {
        parse_transitions(result).map(FlatRows::Transition)
    }
}

/// One row per (belt, class).
pub fn parse_area(result: &AggregationResult) -> Result<Vec<AreaRow>> {
    let AggregationTree::Single(belts) = &result.tree else {
        return Err(malformed(&result.label, "expected a single-level belt/class tree"));
    };
    Ok(belts
        .iter()
        .flat_map(|belt| {
            belt.groups.iter().map(move |class| AreaRow {
                belt_class: belt.group,
                lc_class: class.group,
                sum: class.sum,
            })
        })
        .collect())
}

/// One row per (category, belt, transition).
pub fn parse_transitions(result: &AggregationResult) -> Result<Vec<TransitionRow>> {
    let AggregationTree::Double(categories) = &result.tree else {
        return Err(malformed(&result.label, "expected a double-level category/belt/transition tree"));
    };
    Ok(categories
        .iter()
        .flat_map(|cat| {
            cat.belts.iter().flat_map(move |belt| {
                belt.groups.iter().map(move |t| TransitionRow {
                    category: cat.category,
                    belt_class: belt.group,
                    transition: t.group,
                    sum: t.sum,
                })
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_doc() -> Value {
        json!({
            "schema_version": 1,
            "groups": [
                {"group": 1, "groups": [{"group": 1, "sum": 10.0}, {"group": 2, "sum": 20.0}]},
                {"group": 2, "groups": [{"group": 1, "sum": 30.0}, {"group": 2, "sum": 40.0}]}
            ]
        })
    }

    fn double_doc() -> Value {
        json!({
            "groups": {
                "report_transition": [
                    {"group": 3, "groups": [{"group": 105, "sum": 1.5}]}
                ],
                "baseline_transition": [
                    {"group": 1, "groups": [{"group": 101, "sum": 7.0}, {"group": 102, "sum": 2.0}]}
                ]
            }
        })
    }

    #[test]
    fn single_level_two_by_two_gives_four_rows() {
        let result = AggregationResult::from_value("2015", single_doc()).unwrap();
        let rows = parse_area(&result).unwrap();

        assert_eq!(rows.len(), 4);
        let triples: Vec<(u32, u32, f64)> = rows.iter().map(|r| (r.belt_class, r.lc_class, r.sum)).collect();
        assert_eq!(
            triples,
            vec![(1, 1, 10.0), (1, 2, 20.0), (2, 1, 30.0), (2, 2, 40.0)]
        );
    }

    #[test]
    fn double_level_keeps_document_order() {
        let result = AggregationResult::from_value("2000_2015_2018", double_doc()).unwrap();
        let rows = parse_transitions(&result).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].category, TransitionCategory::ReportTransition);
        assert_eq!(rows[0].belt_class, 3);
        assert_eq!((rows[0].from_lc(), rows[0].to_lc()), (1, 5));
        assert_eq!(rows[1].category, TransitionCategory::BaselineTransition);
        assert_eq!(rows[2].transition, 102);
    }

    #[test]
    fn missing_sum_is_malformed() {
        let doc = json!({"groups": [{"group": 1, "groups": [{"group": 1}]}]});
        let err = AggregationResult::from_value("2010", doc).unwrap_err();
        match err {
            Error::MalformedResult { label, reason } => {
                assert_eq!(label, "2010");
                assert!(reason.contains("sum"), "reason should name the missing key: {reason}");
            }
            other => panic!("expected MalformedResult, got {other:?}"),
        }
    }

    #[test]
    fn missing_nested_groups_is_malformed() {
        let doc = json!({"groups": {"baseline_transition": [{"group": 1}]}});
        assert!(matches!(
            AggregationResult::from_value("2000_2015", doc),
            Err(Error::MalformedResult { .. })
        ));
    }

    #[test]
    fn unknown_category_is_malformed() {
        let doc = json!({"groups": {"sideways_transition": []}});
        assert!(AggregationResult::from_value("2000_2015", doc).is_err());
    }

    #[test]
    fn unsupported_schema_version_is_rejected() {
        let mut doc = single_doc();
        doc["schema_version"] = json!(2);
        let err = AggregationResult::from_value("2015", doc).unwrap_err();
        assert!(err.to_string().contains("schema_version 2"));
    }

    #[test]
    fn shape_flag_must_match_tree() {
        let result = AggregationResult::from_value("2015", single_doc()).unwrap();
        assert!(result.is_single());
        assert!(matches!(parse(&result, false), Err(Error::MalformedResult { .. })));
        assert!(matches!(parse(&result, true), Ok(FlatRows::Area(ref rows)) if rows.len() == 4));
    }

    #[test]
    fn invalid_json_text_is_malformed_not_evaluated() {
        let err = AggregationResult::from_json("2015", "{groups=[<FeatureCollection>]}").unwrap_err();
        assert!(matches!(err, Error::MalformedResult { .. }));
    }

    #[test]
    fn result_set_separates_single_and_multi_year_labels() {
        let set: ResultSet = [
            AggregationResult::from_value("2015", single_doc()).unwrap(),
            AggregationResult::from_value("2000_2015_2018", double_doc()).unwrap(),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
        let multi: Vec<&str> = set.multi_year().map(|r| r.label()).collect();
        assert_eq!(multi, vec!["2000_2015_2018"]);
        assert_eq!(label_years("2000_2015_2018"), vec![2000, 2015, 2018]);
    }

    #[test]
    fn variant_labels_keep_their_years_and_shape() {
        assert_eq!(variant_label("2010", 0), "2010");
        assert_eq!(variant_label("2000_2015_2018", 1), "2000_2015_2018#1");
        assert_eq!(split_variant("2000_2015_2018#1"), ("2000_2015_2018", 1));
        assert_eq!(label_years("2000_2015_2018#1"), vec![2000, 2015, 2018]);
        assert!(is_single_label("2010#3"));
        assert!(!is_single_label("2000_2015#1"));

        let set: ResultSet = [AggregationResult::from_value("2010#1", single_doc()).unwrap()]
            .into_iter()
            .collect();
        assert!(set.contains("2010#1"));
        assert!(!set.contains("2010"), "variants are separate keys");
    }
}
