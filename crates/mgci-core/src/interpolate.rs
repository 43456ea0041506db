//! Linear interpolation of sub-A area sums between two known years.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::result::AreaRow;

/// Value at `target` on the line through `(year1, v1)` and `(year2, v2)`.
///
/// Returns `v1` and `v2` exactly at the endpoints. Callers guarantee
/// `year1 < year2`.
fn linear_at(year1: i32, v1: f64, year2: i32, v2: f64, target: i32) -> f64 {
    if target == year2 {
        return v2;
    }
    let t = f64::from(target - year1) / f64::from(year2 - year1);
    v1 + (v2 - v1) * t
}

/// Interpolate `df1` (observed at `year1`) and `df2` (observed at `year2`) to
/// `target`, joined on `(belt_class, lc_class)`.
///
/// Output rows follow the order of `df1`.
pub fn interpolate(
    df1: &[AreaRow],
    df2: &[AreaRow],
    year1: i32,
    year2: i32,
    target: i32,
) -> Result<Vec<AreaRow>> {
    if !(year1 < target && target < year2) {
        return Err(Error::InvalidInterpolationRange { year1, year2, target });
    }

    let by_key: BTreeMap<(u32, u32), f64> =
        df2.iter().map(|r| ((r.belt_class, r.lc_class), r.sum)).collect();

    let keys1: BTreeSet<(u32, u32)> = df1.iter().map(|r| (r.belt_class, r.lc_class)).collect();
    if df1.len() != df2.len() || keys1.len() != df1.len() || by_key.len() != df2.len() {
        return Err(Error::SchemaMismatch(format!(
            "{year1} has {} rows ({} keys), {year2} has {} rows ({} keys)",
            df1.len(),
            keys1.len(),
            df2.len(),
            by_key.len()
        )));
    }

    df1.iter()
        .map(|r| {
            let v2 = by_key.get(&(r.belt_class, r.lc_class)).ok_or_else(|| {
                Error::SchemaMismatch(format!(
                    "belt {} class {} present in {year1} but not in {year2}",
                    r.belt_class, r.lc_class
                ))
            })?;
            Ok(AreaRow {
                belt_class: r.belt_class,
                lc_class: r.lc_class,
                sum: linear_at(year1, r.sum, year2, *v2, target),
            })
        })
        .collect()
}
