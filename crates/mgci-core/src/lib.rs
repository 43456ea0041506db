//! Temporal reconciliation and reporting core for the SDG 15.4.2 Mountain
//! Green Cover Index.
//!
//! Decides which land-cover years the aggregation engine must compute, maps
//! the engine's nested results back onto reporting periods (interpolating
//! where no asset exists) and renders the five SDG tables.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod interpolate;
pub mod plan;
pub mod report;
pub mod result;
pub mod transitions;
pub mod years;

pub use config::{AoiMethod, AreaUnit, GeoArea, ReferenceConfig};
pub use error::{Error, Result};
pub use plan::{plan_calculation, CalculationPlan, EngineRequest, Indicator};
pub use report::{build_reports, ReportContext, ReportTable};
pub use result::{AggregationResult, ResultSet};
pub use transitions::{SubBSelection, SubBTarget};
pub use years::YearSpec;
