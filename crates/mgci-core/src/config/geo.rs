//! Reporting area name and M49 code for the report header columns.

use serde::{Deserialize, Serialize};

use super::ReferenceConfig;
use crate::error::{Error, Result};

/// How the area of interest was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AoiMethod {
    Admin0,
    Admin1,
    Admin2,
    /// Uploaded vector file.
    Shape,
    /// Earth Engine asset.
    Asset,
}

impl AoiMethod {
    fn is_administrative(self) -> bool {
        matches!(self, AoiMethod::Admin0 | AoiMethod::Admin1 | AoiMethod::Admin2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoArea {
    pub name: String,
    /// Empty for custom geometries.
    pub m49: String,
}

impl GeoArea {
    /// Administrative AOI names look like `NPL` or `NPL_Bagmati_Kathmandu`;
    /// the leading token is an ISO 3166-1 alpha-3 code.
    pub fn resolve(config: &ReferenceConfig, method: AoiMethod, aoi_name: &str) -> Result<Self> {
        if !method.is_administrative() {
            return Ok(Self { name: aoi_name.to_string(), m49: String::new() });
        }

        let mut tokens = aoi_name.split('_');
        let iso = tokens.next().unwrap_or_default();
        let country = config.country(iso).ok_or_else(|| Error::Reference {
            table: "m49_countries".into(),
            reason: format!("no country with ISO 3166-1 code '{iso}'"),
        })?;

        let mut name = country.country.clone();
        let rest: Vec<&str> = tokens.collect();
        if !rest.is_empty() {
            name = format!("{name}_{}", rest.join("_"));
        }
        Ok(Self { name, m49: country.m49.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_lookup_uses_m49_table() {
        let config = ReferenceConfig::builtin().unwrap();
        let area = GeoArea::resolve(&config, AoiMethod::Admin0, "NPL").unwrap();
        assert_eq!(area, GeoArea { name: "Nepal".into(), m49: "524".into() });
    }

    #[test]
    fn subnational_tokens_are_appended() {
        let config = ReferenceConfig::builtin().unwrap();
        let area = GeoArea::resolve(&config, AoiMethod::Admin2, "PER_Cusco_Urubamba").unwrap();
        assert_eq!(area.name, "Peru_Cusco_Urubamba");
        assert_eq!(area.m49, "604");
    }

    #[test]
    fn custom_geometry_keeps_its_name() {
        let config = ReferenceConfig::builtin().unwrap();
        let area = GeoArea::resolve(&config, AoiMethod::Asset, "users/me/park").unwrap();
        assert_eq!(area.name, "users/me/park");
        assert!(area.m49.is_empty());
    }

    #[test]
    fn unknown_iso_code_is_an_error() {
        let config = ReferenceConfig::builtin().unwrap();
        assert!(GeoArea::resolve(&config, AoiMethod::Admin0, "XXX").is_err());
    }
}
