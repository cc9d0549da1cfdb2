use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct Location {
    pub url: String,
    pub id: i64,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_type: String,
    pub color: String,
    /// Localized names keyed by language code.
    pub names: BTreeMap<String, LocalizedName>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalizedName {
    pub name: String,
    pub sort_key: Option<String>,
}
