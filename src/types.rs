use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

/// A catalog record: field name to JSON value
pub type Record = serde_json::Map<String, Value>;

/// Resource collections exposed by the upstream catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    People,
    Films,
    Starships,
    Vehicles,
    Species,
    Planets,
}

impl Endpoint {
    pub const ALL: [Endpoint; 6] = [
        Endpoint::People,
        Endpoint::Films,
        Endpoint::Starships,
        Endpoint::Vehicles,
        Endpoint::Species,
        Endpoint::Planets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::People => "people",
            Endpoint::Films => "films",
            Endpoint::Starships => "starships",
            Endpoint::Vehicles => "vehicles",
            Endpoint::Species => "species",
            Endpoint::Planets => "planets",
        }
    }

    /// Fields whose values are reference URLs to other records
    pub fn reference_fields(&self) -> &'static [&'static str] {
        match self {
            Endpoint::People => &["homeworld", "films", "species", "vehicles", "starships"],
            Endpoint::Films => &["characters", "planets", "starships", "vehicles", "species"],
            Endpoint::Starships => &["pilots", "films"],
            Endpoint::Vehicles => &["pilots", "films"],
            Endpoint::Species => &["homeworld", "people", "films"],
            Endpoint::Planets => &["residents", "films"],
        }
    }

    /// Query filters accepted for this collection
    pub fn filter_fields(&self) -> &'static [&'static str] {
        match self {
            Endpoint::People => &[
                "name", "birth_year", "eye_color", "gender", "hair_color", "height", "mass",
                "skin_color", "homeworld", "film", "species", "starship", "vehicle",
            ],
            Endpoint::Films => &[
                "title", "episode_id", "opening_crawl", "director", "producer", "release_date",
                "url", "created", "edited", "species", "starships", "vehicles", "characters",
                "planets",
            ],
            Endpoint::Starships => &[
                "name", "model", "starship_class", "manufacturer", "cost_in_credits", "length",
                "crew", "passengers", "max_atmosphering_speed", "hyperdrive_rating", "MGLT",
                "cargo_capacity", "consumables", "url", "created", "edited", "films", "pilots",
            ],
            Endpoint::Vehicles => &[
                "name", "model", "vehicle_class", "manufacturer", "length", "cost_in_credits",
                "crew", "passengers", "max_atmosphering_speed", "cargo_capacity", "consumables",
                "url", "created", "edited", "films", "pilots",
            ],
            Endpoint::Species => &[
                "name", "classification", "designation", "average_height", "average_lifespan",
                "eye_colors", "hair_colors", "skin_colors", "language", "homeworld", "url",
                "created", "edited", "people", "films",
            ],
            Endpoint::Planets => &[
                "name", "diameter", "rotation_period", "orbital_period", "gravity", "population",
                "climate", "terrain", "surface_water", "url", "created", "edited", "residents",
                "films",
            ],
        }
    }

    /// Filters carried as integers rather than strings
    fn integer_filter_fields(&self) -> &'static [&'static str] {
        match self {
            Endpoint::Films => &["episode_id"],
            _ => &[],
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| GatewayError::NotFound(format!("Unknown endpoint '{}'", s)))
    }
}

/// A single filter match value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl FilterValue {
    fn push(self, value: String) -> FilterValue {
        match self {
            FilterValue::List(mut values) => {
                values.push(value);
                FilterValue::List(values)
            }
            FilterValue::Text(existing) => FilterValue::List(vec![existing, value]),
            FilterValue::Integer(existing) => FilterValue::List(vec![existing.to_string(), value]),
        }
    }
}

/// Query filters for a collection listing.
///
/// Keys are held in sorted order so equivalent filter sets serialize identically
/// regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters(BTreeMap<String, FilterValue>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a filter; `None` leaves the field out entirely
    pub fn insert(&mut self, field: impl Into<String>, value: Option<FilterValue>) {
        let field = field.into();
        match value {
            Some(value) => {
                self.0.insert(field, value);
            }
            None => {
                self.0.remove(&field);
            }
        }
    }

    /// Builder-style `insert`
    pub fn with(mut self, field: impl Into<String>, value: Option<FilterValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Build filters for `endpoint` from raw query pairs.
    ///
    /// Empty values are dropped, repeated keys collect into a list, and fields the
    /// endpoint does not expose are rejected.
    pub fn from_pairs<I>(endpoint: Endpoint, pairs: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut filters = Filters::new();
        for (field, raw) in pairs {
            if !endpoint.filter_fields().contains(&field.as_str()) {
                return Err(GatewayError::InvalidRequest(format!(
                    "Unknown filter '{}' for {}",
                    field, endpoint
                )));
            }
            if raw.is_empty() {
                continue;
            }

            let value = match filters.0.remove(&field) {
                Some(existing) => existing.push(raw),
                None if endpoint.integer_filter_fields().contains(&field.as_str()) => {
                    let parsed = raw.parse::<i64>().map_err(|_| {
                        GatewayError::InvalidRequest(format!("Filter '{}' must be an integer", field))
                    })?;
                    FilterValue::Integer(parsed)
                }
                None => FilterValue::Text(raw),
            };
            filters.0.insert(field, value);
        }
        Ok(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.0.get(field)
    }

    /// Query parameters for the upstream request; lists become repeated keys
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (field, value) in &self.0 {
            match value {
                FilterValue::Integer(n) => pairs.push((field.clone(), n.to_string())),
                FilterValue::Text(s) => pairs.push((field.clone(), s.clone())),
                FilterValue::List(values) => {
                    pairs.extend(values.iter().map(|v| (field.clone(), v.clone())));
                }
            }
        }
        pairs
    }

    /// Stable serialization used inside cache keys, `None` when no filter is set
    pub fn cache_fragment(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        serde_json::to_string(&self.0).ok()
    }
}

/// Sort direction for collection listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(GatewayError::InvalidRequest(format!(
                "Invalid order '{}', expected asc or desc",
                other
            ))),
        }
    }
}

/// Overall outcome of a warm-up run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmupStatus {
    Success,
    Partial,
    Error,
}

impl WarmupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarmupStatus::Success => "success",
            WarmupStatus::Partial => "partial",
            WarmupStatus::Error => "error",
        }
    }
}

/// Per-endpoint warm-up counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointWarmup {
    /// Pages fetched from upstream
    pub pages: usize,
    /// Items seen across all pages
    pub fetched: usize,
    /// Items written to the cache under their `url`
    pub cached: usize,
    /// Items whose write failed after retries, or that carry no `url`
    pub failed: usize,
}

/// An endpoint whose warm-up could not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEndpoint {
    pub endpoint: Endpoint,
    pub error: String,
}

/// Summary returned by a warm-up run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupReport {
    pub status: WarmupStatus,
    pub message: String,
    /// Items cached across all endpoints
    pub cached_items: usize,
    /// Items fetched across all endpoints
    pub total_items: usize,
    pub endpoints: BTreeMap<Endpoint, EndpointWarmup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_endpoints: Vec<FailedEndpoint>,
    pub duration_ms: u64,
}

impl WarmupReport {
    /// Report for a run that never reached any endpoint
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: WarmupStatus::Error,
            message: message.into(),
            cached_items: 0,
            total_items: 0,
            endpoints: BTreeMap::new(),
            failed_endpoints: Vec::new(),
            duration_ms: 0,
        }
    }
}
