use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default geofence radius stored on a cooler record when none is given.
pub const DEFAULT_COOLER_RADIUS_M: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoolerStatus {
    Active,
    Maintenance,
    Idle,
    Decommissioned,
    Alert,
}

impl CoolerStatus {
    pub const ALL: [CoolerStatus; 5] = [
        CoolerStatus::Active,
        CoolerStatus::Maintenance,
        CoolerStatus::Idle,
        CoolerStatus::Decommissioned,
        CoolerStatus::Alert,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CoolerStatus::Active => "Active",
            CoolerStatus::Maintenance => "Maintenance",
            CoolerStatus::Idle => "Idle",
            CoolerStatus::Decommissioned => "Decommissioned",
            CoolerStatus::Alert => "Alert",
        }
    }

    /// Case-insensitive lookup of a status label.
    #[must_use]
    pub fn parse_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

impl std::fmt::Display for CoolerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoolerModel {
    Standard,
    Premium,
    Ultra,
    Compact,
}

impl CoolerModel {
    pub const ALL: [CoolerModel; 4] = [
        CoolerModel::Standard,
        CoolerModel::Premium,
        CoolerModel::Ultra,
        CoolerModel::Compact,
    ];
}

/// GeoJSON point with the administrative labels the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    /// `[lng, lat]`. Kept as a plain vector because backend payloads are not
    /// guaranteed to be well formed.
    pub coordinates: Vec<f64>,
    pub city: String,
    pub province: String,
    pub country: String,
}

fn point_type() -> String {
    "Point".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHistoryEntry {
    pub coordinates: [f64; 2],
    pub timestamp: Option<DateTime<Utc>>,
}

/// A cooler as served by the listing API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoolerRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub company: String,
    pub location: GeoLocation,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    pub cooler_model: CoolerModel,
    pub humidity: Option<f64>,
    pub last_service_date: Option<DateTime<Utc>>,
    pub temperature: Option<f64>,
    pub status: CoolerStatus,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub last_notification: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location_history: Vec<LocationHistoryEntry>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_radius() -> f64 {
    DEFAULT_COOLER_RADIUS_M
}

fn default_true() -> bool {
    true
}

/// Query filters accepted by the cooler listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolerFilter {
    pub status: Option<String>,
    pub search: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
}

impl CoolerFilter {
    /// Whether a record passes every populated filter.
    ///
    /// `status=active` keeps `Active` only, `status=inactive` keeps everything
    /// else, any other value is matched case-insensitively. `search` looks at
    /// name, city and province. `city`/`province` are exact matches.
    #[must_use]
    pub fn matches(&self, cooler: &CoolerRecord) -> bool {
        if let Some(status) = non_empty(self.status.as_deref()) {
            let keep = match status.to_lowercase().as_str() {
                "active" => cooler.status == CoolerStatus::Active,
                "inactive" => cooler.status != CoolerStatus::Active,
                _ => cooler.status.as_str().eq_ignore_ascii_case(status),
            };
            if !keep {
                return false;
            }
        }

        if let Some(search) = non_empty(self.search.as_deref()) {
            let needle = search.to_lowercase();
            let hit = cooler.name.to_lowercase().contains(&needle)
                || cooler.location.city.to_lowercase().contains(&needle)
                || cooler.location.province.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }

        if let Some(city) = non_empty(self.city.as_deref()) {
            if cooler.location.city != city {
                return false;
            }
        }

        if let Some(province) = non_empty(self.province.as_deref()) {
            if cooler.location.province != province {
                return false;
            }
        }

        true
    }

    #[must_use]
    pub fn apply<'a>(&self, coolers: &'a [CoolerRecord]) -> Vec<&'a CoolerRecord> {
        coolers.iter().filter(|c| self.matches(c)).collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub status_counts: BTreeMap<String, usize>,
    pub total: usize,
}

/// Count filtered coolers per status label.
#[must_use]
pub fn status_counts(coolers: &[CoolerRecord], filter: &CoolerFilter) -> StatusCounts {
    let filtered = filter.apply(coolers);
    let mut counts = BTreeMap::new();
    for cooler in &filtered {
        *counts.entry(cooler.status.as_str().to_string()).or_insert(0) += 1;
    }
    StatusCounts {
        status_counts: counts,
        total: filtered.len(),
    }
}

#[must_use]
pub fn find_by_id<'a>(coolers: &'a [CoolerRecord], id: &str) -> Option<&'a CoolerRecord> {
    coolers.iter().find(|c| c.id == id)
}

#[cfg(test)]
#[path = "coolers_test.rs"]
mod tests;
