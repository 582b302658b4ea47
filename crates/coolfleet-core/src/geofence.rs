//! In-session geofence registry.
//!
//! Radius geofences are created from a cooler point and a distance; polygon
//! geofences come from the map's draw tool and are always replaced as a set.
//! The two kinds are partitioned: merging drawn polygons never touches
//! radius entries and creating a radius entry never touches polygons.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use geo::Polygon;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::geometry::{self, GeometryError, CIRCLE_STEPS};
use crate::points::CoolerPoint;

const DEFAULT_POLYGON_LABEL: &str = "Custom Zone";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeofenceKind {
    Radius,
    Polygon,
}

impl std::fmt::Display for GeofenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeofenceKind::Radius => write!(f, "radius"),
            GeofenceKind::Polygon => write!(f, "polygon"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooler_id: Option<String>,
    pub label: String,
    pub kind: GeofenceKind,
    /// Exactly one closed exterior ring, no holes.
    #[serde(with = "geometry::geojson_polygon")]
    pub geometry: Polygon<f64>,
}

impl Geofence {
    /// GeoJSON feature for map overlays. Properties carry id, label, kind and
    /// cooler id.
    #[must_use]
    pub fn to_feature(&self) -> geojson::Feature {
        let mut properties = geojson::JsonObject::new();
        properties.insert("id".to_string(), self.id.clone().into());
        properties.insert("label".to_string(), self.label.clone().into());
        properties.insert("kind".to_string(), self.kind.to_string().into());
        if let Some(cooler_id) = &self.cooler_id {
            properties.insert("coolerId".to_string(), cooler_id.clone().into());
        }
        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.geometry))),
            id: Some(geojson::feature::Id::String(self.id.clone())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// A shape read back from the draw tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawnFeature {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    pub geometry: geojson::Geometry,
}

impl DrawnFeature {
    /// Lift a GeoJSON feature; `properties.label` becomes the label.
    #[must_use]
    pub fn from_feature(feature: &geojson::Feature) -> Option<Self> {
        let geometry = feature.geometry.clone()?;
        let id = feature.id.as_ref().map(|id| match id {
            geojson::feature::Id::String(s) => s.clone(),
            geojson::feature::Id::Number(n) => n.to_string(),
        });
        let label = feature
            .property("label")
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned);
        Some(Self {
            id,
            label,
            geometry,
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GeofenceError {
    #[error("no coolers available to attach a geofence to")]
    NoCoolers,

    #[error("unknown cooler '{0}'")]
    UnknownCooler(String),

    #[error("geofence '{0}' not found")]
    NotFound(String),

    #[error("label must not be empty")]
    EmptyLabel,

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeofenceCounts {
    pub radius: usize,
    pub polygon: usize,
    pub total: usize,
}

type ChangeListener = Box<dyn Fn(&[Geofence]) + Send + Sync>;

/// Ordered list of geofences plus an optional change listener.
///
/// Every mutating operation that changes the set invokes the listener with
/// the full list after the change.
#[derive(Default)]
pub struct GeofenceRegistry {
    geofences: Vec<Geofence>,
    on_change: Option<ChangeListener>,
}

impl std::fmt::Debug for GeofenceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceRegistry")
            .field("geofences", &self.geofences)
            .field("on_change", &self.on_change.as_ref().map(|_| "<listener>"))
            .finish()
    }
}

impl GeofenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_listener<F>(listener: F) -> Self
    where
        F: Fn(&[Geofence]) + Send + Sync + 'static,
    {
        Self {
            geofences: Vec::new(),
            on_change: Some(Box::new(listener)),
        }
    }

    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: Fn(&[Geofence]) + Send + Sync + 'static,
    {
        self.on_change = Some(Box::new(listener));
    }

    #[must_use]
    pub fn list(&self) -> &[Geofence] {
        &self.geofences
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.geofences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geofences.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Geofence> {
        self.geofences.iter().find(|g| g.id == id)
    }

    pub fn for_cooler<'a>(&'a self, cooler_id: &'a str) -> impl Iterator<Item = &'a Geofence> {
        self.geofences
            .iter()
            .filter(move |g| g.cooler_id.as_deref() == Some(cooler_id))
    }

    #[must_use]
    pub fn counts(&self) -> GeofenceCounts {
        let radius = self
            .geofences
            .iter()
            .filter(|g| g.kind == GeofenceKind::Radius)
            .count();
        GeofenceCounts {
            radius,
            polygon: self.geofences.len() - radius,
            total: self.geofences.len(),
        }
    }

    /// Create a circular geofence around a cooler and append it.
    ///
    /// With `cooler_id == None` the first point is used. The id is
    /// `radius-<coolerId>-<millis>`, bumped forward a millisecond at a time
    /// until it is unique in the registry.
    ///
    /// # Errors
    ///
    /// [`GeofenceError::NoCoolers`] for an empty point list,
    /// [`GeofenceError::UnknownCooler`] when `cooler_id` is not in `points`,
    /// [`GeofenceError::Geometry`] for an invalid radius or coordinate. The
    /// registry is unchanged on error.
    pub fn create_radius_geofence(
        &mut self,
        points: &[CoolerPoint],
        cooler_id: Option<&str>,
        radius_meters: f64,
        now: DateTime<Utc>,
    ) -> Result<&Geofence, GeofenceError> {
        let cooler = match cooler_id {
            Some(id) => points
                .iter()
                .find(|p| p.id == id)
                .ok_or_else(|| GeofenceError::UnknownCooler(id.to_string()))?,
            None => points.first().ok_or(GeofenceError::NoCoolers)?,
        };

        let polygon = geometry::circle_polygon(cooler.coordinates, radius_meters, CIRCLE_STEPS)?;

        let mut millis = now.timestamp_millis();
        let mut id = format!("radius-{}-{millis}", cooler.id);
        while self.get(&id).is_some() {
            millis += 1;
            id = format!("radius-{}-{millis}", cooler.id);
        }

        let geofence = Geofence {
            id,
            cooler_id: Some(cooler.id.clone()),
            label: format!("{} – {}m", cooler.name, radius_meters.round()),
            kind: GeofenceKind::Radius,
            geometry: polygon,
        };
        tracing::debug!(geofence_id = %geofence.id, cooler_id = %cooler.id, radius_meters, "radius geofence created");

        self.geofences.push(geofence);
        self.notify();
        let idx = self.geofences.len() - 1;
        Ok(&self.geofences[idx])
    }

    /// Replace every polygon geofence with the current draw-tool set.
    ///
    /// Non-polygon geometries are ignored and invalid rings are skipped with
    /// a warning. Radius entries keep their order and stay ahead of the
    /// polygons. When several features share an id the last one wins.
    /// Always notifies, even when the drawn set is unchanged.
    pub fn merge_drawn_polygons(&mut self, features: &[DrawnFeature]) -> &[Geofence] {
        let drawn: Vec<Geofence> = features
            .iter()
            .filter_map(|feature| {
                if !matches!(feature.geometry.value, geojson::Value::Polygon(_)) {
                    return None;
                }
                let polygon = match Polygon::<f64>::try_from(feature.geometry.value.clone()) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping drawn polygon that failed to convert");
                        return None;
                    }
                };
                if let Err(e) = geometry::validate_ring(&polygon) {
                    tracing::warn!(error = %e, "skipping drawn polygon with invalid ring");
                    return None;
                }
                let id = feature
                    .id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                // A redrawn shape keeps its assignment, and its label unless
                // the draw tool carries one.
                let existing = self.get(&id);
                let cooler_id = existing.and_then(|g| g.cooler_id.clone());
                let label = feature
                    .label
                    .clone()
                    .filter(|l| !l.trim().is_empty())
                    .or_else(|| existing.map(|g| g.label.clone()))
                    .unwrap_or_else(|| DEFAULT_POLYGON_LABEL.to_string());
                Some(Geofence {
                    id,
                    cooler_id,
                    label,
                    kind: GeofenceKind::Polygon,
                    // Drawn shapes carry no holes.
                    geometry: Polygon::new(polygon.exterior().clone(), vec![]),
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut unique: Vec<Geofence> = drawn
            .into_iter()
            .rev()
            .filter(|g| {
                let first = seen.insert(g.id.clone());
                if !first {
                    tracing::warn!(geofence_id = %g.id, "dropping earlier drawn polygon with duplicate id");
                }
                first
            })
            .collect();
        unique.reverse();

        self.geofences.retain(|g| g.kind == GeofenceKind::Radius);
        self.geofences.extend(unique);
        self.notify();
        &self.geofences
    }

    /// Swap the ring of an existing geofence, keeping its id.
    ///
    /// # Errors
    ///
    /// [`GeofenceError::NotFound`] or [`GeofenceError::Geometry`] for an
    /// invalid ring.
    pub fn replace_ring(&mut self, id: &str, polygon: Polygon<f64>) -> Result<&Geofence, GeofenceError> {
        geometry::validate_ring(&polygon)?;
        let idx = self.position(id)?;
        self.geofences[idx].geometry = Polygon::new(polygon.exterior().clone(), vec![]);
        self.notify();
        Ok(&self.geofences[idx])
    }

    /// # Errors
    ///
    /// [`GeofenceError::NotFound`] or [`GeofenceError::EmptyLabel`].
    pub fn rename(&mut self, id: &str, label: &str) -> Result<&Geofence, GeofenceError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(GeofenceError::EmptyLabel);
        }
        let idx = self.position(id)?;
        self.geofences[idx].label = label.to_string();
        self.notify();
        Ok(&self.geofences[idx])
    }

    /// Attach a geofence to a cooler, or detach it with `None`.
    ///
    /// # Errors
    ///
    /// [`GeofenceError::NotFound`].
    pub fn assign_cooler(
        &mut self,
        id: &str,
        cooler_id: Option<String>,
    ) -> Result<&Geofence, GeofenceError> {
        let idx = self.position(id)?;
        self.geofences[idx].cooler_id = cooler_id;
        self.notify();
        Ok(&self.geofences[idx])
    }

    /// Remove a geofence of either kind.
    ///
    /// # Errors
    ///
    /// [`GeofenceError::NotFound`].
    pub fn delete(&mut self, id: &str) -> Result<Geofence, GeofenceError> {
        let idx = self.position(id)?;
        let removed = self.geofences.remove(idx);
        self.notify();
        Ok(removed)
    }

    fn position(&self, id: &str) -> Result<usize, GeofenceError> {
        self.geofences
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| GeofenceError::NotFound(id.to_string()))
    }

    fn notify(&self) {
        if let Some(listener) = &self.on_change {
            listener(&self.geofences);
        }
    }
}

#[cfg(test)]
#[path = "geofence_test.rs"]
mod tests;
