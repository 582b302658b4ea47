//! Seams between the canvas state machine and the map/draw library.

use std::future::Future;

use coolfleet_core::{CoolerPoint, Geofence, LngLat};
use geojson::{Feature, FeatureCollection};

use crate::CanvasError;

/// Source holding one point feature per cooler.
pub const COOLER_SOURCE: &str = "coolers";
/// Circle layer rendering every cooler point.
pub const COOLER_LAYER: &str = "coolers-circle";
/// Overlay layer filtered down to the selected cooler.
pub const SELECTED_LAYER: &str = "coolers-circle-selected";

/// Fill layer id for a geofence overlay.
#[must_use]
pub fn fill_layer_id(geofence_id: &str) -> String {
    format!("{geofence_id}-fill")
}

/// Outline layer id for a geofence overlay.
#[must_use]
pub fn line_layer_id(geofence_id: &str) -> String {
    format!("{geofence_id}-line")
}

/// What the loader needs to create a map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapInit {
    pub access_token: String,
    pub center: LngLat,
    pub zoom: f64,
}

/// Hover card for a cooler point.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupContent {
    pub name: String,
    pub status: Option<String>,
    pub location: Option<String>,
    pub radius_meters: Option<f64>,
}

impl PopupContent {
    #[must_use]
    pub fn for_point(point: &CoolerPoint) -> Self {
        Self {
            name: point.name.clone(),
            status: point.status.clone(),
            location: point.location_label(),
            radius_meters: point.radius,
        }
    }

    /// Text lines in display order; absent fields are skipped.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.name.clone()];
        if let Some(status) = &self.status {
            lines.push(format!("Status: {status}"));
        }
        if let Some(location) = &self.location {
            lines.push(location.clone());
        }
        if let Some(radius) = self.radius_meters {
            lines.push(format!("Radius: {radius}m"));
        }
        lines
    }
}

/// A live map instance with its draw control attached.
///
/// Methods take `&self`: implementations wrap a foreign handle and manage
/// their own interior state.
pub trait MapSurface: Send + Sync + 'static {
    /// Replace the data of [`COOLER_SOURCE`].
    fn set_cooler_data(&self, data: FeatureCollection);

    /// Filter [`SELECTED_LAYER`] to one cooler id, or to nothing.
    fn set_selected_filter(&self, cooler_id: Option<&str>);

    fn fly_to(&self, center: LngLat, zoom: f64);

    fn zoom(&self) -> f64;

    fn show_popup(&self, at: LngLat, content: &PopupContent);

    fn hide_popup(&self);

    /// Add or replace the fill and line overlay of a geofence.
    fn upsert_fence_overlay(&self, geofence: &Geofence);

    fn remove_fence_overlay(&self, geofence_id: &str);

    /// Everything currently held by the draw tool.
    fn draw_features(&self) -> Vec<Feature>;

    /// Load features into the draw tool, replacing its contents.
    fn set_draw_features(&self, features: Vec<Feature>);

    fn remove_draw_feature(&self, id: &str);

    /// Recompute the canvas size after a layout change.
    fn resize(&self);

    /// Release the map. The surface is not used afterwards.
    fn dispose(&self);
}

/// Asynchronously creates a [`MapSurface`].
pub trait MapLoader: Send + Sync + 'static {
    type Surface: MapSurface;

    fn load(
        &self,
        init: MapInit,
    ) -> impl Future<Output = Result<Self::Surface, CanvasError>> + Send;
}
