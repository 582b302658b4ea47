//! Map canvas adapter for the geofence editor.
//!
//! The map and draw libraries sit behind [`MapLoader`] and [`MapSurface`];
//! [`GeofenceCanvas`] owns the lifecycle (`uninitialized → loading-modules →
//! initialized → disposed`, plus `failed`), routes pointer and draw events
//! into the geofence registry, and debounces resizes.

pub mod canvas;
pub mod surface;

pub use canvas::{
    CanvasOptions, CanvasState, ChangeListener, GeofenceCanvas, MapEvent, DEFAULT_CENTER,
    DEFAULT_RADIUS_METERS, DEFAULT_RESIZE_DELAY, DEFAULT_ZOOM, MIN_FOCUS_ZOOM,
};
pub use surface::{
    fill_layer_id, line_layer_id, MapInit, MapLoader, MapSurface, PopupContent, COOLER_LAYER,
    COOLER_SOURCE, SELECTED_LAYER,
};

use coolfleet_core::GeofenceError;

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("map canvas needs a running Tokio runtime")]
    NoRuntime,

    #[error("map is not ready (state: {0})")]
    NotReady(CanvasState),

    #[error("map canvas is already mounted (state: {0})")]
    AlreadyMounted(CanvasState),

    #[error("unknown cooler '{0}'")]
    UnknownCooler(String),

    #[error("failed to load map modules: {0}")]
    Load(String),

    #[error(transparent)]
    Geofence(#[from] GeofenceError),
}
