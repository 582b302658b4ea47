use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use coolfleet_core::geometry::validate_ring;
use coolfleet_core::{DrawnFeature, Geofence, GeofenceCounts, GeofenceError, GeometryError};
use geo::Polygon;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_geofence_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct GeofenceList {
    pub geofences: Vec<Geofence>,
    pub counts: GeofenceCounts,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CreateRadiusRequest {
    pub cooler_id: Option<String>,
    pub radius_meters: Option<f64>,
}

/// Partial update. An empty `cooler_id` detaches the geofence.
#[derive(Debug, Default, Deserialize)]
pub(super) struct UpdateGeofenceRequest {
    pub label: Option<String>,
    pub cooler_id: Option<String>,
    pub geometry: Option<geojson::Geometry>,
}

pub(super) async fn list_geofences(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<GeofenceList>> {
    let registry = state.registry.read().await;
    let data = GeofenceList {
        geofences: registry.list().to_vec(),
        counts: registry.counts(),
    };
    ApiResponse::new(data, req_id.0)
}

pub(super) async fn create_radius_geofence(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateRadiusRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Geofence>>), ApiError> {
    let radius = body
        .radius_meters
        .unwrap_or(state.config.default_radius_meters);

    let mut registry = state.registry.write().await;
    let geofence = registry
        .create_radius_geofence(
            &state.fleet.points,
            body.cooler_id.as_deref(),
            radius,
            Utc::now(),
        )
        .map_err(|e| map_geofence_error(req_id.0.clone(), &e))?
        .clone();
    drop(registry);

    tracing::info!(geofence_id = %geofence.id, radius, "radius geofence created");
    Ok((StatusCode::CREATED, ApiResponse::new(geofence, req_id.0)))
}

/// Replace every polygon geofence with the features of the draw tool.
pub(super) async fn replace_polygons(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(collection): Json<FeatureCollection>,
) -> Json<ApiResponse<GeofenceList>> {
    let drawn: Vec<DrawnFeature> = collection
        .features
        .iter()
        .filter_map(DrawnFeature::from_feature)
        .collect();

    let mut registry = state.registry.write().await;
    registry.merge_drawn_polygons(&drawn);
    state.forget_unfenced(&registry).await;
    let data = GeofenceList {
        geofences: registry.list().to_vec(),
        counts: registry.counts(),
    };
    ApiResponse::new(data, req_id.0)
}

pub(super) async fn update_geofence(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateGeofenceRequest>,
) -> Result<Json<ApiResponse<Geofence>>, ApiError> {
    let fail = |e: GeofenceError| map_geofence_error(req_id.0.clone(), &e);

    // Validate everything up front so a rejected request changes nothing.
    let ring = body
        .geometry
        .map(|g| parse_polygon(g.value))
        .transpose()
        .map_err(|e| fail(e.into()))?;
    if body.label.as_deref().is_some_and(|l| l.trim().is_empty()) {
        return Err(fail(GeofenceError::EmptyLabel));
    }
    let cooler_id = match body.cooler_id.as_deref().map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(cooler) if state.fleet.points.iter().any(|p| p.id == cooler) => {
            Some(Some(cooler.to_string()))
        }
        Some(cooler) => return Err(fail(GeofenceError::UnknownCooler(cooler.to_string()))),
    };

    let mut registry = state.registry.write().await;
    let mut updated = registry
        .get(&id)
        .cloned()
        .ok_or_else(|| fail(GeofenceError::NotFound(id.clone())))?;
    if let Some(polygon) = ring {
        updated = registry.replace_ring(&id, polygon).map_err(fail)?.clone();
    }
    if let Some(label) = body.label.as_deref() {
        updated = registry.rename(&id, label).map_err(fail)?.clone();
    }
    if let Some(cooler_id) = cooler_id {
        updated = registry.assign_cooler(&id, cooler_id).map_err(fail)?.clone();
        state.forget_unfenced(&registry).await;
    }
    drop(registry);

    tracing::debug!(geofence_id = %id, "geofence updated");
    Ok(ApiResponse::new(updated, req_id.0))
}

/// Delete a geofence. A cooler left without any geofence stops being
/// tracked by the breach monitor.
pub(super) async fn delete_geofence(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Geofence>>, ApiError> {
    let mut registry = state.registry.write().await;
    let removed = registry
        .delete(&id)
        .map_err(|e| map_geofence_error(req_id.0.clone(), &e))?;

    state.forget_unfenced(&registry).await;
    drop(registry);

    tracing::info!(geofence_id = %removed.id, kind = %removed.kind, "geofence deleted");
    Ok(ApiResponse::new(removed, req_id.0))
}

fn parse_polygon(value: geojson::Value) -> Result<Polygon<f64>, GeometryError> {
    let polygon = Polygon::<f64>::try_from(value)
        .map_err(|e| GeometryError::InvalidRing(format!("expected a Polygon geometry: {e}")))?;
    validate_ring(&polygon)?;
    Ok(polygon)
}
