use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use coolfleet_core::{
    cooler_feature_collection, find_by_id, status_counts, CoolerBreachStatus, CoolerFilter,
    CoolerRecord, Geofence, StatusCounts,
};
use geojson::FeatureCollection;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct CoolerDetail {
    #[serde(flatten)]
    pub cooler: CoolerRecord,
    pub breach: Option<CoolerBreachStatus>,
    pub geofences: Vec<Geofence>,
}

pub(super) async fn list_coolers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(filter): Query<CoolerFilter>,
) -> Json<ApiResponse<Vec<CoolerRecord>>> {
    let data = filter
        .apply(&state.fleet.records)
        .into_iter()
        .cloned()
        .collect();
    ApiResponse::new(data, req_id.0)
}

pub(super) async fn get_status_counts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(filter): Query<CoolerFilter>,
) -> Json<ApiResponse<StatusCounts>> {
    ApiResponse::new(status_counts(&state.fleet.records, &filter), req_id.0)
}

/// Map-ready point features for every cooler with usable coordinates.
pub(super) async fn list_cooler_points(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<FeatureCollection>> {
    ApiResponse::new(cooler_feature_collection(&state.fleet.points), req_id.0)
}

pub(super) async fn get_cooler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CoolerDetail>>, ApiError> {
    let Some(cooler) = find_by_id(&state.fleet.records, &id).cloned() else {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("cooler {id} not found"),
        ));
    };

    let geofences = state
        .registry
        .read()
        .await
        .for_cooler(&id)
        .cloned()
        .collect();
    let breach = state.monitor.lock().await.status(&id);

    Ok(ApiResponse::new(
        CoolerDetail {
            cooler,
            breach,
            geofences,
        },
        req_id.0,
    ))
}
