use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use coolfleet_core::{Alert, AlertFilter, AlertKpis};

use crate::middleware::RequestId;

use super::{map_alert_error, ApiError, ApiResponse, AppState};

/// Alerts sorted by severity, newest first within a severity.
pub(super) async fn list_alerts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(filter): Query<AlertFilter>,
) -> Json<ApiResponse<Vec<Alert>>> {
    let data = state
        .alerts
        .read()
        .await
        .list(&filter)
        .into_iter()
        .cloned()
        .collect();
    ApiResponse::new(data, req_id.0)
}

pub(super) async fn get_kpis(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<AlertKpis>> {
    let kpis = state.alerts.read().await.kpis(Utc::now());
    ApiResponse::new(kpis, req_id.0)
}

pub(super) async fn acknowledge_alert(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Alert>>, ApiError> {
    let alert = state
        .alerts
        .write()
        .await
        .acknowledge(&id)
        .cloned()
        .map_err(|e| map_alert_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(alert, req_id.0))
}

pub(super) async fn resolve_alert(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Alert>>, ApiError> {
    let alert = state
        .alerts
        .write()
        .await
        .resolve(&id, Utc::now())
        .cloned()
        .map_err(|e| map_alert_error(req_id.0.clone(), &e))?;
    tracing::info!(alert_id = %id, "alert resolved by operator");
    Ok(ApiResponse::new(alert, req_id.0))
}
