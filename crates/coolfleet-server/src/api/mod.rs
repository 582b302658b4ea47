mod alerts;
mod breaches;
mod coolers;
mod geofences;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use coolfleet_core::{AlertError, GeofenceError};
use serde::Serialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};
pub use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    coolers: usize,
    geofences: usize,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_geofence_error(request_id: String, error: &GeofenceError) -> ApiError {
    let code = match error {
        GeofenceError::NotFound(_) | GeofenceError::UnknownCooler(_) => "not_found",
        GeofenceError::NoCoolers | GeofenceError::EmptyLabel | GeofenceError::Geometry(_) => {
            "validation_error"
        }
    };
    ApiError::new(request_id, code, error.to_string())
}

pub(super) fn map_alert_error(request_id: String, error: &AlertError) -> ApiError {
    let code = match error {
        AlertError::NotFound(_) => "not_found",
        AlertError::AlreadyResolved(_) => "conflict",
    };
    ApiError::new(request_id, code, error.to_string())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/coolers", get(coolers::list_coolers))
        .route(
            "/api/v1/coolers/status-counts",
            get(coolers::get_status_counts),
        )
        .route("/api/v1/coolers/points", get(coolers::list_cooler_points))
        .route("/api/v1/coolers/{id}", get(coolers::get_cooler))
        .route("/api/v1/geofences", get(geofences::list_geofences))
        .route(
            "/api/v1/geofences/radius",
            post(geofences::create_radius_geofence),
        )
        .route(
            "/api/v1/geofences/polygons",
            put(geofences::replace_polygons),
        )
        .route(
            "/api/v1/geofences/{id}",
            axum::routing::patch(geofences::update_geofence).delete(geofences::delete_geofence),
        )
        .route("/api/v1/fixes", post(breaches::ingest_fixes))
        .route("/api/v1/breaches", get(breaches::list_breaches))
        .route("/api/v1/alerts", get(alerts::list_alerts))
        .route("/api/v1/alerts/kpis", get(alerts::get_kpis))
        .route("/api/v1/alerts/{id}/ack", post(alerts::acknowledge_alert))
        .route("/api/v1/alerts/{id}/resolve", post(alerts::resolve_alert))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let geofences = state.registry.read().await.len();
    ApiResponse::new(
        HealthData {
            status: "ok",
            coolers: state.fleet.records.len(),
            geofences,
        },
        req_id.0,
    )
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "api_test.rs"]
pub(crate) mod tests;
