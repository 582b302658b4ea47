use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use coolfleet_core::{BreachState, CoolerBreachStatus, GpsFix};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;
use crate::state::IngestReport;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
pub(super) struct BreachQuery {
    pub state: Option<BreachState>,
}

#[derive(Debug, Serialize)]
pub(super) struct BreachSummary {
    pub counts: BTreeMap<BreachState, usize>,
    pub statuses: Vec<CoolerBreachStatus>,
}

/// Accept a batch of tracker fixes and run them through the monitor.
pub(super) async fn ingest_fixes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(fixes): Json<Vec<GpsFix>>,
) -> Result<Json<ApiResponse<IngestReport>>, ApiError> {
    if let Some(bad) = fixes.iter().find(|f| !f.position.is_valid()) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!(
                "fix for cooler {} has invalid position {}",
                bad.cooler_id, bad.position
            ),
        ));
    }

    let report = state.ingest(&fixes).await;
    tracing::debug!(
        fixes = fixes.len(),
        classified = report.classified,
        transitions = report.transitions.len(),
        "fixes ingested"
    );
    Ok(ApiResponse::new(report, req_id.0))
}

pub(super) async fn list_breaches(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<BreachQuery>,
) -> Json<ApiResponse<BreachSummary>> {
    let monitor = state.monitor.lock().await;
    let statuses = monitor
        .statuses()
        .into_iter()
        .filter(|s| query.state.is_none_or(|wanted| s.state == wanted))
        .collect();
    let data = BreachSummary {
        counts: monitor.state_counts(),
        statuses,
    };
    drop(monitor);
    ApiResponse::new(data, req_id.0)
}
