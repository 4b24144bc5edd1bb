use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::geocode::{GeocodeError, GeocodeReport};
use crate::location::LocationError;
use crate::matrix::ProviderError;

use super::state::AppState;
use super::static_files;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

pub(super) struct ApiError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
            code: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

fn status_for(err: &GeocodeError) -> StatusCode {
    match err {
        GeocodeError::InvalidLeadId => StatusCode::BAD_REQUEST,
        GeocodeError::Location(LocationError::NotFound(_)) => StatusCode::NOT_FOUND,
        GeocodeError::Location(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GeocodeError::Crm(_) => StatusCode::BAD_GATEWAY,
        GeocodeError::Provider(ProviderError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        GeocodeError::Provider(_) => StatusCode::BAD_GATEWAY,
    }
}

fn geocode_error(err: &GeocodeError, debug: bool) -> ApiError {
    ApiError {
        status: status_for(err),
        message: err.user_message().to_string(),
        detail: debug.then(|| err.to_string()),
    }
}

// ─── Pages ───────────────────────────────────────────────────────

pub async fn index() -> Html<&'static str> {
    Html(static_files::INDEX_HTML)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ─── /api/v1/geocoding ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct GeocodeParams {
    pub leadid: Option<String>,
}

pub async fn geocode_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeocodeParams>,
) -> Result<Json<GeocodeReport>, Response> {
    run_geocode(state, params.leadid).await
}

pub async fn geocode_form(
    State(state): State<Arc<AppState>>,
    Form(params): Form<GeocodeParams>,
) -> Result<Json<GeocodeReport>, Response> {
    run_geocode(state, params.leadid).await
}

async fn run_geocode(
    state: Arc<AppState>,
    leadid: Option<String>,
) -> Result<Json<GeocodeReport>, Response> {
    let start = Instant::now();
    let deadline = start + state.request_deadline;
    let service = state.service.clone();
    let task = tokio::task::spawn_blocking(move || {
        service.locate_with_deadline(leadid.as_deref(), deadline)
    });

    // The service stops its own provider work at the deadline; this only stops waiting.

    let result = match tokio::time::timeout(state.request_deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            error!(error = %join_err, "geocoding task failed");
            return Err(ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Internal error".into(),
                detail: state.debug.then(|| join_err.to_string()),
            }
            .into_response());
        }
        Err(_) => Err(GeocodeError::Provider(ProviderError::Timeout)),
    };

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    match result {
        Ok(report) => {
            info!(
                lead_id = %report.lead_id,
                lead = %report.lead,
                agents = report.agents.len(),
                elapsed_ms,
                "geocoding request served"
            );
            Ok(Json(report))
        }
        Err(e) => {
            info!(error = %e, elapsed_ms, "geocoding request failed");
            Err(geocode_error(&e, state.debug).into_response())
        }
    }
}
