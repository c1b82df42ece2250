use crate::error::{HealthResponse, UnhealthyResponse};
use crate::routes;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// GET /health handler
///
/// 200 when the item store answers, 503 with the store's error otherwise.
#[utoipa::path(
    get,
    path = routes::HEALTH,
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Item store unreachable", body = UnhealthyResponse)
    ),
    tag = "health"
)]
pub async fn health_handler(State(state): State<AppState>) -> Response {
    if let Err(e) = state.store.health_check().await {
        tracing::error!("Health check failed: {:#}", e);
        let body = UnhealthyResponse {
            status: "unhealthy".to_string(),
            error: format!("Cannot connect to database: {}", e),
        };
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    Json(HealthResponse {
        status: "healthy".to_string(),
    })
    .into_response()
}
