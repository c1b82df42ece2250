use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Response type for health check endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Response type for unhealthy status
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
}

/// Failures of the item endpoints
///
/// Every variant reaches the client as a bare 500 with no error body; the
/// detail only goes to the log. A missing item is not an error at all:
/// lookups that find nothing answer `200 null` and deletes always confirm.
#[derive(Debug)]
pub enum ApiError {
    /// Path id is not a UUID, so the datastore cannot address it
    InvalidId(String),
    /// Database operation error
    DatabaseError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidId(id) => tracing::error!("Malformed item id: '{}'", id),
            ApiError::DatabaseError(err) => tracing::error!("Database error: {:#}", err),
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::INTERNAL_SERVER_ERROR
                .canonical_reason()
                .unwrap_or_default(),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}
