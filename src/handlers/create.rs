use crate::error::ApiError;
use crate::models::{Item, ItemFields};
use crate::routes;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// POST /api/items handler - Create an item
///
/// The request object is stored as-is; any `id` it carries is replaced by
/// a freshly assigned one.
#[utoipa::path(
    post,
    path = routes::ITEMS,
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Item created, including its assigned id", body = serde_json::Value),
        (status = 400, description = "Malformed JSON"),
        (status = 415, description = "Body is not declared as application/json"),
        (status = 422, description = "Body is not a JSON object"),
        (status = 500, description = "Database error")
    ),
    tag = "items"
)]
pub async fn create_handler(
    State(state): State<AppState>,
    Json(fields): Json<ItemFields>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let item = state.store.create(fields).await?;

    tracing::info!("Successfully created item with id: {}", item.id);
    Ok((StatusCode::OK, Json(item)))
}
