use super::parse_item_id;
use crate::error::ApiError;
use crate::models::{Item, ItemFields};
use crate::routes;
use crate::state::AppState;
use axum::{extract::Path, extract::State, http::StatusCode, Json};

/// PUT /api/items/:id handler - Update an item's fields
///
/// Each top-level field in the body replaces the stored one; fields not
/// mentioned are left alone. An unknown id creates nothing and answers
/// `null`.
#[utoipa::path(
    put,
    path = routes::ITEM,
    params(
        ("id" = String, Path, description = "UUID of the item")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "The updated item, or null when no item has this id", body = serde_json::Value),
        (status = 400, description = "Malformed JSON"),
        (status = 415, description = "Body is not declared as application/json"),
        (status = 422, description = "Body is not a JSON object"),
        (status = 500, description = "Malformed id or database error")
    ),
    tag = "items"
)]
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
    Json(patch): Json<ItemFields>,
) -> Result<(StatusCode, Json<Option<Item>>), ApiError> {
    let id = parse_item_id(&id_str)?;

    let item = state.store.update(id, patch).await?;
    match &item {
        Some(_) => tracing::info!("Successfully updated item with id: {}", id),
        None => tracing::info!("No item to update with id: {}", id),
    }

    Ok((StatusCode::OK, Json(item)))
}
