use super::parse_item_id;
use crate::error::ApiError;
use crate::models::Item;
use crate::routes;
use crate::state::AppState;
use axum::{extract::Path, extract::State, http::StatusCode, Json};

/// GET /api/items/:id handler - Retrieve one item
///
/// An unknown id is not an error: the body is JSON `null` with status 200.
#[utoipa::path(
    get,
    path = routes::ITEM,
    params(
        ("id" = String, Path, description = "UUID of the item")
    ),
    responses(
        (status = 200, description = "The item, or null when no item has this id", body = serde_json::Value),
        (status = 500, description = "Malformed id or database error")
    ),
    tag = "items"
)]
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<(StatusCode, Json<Option<Item>>), ApiError> {
    let id = parse_item_id(&id_str)?;

    let item = state.store.get(id).await?;
    match &item {
        Some(_) => tracing::info!("Successfully retrieved item with id: {}", id),
        None => tracing::info!("Item not found with id: {}", id),
    }

    Ok((StatusCode::OK, Json(item)))
}
