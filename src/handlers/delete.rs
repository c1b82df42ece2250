use super::parse_item_id;
use crate::error::ApiError;
use crate::models::DeleteResponse;
use crate::routes;
use crate::state::AppState;
use axum::{extract::Path, extract::State, http::StatusCode, Json};

/// DELETE /api/items/:id handler - Delete an item
///
/// Answers the same confirmation whether or not the item existed.
#[utoipa::path(
    delete,
    path = routes::ITEM,
    params(
        ("id" = String, Path, description = "UUID of the item")
    ),
    responses(
        (status = 200, description = "Item deleted (or already absent)", body = DeleteResponse),
        (status = 500, description = "Malformed id or database error")
    ),
    tag = "items"
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<(StatusCode, Json<DeleteResponse>), ApiError> {
    let id = parse_item_id(&id_str)?;

    state.store.delete(id).await?;

    tracing::info!("Deleted item with id: {}", id);
    Ok((StatusCode::OK, Json(DeleteResponse::item_deleted())))
}
