pub mod health;
pub mod list;
pub mod get;
pub mod create;
pub mod update;
pub mod delete;

pub use health::health_handler;
pub use list::list_handler;
pub use get::get_handler;
pub use create::create_handler;
pub use update::update_handler;
pub use delete::delete_handler;

use crate::error::ApiError;
use uuid::Uuid;

/// Parse the `{id}` path segment shared by the single-item routes
fn parse_item_id(id_str: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id_str).map_err(|_| ApiError::InvalidId(id_str.to_string()))
}
