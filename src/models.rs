use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Top-level fields of an item document, stored verbatim
pub type ItemFields = Map<String, JsonValue>;

/// Keys a client may send that never reach the stored document
const RESERVED_KEYS: [&str; 2] = ["id", "_id"];

/// An item as returned by every endpoint
///
/// Only `id` is owned by the store. `name`, `description` and any other
/// field a client sent are carried in `fields` without validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(flatten)]
    pub fields: ItemFields,
}

impl Item {
    pub fn new(id: impl Into<String>, fields: ItemFields) -> Self {
        Self {
            id: id.into(),
            fields: strip_reserved(fields),
        }
    }

    /// Overwrite each top-level field named in `patch`, keeping the rest
    pub fn merge(&mut self, patch: ItemFields) {
        for (key, value) in strip_reserved(patch) {
            self.fields.insert(key, value);
        }
    }
}

/// Drop client-supplied identifiers so the store-assigned id stays authoritative
pub fn strip_reserved(mut fields: ItemFields) -> ItemFields {
    for key in RESERVED_KEYS {
        fields.remove(key);
    }
    fields
}

/// Response type for DELETE operations
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DeleteResponse {
    pub message: String,
}

impl DeleteResponse {
    pub fn item_deleted() -> Self {
        Self {
            message: "Item deleted".to_string(),
        }
    }
}
