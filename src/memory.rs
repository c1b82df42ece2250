use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Item, ItemFields};

/// In-process item collection
///
/// Keeps items in insertion order so listing matches the Spanner store's
/// oldest-first ordering. Contents live as long as the process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    items: Arc<RwLock<Vec<Item>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, fields: ItemFields) -> Item {
        let item = Item::new(Uuid::new_v4().to_string(), fields);
        self.items.write().await.push(item.clone());
        tracing::debug!("Inserted item with id: {}", item.id);
        item
    }

    pub async fn get(&self, id: Uuid) -> Option<Item> {
        let id = id.to_string();
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub async fn list(&self) -> Vec<Item> {
        self.items.read().await.clone()
    }

    pub async fn update(&self, id: Uuid, patch: ItemFields) -> Option<Item> {
        let id = id.to_string();
        let mut items = self.items.write().await;
        let item = items.iter_mut().find(|item| item.id == id)?;
        item.merge(patch);
        tracing::debug!("Updated item with id: {}", id);
        Some(item.clone())
    }

    pub async fn delete(&self, id: Uuid) {
        let id = id.to_string();
        self.items.write().await.retain(|item| item.id != id);
        tracing::debug!("Deleted item with id: {}", id);
    }
}
