use anyhow::Result;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::memory::MemoryStore;
use crate::models::{Item, ItemFields};
use crate::spanner::SpannerClient;

/// The datastore behind the item endpoints
///
/// Built once at startup from [`StoreConfig`] and cloned into every request.
/// Each method is a single call into the selected backend.
#[derive(Clone)]
pub enum ItemStore {
    Spanner(SpannerClient),
    Memory(MemoryStore),
    /// Backend whose every call fails, for driving handlers down error paths
    #[cfg(test)]
    Unavailable,
}

#[cfg(test)]
fn unavailable() -> anyhow::Error {
    anyhow::anyhow!("item store unavailable")
}

impl ItemStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        match config {
            StoreConfig::Spanner(spanner) => {
                Ok(ItemStore::Spanner(SpannerClient::from_config(spanner).await?))
            }
            StoreConfig::Memory => {
                tracing::info!("Using in-memory item store");
                Ok(ItemStore::Memory(MemoryStore::new()))
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<Item>> {
        match self {
            ItemStore::Spanner(client) => client.list().await,
            ItemStore::Memory(store) => Ok(store.list().await),
            #[cfg(test)]
            ItemStore::Unavailable => Err(unavailable()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Item>> {
        match self {
            ItemStore::Spanner(client) => client.get(id).await,
            ItemStore::Memory(store) => Ok(store.get(id).await),
            #[cfg(test)]
            ItemStore::Unavailable => Err(unavailable()),
        }
    }

    pub async fn create(&self, fields: ItemFields) -> Result<Item> {
        match self {
            ItemStore::Spanner(client) => client.create(fields).await,
            ItemStore::Memory(store) => Ok(store.create(fields).await),
            #[cfg(test)]
            ItemStore::Unavailable => Err(unavailable()),
        }
    }

    pub async fn update(&self, id: Uuid, patch: ItemFields) -> Result<Option<Item>> {
        match self {
            ItemStore::Spanner(client) => client.update(id, patch).await,
            ItemStore::Memory(store) => Ok(store.update(id, patch).await),
            #[cfg(test)]
            ItemStore::Unavailable => Err(unavailable()),
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        match self {
            ItemStore::Spanner(client) => client.delete(id).await,
            ItemStore::Memory(store) => {
                store.delete(id).await;
                Ok(())
            }
            #[cfg(test)]
            ItemStore::Unavailable => Err(unavailable()),
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        match self {
            ItemStore::Spanner(client) => client.health_check().await,
            ItemStore::Memory(_) => Ok(()),
            #[cfg(test)]
            ItemStore::Unavailable => Err(unavailable()),
        }
    }

    /// Release backend resources; call after the server has drained
    pub async fn close(self) {
        match self {
            ItemStore::Spanner(client) => client.close().await,
            ItemStore::Memory(_) => tracing::info!("In-memory item store dropped"),
            #[cfg(test)]
            ItemStore::Unavailable => {}
        }
    }
}
