use anyhow::{Context, Result};
use gcloud_gax::conn::Environment;
use gcloud_gax::grpc::{Code, Status};
use gcloud_gax::retry::TryAs;
use gcloud_googleapis::spanner::admin::database::v1::{
    CreateDatabaseRequest, GetDatabaseDdlRequest, GetDatabaseRequest, UpdateDatabaseDdlRequest,
};
use gcloud_googleapis::spanner::admin::instance::v1::{
    CreateInstanceRequest, GetInstanceRequest, Instance,
};
use gcloud_spanner::admin::client::Client as AdminClient;
use gcloud_spanner::admin::AdminClientConfig;
use gcloud_spanner::client::{Client, ClientConfig};
use gcloud_spanner::key::Key;
use gcloud_spanner::mutation::{delete, insert, update};
use gcloud_spanner::row::{self, Row};
use gcloud_spanner::session::SessionError;
use gcloud_spanner::statement::Statement;
use gcloud_spanner::value::CommitTimestamp;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SpannerConfig;
use crate::models::{Item, ItemFields};

const ITEMS_TABLE: &str = "items";

const SELECT_ITEM: &str = "SELECT id, data FROM items WHERE id = @id";

/// Schema applied to a fresh or partially provisioned database
const SCHEMA: &[&str] = &[r#"CREATE TABLE items (
    id STRING(36) NOT NULL,
    data JSON NOT NULL,
    created_at TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
    updated_at TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
) PRIMARY KEY (id)"#];

/// Failures that can abort a read-write transaction
///
/// `read_write_transaction` retries on aborted commits, which requires the
/// closure's error type to expose the underlying gRPC status.
#[derive(Debug, Error)]
pub enum SpannerError {
    #[error(transparent)]
    Grpc(#[from] Status),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Row(#[from] row::Error),
    #[error("invalid item document: {0}")]
    Document(#[from] serde_json::Error),
}

impl TryAs<Status> for SpannerError {
    fn try_as(&self) -> Option<&Status> {
        match self {
            SpannerError::Grpc(status) => Some(status),
            _ => None,
        }
    }
}

/// Shareable Spanner client for use across async handlers
#[derive(Clone)]
pub struct SpannerClient {
    inner: Arc<Client>,
}

impl SpannerClient {
    /// Connect to the configured database, provisioning it first if needed
    ///
    /// With `emulator_host` set both the admin and data clients talk to that
    /// emulator; otherwise they target production Spanner.
    pub async fn from_config(config: &SpannerConfig) -> Result<Self> {
        auto_provision(config).await?;

        let database_path = config.database_path();

        let client_config = match &config.emulator_host {
            Some(host) => {
                tracing::info!("Connecting to Spanner emulator at: {}", host);
                ClientConfig {
                    environment: Environment::Emulator(host.clone()),
                    ..Default::default()
                }
            }
            None => {
                tracing::info!("Connecting to production Spanner");
                ClientConfig::default()
            }
        };

        let client = Client::new(&database_path, client_config)
            .await
            .context("Failed to create Spanner client")?;

        tracing::info!(
            "Successfully connected to Spanner database: {}",
            database_path
        );

        Ok(Self {
            inner: Arc::new(client),
        })
    }

    /// Insert a new item document under a freshly generated id
    pub async fn create(&self, fields: ItemFields) -> Result<Item> {
        let item = Item::new(Uuid::new_v4().to_string(), fields);
        let data_str = serde_json::to_string(&item.fields)
            .context("Failed to serialize item document")?;

        let mutation = insert(
            ITEMS_TABLE,
            &["id", "data", "created_at", "updated_at"],
            &[&item.id, &data_str, &CommitTimestamp::new(), &CommitTimestamp::new()],
        );

        self.inner
            .apply(vec![mutation])
            .await
            .context("Failed to insert item into Spanner")?;

        tracing::debug!("Inserted item with id: {}", item.id);
        Ok(item)
    }

    /// Read an item document by id
    ///
    /// # Returns
    /// * `Ok(Some(item))` - Item found
    /// * `Ok(None)` - No item has this id
    /// * `Err(_)` - Spanner operation failed
    pub async fn get(&self, id: Uuid) -> Result<Option<Item>> {
        let mut statement = Statement::new(SELECT_ITEM);
        statement.add_param("id", &id.to_string());

        let mut tx = self.inner
            .single()
            .await
            .context("Failed to create read transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to query item from Spanner")?;

        match result_set.next().await? {
            Some(row) => Ok(Some(item_from_row(&row)?)),
            None => {
                tracing::debug!("Item not found with id: {}", id);
                Ok(None)
            }
        }
    }

    /// List every item document, oldest first
    pub async fn list(&self) -> Result<Vec<Item>> {
        let statement = Statement::new(
            "SELECT id, data FROM items ORDER BY created_at ASC, id ASC"
        );

        let mut tx = self.inner
            .single()
            .await
            .context("Failed to create read transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to query items from Spanner")?;

        let mut items = Vec::new();
        while let Some(row) = result_set.next().await? {
            items.push(item_from_row(&row)?);
        }

        tracing::debug!("Listed {} items", items.len());
        Ok(items)
    }

    /// Overwrite the named top-level fields of an existing item
    ///
    /// Read, merge and write share one read-write transaction, so concurrent
    /// updates to disjoint fields both survive and an item deleted mid-update
    /// yields `Ok(None)` rather than a write error.
    pub async fn update(&self, id: Uuid, patch: ItemFields) -> Result<Option<Item>> {
        let id_str = id.to_string();

        let (_, item) = self
            .inner
            .read_write_transaction(|tx| {
                let id_str = id_str.clone();
                let patch = patch.clone();
                Box::pin(async move {
                    let mut statement = Statement::new(SELECT_ITEM);
                    statement.add_param("id", &id_str);

                    let row = {
                        let mut result_set = tx.query(statement).await?;
                        result_set.next().await?
                    };
                    let Some(row) = row else {
                        return Ok::<_, SpannerError>(None);
                    };

                    let mut item = item_from_row(&row)?;
                    item.merge(patch);
                    let data_str = serde_json::to_string(&item.fields)?;

                    tx.buffer_write(vec![update(
                        ITEMS_TABLE,
                        &["id", "data", "updated_at"],
                        &[&item.id, &data_str, &CommitTimestamp::new()],
                    )]);
                    Ok(Some(item))
                })
            })
            .await
            .context("Failed to update item in Spanner")?;

        match &item {
            Some(_) => tracing::debug!("Updated item with id: {}", id),
            None => tracing::debug!("Skipped update of missing item: {}", id),
        }
        Ok(item)
    }

    /// Delete an item by id; deleting a missing id is a no-op
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mutation = delete(ITEMS_TABLE, Key::new(&id.to_string()));

        self.inner
            .apply(vec![mutation])
            .await
            .context("Failed to delete item from Spanner")?;

        tracing::debug!("Deleted item with id: {}", id);
        Ok(())
    }

    /// Run `SELECT 1` to prove the session pool can reach the database
    pub async fn health_check(&self) -> Result<()> {
        let mut tx = self.inner
            .single()
            .await
            .context("Failed to create health check transaction")?;

        let mut result_set = tx
            .query(Statement::new("SELECT 1"))
            .await
            .context("Failed to execute health check query")?;

        result_set
            .next()
            .await?
            .map(|_| ())
            .context("Health check query returned no results")
    }

    /// Close the session pool once no handler holds a clone any more
    pub async fn close(self) {
        match Arc::try_unwrap(self.inner) {
            Ok(client) => {
                client.close().await;
                tracing::info!("Spanner client closed");
            }
            Err(_) => tracing::warn!("Spanner client still shared at shutdown, skipping close"),
        }
    }
}

fn item_from_row(row: &Row) -> Result<Item, SpannerError> {
    let id: String = row.column_by_name("id")?;
    let data_str: String = row.column_by_name("data")?;
    let fields: ItemFields = serde_json::from_str(&data_str)?;
    Ok(Item { id, fields })
}

/// Create whatever part of instance → database → `items` table is missing
async fn auto_provision(config: &SpannerConfig) -> Result<()> {
    let admin_config = match &config.emulator_host {
        Some(host) => AdminClientConfig {
            environment: Environment::Emulator(host.clone()),
            ..Default::default()
        },
        None => AdminClientConfig::default(),
    };
    let admin_client = AdminClient::new(admin_config)
        .await
        .context("Failed to create Spanner admin client")?;

    ensure_instance(&admin_client, config).await?;
    ensure_schema(&admin_client, config).await?;

    tracing::info!("Auto-provisioning complete");
    Ok(())
}

/// `Ok(true)` when the admin lookup found the resource, `Ok(false)` on NOT_FOUND
fn exists<T>(lookup: Result<T, Status>, what: &str) -> Result<bool> {
    match lookup {
        Ok(_) => Ok(true),
        Err(status) if status.code() == Code::NotFound => Ok(false),
        Err(status) => Err(anyhow::anyhow!(
            "Failed to check {} existence: {}",
            what,
            status.message()
        )),
    }
}

async fn ensure_instance(admin_client: &AdminClient, config: &SpannerConfig) -> Result<()> {
    let project_path = format!("projects/{}", config.project);
    let instance_path = format!("{}/instances/{}", project_path, config.instance);

    let lookup = admin_client
        .instance()
        .get_instance(
            GetInstanceRequest {
                name: instance_path.clone(),
                field_mask: None,
            },
            None,
        )
        .await;
    if exists(lookup, "instance")? {
        return Ok(());
    }

    tracing::info!("Creating instance: {}", instance_path);

    let instance_config = match config.emulator_host {
        Some(_) => "emulator-config",
        None => "regional-us-central1",
    };

    let mut operation = admin_client
        .instance()
        .create_instance(
            CreateInstanceRequest {
                parent: project_path.clone(),
                instance_id: config.instance.clone(),
                instance: Some(Instance {
                    name: instance_path.clone(),
                    config: format!("{}/instanceConfigs/{}", project_path, instance_config),
                    display_name: format!("{} instance", config.instance),
                    node_count: 1,
                    ..Default::default()
                }),
            },
            None,
        )
        .await
        .context("Failed to start instance creation")?;

    operation
        .wait(None)
        .await
        .context("Failed to create instance")?;
    Ok(())
}

/// Make sure the database exists and carries every statement in [`SCHEMA`]
///
/// A new database gets the schema in its creation request; an existing one
/// gets only the tables its DDL does not mention yet.
async fn ensure_schema(admin_client: &AdminClient, config: &SpannerConfig) -> Result<()> {
    let instance_path = format!("projects/{}/instances/{}", config.project, config.instance);
    let database_path = config.database_path();

    let lookup = admin_client
        .database()
        .get_database(GetDatabaseRequest { name: database_path.clone() }, None)
        .await;

    if !exists(lookup, "database")? {
        tracing::info!("Creating database with schema: {}", database_path);

        let mut operation = admin_client
            .database()
            .create_database(
                CreateDatabaseRequest {
                    parent: instance_path,
                    create_statement: format!("CREATE DATABASE `{}`", config.database),
                    extra_statements: SCHEMA.iter().map(|ddl| ddl.to_string()).collect(),
                    encryption_config: None,
                    database_dialect: 1, // Google Standard SQL
                    proto_descriptors: vec![],
                },
                None,
            )
            .await
            .context("Failed to start database creation")?;

        operation
            .wait(None)
            .await
            .context("Failed to create database")?;
        return Ok(());
    }

    let existing = admin_client
        .database()
        .get_database_ddl(GetDatabaseDdlRequest { database: database_path.clone() }, None)
        .await
        .context("Failed to get database DDL")?
        .into_inner()
        .statements;

    let missing = missing_statements(SCHEMA, &existing);
    if missing.is_empty() {
        return Ok(());
    }

    tracing::info!("Applying {} schema statement(s) to {}", missing.len(), database_path);

    let mut operation = admin_client
        .database()
        .update_database_ddl(
            UpdateDatabaseDdlRequest {
                database: database_path,
                statements: missing,
                operation_id: String::new(),
                proto_descriptors: vec![],
                throughput_mode: false,
            },
            None,
        )
        .await
        .context("Failed to start schema update")?;

    operation
        .wait(None)
        .await
        .context("Failed to apply schema")?;
    Ok(())
}

/// Table name of a `CREATE TABLE <name> (...)` statement, backticks stripped
fn created_table(ddl: &str) -> Option<&str> {
    let rest = ddl.trim_start().strip_prefix("CREATE TABLE")?;
    rest.trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .map(|name| name.trim_matches('`'))
        .filter(|name| !name.is_empty())
}

/// Statements of `schema` whose table is absent from `existing`
fn missing_statements(schema: &[&str], existing: &[String]) -> Vec<String> {
    let present: Vec<&str> = existing.iter().filter_map(|ddl| created_table(ddl)).collect();
    schema
        .iter()
        .filter(|ddl| created_table(ddl).is_some_and(|table| !present.contains(&table)))
        .map(|ddl| ddl.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn emulator_config(name: &str) -> SpannerConfig {
        SpannerConfig {
            emulator_host: Some("localhost:9010".to_string()),
            project: "test-project".to_string(),
            instance: format!("{}-instance", name),
            database: format!("{}-db", name),
        }
    }

    /// Connect to the local emulator, or `None` when it isn't running
    async fn emulator_client(name: &str) -> Option<SpannerClient> {
        match SpannerClient::from_config(&emulator_config(name)).await {
            Ok(client) => Some(client),
            Err(e) => {
                let error_msg = e.to_string();
                assert!(
                    error_msg.starts_with("Failed to"),
                    "Error should have context: {}",
                    error_msg
                );
                println!("{} skipped (emulator may not be running): {}", name, error_msg);
                None
            }
        }
    }

    fn fields(value: serde_json::Value) -> ItemFields {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_client_is_clonable() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<SpannerClient>();
    }

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SpannerClient>();
    }

    #[test]
    fn test_created_table_names() {
        assert_eq!(created_table(SCHEMA[0]), Some("items"));
        assert_eq!(created_table("CREATE TABLE `items` (id STRING(36))"), Some("items"));
        assert_eq!(created_table("CREATE TABLE items(id STRING(36))"), Some("items"));
        assert_eq!(created_table("CREATE INDEX by_name ON items(name)"), None);
    }

    #[test]
    fn test_missing_statements() {
        assert_eq!(missing_statements(SCHEMA, &[]), vec![SCHEMA[0].to_string()]);

        let existing = vec!["CREATE TABLE items (\n  id STRING(36) NOT NULL,\n) PRIMARY KEY(id)".to_string()];
        assert!(missing_statements(SCHEMA, &existing).is_empty());

        let unrelated = vec!["CREATE TABLE other (id INT64) PRIMARY KEY(id)".to_string()];
        assert_eq!(missing_statements(SCHEMA, &unrelated).len(), 1);
    }

    #[test]
    fn test_transaction_error_exposes_grpc_status() {
        let aborted = SpannerError::Grpc(Status::new(Code::Aborted, "retry me"));
        assert_eq!(aborted.try_as().map(|s| s.code()), Some(Code::Aborted));

        let document = SpannerError::from(serde_json::from_str::<ItemFields>("[]").unwrap_err());
        assert!(document.try_as().is_none());
        assert!(document.to_string().contains("invalid item document"));
    }

    #[tokio::test]
    async fn test_auto_provisioning_idempotent() {
        if emulator_client("idempotent-test").await.is_some() {
            assert!(
                emulator_client("idempotent-test").await.is_some(),
                "Second auto-provisioning call should succeed"
            );
        }
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let Some(client) = emulator_client("crud-test").await else {
            return;
        };

        let created = client
            .create(fields(json!({ "name": "Widget", "description": "A small widget" })))
            .await
            .unwrap();
        let id = Uuid::parse_str(&created.id).unwrap();

        assert_eq!(client.get(id).await.unwrap(), Some(created.clone()));

        let updated = client
            .update(id, fields(json!({ "description": "Bigger now" })))
            .await
            .unwrap()
            .expect("item should exist");
        assert_eq!(updated.fields["name"], json!("Widget"));
        assert_eq!(updated.fields["description"], json!("Bigger now"));
        assert_eq!(client.get(id).await.unwrap(), Some(updated));

        client.delete(id).await.unwrap();
        assert_eq!(client.get(id).await.unwrap(), None);

        // Deleting again is a no-op
        client.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_item_writes_nothing() {
        let Some(client) = emulator_client("update-missing-test").await else {
            return;
        };

        let missing = Uuid::new_v4();
        let result = client
            .update(missing, fields(json!({ "name": "ghost" })))
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(client.get(missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_updates_keep_disjoint_fields() {
        let Some(client) = emulator_client("concurrent-update-test").await else {
            return;
        };

        let created = client
            .create(fields(json!({ "name": "W", "description": "D" })))
            .await
            .unwrap();
        let id = Uuid::parse_str(&created.id).unwrap();

        let (renamed, described) = tokio::join!(
            client.update(id, fields(json!({ "name": "X" }))),
            client.update(id, fields(json!({ "description": "E" }))),
        );
        assert!(renamed.unwrap().is_some());
        assert!(described.unwrap().is_some());

        let stored = client.get(id).await.unwrap().expect("item should exist");
        assert_eq!(stored.fields["name"], json!("X"));
        assert_eq!(stored.fields["description"], json!("E"));
    }

    #[tokio::test]
    async fn test_update_after_delete_is_none() {
        let Some(client) = emulator_client("update-deleted-test").await else {
            return;
        };

        let created = client.create(fields(json!({ "name": "brief" }))).await.unwrap();
        let id = Uuid::parse_str(&created.id).unwrap();
        client.delete(id).await.unwrap();

        let result = client.update(id, fields(json!({ "name": "late" }))).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_list_contains_created_items() {
        let Some(client) = emulator_client("list-test").await else {
            return;
        };

        let before = client.list().await.unwrap().len();
        let created = client
            .create(fields(json!({ "name": "listed", "nested": { "deep": [1, 2, 3] } })))
            .await
            .unwrap();

        let items = client.list().await.unwrap();
        assert_eq!(items.len(), before + 1);
        assert!(items.contains(&created));
    }

    #[tokio::test]
    async fn test_health_check_with_emulator() {
        if let Some(client) = emulator_client("health-test").await {
            assert!(client.health_check().await.is_ok());
        }
    }
}
