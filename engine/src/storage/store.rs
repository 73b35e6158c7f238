//! Application record persistence

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::EngineError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::application::{Application, ServiceRouting};

/// Read/write access to persisted application fields
///
/// Writers only touch the field they are named after; everything else in
/// the record (including secrets) is left as stored.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn load_application(&self, id: &str) -> Result<Application, EngineError>;

    async fn save_config_hash(&self, id: &str, hash: &str) -> Result<(), EngineError>;

    /// Raw compose file and its routing map, written together or not at all
    ///
    /// `None` removes the stored routing map.
    async fn save_compose(
        &self,
        id: &str,
        raw: &str,
        domains: Option<&BTreeMap<String, ServiceRouting>>,
    ) -> Result<(), EngineError>;

    /// Ids of all stored applications, sorted
    async fn list_applications(&self) -> Result<Vec<String>, EngineError>;
}

/// One JSON document per application under a records directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: Dir,
}

impl JsonFileStore {
    pub fn new(dir: Dir) -> Self {
        Self { dir }
    }

    fn record(&self, id: &str) -> Result<File, EngineError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(EngineError::StorageError(format!("Invalid application id: {}", id)));
        }
        Ok(self.dir.file(&format!("{}.json", id)))
    }

    async fn read_record(&self, id: &str) -> Result<(File, Value), EngineError> {
        let file = self.record(id)?;
        if !file.exists().await {
            return Err(EngineError::NotFound(format!("Application {}", id)));
        }
        let value: Value = file.read_json().await?;
        if !value.is_object() {
            return Err(EngineError::StorageError(format!(
                "Record of application {} is not an object",
                id
            )));
        }
        Ok((file, value))
    }

    /// One read and one atomic write for all `updates`
    async fn patch(&self, id: &str, updates: Vec<(&str, Value)>) -> Result<(), EngineError> {
        let (file, mut record) = self.read_record(id).await?;
        let names: Vec<&str> = updates.iter().map(|(field, _)| *field).collect();
        if let Some(fields) = record.as_object_mut() {
            for (field, new_value) in updates {
                fields.insert(field.to_string(), new_value);
            }
        }
        file.write_json(&record).await?;
        debug!("Updated {} of application {}", names.join(", "), id);
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for JsonFileStore {
    async fn load_application(&self, id: &str) -> Result<Application, EngineError> {
        let (_, record) = self.read_record(id).await?;
        let app: Application = serde_json::from_value(record)?;
        Ok(app.normalized())
    }

    async fn save_config_hash(&self, id: &str, hash: &str) -> Result<(), EngineError> {
        self.patch(id, vec![("config_hash", Value::String(hash.to_string()))])
            .await
    }

    async fn save_compose(
        &self,
        id: &str,
        raw: &str,
        domains: Option<&BTreeMap<String, ServiceRouting>>,
    ) -> Result<(), EngineError> {
        let domains = match domains {
            Some(domains) => serde_json::to_value(domains)?,
            None => Value::Null,
        };
        self.patch(
            id,
            vec![
                ("docker_compose_raw", Value::String(raw.to_string())),
                ("docker_compose_domains", domains),
            ],
        )
        .await
    }

    async fn list_applications(&self) -> Result<Vec<String>, EngineError> {
        let ids = self
            .dir
            .list_files("json")
            .await?
            .iter()
            .filter_map(|path| path.file_stem())
            .filter_map(|stem| stem.to_str())
            .map(str::to_string)
            .collect();
        Ok(ids)
    }
}

/// In-process store, mostly for tests and one-shot CLI runs
#[derive(Default)]
pub struct MemoryStore {
    apps: RwLock<HashMap<String, Application>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, app: Application) {
        self.apps.write().await.insert(app.id.clone(), app);
    }

    async fn update<F>(&self, id: &str, apply: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut Application) + Send,
    {
        let mut apps = self.apps.write().await;
        let app = apps
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("Application {}", id)))?;
        apply(app);
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn load_application(&self, id: &str) -> Result<Application, EngineError> {
        self.apps
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Application {}", id)))
    }

    async fn save_config_hash(&self, id: &str, hash: &str) -> Result<(), EngineError> {
        let hash = hash.to_string();
        self.update(id, move |app| app.config_hash = Some(hash)).await
    }

    async fn save_compose(
        &self,
        id: &str,
        raw: &str,
        domains: Option<&BTreeMap<String, ServiceRouting>>,
    ) -> Result<(), EngineError> {
        let raw = raw.to_string();
        let domains = domains.cloned();
        self.update(id, move |app| {
            app.docker_compose_raw = Some(raw);
            app.docker_compose_domains = domains;
        })
        .await
    }

    async fn list_applications(&self) -> Result<Vec<String>, EngineError> {
        let mut ids: Vec<String> = self.apps.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
