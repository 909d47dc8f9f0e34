use crate::common::DEFAULT_DATABASE_NAME;
use crate::errors::{ErrorKind, RepoError, RepoResult};
use std::collections::HashMap;
use std::time::Duration;

/// Connection settings of a document store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    database_name: String,
    collections_prefix: String,
    latency: Option<Duration>,
    unique_indexes: HashMap<String, Vec<String>>,
}

impl StoreConfig {
    pub fn new() -> Self {
        StoreConfig {
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            collections_prefix: String::new(),
            latency: None,
            unique_indexes: HashMap::new(),
        }
    }

    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn collections_prefix(&self) -> &str {
        &self.collections_prefix
    }

    /// Simulated delay awaited before every collection command.
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Fields with a unique index on the named collection (unprefixed name). `_id`
    /// is always unique and is not listed.
    pub fn unique_fields(&self, collection_name: &str) -> &[String] {
        self.unique_indexes
            .get(collection_name)
            .map(|fields| fields.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn set_database_name(&mut self, database_name: &str) -> RepoResult<()> {
        if database_name.trim().is_empty() {
            log::error!("Database name cannot be empty");
            return Err(RepoError::new(
                "Database name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        self.database_name = database_name.to_string();
        Ok(())
    }

    pub(crate) fn set_collections_prefix(&mut self, prefix: &str) {
        self.collections_prefix = prefix.to_string();
    }

    pub(crate) fn set_latency(&mut self, latency: Duration) {
        self.latency = if latency.is_zero() { None } else { Some(latency) };
    }

    pub(crate) fn add_unique_index(&mut self, collection_name: &str, field_name: &str) -> RepoResult<()> {
        if collection_name.is_empty() || field_name.is_empty() {
            log::error!("Unique index needs a collection and a field name");
            return Err(RepoError::new(
                "Unique index needs a collection and a field name",
                ErrorKind::ValidationError,
            ));
        }
        let fields = self
            .unique_indexes
            .entry(collection_name.to_string())
            .or_default();
        if !fields.iter().any(|f| f == field_name) {
            fields.push(field_name.to_string());
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::new()
    }
}

/// Fluent builder of [StoreConfig]. The first invalid setting is reported by
/// [StoreConfigBuilder::build].
#[derive(Default)]
pub struct StoreConfigBuilder {
    error: Option<RepoError>,
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        StoreConfigBuilder {
            error: None,
            config: StoreConfig::new(),
        }
    }

    pub fn database_name(mut self, database_name: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_database_name(database_name) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn collections_prefix(mut self, prefix: &str) -> Self {
        self.config.set_collections_prefix(prefix);
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.config.set_latency(latency);
        self
    }

    pub fn unique_index(mut self, collection_name: &str, field_name: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.add_unique_index(collection_name, field_name) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn build(self) -> RepoResult<StoreConfig> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(self.config)
    }
}
