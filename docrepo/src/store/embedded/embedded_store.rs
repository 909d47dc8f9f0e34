use crate::common::run_cancellable;
use crate::errors::RepoResult;
use crate::store::{DocumentCollection, DocumentStore, EmbeddedCollection, StoreConfig};
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// An in-process document database.
///
/// Collections are created on first access. Unique indexes declared in the
/// [StoreConfig] are enforced on every write, next to the implicit unique index on
/// `_id`.
///
/// # Examples
///
/// ```rust,ignore
/// let config = StoreConfig::builder()
///     .database_name("blog")
///     .unique_index("Post", "text")
///     .build()?;
/// let store = EmbeddedStore::connect(config, &CancellationToken::new()).await?;
/// let posts = store.collection("Post");
/// ```
#[derive(Clone)]
pub struct EmbeddedStore {
    inner: Arc<EmbeddedStoreInner>,
}

struct EmbeddedStoreInner {
    config: StoreConfig,
    collections: DashMap<String, Arc<EmbeddedCollection>>,
}

impl EmbeddedStore {
    /// Opens a store with the given settings.
    pub async fn connect(config: StoreConfig, token: &CancellationToken) -> RepoResult<Self> {
        if let Some(latency) = config.latency() {
            run_cancellable(token, "connect", async {
                tokio::time::sleep(latency).await;
                Ok(())
            })
            .await?;
        }
        log::info!("Connected to embedded database {}", config.database_name());
        Ok(EmbeddedStore {
            inner: Arc::new(EmbeddedStoreInner {
                config,
                collections: DashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }
}

impl DocumentStore for EmbeddedStore {
    fn database_name(&self) -> &str {
        self.inner.config.database_name()
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        let config = &self.inner.config;
        let full_name = format!("{}{}", config.collections_prefix(), name);
        let collection = self
            .inner
            .collections
            .entry(full_name.clone())
            .or_insert_with(|| {
                log::debug!("Creating collection {}", full_name);
                Arc::new(EmbeddedCollection::new(
                    config.database_name(),
                    &full_name,
                    config.unique_fields(name).to_vec(),
                    config.latency(),
                ))
            })
            .value()
            .clone();
        collection
    }

    fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}
