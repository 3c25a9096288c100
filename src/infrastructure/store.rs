//! Durable store interface for repository mirroring
//!
//! Repositories stay authoritative in memory; a store only rehydrates them
//! at startup and absorbs mutations. The engine assumes nothing beyond
//! eventual read-after-write visibility, so any file/S3/database backend
//! fits behind this trait.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from a durable store backend.
#[derive(Error, Debug)]
pub enum StoreError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("store error: {0}")]
	Other(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal key/value persistence contract consumed by the repositories.
#[async_trait]
pub trait DurableStore: Send + Sync {
	/// Ids of all entries whose id starts with `prefix`.
	async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

	/// Contents of one entry, or `None` when absent.
	async fn read(&self, id: &str) -> StoreResult<Option<Vec<u8>>>;

	/// Create or replace one entry.
	async fn write(&self, id: &str, bytes: &[u8]) -> StoreResult<()>;

	/// Remove one entry. Removing an absent entry is not an error.
	async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Volatile store for tests and for running without persistence.
#[derive(Default)]
pub struct InMemoryStore {
	entries: RwLock<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl DurableStore for InMemoryStore {
	async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
		Ok(self
			.entries
			.read()
			.await
			.keys()
			.filter(|id| id.starts_with(prefix))
			.cloned()
			.collect())
	}

	async fn read(&self, id: &str) -> StoreResult<Option<Vec<u8>>> {
		Ok(self.entries.read().await.get(id).cloned())
	}

	async fn write(&self, id: &str, bytes: &[u8]) -> StoreResult<()> {
		self.entries
			.write()
			.await
			.insert(id.to_string(), bytes.to_vec());
		Ok(())
	}

	async fn delete(&self, id: &str) -> StoreResult<()> {
		self.entries.write().await.remove(id);
		Ok(())
	}
}
