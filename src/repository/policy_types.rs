//! PolicyTypes repository

use crate::domain::PolicyType;
use crate::infrastructure::store::DurableStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const STORE_PREFIX: &str = "types/";

/// Thread-safe store of all registered policy types. Types are registered
/// on first discovery and never mutated.
pub struct PolicyTypes {
	types: RwLock<HashMap<String, Arc<PolicyType>>>,
	store: Option<Arc<dyn DurableStore>>,
}

impl PolicyTypes {
	pub fn new(store: Option<Arc<dyn DurableStore>>) -> Self {
		Self {
			types: RwLock::new(HashMap::new()),
			store,
		}
	}

	pub async fn get(&self, id: &str) -> Option<Arc<PolicyType>> {
		self.types.read().await.get(id).cloned()
	}

	pub async fn contains(&self, id: &str) -> bool {
		self.types.read().await.contains_key(id)
	}

	/// Register a type. Re-registering an id replaces the entry, which only
	/// happens when a Ric re-reports an identical schema.
	pub async fn put(&self, policy_type: Arc<PolicyType>) {
		self.types
			.write()
			.await
			.insert(policy_type.id.clone(), policy_type.clone());

		if let Some(store) = &self.store {
			match serde_json::to_vec(policy_type.as_ref()) {
				Ok(bytes) => {
					let key = format!("{STORE_PREFIX}{}", policy_type.id);
					if let Err(e) = store.write(&key, &bytes).await {
						warn!("Failed to persist policy type {}: {}", policy_type.id, e);
					}
				}
				Err(e) => warn!("Failed to serialize policy type {}: {}", policy_type.id, e),
			}
		}
	}

	pub async fn get_all(&self) -> Vec<Arc<PolicyType>> {
		self.types.read().await.values().cloned().collect()
	}

	pub async fn len(&self) -> usize {
		self.types.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	/// Rehydrate from the durable store. Returns the number of types
	/// restored.
	pub async fn restore_from_store(&self) -> usize {
		let Some(store) = &self.store else {
			return 0;
		};
		let ids = match store.list(STORE_PREFIX).await {
			Ok(ids) => ids,
			Err(e) => {
				warn!("Failed to list stored policy types: {}", e);
				return 0;
			}
		};

		let mut restored = 0;
		for id in ids {
			let bytes = match store.read(&id).await {
				Ok(Some(bytes)) => bytes,
				Ok(None) => continue,
				Err(e) => {
					warn!("Failed to read stored policy type {}: {}", id, e);
					continue;
				}
			};
			match serde_json::from_slice::<PolicyType>(&bytes) {
				Ok(policy_type) => {
					self.types
						.write()
						.await
						.insert(policy_type.id.clone(), Arc::new(policy_type));
					restored += 1;
				}
				Err(e) => warn!("Skipping corrupt stored policy type {}: {}", id, e),
			}
		}
		debug!("Restored {} policy types from store", restored);
		restored
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::infrastructure::store::InMemoryStore;
	use serde_json::json;

	#[tokio::test]
	async fn test_put_and_get() {
		let types = PolicyTypes::new(None);
		assert!(types.is_empty().await);

		types
			.put(Arc::new(PolicyType::new("type1", json!({"title": "t"}))))
			.await;
		assert!(types.contains("type1").await);
		assert_eq!(types.get("type1").await.unwrap().id, "type1");
		assert!(types.get("type2").await.is_none());
	}

	#[tokio::test]
	async fn test_persistence_roundtrip() {
		let store = Arc::new(InMemoryStore::default());
		let types = PolicyTypes::new(Some(store.clone()));
		types
			.put(Arc::new(PolicyType::new("type1", json!({"title": "t"}))))
			.await;

		let restored = PolicyTypes::new(Some(store));
		assert_eq!(restored.restore_from_store().await, 1);
		assert_eq!(
			restored.get("type1").await.unwrap().schema,
			json!({"title": "t"})
		);
	}
}
