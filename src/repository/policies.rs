//! Policies repository
//!
//! Indexed by policy id, with secondary indexes per Ric, per owning service
//! and per type so supervision sweeps and cascade deletions never scan the
//! whole map.

use crate::domain::Policy;
use crate::infrastructure::store::DurableStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const STORE_PREFIX: &str = "policies/";

#[derive(Default)]
struct Inner {
	by_id: HashMap<String, Arc<Policy>>,
	by_ric: HashMap<String, HashMap<String, Arc<Policy>>>,
	by_service: HashMap<String, HashMap<String, Arc<Policy>>>,
	by_type: HashMap<String, HashMap<String, Arc<Policy>>>,
}

impl Inner {
	fn index(&mut self, policy: Arc<Policy>) {
		if let Some(previous) = self.by_id.remove(&policy.id) {
			self.unindex(&previous);
		}
		self.by_ric
			.entry(policy.ric_id.clone())
			.or_default()
			.insert(policy.id.clone(), policy.clone());
		self.by_service
			.entry(policy.owner_service_id.clone())
			.or_default()
			.insert(policy.id.clone(), policy.clone());
		self.by_type
			.entry(policy.type_id.clone())
			.or_default()
			.insert(policy.id.clone(), policy.clone());
		self.by_id.insert(policy.id.clone(), policy);
	}

	fn unindex(&mut self, policy: &Policy) {
		if let Some(map) = self.by_ric.get_mut(&policy.ric_id) {
			map.remove(&policy.id);
			if map.is_empty() {
				self.by_ric.remove(&policy.ric_id);
			}
		}
		if let Some(map) = self.by_service.get_mut(&policy.owner_service_id) {
			map.remove(&policy.id);
			if map.is_empty() {
				self.by_service.remove(&policy.owner_service_id);
			}
		}
		if let Some(map) = self.by_type.get_mut(&policy.type_id) {
			map.remove(&policy.id);
			if map.is_empty() {
				self.by_type.remove(&policy.type_id);
			}
		}
	}
}

/// Thread-safe store of all known policies.
pub struct Policies {
	inner: RwLock<Inner>,
	store: Option<Arc<dyn DurableStore>>,
}

impl Policies {
	pub fn new(store: Option<Arc<dyn DurableStore>>) -> Self {
		Self {
			inner: RwLock::new(Inner::default()),
			store,
		}
	}

	/// Insert or replace a policy. Transient policies are never written to
	/// the durable store.
	pub async fn put(&self, policy: Policy) {
		let policy = Arc::new(policy);
		self.inner.write().await.index(policy.clone());

		if let Some(store) = &self.store {
			if policy.is_transient {
				return;
			}
			match serde_json::to_vec(policy.as_ref()) {
				Ok(bytes) => {
					let key = format!("{STORE_PREFIX}{}", policy.id);
					if let Err(e) = store.write(&key, &bytes).await {
						warn!("Failed to persist policy {}: {}", policy.id, e);
					}
				}
				Err(e) => warn!("Failed to serialize policy {}: {}", policy.id, e),
			}
		}
	}

	pub async fn get(&self, id: &str) -> Option<Arc<Policy>> {
		self.inner.read().await.by_id.get(id).cloned()
	}

	pub async fn contains(&self, id: &str) -> bool {
		self.inner.read().await.by_id.contains_key(id)
	}

	/// Remove one policy, returning it when it existed.
	pub async fn remove(&self, id: &str) -> Option<Arc<Policy>> {
		let removed = {
			let mut inner = self.inner.write().await;
			let removed = inner.by_id.remove(id);
			if let Some(policy) = &removed {
				inner.unindex(policy);
			}
			removed
		};
		if removed.is_some() {
			self.delete_stored(id).await;
		}
		removed
	}

	/// All policies owned by one Ric.
	pub async fn get_for_ric(&self, ric_id: &str) -> Vec<Arc<Policy>> {
		self.inner
			.read()
			.await
			.by_ric
			.get(ric_id)
			.map(|map| map.values().cloned().collect())
			.unwrap_or_default()
	}

	/// All policies owned by one service.
	pub async fn get_for_service(&self, service_name: &str) -> Vec<Arc<Policy>> {
		self.inner
			.read()
			.await
			.by_service
			.get(service_name)
			.map(|map| map.values().cloned().collect())
			.unwrap_or_default()
	}

	/// All policies of one type.
	pub async fn get_for_type(&self, type_id: &str) -> Vec<Arc<Policy>> {
		self.inner
			.read()
			.await
			.by_type
			.get(type_id)
			.map(|map| map.values().cloned().collect())
			.unwrap_or_default()
	}

	/// Remove every policy owned by one Ric, returning the removed set.
	/// Used by REMOVED configuration events and by synchronization-failure
	/// cleanup.
	pub async fn remove_for_ric(&self, ric_id: &str) -> Vec<Arc<Policy>> {
		let removed = {
			let mut inner = self.inner.write().await;
			let Some(map) = inner.by_ric.remove(ric_id) else {
				return Vec::new();
			};
			let removed: Vec<Arc<Policy>> = map.into_values().collect();
			for policy in &removed {
				inner.by_id.remove(&policy.id);
				inner.unindex(policy);
			}
			removed
		};
		for policy in &removed {
			self.delete_stored(&policy.id).await;
		}
		removed
	}

	pub async fn len(&self) -> usize {
		self.inner.read().await.by_id.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	/// Rehydrate from the durable store. Corrupt entries are logged and
	/// skipped. Returns the number of policies restored.
	pub async fn restore_from_store(&self) -> usize {
		let Some(store) = &self.store else {
			return 0;
		};
		let ids = match store.list(STORE_PREFIX).await {
			Ok(ids) => ids,
			Err(e) => {
				warn!("Failed to list stored policies: {}", e);
				return 0;
			}
		};

		let mut restored = 0;
		for id in ids {
			let bytes = match store.read(&id).await {
				Ok(Some(bytes)) => bytes,
				Ok(None) => continue,
				Err(e) => {
					warn!("Failed to read stored policy {}: {}", id, e);
					continue;
				}
			};
			match serde_json::from_slice::<Policy>(&bytes) {
				Ok(policy) => {
					self.inner.write().await.index(Arc::new(policy));
					restored += 1;
				}
				Err(e) => warn!("Skipping corrupt stored policy {}: {}", id, e),
			}
		}
		debug!("Restored {} policies from store", restored);
		restored
	}

	async fn delete_stored(&self, id: &str) {
		if let Some(store) = &self.store {
			let key = format!("{STORE_PREFIX}{id}");
			if let Err(e) = store.delete(&key).await {
				warn!("Failed to delete stored policy {}: {}", id, e);
			}
		}
	}
}
