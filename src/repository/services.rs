//! Services repository

use crate::domain::Service;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe store of all registered services.
#[derive(Default)]
pub struct Services {
	services: RwLock<HashMap<String, Arc<Service>>>,
}

impl Services {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn put(&self, service: Arc<Service>) {
		self.services
			.write()
			.await
			.insert(service.name().to_string(), service);
	}

	pub async fn get(&self, name: &str) -> Option<Arc<Service>> {
		self.services.read().await.get(name).cloned()
	}

	pub async fn remove(&self, name: &str) -> Option<Arc<Service>> {
		self.services.write().await.remove(name)
	}

	pub async fn get_all(&self) -> Vec<Arc<Service>> {
		self.services.read().await.values().cloned().collect()
	}

	pub async fn len(&self) -> usize {
		self.services.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}
