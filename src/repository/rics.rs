//! Rics repository

use crate::domain::Ric;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe store of all configured Rics.
///
/// Rics are created and removed by configuration updates only; runtime
/// state lives inside each shared [`Ric`] entity.
#[derive(Default)]
pub struct Rics {
	rics: RwLock<HashMap<String, Arc<Ric>>>,
}

impl Rics {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn put(&self, ric: Arc<Ric>) {
		self.rics.write().await.insert(ric.id().to_string(), ric);
	}

	pub async fn get(&self, id: &str) -> Option<Arc<Ric>> {
		self.rics.read().await.get(id).cloned()
	}

	pub async fn remove(&self, id: &str) -> Option<Arc<Ric>> {
		self.rics.write().await.remove(id)
	}

	pub async fn get_all(&self) -> Vec<Arc<Ric>> {
		self.rics.read().await.values().cloned().collect()
	}

	/// The Ric managing the given element, if any.
	pub async fn find_by_managed_element(&self, managed_element_id: &str) -> Option<Arc<Ric>> {
		for ric in self.rics.read().await.values() {
			if ric.is_managing(managed_element_id).await {
				return Some(ric.clone());
			}
		}
		None
	}

	/// Rics whose supported-type set contains the given type.
	pub async fn get_supporting_type(&self, type_id: &str) -> Vec<Arc<Ric>> {
		let all: Vec<Arc<Ric>> = self.rics.read().await.values().cloned().collect();
		let mut supporting = Vec::new();
		for ric in all {
			if ric.is_supporting_type(type_id).await {
				supporting.push(ric);
			}
		}
		supporting
	}

	pub async fn len(&self) -> usize {
		self.rics.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}
