//! Ric entity and its availability state machine

use crate::config::RicConfig;
use crate::lock::Lock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Availability of a Ric as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RicState {
	/// Initial state for new Rics, and the resting state after a failed
	/// check or synchronization.
	Unavailable,
	/// A consistency check is in progress.
	ConsistencyCheck,
	/// A full synchronization is in progress.
	Synchronizing,
	/// The last check or synchronization succeeded.
	Available,
}

/// One Near-RT RIC known to the engine.
///
/// Shared as `Arc<Ric>`; the mutable parts (state, supported types, static
/// configuration) sit behind their own `RwLock`s, and every remote mutation
/// of this Ric is serialized through [`Ric::lock`].
pub struct Ric {
	id: String,
	config: RwLock<RicConfig>,
	state: RwLock<RicState>,
	supported_types: RwLock<HashSet<String>>,
	lock: Lock,
	/// Set while a synchronization is pending or running, including the
	/// time it spends queued on [`Ric::lock`].
	sync_pending: AtomicBool,
}

impl Ric {
	/// Create a Ric from its configuration, in [`RicState::Unavailable`].
	pub fn new(config: RicConfig) -> Self {
		Self {
			id: config.ric_id.clone(),
			config: RwLock::new(config),
			state: RwLock::new(RicState::Unavailable),
			supported_types: RwLock::new(HashSet::new()),
			lock: Lock::new(),
			sync_pending: AtomicBool::new(false),
		}
	}

	/// The unique Ric identity. Immutable for the lifetime of the entity.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// The lock serializing operations against this Ric.
	pub fn lock(&self) -> &Lock {
		&self.lock
	}

	pub async fn state(&self) -> RicState {
		*self.state.read().await
	}

	pub async fn set_state(&self, state: RicState) {
		let mut current = self.state.write().await;
		if *current != state {
			debug!("ric {} state {:?} -> {:?}", self.id, *current, state);
			*current = state;
		}
	}

	/// Claim the single synchronization slot for this Ric. Returns `false`
	/// when a synchronization is already pending or running, even one still
	/// queued on the lock, making concurrent starts collapse into one.
	/// Must be paired with [`Ric::release_sync`] once the attempt is over.
	pub fn claim_sync(&self) -> bool {
		self.sync_pending
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_ok()
	}

	/// Release the synchronization slot claimed by [`Ric::claim_sync`].
	pub fn release_sync(&self) {
		self.sync_pending.store(false, Ordering::SeqCst);
	}

	/// Atomically enter [`RicState::Synchronizing`]. Returns `false` when a
	/// synchronization is already in progress.
	pub async fn begin_sync(&self) -> bool {
		let mut current = self.state.write().await;
		if *current == RicState::Synchronizing {
			return false;
		}
		debug!("ric {} state {:?} -> Synchronizing", self.id, *current);
		*current = RicState::Synchronizing;
		true
	}

	/// Snapshot of the static configuration.
	pub async fn config(&self) -> RicConfig {
		self.config.read().await.clone()
	}

	/// Replace the static configuration fields in place. Used by CHANGED
	/// configuration events; does not touch the state machine.
	pub async fn update_config(&self, config: RicConfig) {
		*self.config.write().await = config;
	}

	/// Whether this Ric manages the given element.
	pub async fn is_managing(&self, managed_element_id: &str) -> bool {
		self.config
			.read()
			.await
			.managed_element_ids
			.iter()
			.any(|id| id == managed_element_id)
	}

	pub async fn supported_type_ids(&self) -> Vec<String> {
		self.supported_types.read().await.iter().cloned().collect()
	}

	pub async fn is_supporting_type(&self, type_id: &str) -> bool {
		self.supported_types.read().await.contains(type_id)
	}

	pub async fn add_supported_type(&self, type_id: String) {
		self.supported_types.write().await.insert(type_id);
	}

	pub async fn clear_supported_types(&self) {
		self.supported_types.write().await.clear();
	}
}

impl std::fmt::Debug for Ric {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Ric").field("id", &self.id).finish()
	}
}
