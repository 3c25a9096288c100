//! Full Ric synchronization
//!
//! Wipe-and-recreate reconciliation of one Ric's remote state from the
//! repository: refresh the supported policy types, delete every policy
//! instance on the Ric, then replay the repository's non-transient policies
//! one at a time. The repository, not the Ric, is the source of truth.
//!
//! Runs under the Ric's exclusive lock. On failure the local policies for
//! the Ric are deleted first (the repository must never claim a policy
//! exists on a Ric after a failed push), then a second-chance wipe and type
//! resync is attempted; the policy replay is deliberately not retried.

use crate::client::{A1Client, A1ClientError, A1ClientFactory};
use crate::domain::{PolicyType, Ric, RicState};
use crate::infrastructure::events::{Event, EventBus};
use crate::lock::LockMode;
use crate::notification::ServiceNotifier;
use crate::repository::{Policies, PolicyTypes, Rics};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors from a failed synchronization attempt.
#[derive(Error, Debug)]
pub enum SyncError {
	#[error(transparent)]
	Client(#[from] A1ClientError),
}

/// Result alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Drives one Ric through a full wipe-and-recreate resynchronization.
#[derive(Clone)]
pub struct SynchronizationTask {
	rics: Arc<Rics>,
	policies: Arc<Policies>,
	policy_types: Arc<PolicyTypes>,
	client_factory: Arc<dyn A1ClientFactory>,
	notifier: Arc<ServiceNotifier>,
	events: Arc<EventBus>,
}

impl SynchronizationTask {
	pub fn new(
		rics: Arc<Rics>,
		policies: Arc<Policies>,
		policy_types: Arc<PolicyTypes>,
		client_factory: Arc<dyn A1ClientFactory>,
		notifier: Arc<ServiceNotifier>,
		events: Arc<EventBus>,
	) -> Self {
		Self {
			rics,
			policies,
			policy_types,
			client_factory,
			notifier,
			events,
		}
	}

	/// Fire-and-forget entry point, used on configuration changes and
	/// forced resyncs. Claims the Ric's synchronization slot before
	/// queuing on the exclusive lock, so invocations racing against a
	/// pending synchronization skip instead of piling up a second resync
	/// behind it. A no-op when the slot is already claimed.
	pub fn run(&self, ric: Arc<Ric>) {
		if !ric.claim_sync() {
			debug!("Ric {} already has a synchronization pending, skipping", ric.id());
			return;
		}
		let task = self.clone();
		tokio::spawn(async move {
			let _grant = ric.lock().lock(LockMode::Exclusive, "synchronization").await;
			let result = task.synchronize_claimed(&ric).await;
			ric.release_sync();
			if let Err(e) = result {
				warn!("Synchronization of ric {} failed: {}", ric.id(), e);
			}
		});
	}

	/// Awaitable entry point for callers that already hold the Ric's
	/// exclusive lock (endpoint supervision hands its lock through). A no-op
	/// when a synchronization is already pending on the slot.
	pub async fn synchronize(&self, ric: &Arc<Ric>) -> SyncResult<()> {
		if !ric.claim_sync() {
			debug!("Ric {} already has a synchronization pending, skipping", ric.id());
			return Ok(());
		}
		let result = self.synchronize_claimed(ric).await;
		ric.release_sync();
		result
	}

	/// The resync itself. Caller holds the exclusive lock and the
	/// synchronization slot.
	#[instrument(skip(self, ric), fields(ric_id = ric.id()))]
	async fn synchronize_claimed(&self, ric: &Arc<Ric>) -> SyncResult<()> {
		if !ric.begin_sync().await {
			debug!("Ric {} already synchronizing, skipping", ric.id());
			return Ok(());
		}
		self.events.emit(Event::RicSynchronizing {
			ric_id: ric.id().to_string(),
		});
		info!("Synchronizing ric {}", ric.id());

		match self.attempt(ric).await {
			Ok(()) => {
				self.on_complete(ric).await;
				Ok(())
			}
			Err(e) => {
				warn!(
					"Synchronization of ric {} failed, deleting its policies: {}",
					ric.id(),
					e
				);
				self.recover(ric).await
			}
		}
	}

	/// Steps 1–4: client, types, wipe, replay. Each is a failure point.
	async fn attempt(&self, ric: &Arc<Ric>) -> SyncResult<()> {
		let client = self.client_factory.create_client(&ric.config().await).await?;
		self.synchronize_types(ric, client.as_ref()).await?;
		client.delete_all_policies().await?;
		self.replay_policies(ric, client.as_ref()).await?;
		Ok(())
	}

	/// Refresh the Ric's supported-type set from the Ric itself, registering
	/// newly seen types in the repository. Schema fetches run one at a time;
	/// Rics are assumed to serialize such calls reliably.
	async fn synchronize_types(&self, ric: &Arc<Ric>, client: &dyn A1Client) -> SyncResult<()> {
		let type_ids = client.get_policy_type_identities().await?;
		ric.clear_supported_types().await;
		for type_id in type_ids {
			if !self.policy_types.contains(&type_id).await {
				let schema = client.get_policy_type_schema(&type_id).await?;
				self.policy_types
					.put(Arc::new(PolicyType::new(type_id.clone(), schema)))
					.await;
				debug!("Registered policy type {}", type_id);
			}
			ric.add_supported_type(type_id).await;
		}
		Ok(())
	}

	/// Push every non-transient repository policy for this Ric, one at a
	/// time to bound the load on a single remote node. Transient policies
	/// are dropped from the repository instead.
	async fn replay_policies(&self, ric: &Arc<Ric>, client: &dyn A1Client) -> SyncResult<()> {
		for policy in self.policies.get_for_ric(ric.id()).await {
			if policy.is_transient {
				self.policies.remove(&policy.id).await;
				debug!("Dropped transient policy {}", policy.id);
				continue;
			}
			client.put_policy(&policy).await?;
		}
		Ok(())
	}

	/// Step 5: mark available and fan out notifications, unless the Ric was
	/// removed from the repository while we were synchronizing.
	async fn on_complete(&self, ric: &Arc<Ric>) {
		if self.rics.get(ric.id()).await.is_none() {
			debug!(
				"Ric {} was removed during synchronization, no notification",
				ric.id()
			);
			return;
		}
		ric.set_state(RicState::Available).await;
		self.events.emit(Event::RicAvailable {
			ric_id: ric.id().to_string(),
		});
		info!("Synchronization of ric {} succeeded", ric.id());
		self.notifier.notify_ric_available(ric.id()).await;
	}

	/// Step 6: local cleanup plus a second-chance wipe and type resync. The
	/// policy replay is not retried, so a Ric with a flaky policy endpoint
	/// does not get hammered with futile pushes.
	async fn recover(&self, ric: &Arc<Ric>) -> SyncResult<()> {
		self.policies.remove_for_ric(ric.id()).await;

		let second_chance = async {
			let client = self.client_factory.create_client(&ric.config().await).await?;
			client.delete_all_policies().await?;
			self.synchronize_types(ric, client.as_ref()).await?;
			Ok::<(), SyncError>(())
		};

		match second_chance.await {
			Ok(()) => {
				self.on_complete(ric).await;
				Ok(())
			}
			Err(e) => {
				ric.set_state(RicState::Unavailable).await;
				self.events.emit(Event::RicUnavailable {
					ric_id: ric.id().to_string(),
				});
				Err(e)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::{Policy, Service};
	use crate::tasks::testing::Fixture;
	use serde_json::json;
	use std::sync::atomic::Ordering;
	use std::time::Duration;
	use tokio::sync::Notify;

	async fn synchronize_locked(fixture: &Fixture, ric: &Arc<Ric>) -> SyncResult<()> {
		let _grant = ric.lock().lock(LockMode::Exclusive, "test").await;
		fixture.sync.synchronize(ric).await
	}

	#[tokio::test]
	async fn test_successful_sync_replays_repository_policies() {
		let fixture = Fixture::new();
		let ric = fixture.add_ric("ric1", &["type1"]).await;
		fixture
			.policies
			.put(Policy::new("p1", json!({"qos": 1}), "ric1", "type1", "s1"))
			.await;

		synchronize_locked(&fixture, &ric).await.unwrap();

		assert_eq!(ric.state().await, RicState::Available);
		assert!(ric.is_supporting_type("type1").await);
		assert!(fixture.policy_types.contains("type1").await);

		let fake = fixture.factory.fake("ric1");
		assert_eq!(fake.policy_ids(), vec!["p1".to_string()]);
		assert_eq!(fake.delete_all_calls.load(Ordering::SeqCst), 1);
		assert_eq!(ric.lock().lock_count(), 0);
	}

	#[tokio::test]
	async fn test_transient_policy_dropped_and_never_pushed() {
		let fixture = Fixture::new();
		let ric = fixture.add_ric("ric1", &["type1"]).await;
		fixture
			.policies
			.put(Policy::new("p1", json!({}), "ric1", "type1", "s1").transient())
			.await;

		synchronize_locked(&fixture, &ric).await.unwrap();

		assert!(!fixture.policies.contains("p1").await);
		let fake = fixture.factory.fake("ric1");
		assert!(fake.policy_ids().is_empty());
		assert_eq!(fake.put_calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_failed_replay_cleans_up_and_recovers_via_second_chance() {
		let fixture = Fixture::new();
		let ric = fixture.add_ric("ric1", &["type1"]).await;
		fixture
			.policies
			.put(Policy::new("p1", json!({}), "ric1", "type1", "s1"))
			.await;
		let fake = fixture.factory.fake("ric1");
		fake.fail_puts.store(true, Ordering::SeqCst);

		synchronize_locked(&fixture, &ric).await.unwrap();

		// Local policies are gone and the type resync recovered the Ric.
		assert!(fixture.policies.is_empty().await);
		assert_eq!(ric.state().await, RicState::Available);
		assert!(ric.is_supporting_type("type1").await);
		// Initial wipe plus the second-chance wipe; the replay is not retried.
		assert_eq!(fake.delete_all_calls.load(Ordering::SeqCst), 2);
		assert_eq!(fake.put_calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_unreachable_ric_ends_unavailable_with_policies_deleted() {
		let fixture = Fixture::new();
		let ric = fixture.add_ric("ric1", &["type1"]).await;
		fixture
			.policies
			.put(Policy::new("p1", json!({}), "ric1", "type1", "s1"))
			.await;
		fixture.factory.fake("ric1").set_unreachable(true);

		let result = synchronize_locked(&fixture, &ric).await;

		assert!(result.is_err());
		assert_eq!(ric.state().await, RicState::Unavailable);
		assert!(fixture.policies.is_empty().await);
		assert_eq!(ric.lock().lock_count(), 0);
	}

	#[tokio::test]
	async fn test_concurrent_runs_collapse_into_one_synchronization() {
		let fixture = Fixture::new();
		let ric = fixture.add_ric("ric1", &[]).await;
		let fake = fixture.factory.fake("ric1");

		let gate = Arc::new(Notify::new());
		*fake.delete_all_gate.lock().unwrap() = Some(gate.clone());

		fixture.sync.run(ric.clone());
		// Wait until the first run is inside the synchronization.
		while ric.state().await != RicState::Synchronizing {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
		fixture.sync.run(ric.clone());
		tokio::time::sleep(Duration::from_millis(10)).await;
		gate.notify_one();

		while ric.state().await == RicState::Synchronizing || ric.lock().lock_count() > 0 {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
		assert_eq!(ric.state().await, RicState::Available);
		assert_eq!(fake.delete_all_calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_runs_queued_behind_a_lock_holder_collapse_into_one() {
		let fixture = Fixture::new();
		let ric = fixture.add_ric("ric1", &[]).await;
		let fake = fixture.factory.fake("ric1");

		// Both invocations arrive while someone else holds the lock, so
		// neither has flipped the state to Synchronizing yet.
		let holder = ric.lock().lock(LockMode::Exclusive, "holder").await;
		fixture.sync.run(ric.clone());
		fixture.sync.run(ric.clone());
		tokio::time::sleep(Duration::from_millis(10)).await;
		holder.unlock();

		while ric.state().await != RicState::Available {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
		while ric.lock().lock_count() > 0 {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
		assert_eq!(fake.delete_all_calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_removed_ric_gets_no_notification() {
		let fixture = Fixture::new();
		let ric = fixture.add_ric("ric1", &[]).await;
		fixture
			.services
			.put(Arc::new(Service::new(
				"s1",
				Duration::ZERO,
				Some("http://cb".to_string()),
			)))
			.await;

		// Removed from the repository before the synchronization finishes.
		fixture.rics.remove("ric1").await;
		synchronize_locked(&fixture, &ric).await.unwrap();

		assert!(fixture.sender.sent.lock().unwrap().is_empty());
		assert_ne!(ric.state().await, RicState::Available);
	}

	#[tokio::test]
	async fn test_successful_sync_notifies_registered_services() {
		let fixture = Fixture::new();
		let ric = fixture.add_ric("ric1", &[]).await;
		fixture
			.services
			.put(Arc::new(Service::new(
				"s1",
				Duration::ZERO,
				Some("http://cb".to_string()),
			)))
			.await;

		synchronize_locked(&fixture, &ric).await.unwrap();

		let sent = fixture.sender.sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0], ("http://cb".to_string(), "ric1".to_string()));
	}

	#[tokio::test]
	async fn test_known_type_reused_without_schema_fetch() {
		let fixture = Fixture::new();
		let ric = fixture.add_ric("ric1", &["type1"]).await;
		fixture
			.policy_types
			.put(Arc::new(PolicyType::new("type1", json!({"cached": true}))))
			.await;

		synchronize_locked(&fixture, &ric).await.unwrap();

		// The already-registered schema wins over the Ric-reported one.
		assert_eq!(
			fixture.policy_types.get("type1").await.unwrap().schema,
			json!({"cached": true})
		);
		assert!(ric.is_supporting_type("type1").await);
	}
}
