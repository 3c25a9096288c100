//! Endpoint supervision
//!
//! Periodically checks every Ric for drift between the repository and the
//! Ric's reported policy and type sets, and triggers a full synchronization
//! on mismatch or unreachability. One Ric's failure never aborts the sweep
//! of the others.

use crate::client::{A1ClientError, A1ClientFactory};
use crate::domain::{Ric, RicState};
use crate::infrastructure::events::{Event, EventBus};
use crate::lock::LockMode;
use crate::repository::{Policies, Rics};
use crate::tasks::synchronization::{SyncError, SynchronizationTask};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Scheduled consistency-check loop over all configured Rics.
#[derive(Clone)]
pub struct RicSupervision {
	rics: Arc<Rics>,
	policies: Arc<Policies>,
	client_factory: Arc<dyn A1ClientFactory>,
	synchronization: SynchronizationTask,
	events: Arc<EventBus>,
	interval: Duration,
	concurrency: usize,
	is_running: Arc<RwLock<bool>>,
}

impl RicSupervision {
	pub fn new(
		rics: Arc<Rics>,
		policies: Arc<Policies>,
		client_factory: Arc<dyn A1ClientFactory>,
		synchronization: SynchronizationTask,
		events: Arc<EventBus>,
		interval: Duration,
		concurrency: usize,
	) -> Self {
		Self {
			rics,
			policies,
			client_factory,
			synchronization,
			events,
			interval,
			concurrency,
			is_running: Arc::new(RwLock::new(false)),
		}
	}

	/// Start the background supervision loop.
	pub async fn start(&self) {
		if *self.is_running.read().await {
			warn!("Ric supervision already started");
			return;
		}
		*self.is_running.write().await = true;

		let supervision = self.clone();
		tokio::spawn(async move {
			info!(
				"Starting ric supervision (sweep every {:?})",
				supervision.interval
			);
			let mut interval = tokio::time::interval(supervision.interval);
			interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			interval.tick().await;

			while *supervision.is_running.read().await {
				interval.tick().await;
				supervision.check_all_rics().await;
			}
			info!("Ric supervision stopped");
		});
	}

	/// Stop the background supervision loop.
	pub async fn stop(&self) {
		*self.is_running.write().await = false;
	}

	/// One full sweep: check every Ric not already being checked or
	/// synchronized, with bounded concurrency across Rics. Per-Ric errors
	/// are swallowed here; they have already been converted into state
	/// transitions.
	#[instrument(skip(self))]
	pub async fn check_all_rics(&self) {
		let rics = self.rics.get_all().await;
		debug!("Supervision sweep over {} rics", rics.len());

		stream::iter(rics)
			.for_each_concurrent(self.concurrency, |ric| async move {
				match ric.state().await {
					RicState::ConsistencyCheck | RicState::Synchronizing => {
						debug!("Ric {} busy, skipping check", ric.id());
					}
					RicState::Available | RicState::Unavailable => {
						if let Err(e) = self.check_ric(&ric).await {
							warn!("Consistency check of ric {} failed: {}", ric.id(), e);
						}
					}
				}
			})
			.await;
	}

	/// Check one Ric under its exclusive lock. An unavailable Ric needs a
	/// resync without any live check; an available one is compared against
	/// the repository and resynced on drift.
	async fn check_ric(&self, ric: &Arc<Ric>) -> Result<(), SyncError> {
		let _grant = ric.lock().lock(LockMode::Exclusive, "consistencyCheck").await;

		match ric.state().await {
			// Became busy while we waited for the lock.
			RicState::ConsistencyCheck | RicState::Synchronizing => return Ok(()),
			RicState::Unavailable => {
				info!("Ric {} is unavailable, synchronizing", ric.id());
				return self.synchronization.synchronize(ric).await;
			}
			RicState::Available => {}
		}

		ric.set_state(RicState::ConsistencyCheck).await;
		match self.find_drift(ric).await {
			Ok(true) => self.synchronization.synchronize(ric).await,
			Ok(false) => {
				ric.set_state(RicState::Available).await;
				Ok(())
			}
			Err(e) => {
				error!("Ric {} unreachable during check: {}", ric.id(), e);
				ric.set_state(RicState::Unavailable).await;
				self.events.emit(Event::RicUnavailable {
					ric_id: ric.id().to_string(),
				});
				Err(e.into())
			}
		}
	}

	/// Compare the Ric's live policy and type identities against the
	/// repository. Any count or membership mismatch means drift.
	async fn find_drift(&self, ric: &Arc<Ric>) -> Result<bool, A1ClientError> {
		let client = self.client_factory.create_client(&ric.config().await).await?;

		let remote_policies: HashSet<String> =
			client.get_policy_identities().await?.into_iter().collect();
		let local_policies: HashSet<String> = self
			.policies
			.get_for_ric(ric.id())
			.await
			.iter()
			.map(|p| p.id.clone())
			.collect();
		if remote_policies != local_policies {
			info!(
				"Policy drift on ric {}: {} remote vs {} local",
				ric.id(),
				remote_policies.len(),
				local_policies.len()
			);
			return Ok(true);
		}

		let remote_types: HashSet<String> = client
			.get_policy_type_identities()
			.await?
			.into_iter()
			.collect();
		let local_types: HashSet<String> =
			ric.supported_type_ids().await.into_iter().collect();
		if remote_types != local_types {
			info!("Policy type drift on ric {}", ric.id());
			return Ok(true);
		}

		Ok(false)
	}
}
