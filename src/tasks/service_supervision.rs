//! Service supervision
//!
//! Expires registered services that missed their keep-alive deadline and
//! cascades deletion of their policies, both locally and (best-effort) on
//! the owning Rics. The local removal is authoritative; a failed remote
//! delete is repaired by the next synchronization.

use crate::client::A1ClientFactory;
use crate::domain::Policy;
use crate::infrastructure::events::{Event, EventBus};
use crate::lock::LockMode;
use crate::repository::{Policies, Rics, Services};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Scheduled liveness check over all registered services.
#[derive(Clone)]
pub struct ServiceSupervision {
	services: Arc<Services>,
	policies: Arc<Policies>,
	rics: Arc<Rics>,
	client_factory: Arc<dyn A1ClientFactory>,
	events: Arc<EventBus>,
	interval: Duration,
	is_running: Arc<RwLock<bool>>,
}

impl ServiceSupervision {
	pub fn new(
		services: Arc<Services>,
		policies: Arc<Policies>,
		rics: Arc<Rics>,
		client_factory: Arc<dyn A1ClientFactory>,
		events: Arc<EventBus>,
		interval: Duration,
	) -> Self {
		Self {
			services,
			policies,
			rics,
			client_factory,
			events,
			interval,
			is_running: Arc::new(RwLock::new(false)),
		}
	}

	/// Start the background supervision loop.
	pub async fn start(&self) {
		if *self.is_running.read().await {
			warn!("Service supervision already started");
			return;
		}
		*self.is_running.write().await = true;

		let supervision = self.clone();
		tokio::spawn(async move {
			info!(
				"Starting service supervision (sweep every {:?})",
				supervision.interval
			);
			let mut interval = tokio::time::interval(supervision.interval);
			interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			interval.tick().await;

			while *supervision.is_running.read().await {
				interval.tick().await;
				supervision.check_all_services().await;
			}
			info!("Service supervision stopped");
		});
	}

	/// Stop the background supervision loop.
	pub async fn stop(&self) {
		*self.is_running.write().await = false;
	}

	/// One sweep: remove every expired service and cascade-delete its
	/// policies.
	#[instrument(skip(self))]
	pub async fn check_all_services(&self) {
		for service in self.services.get_all().await {
			if !service.is_expired() {
				continue;
			}
			info!(
				"Service {} expired after {:?} without keep-alive, removing it and its policies",
				service.name(),
				service.time_since_last_ping()
			);
			self.services.remove(service.name()).await;
			self.events.emit(Event::ServiceExpired {
				service_name: service.name().to_string(),
			});
			self.delete_policies_for(service.name()).await;
		}
	}

	/// Delete all policies owned by one service, one remote call in flight
	/// at a time. Each deletion holds a shared lock on the policy's Ric so
	/// it never interleaves with a synchronization of that Ric.
	async fn delete_policies_for(&self, service_name: &str) {
		for policy in self.policies.get_for_service(service_name).await {
			let Some(ric) = self.rics.get(&policy.ric_id).await else {
				// The Ric is gone; local removal is all there is to do.
				self.policies.remove(&policy.id).await;
				continue;
			};

			let _grant = ric.lock().lock(LockMode::Shared, "serviceSupervision").await;
			self.policies.remove(&policy.id).await;
			self.delete_remote(&policy).await;
		}
	}

	/// Best-effort remote delete; failure is logged and ignored.
	async fn delete_remote(&self, policy: &Policy) {
		let Some(ric) = self.rics.get(&policy.ric_id).await else {
			return;
		};
		match self.client_factory.create_client(&ric.config().await).await {
			Ok(client) => {
				if let Err(e) = client.delete_policy(policy).await {
					debug!(
						"Remote delete of policy {} on ric {} failed: {}",
						policy.id, policy.ric_id, e
					);
				}
			}
			Err(e) => debug!(
				"No client for ric {} while deleting policy {}: {}",
				policy.ric_id, policy.id, e
			),
		}
	}
}
