//! A1 Policy Management Engine
//!
//! Keeps a central repository of A1 policies consistent with a fleet of
//! independently operated Near-RT RICs. Clients register as services and
//! mutate policies against the repository; the engine pushes policies to
//! the right Ric, repairs drift through periodic supervision and full
//! resynchronization, and retracts policies when their owning service or
//! target Ric goes away.

pub mod client;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod lock;
pub mod notification;
pub mod repository;
pub mod tasks;

use crate::client::{A1ClientError, A1ClientFactory};
use crate::config::{diff_ric_configs, EngineConfig, RicConfig, RicConfigUpdate};
use crate::domain::{Policy, Ric};
use crate::infrastructure::events::{Event, EventBus};
use crate::infrastructure::store::DurableStore;
use crate::lock::LockMode;
use crate::notification::{CallbackSender, HttpCallbackSender, ServiceNotifier};
use crate::repository::{Policies, PolicyTypes, RepositoryError, Rics, Services};
use crate::tasks::{RicSupervision, ServiceSupervision, SynchronizationTask};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Errors surfaced by engine entry points to the API layer.
#[derive(Error, Debug)]
pub enum EngineError {
	#[error(transparent)]
	Repository(#[from] RepositoryError),

	#[error(transparent)]
	Client(#[from] A1ClientError),
}

/// The assembled policy engine: the four repositories, the synchronization
/// task and the two supervision loops, wired to an externally supplied A1
/// client factory.
pub struct Engine {
	config: EngineConfig,

	/// All known policies.
	pub policies: Arc<Policies>,

	/// All registered policy types.
	pub policy_types: Arc<PolicyTypes>,

	/// All configured Rics.
	pub rics: Arc<Rics>,

	/// All registered services.
	pub services: Arc<Services>,

	/// Event bus for state changes
	pub events: Arc<EventBus>,

	synchronization: SynchronizationTask,
	ric_supervision: RicSupervision,
	service_supervision: ServiceSupervision,
	client_factory: Arc<dyn A1ClientFactory>,

	/// The Ric configuration snapshot currently applied, diffed against on
	/// each refresh.
	applied_ric_configs: RwLock<Vec<RicConfig>>,
}

impl Engine {
	/// Assemble an engine without persistence, delivering service callbacks
	/// over HTTP.
	pub async fn new(config: EngineConfig, client_factory: Arc<dyn A1ClientFactory>) -> Self {
		Self::with_parts(
			config,
			client_factory,
			None,
			Arc::new(HttpCallbackSender::new()),
		)
		.await
	}

	/// Assemble an engine from explicit parts. Repositories are rehydrated
	/// from the durable store when one is given.
	pub async fn with_parts(
		config: EngineConfig,
		client_factory: Arc<dyn A1ClientFactory>,
		store: Option<Arc<dyn DurableStore>>,
		callback_sender: Arc<dyn CallbackSender>,
	) -> Self {
		info!("Initializing policy engine");

		let policies = Arc::new(Policies::new(store.clone()));
		let policy_types = Arc::new(PolicyTypes::new(store));
		let rics = Arc::new(Rics::new());
		let services = Arc::new(Services::new());
		let events = Arc::new(EventBus::default());

		let restored_types = policy_types.restore_from_store().await;
		let restored_policies = policies.restore_from_store().await;
		if restored_types > 0 || restored_policies > 0 {
			info!(
				"Restored {} policy types and {} policies from store",
				restored_types, restored_policies
			);
		}

		let notifier = Arc::new(ServiceNotifier::new(
			services.clone(),
			callback_sender,
			config.notification_concurrency,
		));
		let synchronization = SynchronizationTask::new(
			rics.clone(),
			policies.clone(),
			policy_types.clone(),
			client_factory.clone(),
			notifier,
			events.clone(),
		);
		let ric_supervision = RicSupervision::new(
			rics.clone(),
			policies.clone(),
			client_factory.clone(),
			synchronization.clone(),
			events.clone(),
			Duration::from_millis(config.ric_supervision_interval_ms),
			config.supervision_concurrency,
		);
		let service_supervision = ServiceSupervision::new(
			services.clone(),
			policies.clone(),
			rics.clone(),
			client_factory.clone(),
			events.clone(),
			Duration::from_millis(config.service_supervision_interval_ms),
		);

		Self {
			config,
			policies,
			policy_types,
			rics,
			services,
			events,
			synchronization,
			ric_supervision,
			service_supervision,
			client_factory,
			applied_ric_configs: RwLock::new(Vec::new()),
		}
	}

	/// The engine configuration.
	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Apply the configured Rics and start both supervision loops.
	pub async fn start(&self) {
		info!("Starting policy engine");
		let initial = self.config.rics.clone();
		self.apply_ric_configs(&initial).await;
		self.ric_supervision.start().await;
		self.service_supervision.start().await;
	}

	/// Stop the supervision loops. In-flight synchronizations finish on
	/// their own.
	pub async fn stop(&self) {
		info!("Stopping policy engine");
		self.ric_supervision.stop().await;
		self.service_supervision.stop().await;
	}

	/// Apply a full Ric configuration snapshot, diffing it against the
	/// currently applied one and reacting to each per-Ric change.
	pub async fn apply_ric_configs(&self, new_configs: &[RicConfig]) {
		let updates = {
			let applied = self.applied_ric_configs.read().await;
			diff_ric_configs(&applied, new_configs)
		};
		for update in updates {
			self.apply_ric_config(update).await;
		}
		*self.applied_ric_configs.write().await = new_configs.to_vec();
	}

	/// React to one per-Ric configuration change. A CHANGED update for a Ric
	/// the engine does not know yet is treated as ADDED.
	pub async fn apply_ric_config(&self, update: RicConfigUpdate) {
		match update {
			RicConfigUpdate::Added(config) => self.add_ric(config).await,
			RicConfigUpdate::Changed(config) => match self.rics.get(&config.ric_id).await {
				Some(ric) => {
					info!("Updating configuration of ric {}", config.ric_id);
					ric.update_config(config).await;
				}
				None => self.add_ric(config).await,
			},
			RicConfigUpdate::Removed(config) => self.remove_ric(&config.ric_id).await,
		}
	}

	async fn add_ric(&self, config: RicConfig) {
		info!("Adding ric {}", config.ric_id);
		let ric = Arc::new(Ric::new(config));
		self.rics.put(ric.clone()).await;
		// Best-effort initial synchronization; a failure is repaired by the
		// next supervision sweep.
		self.synchronization.run(ric);
	}

	/// Remove a Ric, cascading deletion of all its policies. The remote
	/// wipe of the orphaned Ric is attempted but not required to succeed.
	async fn remove_ric(&self, ric_id: &str) {
		let Some(ric) = self.rics.remove(ric_id).await else {
			return;
		};
		let _grant = ric.lock().lock(LockMode::Exclusive, "removeRic").await;
		let removed = self.policies.remove_for_ric(ric.id()).await;
		info!("Removed ric {} and {} of its policies", ric.id(), removed.len());
		self.events.emit(Event::RicRemoved {
			ric_id: ric.id().to_string(),
		});

		match self.client_factory.create_client(&ric.config().await).await {
			Ok(client) => {
				if let Err(e) = client.delete_all_policies().await {
					debug!("Wipe of removed ric {} failed: {}", ric.id(), e);
				}
			}
			Err(e) => debug!("No client for removed ric {}: {}", ric.id(), e),
		}
	}

	/// Force a full resynchronization of one Ric, fire-and-forget. A no-op
	/// when a synchronization is already pending for it.
	pub async fn run_synchronization(&self, ric_id: &str) -> Result<(), RepositoryError> {
		let ric = self
			.rics
			.get(ric_id)
			.await
			.ok_or_else(|| RepositoryError::RicNotFound(ric_id.to_string()))?;
		self.synchronization.run(ric);
		Ok(())
	}

	/// Run one endpoint supervision sweep immediately.
	pub async fn check_all_rics(&self) {
		self.ric_supervision.check_all_rics().await;
	}

	/// Run one service supervision sweep immediately.
	pub async fn check_all_services(&self) {
		self.service_supervision.check_all_services().await;
	}

	/// Create or update a policy: validate it against the repository, push
	/// it to the owning Ric under a shared lock, then record it. Transport
	/// and remote errors are surfaced to the caller.
	pub async fn store_policy(&self, policy: Policy) -> Result<(), EngineError> {
		let ric = self
			.rics
			.get(&policy.ric_id)
			.await
			.ok_or_else(|| RepositoryError::RicNotFound(policy.ric_id.clone()))?;
		if !self.policy_types.contains(&policy.type_id).await {
			return Err(RepositoryError::TypeNotFound(policy.type_id.clone()).into());
		}
		if !ric.is_supporting_type(&policy.type_id).await {
			return Err(RepositoryError::TypeNotSupported {
				type_id: policy.type_id.clone(),
				ric_id: policy.ric_id.clone(),
			}
			.into());
		}
		if let Some(existing) = self.policies.get(&policy.id).await {
			if existing.ric_id != policy.ric_id || existing.type_id != policy.type_id {
				return Err(RepositoryError::DuplicatePolicy(policy.id.clone()).into());
			}
		}

		let _grant = ric.lock().lock(LockMode::Shared, "storePolicy").await;
		let client = self.client_factory.create_client(&ric.config().await).await?;
		client.put_policy(&policy).await?;
		self.policies.put(policy).await;
		Ok(())
	}

	/// Delete a policy locally and on its Ric. The local removal is
	/// authoritative; a remote failure is still surfaced so the caller can
	/// decide whether to retry.
	pub async fn delete_policy(&self, policy_id: &str) -> Result<(), EngineError> {
		let policy = self
			.policies
			.get(policy_id)
			.await
			.ok_or_else(|| RepositoryError::PolicyNotFound(policy_id.to_string()))?;
		let ric = self
			.rics
			.get(&policy.ric_id)
			.await
			.ok_or_else(|| RepositoryError::RicNotFound(policy.ric_id.clone()))?;

		let _grant = ric.lock().lock(LockMode::Shared, "deletePolicy").await;
		self.policies.remove(policy_id).await;
		let client = self.client_factory.create_client(&ric.config().await).await?;
		client.delete_policy(&policy).await?;
		Ok(())
	}

	/// Fetch the live status document for one policy from its Ric.
	pub async fn policy_status(&self, policy_id: &str) -> Result<serde_json::Value, EngineError> {
		let policy = self
			.policies
			.get(policy_id)
			.await
			.ok_or_else(|| RepositoryError::PolicyNotFound(policy_id.to_string()))?;
		let ric = self
			.rics
			.get(&policy.ric_id)
			.await
			.ok_or_else(|| RepositoryError::RicNotFound(policy.ric_id.clone()))?;

		let _grant = ric.lock().lock(LockMode::Shared, "policyStatus").await;
		let client = self.client_factory.create_client(&ric.config().await).await?;
		Ok(client.get_policy_status(&policy).await?)
	}
}
