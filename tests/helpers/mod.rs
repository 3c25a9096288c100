//! Test doubles shared by the integration tests.

use a1pms_core::client::{A1Client, A1ClientError, A1ClientFactory, A1ClientResult};
use a1pms_core::config::RicConfig;
use a1pms_core::domain::Policy;
use a1pms_core::notification::{AvailabilityEvent, CallbackSender};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// In-memory stand-in for one Ric's remote A1 state.
#[derive(Default)]
pub struct FakeRic {
	pub types: Mutex<HashMap<String, serde_json::Value>>,
	pub policies: Mutex<HashMap<String, serde_json::Value>>,
	pub unreachable: AtomicBool,
}

impl FakeRic {
	pub fn with_types(type_ids: &[&str]) -> Arc<Self> {
		let fake = Self::default();
		{
			let mut types = fake.types.lock().unwrap();
			for id in type_ids {
				types.insert(id.to_string(), serde_json::json!({"title": id}));
			}
		}
		Arc::new(fake)
	}

	pub fn policy_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.policies.lock().unwrap().keys().cloned().collect();
		ids.sort();
		ids
	}

	pub fn set_unreachable(&self, unreachable: bool) {
		self.unreachable.store(unreachable, Ordering::SeqCst);
	}

	fn check_reachable(&self, ric_id: &str) -> A1ClientResult<()> {
		if self.unreachable.load(Ordering::SeqCst) {
			return Err(A1ClientError::Transport {
				ric_id: ric_id.to_string(),
				message: "connection refused".to_string(),
			});
		}
		Ok(())
	}
}

pub struct FakeClient {
	ric_id: String,
	fake: Arc<FakeRic>,
}

#[async_trait]
impl A1Client for FakeClient {
	async fn get_policy_type_identities(&self) -> A1ClientResult<Vec<String>> {
		self.fake.check_reachable(&self.ric_id)?;
		Ok(self.fake.types.lock().unwrap().keys().cloned().collect())
	}

	async fn get_policy_type_schema(&self, type_id: &str) -> A1ClientResult<serde_json::Value> {
		self.fake.check_reachable(&self.ric_id)?;
		self.fake
			.types
			.lock()
			.unwrap()
			.get(type_id)
			.cloned()
			.ok_or_else(|| A1ClientError::Remote {
				ric_id: self.ric_id.clone(),
				status: 404,
				message: format!("unknown type {type_id}"),
			})
	}

	async fn get_policy_identities(&self) -> A1ClientResult<Vec<String>> {
		self.fake.check_reachable(&self.ric_id)?;
		Ok(self.fake.policy_ids())
	}

	async fn put_policy(&self, policy: &Policy) -> A1ClientResult<()> {
		self.fake.check_reachable(&self.ric_id)?;
		self.fake
			.policies
			.lock()
			.unwrap()
			.insert(policy.id.clone(), policy.json.clone());
		Ok(())
	}

	async fn delete_policy(&self, policy: &Policy) -> A1ClientResult<()> {
		self.fake.check_reachable(&self.ric_id)?;
		self.fake.policies.lock().unwrap().remove(&policy.id);
		Ok(())
	}

	async fn delete_all_policies(&self) -> A1ClientResult<()> {
		self.fake.check_reachable(&self.ric_id)?;
		self.fake.policies.lock().unwrap().clear();
		Ok(())
	}

	async fn get_policy_status(&self, policy: &Policy) -> A1ClientResult<serde_json::Value> {
		self.fake.check_reachable(&self.ric_id)?;
		Ok(serde_json::json!({"policy_id": policy.id, "enforced": true}))
	}
}

/// Factory handing out [`FakeClient`]s backed by per-Ric fakes.
#[derive(Default)]
pub struct FakeClientFactory {
	rics: Mutex<HashMap<String, Arc<FakeRic>>>,
}

impl FakeClientFactory {
	pub fn register(&self, ric_id: &str, fake: Arc<FakeRic>) {
		self.rics.lock().unwrap().insert(ric_id.to_string(), fake);
	}

	pub fn fake(&self, ric_id: &str) -> Arc<FakeRic> {
		self.rics
			.lock()
			.unwrap()
			.get(ric_id)
			.cloned()
			.expect("fake ric registered")
	}
}

#[async_trait]
impl A1ClientFactory for FakeClientFactory {
	async fn create_client(&self, ric: &RicConfig) -> A1ClientResult<Arc<dyn A1Client>> {
		let fake = self.rics.lock().unwrap().get(&ric.ric_id).cloned().ok_or(
			A1ClientError::Transport {
				ric_id: ric.ric_id.clone(),
				message: "unknown ric".to_string(),
			},
		)?;
		Ok(Arc::new(FakeClient {
			ric_id: ric.ric_id.clone(),
			fake,
		}))
	}
}

/// Callback sender recording deliveries instead of doing HTTP.
#[derive(Default)]
pub struct RecordingSender {
	pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl CallbackSender for RecordingSender {
	async fn send(&self, url: &str, event: &AvailabilityEvent) -> anyhow::Result<()> {
		self.sent
			.lock()
			.unwrap()
			.push((url.to_string(), event.ric_id.clone()));
		Ok(())
	}
}

pub fn ric_config(id: &str) -> RicConfig {
	RicConfig {
		ric_id: id.to_string(),
		base_url: Url::parse("http://localhost:8081").unwrap(),
		managed_element_ids: Vec::new(),
		controller_name: None,
	}
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until<F, Fut>(condition: F)
where
	F: Fn() -> Fut,
	Fut: Future<Output = bool>,
{
	for _ in 0..200 {
		if condition().await {
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("condition not reached within 2s");
}
