//! A1 protocol client abstraction
//!
//! The wire client is supplied externally per protocol version; the engine
//! only consumes this capability-typed interface. Every call is non-blocking
//! and may fail either on the transport or with a remote-reported error.
//! The engine treats both as "Ric unreachable/inconsistent".

use crate::config::RicConfig;
use crate::domain::Policy;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by an A1 client.
#[derive(Error, Debug)]
pub enum A1ClientError {
	/// The remote call did not complete.
	#[error("transport error talking to ric {ric_id}: {message}")]
	Transport { ric_id: String, message: String },

	/// The remote call completed but the Ric reported an error status.
	#[error("ric {ric_id} rejected request with status {status}: {message}")]
	Remote {
		ric_id: String,
		status: u16,
		message: String,
	},
}

/// Result alias for A1 client operations.
pub type A1ClientResult<T> = Result<T, A1ClientError>;

/// Versioned A1 protocol client for one Ric.
#[async_trait]
pub trait A1Client: Send + Sync {
	/// Identities of the policy types the Ric supports.
	async fn get_policy_type_identities(&self) -> A1ClientResult<Vec<String>>;

	/// JSON schema for one policy type.
	async fn get_policy_type_schema(&self, type_id: &str) -> A1ClientResult<serde_json::Value>;

	/// Identities of the policy instances currently live on the Ric.
	async fn get_policy_identities(&self) -> A1ClientResult<Vec<String>>;

	/// Create or replace one policy instance.
	async fn put_policy(&self, policy: &Policy) -> A1ClientResult<()>;

	/// Delete one policy instance.
	async fn delete_policy(&self, policy: &Policy) -> A1ClientResult<()>;

	/// Delete every policy instance on the Ric.
	async fn delete_all_policies(&self) -> A1ClientResult<()>;

	/// Status document for one policy instance.
	async fn get_policy_status(&self, policy: &Policy) -> A1ClientResult<serde_json::Value>;
}

/// Creates a protocol client for a Ric, selecting the protocol version the
/// Ric speaks.
#[async_trait]
pub trait A1ClientFactory: Send + Sync {
	async fn create_client(&self, ric: &RicConfig) -> A1ClientResult<Arc<dyn A1Client>>;
}
