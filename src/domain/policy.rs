//! Policy entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One A1 policy instance, targeted at one Ric and owned by one service.
///
/// Policies are immutable values; an update replaces the stored entry under
/// the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
	/// Unique across the whole repository.
	pub id: String,
	/// Opaque policy payload, validated against the type schema at the API
	/// boundary.
	pub json: serde_json::Value,
	/// The Ric this policy is pushed to.
	pub ric_id: String,
	/// The policy type the payload conforms to.
	pub type_id: String,
	/// The registered service that owns this policy.
	pub owner_service_id: String,
	pub last_modified: DateTime<Utc>,
	/// Transient policies are never persisted and are dropped instead of
	/// recreated by a synchronization.
	#[serde(default)]
	pub is_transient: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status_notification_uri: Option<String>,
}

impl Policy {
	/// Convenience constructor for a non-transient policy.
	pub fn new(
		id: impl Into<String>,
		json: serde_json::Value,
		ric_id: impl Into<String>,
		type_id: impl Into<String>,
		owner_service_id: impl Into<String>,
	) -> Self {
		Self {
			id: id.into(),
			json,
			ric_id: ric_id.into(),
			type_id: type_id.into(),
			owner_service_id: owner_service_id.into(),
			last_modified: Utc::now(),
			is_transient: false,
			status_notification_uri: None,
		}
	}

	/// Same policy with the transient flag set.
	pub fn transient(mut self) -> Self {
		self.is_transient = true;
		self
	}
}
