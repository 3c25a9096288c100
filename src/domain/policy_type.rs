//! PolicyType entity

use serde::{Deserialize, Serialize};

/// A named JSON schema describing the valid payload shape for policies of
/// this type. Immutable once registered; shared by reference from policies
/// and from each Ric's supported-type set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyType {
	pub id: String,
	/// Opaque JSON schema document as reported by a Ric or loaded from
	/// static configuration. The engine never interprets it.
	pub schema: serde_json::Value,
}

impl PolicyType {
	pub fn new(id: impl Into<String>, schema: serde_json::Value) -> Self {
		Self {
			id: id.into(),
			schema,
		}
	}
}
