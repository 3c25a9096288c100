//! In-memory indexed stores for the four entity kinds
//!
//! Each repository owns its backing maps behind an internal `RwLock` and
//! exposes only atomic operations; callers never see the collections
//! themselves. Single-entity mutations are atomic, but a read is not
//! transactionally consistent with a concurrent write to the same entity.
//! Policies and policy types optionally mirror mutations to a
//! [`crate::infrastructure::store::DurableStore`].

pub mod policies;
pub mod policy_types;
pub mod rics;
pub mod services;

pub use policies::Policies;
pub use policy_types::PolicyTypes;
pub use rics::Rics;
pub use services::Services;

use thiserror::Error;

/// Errors surfaced by repository lookups and invariant checks.
#[derive(Error, Debug)]
pub enum RepositoryError {
	#[error("policy {0} not found")]
	PolicyNotFound(String),

	#[error("policy type {0} not found")]
	TypeNotFound(String),

	#[error("ric {0} not found")]
	RicNotFound(String),

	#[error("service {0} not found")]
	ServiceNotFound(String),

	/// A policy id is already registered with a different type or Ric.
	#[error("policy {0} already exists with a different type or ric")]
	DuplicatePolicy(String),

	/// The policy's type is not in its Ric's supported-type set.
	#[error("type {type_id} not supported by ric {ric_id}")]
	TypeNotSupported { type_id: String, ric_id: String },
}
