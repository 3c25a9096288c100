//! Domain entities managed by the policy engine

pub mod policy;
pub mod policy_type;
pub mod ric;
pub mod service;

pub use policy::Policy;
pub use policy_type::PolicyType;
pub use ric::{Ric, RicState};
pub use service::Service;
