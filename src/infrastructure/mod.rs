//! Infrastructure shared across the engine

pub mod events;
pub mod store;
