//! Reconciliation and supervision tasks

pub mod ric_supervision;
pub mod service_supervision;
pub mod synchronization;

pub use ric_supervision::RicSupervision;
pub use service_supervision::ServiceSupervision;
pub use synchronization::{SyncError, SynchronizationTask};
