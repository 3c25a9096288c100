//! Service entity and keep-alive bookkeeping

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A registered client (R-APP) that owns policies and must periodically
/// prove liveness via keep-alive pings.
pub struct Service {
	name: String,
	keep_alive_interval: Duration,
	callback_url: Option<String>,
	last_ping: Mutex<Instant>,
}

impl Service {
	/// Register a service. A zero `keep_alive_interval` means the service
	/// never expires.
	pub fn new(
		name: impl Into<String>,
		keep_alive_interval: Duration,
		callback_url: Option<String>,
	) -> Self {
		Self {
			name: name.into(),
			keep_alive_interval,
			callback_url,
			last_ping: Mutex::new(Instant::now()),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn keep_alive_interval(&self) -> Duration {
		self.keep_alive_interval
	}

	pub fn callback_url(&self) -> Option<&str> {
		self.callback_url.as_deref()
	}

	/// Record a keep-alive ping, resetting the expiry clock.
	pub fn keep_alive(&self) {
		*self.last_ping() = Instant::now();
	}

	/// Time since the last keep-alive ping (or registration).
	pub fn time_since_last_ping(&self) -> Duration {
		self.last_ping().elapsed()
	}

	/// Whether the service has outlived its keep-alive interval.
	pub fn is_expired(&self) -> bool {
		!self.keep_alive_interval.is_zero() && self.time_since_last_ping() > self.keep_alive_interval
	}

	fn last_ping(&self) -> std::sync::MutexGuard<'_, Instant> {
		self.last_ping.lock().unwrap_or_else(|e| e.into_inner())
	}
}

impl std::fmt::Debug for Service {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Service")
			.field("name", &self.name)
			.field("keep_alive_interval", &self.keep_alive_interval)
			.field("callback_url", &self.callback_url)
			.finish()
	}
}
