//! Event bus for decoupled communication
//!
//! Carries engine state changes to whatever outer layer (HTTP API, daemon
//! shell) cares to observe them. Emission is best-effort; no receiver is
//! required.

use tokio::sync::broadcast;

/// Engine-level events.
#[derive(Debug, Clone)]
pub enum Event {
	/// A Ric entered a full synchronization.
	RicSynchronizing { ric_id: String },

	/// A Ric became available after a successful check or synchronization.
	RicAvailable { ric_id: String },

	/// A Ric became unavailable after a failed check or synchronization.
	RicUnavailable { ric_id: String },

	/// A Ric was removed from the configuration, cascading deletion of its
	/// policies.
	RicRemoved { ric_id: String },

	/// A service missed its keep-alive deadline and was removed together
	/// with its policies.
	ServiceExpired { service_name: String },
}

/// Broadcast fan-out of engine events to any number of observers.
pub struct EventBus {
	sender: broadcast::Sender<Event>,
}

impl EventBus {
	/// A bus retaining up to `capacity` undelivered events per receiver;
	/// a receiver that lags further behind loses the oldest ones.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publish one event to every current subscriber.
	pub fn emit(&self, event: Event) {
		// A send error only means nobody is subscribed right now.
		let _ = self.sender.send(event);
	}

	/// A new receiver observing every event emitted after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}
