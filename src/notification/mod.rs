//! Availability notification fan-out
//!
//! When a Ric comes back after a successful synchronization, every
//! registered service with a callback URL gets told. Delivery is always
//! best-effort: a dead callback never affects other services or the
//! synchronization result.

use crate::repository::Services;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Callback body sent to a service when a Ric becomes available.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityEvent {
	pub ric_id: String,
	pub event_type: &'static str,
}

impl AvailabilityEvent {
	pub fn available(ric_id: &str) -> Self {
		Self {
			ric_id: ric_id.to_string(),
			event_type: "AVAILABLE",
		}
	}
}

/// Transport seam for delivering one callback.
#[async_trait]
pub trait CallbackSender: Send + Sync {
	async fn send(&self, url: &str, event: &AvailabilityEvent) -> anyhow::Result<()>;
}

/// HTTP callback delivery. A non-2xx response counts as a failure.
pub struct HttpCallbackSender {
	http: reqwest::Client,
}

impl HttpCallbackSender {
	pub fn new() -> Self {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(10))
			.build()
			.unwrap_or_default();
		Self { http }
	}
}

impl Default for HttpCallbackSender {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
	async fn send(&self, url: &str, event: &AvailabilityEvent) -> anyhow::Result<()> {
		self.http
			.post(url)
			.json(event)
			.send()
			.await?
			.error_for_status()?;
		Ok(())
	}
}

/// Fans availability events out to all registered services.
pub struct ServiceNotifier {
	services: Arc<Services>,
	sender: Arc<dyn CallbackSender>,
	concurrency: usize,
}

impl ServiceNotifier {
	pub fn new(services: Arc<Services>, sender: Arc<dyn CallbackSender>, concurrency: usize) -> Self {
		Self {
			services,
			sender,
			concurrency,
		}
	}

	/// Notify every service with a callback URL that `ric_id` is available.
	pub async fn notify_ric_available(&self, ric_id: &str) {
		let targets: Vec<(String, String)> = self
			.services
			.get_all()
			.await
			.into_iter()
			.filter_map(|service| {
				service
					.callback_url()
					.map(|url| (service.name().to_string(), url.to_string()))
			})
			.collect();
		if targets.is_empty() {
			return;
		}

		let event = AvailabilityEvent::available(ric_id);
		stream::iter(targets)
			.for_each_concurrent(self.concurrency, |(service_name, url)| {
				let event = event.clone();
				async move {
					match self.sender.send(&url, &event).await {
						Ok(()) => debug!(
							"Notified service {} that ric {} is available",
							service_name, event.ric_id
						),
						Err(e) => warn!(
							"Availability callback to service {} at {} failed: {}",
							service_name, url, e
						),
					}
				}
			})
			.await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::Service;
	use std::sync::Mutex;

	/// Records deliveries; URLs containing "fail" are rejected.
	#[derive(Default)]
	struct RecordingSender {
		sent: Mutex<Vec<(String, String)>>,
	}

	#[async_trait]
	impl CallbackSender for RecordingSender {
		async fn send(&self, url: &str, event: &AvailabilityEvent) -> anyhow::Result<()> {
			if url.contains("fail") {
				anyhow::bail!("connection refused");
			}
			self.sent
				.lock()
				.unwrap()
				.push((url.to_string(), event.ric_id.clone()));
			Ok(())
		}
	}

	#[tokio::test]
	async fn test_notifies_services_with_callbacks() {
		let services = Arc::new(Services::new());
		services
			.put(Arc::new(Service::new(
				"with-callback",
				Duration::ZERO,
				Some("http://cb1".to_string()),
			)))
			.await;
		services
			.put(Arc::new(Service::new("no-callback", Duration::ZERO, None)))
			.await;

		let sender = Arc::new(RecordingSender::default());
		let notifier = ServiceNotifier::new(services, sender.clone(), 10);
		notifier.notify_ric_available("ric1").await;

		let sent = sender.sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0], ("http://cb1".to_string(), "ric1".to_string()));
	}

	#[tokio::test]
	async fn test_failures_do_not_affect_other_services() {
		let services = Arc::new(Services::new());
		services
			.put(Arc::new(Service::new(
				"broken",
				Duration::ZERO,
				Some("http://fail".to_string()),
			)))
			.await;
		services
			.put(Arc::new(Service::new(
				"healthy",
				Duration::ZERO,
				Some("http://cb2".to_string()),
			)))
			.await;

		let sender = Arc::new(RecordingSender::default());
		let notifier = ServiceNotifier::new(services, sender.clone(), 10);
		notifier.notify_ric_available("ric1").await;

		let sent = sender.sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].0, "http://cb2");
	}
}
