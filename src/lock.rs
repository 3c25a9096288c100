//! Per-Ric shared/exclusive lock
//!
//! Every remote mutation of a Ric and of the policies it owns goes through
//! that Ric's lock. Ordinary policy CRUD takes the lock in [`LockMode::Shared`]
//! mode; a full synchronization or a consistency check takes it in
//! [`LockMode::Exclusive`] mode, which excludes everything else.
//!
//! Admission is FIFO-fair: once an exclusive request is queued, shared
//! requests arriving after it wait behind it, so a steady stream of shared
//! holders can never starve a synchronization.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::debug;

/// Acquisition mode for a [`Lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
	/// Many concurrent holders; used by ordinary policy CRUD and reads.
	Shared,
	/// Single holder, excludes all others; used by synchronization and
	/// consistency checks.
	Exclusive,
}

#[derive(Default)]
struct LockState {
	shared_holders: usize,
	exclusive_held: bool,
	queue: VecDeque<Waiter>,
}

struct Waiter {
	mode: LockMode,
	label: String,
	tx: oneshot::Sender<Grant>,
}

impl LockState {
	fn can_admit(&self, mode: LockMode) -> bool {
		match mode {
			LockMode::Shared => !self.exclusive_held,
			LockMode::Exclusive => !self.exclusive_held && self.shared_holders == 0,
		}
	}

	fn admit(&mut self, mode: LockMode) {
		match mode {
			LockMode::Shared => self.shared_holders += 1,
			LockMode::Exclusive => self.exclusive_held = true,
		}
	}

	/// Pop admissible waiters off the queue front, in arrival order.
	fn drain_admissible(&mut self) -> Vec<Waiter> {
		let mut admitted = Vec::new();
		while let Some(front) = self.queue.front() {
			if !self.can_admit(front.mode) {
				break;
			}
			let Some(waiter) = self.queue.pop_front() else {
				break;
			};
			self.admit(waiter.mode);
			admitted.push(waiter);
		}
		admitted
	}
}

/// Mutual-exclusion primitive serializing conflicting operations on one Ric.
pub struct Lock {
	inner: Arc<LockInner>,
}

struct LockInner {
	state: Mutex<LockState>,
}

impl LockInner {
	fn state(&self) -> MutexGuard<'_, LockState> {
		// A poisoned mutex only means a holder panicked mid-update; the
		// state itself is always left consistent, so keep going.
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn release(inner: &Arc<Self>, mode: LockMode) {
		let admitted = {
			let mut state = inner.state();
			match mode {
				LockMode::Shared => {
					state.shared_holders = state.shared_holders.saturating_sub(1);
				}
				LockMode::Exclusive => state.exclusive_held = false,
			}
			state.drain_admissible()
		};

		// Hand out grants outside the state mutex. A waiter that was
		// cancelled while queued rejects the send; dropping the returned
		// grant releases its hold again.
		for waiter in admitted {
			debug!("lock granted to queued waiter '{}'", waiter.label);
			let grant = Grant {
				inner: inner.clone(),
				mode: waiter.mode,
				released: false,
			};
			if let Err(unwanted) = waiter.tx.send(grant) {
				drop(unwanted);
			}
		}
	}
}

impl Lock {
	/// Create a new, unheld lock.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(LockInner {
				state: Mutex::new(LockState::default()),
			}),
		}
	}

	/// Acquire the lock asynchronously. Resolves once the mode's admission
	/// condition holds; never fails and never times out. The `label` names
	/// the acquiring operation for log output.
	pub async fn lock(&self, mode: LockMode, label: &str) -> Grant {
		match self.enqueue(mode, label) {
			Ok(grant) => grant,
			Err(rx) => rx
				.await
				.unwrap_or_else(|_| unreachable!("lock state dropped while grant pending")),
		}
	}

	/// Blocking variant of [`Lock::lock`] for call sites outside the async
	/// pipeline. Must not be called from an async context.
	pub fn lock_blocking(&self, mode: LockMode, label: &str) -> Grant {
		match self.enqueue(mode, label) {
			Ok(grant) => grant,
			Err(rx) => rx
				.blocking_recv()
				.unwrap_or_else(|_| unreachable!("lock state dropped while grant pending")),
		}
	}

	/// Immediate grant if admissible and nothing is queued ahead, otherwise
	/// a receiver that resolves when the waiter is admitted.
	fn enqueue(&self, mode: LockMode, label: &str) -> Result<Grant, oneshot::Receiver<Grant>> {
		let mut state = self.inner.state();
		if state.queue.is_empty() && state.can_admit(mode) {
			state.admit(mode);
			return Ok(Grant {
				inner: self.inner.clone(),
				mode,
				released: false,
			});
		}
		let (tx, rx) = oneshot::channel();
		state.queue.push_back(Waiter {
			mode,
			label: label.to_string(),
			tx,
		});
		Err(rx)
	}

	/// Number of currently active holders. Returns to zero whenever no
	/// grant is outstanding.
	pub fn lock_count(&self) -> usize {
		let state = self.inner.state();
		state.shared_holders + usize::from(state.exclusive_held)
	}
}

impl Default for Lock {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Lock {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state();
		f.debug_struct("Lock")
			.field("shared_holders", &state.shared_holders)
			.field("exclusive_held", &state.exclusive_held)
			.field("queued", &state.queue.len())
			.finish()
	}
}

/// A lock hold. Released exactly once, either explicitly via
/// [`Grant::unlock`] or implicitly on drop, so a grant held across a fallible
/// pipeline is always returned.
pub struct Grant {
	inner: Arc<LockInner>,
	mode: LockMode,
	released: bool,
}

impl Grant {
	/// The mode this grant was acquired in.
	pub fn mode(&self) -> LockMode {
		self.mode
	}

	/// Release the hold. Equivalent to dropping the grant.
	pub fn unlock(mut self) {
		self.release_once();
	}

	fn release_once(&mut self) {
		if !self.released {
			self.released = true;
			LockInner::release(&self.inner, self.mode);
		}
	}
}

impl Drop for Grant {
	fn drop(&mut self) {
		self.release_once();
	}
}
