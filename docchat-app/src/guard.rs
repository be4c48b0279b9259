//! Single-slot in-flight guard for user actions.
//!
//! At most one action (upload, process, ask) runs at a time. A second action
//! started while one is pending is rejected with [`AppError::Busy`]; nothing
//! is queued.

use std::sync::Mutex;

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

#[derive(Debug, Default)]
struct Slot {
    action: Option<&'static str>,
    cancel: Option<CancellationToken>,
}

#[derive(Debug)]
pub struct InFlightGuard {
    permits: Semaphore,
    slot: Mutex<Slot>,
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self { permits: Semaphore::new(1), slot: Mutex::new(Slot::default()) }
    }
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `action`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Busy`] naming the running action if the slot is taken.
    pub fn begin(&self, action: &'static str) -> Result<InFlight<'_>> {
        let Ok(permit) = self.permits.try_acquire() else {
            let running = self.running().unwrap_or("unknown");
            warn!(action, running, "rejected action while another is in flight");
            return Err(AppError::Busy { running });
        };

        let cancel = CancellationToken::new();
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Slot { action: Some(action), cancel: Some(cancel.clone()) };
        }
        debug!(action, "action started");
        Ok(InFlight { guard: self, _permit: permit, cancel })
    }

    /// The action currently holding the slot, if any.
    pub fn running(&self) -> Option<&'static str> {
        self.slot.lock().ok().and_then(|slot| slot.action)
    }

    /// Cancel the running action's remote calls. Returns `false` if idle.
    pub fn cancel_running(&self) -> bool {
        let token = self.slot.lock().ok().and_then(|slot| slot.cancel.clone());
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Proof that an action holds the in-flight slot. Releases it on drop.
#[derive(Debug)]
pub struct InFlight<'a> {
    guard: &'a InFlightGuard,
    _permit: SemaphorePermit<'a>,
    cancel: CancellationToken,
}

impl InFlight<'_> {
    /// Token cancelled by [`InFlightGuard::cancel_running`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.guard.slot.lock() {
            *slot = Slot::default();
        }
    }
}
