// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Lock-guarded credential storage with real-time expiry tracking.
//!
//! The [`CredentialStore`] owns the single authoritative [`Credential`] for a
//! session and keeps its staleness observable: every swap recomputes the
//! [`SessionStatus`] and, for a future expiry, arms a one-shot timer that
//! flips the status to `Expired` no later than the true expiry instant.
//! Status transitions are serialized by the swap lock and fanned out to an
//! explicit registry of listeners.
//!
//! Network I/O never happens under the lock; only the in-memory swap and
//! timer (re)arm/cancel do.

use std::{
    sync::{Arc, Mutex, Weak, atomic::AtomicU64},
    time::Duration,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::{sync::mpsc, task::AbortHandle};

use super::{error::SessionError, token::Credential};
use crate::common::consts::{EXPIRY_EPSILON, EXPIRY_TIMER_LEAD};

/// Identifier of a registered status listener.
pub type ListenerId = u64;

/// Observable session status derived from the current credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credential is installed.
    LoggedOut,
    /// A valid token is installed, usable until the given instant.
    Ready {
        /// Absolute expiry instant of the current token.
        until: DateTime<Utc>,
    },
    /// The installed token's clock has run out.
    Expired,
}

#[derive(Debug)]
struct StoreState {
    credential: Option<Credential>,
    version: u64,
    last_status: SessionStatus,
    timer: Option<AbortHandle>,
}

/// Lock-guarded holder of the current session credential.
///
/// The backing value is mutated only through the swap entry points; there is
/// no other write path. Listeners receive every status transition exactly
/// once, in swap order.
#[derive(Debug)]
pub struct CredentialStore {
    state: Mutex<StoreState>,
    listeners: DashMap<ListenerId, mpsc::UnboundedSender<SessionStatus>>,
    next_listener_id: AtomicU64,
    /// Self-reference handed to expiry timer tasks so a dropped store makes
    /// its timers inert.
    weak_self: Weak<CredentialStore>,
}

impl CredentialStore {
    /// Creates a new [`CredentialStore`] with no credential installed.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            state: Mutex::new(StoreState {
                credential: None,
                version: 0,
                last_status: SessionStatus::LoggedOut,
                timer: None,
            }),
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
            weak_self: weak.clone(),
        })
    }

    /// Returns the last published session status.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a panic in another thread).
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        self.state.lock().expect("Lock poisoned").last_status
    }

    /// Returns a clone of the current credential, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a panic in another thread).
    #[must_use]
    pub fn current(&self) -> Option<Credential> {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        self.state.lock().expect("Lock poisoned").credential.clone()
    }

    /// Returns the current swap version.
    ///
    /// The version increments on every successful swap. Callers performing
    /// network round trips capture it beforehand and commit results through
    /// [`Self::update_if_version`] so stale completions cannot overwrite
    /// newer state.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a panic in another thread).
    #[must_use]
    pub fn version(&self) -> u64 {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        self.state.lock().expect("Lock poisoned").version
    }

    /// Registers a status listener.
    ///
    /// The returned receiver yields every status transition published after
    /// registration. The registry holds no ownership of the subscriber;
    /// dropping the receiver (or calling [`Self::unsubscribe`]) detaches it.
    #[must_use]
    pub fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<SessionStatus>) {
        let id = self
            .next_listener_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.insert(id, tx);
        (id, rx)
    }

    /// Removes a status listener.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    /// Replaces the current credential through `transform`.
    ///
    /// The transform runs while the swap lock is held and receives the
    /// current credential; returning an error leaves the stored state
    /// untouched. On success the previously armed expiry timer (if any) is
    /// cancelled and the status transition implied by the new expiry instant
    /// is published, with equal statuses suppressed.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by `transform`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned, or if a future expiry must
    /// arm a timer while no Tokio runtime is running.
    pub fn update<F>(&self, transform: F) -> Result<SessionStatus, SessionError>
    where
        F: FnOnce(Option<&Credential>) -> Result<Option<Credential>, SessionError>,
    {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        let mut state = self.state.lock().expect("Lock poisoned");
        let new = transform(state.credential.as_ref())?;
        Ok(self.swap_locked(&mut state, new))
    }

    /// Replaces the current credential only if no other swap happened since
    /// `expected` was captured.
    ///
    /// This is the commit path for operations whose transform was computed
    /// from a network response: a logout (or any other swap) that lands while
    /// the round trip is in flight invalidates the completion.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::StaleCompletion`] when the version moved, and
    /// propagates any error returned by `transform`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned, or if a future expiry must
    /// arm a timer while no Tokio runtime is running.
    pub fn update_if_version<F>(
        &self,
        expected: u64,
        transform: F,
    ) -> Result<SessionStatus, SessionError>
    where
        F: FnOnce(Option<&Credential>) -> Result<Option<Credential>, SessionError>,
    {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        let mut state = self.state.lock().expect("Lock poisoned");
        if state.version != expected {
            return Err(SessionError::StaleCompletion);
        }
        let new = transform(state.credential.as_ref())?;
        Ok(self.swap_locked(&mut state, new))
    }

    fn swap_locked(&self, state: &mut StoreState, new: Option<Credential>) -> SessionStatus {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let old_expiry = state.credential.as_ref().map(|c| c.token.expires_at);
        let new_expiry = new.as_ref().map(|c| c.token.expires_at);
        let expiry_changed = old_expiry != new_expiry;

        state.credential = new;
        state.version += 1;

        let now = Utc::now();
        let epsilon = chrono::Duration::from_std(EXPIRY_EPSILON)
            .unwrap_or_else(|_| chrono::Duration::zero());

        match new_expiry {
            None => {
                if expiry_changed && state.last_status != SessionStatus::LoggedOut {
                    state.last_status = SessionStatus::LoggedOut;
                    self.publish_locked(state.last_status);
                }
            }
            Some(expires_at) if expires_at <= now + epsilon => {
                if expiry_changed && state.last_status != SessionStatus::Expired {
                    state.last_status = SessionStatus::Expired;
                    self.publish_locked(state.last_status);
                }
            }
            Some(expires_at) => {
                let status = SessionStatus::Ready { until: expires_at };
                if expiry_changed && state.last_status != status {
                    state.last_status = status;
                    self.publish_locked(status);
                }
                // The timer was cancelled above, so re-arm even when the
                // expiry instant itself did not move.
                self.arm_timer_locked(state, expires_at, now);
            }
        }

        state.last_status
    }

    /// Arms the one-shot expiry timer for `expires_at`, firing slightly
    /// before the exact instant so the transition is never late.
    fn arm_timer_locked(
        &self,
        state: &mut StoreState,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let until_expiry = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
        let sleep = until_expiry.saturating_sub(EXPIRY_TIMER_LEAD);
        let version = state.version;
        let store = self.weak_self.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(sleep).await;
            if let Some(store) = store.upgrade() {
                store.expire_if_current(version);
            }
        });
        state.timer = Some(handle.abort_handle());
    }

    /// Timer callback: publishes `Expired` unless a newer swap pre-empted
    /// this timer or the status already flipped.
    fn expire_if_current(&self, version: u64) {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        let mut state = self.state.lock().expect("Lock poisoned");
        if state.version != version {
            tracing::trace!("Expiry timer pre-empted by newer credential swap");
            return;
        }
        if state.last_status == SessionStatus::Expired {
            return;
        }
        state.timer = None;
        state.last_status = SessionStatus::Expired;
        tracing::debug!("Session token expired");
        self.publish_locked(SessionStatus::Expired);
    }

    /// Publishes a status to all listeners, pruning any whose receiver has
    /// been dropped. Called with the swap lock held so transitions are
    /// observed in swap order.
    fn publish_locked(&self, status: SessionStatus) {
        let mut dead = Vec::new();
        for entry in &self.listeners {
            if entry.value().send(status).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.listeners.remove(&id);
        }
    }
}
