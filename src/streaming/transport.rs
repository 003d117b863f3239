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

//! Seam to the vendor-supplied low-level streaming transport.
//!
//! The transport owns connection establishment, protocol selection and
//! reconnection back-off; this crate only consumes its subscribe/unsubscribe
//! surface and the per-frame delegate callbacks, delivered here as
//! [`TransportEvent`]s on a channel.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use ahash::AHashMap;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use ustr::Ustr;

use super::error::StreamingError;
use crate::common::enums::{ConnectionStatus, SubscriptionMode};

/// Identifier of a network-level subscription assigned by the transport.
pub type TransportSubId = u64;

/// Parameters of one network-level subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionRequest {
    /// Delivery semantics.
    pub mode: SubscriptionMode,
    /// Item names to subscribe.
    pub items: Vec<Ustr>,
    /// Field names to receive.
    pub fields: Vec<Ustr>,
    /// Whether an initial catch-up snapshot is requested.
    pub snapshot: bool,
    /// Maximum update frequency in updates per second, if limited.
    pub max_frequency: Option<f64>,
}

/// Events delivered by the transport delegate.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// A push frame for one item of one subscription.
    Update {
        /// Network-level subscription the frame belongs to.
        sub_id: TransportSubId,
        /// Item name.
        item: Ustr,
        /// Full set of field values known at push time (null values allowed).
        fields: AHashMap<Ustr, Option<String>>,
        /// Names of the fields that changed since the prior push.
        changed: Vec<Ustr>,
    },
    /// The server acknowledged a subscription.
    Subscribed {
        /// The acknowledged subscription.
        sub_id: TransportSubId,
    },
    /// The server rejected a subscription.
    SubscriptionFailed {
        /// The rejected subscription.
        sub_id: TransportSubId,
        /// Server-provided reason.
        reason: String,
    },
    /// Connection status changed.
    Status(ConnectionStatus),
}

/// Vendor streaming session surface consumed by the multiplexer.
#[async_trait]
pub trait StreamingTransport: Send + Sync + 'static {
    /// Establishes the physical connection and registers the event channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(
        &self,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<(), StreamingError>;

    /// Tears down the physical connection.
    async fn disconnect(&self);

    /// Requests a network-level subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be submitted; server-side
    /// rejection arrives asynchronously as
    /// [`TransportEvent::SubscriptionFailed`].
    async fn subscribe(
        &self,
        request: SubscriptionRequest,
    ) -> Result<TransportSubId, StreamingError>;

    /// Removes a network-level subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be submitted.
    async fn unsubscribe(&self, sub_id: TransportSubId) -> Result<(), StreamingError>;
}

/// In-memory transport double for tests.
///
/// Auto-acknowledges subscriptions (unless an item is marked to fail) and
/// lets tests push frames and connection-status changes.
#[derive(Debug, Default)]
pub struct MockTransport {
    next_id: AtomicU64,
    connected: AtomicBool,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    active: DashMap<TransportSubId, SubscriptionRequest>,
    fail_items: DashMap<Ustr, String>,
    unsubscribed: Mutex<Vec<TransportSubId>>,
}

impl MockTransport {
    /// Creates a new [`MockTransport`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Marks an item so the next subscription containing it is rejected.
    pub fn fail_item(&self, item: &str, reason: &str) {
        self.fail_items
            .insert(Ustr::from(item), reason.to_string());
    }

    /// Returns the live subscription requests keyed by transport id.
    #[must_use]
    pub fn active_subscriptions(&self) -> Vec<(TransportSubId, SubscriptionRequest)> {
        self.active
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    /// Returns the transport id of the live subscription containing `item`.
    #[must_use]
    pub fn find_subscription(&self, item: &str) -> Option<TransportSubId> {
        let item = Ustr::from(item);
        self.active
            .iter()
            .find(|e| e.value().items.contains(&item))
            .map(|e| *e.key())
    }

    /// Returns the ids passed to `unsubscribe` so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a panic in another thread).
    #[must_use]
    pub fn unsubscribed_ids(&self) -> Vec<TransportSubId> {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        self.unsubscribed.lock().expect("Lock poisoned").clone()
    }

    /// Pushes an update frame for a live subscription.
    pub fn push_update(
        &self,
        sub_id: TransportSubId,
        item: &str,
        fields: &[(&str, Option<&str>)],
        changed: &[&str],
    ) {
        self.emit(TransportEvent::Update {
            sub_id,
            item: Ustr::from(item),
            fields: fields
                .iter()
                .map(|(k, v)| (Ustr::from(k), v.map(String::from)))
                .collect(),
            changed: changed.iter().map(|f| Ustr::from(f)).collect(),
        });
    }

    /// Pushes a connection status change.
    pub fn push_status(&self, status: ConnectionStatus) {
        self.emit(TransportEvent::Status(status));
    }

    fn emit(&self, event: TransportEvent) {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        if let Some(tx) = self.events.lock().expect("Lock poisoned").as_ref() {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl StreamingTransport for MockTransport {
    async fn connect(
        &self,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<(), StreamingError> {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        *self.events.lock().expect("Lock poisoned") = Some(events);
        self.connected.store(true, Ordering::Relaxed);
        self.emit(TransportEvent::Status(ConnectionStatus::ConnectedStreaming));
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
        self.active.clear();
        self.emit(TransportEvent::Status(ConnectionStatus::Disconnected));
    }

    async fn subscribe(
        &self,
        request: SubscriptionRequest,
    ) -> Result<TransportSubId, StreamingError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(StreamingError::NotConnected);
        }

        let sub_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rejection = request
            .items
            .iter()
            .find_map(|item| self.fail_items.get(item).map(|r| r.clone()));

        match rejection {
            Some(reason) => self.emit(TransportEvent::SubscriptionFailed { sub_id, reason }),
            None => {
                self.active.insert(sub_id, request);
                self.emit(TransportEvent::Subscribed { sub_id });
            }
        }
        Ok(sub_id)
    }

    async fn unsubscribe(&self, sub_id: TransportSubId) -> Result<(), StreamingError> {
        self.active.remove(&sub_id);
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        self.unsubscribed.lock().expect("Lock poisoned").push(sub_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn request(items: &[&str]) -> SubscriptionRequest {
        SubscriptionRequest {
            mode: SubscriptionMode::Merge,
            items: items.iter().map(|i| Ustr::from(i)).collect(),
            fields: vec![Ustr::from("BID")],
            snapshot: true,
            max_frequency: None,
        }
    }

    #[tokio::test]
    async fn test_subscribe_before_connect_fails() {
        let transport = MockTransport::new();
        let result = transport.subscribe(request(&["A"])).await;

        assert!(matches!(result, Err(StreamingError::NotConnected)));
    }

    #[tokio::test]
    async fn test_subscribe_auto_acks() {
        let transport = MockTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.connect(tx).await.unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Status(ConnectionStatus::ConnectedStreaming))
        ));

        let sub_id = transport.subscribe(request(&["A"])).await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Subscribed { sub_id: id }) if id == sub_id
        ));
        assert_eq!(transport.find_subscription("A"), Some(sub_id));
    }

    #[tokio::test]
    async fn test_failed_item_rejects_subscription() {
        let transport = MockTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.connect(tx).await.unwrap();
        let _ = rx.recv().await;

        transport.fail_item("B", "unknown item");
        let sub_id = transport.subscribe(request(&["B"])).await.unwrap();

        match rx.recv().await {
            Some(TransportEvent::SubscriptionFailed { sub_id: id, reason }) => {
                assert_eq!(id, sub_id);
                assert_eq!(reason, "unknown item");
            }
            other => panic!("Expected SubscriptionFailed, got {other:?}"),
        }
        assert!(transport.find_subscription("B").is_none());
    }

    #[rstest]
    fn test_push_without_connection_is_noop() {
        let transport = MockTransport::new();
        transport.push_update(1, "A", &[("BID", Some("1.0"))], &["BID"]);
    }
}
