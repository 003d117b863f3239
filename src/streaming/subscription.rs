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

//! Logical subscription model and lifecycle state machine.

use ahash::AHashMap;
use tokio::sync::mpsc;
use ustr::Ustr;

use super::{error::StreamingError, transport::TransportSubId, update::ItemUpdate};
use crate::common::enums::SubscriptionMode;

/// Identifier of a logical subscription within the registry.
pub type SubscriptionId = u64;

/// Identifier of one consumer attached to a logical subscription.
pub type ConsumerId = u64;

/// Event delivered to subscription consumers.
pub type SubscriptionEvent = Result<ItemUpdate, StreamingError>;

/// Lifecycle of a logical subscription.
///
/// A subscription starts [`Inactive`](Self::Inactive), becomes
/// [`Pending`](Self::Pending) once submitted to the transport, and
/// [`Subscribed`](Self::Subscribed) when the server acknowledges it. An
/// unsubscribe or a disconnection returns it to inactive; it may cycle
/// through the active states repeatedly across reconnects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Not registered with the transport.
    #[default]
    Inactive,
    /// Submitted to the transport, awaiting server acknowledgment.
    Pending,
    /// Acknowledged by the server; updates are flowing.
    Subscribed,
}

impl SubscriptionState {
    /// Returns whether the subscription is registered with the transport.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

/// Second-level behavior of a COMMAND-mode subscription.
///
/// When configured, every distinct key observed in the first-level stream
/// spawns a mono-item MERGE subscription carrying these fields, torn down
/// when the key is deleted.
#[derive(Clone, Debug, PartialEq)]
pub struct SecondLevelConfig {
    /// Field carrying the key value in first-level updates.
    pub key_field: Ustr,
    /// Field carrying the command action in first-level updates.
    pub command_field: Ustr,
    /// Fields requested on second-level subscriptions.
    pub fields: Vec<Ustr>,
}

impl SecondLevelConfig {
    /// Creates a new [`SecondLevelConfig`] with the conventional `KEY` and
    /// `COMMAND` field names.
    #[must_use]
    pub fn new(fields: Vec<Ustr>) -> Self {
        Self {
            key_field: Ustr::from("KEY"),
            command_field: Ustr::from("COMMAND"),
            fields,
        }
    }
}

/// Parameters of a logical subscription.
///
/// Items and fields are fixed at construction; the registry never mutates
/// them while the subscription is active.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionConfig {
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
    /// Two-level behavior, COMMAND mode only.
    pub second_level: Option<SecondLevelConfig>,
}

impl SubscriptionConfig {
    /// Creates a MERGE subscription with a snapshot requested.
    #[must_use]
    pub fn merge(items: Vec<Ustr>, fields: Vec<Ustr>) -> Self {
        Self {
            mode: SubscriptionMode::Merge,
            items,
            fields,
            snapshot: true,
            max_frequency: None,
            second_level: None,
        }
    }

    /// Creates a DISTINCT subscription without a snapshot.
    #[must_use]
    pub fn distinct(items: Vec<Ustr>, fields: Vec<Ustr>) -> Self {
        Self {
            mode: SubscriptionMode::Distinct,
            items,
            fields,
            snapshot: false,
            max_frequency: None,
            second_level: None,
        }
    }

    /// Creates a COMMAND subscription with a snapshot requested.
    #[must_use]
    pub fn command(items: Vec<Ustr>, fields: Vec<Ustr>) -> Self {
        Self {
            mode: SubscriptionMode::Command,
            items,
            fields,
            snapshot: true,
            max_frequency: None,
            second_level: None,
        }
    }

    /// Sets the maximum update frequency.
    #[must_use]
    pub fn with_max_frequency(mut self, updates_per_sec: f64) -> Self {
        self.max_frequency = Some(updates_per_sec);
        self
    }

    /// Enables two-level behavior with the given second-level fields.
    #[must_use]
    pub fn with_second_level(mut self, fields: Vec<Ustr>) -> Self {
        self.second_level = Some(SecondLevelConfig::new(fields));
        self
    }

    /// Returns the multiplexing key for this configuration.
    #[must_use]
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(self.mode, &self.items, &self.fields)
    }
}

/// Distinct (mode, item-set, field-set) identity of a network subscription.
///
/// At most one network-level subscription exists per key; further subscribe
/// calls with the same key attach additional consumers to the existing one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    mode: SubscriptionMode,
    items: Vec<Ustr>,
    fields: Vec<Ustr>,
}

impl SubscriptionKey {
    /// Creates a new [`SubscriptionKey`], normalizing item and field order.
    #[must_use]
    pub fn new(mode: SubscriptionMode, items: &[Ustr], fields: &[Ustr]) -> Self {
        let mut items = items.to_vec();
        let mut fields = fields.to_vec();
        items.sort_unstable();
        items.dedup();
        fields.sort_unstable();
        fields.dedup();
        Self {
            mode,
            items,
            fields,
        }
    }
}

/// Registry-internal record of one logical subscription.
#[derive(Debug)]
pub(crate) struct SubscriptionEntry {
    pub config: SubscriptionConfig,
    pub state: SubscriptionState,
    pub transport_id: Option<TransportSubId>,
    pub consumers: AHashMap<ConsumerId, mpsc::UnboundedSender<SubscriptionEvent>>,
    /// COMMAND two-level children, keyed by first-level key value.
    pub children: AHashMap<Ustr, SubscriptionId>,
    /// Owning first-level subscription for a two-level child.
    pub parent: Option<SubscriptionId>,
}

impl SubscriptionEntry {
    pub fn new(config: SubscriptionConfig) -> Self {
        Self {
            config,
            state: SubscriptionState::Inactive,
            transport_id: None,
            consumers: AHashMap::new(),
            children: AHashMap::new(),
            parent: None,
        }
    }

    /// Delivers an event to every consumer, pruning closed channels.
    pub fn fan_out(&mut self, event: &SubscriptionEvent) {
        self.consumers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

/// Consumer-side handle to a logical subscription's update stream.
///
/// Dropping the handle stops delivery to this consumer; call
/// `IgStreamingClient::unsubscribe` to also release the network subscription
/// when no consumers remain.
#[derive(Debug)]
pub struct SubscriptionHandle {
    /// Logical subscription this handle is attached to.
    pub id: SubscriptionId,
    /// This consumer's identity within the subscription.
    pub consumer: ConsumerId,
    rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SubscriptionId,
        consumer: ConsumerId,
        rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
    ) -> Self {
        Self { id, consumer, rx }
    }

    /// Receives the next event, or `None` once the subscription is gone.
    pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    ///
    /// # Errors
    ///
    /// Returns the channel's try-receive error when no event is queued.
    pub fn try_recv(&mut self) -> Result<SubscriptionEvent, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

impl futures_util::Stream for SubscriptionHandle {
    type Item = SubscriptionEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
