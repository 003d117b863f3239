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

//! Streaming subscription multiplexer.
//!
//! This module provides a two-layer client architecture:
//! - Outer client: [`IgStreamingClient`], the caller-facing orchestrator
//! - Inner dispatcher: a dedicated Tokio task owning all subscription state
//!
//! Many logical subscriptions share the single transport connection; at most
//! one network-level subscription exists per distinct (mode, item-set,
//! field-set) key. All update processing — including the two-level COMMAND
//! spawn/teardown transitions — happens on the single serialized dispatcher
//! task, so concurrent spawn/destroy races for the same key cannot occur.

use std::{fmt::Debug, sync::Arc};

use ahash::{AHashMap, AHashSet};
use tokio::sync::{mpsc, oneshot, watch};
use ustr::Ustr;

use super::{
    error::StreamingError,
    subscription::{
        ConsumerId, SecondLevelConfig, SubscriptionConfig, SubscriptionEntry, SubscriptionHandle,
        SubscriptionId, SubscriptionKey, SubscriptionState,
    },
    transport::{
        StreamingTransport, SubscriptionRequest, TransportEvent, TransportSubId,
    },
    update::ItemUpdate,
};
use crate::common::enums::{CommandAction, ConnectionStatus, SubscriptionMode};

/// Commands sent from the outer client to the inner dispatcher.
enum RegistryCommand {
    Connect {
        reply: oneshot::Sender<Result<(), StreamingError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Subscribe {
        config: SubscriptionConfig,
        reply: oneshot::Sender<SubscriptionHandle>,
    },
    Unsubscribe {
        id: SubscriptionId,
        consumer: ConsumerId,
        reply: oneshot::Sender<()>,
    },
}

/// Caller-facing streaming client multiplexing logical subscriptions over
/// one transport connection.
pub struct IgStreamingClient {
    cmd_tx: mpsc::UnboundedSender<RegistryCommand>,
    status_rx: watch::Receiver<ConnectionStatus>,
    _task: tokio::task::JoinHandle<()>,
}

impl Debug for IgStreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(IgStreamingClient))
            .field("connection_status", &self.connection_status())
            .finish_non_exhaustive()
    }
}

impl IgStreamingClient {
    /// Creates a new [`IgStreamingClient`] over the given transport and
    /// spawns its dispatcher task.
    #[must_use]
    pub fn new(transport: Arc<dyn StreamingTransport>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let dispatcher = Dispatcher {
            transport,
            cmd_rx,
            events_rx,
            events_tx,
            status_tx,
            entries: AHashMap::new(),
            by_key: AHashMap::new(),
            by_transport: AHashMap::new(),
            next_sub_id: 1,
            next_consumer_id: 1,
        };
        let task = tokio::spawn(dispatcher.run());

        Self {
            cmd_tx,
            status_rx,
            _task: task,
        }
    }

    /// Returns the current connection status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Returns a watch receiver tracking the connection status.
    #[must_use]
    pub fn status_stream(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Connects the underlying transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to connect or the dispatcher
    /// has shut down.
    pub async fn connect(&self) -> Result<(), StreamingError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Connect { reply })?;
        rx.await
            .map_err(|_| StreamingError::ChannelClosed("dispatcher stopped".to_string()))?
    }

    /// Disconnects the underlying transport, deactivating all subscriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher has shut down.
    pub async fn disconnect(&self) -> Result<(), StreamingError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Disconnect { reply })?;
        rx.await
            .map_err(|_| StreamingError::ChannelClosed("dispatcher stopped".to_string()))
    }

    /// Registers a logical subscription and returns its update stream.
    ///
    /// If an identical (mode, item-set, field-set) subscription is already
    /// live, the returned handle attaches to it instead of opening a second
    /// network subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher has shut down. Server-side
    /// rejection is delivered on the handle as a typed error.
    pub async fn subscribe(
        &self,
        config: SubscriptionConfig,
    ) -> Result<SubscriptionHandle, StreamingError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Subscribe { config, reply })?;
        rx.await
            .map_err(|_| StreamingError::ChannelClosed("dispatcher stopped".to_string()))
    }

    /// Detaches a consumer; the network subscription is released once its
    /// last consumer detaches.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher has shut down.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), StreamingError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Unsubscribe {
            id: handle.id,
            consumer: handle.consumer,
            reply,
        })?;
        rx.await
            .map_err(|_| StreamingError::ChannelClosed("dispatcher stopped".to_string()))
    }

    fn send(&self, command: RegistryCommand) -> Result<(), StreamingError> {
        self.cmd_tx
            .send(command)
            .map_err(|_| StreamingError::ChannelClosed("dispatcher stopped".to_string()))
    }
}

/// Inner dispatcher owning all subscription state.
///
/// Runs in a dedicated Tokio task; commands and transport events are the
/// only inputs, so state mutation is single-threaded by construction.
struct Dispatcher {
    transport: Arc<dyn StreamingTransport>,
    cmd_rx: mpsc::UnboundedReceiver<RegistryCommand>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
    entries: AHashMap<SubscriptionId, SubscriptionEntry>,
    by_key: AHashMap<SubscriptionKey, SubscriptionId>,
    by_transport: AHashMap<TransportSubId, SubscriptionId>,
    next_sub_id: SubscriptionId,
    next_consumer_id: ConsumerId,
}

impl Dispatcher {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            tracing::debug!("Streaming client dropped; dispatcher stopping");
                            break;
                        }
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: RegistryCommand) {
        match command {
            RegistryCommand::Connect { reply } => {
                let result = self.transport.connect(self.events_tx.clone()).await;
                let _ = reply.send(result);
            }
            RegistryCommand::Disconnect { reply } => {
                self.transport.disconnect().await;
                let _ = reply.send(());
            }
            RegistryCommand::Subscribe { config, reply } => {
                let handle = self.register(config).await;
                let _ = reply.send(handle);
            }
            RegistryCommand::Unsubscribe { id, consumer, reply } => {
                self.detach(id, consumer).await;
                let _ = reply.send(());
            }
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Subscribed { sub_id } => {
                if let Some(&id) = self.by_transport.get(&sub_id)
                    && let Some(entry) = self.entries.get_mut(&id)
                {
                    entry.state = SubscriptionState::Subscribed;
                    tracing::debug!(subscription = id, "Subscription acknowledged");
                }
            }
            TransportEvent::SubscriptionFailed { sub_id, reason } => {
                self.handle_rejection(sub_id, reason);
            }
            TransportEvent::Status(status) => {
                self.handle_status(status).await;
            }
            TransportEvent::Update {
                sub_id,
                item,
                fields,
                changed,
            } => {
                self.handle_update(sub_id, item, fields, changed).await;
            }
        }
    }

    /// Routes a server rejection to the affected subscription only; sibling
    /// subscriptions sharing the connection are untouched.
    fn handle_rejection(&mut self, sub_id: TransportSubId, reason: String) {
        let Some(id) = self.by_transport.remove(&sub_id) else {
            return;
        };
        let Some(entry) = self.entries.get(&id) else {
            return;
        };

        let error = StreamingError::Rejected {
            items: join_names(&entry.config.items),
            fields: join_names(&entry.config.fields),
            reason,
        };
        tracing::warn!(subscription = id, "{error}");

        if let Some(entry) = self.entries.get_mut(&id) {
            entry.state = SubscriptionState::Inactive;
            entry.transport_id = None;
        }
        self.deliver_error(id, error);
    }

    async fn handle_status(&mut self, status: ConnectionStatus) {
        let previous = self.status_tx.send_replace(status);
        if previous == status {
            return;
        }
        tracing::info!("Streaming connection status: {previous} -> {status}");

        if status == ConnectionStatus::Disconnected {
            self.deactivate_all();
        } else if status.is_connected() && !previous.is_connected() {
            self.resubscribe_all().await;
        }
    }

    /// Marks every subscription inactive and drops two-level children.
    ///
    /// Children are respawned by COMMAND updates after reconnection, so they
    /// are removed outright rather than kept inactive.
    fn deactivate_all(&mut self) {
        self.by_transport.clear();

        let child_ids: Vec<SubscriptionId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.parent.is_some())
            .map(|(id, _)| *id)
            .collect();
        for id in child_ids {
            self.entries.remove(&id);
        }

        for entry in self.entries.values_mut() {
            entry.state = SubscriptionState::Inactive;
            entry.transport_id = None;
            entry.children.clear();
        }
    }

    /// Re-registers every first-level subscription that still has consumers.
    async fn resubscribe_all(&mut self) {
        let ids: Vec<SubscriptionId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.parent.is_none() && !e.consumers.is_empty())
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.activate(id).await;
        }
    }

    async fn register(&mut self, config: SubscriptionConfig) -> SubscriptionHandle {
        let key = config.key();
        let id = match self.by_key.get(&key) {
            Some(&existing) => existing,
            None => {
                let id = self.alloc_sub_id();
                self.entries.insert(id, SubscriptionEntry::new(config));
                self.by_key.insert(key, id);
                self.activate(id).await;
                id
            }
        };

        let consumer = self.alloc_consumer_id();
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.consumers.insert(consumer, tx);
        }
        SubscriptionHandle::new(id, consumer, rx)
    }

    async fn detach(&mut self, id: SubscriptionId, consumer: ConsumerId) {
        let remove = match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.consumers.remove(&consumer);
                entry.parent.is_none() && entry.consumers.is_empty()
            }
            None => false,
        };
        if remove {
            self.remove_subscription(id).await;
        }
    }

    /// Submits a subscription to the transport if connected; otherwise it
    /// stays inactive until the next reconnect.
    async fn activate(&mut self, id: SubscriptionId) {
        let request = match self.entries.get(&id) {
            Some(entry) if !entry.state.is_active() => SubscriptionRequest {
                mode: entry.config.mode,
                items: entry.config.items.clone(),
                fields: entry.config.fields.clone(),
                snapshot: entry.config.snapshot,
                max_frequency: entry.config.max_frequency,
            },
            _ => return,
        };
        if !self.status_tx.borrow().is_connected() {
            return;
        }

        let transport = Arc::clone(&self.transport);
        match transport.subscribe(request).await {
            Ok(transport_id) => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.state = SubscriptionState::Pending;
                    entry.transport_id = Some(transport_id);
                    self.by_transport.insert(transport_id, id);
                }
            }
            Err(error) => self.deliver_error(id, error),
        }
    }

    /// Removes a subscription together with its two-level children.
    ///
    /// Children are mono-item MERGE subscriptions and never nest further.
    async fn remove_subscription(&mut self, id: SubscriptionId) {
        let Some(entry) = self.entries.remove(&id) else {
            return;
        };
        // Children are keyed per (parent, key value) and never enter the
        // key index, so only first-level removals touch it
        if entry.parent.is_none() {
            self.by_key.remove(&entry.config.key());
        }
        self.release_transport(id, entry.transport_id).await;

        for (_, child_id) in entry.children {
            if let Some(child) = self.entries.remove(&child_id) {
                self.release_transport(child_id, child.transport_id).await;
            }
        }
    }

    async fn release_transport(
        &mut self,
        id: SubscriptionId,
        transport_id: Option<TransportSubId>,
    ) {
        if let Some(transport_id) = transport_id {
            self.by_transport.remove(&transport_id);
            if let Err(e) = self.transport.unsubscribe(transport_id).await {
                tracing::warn!(subscription = id, "Failed to unsubscribe: {e}");
            }
        }
    }

    async fn handle_update(
        &mut self,
        sub_id: TransportSubId,
        item: Ustr,
        fields: AHashMap<Ustr, Option<String>>,
        changed: Vec<Ustr>,
    ) {
        let Some(&id) = self.by_transport.get(&sub_id) else {
            tracing::trace!("Update for unknown transport subscription {sub_id}; ignoring");
            return;
        };
        let Some(entry) = self.entries.get(&id) else {
            return;
        };

        // Unknown field names are ignored for forward compatibility
        let known: AHashSet<Ustr> = entry.config.fields.iter().copied().collect();
        let filtered: AHashMap<Ustr, Option<String>> = fields
            .into_iter()
            .filter(|(name, _)| known.contains(name))
            .collect();
        let changed: AHashSet<Ustr> = changed
            .into_iter()
            .filter(|name| known.contains(name))
            .collect();
        let update = ItemUpdate::new(item, filtered, changed);

        let second_level = match (entry.config.mode, &entry.config.second_level) {
            (SubscriptionMode::Command, Some(config)) => Some(config.clone()),
            _ => None,
        };
        let target = entry.parent.unwrap_or(id);

        if let Some(config) = second_level {
            self.process_command_update(id, &update, &config).await;
        }

        if let Some(entry) = self.entries.get_mut(&target) {
            entry.fan_out(&Ok(update));
        }
    }

    /// Two-level COMMAND transitions: a new key spawns a mono-item MERGE
    /// child; a DELETE tears its child down.
    async fn process_command_update(
        &mut self,
        parent_id: SubscriptionId,
        update: &ItemUpdate,
        config: &SecondLevelConfig,
    ) {
        let Some(key_raw) = update.latest(config.key_field.as_str()) else {
            return;
        };
        let key = Ustr::from(key_raw);

        let action = match update.value_enum::<CommandAction>(config.command_field.as_str()) {
            Ok(Some(action)) => action,
            // Frames without a command field behave as updates
            Ok(None) => CommandAction::Update,
            Err(error) => {
                self.deliver_error(parent_id, error);
                return;
            }
        };

        match action {
            CommandAction::Add | CommandAction::Update => {
                let exists = self
                    .entries
                    .get(&parent_id)
                    .is_some_and(|e| e.children.contains_key(&key));
                if !exists {
                    self.spawn_child(parent_id, key, config).await;
                }
            }
            CommandAction::Delete => {
                let child = self
                    .entries
                    .get_mut(&parent_id)
                    .and_then(|e| e.children.remove(&key));
                if let Some(child_id) = child {
                    tracing::debug!(parent = parent_id, key = %key, "Tearing down second-level subscription");
                    self.remove_subscription(child_id).await;
                }
            }
        }
    }

    async fn spawn_child(&mut self, parent_id: SubscriptionId, key: Ustr, config: &SecondLevelConfig) {
        let max_frequency = self
            .entries
            .get(&parent_id)
            .and_then(|e| e.config.max_frequency);

        let child_config = SubscriptionConfig {
            mode: SubscriptionMode::Merge,
            items: vec![key],
            fields: config.fields.clone(),
            snapshot: true,
            max_frequency,
            second_level: None,
        };

        let child_id = self.alloc_sub_id();
        let mut child = SubscriptionEntry::new(child_config);
        child.parent = Some(parent_id);
        self.entries.insert(child_id, child);
        if let Some(parent) = self.entries.get_mut(&parent_id) {
            parent.children.insert(key, child_id);
        }

        tracing::debug!(parent = parent_id, key = %key, "Spawning second-level subscription");
        self.activate(child_id).await;
    }

    /// Routes an error to a subscription's consumers, through the parent for
    /// two-level children.
    fn deliver_error(&mut self, id: SubscriptionId, error: StreamingError) {
        let target = self
            .entries
            .get(&id)
            .and_then(|e| e.parent)
            .unwrap_or(id);
        if let Some(entry) = self.entries.get_mut(&target) {
            entry.fan_out(&Err(error));
        }
    }

    fn alloc_sub_id(&mut self) -> SubscriptionId {
        let id = self.next_sub_id;
        self.next_sub_id += 1;
        id
    }

    fn alloc_consumer_id(&mut self) -> ConsumerId {
        let id = self.next_consumer_id;
        self.next_consumer_id += 1;
        id
    }
}

fn join_names(names: &[Ustr]) -> String {
    names
        .iter()
        .map(Ustr::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_join_names() {
        let names = [Ustr::from("BID"), Ustr::from("OFR")];
        assert_eq!(join_names(&names), "BID,OFR");
        assert_eq!(join_names(&[]), "");
    }
}
