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

//! Integration tests for the streaming subscription multiplexer using the
//! mock transport.

use std::{sync::Arc, time::Duration};

use ig_markets::{
    common::enums::{ConnectionStatus, SubscriptionMode},
    streaming::{
        IgStreamingClient, MockTransport, StreamingError, StreamingTransport, SubscriptionConfig,
    },
};
use ustr::Ustr;

async fn wait_until<F>(mut condition: F, timeout: Duration)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn items(names: &[&str]) -> Vec<Ustr> {
    names.iter().map(|n| Ustr::from(n)).collect()
}

async fn connected_client() -> (Arc<MockTransport>, IgStreamingClient) {
    let transport = Arc::new(MockTransport::new());
    let client = IgStreamingClient::new(transport.clone() as Arc<dyn StreamingTransport>);
    client.connect().await.unwrap();
    let mut status = client.status_stream();
    status
        .wait_for(|s| *s == ConnectionStatus::ConnectedStreaming)
        .await
        .unwrap();
    (transport, client)
}

#[tokio::test]
async fn test_delta_vs_full_state() {
    let (transport, client) = connected_client().await;

    let mut handle = client
        .subscribe(SubscriptionConfig::merge(items(&["X"]), items(&["a", "b"])))
        .await
        .unwrap();

    let sub_id = transport.find_subscription("X").unwrap();
    transport.push_update(sub_id, "X", &[("a", Some("1")), ("b", Some("2"))], &["b"]);

    let update = handle.recv().await.unwrap().unwrap();
    assert_eq!(update.latest("a"), Some("1"));
    assert_eq!(update.latest("b"), Some("2"));
    assert!(!update.was_changed("a"));
    assert!(update.was_changed("b"));
}

#[tokio::test]
async fn test_unknown_fields_are_ignored() {
    let (transport, client) = connected_client().await;

    let mut handle = client
        .subscribe(SubscriptionConfig::merge(items(&["X"]), items(&["BID"])))
        .await
        .unwrap();

    let sub_id = transport.find_subscription("X").unwrap();
    transport.push_update(
        sub_id,
        "X",
        &[("BID", Some("1.1")), ("NEW_FIELD", Some("zzz"))],
        &["BID", "NEW_FIELD"],
    );

    let update = handle.recv().await.unwrap().unwrap();
    assert_eq!(update.latest("BID"), Some("1.1"));
    assert_eq!(update.latest("NEW_FIELD"), None);
    assert!(!update.was_changed("NEW_FIELD"));
}

#[tokio::test]
async fn test_duplicate_key_shares_network_subscription() {
    let (transport, client) = connected_client().await;

    let config = SubscriptionConfig::merge(items(&["X"]), items(&["BID"]));
    let mut first = client.subscribe(config.clone()).await.unwrap();
    let mut second = client.subscribe(config).await.unwrap();

    assert_eq!(transport.active_subscriptions().len(), 1);

    let sub_id = transport.find_subscription("X").unwrap();
    transport.push_update(sub_id, "X", &[("BID", Some("1.5"))], &["BID"]);

    assert_eq!(
        first.recv().await.unwrap().unwrap().latest("BID"),
        Some("1.5")
    );
    assert_eq!(
        second.recv().await.unwrap().unwrap().latest("BID"),
        Some("1.5")
    );
}

#[tokio::test]
async fn test_rejection_does_not_affect_siblings() {
    let (transport, client) = connected_client().await;
    transport.fail_item("BAD", "unknown item");

    let mut good = client
        .subscribe(SubscriptionConfig::merge(items(&["GOOD"]), items(&["BID"])))
        .await
        .unwrap();
    let mut bad = client
        .subscribe(SubscriptionConfig::merge(items(&["BAD"]), items(&["BID"])))
        .await
        .unwrap();

    // The rejected subscription surfaces a typed error with its context
    let error = bad.recv().await.unwrap().unwrap_err();
    match error {
        StreamingError::Rejected { items, fields, reason } => {
            assert_eq!(items, "BAD");
            assert_eq!(fields, "BID");
            assert_eq!(reason, "unknown item");
        }
        other => panic!("Expected Rejected error, got {other:?}"),
    }

    // The sibling sharing the connection keeps streaming
    let sub_id = transport.find_subscription("GOOD").unwrap();
    transport.push_update(sub_id, "GOOD", &[("BID", Some("2.0"))], &["BID"]);
    assert_eq!(
        good.recv().await.unwrap().unwrap().latest("BID"),
        Some("2.0")
    );
}

#[tokio::test]
async fn test_two_level_command_lifecycle() {
    let (transport, client) = connected_client().await;

    let mut handle = client
        .subscribe(
            SubscriptionConfig::command(
                items(&["TRADE:ABC12"]),
                items(&["KEY", "COMMAND"]),
            )
            .with_max_frequency(2.0)
            .with_second_level(items(&["BID", "OFR"])),
        )
        .await
        .unwrap();

    let parent_id = transport.find_subscription("TRADE:ABC12").unwrap();

    // ADD for key K1 spawns a mono-item MERGE child
    transport.push_update(
        parent_id,
        "TRADE:ABC12",
        &[("KEY", Some("K1")), ("COMMAND", Some("ADD"))],
        &["KEY", "COMMAND"],
    );
    wait_until(
        || transport.find_subscription("K1").is_some(),
        Duration::from_secs(1),
    )
    .await;

    let child = transport
        .active_subscriptions()
        .into_iter()
        .find(|(_, r)| r.items == items(&["K1"]))
        .expect("Child subscription should be live");
    assert_eq!(child.1.mode, SubscriptionMode::Merge);
    assert!(child.1.snapshot);
    assert_eq!(child.1.max_frequency, Some(2.0));
    assert_eq!(child.1.fields, items(&["BID", "OFR"]));

    // The first-level frame reaches the consumer
    let update = handle.recv().await.unwrap().unwrap();
    assert_eq!(update.latest("KEY"), Some("K1"));

    // Child updates are delivered to the parent's consumers
    let child_id = child.0;
    transport.push_update(child_id, "K1", &[("BID", Some("1.2"))], &["BID"]);
    let update = handle.recv().await.unwrap().unwrap();
    assert_eq!(update.item.as_str(), "K1");
    assert_eq!(update.latest("BID"), Some("1.2"));

    // A second frame for the same key must not spawn a second child
    transport.push_update(
        parent_id,
        "TRADE:ABC12",
        &[("KEY", Some("K1")), ("COMMAND", Some("UPDATE"))],
        &["COMMAND"],
    );
    let _ = handle.recv().await.unwrap().unwrap();
    assert_eq!(transport.active_subscriptions().len(), 2);

    // DELETE tears the child down; nothing dangles afterwards
    transport.push_update(
        parent_id,
        "TRADE:ABC12",
        &[("KEY", Some("K1")), ("COMMAND", Some("DELETE"))],
        &["COMMAND"],
    );
    wait_until(
        || transport.find_subscription("K1").is_none(),
        Duration::from_secs(1),
    )
    .await;
    assert_eq!(transport.unsubscribed_ids(), vec![child_id]);
    assert_eq!(transport.active_subscriptions().len(), 1);
}

#[tokio::test]
async fn test_malformed_command_action_surfaces_error() {
    let (transport, client) = connected_client().await;

    let mut handle = client
        .subscribe(
            SubscriptionConfig::command(items(&["TRADE:ABC12"]), items(&["KEY", "COMMAND"]))
                .with_second_level(items(&["BID"])),
        )
        .await
        .unwrap();

    let parent_id = transport.find_subscription("TRADE:ABC12").unwrap();
    transport.push_update(
        parent_id,
        "TRADE:ABC12",
        &[("KEY", Some("K1")), ("COMMAND", Some("EXPLODE"))],
        &["KEY", "COMMAND"],
    );

    let event = handle.recv().await.unwrap();
    match event {
        Err(StreamingError::UpdateFormat { value, .. }) => assert_eq!(value, "EXPLODE"),
        other => panic!("Expected UpdateFormat error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_deactivates_and_reconnect_resubscribes() {
    let (transport, client) = connected_client().await;

    let mut handle = client
        .subscribe(SubscriptionConfig::merge(items(&["X"]), items(&["BID"])))
        .await
        .unwrap();
    assert_eq!(transport.active_subscriptions().len(), 1);

    client.disconnect().await.unwrap();
    let mut status = client.status_stream();
    status
        .wait_for(|s| *s == ConnectionStatus::Disconnected)
        .await
        .unwrap();
    assert!(transport.active_subscriptions().is_empty());

    // Reconnect: the logical subscription cycles back to active
    client.connect().await.unwrap();
    wait_until(
        || transport.find_subscription("X").is_some(),
        Duration::from_secs(1),
    )
    .await;

    let sub_id = transport.find_subscription("X").unwrap();
    transport.push_update(sub_id, "X", &[("BID", Some("3.0"))], &["BID"]);
    assert_eq!(
        handle.recv().await.unwrap().unwrap().latest("BID"),
        Some("3.0")
    );
}

#[tokio::test]
async fn test_unsubscribe_releases_network_subscription() {
    let (transport, client) = connected_client().await;

    let config = SubscriptionConfig::merge(items(&["X"]), items(&["BID"]));
    let first = client.subscribe(config.clone()).await.unwrap();
    let second = client.subscribe(config).await.unwrap();
    let sub_id = transport.find_subscription("X").unwrap();

    // One consumer detaching keeps the network subscription alive
    client.unsubscribe(first).await.unwrap();
    assert!(transport.unsubscribed_ids().is_empty());

    // The last consumer detaching releases it
    client.unsubscribe(second).await.unwrap();
    assert_eq!(transport.unsubscribed_ids(), vec![sub_id]);
    assert!(transport.find_subscription("X").is_none());
}

#[tokio::test]
async fn test_updates_delivered_in_server_send_order() {
    let (transport, client) = connected_client().await;

    let mut handle = client
        .subscribe(SubscriptionConfig::distinct(items(&["X"]), items(&["SEQ"])))
        .await
        .unwrap();

    let sub_id = transport.find_subscription("X").unwrap();
    for i in 0..100i64 {
        let value = i.to_string();
        transport.push_update(sub_id, "X", &[("SEQ", Some(value.as_str()))], &["SEQ"]);
    }

    for i in 0..100i64 {
        let update = handle.recv().await.unwrap().unwrap();
        assert_eq!(update.value_i64("SEQ").unwrap(), Some(i));
    }
}
