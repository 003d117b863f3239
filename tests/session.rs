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

//! Integration tests for the session credential store lifecycle.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use ig_markets::session::{
    Credential, CredentialStore, SessionError, SessionStatus, Token, TokenKind,
};

fn credential(expires_at: DateTime<Utc>) -> Credential {
    Credential {
        api_key: "key".to_string(),
        client_id: "client".to_string(),
        account_id: "ABC12".to_string(),
        streaming_url: "https://apd.marketdatasystems.com".to_string(),
        timezone: chrono_tz::Europe::London,
        token: Token::new(
            TokenKind::OAuth {
                access: "access".to_string(),
                refresh: "refresh".to_string(),
                scope: "profile".to_string(),
                token_type: "Bearer".to_string(),
            },
            expires_at,
        ),
    }
}

#[tokio::test(start_paused = true)]
async fn test_ready_then_expired_exactly_once() {
    let store = CredentialStore::new();
    let (_id, mut rx) = store.subscribe();

    let until = Utc::now() + TimeDelta::seconds(5);
    store.update(|_| Ok(Some(credential(until)))).unwrap();

    // Exactly one ready event
    assert_eq!(rx.try_recv().unwrap(), SessionStatus::Ready { until });
    assert!(rx.try_recv().is_err());

    // Slightly more than the token lifetime
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    // Exactly one expired event, no duplicates in between
    assert_eq!(rx.try_recv().unwrap(), SessionStatus::Expired);
    assert!(rx.try_recv().is_err());
    assert_eq!(store.status(), SessionStatus::Expired);
}

#[tokio::test]
async fn test_expiry_within_epsilon_is_synchronous() {
    let store = CredentialStore::new();
    let (_id, mut rx) = store.subscribe();

    // Already inside the 100ms epsilon at swap time
    let until = Utc::now() + TimeDelta::milliseconds(80);
    let status = store.update(|_| Ok(Some(credential(until)))).unwrap();

    assert_eq!(status, SessionStatus::Expired);
    assert_eq!(rx.try_recv().unwrap(), SessionStatus::Expired);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_logout_preempts_armed_timer() {
    let store = CredentialStore::new();

    let until = Utc::now() + TimeDelta::seconds(5);
    store.update(|_| Ok(Some(credential(until)))).unwrap();
    store.update(|_| Ok(None)).unwrap();

    let (_id, mut rx) = store.subscribe();
    tokio::time::sleep(Duration::from_secs(10)).await;

    // The stale timer must not fire after the logout swap
    assert_eq!(store.status(), SessionStatus::LoggedOut);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_rearms_timer_for_new_expiry() {
    let store = CredentialStore::new();
    let (_id, mut rx) = store.subscribe();

    let first = Utc::now() + TimeDelta::seconds(5);
    store.update(|_| Ok(Some(credential(first)))).unwrap();
    assert_eq!(rx.try_recv().unwrap(), SessionStatus::Ready { until: first });

    // Refresh extends the expiry before the first timer fires
    tokio::time::sleep(Duration::from_secs(3)).await;
    let second = Utc::now() + TimeDelta::seconds(60);
    store.update(|_| Ok(Some(credential(second)))).unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        SessionStatus::Ready { until: second }
    );

    // Past the first expiry: still ready, the old timer is inert
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.status(), SessionStatus::Ready { until: second });
    assert!(rx.try_recv().is_err());

    // Past the second expiry: exactly one expired event
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(rx.try_recv().unwrap(), SessionStatus::Expired);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_stale_refresh_completion_cannot_overwrite_logout() {
    let store = CredentialStore::new();
    store
        .update(|_| Ok(Some(credential(Utc::now() + TimeDelta::seconds(60)))))
        .unwrap();

    // A refresh captures the version, then a logout lands first
    let version = store.version();
    store.update(|_| Ok(None)).unwrap();

    let late = credential(Utc::now() + TimeDelta::seconds(120));
    let result = store.update_if_version(version, |_| Ok(Some(late)));

    assert!(matches!(result, Err(SessionError::StaleCompletion)));
    assert!(store.current().is_none());
    assert_eq!(store.status(), SessionStatus::LoggedOut);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_swap_last_writer_wins() {
    for _ in 0..50 {
        let store = CredentialStore::new();
        let (_id, mut rx) = store.subscribe();

        let until = Utc::now() + TimeDelta::seconds(3600);
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let login = {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                store.update(|_| Ok(Some(credential(until)))).unwrap();
            })
        };
        let logout = {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                store.update(|_| Ok(None)).unwrap();
            })
        };
        login.await.unwrap();
        logout.await.unwrap();

        // Whichever swap acquired the lock last determines the final status,
        // and the final event observed equals it — no torn state.
        let final_status = store.status();
        assert!(
            final_status == SessionStatus::LoggedOut
                || final_status == SessionStatus::Ready { until }
        );

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.last().copied(), Some(final_status));
        for pair in events.windows(2) {
            assert_ne!(pair[0], pair[1], "Duplicate consecutive status events");
        }
    }
}

#[tokio::test]
async fn test_listener_registry_explicit_removal() {
    let store = CredentialStore::new();
    let (first, mut rx_first) = store.subscribe();
    let (_second, mut rx_second) = store.subscribe();

    store.unsubscribe(first);

    let until = Utc::now() + TimeDelta::seconds(3600);
    store.update(|_| Ok(Some(credential(until)))).unwrap();

    assert!(matches!(
        rx_first.try_recv(),
        Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
    ));
    assert_eq!(
        rx_second.try_recv().unwrap(),
        SessionStatus::Ready { until }
    );
}

#[tokio::test]
async fn test_dropped_listener_is_pruned_not_fatal() {
    let store = CredentialStore::new();
    let (_id, rx) = store.subscribe();
    drop(rx);

    let until = Utc::now() + TimeDelta::seconds(3600);
    let status = store.update(|_| Ok(Some(credential(until)))).unwrap();

    assert_eq!(status, SessionStatus::Ready { until });
}
