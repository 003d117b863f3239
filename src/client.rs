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

//! Top-level IG client composing the session, streaming and cache layers.

use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::{
    cache::{CacheStore, ForexMarket, ImportOutcome, PriceRecord, RawMarket},
    common::{credential::ApiCredential, currency::Currency, enums::{ConnectionStatus, Resolution}},
    config::IgClientConfig,
    error::IgError,
    http::IgHttpClient,
    session::{
        Credential, CredentialStore, ListenerId, SessionManager, SessionStatus,
    },
    streaming::{
        IgStreamingClient, StreamingTransport, SubscriptionConfig, SubscriptionHandle,
    },
};

/// Client for the IG trading platform.
///
/// Composes the credential store, session manager, streaming multiplexer and
/// local cache behind typed request methods. All state lives in this explicit
/// context object; constructing a second client yields a fully independent
/// session.
pub struct IgClient {
    config: IgClientConfig,
    http: Arc<IgHttpClient>,
    session: SessionManager,
    streaming: IgStreamingClient,
    cache: CacheStore,
    cancellation_token: CancellationToken,
}

impl Debug for IgClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(IgClient))
            .field("base_url", &self.http.base_url())
            .field("session_status", &self.session_status())
            .field("connection_status", &self.connection_status())
            .finish_non_exhaustive()
    }
}

impl IgClient {
    /// Creates a new [`IgClient`] over the given streaming transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or cache store cannot be built.
    pub fn new(
        config: IgClientConfig,
        transport: Arc<dyn StreamingTransport>,
    ) -> Result<Self, IgError> {
        let http = Arc::new(IgHttpClient::new(
            config.http_base_url(),
            config.api_key.clone().unwrap_or_default(),
            config.http_timeout_secs,
            config.max_retries,
            config.retry_delay_initial_ms,
            config.retry_delay_max_ms,
        )?);

        let api_credential = match (&config.api_key, &config.identifier, &config.password) {
            (Some(key), Some(identifier), Some(password)) => Some(ApiCredential::new(
                key.clone(),
                identifier.clone(),
                password.clone(),
                config.account_id.clone().unwrap_or_default(),
            )),
            _ => None,
        };

        let store = CredentialStore::new();
        let session = SessionManager::new(Arc::clone(&http), store, api_credential);
        let streaming = IgStreamingClient::new(transport);
        let cache = match &config.cache_path {
            Some(path) => CacheStore::open(path)?,
            None => CacheStore::open_in_memory()?,
        };

        Ok(Self {
            config,
            http,
            session,
            streaming,
            cache,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &IgClientConfig {
        &self.config
    }

    /// Returns the credential store for direct status observation.
    #[must_use]
    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        self.session.store()
    }

    /// Returns the cache store.
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    // -- SESSION ----------------------------------------------------------

    /// Returns the current session status.
    #[must_use]
    pub fn session_status(&self) -> SessionStatus {
        self.session.store().status()
    }

    /// Registers a session status listener.
    #[must_use]
    pub fn subscribe_session_status(
        &self,
    ) -> (ListenerId, tokio::sync::mpsc::UnboundedReceiver<SessionStatus>) {
        self.session.store().subscribe()
    }

    /// Removes a session status listener.
    pub fn unsubscribe_session_status(&self, id: ListenerId) {
        self.session.store().unsubscribe(id);
    }

    /// Logs in with certificate (v2) tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the login round trip fails.
    pub async fn login(&self) -> Result<SessionStatus, IgError> {
        Ok(self.session.login().await?)
    }

    /// Logs in with OAuth (v3) tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the login round trip fails.
    pub async fn login_oauth(&self) -> Result<SessionStatus, IgError> {
        Ok(self.session.login_oauth().await?)
    }

    /// Refreshes the current OAuth access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails or the state changed while the
    /// request was in flight.
    pub async fn refresh(&self) -> Result<SessionStatus, IgError> {
        Ok(self.session.refresh().await?)
    }

    /// Ends the session and clears the local credential.
    ///
    /// # Errors
    ///
    /// Returns an error on connectivity failure.
    pub async fn logout(&self) -> Result<SessionStatus, IgError> {
        Ok(self.session.logout().await?)
    }

    /// Installs an externally supplied credential.
    ///
    /// # Errors
    ///
    /// Mirrors the swap signature; cannot itself fail.
    pub fn install_credential(&self, credential: Credential) -> Result<SessionStatus, IgError> {
        Ok(self.session.install(credential)?)
    }

    // -- STREAMING --------------------------------------------------------

    /// Returns the current streaming connection status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.streaming.connection_status()
    }

    /// Returns a watch receiver tracking the connection status.
    #[must_use]
    pub fn connection_status_stream(&self) -> tokio::sync::watch::Receiver<ConnectionStatus> {
        self.streaming.status_stream()
    }

    /// Connects the streaming transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to connect.
    pub async fn connect_streaming(&self) -> Result<(), IgError> {
        Ok(self.streaming.connect().await?)
    }

    /// Disconnects the streaming transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher has shut down.
    pub async fn disconnect_streaming(&self) -> Result<(), IgError> {
        Ok(self.streaming.disconnect().await?)
    }

    /// Registers a logical subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher has shut down.
    pub async fn subscribe(
        &self,
        config: SubscriptionConfig,
    ) -> Result<SubscriptionHandle, IgError> {
        Ok(self.streaming.subscribe(config).await?)
    }

    /// Detaches a subscription consumer.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher has shut down.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), IgError> {
        Ok(self.streaming.unsubscribe(handle).await?)
    }

    // -- CACHE ------------------------------------------------------------

    /// Imports a batch of loosely typed market definitions into the cache.
    ///
    /// # Errors
    ///
    /// Returns an error on statement failure; per-row inference failures are
    /// skipped and reflected in the outcome.
    pub async fn update_forex_markets(
        &self,
        raws: Vec<RawMarket>,
    ) -> Result<ImportOutcome, IgError> {
        Ok(self.cache.upsert_forex_markets(raws).await?)
    }

    /// Point lookup of a cached market by epic.
    ///
    /// # Errors
    ///
    /// Returns an error when the epic is absent.
    pub async fn forex_market(&self, epic: &str) -> Result<ForexMarket, IgError> {
        Ok(self.cache.forex_market(epic).await?)
    }

    /// Set lookup of cached markets.
    ///
    /// # Errors
    ///
    /// Returns an error in strict mode when rows are missing.
    pub async fn forex_markets(
        &self,
        epics: Vec<String>,
        expects_all: bool,
    ) -> Result<Vec<ForexMarket>, IgError> {
        Ok(self.cache.forex_markets(epics, expects_all).await?)
    }

    /// Filtered lookup of cached markets by currency-pair predicate.
    ///
    /// # Errors
    ///
    /// Returns an error on statement failure.
    pub async fn forex_markets_filtered(
        &self,
        base: Option<Currency>,
        counter: Option<Currency>,
    ) -> Result<Vec<ForexMarket>, IgError> {
        Ok(self.cache.forex_markets_filtered(base, counter).await?)
    }

    /// Upserts a batch of price records.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid epic or statement failure.
    pub async fn upsert_prices(
        &self,
        epic: &str,
        resolution: Resolution,
        records: Vec<PriceRecord>,
    ) -> Result<usize, IgError> {
        Ok(self.cache.upsert_prices(epic, resolution, records).await?)
    }

    /// Returns cached price records within `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid epic or statement failure.
    pub async fn prices_between(
        &self,
        epic: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>, IgError> {
        Ok(self.cache.prices_between(epic, resolution, from, to).await?)
    }

    // -- LIFECYCLE --------------------------------------------------------

    /// Tears the client down: cancels pending HTTP requests and disconnects
    /// the streaming transport.
    pub async fn close(&self) {
        self.cancellation_token.cancel();
        self.http.cancel_all_requests();
        if let Err(e) = self.streaming.disconnect().await {
            tracing::debug!("Streaming disconnect during close: {e}");
        }
    }
}
