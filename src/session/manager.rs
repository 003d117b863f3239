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

//! Session lifecycle operations: login, token refresh and logout.
//!
//! All network round trips happen outside the credential swap lock. Each
//! operation captures the store version before its round trip and commits
//! through [`CredentialStore::update_if_version`], so a completion that lands
//! after a newer swap (e.g. a logout issued while a refresh was in flight) is
//! discarded with [`SessionError::StaleCompletion`] instead of overwriting
//! newer state.

use std::{fmt::Debug, sync::Arc};

use chrono::{TimeDelta, Utc};
use reqwest::Method;

use super::{
    error::SessionError,
    store::{CredentialStore, SessionStatus},
    token::{Credential, Token, TokenKind},
};
use crate::{
    common::{consts::IG_REFERENCE_TIMEZONE, credential::ApiCredential},
    http::{
        IgHttpClient, IgHttpError,
        models::{
            CreateSessionRequest, CreateSessionV2Response, CreateSessionV3Response, OauthToken,
            RefreshTokenRequest,
        },
    },
};

/// Validity the platform grants certificate (CST) tokens.
///
/// The v2 session response carries no expiry; the platform documents a
/// six-hour token lifetime.
const CERTIFICATE_TOKEN_LIFETIME_SECS: i64 = 6 * 60 * 60;

/// Manages the session credential lifecycle against the IG REST API.
pub struct SessionManager {
    http: Arc<IgHttpClient>,
    store: Arc<CredentialStore>,
    api_credential: Option<ApiCredential>,
}

impl Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SessionManager))
            .field("has_api_credential", &self.api_credential.is_some())
            .field("status", &self.store.status())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a new [`SessionManager`] instance.
    #[must_use]
    pub fn new(
        http: Arc<IgHttpClient>,
        store: Arc<CredentialStore>,
        api_credential: Option<ApiCredential>,
    ) -> Self {
        Self {
            http,
            store,
            api_credential,
        }
    }

    /// Returns the credential store backing this manager.
    #[must_use]
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Installs an externally supplied credential.
    ///
    /// Shares the swap path with login, so status publication and timer
    /// arming behave identically for hardcoded and fetched credentials.
    ///
    /// # Errors
    ///
    /// This call itself cannot fail; the `Result` mirrors the swap signature.
    pub fn install(&self, credential: Credential) -> Result<SessionStatus, SessionError> {
        self.store.update(|_| Ok(Some(credential)))
    }

    /// Logs in with certificate (v2) tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if no API credential is configured, the round trip
    /// fails, the response is malformed, or the session state changed while
    /// the request was in flight.
    pub async fn login(&self) -> Result<SessionStatus, SessionError> {
        let api = self.require_api_credential()?;
        let version = self.store.version();

        let request = CreateSessionRequest {
            identifier: api.identifier().to_string(),
            password: api.password().to_string(),
        };
        let response = self
            .http
            .send::<CreateSessionV2Response, _>(Method::POST, "/session", 2, &[], Some(&request))
            .await?;

        let cst = response.require_header("cst")?.to_string();
        let security = response.require_header("x-security-token")?.to_string();
        let body = response.body;

        let credential = Credential {
            api_key: api.api_key().to_string(),
            client_id: body.client_id,
            account_id: body.current_account_id,
            streaming_url: body.lightstreamer_endpoint,
            timezone: IG_REFERENCE_TIMEZONE,
            token: Token::new(
                TokenKind::Certificate { cst, security },
                Utc::now() + TimeDelta::seconds(CERTIFICATE_TOKEN_LIFETIME_SECS),
            ),
        };

        tracing::info!(
            account_id = %credential.account_id,
            "Logged in with certificate tokens"
        );
        self.store
            .update_if_version(version, |_| Ok(Some(credential)))
    }

    /// Logs in with OAuth (v3) tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if no API credential is configured, the round trip
    /// fails, the response is malformed, or the session state changed while
    /// the request was in flight.
    pub async fn login_oauth(&self) -> Result<SessionStatus, SessionError> {
        let api = self.require_api_credential()?;
        let version = self.store.version();

        let request = CreateSessionRequest {
            identifier: api.identifier().to_string(),
            password: api.password().to_string(),
        };
        let response = self
            .http
            .send::<CreateSessionV3Response, _>(Method::POST, "/session", 3, &[], Some(&request))
            .await?;
        let body = response.body;

        let token = token_from_oauth(&body.oauth_token)?;
        let credential = Credential {
            api_key: api.api_key().to_string(),
            client_id: body.client_id,
            account_id: body.account_id,
            streaming_url: body.lightstreamer_endpoint,
            timezone: IG_REFERENCE_TIMEZONE,
            token,
        };

        tracing::info!(account_id = %credential.account_id, "Logged in with OAuth tokens");
        self.store
            .update_if_version(version, |_| Ok(Some(credential)))
    }

    /// Exchanges the current refresh token for a fresh access token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingCredentials`] when logged out,
    /// [`SessionError::UnsupportedTokenKind`] for certificate sessions,
    /// [`SessionError::RefreshTokenExpired`] when the platform rejects the
    /// refresh token, and [`SessionError::StaleCompletion`] when the session
    /// state changed while the request was in flight.
    pub async fn refresh(&self) -> Result<SessionStatus, SessionError> {
        let current = self
            .store
            .current()
            .ok_or(SessionError::MissingCredentials)?;
        let refresh_token = current
            .token
            .refresh_token()
            .ok_or_else(|| {
                SessionError::UnsupportedTokenKind("certificate tokens cannot be refreshed".into())
            })?
            .to_string();
        let version = self.store.version();

        let request = RefreshTokenRequest { refresh_token };
        let response = self
            .http
            .send::<OauthToken, _>(
                Method::POST,
                "/session/refresh-token",
                1,
                &[],
                Some(&request),
            )
            .await
            .map_err(map_refresh_error)?;

        let token = token_from_oauth(&response.body)?;
        let credential = Credential {
            token,
            ..current.clone()
        };

        tracing::debug!(account_id = %credential.account_id, "Refreshed OAuth token");
        self.store
            .update_if_version(version, |_| Ok(Some(credential)))
    }

    /// Ends the session on the platform and clears the local credential.
    ///
    /// An API-level rejection (the token is already invalid server-side)
    /// still clears local state; a connectivity failure propagates and
    /// leaves the credential untouched.
    ///
    /// # Errors
    ///
    /// Returns an error on connectivity failure.
    pub async fn logout(&self) -> Result<SessionStatus, SessionError> {
        if let Some(current) = self.store.current() {
            let headers = current.auth_headers();
            match self
                .http
                .send_no_content::<()>(Method::DELETE, "/session", 1, &headers, None)
                .await
            {
                Ok(_) => {}
                Err(IgHttpError::ApiError { code }) => {
                    tracing::debug!("Server-side logout rejected ({code}); clearing local session");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!("Logged out");
        self.store.update(|_| Ok(None))
    }

    fn require_api_credential(&self) -> Result<&ApiCredential, SessionError> {
        self.api_credential
            .as_ref()
            .ok_or(SessionError::MissingCredentials)
    }
}

/// Builds a [`Token`] from an OAuth wire object, converting the relative
/// `expires_in` into an absolute instant at parse time.
fn token_from_oauth(oauth: &OauthToken) -> Result<Token, SessionError> {
    let expires_in: i64 = oauth.expires_in.parse().map_err(|_| {
        SessionError::MalformedResponse(format!(
            "Invalid expires_in value: '{}'",
            oauth.expires_in
        ))
    })?;

    Ok(Token::new(
        TokenKind::OAuth {
            access: oauth.access_token.clone(),
            refresh: oauth.refresh_token.clone(),
            scope: oauth.scope.clone(),
            token_type: oauth.token_type.clone(),
        },
        Utc::now() + TimeDelta::seconds(expires_in),
    ))
}

/// Maps a refresh round-trip failure onto the session error taxonomy.
fn map_refresh_error(error: IgHttpError) -> SessionError {
    match &error {
        IgHttpError::ApiError { code }
            if code.contains("oauth-token-invalid") || code.contains("refresh-token") =>
        {
            SessionError::RefreshTokenExpired
        }
        _ => SessionError::Http(error),
    }
}
