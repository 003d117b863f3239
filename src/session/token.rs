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

//! Session token and credential state for the IG platform.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::common::consts::EXPIRY_EPSILON;

/// The two token families IG issues for an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Certificate tokens delivered as `CST` and `X-SECURITY-TOKEN` headers.
    Certificate {
        /// Client session token.
        cst: String,
        /// Account security token.
        security: String,
    },
    /// OAuth token pair from the v3 session endpoint.
    OAuth {
        /// Bearer access token.
        access: String,
        /// Token used to obtain a fresh access token.
        refresh: String,
        /// Granted scope.
        scope: String,
        /// Token type, e.g. `Bearer`.
        token_type: String,
    },
}

impl std::fmt::Debug for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Certificate { .. } => f
                .debug_struct("Certificate")
                .field("cst", &"<redacted>")
                .field("security", &"<redacted>")
                .finish(),
            Self::OAuth {
                scope, token_type, ..
            } => f
                .debug_struct("OAuth")
                .field("access", &"<redacted>")
                .field("refresh", &"<redacted>")
                .field("scope", scope)
                .field("token_type", token_type)
                .finish(),
        }
    }
}

/// A session token with its absolute expiry instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// Token family and material.
    pub kind: TokenKind,
    /// Absolute instant at which the token stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Creates a new [`Token`] instance.
    #[must_use]
    pub const fn new(kind: TokenKind, expires_at: DateTime<Utc>) -> Self {
        Self { kind, expires_at }
    }

    /// Returns whether the token is expired at `now`, absorbing clock and
    /// processing skew up to the configured epsilon.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let epsilon = chrono::Duration::from_std(EXPIRY_EPSILON)
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.expires_at <= now + epsilon
    }

    /// Returns the refresh token when this is an OAuth token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::OAuth { refresh, .. } => Some(refresh),
            TokenKind::Certificate { .. } => None,
        }
    }
}

/// The authoritative credential for one session: platform coordinates plus
/// the current token.
///
/// At most one credential is current per session manager; the expiry instant
/// is always absolute.
#[derive(Clone, Debug)]
pub struct Credential {
    /// API key used for the session.
    pub api_key: String,
    /// Client identifier returned at login.
    pub client_id: String,
    /// Active account identifier.
    pub account_id: String,
    /// Push-streaming endpoint URL for this session.
    pub streaming_url: String,
    /// Account timezone.
    pub timezone: Tz,
    /// Current session token.
    pub token: Token,
}

impl Credential {
    /// Returns the HTTP headers that authenticate a request with this
    /// credential.
    #[must_use]
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        match &self.token.kind {
            TokenKind::Certificate { cst, security } => vec![
                ("CST".to_string(), cst.clone()),
                ("X-SECURITY-TOKEN".to_string(), security.clone()),
            ],
            TokenKind::OAuth {
                access, token_type, ..
            } => vec![
                ("Authorization".to_string(), format!("{token_type} {access}")),
                ("IG-ACCOUNT-ID".to_string(), self.account_id.clone()),
            ],
        }
    }
}
