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

//! Error types for the session lifecycle manager.

use thiserror::Error;

use crate::http::IgHttpError;

/// A typed error enumeration for session lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// No credentials are currently installed.
    #[error("No credentials available")]
    MissingCredentials,
    /// The refresh token was rejected by the platform and cannot be renewed.
    #[error("Refresh token expired or revoked")]
    RefreshTokenExpired,
    /// The login/refresh response could not be interpreted.
    #[error("Malformed session response: {0}")]
    MalformedResponse(String),
    /// A network round trip completed after a newer credential swap; the
    /// result was discarded rather than overwriting newer state.
    #[error("Session state changed while the request was in flight")]
    StaleCompletion,
    /// The current token kind does not support the requested operation.
    #[error("Operation not supported by the current token kind: {0}")]
    UnsupportedTokenKind(String),
    /// Underlying HTTP failure.
    #[error(transparent)]
    Http(#[from] IgHttpError),
}

impl SessionError {
    /// Returns whether this error indicates the session must be
    /// re-established with a full login.
    #[must_use]
    pub const fn requires_relogin(&self) -> bool {
        matches!(self, Self::RefreshTokenExpired | Self::MissingCredentials)
    }
}
