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

//! Request and response wire models for the IG session endpoints.

use serde::{Deserialize, Serialize};

/// Request body for certificate (v2) and OAuth (v3) session creation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Account username.
    pub identifier: String,
    /// Account password.
    pub password: String,
}

impl std::fmt::Display for CreateSessionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CreateSessionRequest(identifier={})", self.identifier)
    }
}

/// Response body for certificate (v2) session creation.
///
/// The CST and security tokens arrive in response headers, not in this body.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionV2Response {
    /// Identifier of the active account.
    pub current_account_id: String,
    /// Client identifier.
    pub client_id: String,
    /// Push-streaming endpoint URL for this session.
    pub lightstreamer_endpoint: String,
    /// Account timezone offset from UTC in hours.
    pub timezone_offset: f64,
}

/// OAuth token object embedded in a v3 session response.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OauthToken {
    /// Bearer access token.
    pub access_token: String,
    /// Token used to obtain a fresh access token.
    pub refresh_token: String,
    /// Granted scope.
    pub scope: String,
    /// Token type, e.g. `Bearer`.
    pub token_type: String,
    /// Remaining validity in seconds, as a string on the wire.
    pub expires_in: String,
}

/// Response body for OAuth (v3) session creation.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionV3Response {
    /// Client identifier.
    pub client_id: String,
    /// Identifier of the active account.
    pub account_id: String,
    /// Push-streaming endpoint URL for this session.
    pub lightstreamer_endpoint: String,
    /// Account timezone offset from UTC in hours.
    pub timezone_offset: f64,
    /// OAuth token pair for this session.
    pub oauth_token: OauthToken,
}

/// Request body for refreshing an OAuth access token.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    /// The refresh token obtained at login.
    pub refresh_token: String,
}
