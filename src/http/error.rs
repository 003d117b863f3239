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

//! Error structures and enumerations for the IG HTTP integration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents the JSON structure of an error response returned by the IG API.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IgErrorResponse {
    /// Dot-separated error code, e.g. `error.security.oauth-token-invalid`.
    #[serde(default)]
    pub error_code: Option<String>,
}

/// A typed error enumeration for the IG HTTP client.
#[derive(Debug, Clone, Error)]
pub enum IgHttpError {
    /// Error variant when credentials are missing but the request is authenticated.
    #[error("Missing credentials for authenticated request")]
    MissingCredentials,
    /// Errors returned directly by the IG API.
    #[error("IG API error: {code}")]
    ApiError { code: String },
    /// Failure during JSON serialization/deserialization.
    #[error("JSON error: {0}")]
    JsonError(String),
    /// A required response header was absent.
    #[error("Missing response header: {0}")]
    MissingHeader(String),
    /// Request was canceled, typically due to shutdown or disconnect.
    #[error("Request canceled: {0}")]
    Canceled(String),
    /// Request timed out.
    #[error("Request timed out: {0}")]
    Timeout(String),
    /// Generic network error.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Any unknown HTTP status or unexpected response from IG.
    #[error("Unexpected HTTP status code {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

impl IgHttpError {
    /// Returns whether a retry attempt is reasonable for this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(_) | Self::Timeout(_) => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for IgHttpError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else {
            Self::NetworkError(error.to_string())
        }
    }
}

impl From<serde_json::Error> for IgHttpError {
    fn from(error: serde_json::Error) -> Self {
        Self::JsonError(error.to_string())
    }
}

impl From<IgErrorResponse> for IgHttpError {
    fn from(error: IgErrorResponse) -> Self {
        let code = error
            .error_code
            .unwrap_or_else(|| "error.unknown".to_string());
        Self::ApiError { code }
    }
}
