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

//! Provides the HTTP client integration for the IG REST API.

use std::{collections::HashMap, fmt::Debug, time::Duration};

use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

use super::error::{IgErrorResponse, IgHttpError};
use crate::common::consts::IG_USER_AGENT;

/// A decoded HTTP response with its status and headers retained.
///
/// Session endpoints return tokens in response headers, so callers need
/// access to more than the deserialized body.
#[derive(Clone, Debug)]
pub struct IgResponse<T> {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, lower-cased keys.
    pub headers: HashMap<String, String>,
    /// Deserialized response body.
    pub body: T,
}

impl<T> IgResponse<T> {
    /// Returns the named response header, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns the named response header or a typed error.
    ///
    /// # Errors
    ///
    /// Returns [`IgHttpError::MissingHeader`] if the header is absent.
    pub fn require_header(&self, name: &str) -> Result<&str, IgHttpError> {
        self.header(name)
            .ok_or_else(|| IgHttpError::MissingHeader(name.to_string()))
    }
}

/// Raw HTTP client for low-level IG API operations.
///
/// Handles request construction, the `X-IG-API-KEY` and endpoint-version
/// headers, retry with exponential backoff, and typed error mapping. It does
/// not know about session state; authentication headers are supplied by the
/// caller per request.
pub struct IgHttpClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
    retry_delay_initial: Duration,
    retry_delay_max: Duration,
    cancellation_token: CancellationToken,
}

impl Debug for IgHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(IgHttpClient))
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl IgHttpClient {
    /// Creates a new [`IgHttpClient`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(
        base_url: String,
        api_key: String,
        timeout_secs: Option<u64>,
        max_retries: Option<u32>,
        retry_delay_initial_ms: Option<u64>,
        retry_delay_max_ms: Option<u64>,
    ) -> Result<Self, IgHttpError> {
        let client = reqwest::Client::builder()
            .user_agent(IG_USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(60)))
            .build()
            .map_err(|e| IgHttpError::NetworkError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            api_key,
            client,
            max_retries: max_retries.unwrap_or(3),
            retry_delay_initial: Duration::from_millis(retry_delay_initial_ms.unwrap_or(1_000)),
            retry_delay_max: Duration::from_millis(retry_delay_max_ms.unwrap_or(10_000)),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Returns the base URL for this client.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cancel all pending HTTP requests.
    pub fn cancel_all_requests(&self) {
        self.cancellation_token.cancel();
    }

    /// Returns the cancellation token for this client.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Sends a request and deserializes the JSON response body.
    ///
    /// `version` is sent as the IG endpoint `Version` header. `auth_headers`
    /// carry whatever session tokens the caller currently holds.
    ///
    /// # Errors
    ///
    /// Returns an error on connectivity failure, cancellation, a non-success
    /// status (mapped through [`IgErrorResponse`] when possible), or a body
    /// that fails to deserialize.
    pub async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        version: u8,
        auth_headers: &[(String, String)],
        body: Option<&B>,
    ) -> Result<IgResponse<T>, IgHttpError> {
        let response = self
            .send_raw(method, path, version, auth_headers, body)
            .await?;

        let body: T = serde_json::from_str(&response.body).map_err(|e| {
            IgHttpError::JsonError(format!(
                "Failed to deserialize response: {e}\nBody: {}",
                response.body
            ))
        })?;

        Ok(IgResponse {
            status: response.status,
            headers: response.headers,
            body,
        })
    }

    /// Sends a request whose response body is ignored (e.g. logout).
    ///
    /// # Errors
    ///
    /// Returns an error on connectivity failure, cancellation, or a
    /// non-success status.
    pub async fn send_no_content<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        version: u8,
        auth_headers: &[(String, String)],
        body: Option<&B>,
    ) -> Result<IgResponse<()>, IgHttpError> {
        let response = self
            .send_raw(method, path, version, auth_headers, body)
            .await?;

        Ok(IgResponse {
            status: response.status,
            headers: response.headers,
            body: (),
        })
    }

    async fn send_raw<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        version: u8,
        auth_headers: &[(String, String)],
        body: Option<&B>,
    ) -> Result<IgResponse<String>, IgHttpError> {
        let url = format!("{}{path}", self.base_url);
        let body_bytes = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| IgHttpError::JsonError(format!("Failed to serialize body: {e}")))?;

        let mut attempt = 0u32;
        let mut delay = self.retry_delay_initial;

        loop {
            let result = self
                .execute(&method, &url, version, auth_headers, body_bytes.as_deref())
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Request {method} {path} failed (attempt {attempt}/{}): {e}; retrying in {delay:?}",
                        self.max_retries,
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {},
                        () = self.cancellation_token.cancelled() => {
                            return Err(IgHttpError::Canceled(
                                "Client disconnecting or shutting down".to_string(),
                            ));
                        }
                    }
                    delay = (delay * 2).min(self.retry_delay_max);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute(
        &self,
        method: &Method,
        url: &str,
        version: u8,
        auth_headers: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Result<IgResponse<String>, IgHttpError> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .header("X-IG-API-KEY", &self.api_key)
            .header("Version", version.to_string())
            .header("Accept", "application/json; charset=UTF-8");

        for (name, value) in auth_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(bytes) = body {
            request = request
                .header("Content-Type", "application/json; charset=UTF-8")
                .body(bytes.to_vec());
        }

        let response = tokio::select! {
            result = request.send() => result?,
            () = self.cancellation_token.cancelled() => {
                return Err(IgHttpError::Canceled(
                    "Client disconnecting or shutting down".to_string(),
                ));
            }
        };

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<IgErrorResponse>(&body)
                && error_response.error_code.is_some()
            {
                return Err(error_response.into());
            }
            return Err(IgHttpError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(IgResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn client() -> IgHttpClient {
        IgHttpClient::new(
            "https://demo-api.ig.com/gateway/deal".to_string(),
            "key".to_string(),
            Some(5),
            Some(0),
            None,
            None,
        )
        .unwrap()
    }

    #[rstest]
    fn test_client_creation() {
        let client = client();
        assert_eq!(client.base_url(), "https://demo-api.ig.com/gateway/deal");
    }

    #[rstest]
    fn test_response_header_lookup_case_insensitive() {
        let response = IgResponse {
            status: 200,
            headers: HashMap::from([("cst".to_string(), "token123".to_string())]),
            body: (),
        };

        assert_eq!(response.header("CST"), Some("token123"));
        assert_eq!(response.header("cst"), Some("token123"));
        assert!(response.header("x-security-token").is_none());
    }

    #[rstest]
    fn test_require_header_missing() {
        let response = IgResponse {
            status: 200,
            headers: HashMap::new(),
            body: (),
        };

        let result = response.require_header("CST");
        assert!(matches!(result, Err(IgHttpError::MissingHeader(_))));
    }

    #[rstest]
    fn test_debug_omits_api_key() {
        let client = client();
        let debug_string = format!("{client:?}");

        assert!(!debug_string.contains("key"));
        assert!(debug_string.contains("base_url"));
    }
}
