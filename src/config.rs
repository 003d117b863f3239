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

//! Configuration structures for the IG client.

use std::path::PathBuf;

use crate::common::consts::{IG_DEMO_HTTP_URL, IG_HTTP_URL};

/// Configuration for the IG client.
#[derive(Clone, Debug)]
pub struct IgClientConfig {
    /// Optional API key for authenticated requests.
    pub api_key: Option<String>,
    /// Optional account username for login.
    pub identifier: Option<String>,
    /// Optional account password for login.
    pub password: Option<String>,
    /// Optional preferred account identifier.
    pub account_id: Option<String>,
    /// Use the demo environment (default: false).
    pub is_demo: bool,
    /// Optional override for the REST base URL.
    pub base_url_http: Option<String>,
    /// Optional REST timeout in seconds.
    pub http_timeout_secs: Option<u64>,
    /// Optional maximum retry attempts for REST requests.
    pub max_retries: Option<u32>,
    /// Optional initial retry backoff in milliseconds.
    pub retry_delay_initial_ms: Option<u64>,
    /// Optional maximum retry backoff in milliseconds.
    pub retry_delay_max_ms: Option<u64>,
    /// Path of the cache database; `None` selects an in-memory cache.
    pub cache_path: Option<PathBuf>,
}

impl Default for IgClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            identifier: None,
            password: None,
            account_id: None,
            is_demo: false,
            base_url_http: None,
            http_timeout_secs: Some(60),
            max_retries: Some(3),
            retry_delay_initial_ms: Some(1_000),
            retry_delay_max_ms: Some(10_000),
            cache_path: None,
        }
    }
}

impl IgClientConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with credentials loaded from the
    /// `IG_API_KEY`, `IG_IDENTIFIER`, `IG_PASSWORD` and `IG_ACCOUNT_ID`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the environment variables is unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let credential = crate::common::credential::ApiCredential::from_env()?;
        Ok(Self {
            api_key: Some(credential.api_key().to_string()),
            identifier: Some(credential.identifier().to_string()),
            password: Some(credential.password().to_string()),
            account_id: Some(credential.account_id().to_string()),
            ..Self::default()
        })
    }

    /// Returns `true` if API key, identifier and password are all available.
    #[must_use]
    pub fn has_api_credentials(&self) -> bool {
        self.api_key.is_some() && self.identifier.is_some() && self.password.is_some()
    }

    /// Returns the REST base URL, considering overrides and environment.
    #[must_use]
    pub fn http_base_url(&self) -> String {
        self.base_url_http.clone().unwrap_or_else(|| {
            if self.is_demo {
                IG_DEMO_HTTP_URL.to_string()
            } else {
                IG_HTTP_URL.to_string()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_default_config() {
        let config = IgClientConfig::default();

        assert!(!config.has_api_credentials());
        assert_eq!(config.http_base_url(), IG_HTTP_URL);
        assert_eq!(config.http_timeout_secs, Some(60));
    }

    #[rstest]
    fn test_demo_url_selection() {
        let config = IgClientConfig {
            is_demo: true,
            ..Default::default()
        };

        assert_eq!(config.http_base_url(), IG_DEMO_HTTP_URL);
    }

    #[rstest]
    fn test_base_url_override_wins() {
        let config = IgClientConfig {
            is_demo: true,
            base_url_http: Some("http://localhost:8080".to_string()),
            ..Default::default()
        };

        assert_eq!(config.http_base_url(), "http://localhost:8080");
    }

    #[rstest]
    fn test_has_api_credentials() {
        let config = IgClientConfig {
            api_key: Some("key".to_string()),
            identifier: Some("id".to_string()),
            password: Some("pw".to_string()),
            ..Default::default()
        };

        assert!(config.has_api_credentials());
    }
}
