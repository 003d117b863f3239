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

//! IG API credential storage for login authentication.

use core::fmt::Debug;

use zeroize::ZeroizeOnDrop;

/// API credentials required to establish an IG trading session.
///
/// IG uses an API key together with an account identifier and password to
/// obtain session tokens (either CST/security-token pairs or OAuth tokens)
/// which authenticate subsequent requests.
#[derive(Clone, ZeroizeOnDrop)]
pub struct ApiCredential {
    api_key: Box<str>,
    identifier: Box<str>,
    password: Box<str>,
    account_id: Box<str>,
}

impl Debug for ApiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(ApiCredential))
            .field("api_key", &self.masked_api_key())
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl ApiCredential {
    /// Creates a new [`ApiCredential`] instance.
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        identifier: impl Into<String>,
        password: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into().into_boxed_str(),
            identifier: identifier.into().into_boxed_str(),
            password: password.into().into_boxed_str(),
            account_id: account_id.into().into_boxed_str(),
        }
    }

    /// Loads credentials from the `IG_API_KEY`, `IG_IDENTIFIER`, `IG_PASSWORD`
    /// and `IG_ACCOUNT_ID` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the environment variables is unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| anyhow::anyhow!("Missing environment variable: {name}"))
        };
        Ok(Self::new(
            var("IG_API_KEY")?,
            var("IG_IDENTIFIER")?,
            var("IG_PASSWORD")?,
            var("IG_ACCOUNT_ID")?,
        ))
    }

    /// Returns the API key associated with this credential.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the account identifier used for login.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the account password.
    ///
    /// # Safety
    ///
    /// The password should be handled carefully and never logged or exposed.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the preferred account identifier.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Returns a masked version of the API key for logging purposes.
    ///
    /// Shows first 4 and last 4 characters with ellipsis in between.
    /// For keys shorter than 8 characters, shows asterisks only.
    #[must_use]
    pub fn masked_api_key(&self) -> String {
        let key = self.api_key.as_ref();
        let len = key.len();

        if len <= 8 {
            "*".repeat(len)
        } else {
            format!("{}...{}", &key[..4], &key[len - 4..])
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const API_KEY: &str = "test_api_key_123";
    const IDENTIFIER: &str = "trader01";
    const PASSWORD: &str = "hunter2hunter2";
    const ACCOUNT_ID: &str = "ABC12";

    #[rstest]
    fn test_credential_creation() {
        let credential = ApiCredential::new(API_KEY, IDENTIFIER, PASSWORD, ACCOUNT_ID);

        assert_eq!(credential.api_key(), API_KEY);
        assert_eq!(credential.identifier(), IDENTIFIER);
        assert_eq!(credential.password(), PASSWORD);
        assert_eq!(credential.account_id(), ACCOUNT_ID);
    }

    #[rstest]
    fn test_masked_api_key() {
        let credential = ApiCredential::new(API_KEY, IDENTIFIER, PASSWORD, ACCOUNT_ID);

        assert_eq!(credential.masked_api_key(), "test..._123");
    }

    #[rstest]
    fn test_masked_api_key_short() {
        let credential = ApiCredential::new("short", IDENTIFIER, PASSWORD, ACCOUNT_ID);

        assert_eq!(credential.masked_api_key(), "*****");
    }

    #[rstest]
    fn test_debug_does_not_leak_password() {
        let credential = ApiCredential::new(API_KEY, IDENTIFIER, PASSWORD, ACCOUNT_ID);
        let debug_string = format!("{credential:?}");

        assert!(!debug_string.contains(PASSWORD));
        assert!(debug_string.contains("<redacted>"));
    }
}
