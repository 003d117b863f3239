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

//! Top-level error type aggregating the per-surface taxonomies.

use thiserror::Error;

use crate::{
    cache::CacheError, http::IgHttpError, session::SessionError, streaming::StreamingError,
};

/// Unified error type returned by the [`IgClient`](crate::client::IgClient)
/// facade. Callers branch on the surface, then on the typed kind within it.
#[derive(Debug, Clone, Error)]
pub enum IgError {
    /// Session lifecycle failure.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Streaming subscription failure.
    #[error(transparent)]
    Streaming(#[from] StreamingError),
    /// Cache store failure.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// HTTP transport failure outside a session operation.
    #[error(transparent)]
    Http(#[from] IgHttpError),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_transparent_display() {
        let error = IgError::from(SessionError::MissingCredentials);
        assert_eq!(error.to_string(), "No credentials available");

        let error = IgError::from(CacheError::NotFound {
            epic: "X.IP".to_string(),
        });
        assert_eq!(error.to_string(), "No cached row for epic 'X.IP'");
    }
}
