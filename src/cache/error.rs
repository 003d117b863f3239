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

//! Error types for the local cache store.

use thiserror::Error;

use crate::common::fixed::FixedPointError;

/// A typed error enumeration for cache store operations.
///
/// Structural failures (statement compilation, binding) are fatal for the
/// operation and propagate immediately; they are never retried silently.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Failure reported by the storage engine, with its extended result code.
    #[error("SQLite error (code {code:?}): {message}")]
    Sqlite {
        /// Engine extended result code when available.
        code: Option<i32>,
        /// Engine-provided message.
        message: String,
    },
    /// Failure obtaining a read connection from the pool.
    #[error("Connection pool error: {0}")]
    Pool(String),
    /// The requested key is absent.
    #[error("No cached row for epic '{epic}'")]
    NotFound {
        /// The missing key.
        epic: String,
    },
    /// Fewer rows were returned than keys requested in strict mode.
    #[error("Expected {requested} rows but found {found}")]
    InsufficientResults {
        /// Number of keys requested.
        requested: usize,
        /// Number of rows found.
        found: usize,
    },
    /// A value that must name a table or column failed validation.
    #[error("Invalid SQL identifier: '{0}'")]
    InvalidIdentifier(String),
    /// Fixed-point encode/decode failure.
    #[error(transparent)]
    FixedPoint(#[from] FixedPointError),
    /// A blocking task running the statement was cancelled or panicked.
    #[error("Cache task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(error: rusqlite::Error) -> Self {
        let code = match &error {
            rusqlite::Error::SqliteFailure(e, _) => Some(e.extended_code),
            _ => None,
        };
        Self::Sqlite {
            code,
            message: error.to_string(),
        }
    }
}

impl From<r2d2::Error> for CacheError {
    fn from(error: r2d2::Error) -> Self {
        Self::Pool(error.to_string())
    }
}
