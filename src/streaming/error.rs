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

//! Error types produced by the streaming subscription layer.

use thiserror::Error;

/// A typed error enumeration for the streaming subscription layer.
#[derive(Debug, Clone, Error)]
pub enum StreamingError {
    /// The server rejected the subscription, tagged with the originating
    /// item names and requested field list for correlation.
    #[error("Subscription rejected for items [{items}] with fields [{fields}]: {reason}")]
    Rejected {
        /// Comma-joined item names of the rejected subscription.
        items: String,
        /// Comma-joined field names of the rejected subscription.
        fields: String,
        /// Server-provided reason.
        reason: String,
    },
    /// A field value could not be converted to the requested type.
    #[error("Cannot parse '{value}' as {target}")]
    UpdateFormat {
        /// The offending textual value.
        value: String,
        /// Name of the target type.
        target: &'static str,
    },
    /// A field expected to be present in an update was absent.
    #[error("Update for item '{item}' is missing field '{field}'")]
    MissingField {
        /// Item the update belongs to.
        item: String,
        /// The absent field name.
        field: String,
    },
    /// The streaming transport is not connected.
    #[error("Streaming transport not connected")]
    NotConnected,
    /// Failure reported by the underlying transport.
    #[error("Transport error: {0}")]
    Transport(String),
    /// An internal channel was closed, typically during shutdown.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_rejected_display_carries_context() {
        let error = StreamingError::Rejected {
            items: "MARKET:CS.D.EURUSD.MINI.IP".to_string(),
            fields: "BID,OFR".to_string(),
            reason: "unknown item".to_string(),
        };

        let rendered = error.to_string();
        assert!(rendered.contains("MARKET:CS.D.EURUSD.MINI.IP"));
        assert!(rendered.contains("BID,OFR"));
        assert!(rendered.contains("unknown item"));
    }

    #[rstest]
    fn test_update_format_display() {
        let error = StreamingError::UpdateFormat {
            value: "maybe".to_string(),
            target: "bool",
        };

        assert_eq!(error.to_string(), "Cannot parse 'maybe' as bool");
    }
}
