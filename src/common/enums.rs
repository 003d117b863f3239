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

//! Enumerations shared across the IG client integration.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Delivery semantics of a streaming subscription.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionMode {
    /// Latest-value overwrite semantics: each update replaces the prior value.
    Merge,
    /// Every update is delivered, no overwrite.
    Distinct,
    /// Unprocessed pass-through of server frames.
    Raw,
    /// Key-based add/update/delete stream.
    Command,
}

/// Action carried by a COMMAND-mode update frame.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandAction {
    /// A new key entered the stream.
    Add,
    /// An existing key's fields changed.
    Update,
    /// The key left the stream.
    Delete,
}

/// Connection status reported by the streaming transport.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    Default,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Connection attempt in progress.
    Connecting,
    /// Connected with a full-duplex streaming channel.
    ConnectedStreaming,
    /// Connected but degraded to HTTP polling.
    ConnectedPolling,
    /// Connected but no data is flowing.
    Stalled,
    /// Not connected.
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    /// Returns whether updates can currently be received.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::ConnectedStreaming | Self::ConnectedPolling)
    }
}

/// Granularity of a cached price series.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    Second,
    Minute,
    Minute5,
    Minute15,
    Hour,
    Hour4,
    Day,
}

impl Resolution {
    /// Returns the table-name suffix for this resolution.
    #[must_use]
    pub const fn table_suffix(&self) -> &'static str {
        match self {
            Self::Second => "s1",
            Self::Minute => "m1",
            Self::Minute5 => "m5",
            Self::Minute15 => "m15",
            Self::Hour => "h1",
            Self::Hour4 => "h4",
            Self::Day => "d1",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(SubscriptionMode::Merge, "MERGE")]
    #[case(SubscriptionMode::Distinct, "DISTINCT")]
    #[case(SubscriptionMode::Raw, "RAW")]
    #[case(SubscriptionMode::Command, "COMMAND")]
    fn test_subscription_mode_display(#[case] mode: SubscriptionMode, #[case] expected: &str) {
        assert_eq!(mode.to_string(), expected);
        assert_eq!(mode.as_ref(), expected);
    }

    #[rstest]
    #[case("ADD", CommandAction::Add)]
    #[case("UPDATE", CommandAction::Update)]
    #[case("DELETE", CommandAction::Delete)]
    #[case("delete", CommandAction::Delete)]
    fn test_command_action_parse(#[case] input: &str, #[case] expected: CommandAction) {
        assert_eq!(input.parse::<CommandAction>().unwrap(), expected);
    }

    #[rstest]
    fn test_connection_status_is_connected() {
        assert!(ConnectionStatus::ConnectedStreaming.is_connected());
        assert!(ConnectionStatus::ConnectedPolling.is_connected());
        assert!(!ConnectionStatus::Stalled.is_connected());
        assert!(!ConnectionStatus::Disconnected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
    }

    #[rstest]
    fn test_resolution_table_suffixes_unique() {
        use strum::IntoEnumIterator;

        let suffixes: Vec<&str> = Resolution::iter().map(|r| r.table_suffix()).collect();
        let mut deduped = suffixes.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(suffixes.len(), deduped.len());
    }
}
