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

//! Constants shared across the IG client integration.

use std::time::Duration;

/// Production REST API base URL.
pub const IG_HTTP_URL: &str = "https://api.ig.com/gateway/deal";

/// Demo REST API base URL.
pub const IG_DEMO_HTTP_URL: &str = "https://demo-api.ig.com/gateway/deal";

/// User agent sent with every HTTP request.
pub const IG_USER_AGENT: &str = concat!("ig-markets/", env!("CARGO_PKG_VERSION"));

/// Reference timezone for intraday clock-time field values.
///
/// The platform emits update times as bare `HH:mm:ss` strings anchored to this
/// timezone, with no date component.
pub const IG_REFERENCE_TIMEZONE: chrono_tz::Tz = chrono_tz::Europe::London;

/// Skew absorbed when deciding whether a token expiry instant is already in
/// the past at swap time.
pub const EXPIRY_EPSILON: Duration = Duration::from_millis(100);

/// Lead subtracted from the exact expiry instant when arming the one-shot
/// expiry timer, so the `Expired` transition is published no later than the
/// true expiry.
pub const EXPIRY_TIMER_LEAD: Duration = Duration::from_millis(50);

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_timer_lead_within_epsilon() {
        assert!(EXPIRY_TIMER_LEAD < EXPIRY_EPSILON);
    }

    #[rstest]
    fn test_urls_are_https() {
        assert!(IG_HTTP_URL.starts_with("https://"));
        assert!(IG_DEMO_HTTP_URL.starts_with("https://"));
    }
}
