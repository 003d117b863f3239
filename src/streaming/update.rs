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

//! Typed access to streaming push frames.
//!
//! Each push frame carries the full set of field values known at push time
//! plus the subset that actually changed since the prior push for that item.
//! [`ItemUpdate`] exposes both views; field values stay textual until a typed
//! accessor converts them, and every conversion failure surfaces the
//! offending string and target type instead of a silent default.

use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use ustr::Ustr;

use super::error::StreamingError;
use crate::common::consts::IG_REFERENCE_TIMEZONE;

/// One push frame for one item, with delta and full-state views.
#[derive(Clone, Debug)]
pub struct ItemUpdate {
    /// Name of the item this update belongs to.
    pub item: Ustr,
    fields: AHashMap<Ustr, Option<String>>,
    changed: AHashSet<Ustr>,
}

impl ItemUpdate {
    /// Creates a new [`ItemUpdate`] instance.
    #[must_use]
    pub fn new(
        item: Ustr,
        fields: AHashMap<Ustr, Option<String>>,
        changed: AHashSet<Ustr>,
    ) -> Self {
        Self {
            item,
            fields,
            changed,
        }
    }

    /// Returns the last known value of `field`, or `None` when the field is
    /// absent from this frame or null.
    #[must_use]
    pub fn latest(&self, field: &str) -> Option<&str> {
        self.fields
            .get(&Ustr::from(field))
            .and_then(|v| v.as_deref())
    }

    /// Returns whether `field` changed in this push.
    #[must_use]
    pub fn was_changed(&self, field: &str) -> bool {
        self.changed.contains(&Ustr::from(field))
    }

    /// Returns the names of the fields that changed in this push.
    pub fn changed_fields(&self) -> impl Iterator<Item = &Ustr> {
        self.changed.iter()
    }

    /// Returns all known field values in this frame.
    pub fn fields(&self) -> impl Iterator<Item = (&Ustr, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k, v.as_deref()))
    }

    /// Returns the value of `field` or a typed missing-field error.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::MissingField`] when the field is absent or null.
    pub fn require(&self, field: &str) -> Result<&str, StreamingError> {
        self.latest(field).ok_or_else(|| StreamingError::MissingField {
            item: self.item.to_string(),
            field: field.to_string(),
        })
    }

    /// Returns `field` interpreted as a boolean.
    ///
    /// `"0"`/`"false"` map to `false` and `"1"`/`"true"` to `true`; anything
    /// else is a formatting error.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::UpdateFormat`] on an unrecognized value.
    pub fn value_bool(&self, field: &str) -> Result<Option<bool>, StreamingError> {
        self.latest(field).map(parse_bool).transpose()
    }

    /// Returns `field` interpreted as a signed integer.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::UpdateFormat`] on an unparseable value.
    pub fn value_i64(&self, field: &str) -> Result<Option<i64>, StreamingError> {
        self.latest(field)
            .map(|v| {
                v.parse::<i64>().map_err(|_| StreamingError::UpdateFormat {
                    value: v.to_string(),
                    target: "i64",
                })
            })
            .transpose()
    }

    /// Returns `field` interpreted as a fixed-point decimal.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::UpdateFormat`] on an unparseable value.
    pub fn value_decimal(&self, field: &str) -> Result<Option<Decimal>, StreamingError> {
        self.latest(field)
            .map(|v| {
                v.parse::<Decimal>()
                    .map_err(|_| StreamingError::UpdateFormat {
                        value: v.to_string(),
                        target: "Decimal",
                    })
            })
            .transpose()
    }

    /// Returns `field` interpreted as an `HH:mm:ss` clock time in the
    /// platform reference timezone, resolved against the current instant.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::UpdateFormat`] on an unparseable value.
    pub fn value_clock_time(&self, field: &str) -> Result<Option<DateTime<Utc>>, StreamingError> {
        self.latest(field)
            .map(|v| parse_clock_time(v, Utc::now(), IG_REFERENCE_TIMEZONE))
            .transpose()
    }

    /// Returns `field` interpreted as epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::UpdateFormat`] on an unparseable value.
    pub fn value_unix_millis(&self, field: &str) -> Result<Option<DateTime<Utc>>, StreamingError> {
        self.latest(field)
            .map(|v| {
                v.parse::<i64>()
                    .ok()
                    .and_then(DateTime::from_timestamp_millis)
                    .ok_or_else(|| StreamingError::UpdateFormat {
                        value: v.to_string(),
                        target: "epoch milliseconds",
                    })
            })
            .transpose()
    }

    /// Returns `field` parsed into a string-backed enum (or any `FromStr` type).
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::UpdateFormat`] on an unparseable value.
    pub fn value_enum<T: std::str::FromStr>(
        &self,
        field: &str,
    ) -> Result<Option<T>, StreamingError> {
        self.latest(field)
            .map(|v| {
                v.parse::<T>().map_err(|_| StreamingError::UpdateFormat {
                    value: v.to_string(),
                    target: std::any::type_name::<T>(),
                })
            })
            .transpose()
    }
}

fn parse_bool(value: &str) -> Result<bool, StreamingError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ if value.eq_ignore_ascii_case("false") => Ok(false),
        _ if value.eq_ignore_ascii_case("true") => Ok(true),
        _ => Err(StreamingError::UpdateFormat {
            value: value.to_string(),
            target: "bool",
        }),
    }
}

/// Combines an `HH:mm:ss` string with "today" in the reference timezone.
///
/// When the resulting instant lies in the future relative to `now` the value
/// must have been stamped before local midnight, so it is rolled back one
/// calendar day.
pub(crate) fn parse_clock_time(
    value: &str,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<DateTime<Utc>, StreamingError> {
    let format_error = || StreamingError::UpdateFormat {
        value: value.to_string(),
        target: "clock time (HH:mm:ss)",
    };

    let time = NaiveTime::parse_from_str(value, "%H:%M:%S").map_err(|_| format_error())?;
    let today = now.with_timezone(&tz).date_naive();

    let resolve = |date: chrono::NaiveDate| {
        tz.from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    };

    let candidate = resolve(today).ok_or_else(format_error)?;
    if candidate > now {
        let yesterday = today.pred_opt().ok_or_else(format_error)?;
        return resolve(yesterday).ok_or_else(format_error);
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::common::enums::CommandAction;

    fn update(pairs: &[(&str, Option<&str>)], changed: &[&str]) -> ItemUpdate {
        ItemUpdate::new(
            Ustr::from("TEST.ITEM"),
            pairs
                .iter()
                .map(|(k, v)| (Ustr::from(k), v.map(String::from)))
                .collect(),
            changed.iter().map(|f| Ustr::from(f)).collect(),
        )
    }

    #[rstest]
    fn test_latest_and_was_changed() {
        let update = update(&[("a", Some("1")), ("b", Some("2"))], &["b"]);

        assert_eq!(update.latest("a"), Some("1"));
        assert_eq!(update.latest("b"), Some("2"));
        assert!(!update.was_changed("a"));
        assert!(update.was_changed("b"));
    }

    #[rstest]
    fn test_latest_null_field() {
        let update = update(&[("a", None)], &["a"]);

        assert_eq!(update.latest("a"), None);
        assert!(update.was_changed("a"));
    }

    #[rstest]
    #[case("0", false)]
    #[case("1", true)]
    #[case("false", false)]
    #[case("TRUE", true)]
    fn test_value_bool(#[case] raw: &str, #[case] expected: bool) {
        let update = update(&[("flag", Some(raw))], &[]);
        assert_eq!(update.value_bool("flag").unwrap(), Some(expected));
    }

    #[rstest]
    fn test_value_bool_invalid() {
        let update = update(&[("flag", Some("maybe"))], &[]);
        let result = update.value_bool("flag");

        assert!(matches!(
            result,
            Err(StreamingError::UpdateFormat { target: "bool", .. })
        ));
    }

    #[rstest]
    fn test_value_decimal() {
        let update = update(&[("BID", Some("1.08425"))], &[]);
        assert_eq!(update.value_decimal("BID").unwrap(), Some(dec!(1.08425)));
    }

    #[rstest]
    fn test_value_enum() {
        let update = update(&[("ACTION", Some("DELETE"))], &[]);
        assert_eq!(
            update.value_enum::<CommandAction>("ACTION").unwrap(),
            Some(CommandAction::Delete)
        );
    }

    #[rstest]
    fn test_value_enum_invalid_carries_value() {
        let update = update(&[("ACTION", Some("OBLITERATE"))], &[]);
        let result = update.value_enum::<CommandAction>("ACTION");

        match result {
            Err(StreamingError::UpdateFormat { value, .. }) => assert_eq!(value, "OBLITERATE"),
            other => panic!("Expected UpdateFormat error, got {other:?}"),
        }
    }

    #[rstest]
    fn test_require_missing_field() {
        let update = update(&[], &[]);
        let result = update.require("BID");

        assert!(matches!(result, Err(StreamingError::MissingField { .. })));
    }

    #[rstest]
    fn test_value_unix_millis() {
        let update = update(&[("UPDATE_TIME", Some("1700000000000"))], &[]);
        let instant = update.value_unix_millis("UPDATE_TIME").unwrap().unwrap();

        assert_eq!(instant.timestamp_millis(), 1_700_000_000_000);
    }

    #[rstest]
    fn test_clock_time_same_day() {
        // 14:30 UTC "now"; update stamped 13:00 London == 13:00 UTC in winter
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 14, 30, 0).unwrap();
        let parsed = parse_clock_time("13:00:00", now, chrono_tz::Europe::London).unwrap();

        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 1, 15, 13, 0, 0).unwrap());
    }

    #[rstest]
    fn test_clock_time_rolls_back_across_midnight() {
        // 00:10 London; an update stamped 23:55 must resolve to yesterday
        let now = Utc.with_ymd_and_hms(2026, 1, 16, 0, 10, 0).unwrap();
        let parsed = parse_clock_time("23:55:00", now, chrono_tz::Europe::London).unwrap();

        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2026, 1, 15, 23, 55, 0).unwrap()
        );
    }

    #[rstest]
    fn test_clock_time_invalid() {
        let now = Utc::now();
        let result = parse_clock_time("25:99:00", now, chrono_tz::Europe::London);

        assert!(matches!(
            result,
            Err(StreamingError::UpdateFormat { .. })
        ));
    }
}
