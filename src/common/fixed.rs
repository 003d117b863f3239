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

//! Fixed-point conversion utilities for scaled integer storage columns.
//!
//! Cached numeric domain values (prices, margins, distances) are stored as
//! `value * 10^k` integer columns with a fixed per-column scale `k`. These
//! utilities convert between [`Decimal`] and the raw column representation
//! using pure integer arithmetic, avoiding floating-point precision loss.
//! `decode_scaled(encode_scaled(v, k), k) == v` holds for every value
//! representable at scale `k`.

use rust_decimal::Decimal;
use thiserror::Error;

/// Maximum supported column scale.
pub const MAX_SCALE: u8 = 18;

/// Precomputed powers of 10 for efficient scaling (covers 0..=18).
const POWERS_OF_10: [i64; 19] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
];

/// Returns 10^exp using the precomputed table.
///
/// # Panics
///
/// Panics if `exp` exceeds [`MAX_SCALE`].
#[inline]
#[must_use]
pub fn pow10(exp: u8) -> i64 {
    POWERS_OF_10[exp as usize]
}

/// A typed error for fixed-point encode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixedPointError {
    /// The value carries more fractional digits than the column scale.
    #[error("Value {value} is not representable at scale {scale}")]
    PrecisionLoss { value: Decimal, scale: u8 },
    /// The scaled value does not fit in an i64 column.
    #[error("Value {value} overflows an i64 column at scale {scale}")]
    Overflow { value: Decimal, scale: u8 },
    /// The requested scale exceeds [`MAX_SCALE`].
    #[error("Scale {0} exceeds the maximum supported scale of 18")]
    ScaleOutOfRange(u8),
}

/// Encodes a decimal value as a scaled integer for storage at scale `k`.
///
/// # Errors
///
/// Returns an error if the scale is out of range, the value has fractional
/// digits beyond `k`, or the scaled value overflows i64.
pub fn encode_scaled(value: Decimal, scale: u8) -> Result<i64, FixedPointError> {
    use rust_decimal::prelude::ToPrimitive;

    if scale > MAX_SCALE {
        return Err(FixedPointError::ScaleOutOfRange(scale));
    }
    if value != value.round_dp(u32::from(scale)) {
        return Err(FixedPointError::PrecisionLoss { value, scale });
    }

    value
        .checked_mul(Decimal::from(pow10(scale)))
        .and_then(|scaled| scaled.to_i64())
        .ok_or(FixedPointError::Overflow { value, scale })
}

/// Decodes a scaled integer column value back into a decimal at scale `k`.
///
/// # Panics
///
/// Panics if `scale` exceeds [`MAX_SCALE`].
#[must_use]
pub fn decode_scaled(raw: i64, scale: u8) -> Decimal {
    assert!(scale <= MAX_SCALE, "Scale {scale} exceeds maximum of 18");
    Decimal::new(raw, u32::from(scale)).normalize()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;

    #[rstest]
    #[case(dec!(1.23456), 5, 123_456)]
    #[case(dec!(0.00001), 5, 1)]
    #[case(dec!(-42.5), 1, -425)]
    #[case(dec!(500), 2, 50_000)]
    #[case(dec!(0), 5, 0)]
    fn test_encode_scaled(#[case] value: Decimal, #[case] scale: u8, #[case] expected: i64) {
        assert_eq!(encode_scaled(value, scale).unwrap(), expected);
    }

    #[rstest]
    #[case(dec!(1.23456), 5)]
    #[case(dec!(98765.4321), 4)]
    #[case(dec!(-0.01), 2)]
    #[case(dec!(1), 0)]
    fn test_round_trip(#[case] value: Decimal, #[case] scale: u8) {
        let raw = encode_scaled(value, scale).unwrap();
        assert_eq!(decode_scaled(raw, scale), value.normalize());
    }

    #[rstest]
    fn test_encode_precision_loss() {
        let result = encode_scaled(dec!(1.234), 2);
        assert!(matches!(
            result,
            Err(FixedPointError::PrecisionLoss { .. })
        ));
    }

    #[rstest]
    fn test_encode_overflow() {
        let result = encode_scaled(Decimal::MAX, 5);
        assert!(matches!(result, Err(FixedPointError::Overflow { .. })));
    }

    #[rstest]
    fn test_encode_scale_out_of_range() {
        let result = encode_scaled(dec!(1), 19);
        assert!(matches!(result, Err(FixedPointError::ScaleOutOfRange(19))));
    }

    #[rstest]
    fn test_decode_normalizes_trailing_zeros() {
        assert_eq!(decode_scaled(50_000, 2), dec!(500));
    }
}
