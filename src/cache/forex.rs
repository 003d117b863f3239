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

//! Forex market reference data: inference, upsert and queries.
//!
//! Inbound market definitions arrive loosely typed; inference validates them
//! into [`ForexMarket`] rows before anything touches the database. A row that
//! fails inference is skipped (and logged) while the rest of the batch
//! proceeds. Each accepted row is written with a single upsert statement and
//! batches run in one transaction.
//!
//! Column scales: `contract_size`, stop distances, `guaranteed_stop_premium`,
//! margin band bounds and `margin_factor` are stored at scale 2;
//! `slippage_factor` at scale 1.

use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use super::{error::CacheError, store::CacheStore};
use crate::common::{
    currency::Currency,
    fixed::{decode_scaled, encode_scaled},
};

/// Scale of monetary/distance columns.
const MONEY_SCALE: u8 = 2;
/// Scale of the slippage factor column.
const SLIPPAGE_SCALE: u8 = 1;

/// One deposit band of a market's margin schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarginBand {
    /// Inclusive lower bound of the band.
    pub lower: Decimal,
    /// Exclusive upper bound; `None` only on the final, unbounded band.
    pub upper: Option<Decimal>,
    /// Margin factor (percent) applied within the band.
    pub margin_factor: Decimal,
}

/// A validated forex market reference row.
#[derive(Clone, Debug, PartialEq)]
pub struct ForexMarket {
    /// Unique instrument identifier.
    pub epic: String,
    /// Base currency of the pair.
    pub base: Currency,
    /// Counter currency of the pair; always differs from `base`.
    pub counter: Currency,
    /// Number of decimal places in quoted prices.
    pub decimal_places: u32,
    /// Size of one contract.
    pub contract_size: Decimal,
    /// Minimum stop distance for normal positions.
    pub min_normal_stop_distance: Decimal,
    /// Minimum stop distance for limited-risk positions.
    pub min_limited_risk_stop_distance: Decimal,
    /// Premium charged for a guaranteed stop.
    pub guaranteed_stop_premium: Decimal,
    /// Slippage factor applied to stop executions.
    pub slippage_factor: Decimal,
    /// Whether trailing stops are permitted.
    pub trailing_stops_allowed: bool,
    /// Margin schedule, sorted and contiguous.
    pub margin_bands: Vec<MarginBand>,
}

/// A unit-tagged numeric value as delivered by the platform.
#[derive(Clone, Debug, Deserialize)]
pub struct RawUnitValue {
    /// Unit name, e.g. `POINTS` or `pct`.
    pub unit: String,
    /// The value, absent when the platform omits it.
    pub value: Option<Decimal>,
}

/// A margin band as delivered by the platform.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarginBand {
    /// Lower bound; absent means zero on the first band.
    pub min: Option<Decimal>,
    /// Upper bound; absent only on the final band.
    pub max: Option<Decimal>,
    /// Margin factor within the band.
    pub margin: Decimal,
}

/// A loosely typed market definition fetched from the platform.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarket {
    /// Unique instrument identifier.
    pub epic: String,
    /// Display name carrying the currency pair, e.g. `EUR/USD`.
    pub instrument_name: String,
    /// Number of decimal places in quoted prices.
    pub decimal_places: Option<i64>,
    /// Contract size as a decimal string.
    pub contract_size: Option<String>,
    /// Minimum stop distance for normal positions.
    pub min_normal_stop_distance: Option<RawUnitValue>,
    /// Minimum stop distance for limited-risk positions.
    pub min_controlled_risk_stop_distance: Option<RawUnitValue>,
    /// Premium charged for a guaranteed stop.
    pub limited_risk_premium: Option<RawUnitValue>,
    /// Slippage factor applied to stop executions.
    pub slippage_factor: Option<RawUnitValue>,
    /// Whether trailing stops are permitted.
    #[serde(default)]
    pub trailing_stops_allowed: bool,
    /// Margin schedule.
    #[serde(default)]
    pub margin_deposit_bands: Vec<RawMarginBand>,
}

/// A typed error for per-row inference failures.
///
/// Inference failures are non-fatal for a batch: the offending row is
/// skipped and the rest of the batch continues.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// The instrument name does not resolve to two distinct currency codes.
    #[error("Cannot infer currency pair from '{name}'")]
    AmbiguousCurrencyPair {
        /// The instrument name that failed to resolve.
        name: String,
    },
    /// A required field is absent.
    #[error("Missing field '{field}'")]
    MissingField {
        /// The absent field.
        field: &'static str,
    },
    /// A unit-tagged value carries the wrong unit.
    #[error("Field '{field}' has unexpected unit '{unit}'")]
    WrongUnit {
        /// The offending field.
        field: &'static str,
        /// The unit found.
        unit: String,
    },
    /// A value that must be non-negative is negative.
    #[error("Field '{field}' must be non-negative")]
    Negative {
        /// The offending field.
        field: &'static str,
    },
    /// Margin bands are unsorted, overlapping or have gaps.
    #[error("Margin bands are not contiguous")]
    DiscontiguousMarginBands,
    /// The epic is empty or malformed.
    #[error("Invalid epic: '{epic}'")]
    InvalidEpic {
        /// The offending epic.
        epic: String,
    },
}

/// Outcome of a tolerant batch import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Rows inserted or updated.
    pub inserted: usize,
    /// Rows skipped due to inference failures.
    pub skipped: usize,
}

impl ForexMarket {
    /// Infers a validated market from loosely typed upstream data.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] naming the first violated constraint.
    pub fn try_from_raw(raw: &RawMarket) -> Result<Self, InferenceError> {
        if raw.epic.trim().is_empty() {
            return Err(InferenceError::InvalidEpic {
                epic: raw.epic.clone(),
            });
        }

        let (base, counter) = infer_currency_pair(&raw.instrument_name)?;

        let decimal_places = raw
            .decimal_places
            .ok_or(InferenceError::MissingField {
                field: "decimalPlaces",
            })
            .and_then(|v| {
                u32::try_from(v).map_err(|_| InferenceError::Negative {
                    field: "decimalPlaces",
                })
            })?;

        let contract_size: Decimal = raw
            .contract_size
            .as_deref()
            .ok_or(InferenceError::MissingField {
                field: "contractSize",
            })?
            .parse()
            .map_err(|_| InferenceError::MissingField {
                field: "contractSize",
            })?;
        ensure_non_negative(contract_size, "contractSize")?;

        let min_normal_stop_distance = points_value(
            raw.min_normal_stop_distance.as_ref(),
            "minNormalStopDistance",
        )?;
        let min_limited_risk_stop_distance = points_value(
            raw.min_controlled_risk_stop_distance.as_ref(),
            "minControlledRiskStopDistance",
        )?;
        let guaranteed_stop_premium =
            points_value(raw.limited_risk_premium.as_ref(), "limitedRiskPremium")?;
        let slippage_factor = percent_value(raw.slippage_factor.as_ref(), "slippageFactor")?;

        let margin_bands = infer_margin_bands(&raw.margin_deposit_bands)?;

        Ok(Self {
            epic: raw.epic.clone(),
            base,
            counter,
            decimal_places,
            contract_size,
            min_normal_stop_distance,
            min_limited_risk_stop_distance,
            guaranteed_stop_premium,
            slippage_factor,
            trailing_stops_allowed: raw.trailing_stops_allowed,
            margin_bands,
        })
    }
}

fn infer_currency_pair(name: &str) -> Result<(Currency, Currency), InferenceError> {
    let ambiguous = || InferenceError::AmbiguousCurrencyPair {
        name: name.to_string(),
    };

    let (base, counter) = name.split_once('/').ok_or_else(ambiguous)?;
    let base = Currency::new(base.trim()).map_err(|_| ambiguous())?;
    let counter = Currency::new(counter.trim()).map_err(|_| ambiguous())?;
    if base == counter {
        return Err(ambiguous());
    }
    Ok((base, counter))
}

fn ensure_non_negative(value: Decimal, field: &'static str) -> Result<(), InferenceError> {
    if value < Decimal::ZERO {
        return Err(InferenceError::Negative { field });
    }
    Ok(())
}

fn points_value(
    raw: Option<&RawUnitValue>,
    field: &'static str,
) -> Result<Decimal, InferenceError> {
    unit_value(raw, field, "POINTS")
}

fn percent_value(
    raw: Option<&RawUnitValue>,
    field: &'static str,
) -> Result<Decimal, InferenceError> {
    let raw = raw.ok_or(InferenceError::MissingField { field })?;
    if !raw.unit.eq_ignore_ascii_case("pct") && !raw.unit.eq_ignore_ascii_case("percentage") {
        return Err(InferenceError::WrongUnit {
            field,
            unit: raw.unit.clone(),
        });
    }
    let value = raw.value.ok_or(InferenceError::MissingField { field })?;
    ensure_non_negative(value, field)?;
    Ok(value)
}

fn unit_value(
    raw: Option<&RawUnitValue>,
    field: &'static str,
    expected_unit: &str,
) -> Result<Decimal, InferenceError> {
    let raw = raw.ok_or(InferenceError::MissingField { field })?;
    if !raw.unit.eq_ignore_ascii_case(expected_unit) {
        return Err(InferenceError::WrongUnit {
            field,
            unit: raw.unit.clone(),
        });
    }
    let value = raw.value.ok_or(InferenceError::MissingField { field })?;
    ensure_non_negative(value, field)?;
    Ok(value)
}

/// Validates the band schedule: sorted, contiguous (each band's upper bound
/// equals the next band's lower bound), non-negative factors, and at most
/// one unbounded band in the final position.
fn infer_margin_bands(raw: &[RawMarginBand]) -> Result<Vec<MarginBand>, InferenceError> {
    let mut bands: Vec<MarginBand> = Vec::with_capacity(raw.len());

    for (i, band) in raw.iter().enumerate() {
        let lower = band.min.unwrap_or(Decimal::ZERO);
        if lower < Decimal::ZERO || band.margin < Decimal::ZERO {
            return Err(InferenceError::Negative {
                field: "marginDepositBands",
            });
        }
        if band.max.is_none() && i != raw.len() - 1 {
            return Err(InferenceError::DiscontiguousMarginBands);
        }
        if let Some(previous) = bands.last() {
            if previous.upper != Some(lower) {
                return Err(InferenceError::DiscontiguousMarginBands);
            }
        }
        if let Some(upper) = band.max
            && upper <= lower
        {
            return Err(InferenceError::DiscontiguousMarginBands);
        }
        bands.push(MarginBand {
            lower,
            upper: band.max,
            margin_factor: band.margin,
        });
    }

    Ok(bands)
}

const UPSERT_MARKET: &str = "
INSERT INTO forex_markets (
    epic, base_currency, counter_currency, decimal_places, contract_size,
    min_normal_stop_distance, min_limited_risk_stop_distance,
    guaranteed_stop_premium, slippage_factor, trailing_stops_allowed
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(epic) DO UPDATE SET
    base_currency                  = excluded.base_currency,
    counter_currency               = excluded.counter_currency,
    decimal_places                 = excluded.decimal_places,
    contract_size                  = excluded.contract_size,
    min_normal_stop_distance       = excluded.min_normal_stop_distance,
    min_limited_risk_stop_distance = excluded.min_limited_risk_stop_distance,
    guaranteed_stop_premium        = excluded.guaranteed_stop_premium,
    slippage_factor                = excluded.slippage_factor,
    trailing_stops_allowed         = excluded.trailing_stops_allowed
";

const SELECT_MARKET: &str = "
SELECT epic, base_currency, counter_currency, decimal_places, contract_size,
       min_normal_stop_distance, min_limited_risk_stop_distance,
       guaranteed_stop_premium, slippage_factor, trailing_stops_allowed
FROM forex_markets
";

fn write_market(tx: &Transaction<'_>, market: &ForexMarket) -> Result<(), CacheError> {
    tx.execute(
        UPSERT_MARKET,
        params![
            market.epic,
            market.base.as_str(),
            market.counter.as_str(),
            market.decimal_places,
            encode_scaled(market.contract_size, MONEY_SCALE)?,
            encode_scaled(market.min_normal_stop_distance, MONEY_SCALE)?,
            encode_scaled(market.min_limited_risk_stop_distance, MONEY_SCALE)?,
            encode_scaled(market.guaranteed_stop_premium, MONEY_SCALE)?,
            encode_scaled(market.slippage_factor, SLIPPAGE_SCALE)?,
            market.trailing_stops_allowed,
        ],
    )?;

    tx.execute(
        "DELETE FROM forex_margin_bands WHERE epic = ?1",
        params![market.epic],
    )?;
    let mut stmt = tx.prepare(
        "INSERT INTO forex_margin_bands (epic, lower_bound, upper_bound, margin_factor)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for band in &market.margin_bands {
        let upper = band.upper.map(|u| encode_scaled(u, MONEY_SCALE)).transpose()?;
        stmt.execute(params![
            market.epic,
            encode_scaled(band.lower, MONEY_SCALE)?,
            upper,
            encode_scaled(band.margin_factor, MONEY_SCALE)?,
        ])?;
    }
    Ok(())
}

fn read_market(row: &rusqlite::Row<'_>) -> rusqlite::Result<ForexMarket> {
    let to_conversion_err = |e: anyhow::Error| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
    };

    let base: String = row.get(1)?;
    let counter: String = row.get(2)?;
    Ok(ForexMarket {
        epic: row.get(0)?,
        base: Currency::new(&base).map_err(to_conversion_err)?,
        counter: Currency::new(&counter).map_err(to_conversion_err)?,
        decimal_places: row.get(3)?,
        contract_size: decode_scaled(row.get(4)?, MONEY_SCALE),
        min_normal_stop_distance: decode_scaled(row.get(5)?, MONEY_SCALE),
        min_limited_risk_stop_distance: decode_scaled(row.get(6)?, MONEY_SCALE),
        guaranteed_stop_premium: decode_scaled(row.get(7)?, MONEY_SCALE),
        slippage_factor: decode_scaled(row.get(8)?, SLIPPAGE_SCALE),
        trailing_stops_allowed: row.get(9)?,
        margin_bands: Vec::new(),
    })
}

fn load_bands(conn: &Connection, epic: &str) -> Result<Vec<MarginBand>, CacheError> {
    let mut stmt = conn.prepare(
        "SELECT lower_bound, upper_bound, margin_factor
         FROM forex_margin_bands WHERE epic = ?1 ORDER BY lower_bound",
    )?;
    let bands = stmt
        .query_map(params![epic], |row| {
            let upper: Option<i64> = row.get(1)?;
            Ok(MarginBand {
                lower: decode_scaled(row.get(0)?, MONEY_SCALE),
                upper: upper.map(|u| decode_scaled(u, MONEY_SCALE)),
                margin_factor: decode_scaled(row.get(2)?, MONEY_SCALE),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(bands)
}

impl CacheStore {
    /// Imports a batch of loosely typed market definitions.
    ///
    /// The whole batch runs in one transaction. A row that fails inference
    /// (or is not representable at the column scales) is skipped and logged;
    /// structural statement failures abort the batch.
    ///
    /// # Errors
    ///
    /// Returns an error on statement compilation/execution failure.
    pub async fn upsert_forex_markets(
        &self,
        raws: Vec<RawMarket>,
    ) -> Result<ImportOutcome, CacheError> {
        self.with_writer(move |conn| {
            let tx = conn.transaction()?;
            let mut outcome = ImportOutcome::default();

            for raw in &raws {
                match ForexMarket::try_from_raw(raw) {
                    Ok(market) => match write_market(&tx, &market) {
                        Ok(()) => outcome.inserted += 1,
                        Err(CacheError::FixedPoint(e)) => {
                            tracing::warn!(epic = %raw.epic, "Skipping market row: {e}");
                            outcome.skipped += 1;
                        }
                        Err(e) => return Err(e),
                    },
                    Err(e) => {
                        tracing::warn!(epic = %raw.epic, "Skipping market row: {e}");
                        outcome.skipped += 1;
                    }
                }
            }

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    /// Upserts a single validated market row.
    ///
    /// # Errors
    ///
    /// Returns an error on statement failure or a value not representable at
    /// the column scales.
    pub async fn upsert_forex_market(&self, market: ForexMarket) -> Result<(), CacheError> {
        self.with_writer(move |conn| {
            let tx = conn.transaction()?;
            write_market(&tx, &market)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Point lookup by epic.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] when the epic is absent.
    pub async fn forex_market(&self, epic: &str) -> Result<ForexMarket, CacheError> {
        let epic = epic.to_string();
        self.with_reader(move |conn| {
            let sql = format!("{SELECT_MARKET} WHERE epic = ?1");
            let market = conn
                .query_row(&sql, params![epic], read_market)
                .optional()?
                .ok_or(CacheError::NotFound { epic })?;
            with_bands(conn, market)
        })
        .await
    }

    /// Set lookup by a collection of epics.
    ///
    /// With `expects_all` set, fewer rows than requested keys is a hard
    /// error; otherwise the rows that exist are returned silently.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InsufficientResults`] in strict mode when rows
    /// are missing, or an error on statement failure.
    pub async fn forex_markets(
        &self,
        epics: Vec<String>,
        expects_all: bool,
    ) -> Result<Vec<ForexMarket>, CacheError> {
        if epics.is_empty() {
            return Ok(Vec::new());
        }
        self.with_reader(move |conn| {
            let placeholders = vec!["?"; epics.len()].join(", ");
            let sql = format!("{SELECT_MARKET} WHERE epic IN ({placeholders}) ORDER BY epic");
            let mut stmt = conn.prepare(&sql)?;
            let markets = stmt
                .query_map(params_from_iter(epics.iter()), read_market)?
                .collect::<Result<Vec<_>, _>>()?;

            if expects_all && markets.len() < epics.len() {
                return Err(CacheError::InsufficientResults {
                    requested: epics.len(),
                    found: markets.len(),
                });
            }
            markets
                .into_iter()
                .map(|m| with_bands(conn, m))
                .collect()
        })
        .await
    }

    /// Filtered lookup by currency-pair predicate.
    ///
    /// `base`/`counter` constrain the respective side; both `None`
    /// degenerates to returning every market.
    ///
    /// # Errors
    ///
    /// Returns an error on statement failure.
    pub async fn forex_markets_filtered(
        &self,
        base: Option<Currency>,
        counter: Option<Currency>,
    ) -> Result<Vec<ForexMarket>, CacheError> {
        self.with_reader(move |conn| {
            let (clause, bindings): (&str, Vec<String>) = match (base, counter) {
                (Some(b), Some(c)) => (
                    "WHERE base_currency = ?1 AND counter_currency = ?2",
                    vec![b.as_str().to_string(), c.as_str().to_string()],
                ),
                (Some(b), None) => (
                    "WHERE base_currency = ?1",
                    vec![b.as_str().to_string()],
                ),
                (None, Some(c)) => (
                    "WHERE counter_currency = ?1",
                    vec![c.as_str().to_string()],
                ),
                (None, None) => ("", Vec::new()),
            };

            let sql = format!("{SELECT_MARKET} {clause} ORDER BY epic");
            let mut stmt = conn.prepare(&sql)?;
            let markets = stmt
                .query_map(params_from_iter(bindings.iter()), read_market)?
                .collect::<Result<Vec<_>, _>>()?;
            markets
                .into_iter()
                .map(|m| with_bands(conn, m))
                .collect()
        })
        .await
    }
}

fn with_bands(conn: &Connection, mut market: ForexMarket) -> Result<ForexMarket, CacheError> {
    market.margin_bands = load_bands(conn, &market.epic)?;
    Ok(market)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;

    fn unit(unit: &str, value: Decimal) -> Option<RawUnitValue> {
        Some(RawUnitValue {
            unit: unit.to_string(),
            value: Some(value),
        })
    }

    fn raw_market(epic: &str, name: &str) -> RawMarket {
        RawMarket {
            epic: epic.to_string(),
            instrument_name: name.to_string(),
            decimal_places: Some(5),
            contract_size: Some("100000".to_string()),
            min_normal_stop_distance: unit("POINTS", dec!(2)),
            min_controlled_risk_stop_distance: unit("POINTS", dec!(5)),
            limited_risk_premium: unit("POINTS", dec!(0.3)),
            slippage_factor: unit("pct", dec!(50)),
            trailing_stops_allowed: true,
            margin_deposit_bands: vec![
                RawMarginBand {
                    min: None,
                    max: Some(dec!(1000000)),
                    margin: dec!(3.33),
                },
                RawMarginBand {
                    min: Some(dec!(1000000)),
                    max: None,
                    margin: dec!(5),
                },
            ],
        }
    }

    #[rstest]
    fn test_inference_happy_path() {
        let market = ForexMarket::try_from_raw(&raw_market("CS.D.EURUSD.MINI.IP", "EUR/USD"))
            .unwrap();

        assert_eq!(market.base, Currency::new("EUR").unwrap());
        assert_eq!(market.counter, Currency::new("USD").unwrap());
        assert_eq!(market.contract_size, dec!(100000));
        assert_eq!(market.margin_bands.len(), 2);
        assert_eq!(market.margin_bands[0].lower, Decimal::ZERO);
        assert_eq!(market.margin_bands[1].upper, None);
    }

    #[rstest]
    #[case("EURUSD")]
    #[case("EUR/EUR")]
    #[case("EUR/US")]
    #[case("Euro against the Dollar")]
    fn test_inference_ambiguous_pair(#[case] name: &str) {
        let result = ForexMarket::try_from_raw(&raw_market("X.IP", name));
        assert!(matches!(
            result,
            Err(InferenceError::AmbiguousCurrencyPair { .. })
        ));
    }

    #[rstest]
    fn test_inference_wrong_unit() {
        let mut raw = raw_market("X.IP", "EUR/USD");
        raw.min_normal_stop_distance = unit("pct", dec!(2));

        let result = ForexMarket::try_from_raw(&raw);
        assert!(matches!(result, Err(InferenceError::WrongUnit { .. })));
    }

    #[rstest]
    fn test_inference_negative_distance() {
        let mut raw = raw_market("X.IP", "EUR/USD");
        raw.min_normal_stop_distance = unit("POINTS", dec!(-1));

        let result = ForexMarket::try_from_raw(&raw);
        assert!(matches!(result, Err(InferenceError::Negative { .. })));
    }

    #[rstest]
    fn test_inference_band_gap() {
        let mut raw = raw_market("X.IP", "EUR/USD");
        raw.margin_deposit_bands = vec![
            RawMarginBand {
                min: None,
                max: Some(dec!(1000)),
                margin: dec!(3),
            },
            RawMarginBand {
                min: Some(dec!(2000)),
                max: None,
                margin: dec!(5),
            },
        ];

        let result = ForexMarket::try_from_raw(&raw);
        assert!(matches!(
            result,
            Err(InferenceError::DiscontiguousMarginBands)
        ));
    }

    #[rstest]
    fn test_inference_unbounded_band_not_last() {
        let mut raw = raw_market("X.IP", "EUR/USD");
        raw.margin_deposit_bands = vec![
            RawMarginBand {
                min: None,
                max: None,
                margin: dec!(3),
            },
            RawMarginBand {
                min: Some(dec!(1000)),
                max: None,
                margin: dec!(5),
            },
        ];

        let result = ForexMarket::try_from_raw(&raw);
        assert!(matches!(
            result,
            Err(InferenceError::DiscontiguousMarginBands)
        ));
    }

    #[rstest]
    fn test_inference_empty_epic() {
        let result = ForexMarket::try_from_raw(&raw_market("  ", "EUR/USD"));
        assert!(matches!(result, Err(InferenceError::InvalidEpic { .. })));
    }

    #[rstest]
    fn test_raw_market_deserializes_from_wire_shape() {
        let json = r#"{
            "epic": "CS.D.EURUSD.MINI.IP",
            "instrumentName": "EUR/USD",
            "decimalPlaces": 5,
            "contractSize": "100000",
            "minNormalStopDistance": {"unit": "POINTS", "value": 2},
            "minControlledRiskStopDistance": {"unit": "POINTS", "value": 5},
            "limitedRiskPremium": {"unit": "POINTS", "value": 0.3},
            "slippageFactor": {"unit": "pct", "value": 50},
            "trailingStopsAllowed": true,
            "marginDepositBands": [
                {"min": 0, "max": 1000000, "margin": 3.33},
                {"min": 1000000, "max": null, "margin": 5}
            ]
        }"#;

        let raw: RawMarket = serde_json::from_str(json).unwrap();
        let market = ForexMarket::try_from_raw(&raw).unwrap();
        assert_eq!(market.epic, "CS.D.EURUSD.MINI.IP");
        assert_eq!(market.margin_bands[0].margin_factor, dec!(3.33));
    }
}
