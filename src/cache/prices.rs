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

//! Historical price series storage.
//!
//! Prices live in one table per (epic, resolution) pair, keyed by timestamp;
//! an upsert on a timestamp conflict overwrites the OHLC/volume columns.
//! Table names are derived from validated epics only — every other value
//! reaches SQLite as a bound parameter. OHLC columns are stored at scale 5.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

use super::{error::CacheError, store::CacheStore};
use crate::common::{
    enums::Resolution,
    fixed::{decode_scaled, encode_scaled},
};

/// Scale of OHLC price columns.
const PRICE_SCALE: u8 = 5;

/// One candle of a price series.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceRecord {
    /// Candle open instant; primary key within the series.
    pub timestamp: DateTime<Utc>,
    /// Open bid price.
    pub open_bid: Decimal,
    /// Open ask price.
    pub open_ask: Decimal,
    /// High bid price.
    pub high_bid: Decimal,
    /// High ask price.
    pub high_ask: Decimal,
    /// Low bid price.
    pub low_bid: Decimal,
    /// Low ask price.
    pub low_ask: Decimal,
    /// Close bid price.
    pub close_bid: Decimal,
    /// Close ask price.
    pub close_ask: Decimal,
    /// Traded volume over the candle.
    pub volume: i64,
}

/// Derives the price table name for an epic and resolution.
///
/// The epic must consist of ASCII alphanumerics, dots, underscores or
/// hyphens; dots and hyphens are folded to underscores.
///
/// # Errors
///
/// Returns [`CacheError::InvalidIdentifier`] for any other epic.
pub fn price_table_name(epic: &str, resolution: Resolution) -> Result<String, CacheError> {
    if epic.is_empty()
        || !epic
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(CacheError::InvalidIdentifier(epic.to_string()));
    }
    let sanitized: String = epic
        .chars()
        .map(|c| if matches!(c, '.' | '-') { '_' } else { c })
        .collect();
    Ok(format!("prices_{sanitized}_{}", resolution.table_suffix()))
}

fn create_table(conn: &Connection, table: &str) -> Result<(), CacheError> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            ts        INTEGER PRIMARY KEY,
            open_bid  INTEGER NOT NULL,
            open_ask  INTEGER NOT NULL,
            high_bid  INTEGER NOT NULL,
            high_ask  INTEGER NOT NULL,
            low_bid   INTEGER NOT NULL,
            low_ask   INTEGER NOT NULL,
            close_bid INTEGER NOT NULL,
            close_ask INTEGER NOT NULL,
            volume    INTEGER NOT NULL CHECK (volume >= 0)
        )"
    ))?;
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, CacheError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn write_price(conn: &Connection, table: &str, record: &PriceRecord) -> Result<(), CacheError> {
    let sql = format!(
        "INSERT INTO \"{table}\" (
            ts, open_bid, open_ask, high_bid, high_ask,
            low_bid, low_ask, close_bid, close_ask, volume
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(ts) DO UPDATE SET
            open_bid  = excluded.open_bid,
            open_ask  = excluded.open_ask,
            high_bid  = excluded.high_bid,
            high_ask  = excluded.high_ask,
            low_bid   = excluded.low_bid,
            low_ask   = excluded.low_ask,
            close_bid = excluded.close_bid,
            close_ask = excluded.close_ask,
            volume    = excluded.volume"
    );
    conn.execute(
        &sql,
        params![
            record.timestamp.timestamp_millis(),
            encode_scaled(record.open_bid, PRICE_SCALE)?,
            encode_scaled(record.open_ask, PRICE_SCALE)?,
            encode_scaled(record.high_bid, PRICE_SCALE)?,
            encode_scaled(record.high_ask, PRICE_SCALE)?,
            encode_scaled(record.low_bid, PRICE_SCALE)?,
            encode_scaled(record.low_ask, PRICE_SCALE)?,
            encode_scaled(record.close_bid, PRICE_SCALE)?,
            encode_scaled(record.close_ask, PRICE_SCALE)?,
            record.volume,
        ],
    )?;
    Ok(())
}

fn read_price(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceRecord> {
    let millis: i64 = row.get(0)?;
    let timestamp = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(0, millis)
    })?;
    Ok(PriceRecord {
        timestamp,
        open_bid: decode_scaled(row.get(1)?, PRICE_SCALE),
        open_ask: decode_scaled(row.get(2)?, PRICE_SCALE),
        high_bid: decode_scaled(row.get(3)?, PRICE_SCALE),
        high_ask: decode_scaled(row.get(4)?, PRICE_SCALE),
        low_bid: decode_scaled(row.get(5)?, PRICE_SCALE),
        low_ask: decode_scaled(row.get(6)?, PRICE_SCALE),
        close_bid: decode_scaled(row.get(7)?, PRICE_SCALE),
        close_ask: decode_scaled(row.get(8)?, PRICE_SCALE),
        volume: row.get(9)?,
    })
}

impl CacheStore {
    /// Upserts a batch of price records for one (epic, resolution) series.
    ///
    /// Creates the series table on first use. The batch runs in a single
    /// transaction; a timestamp conflict overwrites the non-key columns.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid epic, a value not representable at the
    /// price scale, or statement failure.
    pub async fn upsert_prices(
        &self,
        epic: &str,
        resolution: Resolution,
        records: Vec<PriceRecord>,
    ) -> Result<usize, CacheError> {
        let table = price_table_name(epic, resolution)?;
        self.with_writer(move |conn| {
            let tx = conn.transaction()?;
            create_table(&tx, &table)?;
            for record in &records {
                write_price(&tx, &table, record)?;
            }
            tx.commit()?;
            Ok(records.len())
        })
        .await
    }

    /// Returns the price records of a series within `[from, to)`, in
    /// timestamp order.
    ///
    /// A series that has never been written yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid epic or statement failure.
    pub async fn prices_between(
        &self,
        epic: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>, CacheError> {
        let table = price_table_name(epic, resolution)?;
        self.with_reader(move |conn| {
            if !table_exists(conn, &table)? {
                return Ok(Vec::new());
            }
            let sql = format!(
                "SELECT ts, open_bid, open_ask, high_bid, high_ask,
                        low_bid, low_ask, close_bid, close_ask, volume
                 FROM \"{table}\" WHERE ts >= ?1 AND ts < ?2 ORDER BY ts"
            );
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(
                    params![from.timestamp_millis(), to.timestamp_millis()],
                    read_price,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_price_table_name() {
        let table = price_table_name("CS.D.EURUSD.MINI.IP", Resolution::Minute).unwrap();
        assert_eq!(table, "prices_CS_D_EURUSD_MINI_IP_m1");
    }

    #[rstest]
    #[case("")]
    #[case("bad epic")]
    #[case("nice'); DROP TABLE forex_markets;--")]
    #[case("semi;colon")]
    fn test_price_table_name_rejects_invalid(#[case] epic: &str) {
        let result = price_table_name(epic, Resolution::Minute);
        assert!(matches!(result, Err(CacheError::InvalidIdentifier(_))));
    }

    #[rstest]
    fn test_resolutions_produce_distinct_tables() {
        let minute = price_table_name("CS.D.EURUSD.MINI.IP", Resolution::Minute).unwrap();
        let day = price_table_name("CS.D.EURUSD.MINI.IP", Resolution::Day).unwrap();
        assert_ne!(minute, day);
    }
}
