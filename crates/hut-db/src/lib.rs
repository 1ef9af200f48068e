//! Storage layer for the cabin ledger.
//!
//! Provides persistence for stays, their overlap segments, tank fillings and
//! the yearly price table using `rusqlite`. [`Database`] implements
//! [`hut_core::StayStore`], so the lifecycle controller can run directly
//! against it.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Stay mutations must be serialized anyway (the allocation reads a snapshot
//! of the neighbouring stays and writes derived values back), so one
//! `Database` per writer is the intended use.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with second precision
//! (e.g., `2025-06-01T14:00:00Z`). This ensures:
//! - Lexicographic ordering matches chronological ordering
//! - Human-readable values in the database
//! - Timezone-aware (always UTC)
//!
//! ## Money
//!
//! Prices and filled liters are stored as decimal TEXT (e.g., `2.50`) and
//! read back into `rust_decimal::Decimal` without going through floating
//! point.
//!
//! ## Overlap Segments
//!
//! Each row belongs to the stay it is attributed to; the other parties
//! present during the segment are kept as a JSON array of stay ids.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use hut_core::billing::BillingError;
use hut_core::{
    CounterRange, MemberId, OverlapSegment, Period, PriceTable, Stay, StayId, StayStore,
    StoreError, TankError, TankFilling,
};
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use rust_decimal::Decimal;
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for stay {stay_id}: {timestamp}")]
    TimestampParse {
        stay_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row does not describe a valid value.
    #[error("invalid {table} row {key}: {message}")]
    InvalidRecord {
        table: &'static str,
        key: String,
        message: String,
    },
    /// Prices were refused before being written.
    #[error(transparent)]
    InvalidPrices(#[from] BillingError),
    /// A tank filling was refused before being written.
    #[error(transparent)]
    InvalidTankFilling(#[from] TankError),
}

impl From<DbError> for StoreError {
    fn from(error: DbError) -> Self {
        Self::backend(error)
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

const STAY_COLUMNS: &str = "id, member_id, arrival, departure, counter_start, counter_end, \
                            member_nights, guest_nights, adjusted_hours, has_overlaps";

/// A `stays` row before its text columns are parsed.
struct StayRow {
    id: String,
    member_id: String,
    arrival: String,
    departure: String,
    counter_start: f64,
    counter_end: f64,
    member_nights: u32,
    guest_nights: u32,
    adjusted_hours: f64,
    has_overlaps: bool,
}

impl StayRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            member_id: row.get(1)?,
            arrival: row.get(2)?,
            departure: row.get(3)?,
            counter_start: row.get(4)?,
            counter_end: row.get(5)?,
            member_nights: row.get(6)?,
            guest_nights: row.get(7)?,
            adjusted_hours: row.get(8)?,
            has_overlaps: row.get(9)?,
        })
    }

    fn into_stay(self) -> Result<Stay, DbError> {
        let arrival = parse_timestamp(&self.arrival, &self.id)?;
        let departure = parse_timestamp(&self.departure, &self.id)?;
        let member_id = MemberId::new(self.member_id).map_err(|err| invalid("stays", &self.id, err))?;
        let id = StayId::new(self.id.clone()).map_err(|err| invalid("stays", &self.id, err))?;
        Ok(Stay {
            id,
            member_id,
            period: Period::new(arrival, departure),
            counter: CounterRange::new(self.counter_start, self.counter_end),
            member_nights: self.member_nights,
            guest_nights: self.guest_nights,
            adjusted_hours: self.adjusted_hours,
            has_overlaps: self.has_overlaps,
        })
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            -- Stays: one party's occupancy of the cabin
            -- arrival/departure: RFC 3339 (e.g., '2025-06-01T14:00:00Z')
            -- adjusted_hours/has_overlaps: derived by the allocation
            CREATE TABLE IF NOT EXISTS stays (
                id TEXT PRIMARY KEY,
                member_id TEXT NOT NULL,
                arrival TEXT NOT NULL,
                departure TEXT NOT NULL,
                counter_start REAL NOT NULL,
                counter_end REAL NOT NULL,
                member_nights INTEGER NOT NULL DEFAULT 0,
                guest_nights INTEGER NOT NULL DEFAULT 0,
                adjusted_hours REAL NOT NULL,
                has_overlaps INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_stays_member ON stays(member_id);
            CREATE INDEX IF NOT EXISTS idx_stays_arrival ON stays(arrival);
            CREATE INDEX IF NOT EXISTS idx_stays_counter ON stays(counter_start);

            -- co_present: JSON array of the other stay ids active in the segment
            CREATE TABLE IF NOT EXISTS overlap_segments (
                stay_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                counter_start REAL NOT NULL,
                counter_end REAL NOT NULL,
                shared_hours REAL NOT NULL,
                co_present TEXT NOT NULL,
                PRIMARY KEY (stay_id, seq),
                FOREIGN KEY (stay_id) REFERENCES stays(id) ON DELETE CASCADE
            );

            -- Prices: decimal text (e.g., '2.50')
            CREATE TABLE IF NOT EXISTS prices (
                year INTEGER PRIMARY KEY,
                oil_price_per_liter TEXT NOT NULL,
                member_night TEXT NOT NULL,
                guest_night TEXT NOT NULL,
                liters_per_burner_hour TEXT NOT NULL
            );

            -- Tank fillings: date 'YYYY-MM-DD', liters/price_per_liter decimal text
            CREATE TABLE IF NOT EXISTS tank_fillings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                liters TEXT NOT NULL,
                price_per_liter TEXT NOT NULL,
                counter_reading REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tank_fillings_date ON tank_fillings(date);
            ",
        )?;
        Ok(())
    }

    fn query_stays<P: Params>(&self, filter: &str, params: P) -> Result<Vec<Stay>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STAY_COLUMNS} FROM stays WHERE {filter} ORDER BY arrival ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params, StayRow::read)?;
        let mut stays = Vec::new();
        for row in rows {
            stays.push(row?.into_stay()?);
        }
        Ok(stays)
    }

    /// Lists stays, optionally restricted to one member and/or one arrival year.
    pub fn list_stays(
        &self,
        member_id: Option<&MemberId>,
        year: Option<i32>,
    ) -> Result<Vec<Stay>, DbError> {
        let (from, until) = year.map_or((None, None), |year| (year_start(year), year_start(year + 1)));
        self.query_stays(
            "(?1 IS NULL OR member_id = ?1)
             AND (?2 IS NULL OR arrival >= ?2)
             AND (?3 IS NULL OR arrival < ?3)",
            params![member_id.map(MemberId::as_str), from, until],
        )
    }

    /// A member's stays arriving in `year`.
    pub fn stays_for_member_year(
        &self,
        member_id: &MemberId,
        year: i32,
    ) -> Result<Vec<Stay>, DbError> {
        self.list_stays(Some(member_id), Some(year))
    }

    /// Number of stored stays.
    pub fn stay_count(&self) -> Result<usize, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM stays", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Distinct arrival years of the stored stays, ascending.
    pub fn available_years(&self) -> Result<Vec<i32>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT DISTINCT CAST(substr(arrival, 1, 4) AS INTEGER) AS year
            FROM stays
            ORDER BY year ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut years = Vec::new();
        for row in rows {
            years.push(row?);
        }
        Ok(years)
    }

    fn upsert_stay(conn: &Connection, stay: &Stay) -> Result<(), DbError> {
        let now = format_timestamp(Utc::now());
        conn.execute(
            "
            INSERT INTO stays
            (id, member_id, arrival, departure, counter_start, counter_end,
             member_nights, guest_nights, adjusted_hours, has_overlaps, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            ON CONFLICT(id) DO UPDATE SET
                member_id = excluded.member_id,
                arrival = excluded.arrival,
                departure = excluded.departure,
                counter_start = excluded.counter_start,
                counter_end = excluded.counter_end,
                member_nights = excluded.member_nights,
                guest_nights = excluded.guest_nights,
                adjusted_hours = excluded.adjusted_hours,
                has_overlaps = excluded.has_overlaps,
                updated_at = excluded.updated_at
            ",
            params![
                stay.id.as_str(),
                stay.member_id.as_str(),
                format_timestamp(stay.period.arrival),
                format_timestamp(stay.period.departure),
                stay.counter.start,
                stay.counter.end,
                stay.member_nights,
                stay.guest_nights,
                stay.adjusted_hours,
                stay.has_overlaps,
                now,
            ],
        )?;
        Ok(())
    }

    fn replace_segments(
        conn: &Connection,
        stay_id: &StayId,
        segments: &[OverlapSegment],
    ) -> Result<(), DbError> {
        conn.execute(
            "DELETE FROM overlap_segments WHERE stay_id = ?",
            [stay_id.as_str()],
        )?;
        let mut stmt = conn.prepare(
            "
            INSERT INTO overlap_segments
            (stay_id, seq, counter_start, counter_end, shared_hours, co_present)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )?;
        for (seq, segment) in segments.iter().enumerate() {
            let co_present = serde_json::to_string(&segment.co_present)
                .map_err(|err| invalid("overlap_segments", stay_id.as_str(), err))?;
            stmt.execute(params![
                stay_id.as_str(),
                i64::try_from(seq).unwrap_or(i64::MAX),
                segment.counter.start,
                segment.counter.end,
                segment.shared_hours,
                co_present,
            ])?;
        }
        Ok(())
    }

    fn segments_of(&self, stay_id: &StayId) -> Result<Vec<OverlapSegment>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT counter_start, counter_end, shared_hours, co_present
            FROM overlap_segments
            WHERE stay_id = ?
            ORDER BY seq ASC
            ",
        )?;
        let rows = stmt.query_map([stay_id.as_str()], |row| {
            Ok((
                row.get::<_, f64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut segments = Vec::new();
        for row in rows {
            let (start, end, shared_hours, co_present) = row?;
            let co_present: Vec<StayId> = serde_json::from_str(&co_present)
                .map_err(|err| invalid("overlap_segments", stay_id.as_str(), err))?;
            segments.push(OverlapSegment {
                owner: stay_id.clone(),
                co_present,
                counter: CounterRange::new(start, end),
                shared_hours,
            });
        }
        Ok(segments)
    }

    /// Prices for one year, if configured.
    pub fn prices_for_year(&self, year: i32) -> Result<Option<PriceTable>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT year, oil_price_per_liter, member_night, guest_night, liters_per_burner_hour
                FROM prices
                WHERE year = ?
                ",
                [year],
                read_price_row,
            )
            .optional()?;
        row.map(PriceRow::into_prices).transpose()
    }

    /// Every configured price row, by year.
    pub fn list_prices(&self) -> Result<Vec<PriceTable>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT year, oil_price_per_liter, member_night, guest_night, liters_per_burner_hour
            FROM prices
            ORDER BY year ASC
            ",
        )?;
        let rows = stmt.query_map([], read_price_row)?;
        let mut prices = Vec::new();
        for row in rows {
            prices.push(row?.into_prices()?);
        }
        Ok(prices)
    }

    /// Inserts or replaces the prices of `prices.year`.
    pub fn save_prices(&mut self, prices: &PriceTable) -> Result<(), DbError> {
        prices.validate()?;
        self.conn.execute(
            "
            INSERT INTO prices
            (year, oil_price_per_liter, member_night, guest_night, liters_per_burner_hour)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(year) DO UPDATE SET
                oil_price_per_liter = excluded.oil_price_per_liter,
                member_night = excluded.member_night,
                guest_night = excluded.guest_night,
                liters_per_burner_hour = excluded.liters_per_burner_hour
            ",
            params![
                prices.year,
                prices.oil_price_per_liter.to_string(),
                prices.member_night.to_string(),
                prices.guest_night.to_string(),
                prices.liters_per_burner_hour.to_string(),
            ],
        )?;
        tracing::debug!(year = prices.year, "prices saved");
        Ok(())
    }

    /// Adds the default prices for `year` unless the year already has a row.
    ///
    /// Returns whether a row was inserted.
    pub fn insert_default_prices(&mut self, year: i32) -> Result<bool, DbError> {
        let defaults = PriceTable::defaults_for(year);
        let inserted = self.conn.execute(
            "
            INSERT OR IGNORE INTO prices
            (year, oil_price_per_liter, member_night, guest_night, liters_per_burner_hour)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                year,
                defaults.oil_price_per_liter.to_string(),
                defaults.member_night.to_string(),
                defaults.guest_night.to_string(),
                defaults.liters_per_burner_hour.to_string(),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Tank fillings by date, optionally restricted to one year.
    pub fn list_tank_fillings(&self, year: Option<i32>) -> Result<Vec<TankFilling>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, date, liters, price_per_liter, counter_reading
            FROM tank_fillings
            WHERE ?1 IS NULL OR CAST(substr(date, 1, 4) AS INTEGER) = ?1
            ORDER BY date ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([year], |row| {
            Ok(FillingRow {
                id: row.get(0)?,
                date: row.get(1)?,
                liters: row.get(2)?,
                price_per_liter: row.get(3)?,
                counter_reading: row.get(4)?,
            })
        })?;
        let mut fillings = Vec::new();
        for row in rows {
            fillings.push(row?.into_filling()?);
        }
        Ok(fillings)
    }

    /// Validates a filling against the recorded ones and stores it.
    ///
    /// Returns the new row id.
    pub fn add_tank_filling(&mut self, filling: &TankFilling) -> Result<i64, DbError> {
        filling.validate(&self.list_tank_fillings(None)?)?;
        self.conn.execute(
            "
            INSERT INTO tank_fillings
            (date, liters, price_per_liter, counter_reading, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                filling.date.to_string(),
                filling.liters.to_string(),
                filling.price_per_liter.to_string(),
                filling.counter_reading,
                format_timestamp(Utc::now()),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, date = %filling.date, "tank filling saved");
        Ok(id)
    }
}

impl StayStore for Database {
    fn stays_overlapping_days(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
        exclude: Option<&StayId>,
    ) -> Result<Vec<Stay>, StoreError> {
        let after_last = last_day.succ_opt().map(day_start);
        Ok(self.query_stays(
            "departure >= ?1
             AND (?2 IS NULL OR arrival < ?2)
             AND (?3 IS NULL OR id != ?3)",
            params![day_start(first_day), after_last, exclude.map(StayId::as_str)],
        )?)
    }

    fn stays_overlapping_counter(
        &self,
        range: CounterRange,
        exclude: Option<&StayId>,
    ) -> Result<Vec<Stay>, StoreError> {
        Ok(self.query_stays(
            "counter_start < ?1 AND counter_end > ?2 AND (?3 IS NULL OR id != ?3)",
            params![range.end, range.start, exclude.map(StayId::as_str)],
        )?)
    }

    fn member_stays_overlapping(
        &self,
        period: &Period,
        member_id: &MemberId,
        exclude: Option<&StayId>,
    ) -> Result<Vec<Stay>, StoreError> {
        Ok(self.query_stays(
            "member_id = ?1 AND arrival < ?2 AND departure > ?3 AND (?4 IS NULL OR id != ?4)",
            params![
                member_id.as_str(),
                format_timestamp(period.departure),
                format_timestamp(period.arrival),
                exclude.map(StayId::as_str),
            ],
        )?)
    }

    fn get_stay(&self, id: &StayId) -> Result<Option<Stay>, StoreError> {
        Ok(self.query_stays("id = ?1", [id.as_str()])?.pop())
    }

    fn all_stays(&self) -> Result<Vec<Stay>, StoreError> {
        Ok(self.query_stays("1 = 1", [])?)
    }

    fn save_stay(&mut self, stay: &Stay) -> Result<StayId, StoreError> {
        Self::upsert_stay(&self.conn, stay)?;
        Ok(stay.id.clone())
    }

    fn save_overlap_segments(
        &mut self,
        stay_id: &StayId,
        segments: &[OverlapSegment],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        Self::replace_segments(&tx, stay_id, segments)?;
        tx.commit().map_err(DbError::from)?;
        Ok(())
    }

    fn save_allocated_stay(
        &mut self,
        stay: &Stay,
        segments: &[OverlapSegment],
    ) -> Result<StayId, StoreError> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        Self::upsert_stay(&tx, stay)?;
        Self::replace_segments(&tx, &stay.id, segments)?;
        tx.commit().map_err(DbError::from)?;
        Ok(stay.id.clone())
    }

    fn overlap_segments(&self, stay_id: &StayId) -> Result<Vec<OverlapSegment>, StoreError> {
        Ok(self.segments_of(stay_id)?)
    }

    fn delete_stay(&mut self, id: &StayId) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM stays WHERE id = ?", [id.as_str()])
            .map_err(DbError::from)?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }
}

/// A `prices` row before its decimal columns are parsed.
struct PriceRow {
    year: i32,
    oil_price_per_liter: String,
    member_night: String,
    guest_night: String,
    liters_per_burner_hour: String,
}

fn read_price_row(row: &Row<'_>) -> rusqlite::Result<PriceRow> {
    Ok(PriceRow {
        year: row.get(0)?,
        oil_price_per_liter: row.get(1)?,
        member_night: row.get(2)?,
        guest_night: row.get(3)?,
        liters_per_burner_hour: row.get(4)?,
    })
}

impl PriceRow {
    fn into_prices(self) -> Result<PriceTable, DbError> {
        let key = self.year.to_string();
        let parse = |value: &str| {
            Decimal::from_str(value).map_err(|err| invalid("prices", &key, err))
        };
        Ok(PriceTable {
            year: self.year,
            oil_price_per_liter: parse(&self.oil_price_per_liter)?,
            member_night: parse(&self.member_night)?,
            guest_night: parse(&self.guest_night)?,
            liters_per_burner_hour: parse(&self.liters_per_burner_hour)?,
        })
    }
}

/// A `tank_fillings` row before its text columns are parsed.
struct FillingRow {
    id: i64,
    date: String,
    liters: String,
    price_per_liter: String,
    counter_reading: f64,
}

impl FillingRow {
    fn into_filling(self) -> Result<TankFilling, DbError> {
        let key = self.id.to_string();
        let parse = |value: &str| {
            Decimal::from_str(value).map_err(|err| invalid("tank_fillings", &key, err))
        };
        Ok(TankFilling {
            id: Some(self.id),
            date: NaiveDate::from_str(&self.date).map_err(|err| invalid("tank_fillings", &key, err))?,
            liters: parse(&self.liters)?,
            price_per_liter: parse(&self.price_per_liter)?,
            counter_reading: self.counter_reading,
        })
    }
}

fn invalid(table: &'static str, key: &str, err: impl std::fmt::Display) -> DbError {
    DbError::InvalidRecord {
        table,
        key: key.to_string(),
        message: err.to_string(),
    }
}

fn parse_timestamp(timestamp: &str, stay_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            stay_id: stay_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn day_start(day: NaiveDate) -> String {
    format_timestamp(Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN)))
}

fn year_start(year: i32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(day_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hut_core::{StayDraft, StayService};
    use std::collections::HashSet;

    const EPS: f64 = 1e-9;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn stay(id: &str, member: &str, days: (u32, u32), counter: (f64, f64)) -> Stay {
        Stay::from_draft(
            StayId::new(id).unwrap(),
            StayDraft {
                id: None,
                member_id: MemberId::new(member).unwrap(),
                period: Period::new(at(days.0, 14), at(days.1, 11)),
                counter: CounterRange::new(counter.0, counter.1),
                member_nights: 2,
                guest_nights: 0,
            },
        )
    }

    fn draft(member: &str, days: (u32, u32), counter: (f64, f64)) -> StayDraft {
        StayDraft {
            id: None,
            member_id: MemberId::new(member).unwrap(),
            period: Period::new(at(days.0, 14), at(days.1, 11)),
            counter: CounterRange::new(counter.0, counter.1),
            member_nights: 2,
            guest_nights: 1,
        }
    }

    fn db_with(stays: &[Stay]) -> Database {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        for stay in stays {
            db.save_stay(stay).expect("save stay");
        }
        db
    }

    fn ids(stays: &[Stay]) -> Vec<&str> {
        stays.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "stays"),
            vec![
                "id",
                "member_id",
                "arrival",
                "departure",
                "counter_start",
                "counter_end",
                "member_nights",
                "guest_nights",
                "adjusted_hours",
                "has_overlaps",
                "created_at",
                "updated_at",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "overlap_segments"),
            vec![
                "stay_id",
                "seq",
                "counter_start",
                "counter_end",
                "shared_hours",
                "co_present",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "prices"),
            vec![
                "year",
                "oil_price_per_liter",
                "member_night",
                "guest_night",
                "liters_per_burner_hour",
            ]
        );

        assert_eq!(
            table_columns(&db.conn, "tank_fillings"),
            vec![
                "id",
                "date",
                "liters",
                "price_per_liter",
                "counter_reading",
                "created_at",
            ]
        );
        assert!(index_names(&db.conn, "tank_fillings").contains("idx_tank_fillings_date"));

        let stay_indexes = index_names(&db.conn, "stays");
        let expected: HashSet<String> = ["idx_stays_member", "idx_stays_arrival", "idx_stays_counter"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(expected.is_subset(&stay_indexes));

        let segment_foreign_keys = foreign_keys(&db.conn, "overlap_segments");
        assert_eq!(
            segment_foreign_keys,
            vec![(
                "stays".to_string(),
                "stay_id".to_string(),
                "id".to_string(),
                "CASCADE".to_string(),
            )]
        );
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }

    fn foreign_keys(conn: &Connection, table: &str) -> Vec<(String, String, String, String)> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA foreign_key_list({table})"))
            .expect("prepare foreign_key_list");
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .expect("query foreign_key_list");
        rows.map(|row| row.expect("foreign_key_list row")).collect()
    }

    #[test]
    fn save_stay_round_trips_and_upserts() {
        let mut original = stay("s1", "anna", (1, 3), (10.0, 20.0));
        let mut db = db_with(&[original.clone()]);
        assert_eq!(db.get_stay(&original.id).unwrap(), Some(original.clone()));

        original.adjusted_hours = 7.5;
        original.has_overlaps = true;
        db.save_stay(&original).unwrap();

        assert_eq!(db.get_stay(&original.id).unwrap(), Some(original));
        assert_eq!(db.stay_count().unwrap(), 1);
    }

    #[test]
    fn day_query_includes_same_day_neighbours() {
        let db = db_with(&[
            stay("before", "anna", (1, 3), (0.0, 10.0)),
            stay("during", "bert", (4, 6), (10.0, 20.0)),
            stay("handover", "carl", (7, 9), (20.0, 30.0)),
            stay("later", "dora", (10, 12), (30.0, 40.0)),
        ]);

        let found = db
            .stays_overlapping_days(at(3, 0).date_naive(), at(7, 0).date_naive(), None)
            .unwrap();
        assert_eq!(ids(&found), vec!["before", "during", "handover"]);

        let excluded = db
            .stays_overlapping_days(
                at(3, 0).date_naive(),
                at(7, 0).date_naive(),
                Some(&StayId::new("during").unwrap()),
            )
            .unwrap();
        assert_eq!(ids(&excluded), vec!["before", "handover"]);
    }

    #[test]
    fn counter_query_is_strict() {
        let db = db_with(&[
            stay("a", "anna", (1, 3), (0.0, 10.0)),
            stay("b", "bert", (4, 6), (10.0, 20.0)),
            stay("c", "carl", (7, 9), (20.0, 30.0)),
        ]);

        let found = db
            .stays_overlapping_counter(CounterRange::new(10.0, 20.0), None)
            .unwrap();
        assert_eq!(ids(&found), vec!["b"]);

        let found = db
            .stays_overlapping_counter(CounterRange::new(5.0, 25.0), None)
            .unwrap();
        assert_eq!(ids(&found), vec!["a", "b", "c"]);
    }

    #[test]
    fn member_query_requires_co_presence() {
        let db = db_with(&[
            stay("a1", "anna", (1, 3), (0.0, 10.0)),
            stay("a2", "anna", (3, 5), (10.0, 20.0)),
            stay("b1", "bert", (2, 4), (5.0, 15.0)),
        ]);
        let anna = MemberId::new("anna").unwrap();

        let period = Period::new(at(2, 14), at(3, 11));
        let found = db.member_stays_overlapping(&period, &anna, None).unwrap();
        assert_eq!(ids(&found), vec!["a1"]);

        let period = Period::new(at(3, 12), at(4, 11));
        let found = db.member_stays_overlapping(&period, &anna, None).unwrap();
        assert_eq!(ids(&found), vec!["a2"]);
    }

    #[test]
    fn segments_are_replaced_and_deleted_with_stay() {
        let a = stay("a", "anna", (1, 3), (10.0, 20.0));
        let b = stay("b", "bert", (2, 4), (15.0, 25.0));
        let mut db = db_with(&[a.clone(), b.clone()]);
        let segment = OverlapSegment {
            owner: a.id.clone(),
            co_present: vec![b.id.clone()],
            counter: CounterRange::new(15.0, 20.0),
            shared_hours: 2.5,
        };

        db.save_overlap_segments(&a.id, &[segment.clone(), segment.clone()])
            .unwrap();
        assert_eq!(db.overlap_segments(&a.id).unwrap().len(), 2);

        db.save_overlap_segments(&a.id, std::slice::from_ref(&segment))
            .unwrap();
        assert_eq!(db.overlap_segments(&a.id).unwrap(), vec![segment]);

        db.delete_stay(&a.id).unwrap();
        assert!(db.overlap_segments(&a.id).unwrap().is_empty());
        assert_eq!(db.get_stay(&a.id).unwrap(), None);
    }

    #[test]
    fn deleting_missing_stay_is_not_found() {
        let mut db = Database::open_in_memory().unwrap();
        let err = db.delete_stay(&StayId::new("nope").unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref id) if id.as_str() == "nope"));
    }

    #[test]
    fn segments_for_unknown_stay_are_refused() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = StayId::new("ghost").unwrap();
        let segment = OverlapSegment {
            owner: owner.clone(),
            co_present: Vec::new(),
            counter: CounterRange::new(0.0, 1.0),
            shared_hours: 0.5,
        };
        let err = db.save_overlap_segments(&owner, &[segment]).unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));
    }

    #[test]
    fn lists_by_member_and_year() {
        let mut old = stay("old", "anna", (1, 3), (0.0, 5.0));
        old.period = Period::new(
            Utc.with_ymd_and_hms(2024, 12, 30, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 2, 11, 0, 0).unwrap(),
        );
        let db = db_with(&[
            old,
            stay("a1", "anna", (1, 3), (5.0, 10.0)),
            stay("b1", "bert", (4, 6), (10.0, 20.0)),
        ]);
        let anna = MemberId::new("anna").unwrap();

        assert_eq!(ids(&db.stays_for_member_year(&anna, 2025).unwrap()), vec!["a1"]);
        assert_eq!(ids(&db.stays_for_member_year(&anna, 2024).unwrap()), vec!["old"]);
        assert_eq!(ids(&db.list_stays(None, Some(2025)).unwrap()), vec!["a1", "b1"]);
        assert_eq!(db.list_stays(Some(&anna), None).unwrap().len(), 2);
        assert_eq!(db.available_years().unwrap(), vec![2024, 2025]);
    }

    #[test]
    fn default_prices_are_inserted_once() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.prices_for_year(2025).unwrap(), None);

        assert!(db.insert_default_prices(2025).unwrap());
        assert!(!db.insert_default_prices(2025).unwrap());
        assert_eq!(
            db.prices_for_year(2025).unwrap(),
            Some(PriceTable::defaults_for(2025))
        );
    }

    #[test]
    fn save_prices_validates_and_replaces() {
        let mut db = Database::open_in_memory().unwrap();
        let mut prices = PriceTable::defaults_for(2025);
        prices.oil_price_per_liter = Decimal::new(135, 2);
        db.save_prices(&prices).unwrap();
        assert_eq!(db.prices_for_year(2025).unwrap(), Some(prices.clone()));

        prices.member_night = Decimal::new(-1, 0);
        let err = db.save_prices(&prices).unwrap_err();
        assert!(matches!(err, DbError::InvalidPrices(_)));

        db.insert_default_prices(2024).unwrap();
        let years: Vec<i32> = db.list_prices().unwrap().iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2024, 2025]);
    }

    fn filling(date: (i32, u32, u32), liters: i64, counter_reading: f64) -> TankFilling {
        TankFilling {
            id: None,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            liters: Decimal::from(liters),
            price_per_liter: Decimal::new(109, 2),
            counter_reading,
        }
    }

    #[test]
    fn tank_fillings_round_trip_by_year() {
        let mut db = Database::open_in_memory().unwrap();
        let first = db.add_tank_filling(&filling((2024, 11, 2), 900, 80.0)).unwrap();
        let second = db.add_tank_filling(&filling((2025, 3, 1), 500, 120.5)).unwrap();
        assert!(second > first);

        let all = db.list_tank_fillings(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, Some(first));

        let this_year = db.list_tank_fillings(Some(2025)).unwrap();
        let mut expected = filling((2025, 3, 1), 500, 120.5);
        expected.id = Some(second);
        assert_eq!(this_year, vec![expected]);
        assert_eq!(this_year[0].price_per_liter.to_string(), "1.09");
        assert!(db.list_tank_fillings(Some(2023)).unwrap().is_empty());
    }

    #[test]
    fn tank_filling_readings_must_not_run_backwards() {
        let mut db = Database::open_in_memory().unwrap();
        db.add_tank_filling(&filling((2025, 3, 1), 500, 120.0)).unwrap();

        let err = db
            .add_tank_filling(&filling((2025, 6, 1), 500, 110.0))
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::InvalidTankFilling(TankError::CounterOutOfOrder { .. })
        ));

        let err = db.add_tank_filling(&filling((2025, 6, 1), 0, 130.0)).unwrap_err();
        assert!(matches!(err, DbError::InvalidTankFilling(TankError::NonPositiveLiters(_))));
        assert_eq!(db.list_tank_fillings(None).unwrap().len(), 1);
    }

    #[test]
    fn service_allocates_against_database() {
        let mut service = StayService::new(Database::open_in_memory().unwrap());
        let a = service
            .create_or_update_stay(draft("anna", (1, 3), (10.0, 20.0)))
            .unwrap()
            .stay;
        let b = service
            .create_or_update_stay(draft("bert", (2, 4), (15.0, 25.0)))
            .unwrap()
            .stay;

        let db = service.store();
        let stored_a = db.get_stay(&a.id).unwrap().unwrap();
        let stored_b = db.get_stay(&b.id).unwrap().unwrap();
        assert!((stored_a.adjusted_hours - 7.5).abs() < EPS);
        assert!((stored_b.adjusted_hours - 7.5).abs() < EPS);
        assert!(stored_a.has_overlaps && stored_b.has_overlaps);

        let a_segments = db.overlap_segments(&a.id).unwrap();
        assert_eq!(a_segments.len(), 1);
        assert_eq!(a_segments[0].counter, CounterRange::new(15.0, 20.0));
        assert_eq!(a_segments[0].co_present, vec![b.id.clone()]);
        assert!((a_segments[0].shared_hours - 2.5).abs() < EPS);

        service.delete_stay(&b.id).unwrap();
        let db = service.store();
        let stored_a = db.get_stay(&a.id).unwrap().unwrap();
        assert!((stored_a.adjusted_hours - 10.0).abs() < EPS);
        assert!(!stored_a.has_overlaps);
        assert!(db.overlap_segments(&a.id).unwrap().is_empty());
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hut.db");
        let original = stay("s1", "anna", (1, 3), (10.0, 20.0));
        {
            let mut db = Database::open(&path).unwrap();
            db.save_stay(&original).unwrap();
            db.insert_default_prices(2025).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.all_stays().unwrap(), vec![original]);
        assert!(db.prices_for_year(2025).unwrap().is_some());
    }
}
