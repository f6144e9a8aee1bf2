//! SQLite-backed detection event log.

use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Timestamp column format (local wall clock).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("bad timestamp in row {id}: {value}")]
    BadTimestamp { id: i64, value: String },
}

/// One accepted face detection, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    pub id: i64,
    pub emotion: String,
    /// Age as stored (text column carrying an integer value).
    pub age: String,
    pub gender: String,
    pub timestamp: NaiveDateTime,
}

/// Append-only event log. Rows are inserted at accept time and only ever
/// read back; no update or delete operation exists.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened event store");
        Self::with_connection(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS emotions (
                id INTEGER PRIMARY KEY,
                emotion TEXT,
                age TEXT,
                gender TEXT,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Append one detection event. The timestamp is assigned here, from
    /// the local wall clock, never by the caller.
    pub fn insert(&self, emotion: &str, age: f32, gender: &str) -> Result<i64, StoreError> {
        self.insert_at(emotion, age, gender, Local::now().naive_local())
    }

    /// Insert with an explicit timestamp. Exposed for the aggregation
    /// tests; the application always goes through [`insert`](Self::insert).
    pub fn insert_at(
        &self,
        emotion: &str,
        age: f32,
        gender: &str,
        timestamp: NaiveDateTime,
    ) -> Result<i64, StoreError> {
        let age_text = format!("{:.0}", age);
        self.conn.execute(
            "INSERT INTO emotions (emotion, age, gender, timestamp) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                emotion,
                age_text,
                gender,
                timestamp.format(TIMESTAMP_FORMAT).to_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Read all events with `start <= timestamp <= end`, oldest first.
    pub fn events_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<DetectionEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, emotion, age, gender, timestamp FROM emotions
             WHERE timestamp BETWEEN ?1 AND ?2
             ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt.query_map(
            rusqlite::params![
                start.format(TIMESTAMP_FORMAT).to_string(),
                end.format(TIMESTAMP_FORMAT).to_string()
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;

        let mut events = Vec::new();
        for row in rows {
            let (id, emotion, age, gender, ts) = row?;
            let timestamp = NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT)
                .map_err(|_| StoreError::BadTimestamp { id, value: ts })?;
            events.push(DetectionEvent {
                id,
                emotion,
                age,
                gender,
                timestamp,
            });
        }
        Ok(events)
    }

    /// The emotion with the highest count inside the window, or `None`
    /// when the window holds no events. Ties break deterministically:
    /// highest count first, then lexicographically smallest label.
    pub fn most_common_emotion(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Option<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT emotion, COUNT(*) AS n FROM emotions
             WHERE timestamp BETWEEN ?1 AND ?2
             GROUP BY emotion
             ORDER BY n DESC, emotion ASC
             LIMIT 1",
        )?;

        let result = stmt
            .query_row(
                rusqlite::params![
                    start.format(TIMESTAMP_FORMAT).to_string(),
                    end.format(TIMESTAMP_FORMAT).to_string()
                ],
                |row| row.get::<_, String>(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_schema_is_idempotent() {
        let store = EventStore::open_in_memory().unwrap();
        // Re-running the DDL against the same connection must not error.
        store
            .conn
            .execute(
                "CREATE TABLE IF NOT EXISTS emotions (
                    id INTEGER PRIMARY KEY,
                    emotion TEXT,
                    age TEXT,
                    gender TEXT,
                    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )
            .unwrap();
    }

    #[test]
    fn test_insert_assigns_monotonic_ids() {
        let store = EventStore::open_in_memory().unwrap();
        let a = store.insert("happy", 30.0, "Woman").unwrap();
        let b = store.insert("sad", 41.0, "Man").unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_roundtrip_preserves_values() {
        let store = EventStore::open_in_memory().unwrap();
        let when = ts(2024, 6, 3, 10, 15, 0);
        store.insert_at("happy", 29.6, "Woman", when).unwrap();
        store.insert_at("neutral", 52.2, "Man", when).unwrap();

        let events = store
            .events_between(ts(2024, 6, 3, 0, 0, 0), ts(2024, 6, 3, 23, 59, 59))
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].emotion, "happy");
        assert_eq!(events[0].age, "30");
        assert_eq!(events[0].gender, "Woman");
        assert_eq!(events[0].timestamp, when);
        assert_eq!(events[1].emotion, "neutral");
        assert_eq!(events[1].age, "52");
    }

    #[test]
    fn test_window_is_inclusive() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert_at("happy", 30.0, "Woman", ts(2024, 6, 3, 6, 0, 0))
            .unwrap();
        store
            .insert_at("sad", 30.0, "Woman", ts(2024, 6, 3, 18, 0, 0))
            .unwrap();
        store
            .insert_at("fear", 30.0, "Woman", ts(2024, 6, 3, 18, 0, 1))
            .unwrap();

        let events = store
            .events_between(ts(2024, 6, 3, 6, 0, 0), ts(2024, 6, 3, 18, 0, 0))
            .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_empty_window_returns_no_rows() {
        let store = EventStore::open_in_memory().unwrap();
        let events = store
            .events_between(ts(2024, 1, 1, 0, 0, 0), ts(2024, 1, 2, 0, 0, 0))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_most_common_emotion() {
        let store = EventStore::open_in_memory().unwrap();
        for _ in 0..3 {
            store
                .insert_at("happy", 30.0, "Woman", ts(2024, 6, 3, 10, 0, 0))
                .unwrap();
        }
        store
            .insert_at("sad", 30.0, "Woman", ts(2024, 6, 3, 11, 0, 0))
            .unwrap();

        let label = store
            .most_common_emotion(ts(2024, 6, 3, 0, 0, 0), ts(2024, 6, 3, 23, 59, 59))
            .unwrap();
        assert_eq!(label.as_deref(), Some("happy"));
    }

    #[test]
    fn test_most_common_emotion_tie_breaks_lexicographically() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert_at("surprise", 30.0, "Woman", ts(2024, 6, 3, 10, 0, 0))
            .unwrap();
        store
            .insert_at("angry", 30.0, "Woman", ts(2024, 6, 3, 11, 0, 0))
            .unwrap();

        let label = store
            .most_common_emotion(ts(2024, 6, 3, 0, 0, 0), ts(2024, 6, 3, 23, 59, 59))
            .unwrap();
        assert_eq!(label.as_deref(), Some("angry"));
    }

    #[test]
    fn test_most_common_emotion_empty_window_is_none() {
        let store = EventStore::open_in_memory().unwrap();
        let label = store
            .most_common_emotion(ts(2024, 6, 3, 0, 0, 0), ts(2024, 6, 3, 23, 59, 59))
            .unwrap();
        assert_eq!(label, None);
    }

    #[test]
    fn test_events_outside_window_excluded() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert_at("happy", 30.0, "Woman", ts(2024, 6, 2, 10, 0, 0))
            .unwrap();
        store
            .insert_at("happy", 30.0, "Woman", ts(2024, 6, 4, 10, 0, 0))
            .unwrap();

        let events = store
            .events_between(ts(2024, 6, 3, 0, 0, 0), ts(2024, 6, 3, 23, 59, 59))
            .unwrap();
        assert!(events.is_empty());
    }
}
