// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed atomic fact store.
//!
//! Every version of every fact is kept in `fact_versions`; `facts` holds one
//! row per identity pointing at the current version. The index views are
//! derived from this store and can always be rebuilt from it.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;
use rusqlite::types::Type;
use simplemem_core::types::{AtomicFact, FactId, FactTime, Resolution, TurnRange};
use simplemem_core::SimpleMemError;
use tokio_rusqlite::Connection;
use tracing::debug;

const SCHEMA_V1: &str = include_str!("../migrations/V1__atomic_facts.sql");
const SCHEMA_VERSION: i64 = 1;

const NAIVE_STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const CURRENT_FACT_SELECT: &str = "SELECT v.fact_id, v.version, v.text, v.first_turn, v.last_turn, v.speakers, v.entities, v.keywords, v.time_start, v.time_end, v.observed_at, v.resolution, v.unresolved_refs, v.correlation_key, v.embedding, f.created_at, v.versioned_at FROM facts f JOIN fact_versions v ON v.fact_id = f.fact_id AND v.version = f.current_version";

/// Helper to convert tokio_rusqlite errors into SimpleMemError::Storage.
fn storage_err(e: tokio_rusqlite::Error) -> SimpleMemError {
    SimpleMemError::Storage {
        source: Box::new(e),
    }
}

/// Persisted counters that survive restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMeta {
    pub total_turns_processed: u64,
    /// Sequence number the dialogue buffer should hand out next.
    pub next_turn_seq: u64,
    pub last_finalized_at: Option<DateTime<Utc>>,
}

/// Durable, versioned repository of atomic facts.
pub struct FactStore {
    conn: Connection,
    path: String,
}

impl FactStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, SimpleMemError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| SimpleMemError::Storage {
                source: Box::new(e),
            })?;
        }
        let conn = Connection::open(path).await.map_err(|e| storage_err(e.into()))?;
        let store = Self {
            conn,
            path: path.to_string(),
        };
        store.migrate(wal_mode).await?;
        debug!(path, "fact store opened");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, SimpleMemError> {
        let conn = Connection::open_in_memory().await.map_err(|e| storage_err(e.into()))?;
        let store = Self {
            conn,
            path: ":memory:".to_string(),
        };
        store.migrate(false).await?;
        Ok(store)
    }

    /// Database location as configured.
    pub fn path(&self) -> &str {
        &self.path
    }

    async fn migrate(&self, wal_mode: bool) -> Result<(), SimpleMemError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
                let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
                if version < SCHEMA_VERSION {
                    conn.execute_batch(SCHEMA_V1)?;
                    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
                }
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Identity and current version of the fact carrying `correlation_key`, if any.
    pub async fn find_by_correlation(
        &self,
        correlation_key: &str,
    ) -> Result<Option<(FactId, u64)>, SimpleMemError> {
        let key = correlation_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<(FactId, u64)>, rusqlite::Error> {
                conn.query_row(
                    "SELECT fact_id, current_version FROM facts WHERE correlation_key = ?1",
                    rusqlite::params![key],
                    |row| {
                        let id: String = row.get(0)?;
                        let version: i64 = row.get(1)?;
                        Ok((FactId(id), version as u64))
                    },
                )
                .optional()
            })
            .await
            .map_err(storage_err)
    }

    /// Store `fact` as the new current version of its identity.
    ///
    /// Version 1 creates the identity; any later version must directly follow
    /// the stored current version, otherwise nothing is written.
    pub async fn commit_version(&self, fact: &AtomicFact) -> Result<(), SimpleMemError> {
        let row = FactRow::encode(fact)?;
        let fact_id = fact.id.clone();
        let outcome = self
            .conn
            .call(move |conn| -> Result<Result<(), String>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let current: Option<i64> = tx
                    .query_row(
                        "SELECT current_version FROM facts WHERE fact_id = ?1",
                        rusqlite::params![row.fact_id],
                        |r| r.get(0),
                    )
                    .optional()?;

                match current {
                    None if row.version == 1 => {
                        tx.execute(
                            "INSERT INTO facts (fact_id, current_version, correlation_key, created_at) VALUES (?1, 1, ?2, ?3)",
                            rusqlite::params![row.fact_id, row.correlation_key, row.created_at],
                        )?;
                    }
                    Some(v) if v + 1 == row.version => {
                        tx.execute(
                            "UPDATE facts SET current_version = ?2 WHERE fact_id = ?1",
                            rusqlite::params![row.fact_id, row.version],
                        )?;
                    }
                    other => {
                        return Ok(Err(format!(
                            "cannot store version {} over current version {other:?}",
                            row.version
                        )));
                    }
                }

                tx.execute(
                    "INSERT INTO fact_versions (fact_id, version, text, first_turn, last_turn, speakers, entities, keywords, time_start, time_end, observed_at, resolution, unresolved_refs, correlation_key, embedding, versioned_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                    rusqlite::params![
                        row.fact_id,
                        row.version,
                        row.text,
                        row.first_turn,
                        row.last_turn,
                        row.speakers,
                        row.entities,
                        row.keywords,
                        row.time_start,
                        row.time_end,
                        row.observed_at,
                        row.resolution,
                        row.unresolved_refs,
                        row.correlation_key,
                        row.embedding,
                        row.versioned_at,
                    ],
                )?;
                tx.commit()?;
                Ok(Ok(()))
            })
            .await
            .map_err(storage_err)?;

        outcome.map_err(|detail| {
            SimpleMemError::Internal(format!("version conflict for fact {fact_id}: {detail}"))
        })
    }

    /// Undo [`Self::commit_version`] for a version that is still current.
    ///
    /// Version 1 removes the identity; a later version makes its predecessor
    /// current again.
    pub async fn revert_version(&self, id: &FactId, version: u64) -> Result<(), SimpleMemError> {
        let fact_id = id.0.clone();
        let target = version as i64;
        let outcome = self
            .conn
            .call(move |conn| -> Result<Result<(), String>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let current: Option<i64> = tx
                    .query_row(
                        "SELECT current_version FROM facts WHERE fact_id = ?1",
                        rusqlite::params![fact_id],
                        |r| r.get(0),
                    )
                    .optional()?;
                if current != Some(target) {
                    return Ok(Err(format!("current version is {current:?}")));
                }

                tx.execute(
                    "DELETE FROM fact_versions WHERE fact_id = ?1 AND version = ?2",
                    rusqlite::params![fact_id, target],
                )?;
                if target == 1 {
                    tx.execute(
                        "DELETE FROM facts WHERE fact_id = ?1",
                        rusqlite::params![fact_id],
                    )?;
                } else {
                    tx.execute(
                        "UPDATE facts SET current_version = ?2 WHERE fact_id = ?1",
                        rusqlite::params![fact_id, target - 1],
                    )?;
                }
                tx.commit()?;
                Ok(Ok(()))
            })
            .await
            .map_err(storage_err)?;

        outcome.map_err(|detail| {
            SimpleMemError::Internal(format!("cannot revert fact {id} version {version}: {detail}"))
        })
    }

    /// Identity and current version of every stored fact.
    pub async fn current_versions(&self) -> Result<Vec<(FactId, u64)>, SimpleMemError> {
        self.conn
            .call(|conn| -> Result<Vec<(FactId, u64)>, rusqlite::Error> {
                let mut stmt =
                    conn.prepare("SELECT fact_id, current_version FROM facts ORDER BY seq")?;
                let rows = stmt
                    .query_map([], |row| {
                        let id: String = row.get(0)?;
                        let version: i64 = row.get(1)?;
                        Ok((FactId(id), version as u64))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage_err)
    }

    /// Current version of one fact.
    pub async fn get_current(&self, id: &FactId) -> Result<Option<AtomicFact>, SimpleMemError> {
        let id = id.0.clone();
        self.conn
            .call(move |conn| -> Result<Option<AtomicFact>, rusqlite::Error> {
                let sql = format!("{CURRENT_FACT_SELECT} WHERE f.fact_id = ?1");
                conn.query_row(&sql, rusqlite::params![id], row_to_fact)
                    .optional()
            })
            .await
            .map_err(storage_err)
    }

    /// Every stored version of one fact, oldest first.
    pub async fn versions(&self, id: &FactId) -> Result<Vec<u64>, SimpleMemError> {
        let id = id.0.clone();
        self.conn
            .call(move |conn| -> Result<Vec<u64>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT version FROM fact_versions WHERE fact_id = ?1 ORDER BY version",
                )?;
                let versions = stmt
                    .query_map(rusqlite::params![id], |r| r.get::<_, i64>(0))?
                    .map(|v| v.map(|v| v as u64))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(versions)
            })
            .await
            .map_err(storage_err)
    }

    /// Current versions of all facts, in creation order.
    pub async fn load_current(&self) -> Result<Vec<AtomicFact>, SimpleMemError> {
        self.conn
            .call(move |conn| -> Result<Vec<AtomicFact>, rusqlite::Error> {
                let sql = format!("{CURRENT_FACT_SELECT} ORDER BY f.seq");
                let mut stmt = conn.prepare(&sql)?;
                let facts = stmt
                    .query_map([], row_to_fact)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(facts)
            })
            .await
            .map_err(storage_err)
    }

    /// A page of current versions, in creation order.
    pub async fn list_current(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AtomicFact>, SimpleMemError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<Vec<AtomicFact>, rusqlite::Error> {
                let sql = format!("{CURRENT_FACT_SELECT} ORDER BY f.seq LIMIT ?1 OFFSET ?2");
                let mut stmt = conn.prepare(&sql)?;
                let facts = stmt
                    .query_map(rusqlite::params![limit, offset], row_to_fact)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(facts)
            })
            .await
            .map_err(storage_err)
    }

    /// Number of fact identities stored.
    pub async fn count_current(&self) -> Result<u64, SimpleMemError> {
        self.conn
            .call(|conn| -> Result<u64, rusqlite::Error> {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM facts", [], |r| r.get(0))?;
                Ok(n as u64)
            })
            .await
            .map_err(storage_err)
    }

    pub async fn meta(&self) -> Result<StoreMeta, SimpleMemError> {
        self.conn
            .call(|conn| -> Result<StoreMeta, rusqlite::Error> {
                conn.query_row(
                    "SELECT total_turns_processed, next_turn_seq, last_finalized_at FROM store_meta WHERE id = 1",
                    [],
                    |row| {
                        let total: i64 = row.get(0)?;
                        let next: i64 = row.get(1)?;
                        let last: Option<String> = row.get(2)?;
                        Ok(StoreMeta {
                            total_turns_processed: total as u64,
                            next_turn_seq: next.max(1) as u64,
                            last_finalized_at: last
                                .map(|s| decode_utc(&s, 2))
                                .transpose()?,
                        })
                    },
                )
            })
            .await
            .map_err(storage_err)
    }

    /// Account for a finalize call that consumed `turns_processed` turns.
    pub async fn record_finalize(
        &self,
        turns_processed: u64,
        next_turn_seq: u64,
        at: DateTime<Utc>,
    ) -> Result<(), SimpleMemError> {
        let turns = turns_processed as i64;
        let next = next_turn_seq as i64;
        let at = encode_utc(at);
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE store_meta SET total_turns_processed = total_turns_processed + ?1, next_turn_seq = MAX(next_turn_seq, ?2), last_finalized_at = ?3 WHERE id = 1",
                    rusqlite::params![turns, next, at],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Remove every fact and reset the counters.
    pub async fn clear(&self) -> Result<(), SimpleMemError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute_batch(
                    "DELETE FROM fact_versions;
                     DELETE FROM facts;
                     DELETE FROM sqlite_sequence WHERE name = 'facts';
                     UPDATE store_meta SET total_turns_processed = 0, next_turn_seq = 1, last_finalized_at = NULL WHERE id = 1;",
                )?;
                tx.commit()
            })
            .await
            .map_err(storage_err)
    }
}

/// Column values for one `fact_versions` row, ready to bind.
struct FactRow {
    fact_id: String,
    version: i64,
    text: String,
    first_turn: i64,
    last_turn: i64,
    speakers: String,
    entities: String,
    keywords: String,
    time_start: Option<String>,
    time_end: Option<String>,
    observed_at: String,
    resolution: &'static str,
    unresolved_refs: String,
    correlation_key: Option<String>,
    embedding: Vec<u8>,
    created_at: String,
    versioned_at: String,
}

impl FactRow {
    fn encode(fact: &AtomicFact) -> Result<Self, SimpleMemError> {
        let json = |values: &Vec<String>| {
            serde_json::to_string(values).map_err(|e| SimpleMemError::Storage {
                source: Box::new(e),
            })
        };
        Ok(Self {
            fact_id: fact.id.0.clone(),
            version: fact.version as i64,
            text: fact.text.clone(),
            first_turn: fact.source_turns.first as i64,
            last_turn: fact.source_turns.last as i64,
            speakers: json(&fact.speakers)?,
            entities: json(&fact.entities)?,
            keywords: json(&fact.keywords)?,
            time_start: fact.time.map(|t| encode_naive(t.start)),
            time_end: fact.time.and_then(|t| t.end).map(encode_naive),
            observed_at: encode_naive(fact.observed_at),
            resolution: fact.resolution.as_str(),
            unresolved_refs: json(&fact.unresolved_references)?,
            correlation_key: fact.correlation_key.clone(),
            embedding: vec_to_blob(&fact.embedding),
            created_at: encode_utc(fact.created_at),
            versioned_at: encode_utc(fact.versioned_at),
        })
    }
}

/// Convert a rusqlite row from [`CURRENT_FACT_SELECT`] to an AtomicFact.
fn row_to_fact(row: &rusqlite::Row) -> Result<AtomicFact, rusqlite::Error> {
    let version: i64 = row.get(1)?;
    let first_turn: i64 = row.get(3)?;
    let last_turn: i64 = row.get(4)?;
    let time_start: Option<String> = row.get(8)?;
    let time_end: Option<String> = row.get(9)?;
    let observed_at: String = row.get(10)?;
    let resolution: String = row.get(11)?;
    let blob: Vec<u8> = row.get(14)?;
    let created_at: String = row.get(15)?;
    let versioned_at: String = row.get(16)?;

    let time = match time_start {
        Some(start) => Some(FactTime {
            start: decode_naive(&start, 8)?,
            end: time_end.map(|e| decode_naive(&e, 9)).transpose()?,
        }),
        None => None,
    };

    Ok(AtomicFact {
        id: FactId(row.get(0)?),
        version: version as u64,
        text: row.get(2)?,
        source_turns: TurnRange {
            first: first_turn as u64,
            last: last_turn as u64,
        },
        speakers: decode_list(row, 5)?,
        entities: decode_list(row, 6)?,
        keywords: decode_list(row, 7)?,
        time,
        observed_at: decode_naive(&observed_at, 10)?,
        resolution: Resolution::from_str_value(&resolution),
        unresolved_references: decode_list(row, 12)?,
        correlation_key: row.get(13)?,
        embedding: blob_to_vec(&blob),
        created_at: decode_utc(&created_at, 15)?,
        versioned_at: decode_utc(&versioned_at, 16)?,
    })
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn decode_list(row: &rusqlite::Row, idx: usize) -> Result<Vec<String>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn encode_naive(at: NaiveDateTime) -> String {
    at.format(NAIVE_STORAGE_FORMAT).to_string()
}

fn decode_naive(raw: &str, idx: usize) -> Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(raw, NAIVE_STORAGE_FORMAT).map_err(|e| conversion_err(idx, e))
}

fn encode_utc(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_utc(raw: &str, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

/// Serialize an f32 vector to little-endian bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize little-endian bytes to an f32 vector; a trailing partial value is ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn make_fact(id: &str, version: u64, text: &str) -> AtomicFact {
        AtomicFact {
            id: FactId(id.to_string()),
            version,
            text: text.to_string(),
            source_turns: TurnRange { first: 1, last: 2 },
            speakers: vec!["Alice".into(), "Bob".into()],
            entities: vec!["Alice".into(), "Bob".into(), "Starbucks".into()],
            keywords: vec!["meeting".into()],
            time: Some(FactTime::instant(at("2025-11-16T14:00:00"))),
            observed_at: at("2025-11-15T14:31:00"),
            resolution: Resolution::Resolved,
            unresolved_references: vec![],
            correlation_key: Some("alice-bob-meeting".into()),
            embedding: vec![0.25, -0.5, 1.0],
            created_at: Utc::now(),
            versioned_at: Utc::now(),
        }
    }

    #[test]
    fn blob_roundtrip() {
        let original: Vec<f32> = (0..16).map(|i| i as f32 / 16.0).collect();
        assert_eq!(blob_to_vec(&vec_to_blob(&original)), original);
        assert!(blob_to_vec(&[1, 2, 3]).is_empty());
    }

    #[tokio::test]
    async fn commit_and_read_back() {
        let store = FactStore::open_in_memory().await.unwrap();
        let fact = make_fact("f-1", 1, "Alice will meet Bob at Starbucks on 2025-11-16T14:00:00");
        store.commit_version(&fact).await.unwrap();

        let loaded = store.get_current(&fact.id).await.unwrap().unwrap();
        assert_eq!(loaded.text, fact.text);
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.entities, fact.entities);
        assert_eq!(loaded.time, fact.time);
        assert_eq!(loaded.observed_at, fact.observed_at);
        assert_eq!(loaded.embedding, fact.embedding);
        assert_eq!(store.count_current().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn new_version_replaces_current() {
        let store = FactStore::open_in_memory().await.unwrap();
        store.commit_version(&make_fact("f-1", 1, "old")).await.unwrap();
        store.commit_version(&make_fact("f-1", 2, "new")).await.unwrap();

        let current = store.get_current(&FactId("f-1".into())).await.unwrap().unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.text, "new");
        assert_eq!(store.versions(&current.id).await.unwrap(), vec![1, 2]);
        assert_eq!(store.count_current().await.unwrap(), 1);
        assert_eq!(
            store.find_by_correlation("alice-bob-meeting").await.unwrap(),
            Some((FactId("f-1".into()), 2))
        );
    }

    #[tokio::test]
    async fn out_of_order_version_is_rejected() {
        let store = FactStore::open_in_memory().await.unwrap();
        store.commit_version(&make_fact("f-1", 1, "v1")).await.unwrap();
        let err = store.commit_version(&make_fact("f-1", 3, "v3")).await.unwrap_err();
        assert!(matches!(err, SimpleMemError::Internal(_)));
        // Duplicate first version is also refused.
        assert!(store.commit_version(&make_fact("f-1", 1, "again")).await.is_err());
        assert_eq!(store.versions(&FactId("f-1".into())).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn revert_restores_previous_version() {
        let store = FactStore::open_in_memory().await.unwrap();
        let id = FactId("f-1".into());
        store.commit_version(&make_fact("f-1", 1, "old")).await.unwrap();
        store.commit_version(&make_fact("f-1", 2, "new")).await.unwrap();

        // Only the current version can be reverted.
        assert!(store.revert_version(&id, 1).await.is_err());

        store.revert_version(&id, 2).await.unwrap();
        let current = store.get_current(&id).await.unwrap().unwrap();
        assert_eq!((current.version, current.text.as_str()), (1, "old"));
        assert_eq!(store.versions(&id).await.unwrap(), vec![1]);
        assert_eq!(store.current_versions().await.unwrap(), vec![(id.clone(), 1)]);

        store.revert_version(&id, 1).await.unwrap();
        assert_eq!(store.count_current().await.unwrap(), 0);
        assert!(store.find_by_correlation("alice-bob-meeting").await.unwrap().is_none());
        // The identity can be created again from scratch.
        store.commit_version(&make_fact("f-1", 1, "again")).await.unwrap();
    }

    #[tokio::test]
    async fn list_current_pages_in_creation_order() {
        let store = FactStore::open_in_memory().await.unwrap();
        for i in 0..5 {
            let mut fact = make_fact(&format!("f-{i}"), 1, &format!("fact {i}"));
            fact.correlation_key = None;
            store.commit_version(&fact).await.unwrap();
        }
        let page = store.list_current(2, 1).await.unwrap();
        let ids: Vec<_> = page.iter().map(|f| f.id.0.as_str()).collect();
        assert_eq!(ids, vec!["f-1", "f-2"]);
        assert_eq!(store.load_current().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn meta_accumulates_and_clear_resets() {
        let store = FactStore::open_in_memory().await.unwrap();
        assert_eq!(store.meta().await.unwrap().next_turn_seq, 1);

        store.record_finalize(3, 4, Utc::now()).await.unwrap();
        store.record_finalize(2, 6, Utc::now()).await.unwrap();
        let meta = store.meta().await.unwrap();
        assert_eq!(meta.total_turns_processed, 5);
        assert_eq!(meta.next_turn_seq, 6);
        assert!(meta.last_finalized_at.is_some());

        store.commit_version(&make_fact("f-1", 1, "x")).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count_current().await.unwrap(), 0);
        assert_eq!(store.meta().await.unwrap(), StoreMeta {
            total_turns_processed: 0,
            next_turn_seq: 1,
            last_finalized_at: None,
        });
    }

    #[tokio::test]
    async fn reopening_file_keeps_facts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("simplemem.db");
        let path = path.to_str().unwrap();
        {
            let store = FactStore::open(path, true).await.unwrap();
            store.commit_version(&make_fact("f-1", 1, "persisted")).await.unwrap();
        }
        let store = FactStore::open(path, true).await.unwrap();
        let facts = store.load_current().await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].text, "persisted");
    }
}
