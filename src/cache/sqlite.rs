//! SQLite storage for the language registry and the translation cache.
//! One read connection and one write connection (WAL mode), each behind a
//! mutex and driven from `spawn_blocking`. The write connection hosts the
//! single transaction of every `persist` call.
//!
//! Stored text keeps its case. Each text column has a `*_folded` twin holding
//! the Unicode lowercase form, which is what lookups match on.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use super::{CacheEntry, CacheStore, PersistOutcome};
use crate::error::StoreError;
use crate::language::{Language, LanguageRegistry, NewLanguage};
use crate::model::{ExampleSentenceLink, SynonymSet, TranslationPair};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS language (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        code TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS translation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        input_text TEXT NOT NULL,
        input_text_folded TEXT NOT NULL,
        input_language_id INTEGER NOT NULL
            REFERENCES language(id) ON DELETE CASCADE ON UPDATE CASCADE,
        output_text TEXT NOT NULL,
        output_language_id INTEGER NOT NULL
            REFERENCES language(id) ON DELETE CASCADE ON UPDATE CASCADE,
        created_at INTEGER NOT NULL,
        UNIQUE (input_text, input_language_id, output_language_id)
    );
    CREATE INDEX IF NOT EXISTS idx_translation_lookup
        ON translation(input_text_folded, input_language_id, output_language_id);

    CREATE TABLE IF NOT EXISTS synonym (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        text_folded TEXT NOT NULL,
        synonym_arr TEXT NOT NULL DEFAULT '[]',
        language_id INTEGER NOT NULL
            REFERENCES language(id) ON DELETE CASCADE ON UPDATE CASCADE,
        UNIQUE (text, language_id)
    );
    CREATE INDEX IF NOT EXISTS idx_synonym_lookup
        ON synonym(text_folded, language_id);

    CREATE TABLE IF NOT EXISTS example_sentence (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        text_folded TEXT NOT NULL,
        example_sentence_translation_id_arr TEXT NOT NULL DEFAULT '[]',
        language_id INTEGER NOT NULL
            REFERENCES language(id) ON DELETE CASCADE ON UPDATE CASCADE,
        output_language_id INTEGER NOT NULL
            REFERENCES language(id) ON DELETE CASCADE ON UPDATE CASCADE,
        UNIQUE (text, language_id, output_language_id)
    );
    CREATE INDEX IF NOT EXISTS idx_example_sentence_lookup
        ON example_sentence(text_folded, language_id, output_language_id);
";

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TableCounts {
    pub languages: usize,
    pub translations: usize,
    pub synonyms: usize,
    pub example_links: usize,
}

#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

struct Inner {
    read: Mutex<Connection>,
    write: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and ensure the schema exists.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let write = open_connection(db_path)?;
        write.execute_batch(SCHEMA).map_err(StoreError::Database)?;
        let read = open_connection(db_path)?;

        info!(path = %db_path.display(), "translation cache database opened");

        Ok(Self {
            inner: Arc::new(Inner {
                read: Mutex::new(read),
                write: Mutex::new(write),
            }),
        })
    }

    async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let conn = inner.read.lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut conn = inner.write.lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Insert reference languages, skipping ones already present.
    /// Returns how many rows were added.
    pub async fn seed_languages(&self, languages: Vec<NewLanguage>) -> Result<usize, StoreError> {
        for language in &languages {
            language.validate()?;
        }
        self.write(move |conn| {
            let tx = conn.transaction().map_err(StoreError::Database)?;
            let mut added = 0;
            for language in &languages {
                let result = tx
                    .execute(
                        "INSERT INTO language (name, code) VALUES (?1, ?2)",
                        params![language.name, language.code],
                    )
                    .map(|_| ())
                    .map_err(|e| classify(e, "language"));
                match result {
                    Ok(()) => added += 1,
                    Err(e) if e.is_unique_violation() => {
                        debug!(name = %language.name, "language already seeded");
                    }
                    Err(e) => return Err(e),
                }
            }
            tx.commit().map_err(StoreError::Database)?;
            Ok(added)
        })
        .await
    }

    pub async fn table_counts(&self) -> Result<TableCounts, StoreError> {
        self.read(|conn| {
            let count = |table: &str| -> Result<usize, StoreError> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map(|n| n as usize)
                .map_err(StoreError::Database)
            };
            Ok(TableCounts {
                languages: count("language")?,
                translations: count("translation")?,
                synonyms: count("synonym")?,
                example_links: count("example_sentence")?,
            })
        })
        .await
    }

    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<(), StoreError> {
        let sql = sql.to_string();
        self.write(move |conn| conn.execute_batch(&sql).map_err(StoreError::Database))
            .await
    }
}

fn open_connection(db_path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(db_path).map_err(StoreError::Database)?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(StoreError::Database)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
    )
    .map_err(StoreError::Database)?;
    Ok(conn)
}

/// Map a driver error to the storage error taxonomy. Unique and primary-key
/// constraint failures become `UniqueViolation`; everything else is opaque.
fn classify(e: rusqlite::Error, table: &'static str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &e {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return StoreError::UniqueViolation { table };
        }
    }
    StoreError::Database(e)
}

/// Lookup key for case-insensitive matching (full Unicode lowercase).
fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// --- Row mapping ---

fn language_row(row: &Row<'_>) -> rusqlite::Result<Language> {
    Ok(Language {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
    })
}

fn translation_row(row: &Row<'_>) -> rusqlite::Result<TranslationPair> {
    Ok(TranslationPair {
        id: row.get(0)?,
        input_text: row.get(1)?,
        input_language_id: row.get(2)?,
        output_text: row.get(3)?,
        output_language_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const TRANSLATION_COLUMNS: &str =
    "id, input_text, input_language_id, output_text, output_language_id, created_at";

// --- Transactional writes ---

fn insert_translation(
    tx: &Transaction<'_>,
    input_text: &str,
    input_language_id: i64,
    output_text: &str,
    output_language_id: i64,
    created_at: i64,
) -> Result<i64, StoreError> {
    tx.execute(
        "INSERT INTO translation
         (input_text, input_text_folded, input_language_id, output_text, output_language_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            input_text,
            fold_case(input_text),
            input_language_id,
            output_text,
            output_language_id,
            created_at
        ],
    )
    .map_err(|e| classify(e, "translation"))?;
    Ok(tx.last_insert_rowid())
}

/// Id of the row holding the exact key, written earlier by another request.
fn existing_translation_id(
    tx: &Transaction<'_>,
    input_text: &str,
    input_language_id: i64,
    output_language_id: i64,
) -> Result<i64, StoreError> {
    tx.query_row(
        "SELECT id FROM translation
         WHERE input_text = ?1 AND input_language_id = ?2 AND output_language_id = ?3",
        params![input_text, input_language_id, output_language_id],
        |row| row.get(0),
    )
    .map_err(StoreError::Database)
}

fn insert_synonyms(
    tx: &Transaction<'_>,
    text: &str,
    synonyms: &[String],
    language_id: i64,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(synonyms)?;
    tx.execute(
        "INSERT INTO synonym (text, text_folded, synonym_arr, language_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![text, fold_case(text), encoded, language_id],
    )
    .map(|_| ())
    .map_err(|e| classify(e, "synonym"))
}

fn insert_example_link(
    tx: &Transaction<'_>,
    text: &str,
    translation_ids: &[i64],
    language_id: i64,
    output_language_id: i64,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(translation_ids)?;
    tx.execute(
        "INSERT INTO example_sentence
         (text, text_folded, example_sentence_translation_id_arr, language_id, output_language_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![text, fold_case(text), encoded, language_id, output_language_id],
    )
    .map(|_| ())
    .map_err(|e| classify(e, "example_sentence"))
}

/// Write every row of `entry` in one transaction.
/// Dropping `tx` on an early return rolls everything back.
fn persist_entry(conn: &mut Connection, entry: &CacheEntry) -> Result<PersistOutcome, StoreError> {
    let tx = conn.transaction().map_err(StoreError::Database)?;
    let src = entry.source_language_id;
    let tgt = entry.target_language_id;
    let now = now_unix();
    let mut outcome = PersistOutcome::default();

    // Example pairs first: the link row needs their ids. A pair written by
    // someone else is reused rather than duplicated.
    let mut example_ids = Vec::with_capacity(entry.data.example_sentences.len());
    for example in &entry.data.example_sentences {
        let id = match insert_translation(&tx, &example.sentence, src, &example.translation, tgt, now)
        {
            Ok(id) => {
                outcome.inserted += 1;
                id
            }
            Err(e) if e.is_unique_violation() => {
                outcome.deduplicated += 1;
                existing_translation_id(&tx, &example.sentence, src, tgt)?
            }
            Err(e) => return Err(e),
        };
        example_ids.push(id);
    }

    outcome.record(insert_example_link(&tx, &entry.text, &example_ids, src, tgt))?;
    outcome.record(
        insert_translation(&tx, &entry.text, src, &entry.translation, tgt, now).map(|_| ()),
    )?;
    outcome.record(insert_synonyms(&tx, &entry.text, &entry.data.input_synonyms, src))?;
    outcome.record(insert_synonyms(
        &tx,
        &entry.translation,
        &entry.data.translation_synonyms,
        tgt,
    ))?;

    tx.commit().map_err(StoreError::Database)?;
    Ok(outcome)
}

#[async_trait]
impl LanguageRegistry for SqliteStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Language>, StoreError> {
        self.read(move |conn| {
            conn.query_row(
                "SELECT id, name, code FROM language WHERE id = ?1",
                params![id],
                language_row,
            )
            .optional()
            .map_err(StoreError::Database)
        })
        .await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Language>, StoreError> {
        let name = name.trim().to_string();
        self.read(move |conn| {
            conn.query_row(
                "SELECT id, name, code FROM language WHERE name = ?1 COLLATE NOCASE",
                params![name],
                language_row,
            )
            .optional()
            .map_err(StoreError::Database)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Language>, StoreError> {
        self.read(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, code FROM language ORDER BY id")
                .map_err(StoreError::Database)?;
            let rows = stmt
                .query_map([], language_row)
                .map_err(StoreError::Database)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::Database)
        })
        .await
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn find_translation(
        &self,
        text: &str,
        input_language_id: i64,
        output_language_id: i64,
    ) -> Result<Option<TranslationPair>, StoreError> {
        let text = text.to_string();
        self.read(move |conn| {
            // An exact-case row wins over a case-folded one.
            conn.query_row(
                &format!(
                    "SELECT {TRANSLATION_COLUMNS} FROM translation
                     WHERE input_text_folded = ?2
                       AND input_language_id = ?3 AND output_language_id = ?4
                     ORDER BY (input_text = ?1) DESC, id
                     LIMIT 1"
                ),
                params![text, fold_case(&text), input_language_id, output_language_id],
                translation_row,
            )
            .optional()
            .map_err(StoreError::Database)
        })
        .await
    }

    async fn find_synonyms(
        &self,
        text: &str,
        language_id: i64,
    ) -> Result<Option<SynonymSet>, StoreError> {
        let text = text.to_string();
        self.read(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, text, synonym_arr, language_id FROM synonym
                     WHERE text_folded = ?2 AND language_id = ?3
                     ORDER BY (text = ?1) DESC, id
                     LIMIT 1",
                    params![text, fold_case(&text), language_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(StoreError::Database)?;

            row.map(|(id, text, encoded, language_id)| {
                Ok(SynonymSet {
                    id,
                    text,
                    synonyms: serde_json::from_str(&encoded)?,
                    language_id,
                })
            })
            .transpose()
        })
        .await
    }

    async fn find_example_link(
        &self,
        text: &str,
        language_id: i64,
        output_language_id: i64,
    ) -> Result<Option<ExampleSentenceLink>, StoreError> {
        let text = text.to_string();
        self.read(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, text, example_sentence_translation_id_arr,
                            language_id, output_language_id
                     FROM example_sentence
                     WHERE text_folded = ?2
                       AND language_id = ?3 AND output_language_id = ?4
                     ORDER BY (text = ?1) DESC, id
                     LIMIT 1",
                    params![text, fold_case(&text), language_id, output_language_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    },
                )
                .optional()
                .map_err(StoreError::Database)?;

            row.map(|(id, text, encoded, language_id, output_language_id)| {
                Ok(ExampleSentenceLink {
                    id,
                    text,
                    translation_ids: serde_json::from_str(&encoded)?,
                    language_id,
                    output_language_id,
                })
            })
            .transpose()
        })
        .await
    }

    async fn find_translations_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<Vec<TranslationPair>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.read(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TRANSLATION_COLUMNS} FROM translation WHERE id IN ({placeholders})"
                ))
                .map_err(StoreError::Database)?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter()), translation_row)
                .map_err(StoreError::Database)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::Database)
        })
        .await
    }

    async fn persist(&self, entry: &CacheEntry) -> Result<PersistOutcome, StoreError> {
        let entry = entry.clone();
        self.write(move |conn| persist_entry(conn, &entry)).await
    }
}
