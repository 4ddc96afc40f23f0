//! SQLite storage implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params};

use super::schema;
use super::session::{self, SessionPool, build_pool, get_session};
use crate::clock::{Clock, SystemClock};
use crate::config::{StoreConfig, ensure_db_dir};
use crate::document::{DocumentFields, DocumentRecord};
use crate::download::{DownloadRecord, needs_refetch};
use crate::expiry::{ExpiryWindow, TimeUnit, format_timestamp, parse_timestamp};
use crate::{Error, Result};

/// SQLite-backed store for the crawler's dedup cache and extracted documents.
///
/// The store is `Send + Sync`; share it across threads by reference or `Arc`.
/// Every call checks out its own pooled session, so callers never contend on
/// a connection object. Each write is committed before the call returns.
pub struct DocumentStore {
    path: PathBuf,
    sessions: SessionPool,
    clock: Arc<dyn Clock>,
}

impl DocumentStore {
    /// Open (creating if needed) the store file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(&StoreConfig::with_database(path.as_ref()))
    }

    /// Open the store at the default location, `data/documents.db`
    pub fn open_default() -> Result<Self> {
        Self::open_with_config(&StoreConfig::default())
    }

    /// Open the store configured by `config_path`, or by `docstore.toml` when
    /// `None`. Without a config file the defaults apply.
    pub fn open_from_file(config_path: Option<&Path>) -> Result<Self> {
        Self::open_with_config(&StoreConfig::load(config_path)?)
    }

    /// Open the store described by `config`.
    ///
    /// Creates the parent directory and both tables if they are missing.
    /// Existing rows are never touched, so reopening is harmless.
    pub fn open_with_config(config: &StoreConfig) -> Result<Self> {
        let path = config.database.clone();
        ensure_db_dir(&path).map_err(|e| Error::storage_init(path.clone(), e))?;
        initialize_schema(&path, config.busy_timeout())
            .map_err(|e| Error::storage_init(path.clone(), e))?;

        let sessions = build_pool(config).map_err(|e| Error::storage_init(path.clone(), e))?;

        tracing::info!("Opened document store at {}", path.display());
        Ok(Self {
            sessions,
            path,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source used for timestamps and expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========== Download Operations ==========

    /// Whether `url` has ever been recorded as downloaded
    pub fn was_downloaded(&self, url: &str) -> Result<bool> {
        let session = get_session(&self.sessions)?;
        let found = session
            .query_row("SELECT 1 FROM downloaded_urls WHERE url = ?1", [url], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Record that `url` was downloaded now, replacing any earlier timestamp
    pub fn record_download(&self, url: &str) -> Result<()> {
        let now = self.clock.now();
        let session = get_session(&self.sessions)?;
        session.execute(
            "INSERT OR REPLACE INTO downloaded_urls (url, timestamp) VALUES (?1, ?2)",
            params![url, format_timestamp(now)],
        )?;
        tracing::debug!("Recorded download of {}", url);
        Ok(())
    }

    /// Get the dedup entry for `url`
    pub fn get_download(&self, url: &str) -> Result<Option<DownloadRecord>> {
        let session = get_session(&self.sessions)?;
        let raw: Option<Value> = session
            .query_row(
                "SELECT timestamp FROM downloaded_urls WHERE url = ?1",
                [url],
                |row| row.get(0),
            )
            .optional()?;
        drop(session);

        match raw {
            Some(raw) => Ok(Some(DownloadRecord::new(url, stored_timestamp(url, raw)?))),
            None => Ok(None),
        }
    }

    /// Whether `url` should be fetched again.
    ///
    /// True when the URL was never recorded, or when its last download plus
    /// `amount` `unit`s lies strictly before the current time.
    pub fn check_expiration(&self, url: &str, amount: i64, unit: TimeUnit) -> Result<bool> {
        self.check_expiration_window(url, &ExpiryWindow::new(amount, unit))
    }

    /// Like [`check_expiration`](Self::check_expiration), with the unit given by name
    pub fn check_expiration_str(&self, url: &str, amount: i64, unit: &str) -> Result<bool> {
        let unit: TimeUnit = unit.parse()?;
        self.check_expiration(url, amount, unit)
    }

    pub fn check_expiration_window(&self, url: &str, window: &ExpiryWindow) -> Result<bool> {
        window.duration()?;
        let record = self.get_download(url)?;
        let now = self.clock.now();
        let expired = needs_refetch(record.as_ref(), window, now)?;
        tracing::debug!("Expiry check for {} against {}: expired={}", url, window, expired);
        Ok(expired)
    }

    // ========== Document Operations ==========

    /// Insert or fully replace the document stored under `url`.
    ///
    /// Sections left as `None` are stored as empty strings; nothing from a
    /// previous version of the document survives.
    pub fn upsert_document(&self, url: &str, fields: DocumentFields) -> Result<()> {
        let record = fields.into_record(url, self.clock.now());
        let session = get_session(&self.sessions)?;
        session.execute(
            &format!(
                "INSERT OR REPLACE INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                schema::DOCUMENT_COLUMNS
            ),
            params![
                record.url,
                record.title,
                record.causes,
                record.symptoms,
                record.first_aid,
                record.contraindications,
                record.alternative_names,
                record.example_query,
                format_timestamp(record.updated_at),
            ],
        )?;
        tracing::debug!("Upserted document {}", url);
        Ok(())
    }

    /// Get the document stored under `url`
    pub fn get_document(&self, url: &str) -> Result<Option<DocumentRecord>> {
        let session = get_session(&self.sessions)?;
        let row = session
            .query_row(
                &format!("SELECT {} FROM documents WHERE url = ?1", schema::DOCUMENT_COLUMNS),
                [url],
                |row| {
                    // Columns are nullable for rows written by other tools.
                    let fields = DocumentFields {
                        title: row.get(1)?,
                        causes: row.get(2)?,
                        symptoms: row.get(3)?,
                        first_aid: row.get(4)?,
                        contraindications: row.get(5)?,
                        alternative_names: row.get(6)?,
                        example_query: row.get(7)?,
                    };
                    let timestamp: Value = row.get(8)?;
                    Ok((fields, timestamp))
                },
            )
            .optional()?;
        drop(session);

        let Some((fields, timestamp)) = row else {
            return Ok(None);
        };
        let updated_at = stored_timestamp(url, timestamp)?;
        Ok(Some(fields.into_record(url, updated_at)))
    }

    // ========== Maintenance ==========

    /// Count all dedup entries
    pub fn count_downloads(&self) -> Result<usize> {
        let session = get_session(&self.sessions)?;
        let count: i64 =
            session.query_row("SELECT COUNT(*) FROM downloaded_urls", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count all documents
    pub fn count_documents(&self) -> Result<usize> {
        let session = get_session(&self.sessions)?;
        let count: i64 =
            session.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            downloads: self.count_downloads()?,
            documents: self.count_documents()?,
        })
    }
}

/// Create both tables on a throwaway connection, closed before returning
fn initialize_schema(path: &Path, busy_timeout: Duration) -> rusqlite::Result<()> {
    let mut conn = session::connect(path, busy_timeout)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!("Journal mode for {}: {}", path.display(), mode);

    let tx = conn.transaction()?;
    for stmt in schema::all_schema_statements() {
        tx.execute(stmt, [])?;
    }
    tx.commit()?;

    conn.close().map_err(|(_, e)| e)
}

/// Decode a stored timestamp cell; anything but parseable text is corruption
fn stored_timestamp(url: &str, value: Value) -> Result<NaiveDateTime> {
    match value {
        Value::Text(raw) => parse_timestamp(&raw).map_err(|reason| Error::DataCorruption {
            url: url.to_string(),
            value: raw,
            reason,
        }),
        other => Err(Error::DataCorruption {
            url: url.to_string(),
            reason: format!("timestamp stored as {}", other.data_type()),
            value: format!("{:?}", other),
        }),
    }
}

/// Row counts for both tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub downloads: usize,
    pub documents: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Document Store Statistics:")?;
        writeln!(f, "  Downloaded URLs: {}", self.downloads)?;
        writeln!(f, "  Documents: {}", self.documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{NaiveDate, TimeDelta};
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn temp_store() -> (TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("documents.db")).unwrap();
        (dir, store)
    }

    fn clocked_store() -> (TempDir, DocumentStore, Arc<ManualClock>) {
        let (dir, store) = temp_store();
        let clock = Arc::new(ManualClock::new(start()));
        let store = store.with_clock(clock.clone());
        (dir, store, clock)
    }

    fn raw_conn(store: &DocumentStore) -> Connection {
        Connection::open(store.path()).unwrap()
    }

    fn raw_timestamp(store: &DocumentStore, url: &str) -> String {
        raw_conn(store)
            .query_row("SELECT timestamp FROM downloaded_urls WHERE url = ?1", [url], |r| {
                r.get(0)
            })
            .unwrap()
    }

    fn asthma() -> DocumentFields {
        DocumentFields::new(
            Some("Asma".into()),
            Some("Alergias".into()),
            Some("Tos y sibilancias".into()),
            Some("Asma bronquial".into()),
        )
    }

    #[test]
    fn test_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DocumentStore>();
    }

    #[test]
    fn test_download_recorded() {
        let (_dir, store) = temp_store();

        assert!(!store.was_downloaded("http://a").unwrap());
        store.record_download("http://a").unwrap();
        assert!(store.was_downloaded("http://a").unwrap());
        assert!(!store.was_downloaded("http://b").unwrap());
    }

    #[test]
    fn test_rerecording_replaces_timestamp() {
        let (_dir, store, clock) = clocked_store();

        store.record_download("http://a").unwrap();
        clock.advance(TimeDelta::hours(3));
        store.record_download("http://a").unwrap();

        let record = store.get_download("http://a").unwrap().unwrap();
        assert_eq!(record.downloaded_at, start() + TimeDelta::hours(3));
        assert_eq!(store.count_downloads().unwrap(), 1);
    }

    #[test]
    fn test_timestamp_stored_as_naive_iso() {
        let (_dir, store, clock) = clocked_store();
        store.record_download("http://whole").unwrap();
        clock.advance(TimeDelta::microseconds(42));
        store.record_download("http://frac").unwrap();

        assert_eq!(raw_timestamp(&store, "http://whole"), "2024-03-01T12:00:00");
        assert_eq!(raw_timestamp(&store, "http://frac"), "2024-03-01T12:00:00.000042");
    }

    #[test]
    fn test_unrecorded_url_is_expired() {
        let (_dir, store) = temp_store();
        for unit in TimeUnit::all() {
            assert!(store.check_expiration("http://never", 1, *unit).unwrap());
        }
    }

    #[test]
    fn test_expiration_one_hour() {
        let (_dir, store, clock) = clocked_store();
        store.record_download("u").unwrap();

        clock.advance(TimeDelta::minutes(30));
        assert!(!store.check_expiration("u", 1, TimeUnit::Hours).unwrap());

        clock.set(start() + TimeDelta::minutes(61));
        assert!(store.check_expiration("u", 1, TimeUnit::Hours).unwrap());
    }

    #[test]
    fn test_expiration_24_hours() {
        let (_dir, store, clock) = clocked_store();
        store.record_download("http://a").unwrap();

        assert!(!store.check_expiration_str("http://a", 24, "hours").unwrap());
        clock.advance(TimeDelta::hours(24) + TimeDelta::seconds(1));
        assert!(store.check_expiration_str("http://a", 24, "hours").unwrap());
        assert!(!store.check_expiration("http://a", 2, TimeUnit::Days).unwrap());
        assert!(!store.check_expiration("http://a", 1, TimeUnit::Weeks).unwrap());
    }

    #[test]
    fn test_invalid_unit() {
        let (_dir, store) = temp_store();
        store.record_download("http://a").unwrap();

        let err = store.check_expiration_str("http://a", 1, "months").unwrap_err();
        assert!(matches!(err, Error::InvalidUnit(ref u) if u == "months"));
    }

    #[test]
    fn test_corrupt_timestamp_is_reported() {
        let (_dir, store) = temp_store();
        raw_conn(&store)
            .execute(
                "INSERT INTO downloaded_urls (url, timestamp) \
                 VALUES ('http://bad', 'last tuesday')",
                [],
            )
            .unwrap();

        match store.check_expiration("http://bad", 1, TimeUnit::Days) {
            Err(Error::DataCorruption { url, value, .. }) => {
                assert_eq!(url, "http://bad");
                assert_eq!(value, "last tuesday");
            }
            other => panic!("expected DataCorruption, got {:?}", other),
        }
        assert!(store.was_downloaded("http://bad").unwrap());
    }

    #[test]
    fn test_reads_rows_from_other_writers() {
        let (_dir, store, clock) = clocked_store();
        raw_conn(&store)
            .execute(
                "INSERT INTO downloaded_urls (url, timestamp) \
                 VALUES ('http://py', '2024-03-01T11:00:00.123456')",
                [],
            )
            .unwrap();

        assert!(!store.check_expiration("http://py", 2, TimeUnit::Hours).unwrap());
        clock.advance(TimeDelta::hours(1) + TimeDelta::seconds(1));
        assert!(store.check_expiration("http://py", 2, TimeUnit::Hours).unwrap());
    }

    #[test]
    fn test_document_roundtrip() {
        let (_dir, store, _clock) = clocked_store();
        let fields = asthma()
            .with_first_aid("Usar inhalador")
            .with_contraindications("No fumar")
            .with_example_query("¿Qué hago ante una crisis de asma?");

        store.upsert_document("http://med/asma", fields.clone()).unwrap();

        let doc = store.get_document("http://med/asma").unwrap().unwrap();
        assert_eq!(doc, fields.into_record("http://med/asma", start()));
    }

    #[test]
    fn test_document_omitted_fields_are_empty() {
        let (_dir, store) = temp_store();
        let gripe = DocumentFields::new(Some("Gripe".into()), None, None, None);
        store.upsert_document("http://med/gripe", gripe).unwrap();

        let doc = store.get_document("http://med/gripe").unwrap().unwrap();
        assert_eq!(doc.title, "Gripe");
        assert_eq!(doc.causes, "");
        assert_eq!(doc.first_aid, "");
        assert_eq!(doc.example_query, "");

        let nulls: i64 = raw_conn(&store)
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE causas IS NULL OR primeros_auxilios IS NULL \
                 OR no_se_debe IS NULL OR ejemplo_consulta IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 0);
    }

    #[test]
    fn test_document_upsert_replaces_everything() {
        let (_dir, store, clock) = clocked_store();
        store
            .upsert_document("http://med/asma", asthma().with_first_aid("Usar inhalador"))
            .unwrap();

        clock.advance(TimeDelta::days(1));
        let revised = DocumentFields::default().with_title("Asma (revisado)");
        store.upsert_document("http://med/asma", revised).unwrap();

        let doc = store.get_document("http://med/asma").unwrap().unwrap();
        assert_eq!(doc.title, "Asma (revisado)");
        assert_eq!(doc.causes, "");
        assert_eq!(doc.first_aid, "");
        assert_eq!(doc.updated_at, start() + TimeDelta::days(1));
        assert_eq!(store.count_documents().unwrap(), 1);
    }

    #[test]
    fn test_missing_document_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.get_document("http://nowhere").unwrap().is_none());
    }

    #[test]
    fn test_tables_are_independent() {
        let (_dir, store) = temp_store();
        store.upsert_document("http://med/asma", asthma()).unwrap();
        assert!(!store.was_downloaded("http://med/asma").unwrap());

        store.record_download("http://med/otra").unwrap();
        assert!(store.get_document("http://med/otra").unwrap().is_none());
    }

    #[test]
    fn test_null_columns_from_other_writers() {
        let (_dir, store) = temp_store();
        raw_conn(&store)
            .execute(
                "INSERT INTO documents (url, titulo, timestamp) \
                 VALUES ('http://legacy', 'Viejo', '2023-01-01T00:00:00')",
                [],
            )
            .unwrap();

        let doc = store.get_document("http://legacy").unwrap().unwrap();
        assert_eq!(doc.title, "Viejo");
        assert_eq!(doc.symptoms, "");
        let expected = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(doc.updated_at, expected);
    }

    #[test]
    fn test_corrupt_document_timestamp_is_reported() {
        let (_dir, store) = temp_store();
        raw_conn(&store)
            .execute(
                "INSERT INTO documents (url, titulo, timestamp) \
                 VALUES ('http://bad', 'Roto', 'ayer por la tarde')",
                [],
            )
            .unwrap();

        match store.get_document("http://bad") {
            Err(Error::DataCorruption { url, value, .. }) => {
                assert_eq!(url, "http://bad");
                assert_eq!(value, "ayer por la tarde");
            }
            other => panic!("expected DataCorruption, got {:?}", other),
        }
    }

    #[test]
    fn test_non_text_timestamp_is_corruption() {
        let (_dir, store) = temp_store();
        let conn = raw_conn(&store);
        // Blobs keep their storage class even in a TEXT column.
        conn.execute(
            "INSERT INTO documents (url, timestamp) VALUES ('http://blob', X'0102')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO downloaded_urls (url, timestamp) VALUES ('http://blob', X'0102')",
            [],
        )
        .unwrap();

        match store.get_document("http://blob") {
            Err(Error::DataCorruption { reason, .. }) => assert!(reason.contains("Blob")),
            other => panic!("expected DataCorruption, got {:?}", other),
        }
        assert!(matches!(
            store.check_expiration("http://blob", 1, TimeUnit::Hours),
            Err(Error::DataCorruption { .. })
        ));
    }

    #[test]
    fn test_engine_errors_reach_the_caller() {
        let (_dir, store) = temp_store();
        raw_conn(&store)
            .execute_batch("DROP TABLE documents; DROP TABLE downloaded_urls;")
            .unwrap();

        assert!(matches!(
            store.upsert_document("http://a", asthma()),
            Err(Error::Storage(_))
        ));
        assert!(matches!(store.get_document("http://a"), Err(Error::Storage(_))));
        assert!(matches!(store.record_download("http://a"), Err(Error::Storage(_))));
        assert!(matches!(store.was_downloaded("http://a"), Err(Error::Storage(_))));
    }

    #[test]
    fn test_busy_pool_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            pool_size: 1,
            pool_timeout_ms: 100,
            ..StoreConfig::with_database(dir.path().join("documents.db"))
        };
        let store = DocumentStore::open_with_config(&config).unwrap();

        let held = get_session(&store.sessions).unwrap();
        assert!(matches!(store.was_downloaded("http://a"), Err(Error::Pool(_))));
        drop(held);
        assert!(!store.was_downloaded("http://a").unwrap());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.db");

        {
            let store = DocumentStore::open(&path).unwrap();
            store.record_download("http://a").unwrap();
            store.upsert_document("http://a", asthma()).unwrap();
        }

        let store = DocumentStore::open(&path).unwrap();
        let again = DocumentStore::open(&path).unwrap();
        assert!(store.was_downloaded("http://a").unwrap());
        assert_eq!(again.stats().unwrap(), StoreStats { downloads: 1, documents: 1 });
    }

    #[test]
    fn test_open_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("docs.db");
        let config_path = dir.path().join("docstore.toml");
        std::fs::write(
            &config_path,
            format!("database = {:?}\npool_size = 2\n", db.display().to_string()),
        )
        .unwrap();

        let store = DocumentStore::open_from_file(Some(&config_path)).unwrap();
        assert_eq!(store.path(), db.as_path());
        store.record_download("http://a").unwrap();
        assert!(db.exists());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("nested").join("documents.db");
        let store = DocumentStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn test_open_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = DocumentStore::open(blocker.join("documents.db")).err().unwrap();
        assert!(matches!(err, Error::StorageInit { .. }));
    }

    #[test]
    fn test_concurrent_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            pool_size: 4,
            ..StoreConfig::with_database(dir.path().join("documents.db"))
        };
        let store = DocumentStore::open_with_config(&config).unwrap();
        let threads = 8;
        let per_thread = 25;

        std::thread::scope(|s| {
            for t in 0..threads {
                let store = &store;
                s.spawn(move || {
                    for i in 0..per_thread {
                        let url = format!("http://site/{}/{}", t, i);
                        store.record_download(&url).unwrap();
                        assert!(store.was_downloaded(&url).unwrap());
                    }
                });
            }
        });

        assert_eq!(store.count_downloads().unwrap(), threads * per_thread);
        assert!(store.sessions.state().connections <= 4);
        for t in 0..threads {
            for i in 0..per_thread {
                assert!(store.was_downloaded(&format!("http://site/{}/{}", t, i)).unwrap());
            }
        }
    }

    #[test]
    fn test_stats_display() {
        let stats = StoreStats { downloads: 3, documents: 2 };
        let text = stats.to_string();
        assert!(text.contains("Downloaded URLs: 3"));
        assert!(text.contains("Documents: 2"));
    }
}
