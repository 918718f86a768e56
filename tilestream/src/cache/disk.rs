//! Persistent response cache backed by SQLite.
//!
//! Every fetched exchange is stored as one row of `CacheItemTable`. Rows are
//! keyed by a caller-chosen string (usually the request URL) through a
//! non-unique index, so one key may map to several rows; lookups hand each
//! row to a predicate and the first accepted row wins.
//!
//! # Eviction
//!
//! [`DiskCache::prune`] keeps the row count at or below `max_items`:
//!
//! 1. rows whose `expiryTime` has passed are deleted first;
//! 2. if that is not enough, the least recently accessed rows go next
//!    (`lastAccessedTime` ascending, then insertion id ascending).
//!
//! # Thread safety
//!
//! All operations take one exclusive lock for their whole duration and run
//! synchronously. They are safe to call from any thread; callers that must
//! not block should dispatch them onto a worker.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::control::ResponseCacheControl;
use super::item::{CacheItem, CacheRequest, CacheResponse};
use crate::http::{AssetRequest, HttpHeaders};

/// Default row budget.
pub const DEFAULT_MAX_ITEMS: u64 = 4096;

/// Default number of stores between automatic prunes.
pub const DEFAULT_PRUNE_INTERVAL: u32 = 10_000;

const CREATE_CACHE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS CacheItemTable(\
    id INTEGER PRIMARY KEY NOT NULL,\
    expiryTime DATETIME NOT NULL,\
    lastAccessedTime DATETIME NOT NULL,\
    responseHeaders TEXT NOT NULL,\
    responseContentType TEXT NOT NULL,\
    responseStatusCode INTEGER NOT NULL,\
    responseCacheControl TEXT NOT NULL,\
    responseData BLOB,\
    requestHeader TEXT NOT NULL,\
    requestMethod TEXT NOT NULL,\
    requestUrl TEXT NOT NULL,\
    key TEXT NOT NULL)";

const INDEX_KEY_COLUMN_SQL: &str = "CREATE INDEX IF NOT EXISTS key_index ON CacheItemTable(key)";

const PRAGMA_SQL: &str = "PRAGMA synchronous=OFF; PRAGMA page_size=4096;";

const GET_ENTRY_SQL: &str = "SELECT id, expiryTime, lastAccessedTime, responseHeaders, \
    responseContentType, responseStatusCode, responseCacheControl, responseData, \
    requestHeader, requestMethod, requestUrl \
    FROM CacheItemTable WHERE key = ?1 ORDER BY id ASC";

const UPDATE_LAST_ACCESSED_TIME_SQL: &str =
    "UPDATE CacheItemTable SET lastAccessedTime = ?1 WHERE id = ?2";

const STORE_RESPONSE_SQL: &str = "INSERT INTO CacheItemTable (expiryTime, lastAccessedTime, \
    responseHeaders, responseContentType, responseStatusCode, responseCacheControl, \
    responseData, requestHeader, requestMethod, requestUrl, key) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const TOTAL_ITEMS_QUERY_SQL: &str = "SELECT COUNT(*) FROM CacheItemTable";

const DELETE_EXPIRED_ITEMS_SQL: &str = "DELETE FROM CacheItemTable WHERE expiryTime < ?1";

const DELETE_LRU_ITEMS_SQL: &str = "DELETE FROM CacheItemTable WHERE id IN \
    (SELECT id FROM CacheItemTable ORDER BY lastAccessedTime ASC, id ASC LIMIT ?1)";

const CLEAR_ALL_SQL: &str = "DELETE FROM CacheItemTable";

const PREPARED_STATEMENTS: [&str; 7] = [
    GET_ENTRY_SQL,
    UPDATE_LAST_ACCESSED_TIME_SQL,
    STORE_RESPONSE_SQL,
    TOTAL_ITEMS_QUERY_SQL,
    DELETE_EXPIRED_ITEMS_SQL,
    DELETE_LRU_ITEMS_SQL,
    CLEAR_ALL_SQL,
];

/// Errors returned by [`DiskCache`].
#[derive(Debug, Error)]
pub enum DiskCacheError {
    /// `store_response` was given a request that has not completed.
    #[error("Request needs to have a response")]
    MissingResponse,

    /// The database file could not be opened.
    #[error("Failed to open cache database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Any statement failed to prepare, bind, or step.
    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Headers could not be encoded for storage.
    #[error("Failed to serialize headers: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded.
    #[error("Unreadable cache row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

/// Outcome of a [`DiskCache::prune`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneResult {
    /// Rows removed because their expiry time had passed.
    pub expired_removed: usize,
    /// Rows removed in least-recently-accessed order.
    pub lru_removed: usize,
    /// Duration of the prune in milliseconds.
    pub duration_ms: u64,
}

impl PruneResult {
    pub fn total_removed(&self) -> usize {
        self.expired_removed + self.lru_removed
    }
}

impl fmt::Display for PruneResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Prune: removed {} expired and {} least-recently-used rows in {}ms",
            self.expired_removed, self.lru_removed, self.duration_ms
        )
    }
}

/// Disk cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCacheConfig {
    /// SQLite database file.
    pub path: PathBuf,

    /// Row budget enforced by `prune`.
    pub max_items: u64,

    /// Stores between automatic prunes in the caching accessor.
    pub prune_interval: u32,
}

impl DiskCacheConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_items: DEFAULT_MAX_ITEMS,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }

    pub fn with_max_items(mut self, max_items: u64) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_prune_interval(mut self, prune_interval: u32) -> Self {
        self.prune_interval = prune_interval;
        self
    }
}

/// SQLite-backed store of complete HTTP exchanges.
pub struct DiskCache {
    connection: Mutex<Connection>,
    max_items: u64,
    path: Option<PathBuf>,
}

impl DiskCache {
    /// Open (or create) the cache database at `path`.
    ///
    /// Creates the table and key index if absent, applies the WAL,
    /// synchronous and page-size pragmas, and prepares every statement.
    ///
    /// # Errors
    ///
    /// Any failure during setup is returned and no cache is constructed.
    pub fn open(path: impl AsRef<Path>, max_items: u64) -> Result<Self, DiskCacheError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| DiskCacheError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut cache = Self::initialize(connection, max_items)?;
        cache.path = Some(path.to_path_buf());

        info!(path = %path.display(), max_items, "Disk cache opened");
        Ok(cache)
    }

    /// Open a cache from its settings.
    pub fn from_config(config: &DiskCacheConfig) -> Result<Self, DiskCacheError> {
        Self::open(&config.path, config.max_items)
    }

    /// Open a private in-memory cache. Used by tests and ephemeral sessions.
    pub fn open_in_memory(max_items: u64) -> Result<Self, DiskCacheError> {
        Self::initialize(Connection::open_in_memory()?, max_items)
    }

    fn initialize(connection: Connection, max_items: u64) -> Result<Self, DiskCacheError> {
        connection.execute(CREATE_CACHE_TABLE_SQL, [])?;
        connection.execute(INDEX_KEY_COLUMN_SQL, [])?;

        let journal_mode: String =
            connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        connection.execute_batch(PRAGMA_SQL)?;
        debug!(journal_mode = %journal_mode, "Disk cache pragmas applied");

        connection.set_prepared_statement_cache_capacity(PREPARED_STATEMENTS.len());
        for sql in PREPARED_STATEMENTS {
            connection.prepare_cached(sql)?;
        }

        Ok(Self {
            connection: Mutex::new(connection),
            max_items,
            path: None,
        })
    }

    /// Database file, or `None` for an in-memory cache.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Row budget enforced by [`prune`](Self::prune).
    pub fn max_items(&self) -> u64 {
        self.max_items
    }

    /// Look up the rows stored under `key`.
    ///
    /// Rows are decoded in insertion order and offered to `predicate`. The
    /// first accepted row has its `lastAccessedTime` set to now and is
    /// returned; scanning stops there. `Ok(None)` means no row was accepted,
    /// including when no row exists. Rows that cannot be decoded are logged
    /// and skipped.
    ///
    /// The cache lock is held while `predicate` runs, so the predicate must
    /// not call back into this cache.
    pub fn get_entry<P>(&self, key: &str, mut predicate: P) -> Result<Option<CacheItem>, DiskCacheError>
    where
        P: FnMut(&CacheItem) -> bool,
    {
        let connection = self.connection.lock();

        let accepted = {
            let mut statement = connection.prepare_cached(GET_ENTRY_SQL)?;
            let mut rows = statement.query(params![key])?;
            let mut accepted = None;

            while let Some(row) = rows.next()? {
                let item = match read_cache_item(row) {
                    Ok(item) => item,
                    Err(DiskCacheError::CorruptRow { id, reason }) => {
                        warn!(key, id, reason = %reason, "Skipping unreadable cache row");
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                if predicate(&item) {
                    let id: i64 = row.get(0)?;
                    accepted = Some((id, item));
                    break;
                }
            }
            accepted
        };

        let Some((id, mut item)) = accepted else {
            return Ok(None);
        };

        let now = Utc::now();
        connection
            .prepare_cached(UPDATE_LAST_ACCESSED_TIME_SQL)?
            .execute(params![now.timestamp(), id])?;
        item.last_accessed_time = truncate_to_seconds(now);

        Ok(Some(item))
    }

    /// Store a completed exchange under `key`, expiring at `expiry_time`.
    ///
    /// Always inserts a new row; earlier rows for the same key are kept.
    ///
    /// # Errors
    ///
    /// [`DiskCacheError::MissingResponse`] if `request` has no response.
    pub fn store_response(
        &self,
        key: &str,
        expiry_time: DateTime<Utc>,
        request: &dyn AssetRequest,
    ) -> Result<(), DiskCacheError> {
        let response = request.response().ok_or(DiskCacheError::MissingResponse)?;

        let response_headers = serde_json::to_string(response.headers())?;
        let request_headers = serde_json::to_string(request.headers())?;
        let cache_control = response
            .cache_control()
            .map(ResponseCacheControl::to_persisted_string)
            .unwrap_or_default();

        let connection = self.connection.lock();
        connection.prepare_cached(STORE_RESPONSE_SQL)?.execute(params![
            expiry_time.timestamp(),
            Utc::now().timestamp(),
            response_headers,
            response.content_type(),
            i64::from(response.status_code()),
            cache_control,
            response.data(),
            request_headers,
            request.method(),
            request.url(),
            key,
        ])?;

        Ok(())
    }

    /// Bring the row count down to `max_items`.
    pub fn prune(&self) -> Result<PruneResult, DiskCacheError> {
        let start = Instant::now();
        let connection = self.connection.lock();

        let total_items: i64 = connection
            .prepare_cached(TOTAL_ITEMS_QUERY_SQL)?
            .query_row([], |row| row.get(0))?;
        let max_items = i64::try_from(self.max_items).unwrap_or(i64::MAX);
        if total_items <= max_items {
            return Ok(PruneResult::default());
        }

        let expired_removed = connection
            .prepare_cached(DELETE_EXPIRED_ITEMS_SQL)?
            .execute(params![Utc::now().timestamp()])?;

        let remaining = total_items - expired_removed as i64;
        let lru_removed = if remaining > max_items {
            connection
                .prepare_cached(DELETE_LRU_ITEMS_SQL)?
                .execute(params![remaining - max_items])?
        } else {
            0
        };

        let result = PruneResult {
            expired_removed,
            lru_removed,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        debug!(total_items, max_items, "{}", result);
        Ok(result)
    }

    /// Delete every row. Returns the number of rows removed.
    pub fn clear_all(&self) -> Result<usize, DiskCacheError> {
        let connection = self.connection.lock();
        let removed = connection.prepare_cached(CLEAR_ALL_SQL)?.execute([])?;
        info!(removed, "Disk cache cleared");
        Ok(removed)
    }

    /// Current number of rows.
    pub fn entry_count(&self) -> Result<u64, DiskCacheError> {
        let connection = self.connection.lock();
        let count: i64 = connection
            .prepare_cached(TOTAL_ITEMS_QUERY_SQL)?
            .query_row([], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

impl fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskCache")
            .field("path", &self.path)
            .field("max_items", &self.max_items)
            .finish_non_exhaustive()
    }
}

fn read_cache_item(row: &Row<'_>) -> Result<CacheItem, DiskCacheError> {
    let id: i64 = row.get(0)?;
    let corrupt = |reason: String| DiskCacheError::CorruptRow { id, reason };

    let expiry_time = timestamp_to_datetime(row.get(1)?)
        .ok_or_else(|| corrupt("expiry time out of range".to_string()))?;
    let last_accessed_time = timestamp_to_datetime(row.get(2)?)
        .ok_or_else(|| corrupt("last accessed time out of range".to_string()))?;

    let response_headers: HttpHeaders = serde_json::from_str(&row.get::<_, String>(3)?)
        .map_err(|e| corrupt(format!("response headers: {e}")))?;
    let content_type: String = row.get(4)?;
    let status_code = u16::try_from(row.get::<_, i64>(5)?)
        .map_err(|e| corrupt(format!("status code: {e}")))?;

    let persisted_cache_control: String = row.get(6)?;
    let cache_control = if persisted_cache_control.is_empty() {
        None
    } else {
        Some(
            ResponseCacheControl::from_persisted_str(&persisted_cache_control)
                .map_err(|e| corrupt(e.to_string()))?,
        )
    };

    let data: Option<Vec<u8>> = row.get(7)?;

    let request_headers: HttpHeaders = serde_json::from_str(&row.get::<_, String>(8)?)
        .map_err(|e| corrupt(format!("request headers: {e}")))?;

    Ok(CacheItem {
        expiry_time,
        last_accessed_time,
        request: CacheRequest {
            headers: request_headers,
            method: row.get(9)?,
            url: row.get(10)?,
        },
        response: CacheResponse {
            status_code,
            content_type,
            headers: response_headers,
            cache_control,
            data: data.unwrap_or_default(),
        },
    })
}

fn timestamp_to_datetime(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

fn truncate_to_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    timestamp_to_datetime(time.timestamp()).unwrap_or(time)
}
