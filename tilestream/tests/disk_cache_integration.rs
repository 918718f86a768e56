//! Disk cache behaviour against a real on-disk database.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rusqlite::{params, Connection};
use tempfile::TempDir;
use tilestream::cache::{DiskCache, ResponseCacheControl};
use tilestream::http::{HttpHeaders, SimpleAssetRequest, SimpleAssetResponse};

fn tile_request(url: &str, body: &[u8], cache_control: &str) -> SimpleAssetRequest {
    let mut headers = HttpHeaders::new();
    headers.insert("Cache-Control".to_string(), cache_control.to_string());
    headers.insert("Content-Type".to_string(), "image/jpeg".to_string());

    SimpleAssetRequest::get(url).with_response(SimpleAssetResponse::new(
        200,
        "image/jpeg",
        headers,
        body.to_vec(),
    ))
}

fn database(temp: &TempDir) -> std::path::PathBuf {
    temp.path().join("cache.sqlite")
}

/// Force `lastAccessedTime` for a URL from a second connection.
fn set_last_accessed(path: &std::path::Path, url: &str, seconds: i64) {
    let connection = Connection::open(path).unwrap();
    connection
        .execute(
            "UPDATE CacheItemTable SET lastAccessedTime = ?1 WHERE requestUrl = ?2",
            params![seconds, url],
        )
        .unwrap();
}

#[test]
fn test_round_trip_preserves_exchange() {
    let temp = TempDir::new().unwrap();
    let cache = DiskCache::open(database(&temp), 100).unwrap();
    let request = tile_request(
        "https://imagery.example.com/3/2/1.jpg",
        &[0xFF, 0xD8, 0xFF, 0xE0],
        "max-age=3600, must-revalidate, public",
    );

    cache
        .store_response("3/2/1", Utc::now() + Duration::hours(1), &request)
        .unwrap();
    let item = cache.get_entry("3/2/1", |_| true).unwrap().unwrap();

    assert_eq!(item.request.url, "https://imagery.example.com/3/2/1.jpg");
    assert_eq!(item.request.method, "GET");
    assert_eq!(item.response.status_code, 200);
    assert_eq!(item.response.content_type, "image/jpeg");
    assert_eq!(item.response.data, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    assert_eq!(item.response.headers.get("Content-Type").unwrap(), "image/jpeg");
    assert_eq!(
        item.response.cache_control,
        Some(ResponseCacheControl::new(true, false, false, false, true, false, false, 3600, 0))
    );
}

#[test]
fn test_schema_matches_persisted_layout() {
    let temp = TempDir::new().unwrap();
    let path = database(&temp);
    let cache = DiskCache::open(&path, 100).unwrap();
    cache
        .store_response("k", Utc::now() + Duration::hours(1), &tile_request("https://a/k", b"x", "max-age=5"))
        .unwrap();

    let connection = Connection::open(&path).unwrap();
    let columns: Vec<String> = connection
        .prepare("SELECT name FROM pragma_table_info('CacheItemTable') ORDER BY cid")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        columns,
        vec![
            "id",
            "expiryTime",
            "lastAccessedTime",
            "responseHeaders",
            "responseContentType",
            "responseStatusCode",
            "responseCacheControl",
            "responseData",
            "requestHeader",
            "requestMethod",
            "requestUrl",
            "key"
        ]
    );

    let index: String = connection
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'CacheItemTable'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(index, "key_index");

    let journal_mode: String = connection
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal_mode.to_lowercase(), "wal");

    let persisted: String = connection
        .query_row("SELECT responseCacheControl FROM CacheItemTable", [], |row| row.get(0))
        .unwrap();
    assert!(persisted.contains("\"maxAge\":5"));
}

#[test]
fn test_eviction_keeps_most_recently_accessed() {
    let temp = TempDir::new().unwrap();
    let path = database(&temp);
    let n = 4;
    let m = 3;
    let cache = DiskCache::open(&path, n).unwrap();

    for i in 0..(n + m) {
        let url = format!("https://a/{i}");
        cache
            .store_response(&url, Utc::now() + Duration::hours(1), &tile_request(&url, b"x", "max-age=60"))
            .unwrap();
        // Later inserts are more recent.
        set_last_accessed(&path, &url, 1_000 + i as i64);
    }

    let result = cache.prune().unwrap();

    assert_eq!(result.expired_removed, 0);
    assert_eq!(result.lru_removed, m as usize);
    assert_eq!(cache.entry_count().unwrap(), n);
    for i in 0..m {
        assert!(cache.get_entry(&format!("https://a/{i}"), |_| true).unwrap().is_none());
    }
    for i in m..(n + m) {
        assert!(cache.get_entry(&format!("https://a/{i}"), |_| true).unwrap().is_some());
    }
}

#[test]
fn test_expired_rows_are_evicted_before_live_rows() {
    let temp = TempDir::new().unwrap();
    let path = database(&temp);
    let cache = DiskCache::open(&path, 3).unwrap();

    for i in 0..3 {
        let url = format!("https://a/live-{i}");
        cache
            .store_response(&url, Utc::now() + Duration::hours(1), &tile_request(&url, b"x", "max-age=60"))
            .unwrap();
        set_last_accessed(&path, &url, 100);
    }
    for i in 0..2 {
        let url = format!("https://a/expired-{i}");
        cache
            .store_response(&url, Utc::now() - Duration::hours(1), &tile_request(&url, b"x", "max-age=60"))
            .unwrap();
        set_last_accessed(&path, &url, 9_999_999_999);
    }

    let result = cache.prune().unwrap();

    assert_eq!(result.expired_removed, 2);
    assert_eq!(result.lru_removed, 0);
    for i in 0..3 {
        assert!(cache
            .get_entry(&format!("https://a/live-{i}"), |_| true)
            .unwrap()
            .is_some());
    }
}

#[test]
fn test_rows_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let path = database(&temp);
    {
        let cache = DiskCache::open(&path, 10).unwrap();
        cache
            .store_response("k", Utc::now() + Duration::hours(1), &tile_request("https://a/k", b"persisted", "max-age=60"))
            .unwrap();
    }

    let cache = DiskCache::open(&path, 10).unwrap();
    assert_eq!(cache.entry_count().unwrap(), 1);
    let item = cache.get_entry("k", |_| true).unwrap().unwrap();
    assert_eq!(item.response.data, b"persisted");
}

#[test]
fn test_concurrent_access_from_worker_threads() {
    let temp = TempDir::new().unwrap();
    let cache = Arc::new(DiskCache::open(database(&temp), 10_000).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let url = format!("https://a/{worker}/{i}");
                    let request = tile_request(&url, url.as_bytes(), "max-age=60");
                    cache
                        .store_response(&url, Utc::now() + Duration::hours(1), &request)
                        .unwrap();
                    let item = cache.get_entry(&url, |_| true).unwrap().unwrap();
                    assert_eq!(item.response.data, url.as_bytes());
                    if i % 10 == 0 {
                        cache.prune().unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.entry_count().unwrap(), 400);
}
