//! Entry reads and writes for the SQLite store.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::store::ensure_stamped;
use super::{CacheEntry, CacheKey, CacheStore};
use crate::Error;

/// Row shape as stored: (status_code, headers_json, body, stored_at).
type EntryRow = (i64, String, Vec<u8>, Option<String>);

fn encode_headers(headers: &HeaderMap) -> Result<String, Error> {
    let pairs: Vec<(&str, String)> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect();
    Ok(serde_json::to_string(&pairs)?)
}

fn decode_headers(json: &str) -> Result<HeaderMap, Error> {
    let pairs: Vec<(String, String)> = serde_json::from_str(json)?;
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "skipping undecodable stored header"),
        }
    }
    Ok(headers)
}

/// Parse a stored timestamp. Anything unparseable yields `None`.
fn decode_stored_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn decode_row((status, headers_json, body, stored_at): EntryRow) -> Result<CacheEntry, Error> {
    let status = u16::try_from(status)
        .ok()
        .and_then(|s| StatusCode::from_u16(s).ok())
        .ok_or_else(|| Error::Serialization(format!("invalid stored status code {status}")))?;

    Ok(CacheEntry {
        status,
        headers: decode_headers(&headers_json)?,
        body: body.into(),
        stored_at: decode_stored_at(stored_at.as_deref()),
    })
}

impl CacheDb {
    /// Get an entry by key.
    ///
    /// Returns None if the key has never been stored.
    pub async fn get_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, Error> {
        let key_hash = key.digest();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn
                    .prepare("SELECT status_code, headers_json, body, stored_at FROM entries WHERE key_hash = ?1")?;

                let result =
                    stmt.query_row(params![key_hash], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)));

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(decode_row).transpose()
    }

    /// Insert or replace the entry for a key.
    ///
    /// Uses UPSERT semantics so concurrent writers resolve by last-write-wins.
    pub async fn upsert_entry(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), Error> {
        let key_hash = key.digest();
        let cache_key = key.as_str().to_string();
        let status = i64::from(entry.status.as_u16());
        let headers_json = encode_headers(&entry.headers)?;
        let body = entry.body.to_vec();
        let stored_at = entry
            .stored_at
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true));

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (key_hash, cache_key, status_code, headers_json, body, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(key_hash) DO UPDATE SET
                        cache_key = excluded.cache_key,
                        status_code = excluded.status_code,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![key_hash, cache_key, status, headers_json, body, stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    #[cfg(test)]
    async fn entry_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count.max(0) as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStore for CacheDb {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, Error> {
        self.get_entry(key).await
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), Error> {
        self.upsert_entry(key, &ensure_stamped(entry)).await
    }
}
