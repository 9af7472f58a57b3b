//! Entry operations within a generation.
//!
//! Provides lookup, upsert, and bulk (transactional) upsert of response
//! snapshots keyed by [`RequestKey`].

use super::connection::CacheDb;
use super::generations::Generation;
use super::key::RequestKey;
use crate::Error;
use crate::resource::{ResponseKind, ResponseSnapshot};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

const UPSERT_ENTRY: &str = "INSERT INTO entries (
        generation, key_hash, method, url, response_url, status, status_text,
        kind, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(generation, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        response_url = excluded.response_url,
        status = excluded.status,
        status_text = excluded.status_text,
        kind = excluded.kind,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

/// Listing row for an entry, without its body.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntrySummary {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub size: usize,
    pub stored_at: String,
}

/// Row ready to be bound to [`UPSERT_ENTRY`].
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    response_url: String,
    status: u16,
    status_text: String,
    kind: &'static str,
    headers_json: String,
    body: Bytes,
}

impl EntryRow {
    fn new(key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<Self, Error> {
        let headers_json =
            serde_json::to_string(&snapshot.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Self {
            key_hash: key.hash().to_string(),
            method: key.method().as_str().to_string(),
            url: key.url().to_string(),
            response_url: snapshot.url.clone(),
            status: snapshot.status,
            status_text: snapshot.status_text.clone(),
            kind: snapshot.kind.as_str(),
            headers_json,
            body: snapshot.body.clone(),
        })
    }

    fn upsert(&self, conn: &rusqlite::Connection, generation: &str, stored_at: &str) -> Result<(), Error> {
        conn.execute(
            UPSERT_ENTRY,
            params![
                generation,
                &self.key_hash,
                &self.method,
                &self.url,
                &self.response_url,
                self.status,
                &self.status_text,
                self.kind,
                &self.headers_json,
                self.body.as_ref(),
                stored_at,
            ],
        )?;
        Ok(())
    }
}

impl CacheDb {
    /// Look up the snapshot stored for `key` in `generation`.
    pub async fn match_entry(
        &self, generation: &Generation, key: &RequestKey,
    ) -> Result<Option<ResponseSnapshot>, Error> {
        let generation = generation.name().to_string();
        let key_hash = key.hash().to_string();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT response_url, status, status_text, kind, headers_json, body
                     FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let row = stmt.query_row(params![generation, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                    ))
                });

                let (url, status, status_text, kind, headers_json, body) = match row {
                    Ok(r) => r,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let headers: Vec<(String, String)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;

                Ok(Some(ResponseSnapshot {
                    url,
                    status,
                    status_text,
                    kind: kind.parse::<ResponseKind>()?,
                    headers,
                    body: Bytes::from(body),
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// Store `snapshot` under `key`, replacing any existing entry.
    pub async fn put_entry(
        &self, generation: &Generation, key: &RequestKey, snapshot: &ResponseSnapshot,
    ) -> Result<(), Error> {
        let generation = generation.name().to_string();
        let row = EntryRow::new(key, snapshot)?;
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> { row.upsert(conn, &generation, &stored_at) })
            .await
            .map_err(Error::from)
    }

    /// Store every entry in one transaction: all are written or none are.
    pub async fn put_entries(
        &self, generation: &Generation, entries: &[(RequestKey, ResponseSnapshot)],
    ) -> Result<(), Error> {
        let generation = generation.name().to_string();
        let rows = entries
            .iter()
            .map(|(key, snapshot)| EntryRow::new(key, snapshot))
            .collect::<Result<Vec<_>, _>>()?;
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for row in &rows {
                    row.upsert(&tx, &generation, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held by a generation.
    pub async fn count_entries(&self, generation: &Generation) -> Result<u64, Error> {
        let generation = generation.name().to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Entries of a generation, ordered by URL.
    pub async fn list_entries(&self, generation: &Generation) -> Result<Vec<EntrySummary>, Error> {
        let generation = generation.name().to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntrySummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, LENGTH(body), stored_at
                     FROM entries WHERE generation = ?1 ORDER BY url ASC, method ASC",
                )?;
                let rows = stmt
                    .query_map(params![generation], |row| {
                        Ok(EntrySummary {
                            method: row.get(0)?,
                            url: row.get(1)?,
                            status: row.get(2)?,
                            size: row.get::<_, i64>(3)? as usize,
                            stored_at: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }
}
