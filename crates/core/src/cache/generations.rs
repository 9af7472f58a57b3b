//! Generation lifecycle: open, enumerate, delete.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// Handle to an opened cache generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Generation {
    name: String,
}

impl Generation {
    /// Handle to a generation by name, without creating it.
    ///
    /// Lookups against a generation that does not exist find nothing, and
    /// writes to it fail.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CacheDb {
    /// Open a generation, creating it if absent. Idempotent.
    pub async fn open_generation(&self, name: &str) -> Result<Generation, Error> {
        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let inserted = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let n = conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(n)
            })
            .await
            .map_err(Error::from)?;

        if inserted > 0 {
            tracing::debug!(generation = name, "created cache generation");
        }

        Ok(Generation::new(name))
    }

    /// Names of every generation, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and, via cascade, all of its entries.
    ///
    /// Returns whether a generation with that name existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let n = conn.execute("DELETE FROM generations WHERE name = ?1", params![owned])?;
                Ok(n > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn generation_exists(&self, name: &str) -> Result<bool, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![owned],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }
}
