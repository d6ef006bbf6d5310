//! SQLite-based block storage.
//!
//! Provides persistent storage for:
//! - Blocks, one row per (user, date, block index) with a JSON payload
//! - Key-value store for application state (the serialized tracker)

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use super::{data_dir, BlockStore};
use crate::block::Block;
use crate::error::{DatabaseError, Result};

/// SQLite database for block storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/dayblocks.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("dayblocks.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blocks (
                user_id     TEXT NOT NULL,
                date        TEXT NOT NULL,
                block_index INTEGER NOT NULL,
                payload     TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, date, block_index)
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_blocks_user_date ON blocks(user_id, date);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn decode(key: String, payload: &str) -> Result<Block> {
    serde_json::from_str(payload).map_err(|e| {
        DatabaseError::CorruptPayload {
            key,
            message: e.to_string(),
        }
        .into()
    })
}

impl BlockStore for Database {
    fn upsert(&self, block: &Block) -> Result<()> {
        let payload = serde_json::to_string(block)?;
        self.conn.execute(
            "INSERT INTO blocks (user_id, date, block_index, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, date, block_index)
             DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            params![
                block.user_id,
                block.date.to_string(),
                block.block_index,
                payload,
                Utc::now().to_rfc3339(),
            ],
        )?;
        debug!(
            date = %block.date,
            block_index = block.block_index,
            "block upserted"
        );
        Ok(())
    }

    fn fetch_day(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Block>> {
        let mut stmt = self.conn.prepare(
            "SELECT block_index, payload FROM blocks
             WHERE user_id = ?1 AND date = ?2
             ORDER BY block_index",
        )?;
        let rows = stmt.query_map(params![user_id, date.to_string()], |row| {
            Ok((row.get::<_, u8>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut blocks = Vec::new();
        for row in rows {
            let (index, payload) = row?;
            blocks.push(decode(format!("{user_id}/{date}/{index}"), &payload)?);
        }
        Ok(blocks)
    }

    fn fetch_block(&self, user_id: &str, date: NaiveDate, block_index: u8) -> Result<Option<Block>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM blocks
             WHERE user_id = ?1 AND date = ?2 AND block_index = ?3",
        )?;
        let result = stmt.query_row(params![user_id, date.to_string(), block_index], |row| {
            row.get::<_, String>(0)
        });
        match result {
            Ok(payload) => Ok(Some(decode(
                format!("{user_id}/{date}/{block_index}"),
                &payload,
            )?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
