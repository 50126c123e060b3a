//! Database module for the server browser
//! Handles SQLite storage for favorite servers and key/value settings

use crate::error::Result;
use crate::favorites::{FavoritesSet, FavoritesStore};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        debug!(path = %path.display(), "Database opened");
        Ok(db)
    }

    /// In-memory database, nothing survives the process
    pub fn open_in_memory() -> Result<Self> {
        let db = Self { conn: Connection::open_in_memory()? };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS favorites (
                guid TEXT PRIMARY KEY,
                added_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// When a server was favorited, if it is one
    pub fn favorite_added_at(&self, guid: &str) -> Result<Option<DateTime<Utc>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT added_at FROM favorites WHERE guid = ?1")?;
        let mut rows = stmt.query(params![guid])?;

        if let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            Ok(DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|t| t.with_timezone(&Utc)))
        } else {
            Ok(None)
        }
    }

    /// Get a setting value
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;

        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    /// Set a setting value
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

impl FavoritesStore for Database {
    fn load_favorites(&self) -> Result<FavoritesSet> {
        let mut stmt = self.conn.prepare("SELECT guid FROM favorites")?;
        let guids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<FavoritesSet>>()?;
        debug!(count = guids.len(), "Favorites loaded");
        Ok(guids)
    }

    fn add_favorite(&self, guid: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO favorites (guid, added_at) VALUES (?1, ?2)
             ON CONFLICT(guid) DO NOTHING",
            params![guid, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_favorite(&self, guid: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM favorites WHERE guid = ?1", params![guid])?;
        Ok(())
    }
}
