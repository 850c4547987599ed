use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::Result;

pub const K_USERS: &str = "users";
pub const K_SESSION: &str = "loggedInUser";
pub const K_JOBS: &str = "jobs";
pub const K_CUSTOMERS: &str = "customers";
pub const K_SETTINGS: &str = "appSettings";
pub const K_CONVERSATIONS: &str = "conversations";
pub const K_NOTIFICATIONS: &str = "notifications";
pub const K_FORUM_CATEGORIES: &str = "forum_categories";
pub const K_FORUM_THREADS: &str = "forum_threads";
pub const K_FORUM_POSTS: &str = "forum_posts";

pub fn favorites_key(user_id: &str) -> String {
    format!("favorites_{user_id}")
}

/// Flat key/value substrate: one SQLite table, one JSON blob per domain
/// collection. Every store reads its collection whole, mutates it in memory
/// and writes it back whole — last write wins.
pub struct KvStore {
    conn: Connection,
    path: PathBuf,
}

impl KvStore {
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::default_path())
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            path: path.to_path_buf(),
        };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "servicehub") {
            proj_dirs.data_dir().join("servicehub.db")
        } else {
            PathBuf::from("servicehub.db")
        }
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Missing key -> None. Malformed stored JSON -> None as well: the
    /// caller substitutes its empty/seed default and the bad blob is
    /// overwritten on the next write.
    pub fn get(&self, key: &str) -> Option<Value> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .ok();
        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                eprintln!("discarding corrupt entry '{key}': {e}");
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, raw],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    /// Typed read with the same silent-recovery policy: a blob that no
    /// longer matches the expected shape counts as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                eprintln!("discarding malformed entry '{key}': {e}");
                None
            }
        }
    }

    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, &serde_json::to_value(value)?)
    }
}

#[cfg(test)]
pub mod testutil {
    use super::KvStore;
    use tempfile::TempDir;

    pub fn temp_store() -> (TempDir, KvStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = KvStore::open_at(&dir.path().join("test.db")).expect("open store");
        (dir, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_key_is_none() {
        let (_dir, kv) = testutil::temp_store();
        assert!(kv.get("nope").is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let (_dir, kv) = testutil::temp_store();
        let v = json!({"a": 1, "b": ["x", "y"]});
        kv.set("blob", &v).unwrap();
        assert_eq!(kv.get("blob"), Some(v));
    }

    #[test]
    fn overwrite_replaces_whole_blob() {
        let (_dir, kv) = testutil::temp_store();
        kv.set("k", &json!([1, 2, 3])).unwrap();
        kv.set("k", &json!([4])).unwrap();
        assert_eq!(kv.get("k"), Some(json!([4])));
    }

    #[test]
    fn corrupt_json_recovers_as_absent() {
        let (_dir, kv) = testutil::temp_store();
        kv.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES ('bad', '{not json')",
                [],
            )
            .unwrap();
        assert!(kv.get("bad").is_none());
    }

    #[test]
    fn shape_mismatch_recovers_as_absent() {
        let (_dir, kv) = testutil::temp_store();
        kv.set("users", &json!({"not": "an array"})).unwrap();
        let parsed: Option<Vec<crate::models::User>> = kv.get_as("users");
        assert!(parsed.is_none());
    }

    #[test]
    fn reopen_sees_previous_writes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        {
            let kv = KvStore::open_at(&path).unwrap();
            kv.set("k", &json!("persisted")).unwrap();
        }
        let kv = KvStore::open_at(&path).unwrap();
        assert_eq!(kv.get("k"), Some(json!("persisted")));
    }
}
