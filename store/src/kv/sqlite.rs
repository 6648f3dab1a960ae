use std::path::Path;
use std::path::PathBuf;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use super::*;
use crate::error::QuotaScope;

fn init_db(conn: &Connection) -> Result<(), KvError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn open_conn(path: &Path) -> Result<Connection, KvError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

fn used_bytes(conn: &Connection) -> Result<usize, KvError> {
    let used: i64 = conn.query_row(
        "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv",
        [],
        |r| r.get(0),
    )?;
    Ok(usize::try_from(used).unwrap_or_default())
}

/// Bulk backend: a SQLite `kv` table with a single total quota. Each
/// operation opens its own connection.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
    quota: usize,
}

impl SqliteBackend {
    pub fn new<P: AsRef<Path>>(path: P, quota: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            quota,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvBackend for SqliteBackend {
    fn backend(&self) -> Backend {
        Backend::Bulk
    }

    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, KvError> {
        let conn = open_conn(&self.path)?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut out = Map::new();
        for key in keys {
            let raw: Option<String> = stmt
                .query_row(params![key], |r| r.get(0))
                .optional()?;
            if let Some(raw) = raw {
                out.insert((*key).to_string(), serde_json::from_str(&raw)?);
            }
        }
        Ok(out)
    }

    fn set(&self, entries: Map<String, Value>) -> Result<(), KvError> {
        let mut conn = open_conn(&self.path)?;
        let tx = conn.transaction()?;
        for (key, value) in &entries {
            let encoded = serde_json::to_string(value)?;
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, encoded],
            )?;
        }
        let used = used_bytes(&tx)?;
        if used > self.quota {
            tx.rollback()?;
            return Err(KvError::QuotaExceeded {
                backend: Backend::Bulk,
                scope: QuotaScope::Total,
                needed: used,
                limit: self.quota,
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), KvError> {
        let mut conn = open_conn(&self.path)?;
        let tx = conn.transaction()?;
        for key in keys {
            tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn bytes_in_use(&self) -> Result<usize, KvError> {
        let conn = open_conn(&self.path)?;
        used_bytes(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_round_trip_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let kv = SqliteBackend::new(dir.path().join("local.sqlite"), 1 << 20);
        let mut entries = Map::new();
        entries.insert("prompts".into(), json!([{"id": "a"}]));
        entries.insert("storageType".into(), json!("local"));
        kv.set(entries).unwrap();

        let got = kv.get(&["prompts", "storageType", "tags"]).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["storageType"], json!("local"));

        kv.remove(&["prompts"]).unwrap();
        assert!(kv.get(&["prompts"]).unwrap().is_empty());
    }

    #[test]
    fn over_quota_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let kv = SqliteBackend::new(dir.path().join("local.sqlite"), 64);
        let mut small = Map::new();
        small.insert("a".into(), json!("old"));
        kv.set(small).unwrap();

        let mut big = Map::new();
        big.insert("a".into(), json!("new"));
        big.insert("b".into(), json!("x".repeat(200)));
        let err = kv.set(big).unwrap_err();
        assert!(err.is_quota());
        assert_eq!(kv.get(&["a"]).unwrap()["a"], json!("old"));
        assert!(kv.get(&["b"]).unwrap().is_empty());
    }
}
