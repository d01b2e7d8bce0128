//! SQLite-backed credential store.
//!
//! One table, `users(id, username UNIQUE, name, password_hash)`. Every operation
//! opens its own connection and closes it on return; nothing is batched.
//!
//! Passwords are hashed with a single unsalted SHA-256 round and stored as
//! lowercase hex. This matches existing `users.db` files but is not a
//! security-grade password scheme.

use crate::error::{DashboardError, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the credential database inside the config directory.
pub const DEFAULT_DB_FILE: &str = "users.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub password_hash: String,
}

/// Hex-encoded SHA-256 of the password bytes.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    db_path: PathBuf,
}

impl CredentialStore {
    /// Open the store at `db_path`, creating the file and `users` table if absent.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self { db_path };
        store.init_schema()?;
        info!(path = %store.db_path.display(), "credential store ready");
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(())
    }

    /// Insert a record with an already-hashed password.
    /// A uniqueness violation on `username` surfaces as `DuplicateUsername`.
    pub fn insert(&self, username: &str, name: &str, password_hash: &str) -> Result<()> {
        let conn = self.connect()?;
        let result = conn.execute(
            "INSERT INTO users (username, name, password_hash) VALUES (?1, ?2, ?3)",
            params![username, name, password_hash],
        );
        match result {
            Ok(_) => {
                debug!(username, "user record inserted");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(DashboardError::DuplicateUsername(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find the record matching both username and password hash. At most one row matches.
    pub fn lookup(&self, username: &str, password_hash: &str) -> Result<Option<CredentialRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                "SELECT id, username, name, password_hash FROM users \
                 WHERE username = ?1 AND password_hash = ?2",
                params![username, password_hash],
                |row| {
                    Ok(CredentialRecord {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        name: row.get(2)?,
                        password_hash: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Hash `password` and create the account.
    pub fn register(&self, username: &str, name: &str, password: &str) -> Result<()> {
        self.insert(username, name, &hash_password(password))
    }

    /// Hash `password` and check it against the stored record.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<CredentialRecord>> {
        self.lookup(username, &hash_password(password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, CredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(dir.path().join("users.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn hash_matches_known_sha256() {
        assert_eq!(
            hash_password("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
        assert_eq!(hash_password("").len(), 64);
    }

    #[test]
    fn register_then_authenticate() {
        let (_dir, store) = temp_store();
        store.register("alice", "Alice Smith", "s3cret").unwrap();

        let record = store.authenticate("alice", "s3cret").unwrap().unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.name, "Alice Smith");
        assert_eq!(record.password_hash, hash_password("s3cret"));

        assert!(store.authenticate("alice", "wrong").unwrap().is_none());
        assert!(store.authenticate("bob", "s3cret").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected_and_original_kept() {
        let (_dir, store) = temp_store();
        store.register("alice", "Alice", "first").unwrap();
        let err = store.register("alice", "Other Alice", "second").unwrap_err();
        assert!(matches!(err, DashboardError::DuplicateUsername(ref u) if u == "alice"));

        let record = store.lookup("alice", &hash_password("first")).unwrap();
        assert_eq!(record.map(|r| r.name), Some("Alice".to_string()));
        assert!(store.authenticate("alice", "second").unwrap().is_none());
    }

    #[test]
    fn reopening_keeps_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("users.db");
        CredentialStore::open(&path)
            .unwrap()
            .register("carol", "Carol", "pw")
            .unwrap();
        let reopened = CredentialStore::open(&path).unwrap();
        assert!(reopened.authenticate("carol", "pw").unwrap().is_some());
    }
}
