//! SQLite registry of directory domains and the one-time setup secret
//!
//! Domain rows are immutable once created except for the active flag:
//! "deleting" a domain only clears `is_active`, so ids stay valid as
//! references forever. Passwords are ciphertext from the injected
//! [`CredentialCipher`]; plaintext never touches the database.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::info;

use crate::crypto::CredentialCipher;
use crate::errors::{DirectoryError, Result};

const ADMIN_KEY_SETTING: &str = "admin_key";

/// A configured directory domain.
#[derive(Debug, Clone, Serialize)]
pub struct Domain {
    pub id: i64,
    pub name: String,
    pub server: String,
    pub base_dn: String,
    pub username: String,
    /// Ciphertext; decrypted only by the connection broker.
    #[serde(skip_serializing)]
    pub password: String,
    pub is_active: bool,
}

/// Domain fields supplied at registration. The password arrives in
/// plaintext and is encrypted before it is persisted.
#[derive(Debug, Clone)]
pub struct NewDomain {
    pub name: String,
    pub server: String,
    pub base_dn: String,
    pub username: String,
    pub password: String,
}

/// Active-domain reference for the search UI's domain picker.
#[derive(Debug, Clone, Serialize)]
pub struct DomainRef {
    pub id: i64,
    pub name: String,
}

/// Admin-facing row view; everything except the credential.
#[derive(Debug, Clone, Serialize)]
pub struct DomainSummary {
    pub id: i64,
    pub name: String,
    pub server: String,
    pub base_dn: String,
    pub username: String,
    pub is_active: bool,
}

/// Persistent store of domain configurations and the setup secret.
pub struct DomainRegistry {
    conn: Arc<Mutex<Connection>>,
    cipher: Arc<CredentialCipher>,
}

impl DomainRegistry {
    /// Opens (or creates) the registry database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, cipher: Arc<CredentialCipher>) -> Result<Self> {
        info!("Opening domain registry at {:?}", path.as_ref());
        let conn = Connection::open(path)?;
        Self::from_connection(conn, cipher)
    }

    /// Builds a registry over an in-memory database. Test-only convenience;
    /// the schema and behavior are identical to the on-disk form.
    pub fn open_in_memory(cipher: Arc<CredentialCipher>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, cipher)
    }

    fn from_connection(conn: Connection, cipher: Arc<CredentialCipher>) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", "5000")?;

        let registry = Self {
            conn: Arc::new(Mutex::new(conn)),
            cipher,
        };
        registry.initialize_schema()?;
        Ok(registry)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS domains (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                server TEXT NOT NULL,
                base_dn TEXT NOT NULL,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                is_active INTEGER DEFAULT 1
            )",
            [],
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DirectoryError::Config(format!("Registry lock poisoned: {}", e)))
    }

    /// The cipher this registry encrypts with; the connection broker uses
    /// it for the single decrypt-and-bind step.
    pub fn cipher(&self) -> &CredentialCipher {
        &self.cipher
    }

    /// Registers a new domain, encrypting its password first.
    pub fn create(&self, domain: NewDomain) -> Result<i64> {
        for (field, value) in [
            ("name", &domain.name),
            ("server", &domain.server),
            ("base_dn", &domain.base_dn),
            ("username", &domain.username),
            ("password", &domain.password),
        ] {
            if value.trim().is_empty() {
                return Err(DirectoryError::Validation(format!(
                    "Missing required field: {}",
                    field
                )));
            }
        }

        let encrypted = self.cipher.encrypt(&domain.password)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO domains (name, server, base_dn, username, password)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                domain.name,
                domain.server,
                domain.base_dn,
                domain.username,
                encrypted
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!("Registered domain '{}' (id {})", domain.name, id);
        Ok(id)
    }

    /// Fetches a domain row by id.
    pub fn get(&self, id: i64) -> Result<Domain> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, server, base_dn, username, password, is_active
             FROM domains WHERE id = ?1",
            params![id],
            Self::row_to_domain,
        )
        .optional()?
        .ok_or_else(|| DirectoryError::NotFound(format!("domain {}", id)))
    }

    /// The first active domain, used when a request names none.
    pub fn first_active(&self) -> Result<Domain> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, server, base_dn, username, password, is_active
             FROM domains WHERE is_active = 1 ORDER BY id LIMIT 1",
            [],
            Self::row_to_domain,
        )
        .optional()?
        .ok_or(DirectoryError::NoActiveDomain)
    }

    /// Id/name pairs of every active domain.
    pub fn list_active(&self) -> Result<Vec<DomainRef>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, name FROM domains WHERE is_active = 1 ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(DomainRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// All rows, without credentials, for the admin surface.
    pub fn list_all(&self) -> Result<Vec<DomainSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, server, base_dn, username, is_active FROM domains ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DomainSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                server: row.get(2)?,
                base_dn: row.get(3)?,
                username: row.get(4)?,
                is_active: row.get::<_, i64>(5)? != 0,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Soft-deletes a domain. Idempotent: deactivating an already-inactive
    /// or absent id succeeds without complaint.
    pub fn deactivate(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("UPDATE domains SET is_active = 0 WHERE id = ?1", params![id])?;
        info!("Deactivated domain id {}", id);
        Ok(())
    }

    /// Whether the one-time setup secret exists.
    pub fn setup_status(&self) -> Result<bool> {
        Ok(self.admin_key()?.is_some())
    }

    /// Stores the admin key exactly once.
    pub fn complete_setup(&self, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(DirectoryError::Validation(
                "Admin key must not be empty".to_string(),
            ));
        }

        let conn = self.lock()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![ADMIN_KEY_SETTING],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(DirectoryError::AlreadySetup);
        }

        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)",
            params![ADMIN_KEY_SETTING, key],
        )?;
        info!("Setup completed; admin key stored");
        Ok(())
    }

    /// Compares a presented key against the stored secret in constant time.
    /// Returns `false` when setup has not run yet.
    pub fn verify_admin_key(&self, presented: &str) -> Result<bool> {
        let Some(stored) = self.admin_key()? else {
            return Ok(false);
        };
        Ok(stored.as_bytes().ct_eq(presented.as_bytes()).into())
    }

    fn admin_key(&self) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![ADMIN_KEY_SETTING],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    fn row_to_domain(row: &rusqlite::Row<'_>) -> rusqlite::Result<Domain> {
        Ok(Domain {
            id: row.get(0)?,
            name: row.get(1)?,
            server: row.get(2)?,
            base_dn: row.get(3)?,
            username: row.get(4)?,
            password: row.get(5)?,
            is_active: row.get::<_, i64>(6)? != 0,
        })
    }
}
