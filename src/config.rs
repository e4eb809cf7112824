//! Environment-backed settings
//!
//! The process that embeds this crate loads a `.env` file (if present) and
//! supplies the SQLite path and the credential-cipher key. A missing or
//! malformed key is a startup failure: encrypted rows would be unreadable
//! under any other key, so refusing to start is the only safe response.

use std::env;
use std::path::PathBuf;

use crate::errors::{DirectoryError, Result};

/// Environment variable holding the base64-encoded 32-byte AES key.
pub const KEY_VAR: &str = "AD_DIRECTORY_KEY";

/// Environment variable holding the SQLite database path.
pub const DB_VAR: &str = "AD_DIRECTORY_DB";

const DEFAULT_DB_PATH: &str = "ad_config.db";

/// Resolved settings for constructing the registry and cipher.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub cipher_key_b64: String,
}

impl Settings {
    /// Reads settings from the environment, honoring a `.env` file.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let cipher_key_b64 = env::var(KEY_VAR).map_err(|_| {
            DirectoryError::Config(format!(
                "{} is not set; refusing to start without the credential key",
                KEY_VAR
            ))
        })?;

        let database_path = env::var(DB_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH));

        Ok(Self {
            database_path,
            cipher_key_b64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test so they
    // cannot race each other under the parallel test runner.
    #[test]
    fn test_from_env() {
        env::remove_var(KEY_VAR);
        env::remove_var(DB_VAR);
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, DirectoryError::Config(_)));

        env::set_var(KEY_VAR, "c2VjcmV0LWtleQ==");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.cipher_key_b64, "c2VjcmV0LWtleQ==");
        assert_eq!(settings.database_path, PathBuf::from(DEFAULT_DB_PATH));

        env::set_var(DB_VAR, "/var/lib/ad-directory/registry.db");
        let settings = Settings::from_env().unwrap();
        assert_eq!(
            settings.database_path,
            PathBuf::from("/var/lib/ad-directory/registry.db")
        );

        env::remove_var(KEY_VAR);
        env::remove_var(DB_VAR);
    }
}
