//! Error handling module
//!
//! Every directory/network failure is converted into one of these variants
//! at the connection and search boundaries; raw `ldap3` errors never cross
//! a component boundary. The HTTP layer maps `Validation` to 4xx,
//! `NotFound`/`NoActiveDomain` to 404, and the connectivity/search variants
//! to 5xx responses.

use thiserror::Error;

/// Main error type for directory operations
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// Malformed admin input (missing required fields, bad key encoding)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Referential lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// No domain is configured, or the requested domain is inactive
    #[error("No active domain is configured")]
    NoActiveDomain,

    /// One-time setup was already completed
    #[error("Setup has already been completed")]
    AlreadySetup,

    /// Directory rejected the bind credentials
    #[error("Directory bind failed: {0}")]
    BindFailed(String),

    /// Transport-level failure: unreachable server, TLS, timeout
    #[error("Directory connection failed: {0}")]
    ConnectFailed(String),

    /// Stored ciphertext could not be decrypted (tampering or key mismatch)
    #[error("Credential decryption failed: {0}")]
    Decryption(String),

    /// Protocol-level failure mid-search
    #[error("Directory search failed: {0}")]
    Search(String),

    /// Configuration error (missing or malformed environment)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying SQLite failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl From<ldap3::LdapError> for DirectoryError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => {
                match result.rc {
                    // 49 = invalidCredentials
                    49 => DirectoryError::BindFailed(format!(
                        "Invalid credentials: {}",
                        result.text
                    )),
                    // 51 = busy, 52 = unavailable
                    51 | 52 => DirectoryError::ConnectFailed(format!(
                        "Server unavailable: {}",
                        result.text
                    )),
                    _ => DirectoryError::Search(format!(
                        "LDAP error code {}: {}",
                        result.rc, result.text
                    )),
                }
            }
            ldap3::LdapError::EndOfStream => {
                DirectoryError::ConnectFailed("Connection closed unexpectedly".to_string())
            }
            ldap3::LdapError::Io { source } => {
                DirectoryError::ConnectFailed(format!("I/O error: {}", source))
            }
            ldap3::LdapError::Timeout { elapsed: _ } => {
                DirectoryError::ConnectFailed("LDAP operation timed out".to_string())
            }
            _ => DirectoryError::Search(format!("LDAP error: {}", err)),
        }
    }
}

/// Result type alias for directory operations
pub type Result<T> = std::result::Result<T, DirectoryError>;
