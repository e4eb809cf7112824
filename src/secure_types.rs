//! Secure credential containers
//!
//! Decrypted bind passwords pass through these types so the plaintext is
//! zeroed from memory as soon as the bind call returns. Debug and Display
//! output is redacted.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string that zeros its contents when dropped.
///
/// Holds a decrypted bind password for the duration of a single bind call.
/// Invariant: constructed only from valid UTF-8.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: Vec<u8>,
}

impl SecureString {
    pub fn new(s: String) -> Self {
        Self {
            inner: s.into_bytes(),
        }
    }

    /// Temporarily exposes the secret. The returned reference must not be
    /// stored or copied beyond the immediate call.
    pub fn expose_secret(&self) -> &str {
        std::str::from_utf8(&self.inner)
            .expect("SecureString invariant violated: contains invalid UTF-8")
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Bind credentials with automatic password cleanup on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BindCredentials {
    username: String,
    password: SecureString,
}

impl BindCredentials {
    pub fn new(username: String, password: SecureString) -> Self {
        Self { username, password }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl fmt::Debug for BindCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
