//! Multi-domain Active Directory search core
//!
//! Queries configured directory domains for users and groups and returns
//! normalized records instead of raw LDAP entries. The pipeline for one
//! request: escape and compile the query into a filter ([`filters`]),
//! broker an authenticated connection for the target domain
//! ([`connection`]), drive the paged search to exhaustion
//! ([`paged_search`]), and convert entries into canonical records
//! ([`records`]).
//!
//! Domain configurations live in a SQLite registry ([`database`]) with
//! bind passwords encrypted at rest ([`crypto`]); the cipher key arrives
//! from the environment at startup ([`config`]) and its absence is fatal.
//! HTTP routing, auth middleware, and caching live in the embedding
//! service, which consumes [`search::DirectoryService`].

pub mod config;
pub mod connection;
pub mod crypto;
pub mod database;
pub mod entry;
pub mod errors;
pub mod filters;
pub mod paged_search;
pub mod records;
pub mod search;
pub mod secure_types;

pub use config::Settings;
pub use crypto::CredentialCipher;
pub use database::{Domain, DomainRef, DomainRegistry, DomainSummary, NewDomain};
pub use errors::{DirectoryError, Result};
pub use filters::{SearchKind, SearchRequest};
pub use records::{Group, GroupKind, Record, User};
pub use search::{DirectoryService, SearchResponse};
