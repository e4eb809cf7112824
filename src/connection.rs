//! Connection brokering
//!
//! Resolves the target domain, decrypts its bind credential, and produces
//! an authenticated connection. The blocking `ldap3::LdapConn` calls are
//! wrapped in `spawn_blocking` with timeouts so an unreachable server can
//! never hang the runtime. The decrypted password lives only inside the
//! bind call's zeroizing container.

use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::database::{Domain, DomainRegistry};
use crate::errors::{DirectoryError, Result};
use crate::secure_types::BindCredentials;

/// Connection and bind deadline.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// An authenticated directory connection and the base DN to search under.
///
/// The holder owns the connection; the search executor consumes it and
/// unbinds on every exit path.
pub struct BoundConnection {
    pub conn: LdapConn,
    pub base_dn: String,
}

/// Resolves the domain row for a request: an explicit id must exist and be
/// active; otherwise the first active domain is used. A deactivated or
/// unknown id behaves identically: `NoActiveDomain`.
pub(crate) fn resolve_domain(
    registry: &DomainRegistry,
    domain_id: Option<i64>,
) -> Result<Domain> {
    match domain_id {
        Some(id) => match registry.get(id) {
            Ok(domain) if domain.is_active => Ok(domain),
            Ok(_) => Err(DirectoryError::NoActiveDomain),
            Err(DirectoryError::NotFound(_)) => Err(DirectoryError::NoActiveDomain),
            Err(e) => Err(e),
        },
        None => registry.first_active(),
    }
}

/// Normalizes a configured server value into a connection URL. LDAPS is
/// selected by scheme or by the 636 port suffix.
pub(crate) fn ldap_url(server: &str) -> String {
    let use_ldaps = server.ends_with(":636") || server.contains("ldaps://");
    if use_ldaps {
        format!("ldaps://{}", server.replace("ldaps://", ""))
    } else {
        format!("ldap://{}", server.replace("ldap://", ""))
    }
}

/// Opens and authenticates a connection for the resolved domain.
pub async fn connect(
    registry: &DomainRegistry,
    domain_id: Option<i64>,
) -> Result<BoundConnection> {
    let domain = resolve_domain(registry, domain_id)?;

    // Decryption failures surface loudly; a domain with an unreadable
    // credential must never be treated as having no password.
    let password = registry.cipher().decrypt(&domain.password)?;
    let credentials = BindCredentials::new(domain.username.clone(), password);

    let url = ldap_url(&domain.server);
    info!("Connecting to {} for domain '{}'", url, domain.name);

    let conn = connect_with_timeout(&url).await?;
    let conn = bind_with_timeout(conn, credentials).await?;

    info!("Bind successful for domain '{}'", domain.name);
    Ok(BoundConnection {
        conn,
        base_dn: domain.base_dn,
    })
}

async fn connect_with_timeout(url: &str) -> Result<LdapConn> {
    let url = url.to_string();

    let result = timeout(
        CONNECT_TIMEOUT,
        tokio::task::spawn_blocking(move || {
            let settings = LdapConnSettings::new()
                .set_conn_timeout(CONNECT_TIMEOUT)
                .set_no_tls_verify(true);
            LdapConn::with_settings(settings, &url)
                .map_err(|e| as_connect_failure(DirectoryError::from(e)))
        }),
    )
    .await;

    match result {
        Ok(Ok(inner)) => inner,
        Ok(Err(join_err)) => Err(DirectoryError::ConnectFailed(format!(
            "Connect task failed: {}",
            join_err
        ))),
        Err(_) => Err(DirectoryError::ConnectFailed(format!(
            "Server did not respond within {} seconds",
            CONNECT_TIMEOUT.as_secs()
        ))),
    }
}

async fn bind_with_timeout(ldap: LdapConn, credentials: BindCredentials) -> Result<LdapConn> {
    let result = timeout(
        CONNECT_TIMEOUT,
        tokio::task::spawn_blocking(move || {
            let mut ldap = ldap;
            let bind = ldap
                .simple_bind(credentials.username(), credentials.password())
                .and_then(|r| r.success());
            // credentials drop (and zero) here, right after the bind call
            match bind {
                Ok(_) => Ok(ldap),
                Err(e) => {
                    if let Err(unbind_err) = ldap.unbind() {
                        warn!("Unbind after failed bind also failed: {}", unbind_err);
                    }
                    Err(match DirectoryError::from(e) {
                        bind_err @ DirectoryError::BindFailed(_) => bind_err,
                        DirectoryError::Search(msg) | DirectoryError::ConnectFailed(msg) => {
                            DirectoryError::ConnectFailed(msg)
                        }
                        other => other,
                    })
                }
            }
        }),
    )
    .await;

    match result {
        Ok(Ok(inner)) => inner,
        Ok(Err(join_err)) => Err(DirectoryError::ConnectFailed(format!(
            "Bind task failed: {}",
            join_err
        ))),
        Err(_) => Err(DirectoryError::ConnectFailed(format!(
            "Bind did not complete within {} seconds",
            CONNECT_TIMEOUT.as_secs()
        ))),
    }
}

fn as_connect_failure(err: DirectoryError) -> DirectoryError {
    match err {
        DirectoryError::Search(msg) | DirectoryError::BindFailed(msg) => {
            DirectoryError::ConnectFailed(msg)
        }
        other => other,
    }
}
