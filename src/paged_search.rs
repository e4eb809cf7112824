//! Paged search execution
//!
//! Drives the Simple Paged Results control (OID 1.2.840.113556.1.4.319) to
//! exhaustion: issue the search with an empty cookie, accumulate the page,
//! reissue with the server's returned cookie until it comes back empty.
//! A sizeLimitExceeded result (rc 4) is a partial success — the entries
//! already accumulated are kept and flagged truncated. Any other protocol
//! failure discards the accumulation entirely so callers never see a mix
//! of good pages and an error.

use std::time::Duration;

use ldap3::controls::{ControlParser, PagedResults};
use ldap3::{LdapConn, Scope, SearchEntry};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::connection::BoundConnection;
use crate::entry::RawEntry;
use crate::errors::{DirectoryError, Result};

/// Simple Paged Results control OID.
const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

/// Directory page size per request.
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

/// Upper bound on pages per search. The cookie is the real termination
/// signal; this guards against a misbehaving server that never drains.
pub const MAX_PAGES: usize = 256;

/// Deadline for one whole paged search.
pub const PAGED_SEARCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Terminal state of a paged search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Success,
    /// The server stopped early; `entries` holds the partial results.
    Truncated,
    Error,
}

/// Accumulated result of a paged search.
#[derive(Debug)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub entries: Vec<RawEntry>,
    pub error: Option<String>,
}

impl SearchOutcome {
    fn success(entries: Vec<RawEntry>) -> Self {
        Self {
            status: SearchStatus::Success,
            entries,
            error: None,
        }
    }

    fn truncated(entries: Vec<RawEntry>) -> Self {
        Self {
            status: SearchStatus::Truncated,
            entries,
            error: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            status: SearchStatus::Error,
            entries: Vec::new(),
            error: Some(message),
        }
    }
}

/// One page from the directory.
pub struct Page {
    pub entries: Vec<RawEntry>,
    /// Opaque resume token; empty means the search is exhausted.
    pub cookie: Vec<u8>,
    /// The server reported sizeLimitExceeded for this page.
    pub size_limit_hit: bool,
}

/// A source of result pages. The live implementation wraps an LDAP
/// connection; tests drive the loop with scripted pages.
pub trait PageSource {
    fn fetch_page(&mut self, cookie: &[u8]) -> Result<Page>;
}

/// Runs the paging loop against a source, accumulating entries until the
/// cookie signals exhaustion, the server truncates, or `max_pages` is hit.
pub fn run_paged_search(source: &mut dyn PageSource, max_pages: usize) -> SearchOutcome {
    let mut accumulated: Vec<RawEntry> = Vec::new();
    let mut cookie: Vec<u8> = Vec::new();

    for page_number in 1.. {
        if page_number > max_pages {
            error!(
                "Paged search exceeded {} pages without draining; aborting",
                max_pages
            );
            return SearchOutcome::failed(format!(
                "Paged search did not complete within {} pages",
                max_pages
            ));
        }

        let page = match source.fetch_page(&cookie) {
            Ok(page) => page,
            Err(e) => {
                error!("Paged search failed on page {}: {}", page_number, e);
                return SearchOutcome::failed(e.to_string());
            }
        };

        accumulated.extend(page.entries);

        if page.size_limit_hit {
            warn!(
                "Size limit exceeded after {} pages; returning {} partial entries",
                page_number,
                accumulated.len()
            );
            return SearchOutcome::truncated(accumulated);
        }

        if page.cookie.is_empty() {
            info!(
                "Paged search complete: {} pages, {} entries",
                page_number,
                accumulated.len()
            );
            return SearchOutcome::success(accumulated);
        }
        cookie = page.cookie;
    }
    unreachable!("page loop always returns")
}

/// Live page source over a bound LDAP connection.
struct LdapPageSource<'a> {
    conn: &'a mut LdapConn,
    base_dn: &'a str,
    filter: &'a str,
    attrs: &'a [&'a str],
    page_size: i32,
}

impl PageSource for LdapPageSource<'_> {
    fn fetch_page(&mut self, cookie: &[u8]) -> Result<Page> {
        let control = PagedResults {
            size: self.page_size,
            cookie: cookie.to_vec(),
        };

        let result = self
            .conn
            .with_controls(vec![control.into()])
            .search(
                self.base_dn,
                Scope::Subtree,
                self.filter,
                self.attrs.to_vec(),
            )?;
        let (raw_entries, ldap_result) = (result.0, result.1);

        // rc 4 = sizeLimitExceeded: keep the partial page
        if ldap_result.rc != 0 && ldap_result.rc != 4 {
            return Err(DirectoryError::Search(format!(
                "LDAP search failed: rc={}, text={}",
                ldap_result.rc, ldap_result.text
            )));
        }

        let mut next_cookie = Vec::new();
        for ctrl in &ldap_result.ctrls {
            let raw = &ctrl.1;
            if raw.ctype == PAGED_RESULTS_OID {
                if let Some(val) = &raw.val {
                    let response: PagedResults = PagedResults::parse(val);
                    next_cookie = response.cookie;
                }
                break;
            }
        }

        let entries = raw_entries
            .into_iter()
            // Continuation references are not entries; referral chasing
            // stays off
            .filter(|e| !e.is_ref())
            .map(|e| RawEntry::from_search_entry(SearchEntry::construct(e)))
            .collect();

        Ok(Page {
            entries,
            cookie: next_cookie,
            size_limit_hit: ldap_result.rc == 4,
        })
    }
}

/// Executes a full paged search over a bound connection, releasing the
/// connection on every exit path. The deadline covers the entire exchange;
/// expiry surfaces as an error outcome, never a hang.
pub async fn execute(
    bound: BoundConnection,
    filter: String,
    attrs: &'static [&'static str],
    page_size: i32,
) -> SearchOutcome {
    info!("Starting paged search with filter {}", filter);

    let result = timeout(
        PAGED_SEARCH_TIMEOUT,
        tokio::task::spawn_blocking(move || {
            let BoundConnection {
                mut conn, base_dn, ..
            } = bound;
            let mut source = LdapPageSource {
                conn: &mut conn,
                base_dn: &base_dn,
                filter: &filter,
                attrs,
                page_size,
            };
            let outcome = run_paged_search(&mut source, MAX_PAGES);
            if let Err(e) = conn.unbind() {
                warn!("Unbind failed (connection will be dropped): {}", e);
            }
            outcome
        }),
    )
    .await;

    match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => SearchOutcome::failed(format!("Search task failed: {}", join_err)),
        Err(_) => SearchOutcome::failed(format!(
            "Search did not complete within {} seconds",
            PAGED_SEARCH_TIMEOUT.as_secs()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted page source: each step is either a page or an error.
    struct ScriptedSource {
        script: Vec<Result<Page>>,
        calls: Vec<Vec<u8>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Page>>) -> Self {
            Self {
                script,
                calls: Vec::new(),
            }
        }
    }

    impl PageSource for ScriptedSource {
        fn fetch_page(&mut self, cookie: &[u8]) -> Result<Page> {
            self.calls.push(cookie.to_vec());
            if self.script.is_empty() {
                panic!("fetch_page called past end of script");
            }
            self.script.remove(0)
        }
    }

    fn entries(names: &[&str]) -> Vec<RawEntry> {
        names
            .iter()
            .map(|n| RawEntry {
                dn: format!("CN={},DC=test", n),
                ..Default::default()
            })
            .collect()
    }

    fn page(names: &[&str], cookie: &[u8]) -> Result<Page> {
        Ok(Page {
            entries: entries(names),
            cookie: cookie.to_vec(),
            size_limit_hit: false,
        })
    }

    #[test]
    fn test_single_page_success() {
        let mut source = ScriptedSource::new(vec![page(&["a", "b"], b"")]);
        let outcome = run_paged_search(&mut source, MAX_PAGES);
        assert_eq!(outcome.status, SearchStatus::Success);
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(source.calls, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_accumulates_all_pages_and_threads_cookie() {
        let mut source = ScriptedSource::new(vec![
            page(&["a", "b"], b"cookie-1"),
            page(&["c", "d"], b"cookie-2"),
            page(&["e"], b""),
        ]);
        let outcome = run_paged_search(&mut source, MAX_PAGES);
        assert_eq!(outcome.status, SearchStatus::Success);
        assert_eq!(outcome.entries.len(), 5);
        // Each request must carry the previous page's cookie
        assert_eq!(
            source.calls,
            vec![b"".to_vec(), b"cookie-1".to_vec(), b"cookie-2".to_vec()]
        );
        // Directory order is preserved
        assert_eq!(outcome.entries[0].dn, "CN=a,DC=test");
        assert_eq!(outcome.entries[4].dn, "CN=e,DC=test");
    }

    #[test]
    fn test_size_limit_yields_truncated_with_partial_entries() {
        let mut source = ScriptedSource::new(vec![
            page(&["a", "b"], b"cookie-1"),
            Ok(Page {
                entries: entries(&["c"]),
                cookie: Vec::new(),
                size_limit_hit: true,
            }),
        ]);
        let outcome = run_paged_search(&mut source, MAX_PAGES);
        assert_eq!(outcome.status, SearchStatus::Truncated);
        assert_eq!(outcome.entries.len(), 3);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_error_mid_paging_discards_accumulation() {
        let mut source = ScriptedSource::new(vec![
            page(&["a", "b"], b"cookie-1"),
            Err(DirectoryError::Search("rc=1".to_string())),
        ]);
        let outcome = run_paged_search(&mut source, MAX_PAGES);
        assert_eq!(outcome.status, SearchStatus::Error);
        assert!(outcome.entries.is_empty());
        assert!(outcome.error.unwrap().contains("rc=1"));
    }

    #[test]
    fn test_runaway_cookie_hits_page_bound() {
        // Server keeps handing back a non-empty cookie forever
        let script: Vec<Result<Page>> = (0..5).map(|_| page(&["x"], b"again")).collect();
        let mut source = ScriptedSource::new(script);
        let outcome = run_paged_search(&mut source, 4);
        assert_eq!(outcome.status, SearchStatus::Error);
        assert!(outcome.entries.is_empty());
        assert_eq!(source.calls.len(), 4);
    }

    #[test]
    fn test_empty_result_set_is_success() {
        let mut source = ScriptedSource::new(vec![page(&[], b"")]);
        let outcome = run_paged_search(&mut source, MAX_PAGES);
        assert_eq!(outcome.status, SearchStatus::Success);
        assert!(outcome.entries.is_empty());
    }
}
