//! Search orchestration
//!
//! Ties the pipeline together for one request: build the filter, broker a
//! bound connection for the target domain, run the paged search, and
//! normalize the raw entries. Results keep directory order; truncation is
//! reported as a flag on a successful response, never as an error.

use std::sync::Arc;

use tracing::{info, warn};

use crate::connection;
use crate::database::DomainRegistry;
use crate::entry::RawEntry;
use crate::errors::{DirectoryError, Result};
use crate::filters::{self, SearchKind, SearchRequest};
use crate::paged_search::{self, SearchStatus, DEFAULT_PAGE_SIZE};
use crate::records::{Group, Record, User};

/// What the HTTP layer serializes back to the caller.
#[derive(Debug, serde::Serialize)]
pub struct SearchResponse {
    pub data: Vec<Record>,
    pub truncated: bool,
}

impl SearchResponse {
    fn empty() -> Self {
        Self {
            data: Vec::new(),
            truncated: false,
        }
    }
}

/// Directory query engine over the domain registry.
pub struct DirectoryService {
    registry: Arc<DomainRegistry>,
    page_size: i32,
}

impl DirectoryService {
    pub fn new(registry: Arc<DomainRegistry>) -> Self {
        Self {
            registry,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides the directory page size (mainly for exercising the paging
    /// loop against small fixtures).
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Runs a typed search request to completion.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let (filter, attrs) = filters::build(request);

        let bound = connection::connect(&self.registry, request.domain_id).await?;
        let outcome = paged_search::execute(bound, filter, attrs, self.page_size).await;

        let truncated = match outcome.status {
            SearchStatus::Success => false,
            SearchStatus::Truncated => {
                warn!("Search returned truncated results");
                true
            }
            SearchStatus::Error => {
                return Err(DirectoryError::Search(
                    outcome
                        .error
                        .unwrap_or_else(|| "search failed".to_string()),
                ));
            }
        };

        let data = normalize(request.kind, &outcome.entries);
        info!(
            "Search returned {} records ({} raw entries)",
            data.len(),
            outcome.entries.len()
        );
        Ok(SearchResponse { data, truncated })
    }

    /// Wire-level entry point taking the raw `type` parameter. An unknown
    /// type yields an empty result set, mirroring "no matching template"
    /// rather than a hard failure.
    pub async fn perform_search(
        &self,
        query: &str,
        search_type: &str,
        precise: bool,
        search_by: Option<&str>,
        domain_id: Option<i64>,
    ) -> Result<SearchResponse> {
        let Some(kind) = SearchKind::parse(search_type) else {
            return Ok(SearchResponse::empty());
        };
        self.search(&SearchRequest {
            query: query.to_string(),
            kind,
            precise,
            search_by: search_by.map(String::from),
            domain_id,
        })
        .await
    }

    /// Looks up one group by its distinguished name. `NotFound` maps to
    /// 404 at the HTTP layer.
    pub async fn group_details(&self, group_dn: &str, domain_id: Option<i64>) -> Result<Group> {
        let filter = filters::group_by_dn(group_dn);

        let bound = connection::connect(&self.registry, domain_id).await?;
        let outcome =
            paged_search::execute(bound, filter, filters::GROUP_ATTRS, self.page_size).await;

        if outcome.status == SearchStatus::Error {
            return Err(DirectoryError::Search(
                outcome
                    .error
                    .unwrap_or_else(|| "group lookup failed".to_string()),
            ));
        }

        outcome
            .entries
            .first()
            .and_then(Group::from_entry)
            .ok_or_else(|| DirectoryError::NotFound(format!("group {}", group_dn)))
    }
}

/// Converts raw entries into output records for the requested kind,
/// dropping entries the normalizer rejects (no resolvable name).
fn normalize(kind: SearchKind, entries: &[RawEntry]) -> Vec<Record> {
    match kind {
        SearchKind::Users | SearchKind::GroupMembers => entries
            .iter()
            .filter_map(User::from_entry)
            .map(Record::User)
            .collect(),
        SearchKind::Groups => entries
            .iter()
            .filter_map(Group::from_entry)
            .map(Record::Group)
            .collect(),
    }
}
