//! Search-filter construction
//!
//! RFC 4515-style escaping of untrusted query input plus the fixed filter
//! templates and attribute projections for each search kind. Escaping is
//! applied exactly once to the whole raw query before it is embedded in a
//! template; the projections must stay byte-for-byte stable because
//! normalization depends on every listed attribute being requested.

use serde::Deserialize;

/// What a search request is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Users,
    Groups,
    GroupMembers,
}

impl SearchKind {
    /// Parses the wire-level `type` parameter. Unknown values return
    /// `None`; the service treats that as an empty result set rather than
    /// an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "users" => Some(SearchKind::Users),
            "groups" => Some(SearchKind::Groups),
            "group_members" => Some(SearchKind::GroupMembers),
            _ => None,
        }
    }
}

/// An incoming search request, already past HTTP parsing.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub kind: SearchKind,
    pub precise: bool,
    pub search_by: Option<String>,
    pub domain_id: Option<i64>,
}

/// Attributes requested for user entries. Drives both the projection sent
/// to the server and the fields normalization can rely on.
pub const USER_ATTRS: &[&str] = &[
    "name",
    "mail",
    "department",
    "title",
    "telephoneNumber",
    "manager",
    "streetAddress",
    "l",
    "st",
    "postalCode",
    "co",
    "memberOf",
    "whenCreated",
    "whenChanged",
    "sAMAccountName",
    "userPrincipalName",
    "userAccountControl",
    "lastLogon",
    "pwdLastSet",
    "company",
    "employeeID",
    "employeeType",
];

/// Attributes requested for group entries.
pub const GROUP_ATTRS: &[&str] = &[
    "name",
    "description",
    "groupType",
    "member",
    "managedBy",
    "whenCreated",
    "whenChanged",
];

/// Escapes a string for safe embedding in an LDAP search filter.
///
/// Escaped characters: `\` `*` `(` `)` NUL `/` `.`
pub fn escape_filter_value(input: &str) -> String {
    input.chars().fold(String::new(), |mut acc, c| {
        match c {
            '\\' => acc.push_str("\\5c"),
            '*' => acc.push_str("\\2a"),
            '(' => acc.push_str("\\28"),
            ')' => acc.push_str("\\29"),
            '\0' => acc.push_str("\\00"),
            '/' => acc.push_str("\\2f"),
            '.' => acc.push_str("\\2e"),
            _ => acc.push(c),
        }
        acc
    })
}

/// Builds the filter string and attribute projection for a request.
pub fn build(request: &SearchRequest) -> (String, &'static [&'static str]) {
    let q = escape_filter_value(&request.query);

    let (filter, attrs): (String, &'static [&'static str]) = match request.kind {
        SearchKind::Users => {
            // Exact-account fast path, regardless of the precise flag
            if request.search_by.as_deref() == Some("sAMAccountName") {
                (
                    format!("(&(objectClass=user)(sAMAccountName={}))", q),
                    USER_ATTRS,
                )
            } else if request.precise {
                (
                    format!(
                        "(&(objectClass=user)(|(sAMAccountName={})(userPrincipalName={})(employeeID={})))",
                        q, q, q
                    ),
                    USER_ATTRS,
                )
            } else {
                (
                    format!(
                        "(&(objectClass=user)(|(name=*{}*)(mail=*{}*)(sAMAccountName=*{}*)(userPrincipalName=*{}*)(employeeID=*{}*)))",
                        q, q, q, q, q
                    ),
                    USER_ATTRS,
                )
            }
        }
        SearchKind::Groups => {
            if request.precise {
                (
                    format!("(&(objectClass=group)(sAMAccountName={}))", q),
                    GROUP_ATTRS,
                )
            } else {
                (
                    format!(
                        "(&(objectClass=group)(|(name=*{}*)(description=*{}*)))",
                        q, q
                    ),
                    GROUP_ATTRS,
                )
            }
        }
        // The query is the literal group DN
        SearchKind::GroupMembers => (
            format!("(&(objectClass=user)(memberOf={}))", q),
            USER_ATTRS,
        ),
    };

    debug_assert!(
        is_balanced(&filter),
        "constructed filter has unbalanced parentheses: {}",
        filter
    );

    (filter, attrs)
}

/// Filter for looking up a single group by its distinguished name.
pub fn group_by_dn(group_dn: &str) -> String {
    format!("(distinguishedName={})", escape_filter_value(group_dn))
}

/// Structural sanity check: every `(` has a matching `)` and depth never
/// goes negative. Escaped parentheses have already been rewritten to
/// `\28`/`\29` by the time this runs.
fn is_balanced(filter: &str) -> bool {
    let mut depth: i32 = 0;
    for c in filter.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
