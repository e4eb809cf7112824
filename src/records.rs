//! Canonical output records
//!
//! Converts raw directory entries into the User and Group shapes the API
//! returns. Field names follow the JSON contract of the frontend exactly.
//! A record whose `name` cannot be resolved is dropped; that is a
//! data-quality filter, not an error.

use serde::Serialize;

use crate::entry::RawEntry;

/// Bit 1 of userAccountControl: account disabled.
const UAC_ACCOUNT_DISABLED: u32 = 0x2;

/// groupType value for a global security group.
const GROUP_TYPE_SECURITY: i64 = -2147483643;

/// A normalized directory user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Distinguished name.
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub phone: Option<String>,
    pub manager: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub member_of: Vec<String>,
    pub created: Option<String>,
    pub last_modified: Option<String>,
    pub sam_account_name: Option<String>,
    pub user_principal_name: Option<String>,
    pub enabled: Option<bool>,
    pub last_logon: Option<String>,
    pub pwd_last_set: Option<String>,
    pub company: Option<String>,
    #[serde(rename = "employeeID")]
    pub employee_id: Option<String>,
    pub employee_type: Option<String>,
}

/// Security/distribution classification of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Security,
    Distribution,
    Unknown,
}

/// A normalized directory group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Distinguished name.
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    pub members: Vec<String>,
    pub owner: Option<String>,
    pub created: Option<String>,
    pub last_modified: Option<String>,
}

/// Either record shape, in directory result order.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Record {
    User(User),
    Group(Group),
}

impl User {
    /// Normalizes a raw entry into a user. Returns `None` when the entry
    /// has no resolvable name.
    pub fn from_entry(entry: &RawEntry) -> Option<Self> {
        let name = entry.first_text("name")?;

        let enabled = entry
            .first_u32("userAccountControl")
            .map(|uac| uac & UAC_ACCOUNT_DISABLED == 0);

        Some(User {
            id: entry.dn.clone(),
            name,
            email: entry.first_text("mail"),
            department: entry.first_text("department"),
            title: entry.first_text("title"),
            phone: entry.first_text("telephoneNumber"),
            manager: entry.first_text("manager"),
            street: entry.first_text("streetAddress"),
            city: entry.first_text("l"),
            state: entry.first_text("st"),
            postal_code: entry.first_text("postalCode"),
            country: entry.first_text("co"),
            member_of: entry.all_text("memberOf"),
            created: entry.first_text("whenCreated"),
            last_modified: entry.first_text("whenChanged"),
            sam_account_name: entry.first_text("sAMAccountName"),
            user_principal_name: entry.first_text("userPrincipalName"),
            enabled,
            last_logon: entry.first_text("lastLogon"),
            pwd_last_set: entry.first_text("pwdLastSet"),
            company: entry.first_text("company"),
            employee_id: entry.first_text("employeeID"),
            employee_type: entry.first_text("employeeType"),
        })
    }
}

impl GroupKind {
    fn from_group_type(value: Option<i64>) -> Self {
        match value {
            Some(GROUP_TYPE_SECURITY) => GroupKind::Security,
            Some(0) | None => GroupKind::Unknown,
            Some(_) => GroupKind::Distribution,
        }
    }
}

impl Group {
    /// Normalizes a raw entry into a group. Returns `None` when the entry
    /// has no resolvable name.
    pub fn from_entry(entry: &RawEntry) -> Option<Self> {
        let name = entry.first_text("name")?;

        Some(Group {
            id: entry.dn.clone(),
            name,
            description: entry.first_text("description"),
            kind: GroupKind::from_group_type(entry.first_i64("groupType")),
            members: entry.all_text("member"),
            owner: entry.first_text("managedBy"),
            created: entry.first_text("whenCreated"),
            last_modified: entry.first_text("whenChanged"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::test_support::entry_with;

    fn full_user_entry() -> RawEntry {
        entry_with(
            "CN=Jane Smith,OU=People,DC=corp,DC=example,DC=com",
            vec![
                ("name", vec!["Jane Smith"]),
                ("mail", vec!["jane.smith@example.com"]),
                ("department", vec!["Engineering"]),
                ("title", vec!["Staff Engineer"]),
                ("telephoneNumber", vec!["+1 555 0100"]),
                ("manager", vec!["CN=Boss,OU=People,DC=corp,DC=example,DC=com"]),
                ("streetAddress", vec!["1 Main St"]),
                ("l", vec!["Springfield"]),
                ("st", vec!["IL"]),
                ("postalCode", vec!["62701"]),
                ("co", vec!["United States"]),
                (
                    "memberOf",
                    vec![
                        "CN=Engineering,OU=Groups,DC=corp,DC=example,DC=com",
                        "CN=All Staff,OU=Groups,DC=corp,DC=example,DC=com",
                    ],
                ),
                ("whenCreated", vec!["20190301080000.0Z"]),
                ("whenChanged", vec!["20240115093000.0Z"]),
                ("sAMAccountName", vec!["jsmith"]),
                ("userPrincipalName", vec!["jsmith@corp.example.com"]),
                ("userAccountControl", vec!["512"]),
                ("lastLogon", vec!["133505151000000000"]),
                ("pwdLastSet", vec!["133400000000000000"]),
                ("company", vec!["Example Corp"]),
                ("employeeID", vec!["E1234"]),
                ("employeeType", vec!["FTE"]),
            ],
            vec![],
        )
    }

    #[test]
    fn test_user_full_entry() {
        let user = User::from_entry(&full_user_entry()).unwrap();
        assert_eq!(user.id, "CN=Jane Smith,OU=People,DC=corp,DC=example,DC=com");
        assert_eq!(user.name, "Jane Smith");
        assert_eq!(user.email.as_deref(), Some("jane.smith@example.com"));
        assert_eq!(user.member_of.len(), 2);
        assert_eq!(user.enabled, Some(true));
        assert_eq!(user.employee_id.as_deref(), Some("E1234"));
    }

    #[test]
    fn test_user_without_name_is_discarded() {
        let entry = entry_with(
            "CN=Ghost,DC=corp,DC=example,DC=com",
            vec![("mail", vec!["ghost@example.com"])],
            vec![],
        );
        assert!(User::from_entry(&entry).is_none());
        assert!(Group::from_entry(&entry).is_none());
    }

    #[test]
    fn test_disabled_bit_yields_enabled_false() {
        let entry = entry_with(
            "CN=Left Company,DC=corp,DC=example,DC=com",
            vec![("name", vec!["Left Company"]), ("userAccountControl", vec!["514"])],
            vec![],
        );
        let user = User::from_entry(&entry).unwrap();
        assert_eq!(user.enabled, Some(false));
    }

    #[test]
    fn test_absent_uac_yields_enabled_none() {
        let entry = entry_with(
            "CN=Minimal,DC=corp,DC=example,DC=com",
            vec![("name", vec!["Minimal"])],
            vec![],
        );
        let user = User::from_entry(&entry).unwrap();
        assert_eq!(user.enabled, None);
        assert!(user.member_of.is_empty());
        assert_eq!(user.email, None);
    }

    #[test]
    fn test_unparseable_uac_drops_field_not_record() {
        let entry = entry_with(
            "CN=Odd,DC=corp,DC=example,DC=com",
            vec![("name", vec!["Odd"]), ("userAccountControl", vec!["garbage"])],
            vec![],
        );
        let user = User::from_entry(&entry).unwrap();
        assert_eq!(user.enabled, None);
        assert_eq!(user.name, "Odd");
    }

    #[test]
    fn test_group_type_decode() {
        assert_eq!(
            GroupKind::from_group_type(Some(-2147483643)),
            GroupKind::Security
        );
        assert_eq!(GroupKind::from_group_type(Some(8)), GroupKind::Distribution);
        assert_eq!(
            GroupKind::from_group_type(Some(-2147483646)),
            GroupKind::Distribution
        );
        assert_eq!(GroupKind::from_group_type(Some(0)), GroupKind::Unknown);
        assert_eq!(GroupKind::from_group_type(None), GroupKind::Unknown);
    }

    #[test]
    fn test_group_from_entry() {
        let entry = entry_with(
            "CN=Engineering,OU=Groups,DC=corp,DC=example,DC=com",
            vec![
                ("name", vec!["Engineering"]),
                ("description", vec!["All engineers"]),
                ("groupType", vec!["-2147483643"]),
                (
                    "member",
                    vec![
                        "CN=Jane Smith,OU=People,DC=corp,DC=example,DC=com",
                        "CN=John Doe,OU=People,DC=corp,DC=example,DC=com",
                    ],
                ),
                ("managedBy", vec!["CN=Boss,OU=People,DC=corp,DC=example,DC=com"]),
            ],
            vec![],
        );
        let group = Group::from_entry(&entry).unwrap();
        assert_eq!(group.kind, GroupKind::Security);
        assert_eq!(group.members.len(), 2);
        assert_eq!(group.owner.as_deref(), Some("CN=Boss,OU=People,DC=corp,DC=example,DC=com"));
        assert_eq!(group.created, None);
    }

    #[test]
    fn test_user_json_field_names() {
        let user = User::from_entry(&full_user_entry()).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        for key in [
            "id",
            "name",
            "email",
            "postalCode",
            "memberOf",
            "lastModified",
            "samAccountName",
            "userPrincipalName",
            "pwdLastSet",
            "employeeID",
            "employeeType",
            "lastLogon",
        ] {
            assert!(json.get(key).is_some(), "missing JSON key {}", key);
        }
        assert_eq!(json["samAccountName"], "jsmith");
    }

    #[test]
    fn test_group_json_field_names() {
        let entry = entry_with(
            "CN=Ops,DC=corp,DC=example,DC=com",
            vec![("name", vec!["Ops"]), ("groupType", vec!["8"])],
            vec![],
        );
        let group = Group::from_entry(&entry).unwrap();
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["type"], "distribution");
        assert!(json.get("lastModified").is_some());
        assert!(json["members"].as_array().unwrap().is_empty());
    }
}
