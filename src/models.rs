use serde::{Deserialize, Serialize};

/// Provisioning option marking a group backed by a Team
pub const TEAM_PROVISIONING_OPTION: &str = "Team";

/// Group type tag for Microsoft 365 groups
pub const UNIFIED_GROUP_TYPE: &str = "Unified";

/// `@odata.type` of user principals in a member list
pub const USER_ODATA_TYPE: &str = "#microsoft.graph.user";

/// Directory group as returned by `GET /groups`, plus the derived member count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default, deserialize_with = "deserializers::null_as_default")]
    pub group_types: Vec<String>,
    #[serde(default, deserialize_with = "deserializers::null_as_default")]
    pub mail_enabled: bool,
    #[serde(default, deserialize_with = "deserializers::null_as_default")]
    pub resource_provisioning_options: Vec<String>,
    #[serde(skip_deserializing)]
    pub member_count: usize,
}

impl Group {
    /// Backed by a Team (provisioning options contain the team marker)
    pub fn is_team(&self) -> bool {
        self.resource_provisioning_options
            .iter()
            .any(|o| o == TEAM_PROVISIONING_OPTION)
    }

    /// Tagged as a Microsoft 365 ("Unified") group
    pub fn is_unified(&self) -> bool {
        self.group_types.iter().any(|t| t == UNIFIED_GROUP_TYPE)
    }
}

/// A member row from `GET /groups/{id}/members`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryObject {
    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl DirectoryObject {
    pub fn is_user(&self) -> bool {
        self.odata_type.as_deref() == Some(USER_ODATA_TYPE)
    }
}

/// The `{ "value": [...] }` envelope Graph wraps collections in
#[derive(Debug, Clone, Deserialize)]
pub struct ODataCollection<T> {
    pub value: Vec<T>,
}

/// Group-type selector of the filter criteria
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum GroupTypeFilter {
    #[default]
    Any,
    Security,
    Distribution,
}

impl std::fmt::Display for GroupTypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupTypeFilter::Any => write!(f, "All types"),
            GroupTypeFilter::Security => write!(f, "Security"),
            GroupTypeFilter::Distribution => write!(f, "Distribution"),
        }
    }
}

/// Mail-enabled selector of the filter criteria
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MailEnabledFilter {
    #[default]
    Any,
    Yes,
    No,
}

impl MailEnabledFilter {
    /// The flag value this selector requires, `None` when unspecified
    pub fn required(&self) -> Option<bool> {
        match self {
            MailEnabledFilter::Any => None,
            MailEnabledFilter::Yes => Some(true),
            MailEnabledFilter::No => Some(false),
        }
    }
}

impl std::fmt::Display for MailEnabledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailEnabledFilter::Any => write!(f, "Any"),
            MailEnabledFilter::Yes => write!(f, "Mail enabled"),
            MailEnabledFilter::No => write!(f, "Not mail enabled"),
        }
    }
}

/// User-specified search/filter input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search: Option<String>,
    pub group_type: GroupTypeFilter,
    pub mail_enabled: MailEnabledFilter,
}

impl FilterCriteria {
    /// True when no predicate is active
    pub fn is_empty(&self) -> bool {
        self.search.as_deref().map_or(true, str::is_empty)
            && self.group_type == GroupTypeFilter::Any
            && self.mail_enabled == MailEnabledFilter::Any
    }
}

/// Body of `POST /me/sendMail`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMailRequest {
    pub message: MailMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub subject: String,
    pub body: ItemBody,
    pub to_recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
}

/// Custom deserializers for Graph API payloads
pub mod deserializers {
    use serde::{Deserialize, Deserializer};

    /// Graph sends `null` for empty collections on some group kinds
    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        let opt: Option<T> = Option::deserialize(deserializer)?;
        Ok(opt.unwrap_or_default())
    }
}
