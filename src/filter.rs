//! Search and filter predicates over the fetched group list

use crate::models::{FilterCriteria, Group, GroupTypeFilter};

/// Case-insensitive substring match on display name or mail
///
/// An absent or empty search text matches every group.
pub fn matches_search(group: &Group, search: Option<&str>) -> bool {
    let needle = match search {
        Some(text) if !text.is_empty() => text.to_lowercase(),
        _ => return true,
    };

    let contains = |field: &Option<String>| {
        field
            .as_deref()
            .map_or(false, |value| value.to_lowercase().contains(&needle))
    };

    contains(&group.display_name) || contains(&group.mail)
}

/// Security: untagged, not team-backed, not mail-enabled.
/// Distribution: untagged and mail-enabled.
///
/// Untagged mail-enabled groups count as Distribution only, so the two
/// selectors never overlap. Unified groups match neither.
pub fn matches_group_type(group: &Group, selector: GroupTypeFilter) -> bool {
    match selector {
        GroupTypeFilter::Any => true,
        GroupTypeFilter::Security => {
            group.group_types.is_empty() && !group.is_team() && !group.mail_enabled
        }
        GroupTypeFilter::Distribution => group.group_types.is_empty() && group.mail_enabled,
    }
}

pub fn matches_mail_enabled(group: &Group, required: Option<bool>) -> bool {
    required.map_or(true, |flag| group.mail_enabled == flag)
}

/// All three predicates at once
pub fn matches(group: &Group, criteria: &FilterCriteria) -> bool {
    matches_search(group, criteria.search.as_deref())
        && matches_group_type(group, criteria.group_type)
        && matches_mail_enabled(group, criteria.mail_enabled.required())
}

/// Groups satisfying `criteria`, in source order
pub fn apply_filters(groups: &[Group], criteria: &FilterCriteria) -> Vec<Group> {
    groups
        .iter()
        .filter(|group| matches(group, criteria))
        .cloned()
        .collect()
}
