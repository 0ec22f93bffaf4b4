//! Group fetch pipeline: list groups, drop the non-reportable ones, and count
//! user members of the rest

use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::graph::GraphClient;
use crate::models::Group;

/// Progress callback, fired once per finished member-count lookup
pub type ProgressCallback = Arc<dyn Fn() + Send + Sync>;

/// Whether a group belongs in the report
///
/// Team-backed groups are always dropped. Unified groups are kept only when
/// they have no provisioning options at all.
pub fn is_reportable(group: &Group) -> bool {
    !group.is_team() && (!group.is_unified() || group.resource_provisioning_options.is_empty())
}

/// Number of direct user members of a group
///
/// A missing id counts as zero without touching the network. Lookup failures
/// are logged and also count as zero so one bad group does not sink the report.
pub async fn fetch_member_count(client: &dyn GraphClient, group_id: Option<&str>) -> usize {
    let Some(group_id) = group_id.filter(|id| !id.is_empty()) else {
        return 0;
    };

    match client.list_group_members(group_id).await {
        Ok(members) => members.iter().filter(|m| m.is_user()).count(),
        Err(e) => {
            warn!("Error fetching members for group {}: {}", group_id, e);
            0
        }
    }
}

/// Fetch the reportable groups with their member counts
pub async fn fetch_groups(client: &dyn GraphClient) -> Result<Vec<Group>> {
    fetch_groups_with_progress(client, None).await
}

/// [`fetch_groups`], reporting each finished member-count lookup
///
/// Lookups run concurrently without a limit and are joined positionally, so
/// the result keeps the order Graph returned the groups in.
pub async fn fetch_groups_with_progress(
    client: &dyn GraphClient,
    on_progress: Option<ProgressCallback>,
) -> Result<Vec<Group>> {
    let listed = client.list_groups().await?;
    let total = listed.len();

    let reportable: Vec<Group> = listed.into_iter().filter(is_reportable).collect();
    info!(
        "Fetched {} groups, {} reportable; counting members",
        total,
        reportable.len()
    );

    let counts = join_all(reportable.iter().map(|group| {
        let on_progress = on_progress.clone();
        async move {
            let count = fetch_member_count(client, group.id.as_deref()).await;
            if let Some(on_progress) = on_progress {
                on_progress();
            }
            count
        }
    }))
    .await;

    Ok(reportable
        .into_iter()
        .zip(counts)
        .map(|(group, member_count)| Group {
            member_count,
            ..group
        })
        .collect())
}
