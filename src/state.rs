use tracing::{debug, info};

use crate::error::Result;
use crate::filter;
use crate::graph::GraphClient;
use crate::models::{FilterCriteria, Group};
use crate::pipeline::{self, ProgressCallback};
use crate::table::{populate_table, ReportTable};

/// The working set behind the report: everything fetched, the current filter,
/// and what that filter lets through
#[derive(Debug, Clone, Default)]
pub struct ReportState {
    all_groups: Vec<Group>,
    filtered_groups: Vec<Group>,
    criteria: FilterCriteria,
    loaded: bool,
}

impl ReportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-run the fetch pipeline
    ///
    /// On success the group list is replaced wholesale and the filter is reset.
    /// On failure the previous groups and criteria are kept.
    pub async fn refresh(
        &mut self,
        client: &dyn GraphClient,
        on_progress: Option<ProgressCallback>,
    ) -> Result<usize> {
        let groups = pipeline::fetch_groups_with_progress(client, on_progress).await?;

        self.all_groups = groups;
        self.criteria = FilterCriteria::default();
        self.filtered_groups = self.all_groups.clone();
        self.loaded = true;

        info!("Loaded {} groups", self.all_groups.len());
        Ok(self.all_groups.len())
    }

    /// Store `criteria` and recompute the filtered list from all groups
    pub fn apply_filters(&mut self, criteria: FilterCriteria) -> usize {
        self.filtered_groups = filter::apply_filters(&self.all_groups, &criteria);
        debug!(
            "Filter {:?} kept {} of {} groups",
            criteria,
            self.filtered_groups.len(),
            self.all_groups.len()
        );
        self.criteria = criteria;
        self.filtered_groups.len()
    }

    /// Table of the currently filtered groups
    pub fn table(&self) -> ReportTable {
        populate_table(&self.filtered_groups)
    }

    pub fn all_groups(&self) -> &[Group] {
        &self.all_groups
    }

    pub fn filtered_groups(&self) -> &[Group] {
        &self.filtered_groups
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Whether a fetch has succeeded at least once
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}
