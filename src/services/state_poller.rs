//! Polling a builder's pending and recent builds into [`BuildbotEntry`] lists.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    property_value, BuildPhase, BuildRequestId, BuildbotEntry, BuildbotUrls, RawBuild, RawBuildSlot,
    RawPendingBuild, RecentBuilds, TriggerableConfig,
};
use crate::domain::ports::BuildFarm;

/// Names of the properties that carry request ids and slave names.
#[derive(Debug, Clone, Copy)]
pub struct PropertyNames<'a> {
    pub build_request: &'a str,
    pub slave: Option<&'a str>,
}

impl<'a> PropertyNames<'a> {
    pub fn from_config(config: &'a TriggerableConfig) -> Self {
        Self {
            build_request: &config.build_request_argument,
            slave: config.slave_argument.as_deref(),
        }
    }
}

/// Fetches one builder's state from the build farm.
pub struct RemoteStatePoller<'a> {
    farm: &'a dyn BuildFarm,
    names: PropertyNames<'a>,
    lookback_count: usize,
}

impl<'a> RemoteStatePoller<'a> {
    pub fn new(farm: &'a dyn BuildFarm, names: PropertyNames<'a>, lookback_count: usize) -> Self {
        Self {
            farm,
            names,
            lookback_count,
        }
    }

    /// Fetch both snapshots of `builder`; either failure fails the whole poll.
    pub async fn poll(&self, builder: &str) -> DomainResult<Vec<BuildbotEntry>> {
        let (pending, recent) = futures::try_join!(
            self.farm.pending_builds(builder),
            self.farm.recent_builds(builder, self.lookback_count)
        )?;
        debug!(
            builder = %builder,
            pending = pending.len(),
            recent = recent.len(),
            "polled builder"
        );
        Ok(merge_entries(builder, self.farm.urls(), self.names, &pending, &recent))
    }
}

/// Normalize raw snapshots into entries: pending builds by submission time,
/// then started builds by build number.
///
/// A started build supersedes pending entries for the same request, and a
/// newer build supersedes an older one.
pub fn merge_entries(
    builder: &str,
    urls: &BuildbotUrls,
    names: PropertyNames<'_>,
    pending: &[RawPendingBuild],
    recent: &RecentBuilds,
) -> Vec<BuildbotEntry> {
    let mut seen: HashSet<BuildRequestId> = HashSet::new();
    // Offsets ascend from the oldest build, so walk them backwards.
    let mut builds: Vec<BuildbotEntry> = recent
        .values()
        .rev()
        .filter_map(|slot| match slot {
            RawBuildSlot::Build(build) if build.number.is_some() => Some(build_entry(builder, urls, names, build)),
            RawBuildSlot::Build(_) => {
                debug!(builder = %builder, "dropping build without a number");
                None
            }
            RawBuildSlot::Missing { .. } => None,
        })
        .filter(|entry| entry.build_request_id.is_none_or(|id| seen.insert(id)))
        .collect();
    builds.sort_by_key(|entry| entry.build_number.unwrap_or(u64::MAX));

    let mut entries: Vec<BuildbotEntry> = pending
        .iter()
        .map(|raw| pending_entry(builder, urls, names, raw))
        .filter(|entry| entry.build_request_id.is_none_or(|id| !seen.contains(&id)))
        .collect();
    entries.sort_by(|a, b| {
        a.submitted_at
            .unwrap_or(f64::MAX)
            .total_cmp(&b.submitted_at.unwrap_or(f64::MAX))
    });

    entries.extend(builds);
    entries
}

fn request_id(properties: &[Vec<serde_json::Value>], names: PropertyNames<'_>) -> Option<BuildRequestId> {
    property_value(properties, names.build_request).and_then(|id| id.parse().ok())
}

fn pending_entry(builder: &str, urls: &BuildbotUrls, names: PropertyNames<'_>, raw: &RawPendingBuild) -> BuildbotEntry {
    BuildbotEntry {
        builder: builder.to_string(),
        build_request_id: request_id(&raw.properties, names),
        build_number: None,
        slave_name: names.slave.and_then(|slave| property_value(&raw.properties, slave)),
        phase: BuildPhase::Pending,
        url: urls.builder_page(builder),
        submitted_at: raw.submitted_at,
    }
}

fn build_entry(builder: &str, urls: &BuildbotUrls, names: PropertyNames<'_>, raw: &RawBuild) -> BuildbotEntry {
    let phase = if raw.is_finished() {
        BuildPhase::Finished {
            succeeded: raw.succeeded(),
        }
    } else {
        BuildPhase::InProgress
    };
    BuildbotEntry {
        builder: builder.to_string(),
        build_request_id: request_id(&raw.properties, names),
        build_number: raw.number,
        slave_name: raw
            .slave
            .clone()
            .or_else(|| names.slave.and_then(|slave| property_value(&raw.properties, slave))),
        phase,
        url: raw
            .number
            .map_or_else(|| urls.builder_page(builder), |number| urls.build_page(builder, number)),
        submitted_at: None,
    }
}
