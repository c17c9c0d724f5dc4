//! One remote builder, its last observed state, and the slots it has left.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    BuildRequest, BuildRequestId, BuilderDefinition, BuildbotEntry, TestGroupId, TriggerableConfig,
};
use crate::domain::ports::BuildFarm;
use crate::services::property_resolver::PropertyResolver;
use crate::services::state_poller::{PropertyNames, RemoteStatePoller};

/// A force-build chosen during a pass, waiting to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSubmission {
    pub request_id: BuildRequestId,
    pub builder: String,
    pub slave: Option<String>,
    pub properties: BTreeMap<String, String>,
    /// Status URL recorded once the build is queued.
    pub url: String,
}

pub struct BuilderSyncer {
    farm: Arc<dyn BuildFarm>,
    definition: BuilderDefinition,
    entries: Vec<BuildbotEntry>,
    poll_failed: bool,
    reserved: HashSet<Option<String>>,
}

impl BuilderSyncer {
    pub fn new(farm: Arc<dyn BuildFarm>, definition: BuilderDefinition) -> Self {
        Self {
            farm,
            definition,
            entries: Vec::new(),
            poll_failed: false,
            reserved: HashSet::new(),
        }
    }

    pub fn definition(&self) -> &BuilderDefinition {
        &self.definition
    }

    pub fn builder_name(&self) -> &str {
        &self.definition.name
    }

    pub fn entries(&self) -> &[BuildbotEntry] {
        &self.entries
    }

    pub fn poll_failed(&self) -> bool {
        self.poll_failed
    }

    /// Replace the observed state with a fresh poll and free every slot
    /// reserved in the previous pass.
    ///
    /// On failure the builder keeps no entries and refuses work until the
    /// next successful pull.
    pub async fn pull(&mut self, config: &TriggerableConfig) -> DomainResult<()> {
        self.reserved.clear();
        let poller = RemoteStatePoller::new(
            self.farm.as_ref(),
            PropertyNames::from_config(config),
            config.lookback_count,
        );
        match poller.poll(&self.definition.name).await {
            Ok(entries) => {
                self.entries = entries;
                self.poll_failed = false;
                Ok(())
            }
            Err(err) => {
                self.entries.clear();
                self.poll_failed = true;
                Err(err)
            }
        }
    }

    /// Whether the slot for `slave` (the whole builder without a slave list)
    /// can take a new request of `group`.
    ///
    /// Pending entries always occupy their slot, including ones whose request
    /// id is unknown, and a pending entry without a slave occupies every slot.
    /// In-progress entries occupy it unless they run a request of the same
    /// group.
    pub fn is_idle(
        &self,
        slave: Option<&str>,
        group: TestGroupId,
        groups_by_request: &HashMap<BuildRequestId, TestGroupId>,
    ) -> bool {
        if self.poll_failed || self.reserved.contains(&slave.map(str::to_string)) {
            return false;
        }
        !self
            .entries
            .iter()
            .filter(|entry| {
                slave.is_none()
                    || entry.slave_name.as_deref() == slave
                    || (entry.is_pending() && entry.slave_name.is_none())
            })
            .any(|entry| {
                entry.is_pending()
                    || (entry.is_in_progress()
                        && entry
                            .build_request_id
                            .and_then(|id| groups_by_request.get(&id))
                            != Some(&group))
            })
    }

    /// Reserve a slot for `request` and resolve its properties.
    ///
    /// `required_slave` pins the request to the slave its group already runs
    /// on. Returns `Ok(None)` when this builder cannot take the request now.
    pub fn schedule_if_available(
        &mut self,
        config: &TriggerableConfig,
        request: &BuildRequest,
        siblings: &[BuildRequest],
        required_slave: Option<&str>,
        groups_by_request: &HashMap<BuildRequestId, TestGroupId>,
    ) -> DomainResult<Option<PlannedSubmission>> {
        if !self.definition.matches_configuration(request) {
            return Ok(None);
        }

        let slave = match &self.definition.slave_list {
            Some(slaves) => {
                let Some(slave) = slaves
                    .iter()
                    .filter(|slave| required_slave.is_none_or(|required| required == slave.as_str()))
                    .find(|slave| self.is_idle(Some(slave.as_str()), request.test_group, groups_by_request))
                else {
                    debug!(builder = %self.definition.name, build_request_id = request.id, "no idle slave");
                    return Ok(None);
                };
                Some(slave.clone())
            }
            None => {
                if !self.is_idle(None, request.test_group, groups_by_request) {
                    debug!(builder = %self.definition.name, build_request_id = request.id, "builder is busy");
                    return Ok(None);
                }
                None
            }
        };

        let mut properties = PropertyResolver::new(config, &self.definition).resolve(request, siblings)?;
        if let (Some(slave), Some(argument)) = (&slave, &config.slave_argument) {
            properties.insert(argument.clone(), slave.clone());
        }

        self.reserved.insert(slave.clone());
        Ok(Some(PlannedSubmission {
            request_id: request.id,
            builder: self.definition.name.clone(),
            slave,
            properties,
            url: self.farm.urls().builder_page(&self.definition.name),
        }))
    }

    /// Post a planned force-build. The caller keeps the request untouched on
    /// failure so the next pass can try again.
    pub async fn submit(&self, planned: &PlannedSubmission) -> DomainResult<()> {
        self.farm
            .force_build(&planned.builder, &planned.properties)
            .await
            .inspect_err(|err| {
                warn!(
                    builder = %planned.builder,
                    build_request_id = planned.request_id,
                    error = %err,
                    "force build failed"
                );
            })
    }
}
