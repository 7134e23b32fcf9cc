#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chanroute_core::{
    Channel, ChannelId, ChannelQuery, ChannelRegistry, ChannelSelector, ConfiguredAutoGroups,
    GroupPolicy, Probe, RegistryError, SchedulerConfig, TierFold,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCall {
    pub group: String,
    pub tier: u32,
    pub fold: TierFold,
    pub excluded: HashSet<ChannelId>,
}

/// Wraps a query and records the arguments of every probe.
pub struct Recording<Q> {
    inner: Q,
    calls: Mutex<Vec<ProbeCall>>,
}

impl<Q> Recording<Q> {
    pub fn new(inner: Q) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn probed(&self) -> Vec<(String, u32)> {
        self.calls()
            .into_iter()
            .map(|call| (call.group, call.tier))
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl<Q: ChannelQuery> ChannelQuery for Recording<Q> {
    fn query(
        &self,
        group: &str,
        model: &str,
        tier: u32,
        fold: TierFold,
        excluded: &HashSet<ChannelId>,
    ) -> Result<Probe, RegistryError> {
        self.calls.lock().unwrap().push(ProbeCall {
            group: group.to_string(),
            tier,
            fold,
            excluded: excluded.clone(),
        });
        self.inner.query(group, model, tier, fold, excluded)
    }
}

/// Query that answers every probe with the same result.
pub struct Fixed(pub Result<Probe, RegistryError>);

impl ChannelQuery for Fixed {
    fn query(
        &self,
        _group: &str,
        _model: &str,
        _tier: u32,
        _fold: TierFold,
        _excluded: &HashSet<ChannelId>,
    ) -> Result<Probe, RegistryError> {
        self.0.clone()
    }
}

pub const MODEL: &str = "gpt-4o";

pub fn channel(id: ChannelId, group: &str, priority: i64) -> Channel {
    Channel {
        id,
        name: format!("{group}-{id}"),
        groups: vec![group.to_string()],
        models: vec![MODEL.to_string()],
        priority,
        weight: 1,
        enabled: true,
    }
}

pub fn config(auto_groups: &[&str], tier_budget: u32) -> SchedulerConfig {
    let groups: Vec<String> = auto_groups.iter().map(|g| g.to_string()).collect();
    SchedulerConfig {
        tier_budget,
        groups: GroupPolicy {
            auto_groups: groups.clone(),
            usable_groups: groups,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn registry(channels: Vec<Channel>) -> Arc<Recording<ChannelRegistry>> {
    Arc::new(Recording::new(ChannelRegistry::new(channels)))
}

pub fn selector<Q: ChannelQuery + 'static>(
    query: Arc<Q>,
    config: &SchedulerConfig,
) -> ChannelSelector {
    ChannelSelector::new(
        query,
        Arc::new(ConfiguredAutoGroups::new(config.groups.clone())),
        config,
    )
}
