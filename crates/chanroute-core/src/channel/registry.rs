use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::Rng;

use super::{Channel, ChannelId, ChannelQuery, Probe, RegistryError, TierFold};

#[derive(Debug)]
struct Tier {
    priority: i64,
    channels: Vec<Arc<Channel>>,
}

/// Immutable view of the channel table, indexed group -> model -> tiers.
///
/// Tiers are ordered by priority, highest first, so tier 0 is always the
/// preferred one. Disabled channels are left out of the index entirely.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    index: HashMap<String, HashMap<String, Vec<Tier>>>,
    channel_count: usize,
}

impl RegistrySnapshot {
    pub fn new(channels: Vec<Channel>) -> Self {
        let channel_count = channels.len();
        let mut flat: HashMap<String, HashMap<String, Vec<Arc<Channel>>>> = HashMap::new();
        for channel in channels.into_iter().filter(|channel| channel.enabled) {
            let channel = Arc::new(channel);
            for group in &channel.groups {
                let by_model = flat.entry(group.clone()).or_default();
                for model in &channel.models {
                    let ids = by_model.entry(model.clone()).or_default();
                    if !ids.iter().any(|existing| existing.id == channel.id) {
                        ids.push(channel.clone());
                    }
                }
            }
        }

        let index = flat
            .into_iter()
            .map(|(group, by_model)| {
                let by_model = by_model
                    .into_iter()
                    .map(|(model, channels)| (model, build_tiers(channels)))
                    .collect();
                (group, by_model)
            })
            .collect();

        Self {
            index,
            channel_count,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Number of distinct priority tiers serving `model` in `group`.
    pub fn tier_count(&self, group: &str, model: &str) -> usize {
        self.tiers(group, model).map_or(0, <[Tier]>::len)
    }

    fn tiers(&self, group: &str, model: &str) -> Option<&[Tier]> {
        self.index
            .get(group)
            .and_then(|by_model| by_model.get(model))
            .map(Vec::as_slice)
    }
}

fn build_tiers(mut channels: Vec<Arc<Channel>>) -> Vec<Tier> {
    channels.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
    let mut tiers: Vec<Tier> = Vec::new();
    for channel in channels {
        match tiers.last_mut() {
            Some(tier) if tier.priority == channel.priority => tier.channels.push(channel),
            _ => tiers.push(Tier {
                priority: channel.priority,
                channels: vec![channel],
            }),
        }
    }
    tiers
}

/// In-memory channel table answering [`ChannelQuery`] probes.
///
/// Readers load the current snapshot without locking; `replace` swaps in a
/// rebuilt table atomically. The caller's [`TierFold`] decides how a tier
/// argument maps onto a group's tiers.
pub struct ChannelRegistry {
    snapshot: ArcSwap<RegistrySnapshot>,
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("ChannelRegistry")
            .field("channel_count", &snapshot.channel_count)
            .field("group_count", &snapshot.index.len())
            .finish()
    }
}

impl ChannelRegistry {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            snapshot: ArcSwap::new(Arc::new(RegistrySnapshot::new(channels))),
        }
    }

    pub fn replace(&self, channels: Vec<Channel>) {
        self.snapshot.store(Arc::new(RegistrySnapshot::new(channels)));
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }
}

impl ChannelQuery for ChannelRegistry {
    fn query(
        &self,
        group: &str,
        model: &str,
        tier: u32,
        fold: TierFold,
        excluded: &HashSet<ChannelId>,
    ) -> Result<Probe, RegistryError> {
        let snapshot = self.snapshot.load();
        let Some(tiers) = snapshot.tiers(group, model).filter(|tiers| !tiers.is_empty()) else {
            return Ok(Probe::GroupEmpty);
        };
        let Some(position) = fold.resolve(tier, tiers.len()) else {
            return Ok(Probe::PastLastTier);
        };

        let candidates: Vec<&Arc<Channel>> = tiers[position]
            .channels
            .iter()
            .filter(|channel| !excluded.contains(&channel.id))
            .collect();
        if candidates.is_empty() {
            return Ok(Probe::TierEmpty);
        }

        let weights: Vec<u32> = candidates.iter().map(|channel| channel.weight).collect();
        let chosen = candidates[pick_weighted_index(&weights)];
        Ok(Probe::Hit(chosen.clone()))
    }
}

fn pick_weighted_index(weights: &[u32]) -> usize {
    if weights.is_empty() {
        return 0;
    }

    let total: u64 = weights.iter().map(|weight| *weight as u64).sum();
    if total == 0 {
        return rand::rng().random_range(0..weights.len());
    }

    let mut roll = rand::rng().random_range(0..total);
    for (index, weight) in weights.iter().enumerate() {
        let weight = *weight as u64;
        if roll < weight {
            return index;
        }
        roll -= weight;
    }

    weights.len() - 1
}
