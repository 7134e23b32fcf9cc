mod registry;

pub use registry::{ChannelRegistry, RegistrySnapshot};

use std::collections::HashSet;
use std::sync::Arc;

use chanroute_common::RetryPriorityMode;
use serde::{Deserialize, Serialize};

pub type ChannelId = i64;

/// One upstream credential + endpoint able to serve some models for some groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    #[serde(default)]
    pub name: String,
    pub groups: Vec<String>,
    pub models: Vec<String>,
    /// Higher values are preferred; equal values form one tier.
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Answer of a single registry probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Hit(Arc<Channel>),
    /// Every channel at the tier is excluded.
    TierEmpty,
    /// Under [`TierFold::Exact`], the index is past the group's last tier.
    PastLastTier,
    /// The group has no eligible channel for the model at any tier.
    GroupEmpty,
}

/// How a tier argument maps onto the tiers a group actually has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierFold {
    /// `index % tiers`.
    Modulo,
    /// Indices past the last tier probe nothing.
    Exact,
}

impl TierFold {
    pub fn resolve(self, index: u32, tiers: usize) -> Option<usize> {
        if tiers == 0 {
            return None;
        }
        let index = index as usize;
        match self {
            TierFold::Modulo => Some(index % tiers),
            TierFold::Exact => (index < tiers).then_some(index),
        }
    }
}

impl From<RetryPriorityMode> for TierFold {
    fn from(mode: RetryPriorityMode) -> Self {
        match mode {
            RetryPriorityMode::RoundRobin => TierFold::Modulo,
            RetryPriorityMode::Sequential => TierFold::Exact,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("channel registry unavailable: {0}")]
    Unavailable(String),
}

/// Read path into the channel table.
///
/// Implementations are shared by every in-flight request and must tolerate
/// concurrent calls. Random tie-breaking within a tier is allowed, so callers
/// must not expect identical answers for identical arguments.
///
/// Under [`TierFold::Exact`] an index past the last tier must answer
/// [`Probe::PastLastTier`]; sequential callers stop on it.
pub trait ChannelQuery: Send + Sync {
    fn query(
        &self,
        group: &str,
        model: &str,
        tier: u32,
        fold: TierFold,
        excluded: &HashSet<ChannelId>,
    ) -> Result<Probe, RegistryError>;
}
