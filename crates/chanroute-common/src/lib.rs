use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_RETRY_TIMES: u32 = 3;
pub const DEFAULT_TIER_BUDGET: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid scheduler config field {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// How the explicit-group path turns the session into a tier argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryPriorityMode {
    /// Pass the raw retry counter; the registry folds it over the tier count.
    #[default]
    RoundRobin,
    /// Pass the tier pointer, which only moves once a tier is exhausted.
    Sequential,
}

impl RetryPriorityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryPriorityMode::RoundRobin => "round-robin",
            RetryPriorityMode::Sequential => "sequential",
        }
    }
}

impl fmt::Display for RetryPriorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetryPriorityMode {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => Ok(RetryPriorityMode::RoundRobin),
            "sequential" => Ok(RetryPriorityMode::Sequential),
            _ => Err(ConfigError::InvalidField {
                field: "priority_mode",
                value: raw.to_string(),
            }),
        }
    }
}

/// Group table consulted by the `auto` meta-group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPolicy {
    /// Fallback order tried by `auto`. Empty disables auto mode.
    #[serde(default)]
    pub auto_groups: Vec<String>,
    /// Groups every caller may use.
    #[serde(default)]
    pub usable_groups: Vec<String>,
    /// Extra usable groups granted to callers of a given group.
    #[serde(default)]
    pub special_usable_groups: HashMap<String, Vec<String>>,
}

impl GroupPolicy {
    pub fn auto_enabled(&self) -> bool {
        !self.auto_groups.is_empty()
    }
}

/// Final, merged scheduler configuration.
///
/// Merge order: CLI > ENV > config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Outer-loop budget: attempts continue while the retry counter is `<= retry_times`.
    pub retry_times: u32,
    /// Tiers probed per group before falling back. The last allowed tier is `tier_budget - 1`.
    pub tier_budget: u32,
    pub priority_mode: RetryPriorityMode,
    /// Default for requests that do not carry their own flag.
    pub cross_group_retry: bool,
    pub avoid_used_channels: bool,
    pub groups: GroupPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_times: DEFAULT_RETRY_TIMES,
            tier_budget: DEFAULT_TIER_BUDGET,
            priority_mode: RetryPriorityMode::default(),
            cross_group_retry: false,
            avoid_used_channels: true,
            groups: GroupPolicy::default(),
        }
    }
}

/// Optional layer used for merging scheduler config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfigPatch {
    pub retry_times: Option<u32>,
    pub tier_budget: Option<u32>,
    pub priority_mode: Option<RetryPriorityMode>,
    pub cross_group_retry: Option<bool>,
    pub avoid_used_channels: Option<bool>,
    pub groups: Option<GroupPolicy>,
}

impl SchedulerConfigPatch {
    pub fn overlay(&mut self, other: SchedulerConfigPatch) {
        if other.retry_times.is_some() {
            self.retry_times = other.retry_times;
        }
        if other.tier_budget.is_some() {
            self.tier_budget = other.tier_budget;
        }
        if other.priority_mode.is_some() {
            self.priority_mode = other.priority_mode;
        }
        if other.cross_group_retry.is_some() {
            self.cross_group_retry = other.cross_group_retry;
        }
        if other.avoid_used_channels.is_some() {
            self.avoid_used_channels = other.avoid_used_channels;
        }
        if other.groups.is_some() {
            self.groups = other.groups;
        }
    }

    pub fn into_config(self) -> Result<SchedulerConfig, ConfigError> {
        let tier_budget = self.tier_budget.unwrap_or(DEFAULT_TIER_BUDGET);
        if tier_budget == 0 {
            return Err(ConfigError::InvalidField {
                field: "tier_budget",
                value: tier_budget.to_string(),
            });
        }
        Ok(SchedulerConfig {
            retry_times: self.retry_times.unwrap_or(DEFAULT_RETRY_TIMES),
            tier_budget,
            priority_mode: self.priority_mode.unwrap_or_default(),
            cross_group_retry: self.cross_group_retry.unwrap_or(false),
            avoid_used_channels: self.avoid_used_channels.unwrap_or(true),
            groups: self.groups.unwrap_or_default(),
        })
    }
}
