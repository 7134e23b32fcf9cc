use std::collections::HashSet;

use chanroute_common::GroupPolicy;

/// Resolves the ordered fallback sequence used by the `auto` meta-group.
///
/// An empty sequence means auto mode is unavailable for the caller.
pub trait AutoGroupResolver: Send + Sync {
    fn resolve(&self, user_group: &str) -> Vec<String>;
}

/// Resolver backed by the configured [`GroupPolicy`].
///
/// The sequence keeps the configured `auto_groups` order and drops every group
/// the caller may not use. A caller may always use its own group, the global
/// usable groups, and whatever `special_usable_groups` grants it. Special
/// entries prefixed with `-:` revoke a group instead; `+:` is an explicit add.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredAutoGroups {
    policy: GroupPolicy,
}

impl ConfiguredAutoGroups {
    pub fn new(policy: GroupPolicy) -> Self {
        Self { policy }
    }

    pub fn usable_groups<'a>(&'a self, user_group: &'a str) -> HashSet<&'a str> {
        let mut usable: HashSet<&str> = self
            .policy
            .usable_groups
            .iter()
            .map(String::as_str)
            .collect();
        if !user_group.is_empty() {
            usable.insert(user_group);
        }
        if let Some(special) = self.policy.special_usable_groups.get(user_group) {
            for entry in special {
                if let Some(revoked) = entry.strip_prefix("-:") {
                    usable.remove(revoked);
                } else {
                    usable.insert(entry.strip_prefix("+:").unwrap_or(entry.as_str()));
                }
            }
        }
        usable
    }
}

impl AutoGroupResolver for ConfiguredAutoGroups {
    fn resolve(&self, user_group: &str) -> Vec<String> {
        if !self.policy.auto_enabled() {
            return Vec::new();
        }
        let usable = self.usable_groups(user_group);
        self.policy
            .auto_groups
            .iter()
            .filter(|group| usable.contains(group.as_str()))
            .cloned()
            .collect()
    }
}
