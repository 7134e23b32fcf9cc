use std::collections::HashSet;

use crate::channel::ChannelId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Epoch {
    #[default]
    Running,
    /// A new retry epoch starts at zero; the next `increase_retry` is absorbed.
    Boundary,
}

#[derive(Debug, Clone, Default)]
struct AutoProgress {
    group_index: usize,
    selected_group: Option<String>,
    exhausted: bool,
}

/// Selection state for one inbound request.
///
/// Created when the request arrives, threaded by `&mut` through the retry
/// loop and the selector, and dropped with the request. Never shared across
/// requests, so nothing here is synchronized.
///
/// Invariants: the used set only grows, the tier pointer never moves
/// backwards, and the retry counter only goes down at an epoch boundary.
#[derive(Debug, Clone, Default)]
pub struct SelectionSession {
    retry: u32,
    epoch: Epoch,
    used_channels: HashSet<ChannelId>,
    priority_index: u32,
    auto: AutoProgress,
}

impl SelectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry(&self) -> u32 {
        self.retry
    }

    pub fn set_retry(&mut self, retry: u32) {
        self.retry = retry;
    }

    pub fn increase_retry(&mut self) {
        if self.epoch == Epoch::Boundary {
            self.epoch = Epoch::Running;
            return;
        }
        self.retry = self.retry.saturating_add(1);
    }

    /// Absorb the next `increase_retry` call.
    pub fn reset_retry_next_try(&mut self) {
        self.epoch = Epoch::Boundary;
    }

    pub fn is_epoch_boundary(&self) -> bool {
        self.epoch == Epoch::Boundary
    }

    pub fn add_used_channel(&mut self, id: ChannelId) {
        self.used_channels.insert(id);
    }

    pub fn is_channel_used(&self, id: ChannelId) -> bool {
        self.used_channels.contains(&id)
    }

    pub fn used_channels(&self) -> &HashSet<ChannelId> {
        &self.used_channels
    }

    pub fn increase_priority_index(&mut self) {
        self.priority_index = self.priority_index.saturating_add(1);
    }

    pub fn priority_index(&self) -> u32 {
        self.priority_index
    }

    /// Index into the caller's auto-group sequence currently being probed.
    pub fn auto_group_index(&self) -> usize {
        self.auto.group_index
    }

    /// Group that produced the most recent selection.
    pub fn selected_group(&self) -> Option<&str> {
        self.auto.selected_group.as_deref()
    }

    /// True once no group the request may use has a tier left to probe:
    /// an auto cascade ran past its last group, or the explicit group
    /// ran past its last tier.
    pub fn groups_exhausted(&self) -> bool {
        self.auto.exhausted
    }

    pub(crate) fn stay_in_group(&mut self, group_index: usize) {
        self.auto.group_index = group_index;
    }

    /// Move to `group_index` within the current selector call; its tier probe starts at zero.
    pub(crate) fn enter_group(&mut self, group_index: usize) {
        self.auto.group_index = group_index;
        self.retry = 0;
    }

    /// Schedule `group_index` for the next attempt as a fresh retry epoch.
    ///
    /// The counter is zeroed now and the failure-driven increment that follows
    /// the current attempt is absorbed, so the next probe runs at tier zero.
    pub fn begin_epoch(&mut self, group_index: usize) {
        self.enter_group(group_index);
        self.reset_retry_next_try();
    }

    pub(crate) fn record_selected_group(&mut self, group: &str) {
        self.auto.selected_group = Some(group.to_string());
    }

    pub(crate) fn mark_groups_exhausted(&mut self) {
        self.auto.exhausted = true;
    }
}
