use std::sync::Arc;

use chanroute_common::{RetryPriorityMode, SchedulerConfig};
use tracing::debug;

use crate::auto_group::AutoGroupResolver;
use crate::channel::{Channel, ChannelQuery, Probe, TierFold};
use crate::errors::SelectError;
use crate::session::SelectionSession;

/// Reserved group name that triggers the cascading fallback path.
pub const AUTO_GROUP: &str = "auto";

#[derive(Debug, Clone, Copy)]
pub struct SelectRequest<'a> {
    /// Group the caller's token routes to; may be [`AUTO_GROUP`].
    pub token_group: &'a str,
    /// Group the caller belongs to, used to resolve the auto sequence.
    pub user_group: &'a str,
    pub model: &'a str,
    pub cross_group_retry: bool,
}

impl SelectRequest<'_> {
    pub fn is_auto(&self) -> bool {
        self.token_group == AUTO_GROUP
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub channel: Arc<Channel>,
    /// Concrete group the channel was drawn from (never `auto`).
    pub group: String,
}

/// Picks the next channel for a request from its [`SelectionSession`].
///
/// `Ok(None)` is exhaustion, not failure: the current tier (or, in auto mode,
/// every remaining group) has nothing eligible. The retry loop decides whether
/// to probe again; once nothing is left at any tier the session reports
/// [`SelectionSession::groups_exhausted`].
pub struct ChannelSelector {
    query: Arc<dyn ChannelQuery>,
    resolver: Arc<dyn AutoGroupResolver>,
    priority_mode: RetryPriorityMode,
    fold: TierFold,
    tier_budget: u32,
}

impl ChannelSelector {
    pub fn new(
        query: Arc<dyn ChannelQuery>,
        resolver: Arc<dyn AutoGroupResolver>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            query,
            resolver,
            priority_mode: config.priority_mode,
            fold: TierFold::from(config.priority_mode),
            tier_budget: config.tier_budget.max(1),
        }
    }

    pub fn priority_mode(&self) -> RetryPriorityMode {
        self.priority_mode
    }

    pub fn select(
        &self,
        session: &mut SelectionSession,
        request: &SelectRequest<'_>,
    ) -> Result<Option<Selection>, SelectError> {
        if request.is_auto() {
            self.select_auto(session, request)
        } else {
            self.select_explicit(session, request)
        }
    }

    fn select_explicit(
        &self,
        session: &mut SelectionSession,
        request: &SelectRequest<'_>,
    ) -> Result<Option<Selection>, SelectError> {
        // round-robin hands the raw counter to the registry, which folds it over the tiers
        let tier = match self.priority_mode {
            RetryPriorityMode::Sequential => session.priority_index(),
            RetryPriorityMode::RoundRobin => session.retry(),
        };
        let probe = self.query.query(
            request.token_group,
            request.model,
            tier,
            self.fold,
            session.used_channels(),
        )?;
        let channel = match probe {
            Probe::Hit(channel) => channel,
            Probe::TierEmpty => {
                debug!(
                    event = "tier_empty",
                    group = %request.token_group,
                    model = %request.model,
                    tier,
                    mode = %self.priority_mode
                );
                return Ok(None);
            }
            Probe::PastLastTier | Probe::GroupEmpty => {
                debug!(
                    event = "group_exhausted",
                    group = %request.token_group,
                    model = %request.model,
                    tier,
                    mode = %self.priority_mode
                );
                session.mark_groups_exhausted();
                return Ok(None);
            }
        };

        session.record_selected_group(request.token_group);
        Ok(Some(Selection {
            channel,
            group: request.token_group.to_string(),
        }))
    }

    fn select_auto(
        &self,
        session: &mut SelectionSession,
        request: &SelectRequest<'_>,
    ) -> Result<Option<Selection>, SelectError> {
        let groups = self.resolver.resolve(request.user_group);
        if groups.is_empty() {
            return Err(SelectError::AutoGroupsUnavailable {
                user_group: request.user_group.to_string(),
            });
        }

        let start = session.auto_group_index();
        let mut index = start;
        while let Some(group) = groups.get(index) {
            // a group entered during this call always starts at tier zero
            let priority_retry = if index == start { session.retry() } else { 0 };
            let last_tier = priority_retry.saturating_add(1) >= self.tier_budget;
            debug!(
                event = "auto_probe",
                group = %group,
                model = %request.model,
                priority_retry
            );

            match self.query.query(
                group,
                request.model,
                priority_retry,
                self.fold,
                session.used_channels(),
            )? {
                Probe::Hit(channel) => {
                    session.record_selected_group(group);
                    if request.cross_group_retry && last_tier {
                        debug!(
                            event = "auto_group_handoff",
                            group = %group,
                            next_index = index + 1,
                            priority_retry
                        );
                        session.begin_epoch(index + 1);
                    } else {
                        session.stay_in_group(index);
                    }
                    return Ok(Some(Selection {
                        channel,
                        group: group.clone(),
                    }));
                }
                Probe::TierEmpty | Probe::PastLastTier if !last_tier => {
                    debug!(
                        event = "auto_tier_empty",
                        group = %group,
                        model = %request.model,
                        priority_retry
                    );
                    session.stay_in_group(index);
                    return Ok(None);
                }
                Probe::TierEmpty | Probe::PastLastTier | Probe::GroupEmpty => {
                    debug!(
                        event = "auto_group_exhausted",
                        group = %group,
                        model = %request.model,
                        priority_retry
                    );
                    session.enter_group(index + 1);
                    index += 1;
                }
            }
        }

        session.mark_groups_exhausted();
        Ok(None)
    }
}
