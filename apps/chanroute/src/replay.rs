use std::collections::HashSet;

use chanroute_core::{AttemptFailure, ChannelId, Selection};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum UpstreamError {
    #[error("channel #{0} failed")]
    Failed(ChannelId),
    #[error("channel #{0} rejected the request")]
    Rejected(ChannelId),
}

/// Upstream stand-in whose per-channel outcome is fixed up front.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedUpstream {
    failing: HashSet<ChannelId>,
    fatal: HashSet<ChannelId>,
}

impl ScriptedUpstream {
    pub(crate) fn new(
        failing: impl IntoIterator<Item = ChannelId>,
        fatal: impl IntoIterator<Item = ChannelId>,
    ) -> Self {
        Self {
            failing: failing.into_iter().collect(),
            fatal: fatal.into_iter().collect(),
        }
    }

    pub(crate) fn attempt(
        &self,
        selection: &Selection,
    ) -> Result<ChannelId, AttemptFailure<UpstreamError>> {
        let id = selection.channel.id;
        if self.fatal.contains(&id) {
            return Err(AttemptFailure::fatal(UpstreamError::Rejected(id)));
        }
        if self.failing.contains(&id) {
            return Err(AttemptFailure::retryable(UpstreamError::Failed(id)));
        }
        Ok(id)
    }
}
