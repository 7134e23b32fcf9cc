use std::fmt;

use crate::channel::RegistryError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SelectError {
    /// `auto` was requested but no group is available to the caller.
    #[error("auto groups are not available for group {user_group:?}")]
    AutoGroupsUnavailable { user_group: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SelectError {
    pub fn is_config_error(&self) -> bool {
        matches!(self, SelectError::AutoGroupsUnavailable { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: fmt::Debug + fmt::Display> {
    #[error("channel selection failed: {0}")]
    Select(#[source] SelectError),
    #[error("upstream attempt failed: {0}")]
    Upstream(E),
    #[error("no channel available after {attempts} attempts")]
    Exhausted { attempts: u32, last: Option<E> },
}

impl<E: fmt::Debug + fmt::Display> RetryError<E> {
    /// Error from the last upstream attempt, if any attempt was made.
    pub fn upstream_error(&self) -> Option<&E> {
        match self {
            RetryError::Upstream(error) => Some(error),
            RetryError::Exhausted { last, .. } => last.as_ref(),
            RetryError::Select(_) => None,
        }
    }
}
