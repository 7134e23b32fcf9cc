//! Channel selection and retry orchestration for chanroute.
//!
//! This crate does no IO of its own. The channel table is read through
//! [`ChannelQuery`], and upstream calls are supplied by the caller of
//! [`RetryLoop::run`].

pub mod auto_group;
pub mod channel;
pub mod errors;
pub mod retry;
pub mod selector;
pub mod session;

pub use auto_group::{AutoGroupResolver, ConfiguredAutoGroups};
pub use channel::{
    Channel, ChannelId, ChannelQuery, ChannelRegistry, Probe, RegistryError, RegistrySnapshot,
    TierFold,
};
pub use errors::{RetryError, SelectError};
pub use retry::{AttemptFailure, RetryLoop, RetryOutcome};
pub use selector::{AUTO_GROUP, ChannelSelector, SelectRequest, Selection};
pub use session::SelectionSession;

pub use chanroute_common::{
    ConfigError, GroupPolicy, RetryPriorityMode, SchedulerConfig, SchedulerConfigPatch,
};
