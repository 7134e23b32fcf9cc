use std::path::PathBuf;

use chanroute_core::ChannelId;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "chanroute",
    version,
    about = "Replay one request through the channel scheduler"
)]
pub(crate) struct CliArgs {
    /// Channel table (JSON array).
    #[arg(long, env = "CHANROUTE_CHANNELS")]
    pub(crate) channels: PathBuf,

    /// Scheduler config file (JSON). CLI and ENV values override it.
    #[arg(long, env = "CHANROUTE_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    #[arg(long, env = "CHANROUTE_RETRY_TIMES")]
    pub(crate) retry_times: Option<String>,

    /// Tiers probed per group before falling back.
    #[arg(long, env = "CHANROUTE_TIER_BUDGET")]
    pub(crate) tier_budget: Option<String>,

    /// `round-robin` or `sequential`.
    #[arg(long, env = "CHANROUTE_PRIORITY_MODE")]
    pub(crate) priority_mode: Option<String>,

    /// Bare `--cross-group-retry` means `true`.
    #[arg(
        long,
        env = "CHANROUTE_CROSS_GROUP_RETRY",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub(crate) cross_group_retry: Option<String>,

    #[arg(long, env = "CHANROUTE_AVOID_USED_CHANNELS")]
    pub(crate) avoid_used_channels: Option<String>,

    /// Token group; `auto` cascades over the configured auto groups.
    #[arg(long, default_value = "default")]
    pub(crate) group: String,

    #[arg(long, default_value = "default")]
    pub(crate) user_group: String,

    #[arg(long)]
    pub(crate) model: String,

    /// Channels whose attempts fail and may be retried elsewhere.
    #[arg(long, value_delimiter = ',')]
    pub(crate) fail: Vec<ChannelId>,

    /// Channels whose attempts fail and end the request.
    #[arg(long, value_delimiter = ',')]
    pub(crate) fatal: Vec<ChannelId>,
}
