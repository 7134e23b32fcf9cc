use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chanroute_common::{RetryPriorityMode, SchedulerConfig, SchedulerConfigPatch};
use chanroute_core::{Channel, ChannelRegistry, ChannelSelector, ConfiguredAutoGroups};
use tracing::info;

use crate::cli::CliArgs;

pub(crate) struct Bootstrap {
    pub(crate) config: SchedulerConfig,
    pub(crate) registry: Arc<ChannelRegistry>,
    pub(crate) selector: ChannelSelector,
}

pub(crate) fn bootstrap(args: &CliArgs) -> anyhow::Result<Bootstrap> {
    // 1) config file (if any), then CLI/ENV on top. clap already resolves CLI > ENV per field.
    let mut merged = match args.config.as_deref() {
        Some(path) => load_config_file(path)?,
        None => SchedulerConfigPatch::default(),
    };
    merged.overlay(cli_patch(args)?);
    let config = merged
        .into_config()
        .context("finalize merged scheduler config")?;
    info!(
        retry_times = config.retry_times,
        tier_budget = config.tier_budget,
        priority_mode = %config.priority_mode,
        cross_group_retry = config.cross_group_retry,
        avoid_used_channels = config.avoid_used_channels,
        auto_groups = ?config.groups.auto_groups,
        "config loaded"
    );

    // 2) channel table -> in-memory registry (all selection reads come from here).
    let channels = load_channels(&args.channels)?;
    let enabled = channels.iter().filter(|channel| channel.enabled).count();
    let registry = Arc::new(ChannelRegistry::new(channels));
    info!(
        channels_total = registry.snapshot().channel_count(),
        channels_enabled = enabled,
        "registry ready"
    );

    let selector = ChannelSelector::new(
        registry.clone(),
        Arc::new(ConfiguredAutoGroups::new(config.groups.clone())),
        &config,
    );

    Ok(Bootstrap {
        config,
        registry,
        selector,
    })
}

fn load_config_file(path: &Path) -> anyhow::Result<SchedulerConfigPatch> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse config file {}", path.display()))
}

fn load_channels(path: &Path) -> anyhow::Result<Vec<Channel>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read channel table {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse channel table {}", path.display()))
}

fn cli_patch(args: &CliArgs) -> anyhow::Result<SchedulerConfigPatch> {
    let priority_mode = sanitize_optional_env_value(args.priority_mode.clone())
        .map(|raw| raw.parse::<RetryPriorityMode>())
        .transpose()
        .context("invalid CHANROUTE_PRIORITY_MODE value")?;
    Ok(SchedulerConfigPatch {
        retry_times: parse_u32_env_value(args.retry_times.clone(), "CHANROUTE_RETRY_TIMES")?,
        tier_budget: parse_u32_env_value(args.tier_budget.clone(), "CHANROUTE_TIER_BUDGET")?,
        priority_mode,
        cross_group_retry: parse_bool_env_value(
            args.cross_group_retry.clone(),
            "CHANROUTE_CROSS_GROUP_RETRY",
        )?,
        avoid_used_channels: parse_bool_env_value(
            args.avoid_used_channels.clone(),
            "CHANROUTE_AVOID_USED_CHANNELS",
        )?,
        groups: None,
    })
}

fn sanitize_optional_env_value(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    // Unresolved `${VAR}` placeholders count as unset.
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        return None;
    }
    Some(trimmed)
}

fn parse_u32_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<u32>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u32>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_bool_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<bool>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => return Err(anyhow::anyhow!("invalid {env_name} value: {raw}")),
    };
    Ok(Some(parsed))
}
