mod support;

use std::collections::HashSet;
use std::sync::Arc;

use chanroute_core::{
    AUTO_GROUP, AttemptFailure, ChannelId, Probe, RegistryError, RetryError, RetryLoop,
    RetryPriorityMode, SchedulerConfig, SelectRequest, Selection, SelectionSession,
};
use support::{Fixed, MODEL, channel, config, registry, selector};

fn request(token_group: &str, cross_group_retry: bool) -> SelectRequest<'_> {
    SelectRequest {
        token_group,
        user_group: "default",
        model: MODEL,
        cross_group_retry,
    }
}

/// Runs one request where every channel in `failing` returns a retryable error.
async fn replay(
    config: &SchedulerConfig,
    channels: Vec<chanroute_core::Channel>,
    request: SelectRequest<'_>,
    failing: &[ChannelId],
) -> (
    Result<chanroute_core::RetryOutcome<ChannelId>, RetryError<String>>,
    Vec<ChannelId>,
    SelectionSession,
) {
    let query = registry(channels);
    let selector = selector(query, config);
    let retry = RetryLoop::new(&selector, config);
    let failing: HashSet<ChannelId> = failing.iter().copied().collect();
    let mut session = SelectionSession::new();
    let mut tried = Vec::new();

    let result = retry
        .run(&mut session, &request, |selection: Selection| {
            let id = selection.channel.id;
            tried.push(id);
            let fail = failing.contains(&id);
            async move {
                if fail {
                    Err(AttemptFailure::retryable(format!("channel {id} failed")))
                } else {
                    Ok(id)
                }
            }
        })
        .await;
    (result, tried, session)
}

#[tokio::test]
async fn first_healthy_channel_wins() {
    let config = config(&[], 3);
    let (result, tried, _) = replay(
        &config,
        vec![channel(1, "default", 0)],
        request("default", false),
        &[],
    )
    .await;

    let outcome = result.unwrap();
    assert_eq!(outcome.value, 1);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.selection.group, "default");
    assert_eq!(tried, vec![1]);
}

#[tokio::test]
async fn round_robin_fails_over_to_next_tier() {
    let config = config(&[], 3);
    let (result, tried, session) = replay(
        &config,
        vec![channel(1, "default", 10), channel(2, "default", 0)],
        request("default", false),
        &[1],
    )
    .await;

    let outcome = result.unwrap();
    assert_eq!(outcome.value, 2);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(tried, vec![1, 2]);
    assert!(session.is_channel_used(1));
    assert!(!session.is_channel_used(2));
}

#[tokio::test]
async fn exhausted_reports_last_upstream_error() {
    let mut config = config(&[], 3);
    config.retry_times = 2;
    let (result, tried, session) = replay(
        &config,
        vec![channel(1, "default", 0)],
        request("default", false),
        &[1],
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, RetryError::Exhausted { attempts: 1, .. }));
    assert_eq!(err.upstream_error().map(String::as_str), Some("channel 1 failed"));
    assert_eq!(tried, vec![1]);
    assert_eq!(session.retry(), 3);
}

#[tokio::test]
async fn same_channel_is_retried_when_avoidance_is_off() {
    let mut config = config(&[], 3);
    config.retry_times = 2;
    config.avoid_used_channels = false;
    let (result, tried, session) = replay(
        &config,
        vec![channel(1, "default", 0)],
        request("default", false),
        &[1],
    )
    .await;

    assert!(matches!(
        result,
        Err(RetryError::Exhausted { attempts: 3, .. })
    ));
    assert_eq!(tried, vec![1, 1, 1]);
    assert!(session.used_channels().is_empty());
}

#[tokio::test]
async fn sequential_stops_past_the_last_tier() {
    let mut config = config(&[], 3);
    config.priority_mode = RetryPriorityMode::Sequential;
    config.retry_times = 10;
    let (result, tried, session) = replay(
        &config,
        vec![channel(1, "default", 5), channel(2, "default", 5)],
        request("default", false),
        &[1, 2],
    )
    .await;

    assert!(matches!(
        result,
        Err(RetryError::Exhausted { attempts: 2, .. })
    ));
    let tried: HashSet<_> = tried.into_iter().collect();
    assert_eq!(tried, HashSet::from([1, 2]));
    assert!(session.groups_exhausted());
    assert_eq!(session.priority_index(), 1);
    assert_eq!(session.retry(), 2);
}

#[tokio::test]
async fn sequential_reaches_tiers_beyond_the_tier_budget() {
    let mut config = config(&[], 3);
    config.priority_mode = RetryPriorityMode::Sequential;
    config.retry_times = 10;
    let (result, tried, session) = replay(
        &config,
        vec![
            channel(1, "default", 30),
            channel(2, "default", 20),
            channel(3, "default", 10),
            channel(4, "default", 0),
        ],
        request("default", false),
        &[1, 2, 3],
    )
    .await;

    let outcome = result.unwrap();
    assert_eq!(outcome.value, 4);
    assert_eq!(outcome.attempts, 4);
    assert_eq!(tried, vec![1, 2, 3, 4]);
    assert_eq!(session.priority_index(), 3);
    assert!(!session.groups_exhausted());
}

#[tokio::test]
async fn explicit_group_without_channels_stops_early() {
    let mut config = config(&[], 3);
    config.retry_times = 50;
    let (result, tried, session) = replay(
        &config,
        vec![channel(1, "vip", 0)],
        request("default", false),
        &[],
    )
    .await;

    assert!(matches!(
        result,
        Err(RetryError::Exhausted {
            attempts: 0,
            last: None
        })
    ));
    assert!(tried.is_empty());
    assert!(session.groups_exhausted());
    assert_eq!(session.retry(), 0);
}

#[tokio::test]
async fn sequential_moves_to_lower_tier_only_when_exhausted() {
    let mut config = config(&[], 3);
    config.priority_mode = RetryPriorityMode::Sequential;
    let (result, tried, session) = replay(
        &config,
        vec![channel(1, "default", 5), channel(3, "default", 1)],
        request("default", false),
        &[1],
    )
    .await;

    assert_eq!(result.unwrap().value, 3);
    assert_eq!(tried, vec![1, 3]);
    assert_eq!(session.priority_index(), 1);
}

#[tokio::test]
async fn fatal_failure_stops_immediately() {
    let config = config(&[], 3);
    let query = registry(vec![channel(1, "default", 1), channel(2, "default", 0)]);
    let selector = selector(query, &config);
    let retry = RetryLoop::new(&selector, &config);
    let mut session = SelectionSession::new();

    let result: Result<_, RetryError<String>> = retry
        .run(&mut session, &request("default", false), |_selection| async {
            Err::<(), _>(AttemptFailure::fatal("bad request".to_string()))
        })
        .await;

    assert!(matches!(result, Err(RetryError::Upstream(ref msg)) if msg == "bad request"));
    assert!(session.used_channels().is_empty());
    assert_eq!(session.retry(), 0);
}

#[tokio::test]
async fn auto_crosses_groups_after_last_tier() {
    let config = config(&["a", "b"], 2);
    let (result, tried, session) = replay(
        &config,
        vec![
            channel(1, "a", 10),
            channel(2, "a", 0),
            channel(3, "b", 0),
        ],
        request(AUTO_GROUP, true),
        &[1, 2],
    )
    .await;

    let outcome = result.unwrap();
    assert_eq!(outcome.value, 3);
    assert_eq!(outcome.selection.group, "b");
    assert_eq!(tried, vec![1, 2, 3]);
    assert_eq!(session.auto_group_index(), 1);
    assert_eq!(session.selected_group(), Some("b"));
}

#[tokio::test]
async fn auto_stops_once_every_group_is_exhausted() {
    let mut config = config(&["a", "b"], 2);
    config.retry_times = 50;
    let (result, tried, session) = replay(
        &config,
        vec![channel(1, "a", 0), channel(2, "b", 0)],
        request(AUTO_GROUP, false),
        &[1, 2],
    )
    .await;

    assert!(matches!(
        result,
        Err(RetryError::Exhausted { attempts: 2, .. })
    ));
    assert_eq!(tried, vec![1, 2]);
    assert!(session.groups_exhausted());
}

#[tokio::test]
async fn selector_error_aborts_the_loop() {
    let config = config(&[], 3);
    let query = Arc::new(Fixed(Err(RegistryError::Unavailable("db down".to_string()))));
    let selector = selector(query, &config);
    let retry = RetryLoop::new(&selector, &config);
    let mut session = SelectionSession::new();
    let mut calls = 0;

    let result: Result<_, RetryError<String>> = retry
        .run(&mut session, &request("default", false), |_selection| {
            calls += 1;
            async { Ok::<_, AttemptFailure<String>>(()) }
        })
        .await;

    assert!(matches!(result, Err(RetryError::Select(_))));
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn auto_without_groups_surfaces_config_error() {
    let config = config(&[], 3);
    let query = Arc::new(Fixed(Ok(Probe::GroupEmpty)));
    let selector = selector(query, &config);
    let retry = RetryLoop::new(&selector, &config);
    let mut session = SelectionSession::new();

    let result: Result<(), RetryError<String>> = retry
        .run(&mut session, &request(AUTO_GROUP, false), |_selection| async {
            Ok::<_, AttemptFailure<String>>(())
        })
        .await
        .map(|outcome| outcome.value);

    match result {
        Err(RetryError::Select(err)) => assert!(err.is_config_error()),
        other => panic!("unexpected result: {other:?}"),
    }
}
