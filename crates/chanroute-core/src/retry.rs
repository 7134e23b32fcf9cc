use std::fmt;
use std::future::Future;

use chanroute_common::{RetryPriorityMode, SchedulerConfig};
use tracing::{info, warn};

use crate::errors::RetryError;
use crate::selector::{ChannelSelector, SelectRequest, Selection};
use crate::session::SelectionSession;

#[derive(Debug, Clone)]
pub struct AttemptFailure<E> {
    pub error: E,
    /// Whether another channel may be tried after this failure.
    pub retryable: bool,
}

impl<E> AttemptFailure<E> {
    pub fn retryable(error: E) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    pub fn fatal(error: E) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub selection: Selection,
    /// Upstream calls made, including the successful one.
    pub attempts: u32,
}

/// Drives a [`ChannelSelector`] around one request's upstream attempts.
///
/// Every failed attempt records its channel as used (when enabled) and
/// advances the retry counter. An empty probe advances the tier pointer in
/// sequential mode and the retry counter otherwise. The loop ends on success,
/// on a non-retryable failure, on a selector error, once the retry counter
/// passes `retry_times`, or once the session reports every group exhausted.
pub struct RetryLoop<'a> {
    selector: &'a ChannelSelector,
    retry_times: u32,
    avoid_used_channels: bool,
}

impl<'a> RetryLoop<'a> {
    pub fn new(selector: &'a ChannelSelector, config: &SchedulerConfig) -> Self {
        Self {
            selector,
            retry_times: config.retry_times,
            avoid_used_channels: config.avoid_used_channels,
        }
    }

    pub async fn run<T, E, F, Fut>(
        &self,
        session: &mut SelectionSession,
        request: &SelectRequest<'_>,
        mut attempt: F,
    ) -> Result<RetryOutcome<T>, RetryError<E>>
    where
        E: fmt::Debug + fmt::Display,
        F: FnMut(Selection) -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure<E>>>,
    {
        let sequential = !request.is_auto()
            && self.selector.priority_mode() == RetryPriorityMode::Sequential;
        let mut attempts = 0u32;
        let mut last_error: Option<E> = None;

        while session.retry() <= self.retry_times {
            let selected = self
                .selector
                .select(session, request)
                .map_err(RetryError::Select)?;
            let Some(selection) = selected else {
                if session.groups_exhausted() {
                    break;
                }
                if sequential {
                    session.increase_priority_index();
                } else {
                    session.increase_retry();
                }
                continue;
            };

            attempts += 1;
            info!(
                event = "upstream_attempt",
                attempt = attempts,
                channel_id = selection.channel.id,
                channel = %selection.channel.name,
                group = %selection.group,
                model = %request.model,
                retry = session.retry()
            );

            match attempt(selection.clone()).await {
                Ok(value) => {
                    return Ok(RetryOutcome {
                        value,
                        selection,
                        attempts,
                    });
                }
                Err(failure) => {
                    warn!(
                        event = "upstream_attempt_failed",
                        attempt = attempts,
                        channel_id = selection.channel.id,
                        group = %selection.group,
                        retryable = failure.retryable,
                        error = %failure.error
                    );
                    if !failure.retryable {
                        return Err(RetryError::Upstream(failure.error));
                    }
                    if self.avoid_used_channels {
                        session.add_used_channel(selection.channel.id);
                    }
                    last_error = Some(failure.error);
                    session.increase_retry();
                }
            }
        }

        Err(RetryError::Exhausted {
            attempts,
            last: last_error,
        })
    }
}
