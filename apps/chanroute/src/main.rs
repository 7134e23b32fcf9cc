use std::error::Error;

use chanroute_core::{RetryError, RetryLoop, SelectRequest, SelectionSession};
use clap::Parser;
use tracing::{info, warn};

mod bootstrap;
mod cli;
mod replay;

use crate::bootstrap::bootstrap;
use crate::cli::CliArgs;
use crate::replay::ScriptedUpstream;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("chanroute failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = CliArgs::parse();
    let boot = bootstrap(&args)?;

    let request = SelectRequest {
        token_group: &args.group,
        user_group: &args.user_group,
        model: &args.model,
        cross_group_retry: boot.config.cross_group_retry,
    };
    if !request.is_auto() {
        info!(
            group = %request.token_group,
            model = %request.model,
            tiers = boot.registry.snapshot().tier_count(request.token_group, request.model),
            "explicit group"
        );
    }

    let upstream = ScriptedUpstream::new(args.fail.iter().copied(), args.fatal.iter().copied());
    let retry = RetryLoop::new(&boot.selector, &boot.config);
    let mut session = SelectionSession::new();

    let result = retry
        .run(&mut session, &request, |selection| {
            let outcome = upstream.attempt(&selection);
            async move { outcome }
        })
        .await;

    match result {
        Ok(outcome) => {
            println!(
                "served by channel #{} ({}) in group {} after {} attempt(s)",
                outcome.value,
                outcome.selection.channel.name,
                outcome.selection.group,
                outcome.attempts
            );
            Ok(())
        }
        Err(RetryError::Exhausted { attempts, last }) => {
            warn!(
                attempts,
                used_channels = ?session.used_channels(),
                groups_exhausted = session.groups_exhausted(),
                "no channel left"
            );
            match last {
                Some(error) => {
                    Err(format!("exhausted after {attempts} attempt(s): {error}").into())
                }
                None => Err("no channel available".into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("chanroute=info,chanroute_core=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
