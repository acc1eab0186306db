mod cli;
mod logging;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fedflare_sync::purge::Credentials;
use fedflare_sync::scheduler::RunOutcome;
use fedflare_sync::warm::{CacheStatusAlert, CacheStatusPolicy};
use fedflare_sync::{Config, Mode, engine};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref(), cli.overrides())
        .context("failed to load configuration")?;
    let mode = if cli.service {
        Mode::Service {
            interval: config.interval(),
        }
    } else {
        Mode::Once
    };

    let mut engine = engine::build(&config, &cli.domain, mode, Credentials::from_env())
        .await
        .context("setup failed")?;

    let shutdown = CancellationToken::new();
    watch_signals(shutdown.clone());

    let outcome = engine.run(shutdown).await.context("run aborted")?;
    Ok(ExitCode::from(exit_status(mode, config.cache_status, &outcome)))
}

/// Process exit status for a finished run.
///
/// Service runs only end on shutdown and exit 0. A single run exits 1 when
/// its iteration failed; under the `fail` policy it also exits 1 for a
/// missing cache status and 2 for a bypassed cache.
fn exit_status(mode: Mode, policy: CacheStatusPolicy, outcome: &RunOutcome) -> u8 {
    if matches!(mode, Mode::Service { .. }) {
        return 0;
    }
    let summary = match &outcome.last {
        Some(Ok(summary)) => summary,
        Some(Err(_)) => return 1,
        None => return 0,
    };
    match (policy, summary.cache_status_alert()) {
        (CacheStatusPolicy::Fail, Some(CacheStatusAlert::Missing)) => 1,
        (CacheStatusPolicy::Fail, Some(CacheStatusAlert::Bypassed)) => 2,
        _ => 0,
    }
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM. The scheduler finishes the
/// iteration in progress before stopping.
fn watch_signals(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown requested, finishing current iteration");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "cannot listen for SIGTERM, Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedflare_sync::DiscoveryError;
    use fedflare_sync::scheduler::IterationSummary;
    use fedflare_sync::warm::{CacheStatus, WarmOutcome, WarmReport, WarmResult};
    use std::time::Duration;

    fn once(last: Option<Result<IterationSummary, DiscoveryError>>) -> RunOutcome {
        RunOutcome {
            iterations: u64::from(last.is_some()),
            last,
        }
    }

    #[test]
    fn clean_single_run_exits_zero() {
        let outcome = once(Some(Ok(IterationSummary::default())));
        assert_eq!(exit_status(Mode::Once, CacheStatusPolicy::Fail, &outcome), 0);
    }

    #[test]
    fn failed_iteration_exits_one() {
        let outcome = once(Some(Err(DiscoveryError::Status {
            url: "https://dl.test/pub/DIRECTORY_SIZES.txt".into(),
            status: 503,
        })));
        assert_eq!(exit_status(Mode::Once, CacheStatusPolicy::Warn, &outcome), 1);
    }

    #[test]
    fn service_runs_exit_zero() {
        let outcome = once(Some(Err(DiscoveryError::Status {
            url: "https://dl.test/pub/DIRECTORY_SIZES.txt".into(),
            status: 503,
        })));
        let mode = Mode::Service {
            interval: Duration::from_secs(60),
        };
        assert_eq!(exit_status(mode, CacheStatusPolicy::Fail, &outcome), 0);
    }

    fn warmed(outcome: WarmOutcome) -> RunOutcome {
        once(Some(Ok(IterationSummary {
            warm: WarmReport {
                results: vec![WarmResult {
                    url: "https://cdn.test/pub/epel/7/repodata/repomd.xml".into(),
                    attempts: 1,
                    outcome,
                }],
            },
            ..Default::default()
        })))
    }

    #[test]
    fn cache_status_alerts_follow_policy() {
        let missing = warmed(WarmOutcome::MissingStatus { http_status: 200 });
        let dynamic = warmed(WarmOutcome::Cached {
            http_status: 200,
            cache: CacheStatus::Dynamic,
        });

        assert_eq!(exit_status(Mode::Once, CacheStatusPolicy::Warn, &missing), 0);
        assert_eq!(exit_status(Mode::Once, CacheStatusPolicy::Warn, &dynamic), 0);
        assert_eq!(exit_status(Mode::Once, CacheStatusPolicy::Fail, &missing), 1);
        assert_eq!(exit_status(Mode::Once, CacheStatusPolicy::Fail, &dynamic), 2);
    }
}
