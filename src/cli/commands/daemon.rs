//! Foreground sweeper daemon.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::cli::context::AppContext;
use crate::services::{SweeperDaemon, SweeperDaemonConfig, SweeperEvent};

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Seconds between sweeps, overrides `sweeper.interval_secs`
    #[arg(long)]
    pub interval: Option<u64>,

    /// Skip the sweep that normally runs at startup
    #[arg(long)]
    pub no_startup_sweep: bool,
}

pub async fn execute(args: DaemonArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let mut config = SweeperDaemonConfig::from(&ctx.config.sweeper);
    if let Some(secs) = args.interval {
        config.interval = Duration::from_secs(secs.max(1));
    }
    if args.no_startup_sweep {
        config.run_on_startup = false;
    }

    tracing::info!(interval_secs = config.interval.as_secs(), "starting sweeper daemon");
    let daemon = SweeperDaemon::new(ctx.sweeper(), config);
    let handle = daemon.handle();
    let mut events = daemon.run();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SweeperEvent::Stopped) | None => break,
                Some(event) => report(&event, json_mode),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, stopping sweeper daemon");
                handle.stop();
            }
        }
    }

    let status = handle.status().await;
    if json_mode {
        println!(
            "{}",
            json!({
                "total_runs": status.total_runs,
                "successful_runs": status.successful_runs,
                "failed_runs": status.failed_runs,
                "total_transitioned": status.total_transitioned,
            })
        );
    } else {
        println!(
            "Stopped after {} sweeps ({} failed), {} tasks marked missed.",
            status.total_runs, status.failed_runs, status.total_transitioned
        );
    }
    Ok(())
}

fn report(event: &SweeperEvent, json_mode: bool) {
    match event {
        SweeperEvent::SweepCompleted { run_number, transitioned, duration_ms } => {
            if json_mode {
                println!(
                    "{}",
                    json!({"event": "sweep_completed", "run": run_number, "transitioned": transitioned, "duration_ms": duration_ms})
                );
            } else if *transitioned > 0 {
                println!("Sweep #{run_number}: {transitioned} task(s) marked missed");
            }
        }
        SweeperEvent::SweepFailed { run_number, error } => {
            if json_mode {
                println!("{}", json!({"event": "sweep_failed", "run": run_number, "error": error}));
            } else {
                eprintln!("Sweep #{run_number} failed: {error}");
            }
        }
        SweeperEvent::Started => {
            if !json_mode {
                println!("Sweeper running. Press Ctrl-C to stop.");
            }
        }
        SweeperEvent::Stopped => {}
    }
}
