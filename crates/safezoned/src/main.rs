//! safezoned - SafeZone monitoring daemon
//!
//! Runs the monitoring engine against file-backed collaborators: a JSON
//! zones file, a JSON location snapshot rewritten by a tracker feed, and a
//! JSON-lines history file. Alerts are written to the log.
//!
//! Each run restores the last known zone state per subject from the history
//! file, so a `check` after an earlier exit does not alert for it again.
//!
//! ## Commands
//!
//! - `watch`: periodic sweeps until Ctrl-C
//! - `check`: one sweep now, prints the outcome
//! - `history`: most recent history records for a subject
//! - `remind`: post a reminder after a delay, then exit

mod sink;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use safezone_core::{
    MonitorConfig, MonitoringOutcome, Reminder, RunConstraints, SafeZoneMonitor, ZoneRegistry,
};
use safezone_state::{HistoryStore, JsonFileLocationSource, JsonlHistoryStore, SubjectId};
use tracing::{info, warn, Level};

use crate::sink::LogNotificationSink;

#[derive(Parser)]
#[command(name = "safezoned")]
#[command(version = safezone_core::VERSION)]
#[command(about = "Pet safe-zone monitoring daemon", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Safe zones file (JSON array)
    #[arg(long, global = true, env = "SAFEZONE_ZONES", default_value = "zones.json")]
    zones: PathBuf,

    /// Location snapshot written by the tracker feed
    #[arg(long, global = true, env = "SAFEZONE_SAMPLES", default_value = "samples.json")]
    samples: PathBuf,

    /// History file (JSON lines)
    #[arg(
        long,
        global = true,
        env = "SAFEZONE_HISTORY",
        default_value = ".safezone/history.jsonl"
    )]
    history: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep periodically until interrupted
    Watch {
        /// Minutes between sweeps (overrides SAFEZONE_INTERVAL_MINUTES)
        #[arg(long)]
        interval_minutes: Option<u64>,

        /// Run sweeps regardless of network and battery
        #[arg(long)]
        no_constraints: bool,
    },

    /// Run a single sweep and print its outcome
    Check,

    /// Show recent history for a subject
    History {
        /// Subject id
        subject: String,

        /// Maximum number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Post a reminder after a delay, then exit
    Remind {
        /// Subject id the reminder is about
        subject: String,

        /// Reminder title (defaults to "SafeZonePet")
        #[arg(long, default_value = "")]
        title: String,

        /// Reminder text (defaults to "Reminder")
        #[arg(long, default_value = "")]
        body: String,

        /// Minutes to wait before posting
        #[arg(long, default_value = "0")]
        in_minutes: u64,
    },
}

struct Paths<'a> {
    zones: &'a Path,
    samples: &'a Path,
    history: &'a Path,
}

async fn build_monitor(paths: &Paths<'_>, config: MonitorConfig) -> Result<SafeZoneMonitor> {
    let zones = ZoneRegistry::from_json_file(paths.zones)
        .with_context(|| format!("Failed to load zones from {}", paths.zones.display()))?;
    let history = JsonlHistoryStore::open(paths.history)
        .await
        .with_context(|| format!("Failed to open history at {}", paths.history.display()))?;

    let monitor = SafeZoneMonitor::builder()
        .config(config)
        .zones(Arc::new(zones))
        .location(Arc::new(JsonFileLocationSource::new(paths.samples)))
        .notifications(Arc::new(LogNotificationSink::new()))
        .history(Arc::new(history))
        .build()?;

    // A feed that has not written yet leaves the store empty; sweeps still run.
    if let Err(e) = monitor.restore_from_history().await {
        warn!(error = %e, "zone state not restored from history");
    }
    Ok(monitor)
}

async fn cmd_watch(monitor: &SafeZoneMonitor, interval_minutes: u64) -> Result<()> {
    let registration = monitor.start_monitoring(interval_minutes)?;
    info!(interval_minutes, registration = ?registration, "monitoring started; Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    monitor.stop_monitoring();
    info!("monitoring stopped");
    Ok(())
}

async fn cmd_check(monitor: &SafeZoneMonitor) -> MonitoringOutcome {
    let outcome = monitor.sweep_once().await;
    println!("{}", outcome.as_str());
    outcome
}

async fn cmd_remind(
    monitor: &SafeZoneMonitor,
    reminder: Reminder,
    in_minutes: u64,
) -> Result<MonitoringOutcome> {
    let secs = in_minutes
        .checked_mul(60)
        .ok_or_else(|| anyhow!("reminder delay of {in_minutes} minutes is too large"))?;
    let outcome = monitor
        .schedule_reminder(reminder, Duration::from_secs(secs))
        .await
        .context("Reminder task failed")?;
    println!("{}", outcome.as_str());
    Ok(outcome)
}

async fn cmd_history(history_path: &Path, subject: &str, limit: usize) -> Result<Vec<String>> {
    let store = JsonlHistoryStore::open(history_path).await?;
    let records = store.recent_for(&SubjectId::new(subject), limit).await?;
    let lines = records
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    for line in &lines {
        println!("{line}");
    }
    Ok(lines)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    safezone_core::init_tracing(cli.json, level);
    info!(version = safezone_core::VERSION, "safezoned starting");

    let paths = Paths {
        zones: &cli.zones,
        samples: &cli.samples,
        history: &cli.history,
    };

    match cli.command {
        Commands::Watch {
            interval_minutes,
            no_constraints,
        } => {
            let mut config = MonitorConfig::from_env()?;
            if let Some(minutes) = interval_minutes {
                config = config.with_interval_minutes(minutes);
            }
            if no_constraints {
                config = config.with_constraints(RunConstraints::none());
            }
            let interval = config.interval_minutes;
            let monitor = build_monitor(&paths, config).await?;
            cmd_watch(&monitor, interval).await
        }
        Commands::Check => {
            let monitor = build_monitor(&paths, MonitorConfig::from_env()?).await?;
            if cmd_check(&monitor).await == MonitoringOutcome::PermanentFailure {
                std::process::exit(2);
            }
            Ok(())
        }
        Commands::History { subject, limit } => {
            cmd_history(&cli.history, &subject, limit).await?;
            Ok(())
        }
        Commands::Remind {
            subject,
            title,
            body,
            in_minutes,
        } => {
            let monitor = build_monitor(&paths, MonitorConfig::from_env()?).await?;
            let reminder = Reminder::new(SubjectId::new(subject))
                .with_title(title)
                .with_body(body);
            if cmd_remind(&monitor, reminder, in_minutes).await? != MonitoringOutcome::Success {
                std::process::exit(2);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONES: &str = r#"[{"zone_id": "home", "name": "Home", "center": {"latitude": 4.6097, "longitude": -74.0817}, "radius_meters": 500.0}]"#;

    fn snapshot(latitude: f64, ts: i64) -> String {
        format!(
            r#"{{"subjects": [{{"subject_id": "p1", "display_name": "Luna"}}],
                "samples": [{{"subject_id": "p1", "latitude": {latitude}, "longitude": -74.0817, "timestamp_millis": {ts}}}]}}"#
        )
    }

    #[test]
    fn cli_parses_global_paths() {
        let cli = Cli::try_parse_from([
            "safezoned",
            "--zones",
            "/tmp/z.json",
            "watch",
            "--interval-minutes",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.zones, PathBuf::from("/tmp/z.json"));
        assert!(matches!(
            cli.command,
            Commands::Watch {
                interval_minutes: Some(5),
                no_constraints: false
            }
        ));
    }

    #[tokio::test]
    async fn check_then_history_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let zones = dir.path().join("zones.json");
        let samples = dir.path().join("samples.json");
        let history = dir.path().join("state/history.jsonl");
        std::fs::write(&zones, ZONES).unwrap();
        let paths = Paths {
            zones: &zones,
            samples: &samples,
            history: &history,
        };
        let config = MonitorConfig::default().with_constraints(RunConstraints::none());
        let monitor = build_monitor(&paths, config).await.unwrap();

        // Feed has not written yet: transient, so the scheduler would retry.
        assert!(matches!(
            cmd_check(&monitor).await,
            MonitoringOutcome::RetryRequested(_)
        ));

        std::fs::write(&samples, snapshot(4.6097, 1_000)).unwrap();
        assert_eq!(cmd_check(&monitor).await, MonitoringOutcome::Success);

        // About 1.1 km north of home.
        std::fs::write(&samples, snapshot(4.6197, 2_000)).unwrap();
        assert_eq!(cmd_check(&monitor).await, MonitoringOutcome::Success);

        let lines = cmd_history(&history, "p1", 10).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("zone_exit"));
    }

    #[tokio::test]
    async fn fresh_process_resumes_from_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let zones = dir.path().join("zones.json");
        let samples = dir.path().join("samples.json");
        let history = dir.path().join("history.jsonl");
        std::fs::write(&zones, ZONES).unwrap();
        let paths = Paths {
            zones: &zones,
            samples: &samples,
            history: &history,
        };
        let config = || MonitorConfig::default().with_constraints(RunConstraints::none());

        let first = build_monitor(&paths, config()).await.unwrap();
        std::fs::write(&samples, snapshot(4.6097, 1_000)).unwrap();
        cmd_check(&first).await;
        std::fs::write(&samples, snapshot(4.6197, 2_000)).unwrap();
        cmd_check(&first).await;
        drop(first);

        // Still outside in the next process: no second exit.
        std::fs::write(&samples, snapshot(4.6199, 3_000)).unwrap();
        let second = build_monitor(&paths, config()).await.unwrap();
        assert_eq!(cmd_check(&second).await, MonitoringOutcome::Success);
        assert_eq!(cmd_history(&history, "p1", 10).await.unwrap().len(), 1);
        drop(second);

        // Back home in a third process: the return is recorded.
        std::fs::write(&samples, snapshot(4.6098, 4_000)).unwrap();
        let third = build_monitor(&paths, config()).await.unwrap();
        cmd_check(&third).await;
        let lines = cmd_history(&history, "p1", 10).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("zone_enter"));
    }

    #[test]
    fn remind_defaults_to_immediate() {
        let cli = Cli::try_parse_from(["safezoned", "remind", "p1", "--title", "Walk"]).unwrap();
        match cli.command {
            Commands::Remind {
                subject,
                title,
                body,
                in_minutes,
            } => {
                assert_eq!(subject, "p1");
                assert_eq!(title, "Walk");
                assert!(body.is_empty());
                assert_eq!(in_minutes, 0);
            }
            _ => panic!("expected remind"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn remind_waits_then_posts() {
        let dir = tempfile::tempdir().unwrap();
        let zones = dir.path().join("zones.json");
        std::fs::write(&zones, ZONES).unwrap();
        let paths = Paths {
            zones: &zones,
            samples: &dir.path().join("samples.json"),
            history: &dir.path().join("history.jsonl"),
        };
        let monitor = build_monitor(&paths, MonitorConfig::default()).await.unwrap();

        let start = tokio::time::Instant::now();
        let outcome = cmd_remind(&monitor, Reminder::new(SubjectId::new("p1")), 5)
            .await
            .unwrap();
        assert_eq!(outcome, MonitoringOutcome::Success);
        assert!(start.elapsed() >= Duration::from_secs(5 * 60));

        assert!(cmd_remind(&monitor, Reminder::new(SubjectId::new("p1")), u64::MAX)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn missing_zones_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let paths = Paths {
            zones: &missing,
            samples: &missing,
            history: &dir.path().join("h.jsonl"),
        };
        let err = build_monitor(&paths, MonitorConfig::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to load zones"));
    }
}
