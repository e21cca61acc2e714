//! `simulate` command - replay a recorded track end to end.
//!
//! Runs one publisher fed by a [`ReplaySampler`] and one session viewer on an
//! in-memory store, then reports the store writes, the publisher's event
//! history, the alerts the viewer played and the viewer's final view.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use driftwatch::alert::{AlertCommand, AlertDispatcher, ChannelAlertSink};
use driftwatch::publisher::{EntityPublisher, SensorSignal};
use driftwatch::sampler::{ReplaySampler, ReplayTrack};
use driftwatch::store::MemoryPositionStore;
use driftwatch::time::Clock;
use driftwatch::tracking::{
    EntityProfile, MovementStatus, StatusEvent, TrackedEntityState, ViewerRole,
};
use driftwatch::viewer::{spawn_session_viewer, SessionView, ViewerConfig};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Upper bound on waiting for the viewer to see the final record.
const VIEW_SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Track file (JSON)
    #[arg(long)]
    pub track: PathBuf,

    /// Entity id of the simulated publisher
    #[arg(long, default_value = "boat-1")]
    pub entity: String,

    /// Session the publisher shares into
    #[arg(long, default_value = "lagoon")]
    pub session: String,

    /// Publish in ghost mode
    #[arg(long)]
    pub ghost: bool,

    /// Watch as the privileged viewer (sees ghosted entities)
    #[arg(long)]
    pub privileged: bool,

    /// Keep sharing this many seconds after the last track point
    #[arg(long, default_value_t = 0)]
    pub linger: u64,

    /// Replay in wall-clock time instead of as fast as possible
    #[arg(long)]
    pub realtime: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Everything observed during one replay.
struct SimulationReport {
    started_at: DateTime<Utc>,
    writes: Vec<TrackedEntityState>,
    history: Vec<StatusEvent>,
    alerts: Vec<String>,
    view: SessionView,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, runner: CliRunner) -> Result<(), CliError> {
    runner.log_startup("simulate");

    let track = ReplayTrack::load(&args.track).map_err(|error| CliError::Track {
        path: args.track.clone(),
        error,
    })?;
    info!(
        track = track.name.as_deref().unwrap_or("unnamed"),
        points = track.points.len(),
        duration_secs = track.duration().as_secs(),
        "Track loaded"
    );

    let runtime = runner.runtime(args.realtime)?;
    let report = runtime.block_on(replay(&args, &runner, track))?;

    if args.json {
        print_json(&report)
    } else {
        print_report(&args, &report);
        Ok(())
    }
}

async fn replay(
    args: &SimulateArgs,
    runner: &CliRunner,
    track: ReplayTrack,
) -> Result<SimulationReport, CliError> {
    let config = runner.config();
    let tracking = config.tracking_config();
    let clock = Clock::new();
    let started_at = clock.now();
    let store = Arc::new(MemoryPositionStore::new());
    let shutdown = CancellationToken::new();

    let role = if args.privileged {
        ViewerRole::Privileged
    } else {
        ViewerRole::Group
    };
    let (sink, mut alert_rx) = ChannelAlertSink::new();
    let dispatcher = AlertDispatcher::new(config.alert_config(), Arc::new(sink));
    let viewer = spawn_session_viewer(
        Arc::clone(&store),
        args.session.clone(),
        ViewerConfig::from_tracking(&tracking, role),
        dispatcher,
        clock,
        shutdown.clone(),
    );

    let profile = EntityProfile::new(args.entity.clone()).in_session(args.session.clone());
    let publisher = EntityPublisher::new(
        profile,
        tracking,
        ReplaySampler::new(track, clock),
        Arc::clone(&store),
    )
    .with_clock(clock)
    .with_cancellation(&shutdown)
    .with_ghost(args.ghost)
    .start();

    let mut signal = publisher.subscribe_signal();
    let _ = signal.wait_for(|s| *s == SensorSignal::Ended).await;
    tokio::time::sleep(Duration::from_secs(args.linger)).await;

    let history = publisher.history();
    publisher.stop().await?;

    let entity = args.entity.clone();
    let mut view = viewer.subscribe();
    let _ = tokio::time::timeout(
        VIEW_SETTLE_TIMEOUT,
        view.wait_for(|v| {
            v.get(&entity)
                .map_or(true, |e| e.status == MovementStatus::Offline)
        }),
    )
    .await;
    let final_view = viewer.snapshot();
    viewer.stop().await;
    shutdown.cancel();

    let mut alerts = Vec::new();
    while let Ok(command) = alert_rx.try_recv() {
        if let AlertCommand::Play { sound, .. } = command {
            alerts.push(sound);
        }
    }

    Ok(SimulationReport {
        started_at,
        writes: store.writes_for(&args.entity),
        history,
        alerts,
        view: final_view,
    })
}

fn offset(started_at: DateTime<Utc>, at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => format!("+{}s", (at - started_at).num_seconds()),
        None => "-".to_string(),
    }
}

fn print_report(args: &SimulateArgs, report: &SimulationReport) {
    println!("Store writes for {} ({})", args.entity, report.writes.len());
    println!("==============================");
    for write in &report.writes {
        let position = write
            .last_position
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut flags = Vec::new();
        if !write.is_sharing {
            flags.push("stopped");
        }
        if write.is_ghost {
            flags.push("ghost");
        }
        if write.emergency_override {
            flags.push("emergency");
        }
        println!(
            "  {:>7}  {:<10}  {}  {}",
            offset(report.started_at, write.last_published_at),
            write.status.to_string(),
            position,
            flags.join(",")
        );
    }
    println!();

    println!("Event history (newest first)");
    println!("============================");
    for event in &report.history {
        println!(
            "  {:>7}  {}",
            offset(report.started_at, Some(event.occurred_at)),
            event.status
        );
    }
    println!();

    println!("Alerts played");
    println!("=============");
    if report.alerts.is_empty() {
        println!("  (none)");
    }
    for sound in &report.alerts {
        println!("  {}", sound);
    }
    println!();

    match report.view.get(&args.entity) {
        Some(view) => println!("Viewer sees {} as {}", args.entity, view.status),
        None => println!("Viewer does not see {}", args.entity),
    }
}

fn print_json(report: &SimulationReport) -> Result<(), CliError> {
    let value = serde_json::json!({
        "started_at": report.started_at,
        "writes": report.writes,
        "history": report.history,
        "alerts": report.alerts,
        "view": report.view,
    });
    let text =
        serde_json::to_string_pretty(&value).map_err(|e| CliError::Output(e.to_string()))?;
    println!("{}", text);
    Ok(())
}
