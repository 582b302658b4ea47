//! Background jobs.
//!
//! The telemetry job advances the fix simulator and feeds the breach
//! monitor. The offline sweep runs on the same schedule whether or not the
//! simulator is enabled, so coolers that stop reporting through
//! `POST /api/v1/fixes` still go offline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use coolfleet_core::{FixSimulator, SimulatorSettings};
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::state::{AppState, IngestReport};

/// Simulator plus its random source, owned by the telemetry job.
pub struct Telemetry {
    simulator: FixSimulator,
    rng: StdRng,
}

impl Telemetry {
    #[must_use]
    pub fn new(state: &AppState, rng: StdRng) -> Self {
        Self {
            simulator: FixSimulator::new(SimulatorSettings::default(), &state.fleet.points),
            rng,
        }
    }
}

/// Builds and starts the scheduler.
///
/// The returned handle must be kept alive for the lifetime of the process;
/// dropping it stops every job.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] for an invalid cron expression or when the
/// scheduler cannot start.
pub async fn build_scheduler(
    state: AppState,
    telemetry: Option<Telemetry>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let cron = state.config.telemetry_cron.clone();

    match telemetry {
        Some(telemetry) => {
            register_telemetry_job(&scheduler, &cron, state, telemetry).await?;
        }
        None => {
            tracing::info!("telemetry simulation disabled; scheduling offline sweep only");
            register_sweep_job(&scheduler, &cron, state).await?;
        }
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_telemetry_job(
    scheduler: &JobScheduler,
    cron: &str,
    state: AppState,
    telemetry: Telemetry,
) -> Result<(), JobSchedulerError> {
    let telemetry = Arc::new(Mutex::new(telemetry));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let state = state.clone();
        let telemetry = Arc::clone(&telemetry);

        Box::pin(async move {
            let mut telemetry = telemetry.lock().await;
            let report = run_telemetry_tick(&state, &mut telemetry, Utc::now()).await;
            tracing::debug!(
                transitions = report.transitions.len(),
                alerts = report.alerts_raised.len(),
                "scheduler: telemetry tick complete"
            );
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_sweep_job(
    scheduler: &JobScheduler,
    cron: &str,
    state: AppState,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            let report = state.sweep_offline(Utc::now()).await;
            if !report.transitions.is_empty() {
                tracing::info!(
                    offline = report.transitions.len(),
                    "scheduler: coolers went offline"
                );
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// One simulated reporting round followed by an offline sweep.
pub async fn run_telemetry_tick(
    state: &AppState,
    telemetry: &mut Telemetry,
    now: DateTime<Utc>,
) -> IngestReport {
    let Telemetry { simulator, rng } = telemetry;
    let fixes = simulator.tick(now, rng);
    let mut report = state.ingest(&fixes).await;

    let swept = state.sweep_offline(now).await;
    report.transitions.extend(swept.transitions);
    report.alerts_raised.extend(swept.alerts_raised);
    report
}
