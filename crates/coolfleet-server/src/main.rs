mod api;
mod middleware;
mod scheduler;
mod state;

use std::sync::Arc;

use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    scheduler::Telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(coolfleet_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut rng = match config.mock_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let records = coolfleet_core::generate_mock_fleet(config.mock_coolers, Utc::now(), &mut rng);
    let state = AppState::new(Arc::clone(&config), records);

    let zones = match &config.zones_path {
        Some(path) => coolfleet_core::load_zones(path)?,
        None => state.fleet.default_zones(),
    };
    let seeded = state.seed_zones(&zones, Utc::now()).await;
    tracing::info!(
        env = %config.env,
        coolers = state.fleet.records.len(),
        geofences = seeded.created,
        skipped = seeded.skipped.len(),
        "fleet ready"
    );

    let telemetry = config
        .telemetry_enabled
        .then(|| Telemetry::new(&state, StdRng::from_rng(&mut rng)));
    let _scheduler = scheduler::build_scheduler(state.clone(), telemetry).await?;

    let auth = AuthState::from_env(config.is_development())?;
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
