pub mod alerts;
pub mod app_config;
pub mod breach;
pub mod config;
pub mod coolers;
pub mod geofence;
pub mod geometry;
pub mod mock;
pub mod points;
pub mod telemetry;
pub mod zones;

pub use alerts::{
    Alert, AlertBook, AlertError, AlertFilter, AlertKind, AlertKpis, AlertSeverity, AlertStatus,
};
pub use app_config::{AppConfig, Environment};
pub use breach::{
    BreachMonitor, BreachPolicy, BreachState, BreachTransition, CoolerBreachStatus, GpsFix,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use coolers::{
    find_by_id, status_counts, CoolerFilter, CoolerModel, CoolerRecord, CoolerStatus,
    StatusCounts,
};
pub use geofence::{
    DrawnFeature, Geofence, GeofenceCounts, GeofenceError, GeofenceKind, GeofenceRegistry,
};
pub use geometry::{circle_polygon, GeometryError, LngLat, CIRCLE_STEPS};
pub use mock::generate_mock_fleet;
pub use points::{cooler_feature_collection, points_from_json, points_from_records, CoolerPoint};
pub use telemetry::{FixSimulator, SimulatorSettings};
pub use zones::{load_zones, parse_zones, seed_registry, SeedReport, ZoneConfig, ZonesFile};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read zones file at {path}: {source}")]
    ZonesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse zones file: {0}")]
    ZonesFileParse(#[from] serde_yaml::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
