//! Shared server state: the mock fleet plus the in-memory geofence registry,
//! breach monitor and alert book.
//!
//! Locks are always taken in the order registry → monitor → alerts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use coolfleet_core::{
    points_from_records, seed_registry, AlertBook, AppConfig, BreachMonitor, BreachTransition,
    CoolerPoint, CoolerRecord, Geofence, GeofenceRegistry, GpsFix, SeedReport, ZonesFile,
};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

/// The cooler listing, fixed for the lifetime of the process.
#[derive(Debug)]
pub struct Fleet {
    pub records: Vec<CoolerRecord>,
    pub points: Vec<CoolerPoint>,
}

impl Fleet {
    #[must_use]
    pub fn new(records: Vec<CoolerRecord>) -> Self {
        let points = points_from_records(&records);
        Self { records, points }
    }

    /// Zones used when no zone file is configured.
    #[must_use]
    pub fn default_zones(&self) -> ZonesFile {
        ZonesFile::per_cooler(&self.records)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub fleet: Arc<Fleet>,
    pub registry: Arc<RwLock<GeofenceRegistry>>,
    pub monitor: Arc<Mutex<BreachMonitor>>,
    pub alerts: Arc<RwLock<AlertBook>>,
}

/// What a batch of fixes (or an offline sweep) changed.
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    /// Fixes for coolers that have at least one geofence.
    pub classified: usize,
    pub transitions: Vec<BreachTransition>,
    pub alerts_raised: Vec<String>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Arc<AppConfig>, records: Vec<CoolerRecord>) -> Self {
        let monitor = BreachMonitor::new(config.breach_policy());
        Self {
            config,
            fleet: Arc::new(Fleet::new(records)),
            registry: Arc::new(RwLock::new(GeofenceRegistry::new())),
            monitor: Arc::new(Mutex::new(monitor)),
            alerts: Arc::new(RwLock::new(AlertBook::new())),
        }
    }

    pub async fn seed_zones(&self, zones: &ZonesFile, now: DateTime<Utc>) -> SeedReport {
        let mut registry = self.registry.write().await;
        seed_registry(&mut registry, &self.fleet.points, zones, now)
    }

    /// Run fixes through the monitor and record the resulting alerts.
    pub async fn ingest(&self, fixes: &[GpsFix]) -> IngestReport {
        let registry = self.registry.read().await;
        let mut monitor = self.monitor.lock().await;

        let mut report = IngestReport::default();
        for fix in fixes {
            let fences: Vec<&Geofence> = registry.for_cooler(&fix.cooler_id).collect();
            if fences.is_empty() {
                continue;
            }
            report.classified += 1;
            if let Some(transition) = monitor.observe(fix, &fences) {
                report.transitions.push(transition);
            }
        }
        drop(monitor);
        drop(registry);

        self.record(report).await
    }

    /// Mark silent coolers offline and drop resolved alerts that aged out
    /// of the KPI window.
    pub async fn sweep_offline(&self, now: DateTime<Utc>) -> IngestReport {
        let transitions = self.monitor.lock().await.sweep_offline(now);
        let report = self
            .record(IngestReport {
                classified: 0,
                transitions,
                alerts_raised: Vec::new(),
            })
            .await;
        self.alerts.write().await.prune_resolved(now);
        report
    }

    /// Stop tracking coolers that no longer have any geofence. Call with
    /// the registry guard still held after every registry change.
    pub async fn forget_unfenced(&self, registry: &GeofenceRegistry) -> Vec<String> {
        let forgotten = self
            .monitor
            .lock()
            .await
            .retain_tracked(|cooler_id| registry.for_cooler(cooler_id).next().is_some());
        if !forgotten.is_empty() {
            tracing::info!(coolers = ?forgotten, "stopped tracking coolers without geofences");
        }
        forgotten
    }

    async fn record(&self, mut report: IngestReport) -> IngestReport {
        if report.transitions.is_empty() {
            return report;
        }
        let mut alerts = self.alerts.write().await;
        for transition in &report.transitions {
            if let Some(id) = alerts.record(transition) {
                report.alerts_raised.push(id);
            }
        }
        report
    }
}
