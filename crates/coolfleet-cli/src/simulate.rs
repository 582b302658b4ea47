//! Offline run of the breach pipeline: mock fleet → geofences → simulated
//! fixes → breach monitor → alert book.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use coolfleet_core::{
    generate_mock_fleet, points_from_records, seed_registry, AlertBook, AlertKpis,
    BreachMonitor, BreachPolicy, BreachState, BreachTransition, FixSimulator, Geofence,
    GeofenceRegistry, SimulatorSettings, ZonesFile,
};
use rand::{rngs::StdRng, SeedableRng};

#[derive(Debug, Clone)]
pub(crate) struct SimulationOptions {
    pub count: usize,
    pub ticks: u32,
    pub interval: Duration,
    pub seed: u64,
    pub drift_probability: f64,
    /// Geofence seed; `None` gives every cooler a fence of its own radius.
    pub zones: Option<ZonesFile>,
    pub policy: BreachPolicy,
}

#[derive(Debug)]
pub(crate) struct SimulationSummary {
    pub geofences: usize,
    pub fixes: usize,
    pub transitions: Vec<BreachTransition>,
    pub state_counts: BTreeMap<BreachState, usize>,
    pub kpis: AlertKpis,
}

pub(crate) fn run_simulate(options: &SimulationOptions) -> anyhow::Result<()> {
    anyhow::ensure!(
        (0.0..=1.0).contains(&options.drift_probability),
        "drift probability must be between 0 and 1, got {}",
        options.drift_probability
    );

    let summary = simulate(options, Utc::now());

    for t in &summary.transitions {
        let distance = t
            .distance_outside_meters
            .map(|d| format!(" ({d:.0}m outside)"))
            .unwrap_or_default();
        println!(
            "{}  {:<10} {} -> {}{distance}",
            t.at.format("%H:%M:%S"),
            t.cooler_id,
            t.from,
            t.to
        );
    }
    println!(
        "{} geofences, {} fixes, {} transitions",
        summary.geofences,
        summary.fixes,
        summary.transitions.len()
    );
    let states: Vec<String> = summary
        .state_counts
        .iter()
        .map(|(state, n)| format!("{state}: {n}"))
        .collect();
    println!("states: {}", states.join(", "));
    println!(
        "alerts: {} critical, {} warning, {} open, {} offline, {} idle",
        summary.kpis.critical,
        summary.kpis.warnings,
        summary.kpis.open,
        summary.kpis.offline,
        summary.kpis.idle
    );
    Ok(())
}

/// Deterministic for a given seed and start time.
pub(crate) fn simulate(options: &SimulationOptions, start: DateTime<Utc>) -> SimulationSummary {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let fleet = generate_mock_fleet(options.count, start, &mut rng);
    let points = points_from_records(&fleet);

    let zones = options
        .zones
        .clone()
        .unwrap_or_else(|| ZonesFile::per_cooler(&fleet));
    let mut registry = GeofenceRegistry::new();
    let seeded = seed_registry(&mut registry, &points, &zones, start);
    if !seeded.skipped.is_empty() {
        tracing::warn!(skipped = seeded.skipped.len(), "some zones were not seeded");
    }

    let settings = SimulatorSettings {
        drift_probability: options.drift_probability,
        ..SimulatorSettings::default()
    };
    let mut simulator = FixSimulator::new(settings, &points);
    let mut monitor = BreachMonitor::new(options.policy.clone());
    let mut alerts = AlertBook::new();

    let mut transitions = Vec::new();
    let mut fixes = 0;
    let mut now = start;
    for tick in 0..options.ticks {
        now = start + options.interval * i32::try_from(tick).unwrap_or(i32::MAX);
        for fix in simulator.tick(now, &mut rng) {
            fixes += 1;
            let fences: Vec<&Geofence> = registry.for_cooler(&fix.cooler_id).collect();
            if let Some(t) = monitor.observe(&fix, &fences) {
                alerts.record(&t);
                transitions.push(t);
            }
        }
        for t in monitor.sweep_offline(now) {
            alerts.record(&t);
            transitions.push(t);
        }
    }

    SimulationSummary {
        geofences: registry.len(),
        fixes,
        transitions,
        state_counts: monitor.state_counts(),
        kpis: alerts.kpis(now),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn options(drift_probability: f64) -> SimulationOptions {
        SimulationOptions {
            count: 15,
            ticks: 30,
            interval: Duration::minutes(1),
            seed: 42,
            drift_probability,
            zones: None,
            policy: BreachPolicy::default(),
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn every_cooler_is_tracked() {
        let summary = simulate(&options(0.0), start());
        assert_eq!(summary.geofences, 15);
        assert_eq!(summary.fixes, 15 * 30);
        assert_eq!(summary.state_counts.values().sum::<usize>(), 15);
    }

    #[test]
    fn stationary_fleet_never_breaches() {
        let summary = simulate(&options(0.0), start());
        assert!(summary
            .transitions
            .iter()
            .all(|t| t.to != BreachState::Breach));
        assert_eq!(summary.kpis.breaches_24h, 0);
    }

    #[test]
    fn wandering_fleet_breaches() {
        let summary = simulate(&options(1.0), start());
        assert!(summary
            .transitions
            .iter()
            .any(|t| matches!(t.to, BreachState::Breach | BreachState::PowerMove)));
        assert!(summary.kpis.breaches_24h + summary.kpis.power_24h > 0);
    }

    #[test]
    fn same_seed_same_run() {
        let a = simulate(&options(0.5), start());
        let b = simulate(&options(0.5), start());
        assert_eq!(a.transitions, b.transitions);
    }
}
