use std::path::Path;

use chrono::Utc;
use coolfleet_core::{
    generate_mock_fleet, load_zones, points_from_records, seed_registry, GeofenceRegistry,
    SeedReport,
};
use rand::{rngs::StdRng, SeedableRng};

pub(crate) fn run_check_zones(path: &Path, count: usize, seed: u64) -> anyhow::Result<()> {
    let zones = load_zones(path)?;
    let report = check_zones(&zones, count, seed);

    println!(
        "{}: {} zones, {} seeded against {count} mock coolers",
        path.display(),
        zones.zones.len(),
        report.created
    );
    for (cooler_id, error) in &report.skipped {
        println!("  skipped {cooler_id}: {error}");
    }
    anyhow::ensure!(
        report.skipped.is_empty(),
        "{} zone(s) could not be seeded",
        report.skipped.len()
    );
    Ok(())
}

/// Seed a throwaway registry with `zones` against a mock fleet.
pub(crate) fn check_zones(
    zones: &coolfleet_core::ZonesFile,
    count: usize,
    seed: u64,
) -> SeedReport {
    let now = Utc::now();
    let mut rng = StdRng::seed_from_u64(seed);
    let fleet = generate_mock_fleet(count, now, &mut rng);
    let points = points_from_records(&fleet);
    let mut registry = GeofenceRegistry::new();
    seed_registry(&mut registry, &points, zones, now)
}
