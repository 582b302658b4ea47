use std::fmt::Write as _;

use chrono::Utc;
use coolfleet_core::{generate_mock_fleet, status_counts, CoolerFilter, CoolerRecord};
use rand::{rngs::StdRng, SeedableRng};

pub(crate) fn run_coolers(
    count: usize,
    seed: u64,
    filter: &CoolerFilter,
    json: bool,
) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let fleet = generate_mock_fleet(count, Utc::now(), &mut rng);
    let matched = filter.apply(&fleet);
    tracing::debug!(generated = fleet.len(), matched = matched.len(), "cooler listing");

    if json {
        println!("{}", serde_json::to_string_pretty(&matched)?);
        return Ok(());
    }

    print!("{}", format_table(&matched));
    let counts = status_counts(&fleet, filter);
    let summary: Vec<String> = counts
        .status_counts
        .iter()
        .map(|(status, n)| format!("{status}: {n}"))
        .collect();
    println!("{} coolers ({})", counts.total, summary.join(", "));
    Ok(())
}

/// Fixed-width listing: id, name, status, city, province, position, radius.
pub(crate) fn format_table(coolers: &[&CoolerRecord]) -> String {
    let mut out = format!(
        "{:<10} {:<11} {:<14} {:<16} {:<14} {:>22} {:>7}\n",
        "ID", "NAME", "STATUS", "CITY", "PROVINCE", "LNG,LAT", "RADIUS"
    );
    for cooler in coolers {
        let position = match cooler.location.coordinates.as_slice() {
            [lng, lat, ..] => format!("{lng:.4},{lat:.4}"),
            _ => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "{:<10} {:<11} {:<14} {:<16} {:<14} {:>22} {:>6}m",
            cooler.id,
            cooler.name,
            cooler.status.as_str(),
            cooler.location.city,
            cooler.location.province,
            position,
            cooler.radius.round(),
        );
    }
    out
}
