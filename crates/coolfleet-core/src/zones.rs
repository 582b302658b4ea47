use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coolers::CoolerRecord;
use crate::geofence::{GeofenceError, GeofenceRegistry};
use crate::points::CoolerPoint;
use crate::ConfigError;

/// A radius geofence declared in the zone seed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub cooler_id: String,
    pub radius_meters: f64,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZonesFile {
    pub zones: Vec<ZoneConfig>,
}

impl ZonesFile {
    /// One unlabelled zone per cooler using the cooler's own radius.
    #[must_use]
    pub fn per_cooler(records: &[CoolerRecord]) -> Self {
        Self {
            zones: records
                .iter()
                .map(|r| ZoneConfig {
                    cooler_id: r.id.clone(),
                    radius_meters: r.radius,
                    label: None,
                })
                .collect(),
        }
    }
}

/// Load and validate the zone seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_zones(path: &Path) -> Result<ZonesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ZonesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_zones(&content)
}

/// Parse and validate zone YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_zones(content: &str) -> Result<ZonesFile, ConfigError> {
    let zones_file: ZonesFile =
        serde_yaml::from_str(content).map_err(ConfigError::ZonesFileParse)?;
    validate_zones(&zones_file)?;
    Ok(zones_file)
}

fn validate_zones(zones_file: &ZonesFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for zone in &zones_file.zones {
        if zone.cooler_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "zone cooler_id must be non-empty".to_string(),
            ));
        }

        if !zone.radius_meters.is_finite() || zone.radius_meters <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "zone for cooler '{}' has invalid radius {}; must be a positive number of meters",
                zone.cooler_id, zone.radius_meters
            )));
        }

        if zone.label.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "zone for cooler '{}' has a blank label",
                zone.cooler_id
            )));
        }

        if !seen.insert(zone.cooler_id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate zone for cooler '{}'",
                zone.cooler_id
            )));
        }
    }

    Ok(())
}

/// Outcome of seeding a registry from a zone file.
#[derive(Debug, Default, PartialEq)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: Vec<(String, GeofenceError)>,
}

/// Create one radius geofence per zone. Zones naming a cooler that is not in
/// `coolers` are skipped and reported, not fatal.
pub fn seed_registry(
    registry: &mut GeofenceRegistry,
    coolers: &[CoolerPoint],
    zones: &ZonesFile,
    now: DateTime<Utc>,
) -> SeedReport {
    let mut report = SeedReport::default();
    for zone in &zones.zones {
        let created = registry
            .create_radius_geofence(coolers, Some(&zone.cooler_id), zone.radius_meters, now)
            .map(|g| g.id.clone());
        let result = created.and_then(|id| match zone.label.as_deref() {
            Some(label) => registry.rename(&id, label).map(|_| ()),
            None => Ok(()),
        });
        match result {
            Ok(()) => report.created += 1,
            Err(e) => {
                tracing::warn!(cooler_id = %zone.cooler_id, error = %e, "skipping zone");
                report.skipped.push((zone.cooler_id.clone(), e));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::geometry::LngLat;

    const YAML: &str = r"
zones:
  - cooler_id: SN-000001
    radius_meters: 300
    label: Jozi depot
  - cooler_id: SN-000002
    radius_meters: 450.5
";

    fn point(id: &str) -> CoolerPoint {
        CoolerPoint {
            id: id.to_string(),
            name: format!("Cooler {id}"),
            coordinates: LngLat::new(28.0473, -26.2041),
            status: None,
            city: None,
            province: None,
            country: None,
            radius: None,
        }
    }

    #[test]
    fn parses_zone_list() {
        let zones = parse_zones(YAML).unwrap();
        assert_eq!(zones.zones.len(), 2);
        assert_eq!(zones.zones[0].label.as_deref(), Some("Jozi depot"));
        assert!((zones.zones[1].radius_meters - 450.5).abs() < f64::EPSILON);
        assert_eq!(zones.zones[1].label, None);
    }

    #[test]
    fn rejects_non_positive_radius() {
        let err = parse_zones("zones:\n  - cooler_id: a\n    radius_meters: 0\n").unwrap_err();
        assert!(err.to_string().contains("invalid radius 0"));
    }

    #[test]
    fn rejects_duplicate_cooler() {
        let yaml = "zones:\n  - cooler_id: a\n    radius_meters: 100\n  - cooler_id: a\n    radius_meters: 200\n";
        let err = parse_zones(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate zone for cooler 'a'"));
    }

    #[test]
    fn rejects_blank_id_and_label() {
        assert!(parse_zones("zones:\n  - cooler_id: ' '\n    radius_meters: 100\n").is_err());
        assert!(
            parse_zones("zones:\n  - cooler_id: a\n    radius_meters: 100\n    label: ''\n")
                .is_err()
        );
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = parse_zones("zones: [").unwrap_err();
        assert!(matches!(err, ConfigError::ZonesFileParse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_zones(Path::new("/definitely/not/here/zones.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ZonesFileIo { .. }));
    }

    #[test]
    fn seeds_registry_and_reports_unknown_coolers() {
        let zones = parse_zones(YAML).unwrap();
        let mut registry = GeofenceRegistry::new();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let report = seed_registry(&mut registry, &[point("SN-000001")], &zones, now);

        assert_eq!(report.created, 1);
        assert_eq!(
            report.skipped,
            [(
                "SN-000002".to_string(),
                GeofenceError::UnknownCooler("SN-000002".to_string())
            )]
        );
        assert_eq!(registry.list()[0].label, "Jozi depot");
    }

    #[test]
    fn per_cooler_zones_follow_record_radius() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(9);
        let fleet = crate::mock::generate_mock_fleet(4, now, &mut rng);

        let zones = ZonesFile::per_cooler(&fleet);

        assert_eq!(zones.zones.len(), 4);
        for (zone, record) in zones.zones.iter().zip(&fleet) {
            assert_eq!(zone.cooler_id, record.id);
            assert!((zone.radius_meters - record.radius).abs() < f64::EPSILON);
            assert_eq!(zone.label, None);
        }
    }
}
