//! Generated cooler fleet used when no backend listing is configured.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::coolers::{
    CoolerModel, CoolerRecord, CoolerStatus, GeoLocation, LocationHistoryEntry,
};

pub const MOCK_COMPANY: &str = "mock-company-1";

/// Share of the fleet generated with `Alert` status.
const ALERT_SHARE: f64 = 0.6;

/// Max offset from the city center, in degrees, on each axis.
const JITTER_DEG: f64 = 0.05;

struct City {
    name: &'static str,
    province: &'static str,
    lng: f64,
    lat: f64,
}

const CITIES: [City; 15] = [
    City { name: "Johannesburg", province: "Gauteng", lng: 28.0473, lat: -26.2041 },
    City { name: "Pretoria", province: "Gauteng", lng: 28.1881, lat: -25.7479 },
    City { name: "Cape Town", province: "Western Cape", lng: 18.4241, lat: -33.9249 },
    City { name: "Durban", province: "KwaZulu-Natal", lng: 31.0218, lat: -29.8587 },
    City { name: "Port Elizabeth", province: "Eastern Cape", lng: 25.6022, lat: -33.9608 },
    City { name: "Bloemfontein", province: "Free State", lng: 26.2023, lat: -29.0852 },
    City { name: "Polokwane", province: "Limpopo", lng: 29.4487, lat: -23.9045 },
    City { name: "Nelspruit", province: "Mpumalanga", lng: 30.9702, lat: -25.4753 },
    City { name: "Kimberley", province: "Northern Cape", lng: 24.7631, lat: -28.7282 },
    City { name: "Mahikeng", province: "North West", lng: 25.6447, lat: -25.8601 },
    City { name: "Pietermaritzburg", province: "KwaZulu-Natal", lng: 30.3753, lat: -29.6009 },
    City { name: "East London", province: "Eastern Cape", lng: 27.9116, lat: -33.0153 },
    City { name: "Stellenbosch", province: "Western Cape", lng: 18.8667, lat: -33.9321 },
    City { name: "Sandton", province: "Gauteng", lng: 28.0436, lat: -26.1076 },
    City { name: "Soweto", province: "Gauteng", lng: 27.8546, lat: -26.2678 },
];

/// Generate `count` coolers spread over fifteen South African cities.
///
/// Ids are `SN-000001`.., names `Cooler-001`... Cooler `i` sits in city
/// `i % 15`, jittered by up to 0.05° per axis. A random 60% of the fleet is
/// `Alert`, the rest `Active`. Each record carries a three-step location
/// history from the city center to its current position, ending at `now`.
pub fn generate_mock_fleet<R: Rng + ?Sized>(
    count: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<CoolerRecord> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let alert_count = (count as f64 * ALERT_SHARE).round() as usize;
    let alert_indices: HashSet<usize> = rand::seq::index::sample(rng, count, alert_count.min(count))
        .into_iter()
        .collect();

    let fleet: Vec<CoolerRecord> = (0..count)
        .map(|index| mock_cooler(index, alert_indices.contains(&index), now, rng))
        .collect();
    tracing::debug!(count, alerts = alert_indices.len(), "generated mock fleet");
    fleet
}

fn mock_cooler<R: Rng + ?Sized>(
    index: usize,
    alert: bool,
    now: DateTime<Utc>,
    rng: &mut R,
) -> CoolerRecord {
    let city = &CITIES[index % CITIES.len()];
    let lng_offset = rng.random_range(-JITTER_DEG..=JITTER_DEG);
    let lat_offset = rng.random_range(-JITTER_DEG..=JITTER_DEG);
    let status = if alert {
        CoolerStatus::Alert
    } else {
        CoolerStatus::Active
    };
    let model = CoolerModel::ALL[index % CoolerModel::ALL.len()];

    let created_at = now - Duration::minutes(rng.random_range(0..90 * 24 * 60));
    let last_service_date = created_at + Duration::minutes(rng.random_range(0..60 * 24 * 60));
    let last_notification =
        alert.then(|| now - Duration::seconds(rng.random_range(0..2 * 60 * 60)));
    let serial = index + 1;

    CoolerRecord {
        id: format!("SN-{serial:06}"),
        name: format!("Cooler-{serial:03}"),
        company: MOCK_COMPANY.to_string(),
        location: GeoLocation {
            kind: "Point".to_string(),
            coordinates: vec![city.lng + lng_offset, city.lat + lat_offset],
            city: city.name.to_string(),
            province: city.province.to_string(),
            country: "South Africa".to_string(),
        },
        photo_urls: vec![
            format!("https://picsum.photos/seed/cooler{index}/400/300"),
            format!("https://picsum.photos/seed/cooler{index}a/400/300"),
        ],
        cooler_model: model,
        humidity: Some(f64::from(rng.random_range(30..70_u8))),
        last_service_date: Some(last_service_date),
        temperature: Some(f64::from(rng.random_range(-5..15_i8))),
        status,
        radius: f64::from(rng.random_range(200..500_u16)),
        is_active: true,
        last_notification,
        location_history: vec![
            LocationHistoryEntry {
                coordinates: [city.lng, city.lat],
                timestamp: Some(created_at),
            },
            LocationHistoryEntry {
                coordinates: [city.lng + lng_offset * 0.5, city.lat + lat_offset * 0.5],
                timestamp: Some(created_at + Duration::days(30)),
            },
            LocationHistoryEntry {
                coordinates: [city.lng + lng_offset, city.lat + lat_offset],
                timestamp: Some(now),
            },
        ],
        created_at: Some(created_at),
        updated_at: Some(now),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::points::points_from_records;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn fleet_has_expected_shape() {
        let fleet = generate_mock_fleet(200, now(), &mut StdRng::seed_from_u64(7));
        assert_eq!(fleet.len(), 200);
        assert_eq!(fleet[0].id, "SN-000001");
        assert_eq!(fleet[0].name, "Cooler-001");
        assert_eq!(fleet[199].id, "SN-000200");
        assert_eq!(fleet[15].location.city, "Johannesburg");

        let alerts = fleet
            .iter()
            .filter(|c| c.status == CoolerStatus::Alert)
            .count();
        assert_eq!(alerts, 120);
        assert!(fleet
            .iter()
            .all(|c| matches!(c.status, CoolerStatus::Alert | CoolerStatus::Active)));
    }

    #[test]
    fn coordinates_stay_near_their_city() {
        let fleet = generate_mock_fleet(45, now(), &mut StdRng::seed_from_u64(1));
        for (i, cooler) in fleet.iter().enumerate() {
            let city = &CITIES[i % CITIES.len()];
            let c = &cooler.location.coordinates;
            assert!((c[0] - city.lng).abs() <= JITTER_DEG + 1e-9);
            assert!((c[1] - city.lat).abs() <= JITTER_DEG + 1e-9);
            assert!((200.0..500.0).contains(&cooler.radius));
            assert_eq!(cooler.location_history.len(), 3);
            assert_eq!(cooler.location_history[2].coordinates, [c[0], c[1]]);
        }
        assert_eq!(points_from_records(&fleet).len(), 45);
    }

    #[test]
    fn same_seed_same_fleet() {
        let a = generate_mock_fleet(10, now(), &mut StdRng::seed_from_u64(42));
        let b = generate_mock_fleet(10, now(), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_fleet() {
        assert!(generate_mock_fleet(0, now(), &mut StdRng::seed_from_u64(0)).is_empty());
    }
}
