use super::*;

fn cooler(id: &str, status: CoolerStatus, city: &str, province: &str) -> CoolerRecord {
    CoolerRecord {
        id: id.to_string(),
        name: format!("Cooler-{id}"),
        company: "mock-company-1".to_string(),
        location: GeoLocation {
            kind: "Point".to_string(),
            coordinates: vec![28.0473, -26.2041],
            city: city.to_string(),
            province: province.to_string(),
            country: "South Africa".to_string(),
        },
        photo_urls: vec![],
        cooler_model: CoolerModel::Standard,
        humidity: None,
        last_service_date: None,
        temperature: None,
        status,
        radius: DEFAULT_COOLER_RADIUS_M,
        is_active: true,
        last_notification: None,
        location_history: vec![],
        created_at: None,
        updated_at: None,
    }
}

fn fleet() -> Vec<CoolerRecord> {
    vec![
        cooler("001", CoolerStatus::Active, "Johannesburg", "Gauteng"),
        cooler("002", CoolerStatus::Alert, "Cape Town", "Western Cape"),
        cooler("003", CoolerStatus::Maintenance, "Pretoria", "Gauteng"),
        cooler("004", CoolerStatus::Active, "Durban", "KwaZulu-Natal"),
    ]
}

#[test]
fn empty_filter_keeps_everything() {
    let coolers = fleet();
    assert_eq!(CoolerFilter::default().apply(&coolers).len(), 4);
}

#[test]
fn status_active_keeps_only_active() {
    let coolers = fleet();
    let filter = CoolerFilter {
        status: Some("active".to_string()),
        ..CoolerFilter::default()
    };
    let ids: Vec<_> = filter.apply(&coolers).iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["001", "004"]);
}

#[test]
fn status_inactive_keeps_everything_not_active() {
    let coolers = fleet();
    let filter = CoolerFilter {
        status: Some("Inactive".to_string()),
        ..CoolerFilter::default()
    };
    let ids: Vec<_> = filter.apply(&coolers).iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["002", "003"]);
}

#[test]
fn other_status_values_match_case_insensitively() {
    let coolers = fleet();
    let filter = CoolerFilter {
        status: Some("alert".to_string()),
        ..CoolerFilter::default()
    };
    assert_eq!(filter.apply(&coolers).len(), 1);
}

#[test]
fn search_looks_at_name_city_and_province() {
    let coolers = fleet();
    let by_province = CoolerFilter {
        search: Some("gauteng".to_string()),
        ..CoolerFilter::default()
    };
    assert_eq!(by_province.apply(&coolers).len(), 2);

    let by_name = CoolerFilter {
        search: Some("cooler-004".to_string()),
        ..CoolerFilter::default()
    };
    assert_eq!(by_name.apply(&coolers).len(), 1);
}

#[test]
fn city_filter_is_exact() {
    let coolers = fleet();
    let filter = CoolerFilter {
        city: Some("Durban".to_string()),
        ..CoolerFilter::default()
    };
    assert_eq!(filter.apply(&coolers).len(), 1);

    let partial = CoolerFilter {
        city: Some("Durb".to_string()),
        ..CoolerFilter::default()
    };
    assert!(partial.apply(&coolers).is_empty());
}

#[test]
fn blank_filter_values_are_ignored() {
    let coolers = fleet();
    let filter = CoolerFilter {
        status: Some("  ".to_string()),
        search: Some(String::new()),
        ..CoolerFilter::default()
    };
    assert_eq!(filter.apply(&coolers).len(), 4);
}

#[test]
fn status_counts_group_filtered_records() {
    let coolers = fleet();
    let counts = status_counts(
        &coolers,
        &CoolerFilter {
            province: Some("Gauteng".to_string()),
            ..CoolerFilter::default()
        },
    );
    assert_eq!(counts.total, 2);
    assert_eq!(counts.status_counts.get("Active"), Some(&1));
    assert_eq!(counts.status_counts.get("Maintenance"), Some(&1));
    assert_eq!(counts.status_counts.get("Alert"), None);
}

#[test]
fn record_uses_backend_field_names() {
    let json = serde_json::to_value(&fleet()[0]).unwrap();
    assert_eq!(json["_id"], "001");
    assert_eq!(json["coolerModel"], "Standard");
    assert_eq!(json["location"]["type"], "Point");
    assert_eq!(json["isActive"], true);
}

#[test]
fn record_defaults_radius_and_active_flag() {
    let json = serde_json::json!({
        "_id": "x",
        "name": "X",
        "company": "c",
        "location": {"coordinates": [18.4, -33.9], "city": "Cape Town", "province": "Western Cape", "country": "South Africa"},
        "coolerModel": "Compact",
        "status": "Idle"
    });
    let record: CoolerRecord = serde_json::from_value(json).unwrap();
    assert!((record.radius - DEFAULT_COOLER_RADIUS_M).abs() < f64::EPSILON);
    assert!(record.is_active);
    assert_eq!(record.location.kind, "Point");
}

#[test]
fn find_by_id_and_parse_label() {
    let coolers = fleet();
    assert_eq!(find_by_id(&coolers, "003").map(|c| c.status), Some(CoolerStatus::Maintenance));
    assert!(find_by_id(&coolers, "999").is_none());
    assert_eq!(CoolerStatus::parse_label("decommissioned"), Some(CoolerStatus::Decommissioned));
    assert_eq!(CoolerStatus::parse_label("broken"), None);
}
