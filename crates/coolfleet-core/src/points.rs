//! Adapts cooler listings into the minimal point shape the map renders.
//!
//! Both entry points are total: malformed records are dropped, never
//! reported as errors.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};

use crate::coolers::CoolerRecord;
use crate::geometry::LngLat;

const UNNAMED_COOLER: &str = "Unnamed Cooler";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolerPoint {
    pub id: String,
    pub name: String,
    pub coordinates: LngLat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

impl CoolerPoint {
    /// `city, province, country` with missing parts skipped.
    #[must_use]
    pub fn location_label(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.province, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

fn coordinates_from_slice(coords: &[f64]) -> Option<LngLat> {
    match coords {
        [lng, lat, ..] => Some(LngLat::new(*lng, *lat)).filter(LngLat::is_valid),
        _ => None,
    }
}

/// Convert typed cooler records, dropping those without usable coordinates.
#[must_use]
pub fn points_from_records(records: &[CoolerRecord]) -> Vec<CoolerPoint> {
    records
        .iter()
        .filter_map(|record| {
            let coordinates = coordinates_from_slice(&record.location.coordinates)?;
            Some(CoolerPoint {
                id: record.id.clone(),
                name: record.name.clone(),
                coordinates,
                status: Some(record.status.to_string()),
                city: Some(record.location.city.clone()),
                province: Some(record.location.province.clone()),
                country: Some(record.location.country.clone()),
                radius: Some(record.radius),
            })
        })
        .collect()
}

/// Convert an untyped backend payload (a JSON array of cooler objects).
///
/// A record without an id is keyed `cooler-<index>`; a record without a
/// name is labelled `Unnamed Cooler`. Anything that is not an array yields
/// an empty list.
#[must_use]
pub fn points_from_json(payload: &serde_json::Value) -> Vec<CoolerPoint> {
    let Some(items) = payload.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let location = item.get("location");
            let coords: Vec<f64> = location
                .and_then(|l| l.get("coordinates"))
                .and_then(serde_json::Value::as_array)?
                .iter()
                .map(serde_json::Value::as_f64)
                .collect::<Option<Vec<f64>>>()?;
            let coordinates = coordinates_from_slice(&coords)?;

            let id = match item.get("_id").or_else(|| item.get("id")) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => format!("cooler-{idx}"),
            };
            let text = |v: Option<&serde_json::Value>| {
                v.and_then(serde_json::Value::as_str).map(ToOwned::to_owned)
            };

            Some(CoolerPoint {
                id,
                name: text(item.get("name")).unwrap_or_else(|| UNNAMED_COOLER.to_string()),
                coordinates,
                status: text(item.get("status")),
                city: text(location.and_then(|l| l.get("city"))),
                province: text(location.and_then(|l| l.get("province"))),
                country: text(location.and_then(|l| l.get("country"))),
                radius: item.get("radius").and_then(serde_json::Value::as_f64),
            })
        })
        .collect()
}

/// Render points as a GeoJSON `FeatureCollection` of `Point` features whose
/// properties carry every point field.
#[must_use]
pub fn cooler_feature_collection(points: &[CoolerPoint]) -> FeatureCollection {
    let features = points
        .iter()
        .map(|point| {
            let mut properties = JsonObject::new();
            properties.insert("id".to_string(), point.id.clone().into());
            properties.insert("name".to_string(), point.name.clone().into());
            let optional = [
                ("status", &point.status),
                ("city", &point.city),
                ("province", &point.province),
                ("country", &point.country),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    properties.insert(key.to_string(), value.clone().into());
                }
            }
            if let Some(radius) = point.radius {
                properties.insert("radius".to_string(), radius.into());
            }

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![
                    point.coordinates.lng,
                    point.coordinates.lat,
                ]))),
                id: Some(geojson::feature::Id::String(point.id.clone())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_records_without_coordinates_are_dropped() {
        let payload = json!([
            {"_id": "a", "name": "A", "location": {"coordinates": [28.0, -26.0]}},
            {"_id": "b", "name": "B", "location": {"coordinates": [28.0]}},
            {"_id": "c", "name": "C"},
            {"_id": "d", "name": "D", "location": {"coordinates": ["x", -26.0]}},
            {"_id": "e", "name": "E", "location": {"coordinates": [300.0, -26.0]}},
        ]);
        let points = points_from_json(&payload);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, "a");
    }

    #[test]
    fn json_records_get_fallback_id_and_name() {
        let payload = json!([
            {"_id": "a", "name": "A", "location": {"coordinates": [28.0, -26.0]}},
            {"location": {"coordinates": [18.4, -33.9], "city": "Cape Town"}, "radius": 250},
        ]);
        let points = points_from_json(&payload);
        assert_eq!(points[1].id, "cooler-1");
        assert_eq!(points[1].name, "Unnamed Cooler");
        assert_eq!(points[1].city.as_deref(), Some("Cape Town"));
        assert_eq!(points[1].radius, Some(250.0));
    }

    #[test]
    fn json_non_array_payload_is_empty() {
        assert!(points_from_json(&json!({"error": "nope"})).is_empty());
        assert!(points_from_json(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn location_label_skips_missing_parts() {
        let point = CoolerPoint {
            id: "a".to_string(),
            name: "A".to_string(),
            coordinates: LngLat::new(28.0, -26.0),
            status: None,
            city: Some("Soweto".to_string()),
            province: None,
            country: Some("South Africa".to_string()),
            radius: None,
        };
        assert_eq!(point.location_label().as_deref(), Some("Soweto, South Africa"));
    }

    #[test]
    fn feature_collection_carries_properties() {
        let point = CoolerPoint {
            id: "c1".to_string(),
            name: "Cooler 1".to_string(),
            coordinates: LngLat::new(28.0473, -26.2041),
            status: Some("Active".to_string()),
            city: Some("Johannesburg".to_string()),
            province: Some("Gauteng".to_string()),
            country: Some("South Africa".to_string()),
            radius: Some(300.0),
        };
        let fc = cooler_feature_collection(&[point]);
        let feature = &fc.features[0];
        let props = feature.properties.as_ref().unwrap();
        assert_eq!(props["id"], "c1");
        assert_eq!(props["status"], "Active");
        assert_eq!(props["radius"], 300.0);
        assert_eq!(
            feature.geometry.as_ref().map(|g| &g.value),
            Some(&Value::Point(vec![28.0473, -26.2041]))
        );
    }
}
