use coolfleet_core::{circle_polygon, GeometryError, LngLat};
use geojson::{Feature, Geometry, JsonObject, Value};

pub(crate) fn run_circle(lng: f64, lat: f64, radius: f64, steps: usize) -> anyhow::Result<()> {
    let feature = circle_feature(LngLat::new(lng, lat), radius, steps)?;
    println!("{}", serde_json::to_string_pretty(&feature)?);
    Ok(())
}

/// A circle polygon as a `GeoJSON` feature with its center and radius in the
/// properties.
pub(crate) fn circle_feature(
    center: LngLat,
    radius_meters: f64,
    steps: usize,
) -> Result<Feature, GeometryError> {
    let polygon = circle_polygon(center, radius_meters, steps)?;

    let mut properties = JsonObject::new();
    properties.insert("center".to_string(), serde_json::json!([center.lng, center.lat]));
    properties.insert("radiusMeters".to_string(), serde_json::json!(radius_meters));

    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(&polygon))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}
