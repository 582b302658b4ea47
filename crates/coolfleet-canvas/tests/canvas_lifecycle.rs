//! Lifecycle and interaction tests for `GeofenceCanvas` against a recording surface.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use coolfleet_canvas::{
    CanvasError, CanvasOptions, CanvasState, GeofenceCanvas, MapEvent, MapInit, MapLoader,
    MapSurface, PopupContent,
};
use coolfleet_core::geometry::ring_positions;
use coolfleet_core::{CoolerPoint, Geofence, GeofenceError, GeofenceKind, LngLat, CIRCLE_STEPS};
use geojson::{Feature, FeatureCollection};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    SetCoolerData(usize),
    SetFilter(Option<String>),
    FlyTo(LngLat, f64),
    ShowPopup(PopupContent),
    HidePopup,
    UpsertOverlay(String),
    RemoveOverlay(String),
    SetDraw(usize),
    RemoveDraw(String),
    Resize,
    Dispose,
}

#[derive(Clone, Default)]
struct Shared {
    calls: Arc<Mutex<Vec<Call>>>,
    draw: Arc<Mutex<Vec<Feature>>>,
    alive: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
}

impl Shared {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn set_draw(&self, features: Vec<Feature>) {
        *self.draw.lock().unwrap() = features;
    }
}

struct RecordingSurface {
    shared: Shared,
}

impl RecordingSurface {
    fn record(&self, call: Call) {
        self.shared.calls.lock().unwrap().push(call);
    }
}

impl Drop for RecordingSurface {
    fn drop(&mut self) {
        self.shared.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MapSurface for RecordingSurface {
    fn set_cooler_data(&self, data: FeatureCollection) {
        self.record(Call::SetCoolerData(data.features.len()));
    }

    fn set_selected_filter(&self, cooler_id: Option<&str>) {
        self.record(Call::SetFilter(cooler_id.map(ToOwned::to_owned)));
    }

    fn fly_to(&self, center: LngLat, zoom: f64) {
        self.record(Call::FlyTo(center, zoom));
    }

    fn zoom(&self) -> f64 {
        10.0
    }

    fn show_popup(&self, _at: LngLat, content: &PopupContent) {
        self.record(Call::ShowPopup(content.clone()));
    }

    fn hide_popup(&self) {
        self.record(Call::HidePopup);
    }

    fn upsert_fence_overlay(&self, geofence: &Geofence) {
        self.record(Call::UpsertOverlay(geofence.id.clone()));
    }

    fn remove_fence_overlay(&self, geofence_id: &str) {
        self.record(Call::RemoveOverlay(geofence_id.to_string()));
    }

    fn draw_features(&self) -> Vec<Feature> {
        self.shared.draw.lock().unwrap().clone()
    }

    fn set_draw_features(&self, features: Vec<Feature>) {
        self.record(Call::SetDraw(features.len()));
        self.shared.set_draw(features);
    }

    fn remove_draw_feature(&self, id: &str) {
        self.record(Call::RemoveDraw(id.to_string()));
        self.shared.draw.lock().unwrap().retain(|f| {
            !matches!(&f.id, Some(geojson::feature::Id::String(s)) if s == id)
        });
    }

    fn resize(&self) {
        self.record(Call::Resize);
    }

    fn dispose(&self) {
        self.record(Call::Dispose);
    }
}

#[derive(Clone, Default)]
struct TestLoader {
    shared: Shared,
    gate: Option<Arc<Notify>>,
    fail: bool,
}

impl MapLoader for TestLoader {
    type Surface = RecordingSurface;

    fn load(
        &self,
        _init: MapInit,
    ) -> impl Future<Output = Result<RecordingSurface, CanvasError>> + Send {
        let shared = self.shared.clone();
        let gate = self.gate.clone();
        let fail = self.fail;
        async move {
            shared.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if fail {
                return Err(CanvasError::Load("map module import failed".to_string()));
            }
            shared.alive.fetch_add(1, Ordering::SeqCst);
            Ok(RecordingSurface { shared })
        }
    }
}

fn point(id: &str, lng: f64, lat: f64) -> CoolerPoint {
    CoolerPoint {
        id: id.to_string(),
        name: format!("Cooler {id}"),
        coordinates: LngLat::new(lng, lat),
        status: Some("Active".to_string()),
        city: Some("Johannesburg".to_string()),
        province: Some("Gauteng".to_string()),
        country: None,
        radius: Some(300.0),
    }
}

fn coolers() -> Vec<CoolerPoint> {
    vec![
        point("c1", 28.0473, -26.2041),
        point("c2", 18.4241, -33.9249),
    ]
}

fn polygon_feature(id: &str) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::Polygon(vec![vec![
            vec![28.0, -26.0],
            vec![28.1, -26.0],
            vec![28.1, -26.1],
            vec![28.0, -26.0],
        ]]))),
        id: Some(geojson::feature::Id::String(id.to_string())),
        properties: None,
        foreign_members: None,
    }
}

async fn ready_canvas(loader: TestLoader) -> GeofenceCanvas<TestLoader> {
    let canvas = GeofenceCanvas::new(loader, CanvasOptions::new("pk.test").with_coolers(coolers()));
    canvas.mount().unwrap();
    assert_eq!(canvas.settled().await, CanvasState::Initialized);
    canvas
}

/// Let spawned tasks run until `cond` holds.
async fn until(cond: impl Fn() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn mount_seeds_points_and_clears_selection_filter() {
    let loader = TestLoader::default();
    let shared = loader.shared.clone();
    let canvas = GeofenceCanvas::new(loader, CanvasOptions::new("pk.test").with_coolers(coolers()));
    assert_eq!(canvas.state(), CanvasState::Uninitialized);

    canvas.mount().unwrap();
    assert_eq!(canvas.state(), CanvasState::LoadingModules);
    assert_eq!(canvas.settled().await, CanvasState::Initialized);

    assert_eq!(
        shared.calls(),
        [Call::SetCoolerData(2), Call::SetFilter(None)]
    );
    assert!(canvas.has_surface());
    assert!(matches!(
        canvas.mount(),
        Err(CanvasError::AlreadyMounted(CanvasState::Initialized))
    ));
}

#[tokio::test]
async fn selecting_existing_cooler_is_reflected_and_recenters() {
    let loader = TestLoader::default();
    let shared = loader.shared.clone();
    let canvas = ready_canvas(loader).await;
    shared.clear();

    canvas.select_cooler(Some("c2")).unwrap();

    assert_eq!(canvas.selected_cooler().as_deref(), Some("c2"));
    assert_eq!(
        shared.calls(),
        [
            Call::SetFilter(Some("c2".to_string())),
            Call::FlyTo(LngLat::new(18.4241, -33.9249), 12.0),
        ]
    );

    canvas.select_cooler(None).unwrap();
    assert_eq!(canvas.selected_cooler(), None);
    assert!(matches!(
        canvas.select_cooler(Some("ghost")),
        Err(CanvasError::UnknownCooler(_))
    ));
    assert_eq!(canvas.selected_cooler(), None);
}

#[tokio::test]
async fn clicking_a_point_selects_it() {
    let loader = TestLoader::default();
    let shared = loader.shared.clone();
    let canvas = ready_canvas(loader).await;
    shared.clear();

    canvas
        .handle_event(MapEvent::PointClicked {
            cooler_id: "c1".to_string(),
        })
        .unwrap();

    assert_eq!(canvas.selected_cooler().as_deref(), Some("c1"));
    assert_eq!(
        shared.count(&Call::FlyTo(LngLat::new(28.0473, -26.2041), 12.0)),
        1
    );
}

#[tokio::test]
async fn hover_shows_popup_and_leave_removes_it() {
    let loader = TestLoader::default();
    let shared = loader.shared.clone();
    let canvas = ready_canvas(loader).await;
    shared.clear();

    canvas
        .handle_event(MapEvent::PointHovered {
            cooler_id: "c1".to_string(),
        })
        .unwrap();
    canvas.handle_event(MapEvent::PointLeft).unwrap();

    let calls = shared.calls();
    let Call::ShowPopup(content) = &calls[0] else {
        panic!("expected popup, got {calls:?}");
    };
    assert_eq!(
        content.lines(),
        [
            "Cooler c1",
            "Status: Active",
            "Johannesburg, Gauteng",
            "Radius: 300m"
        ]
    );
    assert_eq!(calls[1], Call::HidePopup);
}

#[tokio::test]
async fn draw_events_merge_polygons_and_keep_radius_fences() {
    let notified = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notified);
    let loader = TestLoader::default();
    let shared = loader.shared.clone();
    let canvas = GeofenceCanvas::new(
        loader,
        CanvasOptions::new("pk.test")
            .with_coolers(coolers())
            .with_listener(move |fences: &[Geofence]| {
                sink.lock().unwrap().push(fences.len());
            }),
    );
    canvas.mount().unwrap();
    canvas.settled().await;

    let radius = canvas.create_radius_geofence(now()).unwrap();
    shared.set_draw(vec![polygon_feature("p1"), polygon_feature("p2")]);
    canvas.handle_event(MapEvent::DrawCreated).unwrap();
    shared.set_draw(vec![polygon_feature("p2")]);
    canvas.handle_event(MapEvent::DrawDeleted).unwrap();

    let fences = canvas.geofences();
    let ids: Vec<&str> = fences.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, [radius.id.as_str(), "p2"]);
    assert_eq!(fences[1].kind, GeofenceKind::Polygon);
    assert_eq!(fences[1].label, "Custom Zone");
    assert_eq!(*notified.lock().unwrap(), [1, 3, 2]);
}

#[tokio::test]
async fn radius_geofence_for_cooler_at_johannesburg() {
    let loader = TestLoader::default();
    let shared = loader.shared.clone();
    let canvas = ready_canvas(loader).await;
    canvas.set_radius(500.0);
    shared.clear();

    let fence = canvas.create_radius_geofence(now()).unwrap();

    assert!(fence.id.starts_with("radius-c1-"));
    assert_eq!(fence.kind, GeofenceKind::Radius);
    assert_eq!(ring_positions(&fence.geometry).len(), CIRCLE_STEPS + 1);
    assert_eq!(canvas.counts().radius, 1);
    assert_eq!(
        shared.calls(),
        [
            Call::FlyTo(LngLat::new(28.0473, -26.2041), 12.0),
            Call::UpsertOverlay(fence.id.clone()),
        ]
    );

    canvas.delete_geofence(&fence.id).unwrap();
    assert_eq!(shared.count(&Call::RemoveOverlay(fence.id.clone())), 1);
    assert!(canvas.geofences().is_empty());
}

#[tokio::test]
async fn radius_geofence_needs_a_ready_map_and_coolers() {
    let loader = TestLoader::default();
    let canvas = GeofenceCanvas::new(loader.clone(), CanvasOptions::new("pk.test"));
    assert!(matches!(
        canvas.create_radius_geofence(now()),
        Err(CanvasError::NotReady(CanvasState::Uninitialized))
    ));

    canvas.mount().unwrap();
    canvas.settled().await;
    assert!(matches!(
        canvas.create_radius_geofence(now()),
        Err(CanvasError::Geofence(GeofenceError::NoCoolers))
    ));
    assert!(canvas.geofences().is_empty());
}

#[tokio::test]
async fn unmount_releases_surface_and_remount_gets_a_fresh_one() {
    let loader = TestLoader::default();
    let shared = loader.shared.clone();
    let canvas = ready_canvas(loader).await;
    let fence = canvas.create_radius_geofence(now()).unwrap();
    assert_eq!(shared.alive.load(Ordering::SeqCst), 1);

    canvas.unmount();
    assert_eq!(canvas.state(), CanvasState::Disposed);
    assert!(!canvas.has_surface());
    assert_eq!(shared.alive.load(Ordering::SeqCst), 0);
    assert_eq!(shared.count(&Call::Dispose), 1);

    shared.clear();
    canvas.mount().unwrap();
    assert_eq!(canvas.settled().await, CanvasState::Initialized);
    assert_eq!(shared.loads.load(Ordering::SeqCst), 2);
    assert_eq!(shared.alive.load(Ordering::SeqCst), 1);
    assert_eq!(shared.count(&Call::UpsertOverlay(fence.id)), 1);
}

#[tokio::test]
async fn unmount_while_loading_discards_the_late_surface() {
    let gate = Arc::new(Notify::new());
    let loader = TestLoader {
        gate: Some(Arc::clone(&gate)),
        ..TestLoader::default()
    };
    let shared = loader.shared.clone();
    let canvas = GeofenceCanvas::new(loader, CanvasOptions::new("pk.test").with_coolers(coolers()));

    canvas.mount().unwrap();
    canvas.unmount();
    assert_eq!(canvas.state(), CanvasState::Disposed);

    gate.notify_one();
    until(|| shared.count(&Call::Dispose) == 1 && shared.alive.load(Ordering::SeqCst) == 0).await;

    assert_eq!(canvas.state(), CanvasState::Disposed);
    assert!(!canvas.has_surface());
    assert_eq!(shared.count(&Call::SetCoolerData(2)), 0);
}

#[tokio::test]
async fn load_failure_leaves_canvas_failed() {
    let loader = TestLoader {
        fail: true,
        ..TestLoader::default()
    };
    let canvas = GeofenceCanvas::new(loader, CanvasOptions::new("pk.test").with_coolers(coolers()));
    canvas.mount().unwrap();

    assert_eq!(canvas.settled().await, CanvasState::Failed);
    assert!(matches!(
        canvas.handle_event(MapEvent::DrawCreated),
        Err(CanvasError::NotReady(CanvasState::Failed))
    ));
    assert!(matches!(
        canvas.mount(),
        Err(CanvasError::AlreadyMounted(CanvasState::Failed))
    ));

    canvas.unmount();
    assert_eq!(canvas.state(), CanvasState::Disposed);
}

#[tokio::test(start_paused = true)]
async fn resize_is_debounced() {
    let loader = TestLoader::default();
    let shared = loader.shared.clone();
    let canvas = ready_canvas(loader).await;

    canvas.handle_event(MapEvent::LayoutChanged).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    canvas.handle_event(MapEvent::LayoutChanged).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(shared.count(&Call::Resize), 0, "re-trigger restarts the delay");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(shared.count(&Call::Resize), 1);
}

#[tokio::test(start_paused = true)]
async fn unmount_cancels_pending_resize() {
    let loader = TestLoader::default();
    let shared = loader.shared.clone();
    let canvas = ready_canvas(loader).await;

    canvas.handle_event(MapEvent::LayoutChanged).unwrap();
    canvas.unmount();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(shared.count(&Call::Resize), 0);
}

#[test]
fn mount_outside_runtime_is_an_error() {
    let canvas = GeofenceCanvas::new(TestLoader::default(), CanvasOptions::new("pk.test"));
    assert!(matches!(canvas.mount(), Err(CanvasError::NoRuntime)));
    assert_eq!(canvas.state(), CanvasState::Uninitialized);
}
