use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use coolfleet_core::{
    cooler_feature_collection, CoolerPoint, DrawnFeature, Geofence, GeofenceCounts, GeofenceKind,
    GeofenceRegistry, LngLat,
};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::surface::{MapInit, MapLoader, MapSurface, PopupContent};
use crate::CanvasError;

pub const DEFAULT_CENTER: LngLat = LngLat::new(-0.1276, 51.5072);
pub const DEFAULT_ZOOM: f64 = 10.0;
pub const DEFAULT_RADIUS_METERS: f64 = 300.0;
pub const DEFAULT_RESIZE_DELAY: Duration = Duration::from_millis(200);
/// Focusing a cooler never zooms out past this level.
pub const MIN_FOCUS_ZOOM: f64 = 12.0;

pub type ChangeListener = Box<dyn Fn(&[Geofence]) + Send + Sync>;

pub struct CanvasOptions {
    pub access_token: String,
    pub center: LngLat,
    pub zoom: f64,
    pub coolers: Vec<CoolerPoint>,
    pub default_radius_meters: f64,
    pub resize_delay: Duration,
    /// Called with the full geofence list after every change. Runs while the
    /// canvas is locked, so it must not call back into the canvas.
    pub on_change: Option<ChangeListener>,
}

impl CanvasOptions {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            coolers: Vec::new(),
            default_radius_meters: DEFAULT_RADIUS_METERS,
            resize_delay: DEFAULT_RESIZE_DELAY,
            on_change: None,
        }
    }

    #[must_use]
    pub fn with_coolers(mut self, coolers: Vec<CoolerPoint>) -> Self {
        self.coolers = coolers;
        self
    }

    #[must_use]
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&[Geofence]) + Send + Sync + 'static,
    {
        self.on_change = Some(Box::new(listener));
        self
    }
}

impl std::fmt::Debug for CanvasOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasOptions")
            .field("access_token", &"[redacted]")
            .field("center", &self.center)
            .field("zoom", &self.zoom)
            .field("coolers", &self.coolers.len())
            .field("default_radius_meters", &self.default_radius_meters)
            .field("resize_delay", &self.resize_delay)
            .field("on_change", &self.on_change.as_ref().map(|_| "<listener>"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanvasState {
    Uninitialized,
    LoadingModules,
    Initialized,
    /// The map failed to load. Inert until unmounted and mounted again.
    Failed,
    Disposed,
}

impl std::fmt::Display for CanvasState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CanvasState::Uninitialized => "uninitialized",
            CanvasState::LoadingModules => "loading-modules",
            CanvasState::Initialized => "initialized",
            CanvasState::Failed => "failed",
            CanvasState::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// Interaction reported by the map surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEvent {
    PointClicked { cooler_id: String },
    PointHovered { cooler_id: String },
    PointLeft,
    DrawCreated,
    DrawUpdated,
    DrawDeleted,
    LayoutChanged,
}

enum Phase<S> {
    Uninitialized,
    Loading { generation: u64 },
    Initialized(S),
    Failed,
    Disposed,
}

impl<S> Phase<S> {
    fn state(&self) -> CanvasState {
        match self {
            Phase::Uninitialized => CanvasState::Uninitialized,
            Phase::Loading { .. } => CanvasState::LoadingModules,
            Phase::Initialized(_) => CanvasState::Initialized,
            Phase::Failed => CanvasState::Failed,
            Phase::Disposed => CanvasState::Disposed,
        }
    }
}

struct Inner<S> {
    phase: Phase<S>,
    /// Bumped on every mount; a load only applies to its own generation.
    generation: u64,
    coolers: Vec<CoolerPoint>,
    selected: Option<String>,
    radius_meters: f64,
    registry: GeofenceRegistry,
    resize_timer: Option<JoinHandle<()>>,
    resize_seq: u64,
    state_tx: watch::Sender<CanvasState>,
}

fn lock<S>(inner: &Mutex<Inner<S>>) -> MutexGuard<'_, Inner<S>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: MapSurface> Inner<S> {
    fn set_phase(&mut self, phase: Phase<S>) {
        self.phase = phase;
        self.state_tx.send_replace(self.phase.state());
    }

    fn surface(&self) -> Result<&S, CanvasError> {
        match &self.phase {
            Phase::Initialized(surface) => Ok(surface),
            other => Err(CanvasError::NotReady(other.state())),
        }
    }

    fn point(&self, cooler_id: &str) -> Option<&CoolerPoint> {
        self.coolers.iter().find(|c| c.id == cooler_id)
    }

    fn finish_load(&mut self, generation: u64, result: Result<S, CanvasError>) {
        let current = matches!(self.phase, Phase::Loading { generation: g } if g == generation);
        match result {
            Ok(surface) if current => {
                self.initialize(&surface);
                self.set_phase(Phase::Initialized(surface));
                tracing::info!(coolers = self.coolers.len(), "map canvas initialized");
            }
            Ok(surface) => {
                tracing::debug!(generation, "map loaded after unmount; disposing");
                surface.dispose();
            }
            Err(e) if current => {
                tracing::error!(error = %e, "map failed to load");
                self.set_phase(Phase::Failed);
            }
            Err(e) => {
                tracing::debug!(generation, error = %e, "stale map load failed");
            }
        }
    }

    fn initialize(&mut self, surface: &S) {
        surface.set_cooler_data(cooler_feature_collection(&self.coolers));
        self.selected = None;
        surface.set_selected_filter(None);

        let mut drawn = Vec::new();
        for geofence in self.registry.list() {
            match geofence.kind {
                GeofenceKind::Radius => surface.upsert_fence_overlay(geofence),
                GeofenceKind::Polygon => drawn.push(geofence.to_feature()),
            }
        }
        if !drawn.is_empty() {
            surface.set_draw_features(drawn);
        }
    }

    fn select(&mut self, cooler_id: Option<&str>) -> Result<(), CanvasError> {
        let target = match cooler_id {
            Some(id) => Some(
                self.point(id)
                    .map(|p| p.coordinates)
                    .ok_or_else(|| CanvasError::UnknownCooler(id.to_string()))?,
            ),
            None => None,
        };
        self.selected = cooler_id.map(ToOwned::to_owned);

        if let Phase::Initialized(surface) = &self.phase {
            surface.set_selected_filter(cooler_id);
            if let Some(center) = target {
                surface.fly_to(center, surface.zoom().max(MIN_FOCUS_ZOOM));
            }
        }
        Ok(())
    }

    fn hover(&self, cooler_id: &str) -> Result<(), CanvasError> {
        let surface = self.surface()?;
        match self.point(cooler_id) {
            Some(point) => surface.show_popup(point.coordinates, &PopupContent::for_point(point)),
            None => tracing::debug!(cooler_id, "hover over unknown cooler"),
        }
        Ok(())
    }

    fn merge_draw_tool(&mut self) -> Result<(), CanvasError> {
        let features = self.surface()?.draw_features();
        let drawn: Vec<DrawnFeature> = features.iter().filter_map(DrawnFeature::from_feature).collect();
        let merged = self.registry.merge_drawn_polygons(&drawn);
        tracing::debug!(geofences = merged.len(), "merged draw tool polygons");
        Ok(())
    }

    fn cancel_resize(&mut self) {
        if let Some(timer) = self.resize_timer.take() {
            timer.abort();
        }
    }
}

/// Map-bound geofence editor.
///
/// Owns the in-session [`GeofenceRegistry`] and drives a [`MapSurface`]
/// obtained from a [`MapLoader`]. Loading runs on a spawned task and its
/// result is discarded if the canvas was unmounted in the meantime.
pub struct GeofenceCanvas<L: MapLoader> {
    loader: Arc<L>,
    init: MapInit,
    resize_delay: Duration,
    inner: Arc<Mutex<Inner<L::Surface>>>,
    state_rx: watch::Receiver<CanvasState>,
}

impl<L: MapLoader> GeofenceCanvas<L> {
    #[must_use]
    pub fn new(loader: L, options: CanvasOptions) -> Self {
        let (state_tx, state_rx) = watch::channel(CanvasState::Uninitialized);
        let mut registry = GeofenceRegistry::new();
        if let Some(listener) = options.on_change {
            registry.set_listener(listener);
        }
        let inner = Inner {
            phase: Phase::Uninitialized,
            generation: 0,
            coolers: options.coolers,
            selected: None,
            radius_meters: options.default_radius_meters,
            registry,
            resize_timer: None,
            resize_seq: 0,
            state_tx,
        };
        Self {
            loader: Arc::new(loader),
            init: MapInit {
                access_token: options.access_token,
                center: options.center,
                zoom: options.zoom,
            },
            resize_delay: options.resize_delay,
            inner: Arc::new(Mutex::new(inner)),
            state_rx,
        }
    }

    #[must_use]
    pub fn state(&self) -> CanvasState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CanvasState> {
        self.state_rx.clone()
    }

    /// Wait until no load is in flight and return the resulting state.
    pub async fn settled(&self) -> CanvasState {
        let mut rx = self.state_rx.clone();
        let settled = match rx.wait_for(|s| *s != CanvasState::LoadingModules).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        settled
    }

    #[must_use]
    pub fn has_surface(&self) -> bool {
        matches!(lock(&self.inner).phase, Phase::Initialized(_))
    }

    /// Start loading the map. Allowed from `uninitialized` and `disposed`.
    ///
    /// # Errors
    ///
    /// [`CanvasError::NoRuntime`] outside a Tokio runtime,
    /// [`CanvasError::AlreadyMounted`] in any other state.
    pub fn mount(&self) -> Result<(), CanvasError> {
        let handle = Handle::try_current().map_err(|_| CanvasError::NoRuntime)?;
        let generation = {
            let mut inner = lock(&self.inner);
            match inner.phase {
                Phase::Uninitialized | Phase::Disposed => {}
                ref other => return Err(CanvasError::AlreadyMounted(other.state())),
            }
            inner.generation += 1;
            let generation = inner.generation;
            inner.set_phase(Phase::Loading { generation });
            generation
        };

        let loader = Arc::clone(&self.loader);
        let shared = Arc::clone(&self.inner);
        let init = self.init.clone();
        tracing::debug!(generation, "loading map modules");
        handle.spawn(async move {
            let result = loader.load(init).await;
            lock(&shared).finish_load(generation, result);
        });
        Ok(())
    }

    /// Dispose the surface, cancel the resize timer and invalidate any
    /// in-flight load. A no-op before the first mount.
    pub fn unmount(&self) {
        let mut inner = lock(&self.inner);
        inner.cancel_resize();
        let previous = std::mem::replace(&mut inner.phase, Phase::Uninitialized);
        match previous {
            Phase::Uninitialized => return,
            Phase::Initialized(surface) => {
                surface.hide_popup();
                surface.dispose();
                tracing::info!("map canvas disposed");
            }
            Phase::Loading { generation } => {
                tracing::debug!(generation, "unmounted while loading; load result will be dropped");
            }
            Phase::Failed | Phase::Disposed => {}
        }
        inner.set_phase(Phase::Disposed);
    }

    /// Route an interaction from the map surface.
    ///
    /// # Errors
    ///
    /// [`CanvasError::NotReady`] when the map is not initialized,
    /// [`CanvasError::UnknownCooler`] for a click on an id no longer listed.
    pub fn handle_event(&self, event: MapEvent) -> Result<(), CanvasError> {
        if event == MapEvent::LayoutChanged {
            return self.schedule_resize();
        }

        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        match event {
            MapEvent::PointClicked { cooler_id } => {
                inner.surface()?;
                inner.select(Some(&cooler_id))
            }
            MapEvent::PointHovered { cooler_id } => inner.hover(&cooler_id),
            MapEvent::PointLeft => {
                inner.surface()?.hide_popup();
                Ok(())
            }
            MapEvent::DrawCreated | MapEvent::DrawUpdated | MapEvent::DrawDeleted => {
                inner.merge_draw_tool()
            }
            MapEvent::LayoutChanged => Ok(()),
        }
    }

    /// Dropdown selection. `None` clears it. Recenters on the cooler when
    /// the map is ready.
    ///
    /// # Errors
    ///
    /// [`CanvasError::UnknownCooler`] when the id is not in the point list.
    pub fn select_cooler(&self, cooler_id: Option<&str>) -> Result<(), CanvasError> {
        lock(&self.inner).select(cooler_id)
    }

    #[must_use]
    pub fn selected_cooler(&self) -> Option<String> {
        lock(&self.inner).selected.clone()
    }

    /// Replace the cooler list and refresh the point source. A selection
    /// that is no longer listed is cleared.
    pub fn set_coolers(&self, coolers: Vec<CoolerPoint>) {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        inner.coolers = coolers;
        if inner
            .selected
            .as_deref()
            .is_some_and(|id| !inner.coolers.iter().any(|c| c.id == id))
        {
            inner.selected = None;
            if let Phase::Initialized(surface) = &inner.phase {
                surface.set_selected_filter(None);
            }
        }
        if let Phase::Initialized(surface) = &inner.phase {
            surface.set_cooler_data(cooler_feature_collection(&inner.coolers));
        }
    }

    #[must_use]
    pub fn coolers(&self) -> Vec<CoolerPoint> {
        lock(&self.inner).coolers.clone()
    }

    pub fn set_radius(&self, radius_meters: f64) {
        lock(&self.inner).radius_meters = radius_meters;
    }

    #[must_use]
    pub fn radius(&self) -> f64 {
        lock(&self.inner).radius_meters
    }

    /// Create a radius geofence for the selected cooler, or the first listed
    /// one, using the current radius. Recenters on the cooler and draws the
    /// overlay.
    ///
    /// # Errors
    ///
    /// [`CanvasError::NotReady`] before the map is initialized and
    /// [`CanvasError::Geofence`] from the registry. Nothing changes on error.
    pub fn create_radius_geofence(&self, now: DateTime<Utc>) -> Result<Geofence, CanvasError> {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        let Phase::Initialized(surface) = &inner.phase else {
            return Err(CanvasError::NotReady(inner.phase.state()));
        };

        let geofence = inner
            .registry
            .create_radius_geofence(
                &inner.coolers,
                inner.selected.as_deref(),
                inner.radius_meters,
                now,
            )?
            .clone();

        if let Some(point) = geofence
            .cooler_id
            .as_deref()
            .and_then(|id| inner.coolers.iter().find(|c| c.id == id))
        {
            surface.fly_to(point.coordinates, surface.zoom().max(MIN_FOCUS_ZOOM));
        }
        surface.upsert_fence_overlay(&geofence);
        Ok(geofence)
    }

    /// Delete a geofence of either kind and remove it from the map.
    ///
    /// # Errors
    ///
    /// [`CanvasError::Geofence`] when the id is unknown.
    pub fn delete_geofence(&self, id: &str) -> Result<Geofence, CanvasError> {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        let removed = inner.registry.delete(id)?;
        if let Phase::Initialized(surface) = &inner.phase {
            match removed.kind {
                GeofenceKind::Radius => surface.remove_fence_overlay(&removed.id),
                GeofenceKind::Polygon => surface.remove_draw_feature(&removed.id),
            }
        }
        Ok(removed)
    }

    /// # Errors
    ///
    /// [`CanvasError::Geofence`] for an unknown id or blank label.
    pub fn rename_geofence(&self, id: &str, label: &str) -> Result<Geofence, CanvasError> {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        let renamed = inner.registry.rename(id, label)?.clone();
        if let Phase::Initialized(surface) = &inner.phase {
            if renamed.kind == GeofenceKind::Radius {
                surface.upsert_fence_overlay(&renamed);
            }
        }
        Ok(renamed)
    }

    #[must_use]
    pub fn geofences(&self) -> Vec<Geofence> {
        lock(&self.inner).registry.list().to_vec()
    }

    #[must_use]
    pub fn counts(&self) -> GeofenceCounts {
        lock(&self.inner).registry.counts()
    }

    /// (Re)arm the resize timer; the surface is resized once it fires.
    fn schedule_resize(&self) -> Result<(), CanvasError> {
        let handle = Handle::try_current().map_err(|_| CanvasError::NoRuntime)?;
        let mut inner = lock(&self.inner);
        inner.cancel_resize();
        inner.resize_seq += 1;
        let seq = inner.resize_seq;
        let delay = self.resize_delay;
        let weak: Weak<Mutex<Inner<L::Surface>>> = Arc::downgrade(&self.inner);
        inner.resize_timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut inner = lock(&shared);
            if inner.resize_seq != seq {
                return;
            }
            inner.resize_timer = None;
            if let Phase::Initialized(surface) = &inner.phase {
                surface.resize();
            }
        }));
        Ok(())
    }
}

impl<L: MapLoader> Drop for GeofenceCanvas<L> {
    fn drop(&mut self) {
        self.unmount();
    }
}
