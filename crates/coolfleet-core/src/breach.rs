//! Per-cooler breach state machine driven by GPS fixes.
//!
//! A cooler is `inside` when any of its assigned geofences contains the fix.
//! Leaving needs `exit_confirmations` consecutive outside fixes and
//! returning needs `return_confirmations` consecutive inside fixes, so a
//! unit jittering on the fence line does not flap. A fix that moved the
//! unit while it reported no mains power is a `power-move` straight away.
//! Staying put inside for `idle_after` is `idle`. Silence for
//! `offline_after` is `offline`, applied by [`BreachMonitor::sweep_offline`].

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::geofence::Geofence;
use crate::geometry::{self, LngLat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreachState {
    Inside,
    Idle,
    Breach,
    Offline,
    PowerMove,
}

impl std::fmt::Display for BreachState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreachState::Inside => "inside",
            BreachState::Idle => "idle",
            BreachState::Breach => "breach",
            BreachState::Offline => "offline",
            BreachState::PowerMove => "power-move",
        };
        f.write_str(s)
    }
}

/// A single location report from a cooler's tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub cooler_id: String,
    pub position: LngLat,
    pub timestamp: DateTime<Utc>,
    /// `Some(false)` when the unit reports running on battery.
    #[serde(default)]
    pub powered: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreachPolicy {
    pub exit_confirmations: u32,
    pub return_confirmations: u32,
    pub offline_after: Duration,
    pub idle_after: Duration,
    /// Movement below this many meters counts as stationary.
    pub idle_tolerance_meters: f64,
}

impl Default for BreachPolicy {
    fn default() -> Self {
        Self {
            exit_confirmations: 2,
            return_confirmations: 2,
            offline_after: Duration::minutes(30),
            idle_after: Duration::days(7),
            idle_tolerance_meters: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreachTransition {
    pub cooler_id: String,
    pub from: BreachState,
    pub to: BreachState,
    pub at: DateTime<Utc>,
    /// Distance to the nearest assigned fence when the fix was outside.
    pub distance_outside_meters: Option<f64>,
    /// Nearest assigned fence when outside, the containing fence otherwise.
    pub geofence_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoolerBreachStatus {
    pub cooler_id: String,
    pub state: BreachState,
    pub since: DateTime<Utc>,
    pub last_fix_at: DateTime<Utc>,
    pub last_position: LngLat,
}

#[derive(Debug, Clone)]
struct Tracker {
    state: BreachState,
    since: DateTime<Utc>,
    last_fix_at: DateTime<Utc>,
    last_position: LngLat,
    anchor: LngLat,
    anchor_since: DateTime<Utc>,
    outside_streak: u32,
    inside_streak: u32,
}

struct Membership {
    inside: bool,
    geofence_id: Option<String>,
    distance_outside_meters: Option<f64>,
}

fn membership(fences: &[&Geofence], position: LngLat) -> Membership {
    if let Some(fence) = fences
        .iter()
        .find(|f| geometry::contains(&f.geometry, position))
    {
        return Membership {
            inside: true,
            geofence_id: Some(fence.id.clone()),
            distance_outside_meters: None,
        };
    }

    let nearest = fences
        .iter()
        .filter_map(|f| {
            geometry::distance_outside_meters(&f.geometry, position).map(|d| (f.id.clone(), d))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1));

    Membership {
        inside: false,
        distance_outside_meters: nearest.as_ref().map(|(_, d)| *d),
        geofence_id: nearest.map(|(id, _)| id),
    }
}

/// Tracks the breach state of every cooler that has at least one fence.
#[derive(Debug, Clone, Default)]
pub struct BreachMonitor {
    policy: BreachPolicy,
    trackers: BTreeMap<String, Tracker>,
}

impl BreachMonitor {
    #[must_use]
    pub fn new(policy: BreachPolicy) -> Self {
        Self {
            policy,
            trackers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &BreachPolicy {
        &self.policy
    }

    /// Feed one fix. `fences` are the geofences assigned to the fix's cooler.
    ///
    /// Returns the transition when the cooler's state changed. Coolers
    /// without fences are not classified, and fixes older than the last one
    /// seen for the cooler are ignored.
    pub fn observe(&mut self, fix: &GpsFix, fences: &[&Geofence]) -> Option<BreachTransition> {
        if fences.is_empty() {
            tracing::trace!(cooler_id = %fix.cooler_id, "fix for cooler without geofence; not classified");
            return None;
        }
        if !fix.position.is_valid() {
            tracing::warn!(cooler_id = %fix.cooler_id, position = %fix.position, "dropping fix with invalid position");
            return None;
        }

        let policy = &self.policy;
        let tracker = self
            .trackers
            .entry(fix.cooler_id.clone())
            .or_insert_with(|| Tracker {
                state: BreachState::Inside,
                since: fix.timestamp,
                last_fix_at: fix.timestamp,
                last_position: fix.position,
                anchor: fix.position,
                anchor_since: fix.timestamp,
                outside_streak: 0,
                inside_streak: 0,
            });

        if fix.timestamp < tracker.last_fix_at {
            tracing::debug!(cooler_id = %fix.cooler_id, "ignoring out-of-order fix");
            return None;
        }

        let found = membership(fences, fix.position);
        let moved =
            geometry::distance_meters(tracker.last_position, fix.position) > policy.idle_tolerance_meters;
        if geometry::distance_meters(tracker.anchor, fix.position) > policy.idle_tolerance_meters {
            tracker.anchor = fix.position;
            tracker.anchor_since = fix.timestamp;
        }
        if found.inside {
            tracker.inside_streak = tracker.inside_streak.saturating_add(1);
            tracker.outside_streak = 0;
        } else {
            tracker.outside_streak = tracker.outside_streak.saturating_add(1);
            tracker.inside_streak = 0;
        }

        // An offline cooler is re-evaluated from scratch.
        let baseline = if tracker.state == BreachState::Offline {
            BreachState::Inside
        } else {
            tracker.state
        };
        let stationary_for = fix.timestamp - tracker.anchor_since;
        let next = if fix.powered == Some(false) && moved {
            BreachState::PowerMove
        } else if found.inside {
            if tracker.state == BreachState::Breach
                && tracker.inside_streak < policy.return_confirmations.max(1)
            {
                BreachState::Breach
            } else if stationary_for >= policy.idle_after {
                BreachState::Idle
            } else {
                BreachState::Inside
            }
        } else if tracker.outside_streak >= policy.exit_confirmations.max(1) {
            BreachState::Breach
        } else {
            baseline
        };

        tracker.last_fix_at = fix.timestamp;
        tracker.last_position = fix.position;

        if next == tracker.state {
            return None;
        }

        let transition = BreachTransition {
            cooler_id: fix.cooler_id.clone(),
            from: tracker.state,
            to: next,
            at: fix.timestamp,
            distance_outside_meters: found.distance_outside_meters,
            geofence_id: found.geofence_id,
        };
        tracker.state = next;
        tracker.since = fix.timestamp;
        tracing::info!(
            cooler_id = %transition.cooler_id,
            from = %transition.from,
            to = %transition.to,
            distance_outside_meters = ?transition.distance_outside_meters,
            "breach state changed"
        );
        Some(transition)
    }

    /// Mark every cooler silent for at least `offline_after` as offline.
    pub fn sweep_offline(&mut self, now: DateTime<Utc>) -> Vec<BreachTransition> {
        let offline_after = self.policy.offline_after;
        let mut transitions = Vec::new();
        for (cooler_id, tracker) in &mut self.trackers {
            if tracker.state == BreachState::Offline || now - tracker.last_fix_at < offline_after {
                continue;
            }
            transitions.push(BreachTransition {
                cooler_id: cooler_id.clone(),
                from: tracker.state,
                to: BreachState::Offline,
                at: now,
                distance_outside_meters: None,
                geofence_id: None,
            });
            tracker.state = BreachState::Offline;
            tracker.since = now;
            tracker.outside_streak = 0;
            tracker.inside_streak = 0;
        }
        if !transitions.is_empty() {
            tracing::info!(count = transitions.len(), "coolers marked offline");
        }
        transitions
    }

    #[must_use]
    pub fn status(&self, cooler_id: &str) -> Option<CoolerBreachStatus> {
        self.trackers
            .get(cooler_id)
            .map(|t| Self::to_status(cooler_id, t))
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<CoolerBreachStatus> {
        self.trackers
            .iter()
            .map(|(id, t)| Self::to_status(id, t))
            .collect()
    }

    /// Count of tracked coolers per state.
    #[must_use]
    pub fn state_counts(&self) -> BTreeMap<BreachState, usize> {
        let mut counts = BTreeMap::new();
        for tracker in self.trackers.values() {
            *counts.entry(tracker.state).or_insert(0) += 1;
        }
        counts
    }

    /// Stop tracking a cooler, e.g. after its last geofence was deleted.
    pub fn forget(&mut self, cooler_id: &str) -> bool {
        self.trackers.remove(cooler_id).is_some()
    }

    /// Keep only trackers whose cooler passes `keep`; returns the ids dropped.
    pub fn retain_tracked<F>(&mut self, mut keep: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let dropped: Vec<String> = self
            .trackers
            .keys()
            .filter(|id| !keep(id.as_str()))
            .cloned()
            .collect();
        for id in &dropped {
            self.trackers.remove(id);
        }
        dropped
    }

    fn to_status(cooler_id: &str, tracker: &Tracker) -> CoolerBreachStatus {
        CoolerBreachStatus {
            cooler_id: cooler_id.to_string(),
            state: tracker.state,
            since: tracker.since,
            last_fix_at: tracker.last_fix_at,
            last_position: tracker.last_position,
        }
    }
}

#[cfg(test)]
#[path = "breach_test.rs"]
mod tests;
