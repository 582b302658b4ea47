//! Alert bookkeeping on top of breach transitions.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::breach::{BreachState, BreachTransition};

/// Look-back of the `*_24h` KPIs.
const KPI_WINDOW: Duration = Duration::hours(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    #[serde(rename = "Geofence Breach")]
    GeofenceBreach,
    #[serde(rename = "Power Cutoff")]
    PowerCutoff,
    #[serde(rename = "Offline Cooler")]
    OfflineCooler,
    #[serde(rename = "Moved Without Power")]
    MovedWithoutPower,
    #[serde(rename = "Misplaced Asset")]
    MisplacedAsset,
    #[serde(rename = "Idle > 7 Days")]
    Idle,
}

impl AlertKind {
    pub const ALL: [AlertKind; 6] = [
        AlertKind::GeofenceBreach,
        AlertKind::PowerCutoff,
        AlertKind::OfflineCooler,
        AlertKind::MovedWithoutPower,
        AlertKind::MisplacedAsset,
        AlertKind::Idle,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::GeofenceBreach => "Geofence Breach",
            AlertKind::PowerCutoff => "Power Cutoff",
            AlertKind::OfflineCooler => "Offline Cooler",
            AlertKind::MovedWithoutPower => "Moved Without Power",
            AlertKind::MisplacedAsset => "Misplaced Asset",
            AlertKind::Idle => "Idle > 7 Days",
        }
    }

    /// Match a display name exactly, as sent by the alert type filter.
    #[must_use]
    pub fn parse_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == label)
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration order is display order: critical first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Open,
    Ack,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub cooler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub raised_at: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl Alert {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status != AlertStatus::Resolved
    }
}

/// Type and free-text filter for the alert list. `None` and `"all"` mean no
/// type restriction; search matches cooler id or type name, case-insensitive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl AlertFilter {
    #[must_use]
    pub fn matches(&self, alert: &Alert) -> bool {
        if let Some(kind) = self.kind.as_deref() {
            if kind != "all" && alert.kind.as_str() != kind {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(search) if !search.is_empty() => {
                let needle = search.to_lowercase();
                alert.cooler.to_lowercase().contains(&needle)
                    || alert.kind.as_str().to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertKpis {
    pub critical: usize,
    pub warnings: usize,
    pub open: usize,
    pub resolved_24h: usize,
    pub breaches_24h: usize,
    pub power_24h: usize,
    pub offline: usize,
    pub idle: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AlertError {
    #[error("alert not found: {0}")]
    NotFound(String),
    #[error("alert {0} is already resolved")]
    AlreadyResolved(String),
}

/// In-memory alert list fed by [`BreachTransition`]s.
#[derive(Debug, Clone, Default)]
pub struct AlertBook {
    alerts: Vec<Alert>,
    next_seq: u64,
}

impl AlertBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    /// Record a transition. Returns the id of a newly raised alert, if any.
    ///
    /// Entering `breach`, `power-move`, `offline` or `idle` raises an alert
    /// of the matching kind. Leaving one of those states resolves the open
    /// alert it raised.
    pub fn record(&mut self, transition: &BreachTransition) -> Option<String> {
        if let Some(kind) = Self::kind_for(transition.from) {
            self.resolve_open(&transition.cooler_id, kind, transition.at);
        }

        let kind = Self::kind_for(transition.to)?;
        let severity = match transition.to {
            BreachState::Breach | BreachState::PowerMove => AlertSeverity::Critical,
            BreachState::Offline => AlertSeverity::Warning,
            _ => AlertSeverity::Info,
        };

        let mut meta = serde_json::Map::new();
        if let Some(distance) = transition.distance_outside_meters {
            meta.insert("distanceOutsideM".to_string(), distance.round().into());
        }

        self.next_seq += 1;
        let id = format!("a{}", self.next_seq);
        self.alerts.push(Alert {
            id: id.clone(),
            kind,
            cooler: transition.cooler_id.clone(),
            zone: transition.geofence_id.clone(),
            location: None,
            raised_at: transition.at,
            severity,
            status: AlertStatus::Open,
            resolved_at: None,
            meta,
        });
        tracing::debug!(alert_id = %id, cooler_id = %transition.cooler_id, kind = %kind, "alert raised");
        Some(id)
    }

    /// Move an open alert to `ACK`.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::NotFound`] or [`AlertError::AlreadyResolved`].
    pub fn acknowledge(&mut self, id: &str) -> Result<&Alert, AlertError> {
        let alert = self
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;
        if alert.status == AlertStatus::Resolved {
            return Err(AlertError::AlreadyResolved(id.to_string()));
        }
        alert.status = AlertStatus::Ack;
        Ok(alert)
    }

    /// Resolve an alert by hand.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::NotFound`] or [`AlertError::AlreadyResolved`].
    pub fn resolve(&mut self, id: &str, at: DateTime<Utc>) -> Result<&Alert, AlertError> {
        let alert = self
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;
        if alert.status == AlertStatus::Resolved {
            return Err(AlertError::AlreadyResolved(id.to_string()));
        }
        Self::mark_resolved(alert, at);
        Ok(alert)
    }

    /// Filtered alerts, most severe first and newest first within a severity.
    #[must_use]
    pub fn list(&self, filter: &AlertFilter) -> Vec<&Alert> {
        let mut out: Vec<&Alert> = self.alerts.iter().filter(|a| filter.matches(a)).collect();
        out.sort_by(|a, b| match a.severity.cmp(&b.severity) {
            Ordering::Equal => b.raised_at.cmp(&a.raised_at),
            other => other,
        });
        out
    }

    /// The KPI strip. The `*_24h` counters look back 24 hours from `now`.
    #[must_use]
    pub fn kpis(&self, now: DateTime<Utc>) -> AlertKpis {
        let since = now - KPI_WINDOW;
        let mut kpis = AlertKpis::default();
        for alert in &self.alerts {
            let recent = alert.raised_at >= since;
            if alert.is_open() {
                match alert.severity {
                    AlertSeverity::Critical => kpis.critical += 1,
                    AlertSeverity::Warning => kpis.warnings += 1,
                    _ => {}
                }
            }
            if alert.status == AlertStatus::Open {
                kpis.open += 1;
            }
            if alert.status == AlertStatus::Resolved
                && alert.resolved_at.is_some_and(|at| at >= since)
            {
                kpis.resolved_24h += 1;
            }
            match alert.kind {
                AlertKind::GeofenceBreach if recent => kpis.breaches_24h += 1,
                AlertKind::PowerCutoff | AlertKind::MovedWithoutPower if recent => {
                    kpis.power_24h += 1;
                }
                AlertKind::OfflineCooler if alert.is_open() => kpis.offline += 1,
                AlertKind::Idle if alert.is_open() => kpis.idle += 1,
                _ => {}
            }
        }
        kpis
    }

    /// Drop resolved alerts that were raised and resolved before the KPI
    /// window. Returns how many were removed.
    pub fn prune_resolved(&mut self, now: DateTime<Utc>) -> usize {
        let since = now - KPI_WINDOW;
        let before = self.alerts.len();
        self.alerts.retain(|a| {
            a.status != AlertStatus::Resolved
                || a.raised_at >= since
                || a.resolved_at.is_none_or(|at| at >= since)
        });
        let pruned = before - self.alerts.len();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned resolved alerts");
        }
        pruned
    }

    fn kind_for(state: BreachState) -> Option<AlertKind> {
        match state {
            BreachState::Breach => Some(AlertKind::GeofenceBreach),
            BreachState::PowerMove => Some(AlertKind::MovedWithoutPower),
            BreachState::Offline => Some(AlertKind::OfflineCooler),
            BreachState::Idle => Some(AlertKind::Idle),
            BreachState::Inside => None,
        }
    }

    fn resolve_open(&mut self, cooler_id: &str, kind: AlertKind, at: DateTime<Utc>) {
        for alert in self
            .alerts
            .iter_mut()
            .filter(|a| a.cooler == cooler_id && a.kind == kind && a.is_open())
        {
            Self::mark_resolved(alert, at);
            tracing::debug!(alert_id = %alert.id, cooler_id, "alert resolved");
        }
    }

    fn mark_resolved(alert: &mut Alert, at: DateTime<Utc>) {
        alert.status = AlertStatus::Resolved;
        alert.severity = AlertSeverity::Resolved;
        alert.resolved_at = Some(at);
    }
}
