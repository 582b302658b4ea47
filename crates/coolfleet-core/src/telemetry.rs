//! Random-walk GPS feed for exercising the breach monitor without hardware.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geo::{HaversineDestination, Point};
use rand::Rng;

use crate::breach::GpsFix;
use crate::geometry::LngLat;
use crate::points::CoolerPoint;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorSettings {
    /// Chance per tick that a resting unit starts wandering off.
    pub drift_probability: f64,
    /// Meters a wandering unit covers per tick.
    pub drift_step_meters: f64,
    /// Chance per tick that a wandering unit is brought back home.
    pub return_probability: f64,
    /// Chance per tick that a unit reports running on battery.
    pub power_loss_probability: f64,
    /// GPS noise applied to every fix, in meters.
    pub jitter_meters: f64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            drift_probability: 0.02,
            drift_step_meters: 250.0,
            return_probability: 0.2,
            power_loss_probability: 0.01,
            jitter_meters: 5.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Unit {
    home: LngLat,
    position: LngLat,
    /// Bearing in degrees while wandering.
    heading: Option<f64>,
}

/// Produces one [`GpsFix`] per cooler per tick.
#[derive(Debug, Clone)]
pub struct FixSimulator {
    settings: SimulatorSettings,
    units: BTreeMap<String, Unit>,
}

impl FixSimulator {
    #[must_use]
    pub fn new(settings: SimulatorSettings, coolers: &[CoolerPoint]) -> Self {
        let units = coolers
            .iter()
            .map(|c| {
                (
                    c.id.clone(),
                    Unit {
                        home: c.coordinates,
                        position: c.coordinates,
                        heading: None,
                    },
                )
            })
            .collect();
        Self { settings, units }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Ids of coolers currently wandering away from home.
    #[must_use]
    pub fn drifting(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|(_, u)| u.heading.is_some())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Advance every unit one step and report where it is.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) -> Vec<GpsFix> {
        let settings = &self.settings;
        self.units
            .iter_mut()
            .map(|(id, unit)| {
                match unit.heading {
                    Some(_) if rng.random_bool(settings.return_probability) => {
                        unit.heading = None;
                        unit.position = unit.home;
                    }
                    Some(heading) => {
                        unit.position = step(unit.position, heading, settings.drift_step_meters);
                    }
                    None if rng.random_bool(settings.drift_probability) => {
                        let heading = rng.random_range(0.0..360.0);
                        unit.heading = Some(heading);
                        unit.position = step(unit.position, heading, settings.drift_step_meters);
                    }
                    None => {}
                }

                let noise_bearing = rng.random_range(0.0..360.0);
                let noise = rng.random_range(0.0..=settings.jitter_meters);
                let powered = !rng.random_bool(settings.power_loss_probability);

                GpsFix {
                    cooler_id: id.clone(),
                    position: step(unit.position, noise_bearing, noise),
                    timestamp: now,
                    powered: Some(powered),
                }
            })
            .collect()
    }
}

fn step(from: LngLat, bearing: f64, meters: f64) -> LngLat {
    if meters <= 0.0 {
        return from;
    }
    Point::from(from).haversine_destination(bearing, meters).into()
}
