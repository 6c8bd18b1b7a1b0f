// host.rs — the platform boundary.
//
// The core never talks to an OS sensor or location API directly; everything
// it needs from the device comes through `SensorHost`, and raw samples come
// back by the host calling the engine's handler methods. `SimulatedHost`
// stands in for a real device in the demo binary and the test suite.

use std::collections::HashSet;

use log::debug;

use crate::error::HostError;
use crate::types::{GeoPosition, LocationProvider, SensorKind, SensorRate};

/// Capability-providing collaborator: sensor availability, sensor
/// registration, and location access.
///
/// Implementations must deliver raw samples and location fixes serially
/// (never reentrantly) with respect to each other.
pub trait SensorHost {
    /// Whether a default sensor of this kind exists on the device.
    fn is_available(&self, kind: SensorKind) -> bool;

    /// Start delivery of raw samples for `kind` at the given rate tier.
    /// Registering an already-registered sensor is a no-op.
    fn register(&mut self, kind: SensorKind, rate: SensorRate);

    /// Stop delivery for every registered sensor.
    fn unregister_all(&mut self);

    /// Most recent fix the provider has cached, if any.
    fn last_known_fix(&self, provider: LocationProvider)
        -> Result<Option<GeoPosition>, HostError>;

    /// Ask the platform for periodic fixes at roughly `interval_ms`, skipping
    /// movements below `min_displacement_m`.
    fn request_location_updates(
        &mut self,
        interval_ms: u64,
        min_displacement_m: f64,
    ) -> Result<(), HostError>;

    /// Cancel periodic fixes; harmless when none are active.
    fn stop_location_updates(&mut self);
}

/// In-memory host with scriptable sensor availability and canned fixes.
///
/// Every registration is recorded so tests can assert exactly which sensors
/// the lifecycle manager turned on.
#[derive(Clone, Debug)]
pub struct SimulatedHost {
    available: HashSet<SensorKind>,
    registered: Vec<(SensorKind, SensorRate)>,
    gps_fix: Option<GeoPosition>,
    network_fix: Option<GeoPosition>,
    location_permission: bool,
    location_updates: Option<(u64, f64)>,
}

impl SimulatedHost {
    /// A device with no sensors, no cached fixes, and location permission
    /// granted.
    pub fn new() -> Self {
        Self {
            available: HashSet::new(),
            registered: Vec::new(),
            gps_fix: None,
            network_fix: None,
            location_permission: true,
            location_updates: None,
        }
    }

    pub fn with_sensors(kinds: &[SensorKind]) -> Self {
        let mut host = Self::new();
        for &kind in kinds {
            host.add_sensor(kind);
        }
        host
    }

    pub fn add_sensor(&mut self, kind: SensorKind) {
        self.available.insert(kind);
    }

    pub fn set_gps_fix(&mut self, fix: Option<GeoPosition>) {
        self.gps_fix = fix;
    }

    pub fn set_network_fix(&mut self, fix: Option<GeoPosition>) {
        self.network_fix = fix;
    }

    /// Make every location call fail with `PermissionDenied`.
    pub fn deny_location(&mut self) {
        self.location_permission = false;
    }

    pub fn is_registered(&self, kind: SensorKind) -> bool {
        self.registered.iter().any(|(k, _)| *k == kind)
    }

    pub fn registered(&self) -> &[(SensorKind, SensorRate)] {
        &self.registered
    }

    pub fn location_updates_active(&self) -> bool {
        self.location_updates.is_some()
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorHost for SimulatedHost {
    fn is_available(&self, kind: SensorKind) -> bool {
        self.available.contains(&kind)
    }

    fn register(&mut self, kind: SensorKind, rate: SensorRate) {
        if !self.is_registered(kind) {
            debug!("registering {:?} at {:?} rate", kind, rate);
            self.registered.push((kind, rate));
        }
    }

    fn unregister_all(&mut self) {
        self.registered.clear();
    }

    fn last_known_fix(
        &self,
        provider: LocationProvider,
    ) -> Result<Option<GeoPosition>, HostError> {
        if !self.location_permission {
            return Err(HostError::PermissionDenied);
        }
        Ok(match provider {
            LocationProvider::Gps => self.gps_fix,
            LocationProvider::Network => self.network_fix,
        })
    }

    fn request_location_updates(
        &mut self,
        interval_ms: u64,
        min_displacement_m: f64,
    ) -> Result<(), HostError> {
        if !self.location_permission {
            return Err(HostError::PermissionDenied);
        }
        self.location_updates = Some((interval_ms, min_displacement_m));
        Ok(())
    }

    fn stop_location_updates(&mut self) {
        self.location_updates = None;
    }
}
