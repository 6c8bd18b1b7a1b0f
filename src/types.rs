use serde::{Deserialize, Serialize};

/// Geographic position used to build the geomagnetic declination model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above the WGS84 ellipsoid
    pub altitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

/// Physical sensor kinds the host platform can expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    Magnetometer,
    /// Fused quaternion-like orientation sensor
    RotationVector,
    /// Dedicated compass heading sensor
    Heading,
}

/// Sampling-rate tier requested from the host. `Game` is the moderate,
/// interaction-suitable tier every registration in this crate uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorRate {
    Normal,
    Ui,
    Game,
    Fastest,
}

/// Location providers that may hold a cached last-known fix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationProvider {
    Gps,
    Network,
}
