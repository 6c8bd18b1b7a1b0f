use log::info;

use crate::host::SensorHost;
use crate::types::SensorKind;

/// Which source drives `heading` events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadingStrategy {
    /// Fused rotation-vector sensor, least susceptible to magnetic
    /// interference
    RotationVector,
    /// Dedicated compass heading sensor
    DedicatedSensor,
    /// Tilt-compensated magnetometer + accelerometer computation
    MagnetometerFallback,
    /// No usable sensor combination
    Unavailable,
}

/// Availability of the physical sensors, probed once at engine construction.
///
/// The snapshot is immutable for the process lifetime: sensors that appear or
/// disappear mid-session are ignored, and the heading strategy is never
/// re-evaluated. A capability change requires a restart.
#[derive(Clone, Copy, Debug)]
pub struct SensorCapabilities {
    pub accelerometer: bool,
    pub gyroscope: bool,
    pub magnetometer: bool,
    pub heading: bool,
    pub rotation_vector: bool,
    /// Derived: prefer the rotation vector for heading whenever it exists
    pub use_rotation_vector_for_heading: bool,
}

impl SensorCapabilities {
    /// Query the host once for every sensor kind.
    pub fn discover(host: &impl SensorHost) -> Self {
        let caps = Self::from_flags(
            host.is_available(SensorKind::Accelerometer),
            host.is_available(SensorKind::Gyroscope),
            host.is_available(SensorKind::Magnetometer),
            host.is_available(SensorKind::Heading),
            host.is_available(SensorKind::RotationVector),
        );
        info!(
            "sensor availability - accelerometer: {}, gyroscope: {}, magnetometer: {}, heading: {}, rotation vector: {}, heading strategy: {:?}",
            caps.accelerometer,
            caps.gyroscope,
            caps.magnetometer,
            caps.heading,
            caps.rotation_vector,
            caps.heading_strategy()
        );
        caps
    }

    pub fn from_flags(
        accelerometer: bool,
        gyroscope: bool,
        magnetometer: bool,
        heading: bool,
        rotation_vector: bool,
    ) -> Self {
        Self {
            accelerometer,
            gyroscope,
            magnetometer,
            heading,
            rotation_vector,
            use_rotation_vector_for_heading: rotation_vector,
        }
    }

    /// Strategy priority: rotation vector, then the dedicated sensor, then
    /// the magnetometer + accelerometer fallback.
    pub fn heading_strategy(&self) -> HeadingStrategy {
        if self.use_rotation_vector_for_heading {
            HeadingStrategy::RotationVector
        } else if self.heading {
            HeadingStrategy::DedicatedSensor
        } else if self.magnetometer && self.accelerometer {
            HeadingStrategy::MagnetometerFallback
        } else {
            HeadingStrategy::Unavailable
        }
    }

    /// True when at least one motion sensor exists at all.
    pub fn any_motion_sensor(&self) -> bool {
        self.accelerometer || self.gyroscope || self.magnetometer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SimulatedHost;

    #[test]
    fn test_strategy_priority_order() {
        let all = SensorCapabilities::from_flags(true, true, true, true, true);
        assert_eq!(all.heading_strategy(), HeadingStrategy::RotationVector);

        let no_rv = SensorCapabilities::from_flags(true, true, true, true, false);
        assert_eq!(no_rv.heading_strategy(), HeadingStrategy::DedicatedSensor);

        let fallback = SensorCapabilities::from_flags(true, true, true, false, false);
        assert_eq!(fallback.heading_strategy(), HeadingStrategy::MagnetometerFallback);

        let accel_only = SensorCapabilities::from_flags(true, true, false, false, false);
        assert_eq!(accel_only.heading_strategy(), HeadingStrategy::Unavailable);
    }

    #[test]
    fn test_discover_probes_host() {
        let host = SimulatedHost::with_sensors(&[
            SensorKind::Accelerometer,
            SensorKind::Gyroscope,
            SensorKind::Magnetometer,
        ]);
        let caps = SensorCapabilities::discover(&host);
        assert!(caps.accelerometer && caps.gyroscope && caps.magnetometer);
        assert!(!caps.rotation_vector && !caps.heading);
        assert!(!caps.use_rotation_vector_for_heading);
        assert_eq!(caps.heading_strategy(), HeadingStrategy::MagnetometerFallback);
        assert!(caps.any_motion_sensor());
    }

    #[test]
    fn test_no_sensors_at_all() {
        let host = SimulatedHost::new();
        let caps = SensorCapabilities::discover(&host);
        assert!(!caps.any_motion_sensor());
        assert_eq!(caps.heading_strategy(), HeadingStrategy::Unavailable);
    }
}
