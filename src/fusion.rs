// fusion.rs — pure computation layer for the motion core.
//
// Everything in this module is independent of the host platform: raw sample
// slices come in, derived MotionEvents come out. Sensor registration, the
// subscription lifecycle, and event delivery live in engine.rs, so the
// fusion paths can be unit-tested with hand-built samples.

use chrono::Utc;
use log::debug;
use nalgebra::Vector3;

use crate::capabilities::{HeadingStrategy, SensorCapabilities};
use crate::events::{
    AccelPayload, Axes, HeadingPayload, MotionEvent, OrientationPayload, RotationRate,
};
use crate::geomag::GeomagneticField;
use crate::math;
use crate::subscriptions::ActiveSubscriptions;
use crate::types::GeoPosition;

/// Sample interval reported in accel payloads (~60 Hz). A declared constant,
/// not a measured rate.
pub const REPORT_INTERVAL_MS: f64 = 16.67;

/// Fuses raw sensor samples into derived readings.
///
/// One zero-initialized store per sensor kind, overwritten in place: the
/// latest value always wins and no cross-kind timestamp correlation is
/// attempted. Incoming samples are copied element-wise up to the stored
/// length; a short sample leaves the tail untouched.
pub struct FusionEngine {
    caps: SensorCapabilities,
    accel: Vec<f64>,
    gyro: Vec<f64>,
    mag: Vec<f64>,
    rotation_vector: Vec<f64>,
    heading: Vec<f64>,
    // Built lazily on the rotation-vector path and reused for the engine
    // lifetime; the fallback path rebuilds it on every computed heading.
    field: Option<GeomagneticField>,
}

impl FusionEngine {
    pub fn new(caps: SensorCapabilities) -> Self {
        Self {
            caps,
            accel: vec![0.0; 3],
            gyro: vec![0.0; 3],
            mag: vec![0.0; 3],
            rotation_vector: vec![0.0; 5],
            heading: vec![0.0; 1],
            field: None,
        }
    }

    // ── Per-kind sample handlers ─────────────────────────────────────────

    pub fn on_accelerometer(
        &mut self,
        values: &[f64],
        subs: ActiveSubscriptions,
        position: GeoPosition,
    ) -> Vec<MotionEvent> {
        overwrite(&mut self.accel, values);

        let mut events = Vec::new();
        if subs.accel {
            events.extend(self.accel_reading());
        }
        if subs.orientation {
            events.extend(self.orientation_reading());
        }
        // The fallback heading runs whenever no dedicated heading sensor
        // exists, but its result is only published when the rotation vector
        // is not the active heading source.
        if subs.heading && !self.caps.heading {
            let publish = self.caps.heading_strategy() != HeadingStrategy::RotationVector;
            events.extend(self.fallback_heading(position, publish));
        }
        events
    }

    pub fn on_gyroscope(&mut self, values: &[f64], subs: ActiveSubscriptions) -> Vec<MotionEvent> {
        overwrite(&mut self.gyro, values);

        let mut events = Vec::new();
        if subs.accel {
            events.extend(self.accel_reading());
        }
        events
    }

    pub fn on_magnetometer(
        &mut self,
        values: &[f64],
        subs: ActiveSubscriptions,
        position: GeoPosition,
    ) -> Vec<MotionEvent> {
        overwrite(&mut self.mag, values);

        let mut events = Vec::new();
        if subs.orientation {
            events.extend(self.orientation_reading());
        }
        if subs.heading && !self.caps.use_rotation_vector_for_heading && !self.caps.heading {
            events.extend(self.fallback_heading(position, true));
        }
        events
    }

    pub fn on_rotation_vector(
        &mut self,
        values: &[f64],
        subs: ActiveSubscriptions,
        position: GeoPosition,
    ) -> Vec<MotionEvent> {
        overwrite(&mut self.rotation_vector, values);

        let mut events = Vec::new();
        if subs.heading && self.caps.use_rotation_vector_for_heading {
            events.extend(self.rotation_vector_heading(position));
        }
        events
    }

    pub fn on_heading(&mut self, values: &[f64], subs: ActiveSubscriptions) -> Vec<MotionEvent> {
        overwrite(&mut self.heading, values);

        let mut events = Vec::new();
        if subs.heading {
            events.extend(self.direct_heading());
        }
        events
    }

    // ── Derived readings ─────────────────────────────────────────────────

    /// Republish the latest accelerometer and gyroscope vectors. No gravity
    /// removal; the gyroscope is converted to degrees per second with the
    /// axis remap alpha = z, beta = x, gamma = y.
    fn accel_reading(&self) -> Option<MotionEvent> {
        if self.accel.len() < 3 || self.gyro.len() < 3 {
            debug!(
                "accel reading suppressed: {} accel / {} gyro components",
                self.accel.len(),
                self.gyro.len()
            );
            return None;
        }

        let acceleration = Axes {
            x: self.accel[0],
            y: self.accel[1],
            z: self.accel[2],
        };
        Some(MotionEvent::Accel(AccelPayload {
            acceleration,
            acceleration_including_gravity: acceleration,
            rotation_rate: RotationRate {
                alpha: self.gyro[2].to_degrees(),
                beta: self.gyro[0].to_degrees(),
                gamma: self.gyro[1].to_degrees(),
            },
            interval: REPORT_INTERVAL_MS,
        }))
    }

    /// Tilt-compensated orientation from the latest accelerometer and
    /// magnetometer vectors. Degenerate input produces no event.
    fn orientation_reading(&self) -> Option<MotionEvent> {
        if self.accel.len() < 3 || self.mag.len() < 3 {
            return None;
        }

        let gravity = Vector3::new(self.accel[0], self.accel[1], self.accel[2]);
        let magnetic = Vector3::new(self.mag[0], self.mag[1], self.mag[2]);
        let r = math::rotation_matrix(gravity, magnetic)?;
        let [azimuth, pitch, roll] = math::orientation_angles(&r);

        Some(MotionEvent::Orientation(OrientationPayload {
            alpha: azimuth.to_degrees(),
            beta: pitch.to_degrees(),
            gamma: roll.to_degrees(),
        }))
    }

    /// True-north heading from magnetometer + accelerometer fusion. A fresh
    /// declination model is built every time on this path since the position
    /// may have moved. With `publish` false the value is computed and logged
    /// but withheld, because the rotation vector is the publishing source.
    fn fallback_heading(&mut self, position: GeoPosition, publish: bool) -> Option<MotionEvent> {
        if self.accel.len() < 3 || self.mag.len() < 3 {
            return None;
        }

        let gravity = Vector3::new(self.accel[0], self.accel[1], self.accel[2]);
        let magnetic = Vector3::new(self.mag[0], self.mag[1], self.mag[2]);
        let r = math::rotation_matrix(gravity, magnetic)?;
        let [azimuth, _, _] = math::orientation_angles(&r);
        let magnetic_heading = azimuth.to_degrees();

        let mut true_heading = magnetic_heading;
        match GeomagneticField::new(
            position.latitude,
            position.longitude,
            position.altitude,
            Utc::now(),
        ) {
            Ok(field) => {
                let declination = field.declination();
                true_heading = magnetic_heading + declination;
                debug!(
                    "magnetic heading {:.1} deg, declination {:.1} deg, true heading {:.1} deg",
                    magnetic_heading, declination, true_heading
                );
                self.field = Some(field);
            }
            Err(e) => debug!("declination unavailable ({e}), using magnetic heading"),
        }

        let heading = math::normalize_heading_degrees(true_heading);
        if !publish {
            debug!(
                "fallback heading {:.1} deg computed but withheld; rotation vector is the publishing source",
                heading
            );
            return None;
        }
        Some(MotionEvent::Heading(HeadingPayload { heading }))
    }

    /// Declination-corrected heading from the rotation-vector quaternion.
    fn rotation_vector_heading(&mut self, position: GeoPosition) -> Option<MotionEvent> {
        if self.rotation_vector.len() < 4 {
            return None;
        }

        let r = math::rotation_matrix_from_vector(&self.rotation_vector);
        let [azimuth, _, _] = math::orientation_angles(&r);
        let mut heading = azimuth.to_degrees();

        if self.field.is_none() {
            match GeomagneticField::new(
                position.latitude,
                position.longitude,
                position.altitude,
                Utc::now(),
            ) {
                Ok(field) => self.field = Some(field),
                Err(e) => debug!("declination unavailable ({e}), using raw heading"),
            }
        }
        if let Some(field) = &self.field {
            let declination = field.declination();
            debug!(
                "rotation vector heading {:.1} deg, declination {:.1} deg",
                heading, declination
            );
            heading += declination;
        }

        Some(MotionEvent::Heading(HeadingPayload {
            heading: math::normalize_heading_degrees(heading),
        }))
    }

    /// Normalized pass-through of the dedicated heading sensor value.
    fn direct_heading(&self) -> Option<MotionEvent> {
        if self.heading.is_empty() {
            return None;
        }
        Some(MotionEvent::Heading(HeadingPayload {
            heading: math::normalize_heading_degrees(self.heading[0]),
        }))
    }
}

/// Latest-value-wins copy into a fixed-size store.
fn overwrite(store: &mut [f64], values: &[f64]) {
    for (slot, value) in store.iter_mut().zip(values) {
        *slot = *value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sf() -> GeoPosition {
        GeoPosition::new(37.7749, -122.4194, 0.0)
    }

    fn all_subs() -> ActiveSubscriptions {
        ActiveSubscriptions {
            accel: true,
            orientation: true,
            heading: true,
        }
    }

    fn fallback_caps() -> SensorCapabilities {
        SensorCapabilities::from_flags(true, true, true, false, false)
    }

    fn rotation_vector_caps() -> SensorCapabilities {
        SensorCapabilities::from_flags(true, true, true, false, true)
    }

    #[test]
    fn test_accel_reading_axis_remap() {
        let mut fusion = FusionEngine::new(fallback_caps());
        let subs = ActiveSubscriptions {
            accel: true,
            ..Default::default()
        };

        fusion.on_accelerometer(&[1.0, 2.0, 3.0], subs, sf());
        let events = fusion.on_gyroscope(&[0.1, 0.2, 0.3], subs);

        assert_eq!(events.len(), 1);
        match events[0] {
            MotionEvent::Accel(payload) => {
                assert_eq!(payload.acceleration, Axes { x: 1.0, y: 2.0, z: 3.0 });
                assert_eq!(payload.acceleration_including_gravity, payload.acceleration);
                assert_relative_eq!(payload.rotation_rate.alpha, 0.3_f64.to_degrees());
                assert_relative_eq!(payload.rotation_rate.beta, 0.1_f64.to_degrees());
                assert_relative_eq!(payload.rotation_rate.gamma, 0.2_f64.to_degrees());
                assert_relative_eq!(payload.interval, REPORT_INTERVAL_MS);
            }
            other => panic!("expected accel event, got {other:?}"),
        }
    }

    #[test]
    fn test_latest_sample_wins() {
        let mut fusion = FusionEngine::new(fallback_caps());
        let subs = ActiveSubscriptions {
            accel: true,
            ..Default::default()
        };

        fusion.on_accelerometer(&[9.0, 9.0, 9.0], subs, sf());
        fusion.on_accelerometer(&[1.0, 2.0, 3.0], subs, sf());
        let events = fusion.on_gyroscope(&[0.0, 0.0, 0.0], subs);

        match events[0] {
            MotionEvent::Accel(payload) => {
                assert_eq!(payload.acceleration, Axes { x: 1.0, y: 2.0, z: 3.0 });
            }
            other => panic!("expected accel event, got {other:?}"),
        }
    }

    #[test]
    fn test_orientation_from_level_device() {
        let mut fusion = FusionEngine::new(fallback_caps());
        let subs = ActiveSubscriptions {
            orientation: true,
            ..Default::default()
        };

        fusion.on_accelerometer(&[0.0, 0.0, 9.81], subs, sf());
        let events = fusion.on_magnetometer(&[0.0, 22.0, -40.0], subs, sf());

        assert_eq!(events.len(), 1);
        match events[0] {
            MotionEvent::Orientation(payload) => {
                assert_relative_eq!(payload.alpha, 0.0, epsilon = 1e-9);
                assert_relative_eq!(payload.beta, 0.0, epsilon = 1e-9);
                assert_relative_eq!(payload.gamma, 0.0, epsilon = 1e-9);
            }
            other => panic!("expected orientation event, got {other:?}"),
        }
    }

    #[test]
    fn test_orientation_suppressed_for_degenerate_field() {
        let mut fusion = FusionEngine::new(fallback_caps());
        let subs = ActiveSubscriptions {
            orientation: true,
            ..Default::default()
        };

        fusion.on_accelerometer(&[0.0, 0.0, 9.81], subs, sf());
        // Field colinear with gravity: no rotation matrix, no event
        let events = fusion.on_magnetometer(&[0.0, 0.0, -40.0], subs, sf());
        assert!(events.is_empty());
    }

    #[test]
    fn test_fallback_heading_emitted_from_magnetometer_path() {
        let mut fusion = FusionEngine::new(fallback_caps());
        let subs = all_subs();

        fusion.on_accelerometer(&[0.0, 0.0, 9.81], subs, sf());
        let events = fusion.on_magnetometer(&[0.0, 22.0, -40.0], subs, sf());

        let heading: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, MotionEvent::Heading(_)))
            .collect();
        assert_eq!(heading.len(), 1);
        match heading[0] {
            MotionEvent::Heading(payload) => {
                assert!((0.0..360.0).contains(&payload.heading));
                // Magnetic heading is 0 here, so the emitted value is the
                // declination at San Francisco (a small easterly angle)
                assert!(
                    payload.heading < 25.0 || payload.heading > 335.0,
                    "got {}",
                    payload.heading
                );
            }
            other => panic!("expected heading event, got {other:?}"),
        }
    }

    #[test]
    fn test_fallback_heading_withheld_under_rotation_vector_strategy() {
        let mut fusion = FusionEngine::new(rotation_vector_caps());
        let subs = all_subs();

        fusion.on_magnetometer(&[0.0, 22.0, -40.0], subs, sf());
        let events = fusion.on_accelerometer(&[0.0, 0.0, 9.81], subs, sf());

        // The computation runs on the accelerometer path, but nothing is
        // published: the rotation vector owns the heading class.
        assert!(events
            .iter()
            .all(|e| !matches!(e, MotionEvent::Heading(_))));
    }

    #[test]
    fn test_magnetometer_path_inert_under_rotation_vector_strategy() {
        let mut fusion = FusionEngine::new(rotation_vector_caps());
        let subs = ActiveSubscriptions {
            heading: true,
            ..Default::default()
        };

        fusion.on_accelerometer(&[0.0, 0.0, 9.81], subs, sf());
        let events = fusion.on_magnetometer(&[0.0, 22.0, -40.0], subs, sf());
        assert!(events.is_empty());
    }

    #[test]
    fn test_rotation_vector_heading_emitted() {
        let mut fusion = FusionEngine::new(rotation_vector_caps());
        let subs = ActiveSubscriptions {
            heading: true,
            ..Default::default()
        };

        // Identity quaternion: raw azimuth 0, emitted value is declination
        let events = fusion.on_rotation_vector(&[0.0, 0.0, 0.0, 1.0, 0.0], subs, sf());

        assert_eq!(events.len(), 1);
        match events[0] {
            MotionEvent::Heading(payload) => {
                assert!((0.0..360.0).contains(&payload.heading));
                assert!(
                    payload.heading < 25.0 || payload.heading > 335.0,
                    "got {}",
                    payload.heading
                );
            }
            other => panic!("expected heading event, got {other:?}"),
        }
    }

    #[test]
    fn test_rotation_vector_ignored_under_fallback_strategy() {
        let mut fusion = FusionEngine::new(fallback_caps());
        let subs = ActiveSubscriptions {
            heading: true,
            ..Default::default()
        };

        let events = fusion.on_rotation_vector(&[0.0, 0.0, 0.0, 1.0, 0.0], subs, sf());
        assert!(events.is_empty());
    }

    #[test]
    fn test_direct_heading_normalized() {
        let caps = SensorCapabilities::from_flags(true, true, true, true, false);
        let mut fusion = FusionEngine::new(caps);
        let subs = ActiveSubscriptions {
            heading: true,
            ..Default::default()
        };

        let events = fusion.on_heading(&[-30.0], subs);
        match events[0] {
            MotionEvent::Heading(payload) => assert_relative_eq!(payload.heading, 330.0),
            other => panic!("expected heading event, got {other:?}"),
        }

        let events = fusion.on_heading(&[365.0], subs);
        match events[0] {
            MotionEvent::Heading(payload) => assert_relative_eq!(payload.heading, 5.0),
            other => panic!("expected heading event, got {other:?}"),
        }
    }

    #[test]
    fn test_unsubscribed_classes_stay_silent() {
        let mut fusion = FusionEngine::new(fallback_caps());
        let subs = ActiveSubscriptions::default();

        assert!(fusion.on_accelerometer(&[1.0, 2.0, 3.0], subs, sf()).is_empty());
        assert!(fusion.on_gyroscope(&[0.1, 0.2, 0.3], subs).is_empty());
        assert!(fusion.on_magnetometer(&[0.0, 22.0, -40.0], subs, sf()).is_empty());
        assert!(fusion.on_heading(&[10.0], subs).is_empty());
    }

    #[test]
    fn test_long_rotation_vector_sample_truncated() {
        let mut fusion = FusionEngine::new(rotation_vector_caps());
        let subs = ActiveSubscriptions {
            heading: true,
            ..Default::default()
        };

        // Seven components: the extra two are dropped
        let events =
            fusion.on_rotation_vector(&[0.0, 0.0, 0.0, 1.0, 0.5, 9.9, 9.9], subs, sf());
        assert_eq!(events.len(), 1);
        assert_eq!(fusion.rotation_vector.len(), 5);
    }
}
