// engine.rs — controller owning discovery, the subscription lifecycle, and
// dispatch from raw samples through fusion to the event sink.

use log::{debug, info, warn};

use crate::capabilities::{HeadingStrategy, SensorCapabilities};
use crate::error::{HostError, MotionError};
use crate::events::{EventClass, EventSink};
use crate::fusion::FusionEngine;
use crate::host::SensorHost;
use crate::location::LocationTracker;
use crate::subscriptions::ActiveSubscriptions;
use crate::types::{GeoPosition, SensorKind, SensorRate};

/// Tunables for sensor registration and location refinement.
#[derive(Clone, Copy, Debug)]
pub struct MotionConfig {
    /// Rate tier requested for every sensor registration
    pub sensor_rate: SensorRate,
    /// Cadence of location updates requested while the fallback heading
    /// strategy is active
    pub location_interval_ms: u64,
    pub location_min_displacement_m: f64,
    /// Position used when no last-known fix is available
    pub fallback_position: GeoPosition,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            sensor_rate: SensorRate::Game,
            location_interval_ms: 10_000,
            location_min_displacement_m: 100.0,
            fallback_position: GeoPosition::new(37.7749, -122.4194, 0.0),
        }
    }
}

/// Orchestrates the motion core: capability discovery at construction, the
/// subscribe/unsubscribe lifecycle, and fusion of every raw sample into
/// events delivered to the sink.
///
/// All handler methods are synchronous and non-blocking. The engine assumes
/// the host delivers sensor and location callbacks serially, never
/// reentrantly; a host that delivers from multiple threads must serialize
/// calls externally (for example behind a `Mutex`).
///
/// A physical sensor is registered if and only if at least one active
/// subscription requires it; registration changes happen only inside
/// `subscribe`, `stop_motion_updates` and `unsubscribe_all`.
pub struct MotionEngine<H: SensorHost, E: EventSink> {
    host: H,
    sink: E,
    config: MotionConfig,
    caps: SensorCapabilities,
    subscriptions: ActiveSubscriptions,
    location: LocationTracker,
    fusion: FusionEngine,
}

impl<H: SensorHost, E: EventSink> MotionEngine<H, E> {
    pub fn new(host: H, sink: E) -> Self {
        Self::with_config(host, sink, MotionConfig::default())
    }

    pub fn with_config(host: H, sink: E, config: MotionConfig) -> Self {
        let caps = SensorCapabilities::discover(&host);
        let location = LocationTracker::initialize(&host, config.fallback_position);
        let fusion = FusionEngine::new(caps);
        Self {
            host,
            sink,
            config,
            caps,
            subscriptions: ActiveSubscriptions::default(),
            location,
            fusion,
        }
    }

    // ── Control entry points ─────────────────────────────────────────────

    /// Capability probe: succeeds when at least one motion sensor exists.
    /// Registers nothing.
    pub fn start_motion_updates(&mut self) -> Result<(), MotionError> {
        if !self.caps.any_motion_sensor() {
            return Err(MotionError::SensorsUnavailable);
        }
        Ok(())
    }

    /// Unregister everything `subscribe` activated. Idempotent: with nothing
    /// active this is a no-op that still succeeds.
    pub fn stop_motion_updates(&mut self) -> Result<(), MotionError> {
        if self.subscriptions.any_active() {
            self.host.unregister_all();
            if self.subscriptions.heading
                && self.caps.heading_strategy() == HeadingStrategy::MagnetometerFallback
            {
                self.host.stop_location_updates();
                info!("stopped location updates");
            }
        }
        self.subscriptions.clear();
        Ok(())
    }

    /// Activate a subscription by its wire name.
    pub fn subscribe(&mut self, event_name: &str) -> Result<(), MotionError> {
        let class: EventClass = event_name.parse()?;
        debug!("subscribe requested for {class}");
        match class {
            EventClass::Accel => self.start_accel_updates(),
            EventClass::Orientation => self.start_orientation_updates(),
            EventClass::Heading => self.start_heading_updates(),
        }
        Ok(())
    }

    /// Total reset: every sensor unregistered regardless of prior state,
    /// location updates stopped if heading was active, all flags cleared.
    pub fn unsubscribe_all(&mut self) -> Result<(), MotionError> {
        self.host.unregister_all();
        if self.subscriptions.heading {
            self.host.stop_location_updates();
            info!("stopped location updates");
        }
        self.subscriptions.clear();
        Ok(())
    }

    // ── Activation, one path per event class ─────────────────────────────

    fn start_accel_updates(&mut self) {
        if !self.subscriptions.accel && self.caps.accelerometer && self.caps.gyroscope {
            info!("starting accelerometer updates");
            self.subscriptions.accel = true;
            self.host
                .register(SensorKind::Accelerometer, self.config.sensor_rate);
            self.host
                .register(SensorKind::Gyroscope, self.config.sensor_rate);
        } else if self.subscriptions.accel {
            info!("accelerometer updates already active");
        } else {
            warn!("accelerometer or gyroscope not available; no accel events will be produced");
        }
    }

    fn start_orientation_updates(&mut self) {
        if !self.subscriptions.orientation && self.caps.accelerometer && self.caps.magnetometer {
            info!("starting orientation updates");
            self.subscriptions.orientation = true;
            self.host
                .register(SensorKind::Accelerometer, self.config.sensor_rate);
            self.host
                .register(SensorKind::Magnetometer, self.config.sensor_rate);
        } else if self.subscriptions.orientation {
            info!("orientation updates already active");
        } else {
            warn!(
                "accelerometer or magnetometer not available; no orientation events will be produced"
            );
        }
    }

    fn start_heading_updates(&mut self) {
        if self.subscriptions.heading {
            info!("heading updates already active");
            return;
        }

        match self.caps.heading_strategy() {
            HeadingStrategy::RotationVector => {
                info!("starting heading updates with the rotation vector sensor");
                self.subscriptions.heading = true;
                self.host
                    .register(SensorKind::RotationVector, self.config.sensor_rate);
            }
            HeadingStrategy::DedicatedSensor => {
                info!("starting heading updates with the dedicated heading sensor");
                self.subscriptions.heading = true;
                self.host
                    .register(SensorKind::Heading, self.config.sensor_rate);
            }
            HeadingStrategy::MagnetometerFallback => {
                info!("starting heading updates with magnetometer + accelerometer fusion");
                self.subscriptions.heading = true;
                self.host
                    .register(SensorKind::Magnetometer, self.config.sensor_rate);
                self.host
                    .register(SensorKind::Accelerometer, self.config.sensor_rate);
                match self.host.request_location_updates(
                    self.config.location_interval_ms,
                    self.config.location_min_displacement_m,
                ) {
                    Ok(()) => info!("requested location updates for true-north accuracy"),
                    Err(HostError::PermissionDenied) => {
                        warn!("location permission not granted, declination stays on the last known position")
                    }
                }
            }
            HeadingStrategy::Unavailable => {
                warn!("no sensor combination available for heading");
            }
        }
    }

    // ── Raw sample and location handlers ─────────────────────────────────

    /// Entry point for every raw sample the host delivers. Derived events
    /// are pushed to the sink before the call returns.
    pub fn on_sensor_sample(&mut self, kind: SensorKind, values: &[f64]) {
        let subs = self.subscriptions;
        let position = self.location.current_position();
        let events = match kind {
            SensorKind::Accelerometer => self.fusion.on_accelerometer(values, subs, position),
            SensorKind::Gyroscope => self.fusion.on_gyroscope(values, subs),
            SensorKind::Magnetometer => self.fusion.on_magnetometer(values, subs, position),
            SensorKind::RotationVector => self.fusion.on_rotation_vector(values, subs, position),
            SensorKind::Heading => self.fusion.on_heading(values, subs),
        };
        for event in &events {
            self.sink.emit(event);
        }
    }

    /// Entry point for location fixes delivered by the host.
    pub fn on_location_update(&mut self, fix: GeoPosition) {
        self.location.on_update(fix);
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn capabilities(&self) -> &SensorCapabilities {
        &self.caps
    }

    pub fn subscriptions(&self) -> ActiveSubscriptions {
        self.subscriptions
    }

    pub fn current_position(&self) -> GeoPosition {
        self.location.current_position()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MotionEvent;
    use crate::host::SimulatedHost;

    type TestEngine = MotionEngine<SimulatedHost, Vec<MotionEvent>>;

    fn engine_with(kinds: &[SensorKind]) -> TestEngine {
        MotionEngine::new(SimulatedHost::with_sensors(kinds), Vec::new())
    }

    const IMU: &[SensorKind] = &[
        SensorKind::Accelerometer,
        SensorKind::Gyroscope,
        SensorKind::Magnetometer,
    ];

    #[test]
    fn test_start_fails_without_any_sensor() {
        let mut engine = engine_with(&[]);
        assert_eq!(
            engine.start_motion_updates(),
            Err(MotionError::SensorsUnavailable)
        );
    }

    #[test]
    fn test_start_is_a_probe_not_an_activation() {
        let mut engine = engine_with(IMU);
        assert!(engine.start_motion_updates().is_ok());
        assert!(engine.host().registered().is_empty());
    }

    #[test]
    fn test_subscribe_unknown_class_rejected() {
        let mut engine = engine_with(IMU);
        assert_eq!(
            engine.subscribe("bogus"),
            Err(MotionError::InvalidEventClass("bogus".to_string()))
        );
        assert!(matches!(
            engine.subscribe(""),
            Err(MotionError::InvalidEventClass(_))
        ));
    }

    #[test]
    fn test_subscribe_accel_registers_accel_and_gyro() {
        let mut engine = engine_with(IMU);
        engine.subscribe("accel").unwrap();

        assert!(engine.subscriptions().accel);
        assert!(engine.host().is_registered(SensorKind::Accelerometer));
        assert!(engine.host().is_registered(SensorKind::Gyroscope));
        assert!(!engine.host().is_registered(SensorKind::Magnetometer));
    }

    #[test]
    fn test_subscribe_twice_is_idempotent() {
        let mut engine = engine_with(IMU);
        engine.subscribe("accel").unwrap();
        let before = engine.host().registered().to_vec();

        assert!(engine.subscribe("accel").is_ok());
        assert_eq!(engine.host().registered(), &before[..]);
    }

    #[test]
    fn test_subscribe_succeeds_with_missing_sensors() {
        // No gyroscope: the call still reports success, but nothing is
        // registered and no accel event can ever be produced.
        let mut engine = engine_with(&[SensorKind::Accelerometer]);
        assert!(engine.subscribe("accel").is_ok());
        assert!(!engine.subscriptions().accel);
        assert!(engine.host().registered().is_empty());
    }

    #[test]
    fn test_heading_uses_rotation_vector_when_present() {
        let mut engine = engine_with(&[
            SensorKind::Accelerometer,
            SensorKind::Gyroscope,
            SensorKind::Magnetometer,
            SensorKind::Heading,
            SensorKind::RotationVector,
        ]);
        assert_eq!(
            engine.capabilities().heading_strategy(),
            HeadingStrategy::RotationVector
        );

        engine.subscribe("heading").unwrap();
        assert!(engine.host().is_registered(SensorKind::RotationVector));
        assert!(!engine.host().is_registered(SensorKind::Heading));
        assert!(!engine.host().is_registered(SensorKind::Magnetometer));
        assert!(!engine.host().location_updates_active());
    }

    #[test]
    fn test_heading_uses_dedicated_sensor_without_rotation_vector() {
        let mut engine = engine_with(&[
            SensorKind::Accelerometer,
            SensorKind::Magnetometer,
            SensorKind::Heading,
        ]);
        engine.subscribe("heading").unwrap();
        assert!(engine.host().is_registered(SensorKind::Heading));
        assert_eq!(engine.host().registered().len(), 1);
    }

    #[test]
    fn test_heading_fallback_registers_mag_accel_and_location() {
        let mut engine = engine_with(IMU);
        assert_eq!(
            engine.capabilities().heading_strategy(),
            HeadingStrategy::MagnetometerFallback
        );

        engine.subscribe("heading").unwrap();
        assert!(engine.host().is_registered(SensorKind::Magnetometer));
        assert!(engine.host().is_registered(SensorKind::Accelerometer));
        assert!(engine.host().location_updates_active());
    }

    #[test]
    fn test_heading_fallback_survives_location_permission_denial() {
        let mut host = SimulatedHost::with_sensors(IMU);
        host.deny_location();
        let mut engine: TestEngine = MotionEngine::new(host, Vec::new());

        assert!(engine.subscribe("heading").is_ok());
        assert!(engine.subscriptions().heading);
        assert!(!engine.host().location_updates_active());
    }

    #[test]
    fn test_heading_unavailable_still_succeeds() {
        let mut engine = engine_with(&[SensorKind::Accelerometer, SensorKind::Gyroscope]);
        assert_eq!(
            engine.capabilities().heading_strategy(),
            HeadingStrategy::Unavailable
        );
        assert!(engine.subscribe("heading").is_ok());
        assert!(!engine.subscriptions().heading);
        assert!(engine.host().registered().is_empty());
    }

    #[test]
    fn test_unsubscribe_all_is_total_reset() {
        let mut engine = engine_with(IMU);
        engine.subscribe("accel").unwrap();
        engine.subscribe("orientation").unwrap();
        engine.subscribe("heading").unwrap();
        assert!(engine.host().location_updates_active());

        engine.unsubscribe_all().unwrap();
        assert!(engine.host().registered().is_empty());
        assert!(!engine.host().location_updates_active());
        assert_eq!(engine.subscriptions(), ActiveSubscriptions::default());

        // A second reset from the empty state still succeeds
        assert!(engine.unsubscribe_all().is_ok());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut engine = engine_with(IMU);
        assert!(engine.stop_motion_updates().is_ok());

        engine.subscribe("heading").unwrap();
        assert!(engine.stop_motion_updates().is_ok());
        assert!(engine.host().registered().is_empty());
        assert!(!engine.host().location_updates_active());
        assert!(!engine.subscriptions().any_active());

        assert!(engine.stop_motion_updates().is_ok());
    }

    #[test]
    fn test_strategy_fixed_after_discovery() {
        let mut engine = engine_with(IMU);
        assert_eq!(
            engine.capabilities().heading_strategy(),
            HeadingStrategy::MagnetometerFallback
        );

        // A rotation vector appearing mid-session is ignored
        engine.host_mut().add_sensor(SensorKind::RotationVector);
        assert_eq!(
            engine.capabilities().heading_strategy(),
            HeadingStrategy::MagnetometerFallback
        );

        engine.subscribe("heading").unwrap();
        assert!(!engine.host().is_registered(SensorKind::RotationVector));
        assert!(engine.host().is_registered(SensorKind::Magnetometer));
    }

    #[test]
    fn test_samples_flow_to_sink() {
        let mut engine = engine_with(IMU);
        engine.subscribe("accel").unwrap();

        engine.on_sensor_sample(SensorKind::Accelerometer, &[1.0, 2.0, 3.0]);
        engine.on_sensor_sample(SensorKind::Gyroscope, &[0.1, 0.2, 0.3]);

        // One event per sample once both stores are populated
        assert_eq!(engine.sink().len(), 2);
        assert!(engine
            .sink()
            .iter()
            .all(|e| matches!(e, MotionEvent::Accel(_))));
    }

    #[test]
    fn test_heading_flow_with_fallback_strategy() {
        let mut engine = engine_with(IMU);
        engine.subscribe("heading").unwrap();

        engine.on_sensor_sample(SensorKind::Accelerometer, &[0.0, 0.0, 9.81]);
        engine.on_sensor_sample(SensorKind::Magnetometer, &[0.0, 22.0, -40.0]);

        let headings: Vec<_> = engine
            .sink()
            .iter()
            .filter_map(|e| match e {
                MotionEvent::Heading(p) => Some(p.heading),
                _ => None,
            })
            .collect();
        assert!(!headings.is_empty());
        assert!(headings.iter().all(|h| (0.0..360.0).contains(h)));
    }

    #[test]
    fn test_custom_config_fallback_position() {
        let config = MotionConfig {
            fallback_position: GeoPosition::new(51.5074, -0.1278, 11.0),
            ..Default::default()
        };
        let engine: TestEngine =
            MotionEngine::with_config(SimulatedHost::with_sensors(IMU), Vec::new(), config);
        assert_eq!(
            engine.current_position(),
            GeoPosition::new(51.5074, -0.1278, 11.0)
        );
    }

    #[test]
    fn test_location_update_feeds_declination_position() {
        let mut engine = engine_with(IMU);
        engine.on_location_update(GeoPosition::new(51.5, -0.1, 20.0));
        assert_eq!(engine.current_position(), GeoPosition::new(51.5, -0.1, 20.0));
    }
}
