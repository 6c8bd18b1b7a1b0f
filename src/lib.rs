//! Sensor-fusion and event-dispatch core for device motion, orientation and
//! heading.
//!
//! Raw vector samples from the accelerometer, gyroscope, magnetometer,
//! rotation-vector and dedicated heading sensors, along with location fixes,
//! come in through the [`SensorHost`] boundary; derived `accel`,
//! `orientation` and `heading` events go out through [`EventSink`]. [`MotionEngine`] owns the
//! whole pipeline: capability discovery and heading-strategy selection at
//! construction, the subscribe/unsubscribe lifecycle that keeps exactly the
//! required physical sensors registered, tilt-compensated fusion, and
//! magnetic-declination correction against the last known position.
//!
//! The engine is synchronous and single-owner: every handler runs to
//! completion on the caller's thread, and the host is assumed to deliver
//! callbacks serially. Anomalies that are not caller errors (permission
//! denial, degenerate fusion input, short samples, declination model
//! failure) degrade locally and are logged, never surfaced.

pub mod capabilities;
pub mod engine;
pub mod error;
pub mod events;
pub mod fusion;
pub mod geomag;
pub mod host;
pub mod location;
pub mod math;
pub mod subscriptions;
pub mod types;

pub use capabilities::{HeadingStrategy, SensorCapabilities};
pub use engine::{MotionConfig, MotionEngine};
pub use error::{HostError, MotionError, MotionResult};
pub use events::{EventClass, EventSink, MotionEvent};
pub use host::{SensorHost, SimulatedHost};
pub use location::LocationTracker;
pub use subscriptions::ActiveSubscriptions;
pub use types::{GeoPosition, LocationProvider, SensorKind, SensorRate};
