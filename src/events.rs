// events.rs — derived readings and the outbound delivery boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MotionError;

/// Cartesian component triple used by the accel payloads.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Device rotation rate in degrees per second.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationRate {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Acceleration reading republished from the raw accelerometer and gyroscope.
///
/// Both acceleration fields carry the same raw vector: no gravity removal is
/// performed. `interval` is the declared nominal sample interval in
/// milliseconds, not a measured rate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccelPayload {
    pub acceleration: Axes,
    pub acceleration_including_gravity: Axes,
    pub rotation_rate: RotationRate,
    pub interval: f64,
}

/// Tilt-compensated orientation in degrees: alpha = azimuth, beta = pitch,
/// gamma = roll.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientationPayload {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Compass bearing in degrees, normalized into [0, 360), 0 = north.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadingPayload {
    pub heading: f64,
}

/// A derived reading ready for delivery to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MotionEvent {
    Accel(AccelPayload),
    Orientation(OrientationPayload),
    Heading(HeadingPayload),
}

impl MotionEvent {
    pub fn class(&self) -> EventClass {
        match self {
            MotionEvent::Accel(_) => EventClass::Accel,
            MotionEvent::Orientation(_) => EventClass::Orientation,
            MotionEvent::Heading(_) => EventClass::Heading,
        }
    }
}

/// Logical event classes callers can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventClass {
    Accel,
    Orientation,
    Heading,
}

impl EventClass {
    /// Wire name used by subscribe calls and event delivery.
    pub fn name(self) -> &'static str {
        match self {
            EventClass::Accel => "accel",
            EventClass::Orientation => "orientation",
            EventClass::Heading => "heading",
        }
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventClass {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accel" => Ok(EventClass::Accel),
            "orientation" => Ok(EventClass::Orientation),
            "heading" => Ok(EventClass::Heading),
            other => Err(MotionError::InvalidEventClass(other.to_string())),
        }
    }
}

/// Outbound boundary: delivers a derived reading to every subscriber of its
/// class. Fire-and-forget; implementations must not block.
pub trait EventSink {
    fn emit(&mut self, event: &MotionEvent);
}

/// Buffering sink for tests and offline processing.
impl EventSink for Vec<MotionEvent> {
    fn emit(&mut self, event: &MotionEvent) {
        self.push(*event);
    }
}
