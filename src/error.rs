use thiserror::Error;

/// Failures surfaced to callers of the control entry points.
///
/// Everything else the core encounters (permission denial, degenerate fusion
/// input, short sample vectors, declination model failure) degrades locally
/// and is logged, never returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MotionError {
    #[error("Motion sensors not available on this device.")]
    SensorsUnavailable,

    #[error("Invalid event name: {0}")]
    InvalidEventClass(String),

    /// Returned by host bridge layers when a control call arrives before the
    /// engine has been constructed; the engine itself never produces it.
    #[error("Implementation not initialized")]
    NotReady,
}

/// Failures reported by the host platform boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("location permission not granted")]
    PermissionDenied,
}

pub type MotionResult<T> = Result<T, MotionError>;
