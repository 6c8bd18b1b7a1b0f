use log::{debug, info, warn};

use crate::error::HostError;
use crate::host::SensorHost;
use crate::types::{GeoPosition, LocationProvider};

/// Best-effort current position feeding the declination model.
///
/// Last-write-wins: incoming fixes overwrite unconditionally, with no
/// accuracy weighting, smoothing, or expiry. Reads never block and never
/// fail.
#[derive(Clone, Copy, Debug)]
pub struct LocationTracker {
    position: GeoPosition,
}

impl LocationTracker {
    /// Seed from the host's last-known fix: GPS first, then the network
    /// provider, then `fallback` when neither has a fix or location access
    /// is denied. Permission denial is logged, never an error.
    pub fn initialize(host: &impl SensorHost, fallback: GeoPosition) -> Self {
        let position = match Self::last_known(host) {
            Ok(Some(fix)) => {
                info!(
                    "seeding position from last known fix: {:.4}, {:.4}",
                    fix.latitude, fix.longitude
                );
                fix
            }
            Ok(None) => {
                info!("no last known fix, using the fallback position");
                fallback
            }
            Err(HostError::PermissionDenied) => {
                warn!("location permission not granted, using the fallback position for declination");
                fallback
            }
        };
        Self { position }
    }

    fn last_known(host: &impl SensorHost) -> Result<Option<GeoPosition>, HostError> {
        match host.last_known_fix(LocationProvider::Gps)? {
            Some(fix) => Ok(Some(fix)),
            None => host.last_known_fix(LocationProvider::Network),
        }
    }

    /// Overwrite the current position with an incoming fix.
    pub fn on_update(&mut self, fix: GeoPosition) {
        debug!(
            "position updated for true north: {:.4}, {:.4}",
            fix.latitude, fix.longitude
        );
        self.position = fix;
    }

    /// Latest known position.
    pub fn current_position(&self) -> GeoPosition {
        self.position
    }
}
