// geomag.rs — geomagnetic field model for magnetic-declination lookup.
//
// Spherical-harmonic evaluation of the World Magnetic Model: WMM2020 main
// field and secular variation, truncated at degree and order 8. The
// truncation costs well under a degree of declination accuracy, which is
// ample for correcting a compass heading. Coordinates are geodetic WGS84;
// the field is evaluated in geocentric coordinates and rotated back.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Highest spherical-harmonic degree and order evaluated.
const MAX_DEGREE: usize = 8;

/// 2020-01-01T00:00:00Z, the WMM2020 reference epoch.
const BASE_EPOCH_UNIX_SECS: i64 = 1_577_836_800;

const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

const EARTH_SEMI_MAJOR_AXIS_KM: f64 = 6378.137;
const EARTH_SEMI_MINOR_AXIS_KM: f64 = 6356.752_314_2;
const EARTH_REFERENCE_RADIUS_KM: f64 = 6371.2;

/// WMM2020 Schmidt semi-normalized Gauss coefficients, nT:
/// (n, m, g, h, dg/dt, dh/dt).
#[rustfmt::skip]
const WMM_COEFFICIENTS: &[(usize, usize, f64, f64, f64, f64)] = &[
    (1, 0, -29404.5,     0.0,   6.7,   0.0),
    (1, 1,  -1450.7,  4652.9,   7.7, -25.1),
    (2, 0,  -2500.0,     0.0, -11.5,   0.0),
    (2, 1,   2982.0, -2991.6,  -7.1, -30.2),
    (2, 2,   1676.8,  -734.8,  -2.2, -23.9),
    (3, 0,   1363.9,     0.0,   2.8,   0.0),
    (3, 1,  -2381.0,   -82.2,  -6.2,   5.7),
    (3, 2,   1236.2,   241.8,   3.4,  -1.0),
    (3, 3,    525.7,  -542.9, -12.2,   1.1),
    (4, 0,    903.1,     0.0,  -1.1,   0.0),
    (4, 1,    809.4,   282.0,  -1.6,   0.2),
    (4, 2,     86.2,  -158.4,  -6.0,   6.9),
    (4, 3,   -309.4,   199.8,   5.4,   3.7),
    (4, 4,     47.9,  -350.1,  -5.5,  -5.6),
    (5, 0,   -234.4,     0.0,  -0.3,   0.0),
    (5, 1,    363.1,    47.7,   0.6,   0.1),
    (5, 2,    187.8,   208.4,  -0.7,   2.5),
    (5, 3,   -140.7,  -121.3,   0.1,  -0.9),
    (5, 4,   -151.2,    32.2,   1.2,   3.0),
    (5, 5,     13.7,    99.1,   1.0,   0.5),
    (6, 0,     65.9,     0.0,  -0.6,   0.0),
    (6, 1,     65.6,   -19.1,  -0.4,   0.1),
    (6, 2,     73.0,    25.0,   0.5,  -1.8),
    (6, 3,   -121.5,    52.7,   1.4,  -1.4),
    (6, 4,    -36.2,   -64.4,  -1.4,   0.9),
    (6, 5,     13.5,     9.0,   0.0,   0.1),
    (6, 6,    -64.7,    68.1,   0.8,   1.0),
    (7, 0,     80.6,     0.0,  -0.1,   0.0),
    (7, 1,    -76.8,   -51.4,  -0.3,   0.5),
    (7, 2,     -8.3,   -16.8,  -0.1,   0.6),
    (7, 3,     56.5,     2.3,   0.7,  -0.7),
    (7, 4,     15.8,    23.5,   0.2,  -0.2),
    (7, 5,      6.4,    -2.2,  -0.5,  -1.2),
    (7, 6,     -7.2,   -27.2,  -0.8,   0.2),
    (7, 7,      9.8,    -1.9,   1.0,   0.3),
    (8, 0,     23.6,     0.0,  -0.1,   0.0),
    (8, 1,      9.8,     8.4,   0.1,  -0.3),
    (8, 2,    -17.5,   -15.3,  -0.1,   0.7),
    (8, 3,     -0.4,    12.8,   0.5,  -0.2),
    (8, 4,    -21.1,   -11.8,  -0.1,   0.5),
    (8, 5,     15.3,    14.9,   0.4,  -0.3),
    (8, 6,     13.7,     3.6,   0.5,  -0.5),
    (8, 7,    -16.5,    -6.9,   0.0,   0.4),
    (8, 8,     -0.3,     2.8,   0.4,   0.1),
];

/// Model construction rejects coordinates it cannot evaluate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("geomagnetic model requires finite coordinates")]
pub struct GeomagError;

/// Magnetic field estimate at a fixed position and time.
///
/// Components are geodetic: x north, y east, z down, in nanotesla.
#[derive(Clone, Copy, Debug)]
pub struct GeomagneticField {
    x: f64,
    y: f64,
    z: f64,
}

impl GeomagneticField {
    pub fn new(
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f64,
        time: DateTime<Utc>,
    ) -> Result<Self, GeomagError> {
        if !latitude_deg.is_finite() || !longitude_deg.is_finite() || !altitude_m.is_finite() {
            return Err(GeomagError);
        }
        // Keep the evaluation point off the geographic poles
        let latitude_deg = latitude_deg.clamp(-90.0 + 1e-5, 90.0 - 1e-5);

        let (gc_lat, gc_lon, gc_radius_km) =
            geocentric_coordinates(latitude_deg, longitude_deg, altitude_m / 1000.0);

        let years_since_epoch =
            (time.timestamp() - BASE_EPOCH_UNIX_SECS) as f64 / SECONDS_PER_YEAR;

        let theta = std::f64::consts::FRAC_PI_2 - gc_lat;
        let (p, p_deriv) = legendre_table(MAX_DEGREE, theta);
        let schmidt = schmidt_quasi_norm_factors(MAX_DEGREE);

        // (a/r)^(n + 2) for every degree
        let mut relative_radius_power = [0.0f64; MAX_DEGREE + 3];
        relative_radius_power[0] = 1.0;
        relative_radius_power[1] = EARTH_REFERENCE_RADIUS_KM / gc_radius_km;
        for i in 2..relative_radius_power.len() {
            relative_radius_power[i] = relative_radius_power[i - 1] * relative_radius_power[1];
        }

        // sin(m * lon) and cos(m * lon) by angle addition
        let mut sin_mlon = [0.0f64; MAX_DEGREE + 1];
        let mut cos_mlon = [0.0f64; MAX_DEGREE + 1];
        sin_mlon[0] = 0.0;
        cos_mlon[0] = 1.0;
        sin_mlon[1] = gc_lon.sin();
        cos_mlon[1] = gc_lon.cos();
        for m in 2..=MAX_DEGREE {
            let x = m >> 1;
            sin_mlon[m] = sin_mlon[m - x] * cos_mlon[x] + cos_mlon[m - x] * sin_mlon[x];
            cos_mlon[m] = cos_mlon[m - x] * cos_mlon[x] - sin_mlon[m - x] * sin_mlon[x];
        }

        let inverse_cos_latitude = 1.0 / gc_lat.cos();

        // Geocentric field components: north, east, down
        let mut gc_x = 0.0;
        let mut gc_y = 0.0;
        let mut gc_z = 0.0;
        for &(n, m, g0, h0, dg, dh) in WMM_COEFFICIENTS {
            let g = g0 + years_since_epoch * dg;
            let h = h0 + years_since_epoch * dh;
            let norm = schmidt[n][m];
            let rr = relative_radius_power[n + 2];

            gc_x += rr * (g * cos_mlon[m] + h * sin_mlon[m]) * p_deriv[n][m] * norm;
            gc_y += rr
                * m as f64
                * (g * sin_mlon[m] - h * cos_mlon[m])
                * p[n][m]
                * norm
                * inverse_cos_latitude;
            gc_z -= (n as f64 + 1.0) * rr * (g * cos_mlon[m] + h * sin_mlon[m]) * p[n][m] * norm;
        }

        // Rotate from the geocentric to the geodetic frame
        let lat_diff = latitude_deg.to_radians() - gc_lat;
        Ok(Self {
            x: gc_x * lat_diff.cos() + gc_z * lat_diff.sin(),
            y: gc_y,
            z: -gc_x * lat_diff.sin() + gc_z * lat_diff.cos(),
        })
    }

    /// Declination in degrees: the angle between magnetic north and true
    /// north, positive east.
    pub fn declination(&self) -> f64 {
        self.y.atan2(self.x).to_degrees()
    }

    /// Horizontal field strength in nanotesla.
    pub fn horizontal_strength(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Geodetic latitude/longitude/altitude to geocentric spherical coordinates
/// (latitude rad, longitude rad, radius km) on the WGS84 ellipsoid.
fn geocentric_coordinates(gd_lat_deg: f64, gd_lon_deg: f64, altitude_km: f64) -> (f64, f64, f64) {
    let a2 = EARTH_SEMI_MAJOR_AXIS_KM * EARTH_SEMI_MAJOR_AXIS_KM;
    let b2 = EARTH_SEMI_MINOR_AXIS_KM * EARTH_SEMI_MINOR_AXIS_KM;
    let gd_lat = gd_lat_deg.to_radians();
    let clat = gd_lat.cos();
    let slat = gd_lat.sin();
    let tlat = slat / clat;

    let ellipsoid_radius = (a2 * clat * clat + b2 * slat * slat).sqrt();
    let gc_lat = (tlat * (ellipsoid_radius * altitude_km + b2)
        / (ellipsoid_radius * altitude_km + a2))
        .atan();
    let gc_lon = gd_lon_deg.to_radians();

    let rad_sq = altitude_km * altitude_km
        + 2.0 * altitude_km * ellipsoid_radius
        + (a2 * a2 * clat * clat + b2 * b2 * slat * slat)
            / (a2 * clat * clat + b2 * slat * slat);
    (gc_lat, gc_lon, rad_sq.sqrt())
}

/// Associated Legendre functions and their derivatives with respect to the
/// polar angle, Gauss normalized, for every (n, m) up to `max_n`.
fn legendre_table(max_n: usize, theta: f64) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let cos_t = theta.cos();
    let sin_t = theta.sin();

    let mut p: Vec<Vec<f64>> = Vec::with_capacity(max_n + 1);
    let mut p_deriv: Vec<Vec<f64>> = Vec::with_capacity(max_n + 1);
    p.push(vec![1.0]);
    p_deriv.push(vec![0.0]);

    for n in 1..=max_n {
        let mut row = vec![0.0; n + 1];
        let mut row_deriv = vec![0.0; n + 1];
        for m in 0..=n {
            if n == m {
                row[m] = sin_t * p[n - 1][m - 1];
                row_deriv[m] = cos_t * p[n - 1][m - 1] + sin_t * p_deriv[n - 1][m - 1];
            } else if n == 1 || m == n - 1 {
                row[m] = cos_t * p[n - 1][m];
                row_deriv[m] = -sin_t * p[n - 1][m] + cos_t * p_deriv[n - 1][m];
            } else {
                let k = (((n - 1) * (n - 1) - m * m) as f64)
                    / (((2 * n - 1) * (2 * n - 3)) as f64);
                row[m] = cos_t * p[n - 1][m] - k * p[n - 2][m];
                row_deriv[m] =
                    -sin_t * p[n - 1][m] + cos_t * p_deriv[n - 1][m] - k * p_deriv[n - 2][m];
            }
        }
        p.push(row);
        p_deriv.push(row_deriv);
    }
    (p, p_deriv)
}

/// Conversion factors from Gauss-normalized to Schmidt quasi-normalized
/// associated Legendre functions.
fn schmidt_quasi_norm_factors(max_n: usize) -> Vec<Vec<f64>> {
    let mut schmidt: Vec<Vec<f64>> = Vec::with_capacity(max_n + 1);
    schmidt.push(vec![1.0]);
    for n in 1..=max_n {
        let mut row = vec![0.0; n + 1];
        row[0] = schmidt[n - 1][0] * (2 * n - 1) as f64 / n as f64;
        for m in 1..=n {
            let factor = ((n - m + 1) * if m == 1 { 2 } else { 1 }) as f64 / (n + m) as f64;
            row[m] = row[m - 1] * factor.sqrt();
        }
        schmidt.push(row);
    }
    schmidt
}
