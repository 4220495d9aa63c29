//! Geodesy utilities on a spherical Earth model.
//!
//! Everything works in decimal degrees and nautical miles. The sphere is
//! good enough for instrument emulation; the largest deviation from the
//! WGS-84 ellipsoid over the distances involved here is far below the
//! 1/10000-arcminute resolution of the wire formats.

/// Mean Earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

pub const METERS_PER_FOOT: f64 = 0.3048;
pub const METERS_PER_FATHOM: f64 = 1.8288;
pub const MPS_PER_KNOT: f64 = 0.514444;
pub const KMH_PER_KNOT: f64 = 1.852;

/// Normalise an angle to [0, 360).
pub fn normalize_deg(deg: f64) -> f64 {
    let d = deg % 360.0;
    if d < 0.0 {
        d + 360.0
    } else {
        d
    }
}

/// Wrap a longitude to (-180, 180].
pub fn wrap_longitude(lon: f64) -> f64 {
    let mut l = (lon + 180.0) % 360.0;
    if l <= 0.0 {
        l += 360.0;
    }
    l - 180.0
}

/// Signed difference `a - b` folded into (-180, 180].
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let mut d = (a - b) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    }
    if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Position reached from `(lat, lon)` after travelling `distance_nm`
/// nautical miles on the initial bearing `bearing_deg` (degrees true).
///
/// Standard spherical forward formula. Output latitude stays in
/// [-90, 90], longitude is wrapped to (-180, 180].
pub fn dead_reckon(lat: f64, lon: f64, bearing_deg: f64, distance_nm: f64) -> (f64, f64) {
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_nm / EARTH_RADIUS_NM;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    (lat2.to_degrees(), wrap_longitude(lon2.to_degrees()))
}

/// Initial bearing (degrees true, [0, 360)) of the great circle from
/// `(lat1, lon1)` towards `(lat2, lon2)`.
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    normalize_deg(y.atan2(x).to_degrees())
}

/// Great-circle distance in nautical miles (haversine).
pub fn distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS_NM
}

pub fn meters_to_feet(m: f64) -> f64 {
    m / METERS_PER_FOOT
}

pub fn meters_to_fathoms(m: f64) -> f64 {
    m / METERS_PER_FATHOM
}

pub fn knots_to_mps(kn: f64) -> f64 {
    kn * MPS_PER_KNOT
}

pub fn knots_to_kmh(kn: f64) -> f64 {
    kn * KMH_PER_KNOT
}
