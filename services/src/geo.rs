//! Pure geodesy helpers shared by every distance consumer.

use crate::error::{ServiceError, ServiceResult};

/// Mean Earth radius in meters (spherical model).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle (haversine) distance in meters between two points given as
/// (latitude, longitude) degree pairs. Symmetric, zero for identical points,
/// total for all in-range inputs. Range validation is the caller's job.
pub fn haversine_m(a_lat: f64, a_lng: f64, b_lat: f64, b_lng: f64) -> f64 {
    let d_lat = (b_lat - a_lat).to_radians();
    let d_lng = (b_lng - a_lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a_lat.to_radians().cos() * b_lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Total meters traveled along a sequence of (latitude, longitude) pairs:
/// the sum of the haversine distance over each consecutive pair.
///
/// Sequences of zero or one points yield 0.0. The caller must supply the
/// points in ascending timestamp order; nothing here can detect a shuffled
/// input, it would just sum the wrong legs.
pub fn path_distance_m<I>(points: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut iter = points.into_iter();
    let mut prev = match iter.next() {
        Some(p) => p,
        None => return 0.0,
    };

    let mut total = 0.0;
    for point in iter {
        total += haversine_m(prev.0, prev.1, point.0, point.1);
        prev = point;
    }
    total
}

/// Inclusive-range coordinate check applied at the service boundary before
/// anything is persisted. Rejects NaN along with out-of-range values.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> ServiceResult<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ServiceError::validation(
            "latitude",
            format!("{latitude} is outside [-90, 90]"),
        ));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ServiceError::validation(
            "longitude",
            format!("{longitude} is outside [-180, 180]"),
        ));
    }
    Ok(())
}
