//! WGS84 transverse Mercator projection (Krüger series, sixth order in n).
//!
//! Accurate to well under a millimetre within a few thousand kilometres of the
//! central meridian. The projection holds no mutable state, so identical
//! inputs always give identical outputs.
use crate::position::Position;

/// WGS84 semi-major axis (m).
const WGS84_A: f64 = 6378137.0;
/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257223563;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransverseMercator {
    central_meridian: f64,
    /// Rectifying radius times the central scale factor.
    k0_a: f64,
    eccentricity: f64,
    alpha: [f64; 6],
}

impl TransverseMercator {
    /// Projection with unit scale on `central_meridian` (degrees), i.e. true meters near it.
    pub fn new(central_meridian: f64) -> Self {
        Self::with_scale(central_meridian, 1.0)
    }

    pub fn with_scale(central_meridian: f64, scale: f64) -> Self {
        let n = WGS84_F / (2.0 - WGS84_F);
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let rectifying_radius = WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1983433.0 * n6 / 1935360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
                + 167603.0 * n6 / 181440.0,
            49561.0 * n4 / 161280.0 - 179.0 * n5 / 168.0 + 6601661.0 * n6 / 7257600.0,
            34729.0 * n5 / 80640.0 - 3418889.0 * n6 / 1995840.0,
            212378941.0 * n6 / 319334400.0,
        ];

        Self {
            central_meridian,
            k0_a: scale * rectifying_radius,
            eccentricity: (WGS84_F * (2.0 - WGS84_F)).sqrt(),
            alpha,
        }
    }

    pub fn central_meridian(&self) -> f64 {
        self.central_meridian
    }

    /// Projects to `(northing, easting)` in meters, measured from the equator
    /// and the central meridian.
    pub fn forward(&self, position: Position) -> (f64, f64) {
        let phi = position.latitude.to_radians();
        let lambda = wrap_longitude(position.longitude - self.central_meridian).to_radians();

        let e = self.eccentricity;
        let sin_phi = phi.sin();
        // Conformal latitude, as its tangent
        let tau = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();

        let xi_prime = tau.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / (1.0 + tau * tau).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        (self.k0_a * xi, self.k0_a * eta)
    }
}

/// Longitude difference folded into [-180, 180).
fn wrap_longitude(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTM_SCALE: f64 = 0.9996;

    #[test]
    fn test_central_meridian_has_zero_easting() {
        let tm = TransverseMercator::new(-122.0);
        let (_, easting) = tm.forward(Position::new(37.0, -122.0));
        assert_eq!(easting, 0.0);
    }

    #[test]
    fn test_equator_origin() {
        let tm = TransverseMercator::new(0.0);
        assert_eq!(tm.forward(Position::new(0.0, 0.0)), (0.0, 0.0));
    }

    #[test]
    fn test_utm_northing_at_45_degrees() {
        // Published UTM northing of 45°N on a central meridian
        let tm = TransverseMercator::with_scale(-123.0, UTM_SCALE);
        let (northing, easting) = tm.forward(Position::new(45.0, -123.0));
        assert!((northing - 4_982_950.4).abs() < 0.5, "northing {}", northing);
        assert_eq!(easting, 0.0);
    }

    #[test]
    fn test_utm_zone_edge_on_equator() {
        // 3° east of the central meridian on the equator, before UTM's 500 km false easting
        let tm = TransverseMercator::with_scale(-123.0, UTM_SCALE);
        let (northing, easting) = tm.forward(Position::new(0.0, -120.0));
        assert!(northing.abs() < 1e-6);
        assert!((easting - 333_978.56).abs() < 0.5, "easting {}", easting);
    }

    #[test]
    fn test_symmetry_about_central_meridian() {
        let tm = TransverseMercator::new(10.0);
        let (n_east, e_east) = tm.forward(Position::new(50.0, 10.5));
        let (n_west, e_west) = tm.forward(Position::new(50.0, 9.5));
        assert!((n_east - n_west).abs() < 1e-9);
        assert!((e_east + e_west).abs() < 1e-9);
        assert!(e_east > 0.0);
    }

    #[test]
    fn test_wraps_across_antimeridian() {
        let tm = TransverseMercator::new(179.9);
        let (_, easting) = tm.forward(Position::new(0.0, -179.9));
        // 0.2° east across the antimeridian, not 359.8° west
        assert!(easting > 22_000.0 && easting < 23_000.0, "easting {}", easting);
    }

    #[test]
    fn test_pole_is_finite() {
        let tm = TransverseMercator::new(0.0);
        let (northing, easting) = tm.forward(Position::new(90.0, 0.0));
        assert!(northing.is_finite() && easting.is_finite());
    }
}
