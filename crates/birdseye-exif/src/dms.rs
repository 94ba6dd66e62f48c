//! Degrees/minutes/seconds rationals.
//!
//! EXIF GPS coordinates are unsigned `(numerator, denominator)` pairs with
//! the sign carried by a hemisphere reference letter (or, for altitude, a
//! separate sign byte). Seconds are stored over a denominator of 100, so
//! positions survive the round trip to within about 1e-6 degree and
//! altitudes to within a centimeter.

use crate::error::{ExifError, ExifResult};

/// An unsigned EXIF rational.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn to_f64(self) -> ExifResult<f64> {
        if self.den == 0 {
            return Err(ExifError::Malformed(format!(
                "rational {}/0 has a zero denominator",
                self.num
            )));
        }
        Ok(f64::from(self.num) / f64::from(self.den))
    }
}

/// Convert decimal degrees to DMS rationals plus a hemisphere letter.
///
/// `refs` is `('N', 'S')` for latitude, `('E', 'W')` for longitude; the
/// second letter marks negative values. Seconds truncate at centisecond
/// precision.
pub fn degrees_to_dms(value: f64, refs: (char, char)) -> ([Rational; 3], char) {
    let hemisphere = if value < 0.0 { refs.1 } else { refs.0 };
    let abs = value.abs();
    let degrees = abs.floor();
    let minutes = ((abs - degrees) * 60.0).floor();
    let centiseconds = ((abs - degrees - minutes / 60.0) * 3600.0 * 100.0).max(0.0) as u32;
    (
        [
            Rational::new(degrees as u32, 1),
            Rational::new(minutes as u32, 1),
            Rational::new(centiseconds, 100),
        ],
        hemisphere,
    )
}

/// Convert DMS rationals plus a hemisphere letter back to decimal degrees.
pub fn dms_to_degrees(dms: [Rational; 3], hemisphere: char) -> ExifResult<f64> {
    let value = dms[0].to_f64()? + dms[1].to_f64()? / 60.0 + dms[2].to_f64()? / 3600.0;
    match hemisphere {
        'N' | 'E' => Ok(value),
        'S' | 'W' => Ok(-value),
        other => Err(ExifError::Malformed(format!(
            "invalid hemisphere reference {other:?}"
        ))),
    }
}

/// Altitude as a centimeter-scaled unsigned rational plus a sign byte
/// (0 above the reference surface, 1 below).
pub fn altitude_to_rational(altitude_m: f64) -> (u8, Rational) {
    let sign = if altitude_m < 0.0 { 1 } else { 0 };
    (
        sign,
        Rational::new((altitude_m.abs() * 100.0) as u32, 100),
    )
}

pub fn rational_to_altitude(sign_ref: u8, value: Rational) -> ExifResult<f64> {
    let magnitude = value.to_f64()?;
    match sign_ref {
        0 => Ok(magnitude),
        1 => Ok(-magnitude),
        other => Err(ExifError::Malformed(format!(
            "invalid altitude sign reference {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latitude_roundtrips_within_documented_precision() {
        let (dms, hemisphere) = degrees_to_dms(37.7749, ('N', 'S'));
        assert_eq!(hemisphere, 'N');
        assert_eq!(dms[0], Rational::new(37, 1));
        assert_eq!(dms[1], Rational::new(46, 1));
        assert_eq!(dms[2].den, 100);
        let back = dms_to_degrees(dms, hemisphere).unwrap();
        assert!((back - 37.7749).abs() < 1e-4);
    }

    #[test]
    fn negative_longitude_takes_the_west_reference() {
        let (dms, hemisphere) = degrees_to_dms(-122.4194, ('E', 'W'));
        assert_eq!(hemisphere, 'W');
        let back = dms_to_degrees(dms, hemisphere).unwrap();
        assert!((back - -122.4194).abs() < 1e-4);
    }

    #[test]
    fn precision_is_about_a_microdegree() {
        for &value in &[0.0, 12.345678, 89.999999, 179.999999] {
            let (dms, hemisphere) = degrees_to_dms(value, ('N', 'S'));
            let back = dms_to_degrees(dms, hemisphere).unwrap();
            assert!((back - value).abs() < 3e-6, "value {value} came back {back}");
        }
    }

    #[test]
    fn invalid_hemisphere_is_malformed() {
        let (dms, _) = degrees_to_dms(10.0, ('N', 'S'));
        assert!(dms_to_degrees(dms, 'Q').is_err());
    }

    #[test]
    fn zero_denominator_is_malformed() {
        let dms = [
            Rational::new(10, 1),
            Rational::new(0, 0),
            Rational::new(0, 100),
        ];
        assert!(dms_to_degrees(dms, 'N').is_err());
    }

    #[test]
    fn altitude_carries_sign_separately() {
        let (sign, value) = altitude_to_rational(476.433);
        assert_eq!(sign, 0);
        assert_eq!(value, Rational::new(47643, 100));
        assert!((rational_to_altitude(sign, value).unwrap() - 476.43).abs() < 1e-9);

        let (sign, value) = altitude_to_rational(-12.5);
        assert_eq!(sign, 1);
        assert_eq!(rational_to_altitude(sign, value).unwrap(), -12.5);
    }

    #[test]
    fn bad_altitude_sign_is_malformed() {
        assert!(rational_to_altitude(7, Rational::new(100, 100)).is_err());
    }
}
