//! Position provider seam and the JPL Horizons backed implementation.
//!
//! Horizons serves geocentric RA/DEC; longitudes are converted to the
//! ecliptic frame here and made sidereal with a Lahiri ayanamsa model. The
//! ascendant is not an ephemeris quantity, so it is derived locally from
//! sidereal time and the birth latitude.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use urlencoding::encode;

use crate::{AstrologyError, CelestialBody, Chart, Location};

/// External collaborator that turns a birth instant and place into a chart.
pub trait PositionProvider {
    fn get_positions(
        &self,
        when: DateTime<Utc>,
        location: Location,
    ) -> Result<Chart, AstrologyError>;
}

pub type JulianDay = f64;

const J2000: JulianDay = 2_451_545.0;

/// Julian day (UT) of a chrono instant.
pub fn julian_day(when: DateTime<Utc>) -> JulianDay {
    2_440_587.5 + when.timestamp_millis() as f64 / 86_400_000.0
}

/// Lahiri ayanamsa in degrees: 23°51'11" at J2000.0, drifting with the
/// precession rate of 50.27 arcseconds per year.
pub fn lahiri_ayanamsa(jd: JulianDay) -> f64 {
    23.853 + (jd - J2000) / 365.25 * 0.0139699
}

/// Greenwich mean sidereal time in degrees (Meeus 12.4).
pub fn gmst_degrees(jd: JulianDay) -> f64 {
    let d = jd - J2000;
    let t = d / 36_525.0;
    (280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t - t * t * t / 38_710_000.0)
        .rem_euclid(360.0)
}

/// Convert geocentric equatorial coordinates (degrees) to ecliptic
/// longitude, J2000 mean obliquity.
pub fn equatorial_to_ecliptic_longitude(ra_deg: f64, dec_deg: f64) -> f64 {
    let obliquity = 23.439_291_f64.to_radians();
    let ra = ra_deg.to_radians();
    let dec = dec_deg.to_radians();
    let lambda = (ra.sin() * obliquity.cos() + dec.tan() * obliquity.sin()).atan2(ra.cos());
    lambda.to_degrees().rem_euclid(360.0)
}

fn obliquity_degrees(jd: JulianDay) -> f64 {
    let t = (jd - J2000) / 36_525.0;
    23.439_291 - 0.013_004_2 * t
}

/// Tropical ascendant from local sidereal time and geographic latitude.
pub fn tropical_ascendant(jd: JulianDay, latitude: f64, longitude: f64) -> f64 {
    let ramc = (gmst_degrees(jd) + longitude).rem_euclid(360.0).to_radians();
    let obliquity = obliquity_degrees(jd).to_radians();
    let phi = latitude.to_radians();
    let asc = (-ramc.cos()).atan2(ramc.sin() * obliquity.cos() + phi.tan() * obliquity.sin());
    asc.to_degrees().rem_euclid(360.0)
}

// ---------------------------
// ## Horizons provider
// ---------------------------

// Horizons target IDs. Rahu and Ketu have no Horizons body; Rahu uses the
// mean lunar node target and Ketu is derived as its opposite point.
const HORIZONS_BODIES: &[(CelestialBody, &str)] = &[
    (CelestialBody::Sun, "'10'"),
    (CelestialBody::Moon, "'301'"),
    (CelestialBody::Mercury, "'199'"),
    (CelestialBody::Venus, "'299'"),
    (CelestialBody::Mars, "'499'"),
    (CelestialBody::Jupiter, "'599'"),
    (CelestialBody::Saturn, "'699'"),
    (CelestialBody::Rahu, "'-99'"),
];

const HORIZONS_URL: &str = "https://ssd.jpl.nasa.gov/api/horizons.api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct HorizonsResponse {
    result: String,
}

pub struct HorizonsProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HorizonsProvider {
    pub fn new() -> Result<Self, AstrologyError> {
        Self::with_base_url(HORIZONS_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, AstrologyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AstrologyError::Ephemeris(e.to_string()))?;
        Ok(HorizonsProvider {
            client,
            base_url: base_url.into(),
        })
    }

    fn fetch_equatorial(
        &self,
        horizons_id: &str,
        when: DateTime<Utc>,
    ) -> Result<(f64, f64), AstrologyError> {
        let stamp = when.format("%Y-%m-%d %H:%M:%S").to_string();
        let url = format!(
            "{}?format=json&COMMAND={}&OBJ_DATA=NO&MAKE_EPHEM=YES&EPHEM_TYPE=OBSERVER&CENTER=500@399&START_TIME='{}'&STOP_TIME='{}'&STEP_SIZE='1m'&QUANTITIES='1'",
            self.base_url,
            encode(horizons_id),
            encode(&stamp),
            encode(&stamp),
        );
        tracing::debug!(body = horizons_id, "querying horizons");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| AstrologyError::Ephemeris(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AstrologyError::Ephemeris(format!(
                "horizons returned status {}",
                response.status()
            )));
        }
        let body: HorizonsResponse = response
            .json()
            .map_err(|e| AstrologyError::Ephemeris(e.to_string()))?;
        parse_horizons_equatorial(&body.result)
    }
}

impl PositionProvider for HorizonsProvider {
    fn get_positions(
        &self,
        when: DateTime<Utc>,
        location: Location,
    ) -> Result<Chart, AstrologyError> {
        let jd = julian_day(when);
        let ayanamsa = lahiri_ayanamsa(jd);

        let mut positions = Vec::new();
        for &(body, horizons_id) in HORIZONS_BODIES {
            let (ra, dec) = self.fetch_equatorial(horizons_id, when)?;
            let tropical = equatorial_to_ecliptic_longitude(ra, dec);
            let sidereal = (tropical - ayanamsa).rem_euclid(360.0);
            positions.push((body, sidereal));
            if body == CelestialBody::Rahu {
                positions.push((CelestialBody::Ketu, (sidereal + 180.0).rem_euclid(360.0)));
            }
        }

        let ascendant =
            (tropical_ascendant(jd, location.latitude, location.longitude) - ayanamsa)
                .rem_euclid(360.0);
        Chart::new(ascendant, positions)
    }
}

/// Pull RA/DEC (degrees) out of the plain-text ephemeris block Horizons
/// embeds between the $$SOE and $$EOE markers.
pub fn parse_horizons_equatorial(result: &str) -> Result<(f64, f64), AstrologyError> {
    let lines: Vec<&str> = result.lines().collect();
    let soe = lines.iter().position(|l| l.contains("$$SOE"));
    let eoe = lines.iter().position(|l| l.contains("$$EOE"));
    let (Some(soe), Some(eoe)) = (soe, eoe) else {
        return Err(AstrologyError::Ephemeris(
            "ephemeris data markers not found in horizons result".into(),
        ));
    };

    for line in &lines[soe + 1..eoe] {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            continue;
        }
        // Columns: date, time, RA h m s, DEC sign+d m s.
        let parse = |s: &str| {
            s.parse::<f64>()
                .map_err(|e| AstrologyError::Ephemeris(format!("bad ephemeris field {:?}: {}", s, e)))
        };
        let ra_deg =
            (parse(parts[2])? + parse(parts[3])? / 60.0 + parse(parts[4])? / 3600.0) * 15.0;
        let (dec_sign, dec_d) = match parts[5].strip_prefix('-') {
            Some(rest) => (-1.0, rest.trim_start_matches('+')),
            None => (1.0, parts[5].trim_start_matches('+')),
        };
        let dec_deg =
            dec_sign * (parse(dec_d)? + parse(parts[6])? / 60.0 + parse(parts[7])? / 3600.0);
        return Ok((ra_deg, dec_deg));
    }

    Err(AstrologyError::Ephemeris(
        "no usable ephemeris rows in horizons result".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    #[test]
    fn julian_day_of_the_j2000_epoch() {
        let when = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert_relative_eq!(julian_day(when), 2_451_545.0, epsilon = 1e-8);
    }

    #[test]
    fn julian_day_of_unix_epoch() {
        let when = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_relative_eq!(julian_day(when), 2_440_587.5, epsilon = 1e-8);
    }

    #[test]
    fn ayanamsa_near_j2000() {
        assert_relative_eq!(lahiri_ayanamsa(J2000), 23.853, epsilon = 1e-9);
        // Drifts forward roughly 0.014 degrees per year.
        let later = lahiri_ayanamsa(J2000 + 10.0 * 365.25);
        assert_relative_eq!(later, 23.853 + 0.139699, epsilon = 1e-6);
    }

    #[test]
    fn gmst_at_j2000_noon() {
        assert_relative_eq!(gmst_degrees(J2000), 280.460_618_37, epsilon = 1e-6);
    }

    #[test]
    fn ecliptic_conversion_fixed_points() {
        // The equinox maps to itself.
        assert_relative_eq!(equatorial_to_ecliptic_longitude(0.0, 0.0), 0.0, epsilon = 1e-9);
        // A pole of the equator on the solstice colure maps to 90 degrees.
        assert_relative_eq!(
            equatorial_to_ecliptic_longitude(90.0, 23.439_291),
            90.0,
            epsilon = 1e-6
        );
        assert_relative_eq!(
            equatorial_to_ecliptic_longitude(180.0, 0.0),
            180.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn equator_ascendant_at_j2000_noon() {
        // At zero latitude the formula reduces to the self-consistent value
        // for RAMC 280.46 degrees.
        let asc = tropical_ascendant(J2000, 0.0, 0.0);
        assert_relative_eq!(asc, 191.38, epsilon = 0.05);
        assert!((0.0..360.0).contains(&asc));
    }

    #[test]
    fn parses_horizons_soe_block() {
        let result = "\
Ephemeris / API_USER
$$SOE
 2024-Oct-07 12:00     12 30 00.00 -05 30 00.0
$$EOE
";
        let (ra, dec) = parse_horizons_equatorial(result).unwrap();
        assert_relative_eq!(ra, (12.0 + 30.0 / 60.0) * 15.0, epsilon = 1e-9);
        assert_relative_eq!(dec, -5.5, epsilon = 1e-9);
    }

    #[test]
    fn missing_markers_is_an_ephemeris_error() {
        let err = parse_horizons_equatorial("no data here").unwrap_err();
        assert!(matches!(err, AstrologyError::Ephemeris(_)));
    }
}
