//! Whole-sign house mapping: a body occupies the house counted from the
//! ascendant's sign, one sign per house.

use crate::{AstrologyError, Chart, House, HousePlacement, ZodiacSign};

/// House of a body relative to the ascendant, both given as sidereal
/// ecliptic longitudes. Longitudes are normalized into [0, 360) first, so
/// the result is invariant under full turns; non-finite input is rejected.
pub fn house_of(ascendant_longitude: f64, body_longitude: f64) -> Result<House, AstrologyError> {
    let asc = crate::normalize_longitude(ascendant_longitude)?;
    let lon = crate::normalize_longitude(body_longitude)?;
    let asc_sign = (asc / 30.0).floor() as usize % 12;
    let body_sign = (lon / 30.0).floor() as usize % 12;
    let index = (12 + body_sign - asc_sign) % 12 + 1;
    // index is 1..=12 by construction
    Ok(House::from_index(index).unwrap_or(House::First))
}

/// Whole-sign placements for every body present in the chart.
pub fn placements(chart: &Chart) -> Vec<HousePlacement> {
    let asc_sign = chart.ascendant_sign().index();
    chart
        .positions
        .values()
        .map(|p| {
            let sign = p.sign();
            let index = (12 + sign.index() - asc_sign) % 12 + 1;
            HousePlacement {
                body: p.body,
                house: House::from_index(index).unwrap_or(House::First),
                sign,
            }
        })
        .collect()
}

/// Ninth-harmonic (navamsa) sign for a longitude: each sign splits into nine
/// parts of 3°20', counted onward from nine times the sign index.
pub fn navamsa_sign(longitude: f64) -> ZodiacSign {
    let normalized = longitude.rem_euclid(360.0);
    let sign_index = (normalized / 30.0).floor() as usize;
    let part = 30.0 / 9.0;
    let nav_index = (normalized.rem_euclid(30.0) / part).floor() as usize;
    ZodiacSign::from_index((sign_index * 9 + nav_index) % 12)
}
