//! Vimshottari mahadasha timeline from the Moon's natal longitude.
//!
//! The nine-lord cycle spans 120 years; the birth mahadasha is the lord of
//! the Moon's nakshatra, already elapsed in proportion to the Moon's
//! progress through that nakshatra.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{CelestialBody, Nakshatra, NAKSHATRA_SPAN};

pub const VIMSHOTTARI_ORDER: [CelestialBody; 9] = [
    CelestialBody::Ketu,
    CelestialBody::Venus,
    CelestialBody::Sun,
    CelestialBody::Moon,
    CelestialBody::Mars,
    CelestialBody::Rahu,
    CelestialBody::Jupiter,
    CelestialBody::Saturn,
    CelestialBody::Mercury,
];

pub fn mahadasha_years(lord: CelestialBody) -> f64 {
    match lord {
        CelestialBody::Ketu => 7.0,
        CelestialBody::Venus => 20.0,
        CelestialBody::Sun => 6.0,
        CelestialBody::Moon => 10.0,
        CelestialBody::Mars => 7.0,
        CelestialBody::Rahu => 18.0,
        CelestialBody::Jupiter => 16.0,
        CelestialBody::Saturn => 19.0,
        CelestialBody::Mercury => 17.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DasaPeriod {
    pub lord: CelestialBody,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub years: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DasaTimeline {
    pub current: CelestialBody,
    pub remaining_years: f64,
    pub periods: Vec<DasaPeriod>,
}

/// How many mahadashas after the birth one to lay out.
const UPCOMING_PERIODS: usize = 6;

fn calendar_span(years: f64) -> Duration {
    Duration::seconds((years * 365.25 * 86_400.0).round() as i64)
}

/// Build the timeline starting at birth: the truncated birth mahadasha
/// followed by the next [`UPCOMING_PERIODS`] full ones.
pub fn vimshottari(moon_longitude: f64, birth: DateTime<Utc>) -> DasaTimeline {
    let lon = moon_longitude.rem_euclid(360.0);
    let nakshatra = Nakshatra::from_longitude(lon);
    let fraction = lon.rem_euclid(NAKSHATRA_SPAN) / NAKSHATRA_SPAN;

    let start_index = nakshatra.index() % VIMSHOTTARI_ORDER.len();
    let current = VIMSHOTTARI_ORDER[start_index];
    let remaining_years = mahadasha_years(current) * (1.0 - fraction);

    let mut periods = Vec::with_capacity(1 + UPCOMING_PERIODS);
    let mut start = birth;
    let mut end = start + calendar_span(remaining_years);
    periods.push(DasaPeriod {
        lord: current,
        start,
        end,
        years: remaining_years,
    });

    for step in 1..=UPCOMING_PERIODS {
        let lord = VIMSHOTTARI_ORDER[(start_index + step) % VIMSHOTTARI_ORDER.len()];
        let years = mahadasha_years(lord);
        start = end;
        end = start + calendar_span(years);
        periods.push(DasaPeriod {
            lord,
            start,
            end,
            years,
        });
    }

    DasaTimeline {
        current,
        remaining_years,
        periods,
    }
}
