use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod dasa;
pub mod ephemeris;
pub mod houses;
pub mod narrative;
pub mod render;
pub mod yogas;

pub use dasa::{DasaPeriod, DasaTimeline};
pub use ephemeris::{HorizonsProvider, PositionProvider};
pub use houses::{house_of, navamsa_sign, placements};
pub use narrative::{Analysis, NarrativeEngine};
pub use render::{render_chart, RenderOptions};
pub use yogas::{detect_yogas, Yoga, YogaMatch};

// ---------------------------
// ## Enumerations
// ---------------------------

/// The nine classical bodies (navagraha) of Vedic astrology.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CelestialBody {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    Rahu,
    Ketu,
}

impl CelestialBody {
    pub fn iter() -> impl Iterator<Item = CelestialBody> {
        [
            CelestialBody::Sun,
            CelestialBody::Moon,
            CelestialBody::Mercury,
            CelestialBody::Venus,
            CelestialBody::Mars,
            CelestialBody::Jupiter,
            CelestialBody::Saturn,
            CelestialBody::Rahu,
            CelestialBody::Ketu,
        ]
        .iter()
        .copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            CelestialBody::Sun => "Sun",
            CelestialBody::Moon => "Moon",
            CelestialBody::Mercury => "Mercury",
            CelestialBody::Venus => "Venus",
            CelestialBody::Mars => "Mars",
            CelestialBody::Jupiter => "Jupiter",
            CelestialBody::Saturn => "Saturn",
            CelestialBody::Rahu => "Rahu",
            CelestialBody::Ketu => "Ketu",
        }
    }
}

impl fmt::Display for CelestialBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ZodiacSign {
    Aries = 0,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    /// Sign containing the given ecliptic longitude. A longitude exactly on a
    /// 30-degree boundary belongs to the higher sign.
    pub fn from_longitude(longitude: f64) -> Self {
        let normalized = longitude.rem_euclid(360.0);
        Self::from_index((normalized / 30.0).floor() as usize % 12)
    }

    pub fn from_index(index: usize) -> Self {
        match index % 12 {
            0 => ZodiacSign::Aries,
            1 => ZodiacSign::Taurus,
            2 => ZodiacSign::Gemini,
            3 => ZodiacSign::Cancer,
            4 => ZodiacSign::Leo,
            5 => ZodiacSign::Virgo,
            6 => ZodiacSign::Libra,
            7 => ZodiacSign::Scorpio,
            8 => ZodiacSign::Sagittarius,
            9 => ZodiacSign::Capricorn,
            10 => ZodiacSign::Aquarius,
            _ => ZodiacSign::Pisces,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            ZodiacSign::Aries => "Aries",
            ZodiacSign::Taurus => "Taurus",
            ZodiacSign::Gemini => "Gemini",
            ZodiacSign::Cancer => "Cancer",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Virgo",
            ZodiacSign::Libra => "Libra",
            ZodiacSign::Scorpio => "Scorpio",
            ZodiacSign::Sagittarius => "Sagittarius",
            ZodiacSign::Capricorn => "Capricorn",
            ZodiacSign::Aquarius => "Aquarius",
            ZodiacSign::Pisces => "Pisces",
        }
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum House {
    First = 1,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
    Eighth,
    Ninth,
    Tenth,
    Eleventh,
    Twelfth,
}

impl House {
    pub fn from_index(index: usize) -> Option<House> {
        match index {
            1 => Some(House::First),
            2 => Some(House::Second),
            3 => Some(House::Third),
            4 => Some(House::Fourth),
            5 => Some(House::Fifth),
            6 => Some(House::Sixth),
            7 => Some(House::Seventh),
            8 => Some(House::Eighth),
            9 => Some(House::Ninth),
            10 => Some(House::Tenth),
            11 => Some(House::Eleventh),
            12 => Some(House::Twelfth),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn all() -> impl Iterator<Item = House> {
        (1..=12).filter_map(House::from_index)
    }
}

/// The 27 lunar mansions, each spanning 360/27 degrees.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nakshatra {
    Ashwini = 0,
    Bharani,
    Krittika,
    Rohini,
    Mrigashira,
    Ardra,
    Punarvasu,
    Pushya,
    Ashlesha,
    Magha,
    PurvaPhalguni,
    UttaraPhalguni,
    Hasta,
    Chitra,
    Swati,
    Vishakha,
    Anuradha,
    Jyeshtha,
    Moola,
    PurvaAshadha,
    UttaraAshadha,
    Shravana,
    Dhanishta,
    Shatabhisha,
    PurvaBhadrapada,
    UttaraBhadrapada,
    Revati,
}

pub const NAKSHATRA_SPAN: f64 = 360.0 / 27.0;

impl Nakshatra {
    pub fn from_longitude(longitude: f64) -> Nakshatra {
        let normalized = longitude.rem_euclid(360.0);
        Self::from_index((normalized / NAKSHATRA_SPAN).floor() as usize % 27)
    }

    pub fn from_index(index: usize) -> Nakshatra {
        match index % 27 {
            0 => Nakshatra::Ashwini,
            1 => Nakshatra::Bharani,
            2 => Nakshatra::Krittika,
            3 => Nakshatra::Rohini,
            4 => Nakshatra::Mrigashira,
            5 => Nakshatra::Ardra,
            6 => Nakshatra::Punarvasu,
            7 => Nakshatra::Pushya,
            8 => Nakshatra::Ashlesha,
            9 => Nakshatra::Magha,
            10 => Nakshatra::PurvaPhalguni,
            11 => Nakshatra::UttaraPhalguni,
            12 => Nakshatra::Hasta,
            13 => Nakshatra::Chitra,
            14 => Nakshatra::Swati,
            15 => Nakshatra::Vishakha,
            16 => Nakshatra::Anuradha,
            17 => Nakshatra::Jyeshtha,
            18 => Nakshatra::Moola,
            19 => Nakshatra::PurvaAshadha,
            20 => Nakshatra::UttaraAshadha,
            21 => Nakshatra::Shravana,
            22 => Nakshatra::Dhanishta,
            23 => Nakshatra::Shatabhisha,
            24 => Nakshatra::PurvaBhadrapada,
            25 => Nakshatra::UttaraBhadrapada,
            _ => Nakshatra::Revati,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Vimshottari lord: the nine-lord sequence starting at Ketu repeats
    /// across the 27 nakshatras (Brihat Parashara Hora Shastra).
    pub fn vimshottari_lord(&self) -> CelestialBody {
        dasa::VIMSHOTTARI_ORDER[self.index() % dasa::VIMSHOTTARI_ORDER.len()]
    }
}

/// Chart layout style for rendering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartStyle {
    NorthIndian,
    SouthIndian,
}

// ---------------------------
// ## Structures
// ---------------------------

/// A body's sidereal ecliptic longitude, normalized to [0, 360).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPosition {
    pub body: CelestialBody,
    pub longitude: f64,
}

impl BodyPosition {
    pub fn new(body: CelestialBody, longitude: f64) -> Result<Self, AstrologyError> {
        Ok(BodyPosition {
            body,
            longitude: normalize_longitude(longitude)?,
        })
    }

    pub fn sign(&self) -> ZodiacSign {
        ZodiacSign::from_longitude(self.longitude)
    }

    pub fn degree_in_sign(&self) -> f64 {
        self.longitude.rem_euclid(30.0)
    }

    pub fn nakshatra(&self) -> Nakshatra {
        Nakshatra::from_longitude(self.longitude)
    }
}

/// A computed sidereal chart: the ascendant plus whatever body positions the
/// provider returned. Bodies may be absent; downstream rules treat absence as
/// a non-match, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub ascendant_longitude: f64,
    pub positions: BTreeMap<CelestialBody, BodyPosition>,
}

impl Chart {
    pub fn new(
        ascendant_longitude: f64,
        positions: impl IntoIterator<Item = (CelestialBody, f64)>,
    ) -> Result<Self, AstrologyError> {
        let ascendant_longitude = normalize_longitude(ascendant_longitude)?;
        let mut map = BTreeMap::new();
        for (body, longitude) in positions {
            map.insert(body, BodyPosition::new(body, longitude)?);
        }
        Ok(Chart {
            ascendant_longitude,
            positions: map,
        })
    }

    pub fn position(&self, body: CelestialBody) -> Option<&BodyPosition> {
        self.positions.get(&body)
    }

    pub fn ascendant_sign(&self) -> ZodiacSign {
        ZodiacSign::from_longitude(self.ascendant_longitude)
    }
}

/// Placement of one body in the whole-sign house system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousePlacement {
    pub body: CelestialBody,
    pub house: House,
    pub sign: ZodiacSign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthInfo {
    pub date_time: DateTime<Utc>,
    pub location: Location,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AstrologyError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AstrologyError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AstrologyError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }
        Ok(Location {
            latitude,
            longitude,
        })
    }

    pub fn delhi() -> Self {
        Location { latitude: 28.6139, longitude: 77.2090 }
    }
    pub fn chennai() -> Self {
        Location { latitude: 13.0827, longitude: 80.2707 }
    }
    pub fn kolkata() -> Self {
        Location { latitude: 22.5052, longitude: 87.3616 }
    }
    pub fn kozhikode() -> Self {
        Location { latitude: 11.2588, longitude: 75.7804 }
    }
}

/// Everything derived from one chart. Pure function of the chart and birth
/// instant: identical longitudes always yield identical output.
#[derive(Debug, Clone, Serialize)]
pub struct Horoscope {
    pub chart: Chart,
    pub placements: Vec<HousePlacement>,
    pub navamsa: BTreeMap<CelestialBody, ZodiacSign>,
    pub nakshatras: BTreeMap<CelestialBody, Nakshatra>,
    pub yogas: Vec<YogaMatch>,
    pub dasa: Option<DasaTimeline>,
}

impl Horoscope {
    pub fn from_chart(chart: Chart, birth: DateTime<Utc>) -> Self {
        let placements = houses::placements(&chart);
        let navamsa = chart
            .positions
            .values()
            .map(|p| (p.body, houses::navamsa_sign(p.longitude)))
            .collect();
        let nakshatras = chart
            .positions
            .values()
            .map(|p| (p.body, p.nakshatra()))
            .collect();
        let yogas = yogas::detect_yogas(&placements);
        let dasa = chart
            .position(CelestialBody::Moon)
            .map(|moon| dasa::vimshottari(moon.longitude, birth));
        Horoscope {
            chart,
            placements,
            navamsa,
            nakshatras,
            yogas,
            dasa,
        }
    }
}

/// Fetch positions from the provider and derive the full horoscope.
pub fn generate_horoscope(
    provider: &dyn PositionProvider,
    birth_info: &BirthInfo,
) -> Result<Horoscope, AstrologyError> {
    let chart = provider.get_positions(birth_info.date_time, birth_info.location)?;
    Ok(Horoscope::from_chart(chart, birth_info.date_time))
}

// ---------------------------
// ## Error Handling
// ---------------------------

#[derive(Debug, thiserror::Error)]
pub enum AstrologyError {
    #[error("Invalid Input: {0}")]
    InvalidInput(String),
    #[error("Ephemeris Error: {0}")]
    Ephemeris(String),
    #[error("Generation Error: {0}")]
    Generation(String),
}

/// Normalize an ecliptic longitude into [0, 360). Non-finite input is
/// rejected rather than wrapped.
pub fn normalize_longitude(longitude: f64) -> Result<f64, AstrologyError> {
    if !longitude.is_finite() {
        return Err(AstrologyError::InvalidInput(format!(
            "longitude {} is not a finite angle",
            longitude
        )));
    }
    Ok(longitude.rem_euclid(360.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_boundaries_are_inclusive_lower() {
        assert_eq!(ZodiacSign::from_longitude(0.0), ZodiacSign::Aries);
        assert_eq!(ZodiacSign::from_longitude(29.999), ZodiacSign::Aries);
        assert_eq!(ZodiacSign::from_longitude(30.0), ZodiacSign::Taurus);
        assert_eq!(ZodiacSign::from_longitude(359.999), ZodiacSign::Pisces);
        assert_eq!(ZodiacSign::from_longitude(360.0), ZodiacSign::Aries);
    }

    #[test]
    fn normalize_wraps_and_rejects_non_finite() {
        assert_eq!(normalize_longitude(370.0).unwrap(), 10.0);
        assert_eq!(normalize_longitude(-30.0).unwrap(), 330.0);
        assert!(matches!(
            normalize_longitude(f64::NAN),
            Err(AstrologyError::InvalidInput(_))
        ));
        assert!(matches!(
            normalize_longitude(f64::INFINITY),
            Err(AstrologyError::InvalidInput(_))
        ));
    }

    #[test]
    fn location_rejects_out_of_range() {
        assert!(Location::new(91.0, 0.0).is_err());
        assert!(Location::new(0.0, 181.0).is_err());
        assert!(Location::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn nakshatra_lords_repeat_in_vimshottari_order() {
        assert_eq!(Nakshatra::Ashwini.vimshottari_lord(), CelestialBody::Ketu);
        assert_eq!(Nakshatra::Bharani.vimshottari_lord(), CelestialBody::Venus);
        assert_eq!(Nakshatra::Krittika.vimshottari_lord(), CelestialBody::Sun);
        assert_eq!(Nakshatra::Magha.vimshottari_lord(), CelestialBody::Ketu);
        assert_eq!(Nakshatra::Revati.vimshottari_lord(), CelestialBody::Mercury);
    }

    #[test]
    fn horoscope_derivation_is_deterministic() {
        use chrono::TimeZone;
        let birth = Utc.with_ymd_and_hms(1996, 10, 15, 12, 25, 0).unwrap();
        let chart = || {
            Chart::new(
                15.0,
                [
                    (CelestialBody::Moon, 20.0),
                    (CelestialBody::Jupiter, 105.0),
                    (CelestialBody::Sun, 185.0),
                    (CelestialBody::Mercury, 190.0),
                ],
            )
            .unwrap()
        };
        let a = Horoscope::from_chart(chart(), birth);
        let b = Horoscope::from_chart(chart(), birth);
        assert_eq!(a.placements, b.placements);
        assert_eq!(a.yogas, b.yogas);
        assert_eq!(a.dasa, b.dasa);

        // Jupiter at 105 from an Aries ascendant sits in house 4; Sun and
        // Mercury share Libra, so Budhaditya matches.
        let jupiter = a
            .placements
            .iter()
            .find(|p| p.body == CelestialBody::Jupiter)
            .unwrap();
        assert_eq!(jupiter.house, House::Fourth);
        assert!(a.yogas.iter().any(|m| m.yoga == yogas::Yoga::Budhaditya));
        assert_eq!(a.dasa.as_ref().unwrap().current, CelestialBody::Venus);
    }

    #[test]
    fn chart_normalizes_positions() {
        let chart = Chart::new(375.0, [(CelestialBody::Sun, -10.0)]).unwrap();
        assert_eq!(chart.ascendant_longitude, 15.0);
        assert_eq!(
            chart.position(CelestialBody::Sun).unwrap().longitude,
            350.0
        );
        assert!(chart.position(CelestialBody::Moon).is_none());
    }
}
