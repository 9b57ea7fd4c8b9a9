//! Geocoding: canonical address construction, Germany bounding-box
//! validation, and precision mapping. Grounded in
//! `geocodify_geocoder.py`'s address-building and precision-choice
//! functions, adapted to the Google-style wire format this pipeline's
//! geocoding provider actually speaks (§6): `results[].geometry.location`.

pub mod cache;
pub mod client;

pub use cache::GeocodeCache;
pub use client::{GeocodeRequest, GeocodeResult, Geocoder};

/// Internal precision enum, independent of any one provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Rooftop,
    Range,
    Center,
    Approximate,
    City,
    OutsideGermany,
    Cached,
    None,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Rooftop => "rooftop",
            Precision::Range => "range",
            Precision::Center => "center",
            Precision::Approximate => "approximate",
            Precision::City => "city",
            Precision::OutsideGermany => "outside_germany",
            Precision::Cached => "cached",
            Precision::None => "none",
        }
    }

    /// Maps a Google-style `location_type` string to the internal enum.
    pub fn from_provider_location_type(location_type: &str) -> Precision {
        match location_type {
            "ROOFTOP" => Precision::Rooftop,
            "RANGE_INTERPOLATED" => Precision::Range,
            "GEOMETRIC_CENTER" => Precision::Center,
            "APPROXIMATE" => Precision::Approximate,
            _ => Precision::Approximate,
        }
    }

    /// Inverse of [`Precision::as_str`], for reading a persisted cache
    /// entry's precision label back into the enum.
    pub fn from_str(s: &str) -> Option<Precision> {
        match s {
            "rooftop" => Some(Precision::Rooftop),
            "range" => Some(Precision::Range),
            "center" => Some(Precision::Center),
            "approximate" => Some(Precision::Approximate),
            "city" => Some(Precision::City),
            "outside_germany" => Some(Precision::OutsideGermany),
            "cached" => Some(Precision::Cached),
            "none" => Some(Precision::None),
            _ => None,
        }
    }
}

/// Germany's bounding box, used to reject clearly-wrong geocodes (e.g. a
/// Swiss "Basel" misattributed to a German-sourced article).
pub const GERMANY_BBOX: (f64, f64, f64, f64) = (47.27, 55.06, 5.87, 15.04);

pub fn is_in_germany(lat: f64, lon: f64) -> bool {
    let (lat_min, lat_max, lon_min, lon_max) = GERMANY_BBOX;
    lat >= lat_min && lat <= lat_max && lon >= lon_min && lon <= lon_max
}

/// One location's addressable fields, as passed down from an `Enrichment`.
#[derive(Debug, Clone, Default)]
pub struct AddressParts<'a> {
    pub street: Option<&'a str>,
    pub house_number: Option<&'a str>,
    pub district: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: &'a str,
    pub location_hint: Option<&'a str>,
    pub cross_street: Option<&'a str>,
}

/// Builds a canonical address string, fixed precedence: cross-street beats
/// location-hint beats bare street, then district, city, state, Germany.
pub fn build_address(parts: &AddressParts, omit_street: bool) -> Option<String> {
    let mut components: Vec<String> = Vec::new();

    if !omit_street {
        if let Some(cross) = parts.cross_street.filter(|s| !s.trim().is_empty()) {
            if let Some(street) = parts.street.filter(|s| !s.trim().is_empty()) {
                components.push(format!("{street} / {cross}"));
            } else {
                components.push(cross.to_string());
            }
        } else if let Some(hint) = parts.location_hint.filter(|s| !s.trim().is_empty()) {
            components.push(hint.to_string());
        } else if let Some(street) = parts.street.filter(|s| !s.trim().is_empty()) {
            match parts.house_number.filter(|s| !s.trim().is_empty()) {
                Some(house) => components.push(format!("{street} {house}")),
                None => components.push(street.to_string()),
            }
        }
    }

    if let Some(district) = parts.district.filter(|s| !s.trim().is_empty()) {
        components.push(district.to_string());
    }
    if let Some(city) = parts.city.filter(|s| !s.trim().is_empty()) {
        components.push(city.to_string());
    }
    if components.is_empty() && parts.city.is_none() {
        return None;
    }
    components.push(parts.state.to_string());
    components.push("Germany".to_string());
    Some(components.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn germany_bbox_accepts_frankfurt_and_rejects_basel() {
        assert!(is_in_germany(50.1109, 8.6821));
        assert!(!is_in_germany(47.5596, 7.5886));
    }

    #[test]
    fn address_prefers_cross_street_over_location_hint_over_bare_street() {
        let parts = AddressParts {
            street: Some("Hauptstraße"),
            cross_street: Some("Bahnhofstraße"),
            location_hint: Some("Tankstelle"),
            city: Some("Mannheim"),
            state: "baden-wuerttemberg",
            ..Default::default()
        };
        let addr = build_address(&parts, false).unwrap();
        assert!(addr.starts_with("Hauptstraße / Bahnhofstraße"));
    }

    #[test]
    fn omit_street_drops_street_level_components() {
        let parts = AddressParts {
            street: Some("Hauptstraße"),
            city: Some("Mannheim"),
            state: "baden-wuerttemberg",
            ..Default::default()
        };
        let addr = build_address(&parts, true).unwrap();
        assert!(!addr.contains("Hauptstraße"));
        assert!(addr.contains("Mannheim"));
    }
}
