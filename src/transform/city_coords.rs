//! Built-in German city centroid table, used only as a last resort when the
//! geocoder (§4.4) returns nothing for a bare city name. Ported from
//! `transform_to_crimes.py::GERMAN_CITY_COORDS`. A hit here always carries
//! `Precision::City` — it is a coarse fallback, not a real geocode.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn table() -> &'static HashMap<&'static str, (f64, f64)> {
    static TABLE: OnceLock<HashMap<&'static str, (f64, f64)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("Berlin", (52.52, 13.405)),
            ("Hamburg", (53.5511, 9.9937)),
            ("München", (48.1351, 11.582)),
            ("Köln", (50.9375, 6.9603)),
            ("Frankfurt", (50.1109, 8.6821)),
            ("Frankfurt am Main", (50.1109, 8.6821)),
            ("Stuttgart", (48.7758, 9.1829)),
            ("Düsseldorf", (51.2277, 6.7735)),
            ("Dortmund", (51.5136, 7.4653)),
            ("Essen", (51.4556, 7.0116)),
            ("Leipzig", (51.3397, 12.3731)),
            ("Bremen", (53.0793, 8.8017)),
            ("Dresden", (51.0504, 13.7373)),
            ("Hannover", (52.3759, 9.732)),
            ("Nürnberg", (49.4521, 11.0767)),
            ("Duisburg", (51.4344, 6.7623)),
            ("Bochum", (51.4818, 7.2162)),
            ("Wuppertal", (51.2562, 7.1508)),
            ("Bielefeld", (52.0302, 8.5325)),
            ("Bonn", (50.7374, 7.0982)),
            ("Münster", (51.9607, 7.6261)),
            ("Karlsruhe", (49.0069, 8.4037)),
            ("Mannheim", (49.4875, 8.466)),
            ("Augsburg", (48.3705, 10.8978)),
            ("Wiesbaden", (50.0782, 8.2398)),
            ("Mönchengladbach", (51.1805, 6.4428)),
            ("Gelsenkirchen", (51.5177, 7.0857)),
            ("Braunschweig", (52.2689, 10.5268)),
            ("Aachen", (50.7753, 6.0839)),
            ("Kiel", (54.3233, 10.1228)),
            ("Chemnitz", (50.8278, 12.9214)),
            ("Halle", (51.4969, 11.9688)),
            ("Magdeburg", (52.1205, 11.6276)),
            ("Freiburg", (47.999, 7.8421)),
            ("Krefeld", (51.3388, 6.5853)),
            ("Mainz", (49.9929, 8.2473)),
            ("Lübeck", (53.8655, 10.6866)),
            ("Erfurt", (50.9848, 11.0299)),
            ("Oberhausen", (51.4963, 6.8637)),
            ("Rostock", (54.0924, 12.0991)),
            ("Kassel", (51.3127, 9.4797)),
            ("Hagen", (51.3671, 7.4633)),
            ("Potsdam", (52.3906, 13.0645)),
            ("Saarbrücken", (49.2402, 6.9969)),
            ("Hamm", (51.6739, 7.8159)),
            ("Ludwigshafen", (49.4774, 8.4452)),
            ("Oldenburg", (53.1435, 8.2146)),
            ("Osnabrück", (52.2799, 8.0472)),
            ("Leverkusen", (51.0459, 6.9844)),
            ("Heidelberg", (49.3988, 8.6724)),
            ("Darmstadt", (49.8728, 8.6512)),
            ("Regensburg", (49.0134, 12.1016)),
            ("Würzburg", (49.7913, 9.9534)),
            ("Göttingen", (51.5413, 9.9158)),
            ("Wolfsburg", (52.4227, 10.7865)),
            ("Heilbronn", (49.1427, 9.2109)),
            ("Ulm", (48.4011, 9.9876)),
            ("Pforzheim", (48.8922, 8.6947)),
            ("Offenbach", (50.0956, 8.7761)),
            ("Ingolstadt", (48.7665, 11.4258)),
            ("Reutlingen", (48.4914, 9.2043)),
            ("Koblenz", (50.3569, 7.5889)),
            ("Trier", (49.7596, 6.6439)),
            ("Kaiserslautern", (49.4401, 7.7491)),
        ])
    })
}

fn paren_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(.*?\)\s*").unwrap())
}

fn slash_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*/\s*.*$").unwrap())
}

/// Strips a parenthetical qualifier and anything after a `/`, e.g.
/// `"Frankfurt (Main)"` -> `"Frankfurt"`, `"Görlitz / Zgorzelec"` -> `"Görlitz"`.
pub fn normalize_city(name: &str) -> String {
    let without_paren = paren_pattern().replace_all(name, " ");
    let without_slash = slash_pattern().replace_all(without_paren.trim(), "");
    without_slash.trim().to_string()
}

/// Last-resort centroid lookup: exact, then case-insensitive, then
/// substring match in either direction.
pub fn lookup_city_coords(city: &str) -> Option<(f64, f64)> {
    if city.trim().is_empty() {
        return None;
    }
    let normalized = normalize_city(city);
    if let Some(coords) = table().get(normalized.as_str()) {
        return Some(*coords);
    }

    let lower = normalized.to_lowercase();
    for (name, coords) in table() {
        if name.to_lowercase() == lower {
            return Some(*coords);
        }
    }
    for (name, coords) in table() {
        let name_lower = name.to_lowercase();
        if name_lower.contains(&lower) || lower.contains(&name_lower) {
            return Some(*coords);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_returns_coordinates() {
        assert_eq!(lookup_city_coords("Mannheim"), Some((49.4875, 8.466)));
    }

    #[test]
    fn parenthetical_qualifier_is_stripped() {
        assert_eq!(lookup_city_coords("Frankfurt (Main)"), Some((50.1109, 8.6821)));
    }

    #[test]
    fn unknown_city_returns_none() {
        assert_eq!(lookup_city_coords("Nirgendwo-an-der-Ecke"), None);
    }
}
