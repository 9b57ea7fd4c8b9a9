//! PKS code → crime category mapping, German-category fallback, and the
//! knife-crime keyword overlay. Ported from `push_to_supabase.py`'s later,
//! richer `PKS_TO_CATEGORY`/`GERMAN_TO_CATEGORY` tables (not the earlier
//! six-category set in `transform_to_crimes.py`).

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn pks_to_category() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        HashMap::from([
            ("0100", "murder"),
            ("0200", "murder"),
            ("2110", "murder"),
            ("2100", "robbery"),
            ("2200", "assault"),
            ("2340", "assault"),
            ("1100", "sexual"),
            ("1110", "sexual"),
            ("1300", "sexual"),
            ("3000", "burglary"),
            ("4000", "burglary"),
            ("4350", "burglary"),
            ("4780", "burglary"),
            ("5100", "fraud"),
            ("6740", "arson"),
            ("6750", "vandalism"),
            ("7100", "traffic"),
            ("7200", "traffic"),
            ("7300", "traffic"),
            ("8910", "drugs"),
            ("6200", "assault"),
            ("7400", "traffic"),
            ("8990", "other"),
        ])
    })
}

fn german_to_category() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        HashMap::from([
            ("Mord", "murder"),
            ("Tötungsdelikt", "murder"),
            ("Raub", "robbery"),
            ("Körperverletzung", "assault"),
            ("Bedrohung", "assault"),
            ("Sexualdelikt", "sexual"),
            ("Diebstahl", "burglary"),
            ("Wohnungseinbruch", "burglary"),
            ("Kfz-Diebstahl", "burglary"),
            ("Betrug", "fraud"),
            ("Brandstiftung", "arson"),
            ("Sachbeschädigung", "vandalism"),
            ("Verkehrsunfall", "traffic"),
            ("Fahrerflucht", "traffic"),
            ("Trunkenheit", "traffic"),
            ("Drogen", "drugs"),
            ("Vermisst", "missing_person"),
            ("Versammlung", "other"),
            ("Verkehrskontrolle", "traffic"),
            ("Sonstige", "other"),
        ])
    })
}

fn knife_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bmesser\b|\bmesserattacke\b|\bmesserstich\b|\bgestochen\b|\bstichverletzung\b|\bstichwaffe\b").unwrap()
    })
}

pub fn detect_knife_crime(body: &str) -> bool {
    knife_pattern().is_match(body)
}

/// Maps a PKS code/category pair to category tags, trying the code first,
/// then the German category name, defaulting to `other`; unions in `knife`
/// when the body mentions knife-crime keywords regardless of PKS mapping.
pub fn map_category(pks_code: Option<&str>, pks_category: Option<&str>, body: &str) -> Vec<String> {
    let mut categories = Vec::new();

    if detect_knife_crime(body) {
        categories.push("knife".to_string());
    }

    let base = pks_code
        .and_then(|code| pks_to_category().get(code).copied())
        .or_else(|| pks_category.and_then(|cat| german_to_category().get(cat).copied()))
        .unwrap_or("other");

    if !categories.contains(&base.to_string()) {
        categories.push(base.to_string());
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pks_code_2200_maps_to_assault() {
        assert_eq!(map_category(Some("2200"), None, "ganz normaler text"), vec!["assault"]);
    }

    #[test]
    fn unmapped_code_falls_back_to_other() {
        assert_eq!(map_category(Some("9999"), None, "text"), vec!["other"]);
    }

    #[test]
    fn knife_keyword_is_unioned_with_base_category() {
        let cats = map_category(Some("2200"), None, "Der Taeter stach mit einem Messer zu");
        assert_eq!(cats, vec!["knife".to_string(), "assault".to_string()]);
    }

    #[test]
    fn german_category_fallback_used_when_no_pks_code() {
        assert_eq!(map_category(None, Some("Raub"), "text"), vec!["robbery"]);
    }
}
