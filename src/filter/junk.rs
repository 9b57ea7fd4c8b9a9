//! Cheap, rule-based junk removal, applied before any LLM call. Ported
//! from the regex families in the original `filter_articles.py`: a fixed
//! set of junk-title patterns, a smaller set of junk-body patterns checked
//! only over the first 500 characters, a feuerwehr source/title filter,
//! and a deliberately conservative missing-person detector.

use regex::Regex;
use std::sync::OnceLock;

macro_rules! static_regex {
    ($name:ident, $re:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($re).unwrap())
        }
    };
}

macro_rules! static_regex_list {
    ($name:ident, [$($re:expr),+ $(,)?]) => {
        fn $name() -> &'static [Regex] {
            static RES: OnceLock<Vec<Regex>> = OnceLock::new();
            RES.get_or_init(|| vec![$(Regex::new($re).unwrap()),+])
        }
    };
}

// Titles that are never crime reports: traffic advisories, statistical
// round-ups, speed-trap announcements, career days, press-office opening
// hours, public events and the like.
static_regex_list!(junk_title_patterns, [
    r"(?i)Verkehrshinweis",
    r"(?i)Erreichbarkeit der Polizeipressestelle",
    r"(?i)Mobil im Alter",
    r"(?i)Kontrollaktion(en)?",
    r"(?i)Warnmeldung.*Gewitter",
    r"(?i)Silvester.*Bilanz",
    r"(?i)Spendenaufruf",
    r"(?i)Polizei informiert über",
    r"(?i)Tag der offenen Tür",
    r"(?i)Blitzerstandorte",
    r"(?i)Blitzermeldung",
    r"(?i)Geschwindigkeitskontrollstellen",
    r"(?i)Versammlungsgeschehen",
    r"(?i)Einsatz der Bundespolizei.*Fußballspiel",
    r"(?i)Save the date",
    r"(?i)Presseeinladung",
    r"(?i)Präventionsveranstaltung",
    r"(?i)Internationaler Zolltag",
    r"(?i)Karriere beim ZOLL|Berufseinsteiger|Berufsinformationstag",
    r"(?i)Weltverbrauchertag|Tag der Kinderhospizarbeit",
]);

// Checked only over an article body's first 500 characters: cancellation
// of a prior missing-person alert, generic press-office hours boilerplate,
// routine speed-check announcements.
static_regex_list!(junk_body_patterns, [
    r"(?i)Geschwindigkeitskontrolle.*Messstelle",
    r"(?i)Die Pressestelle.*ist.*erreichbar",
    r"(?i)(Rücknahme|Widerruf|Erledigung).*(Vermisstenfahndung|Vermisstenmeldung|Öffentlichkeitsfahndung)",
]);

static_regex!(feuerwehr_pattern, r"(?i)Feuerwehr|^FW[ -]|Berufsfeuerwehr|Freiwillige Feuerwehr");
static_regex!(missing_person_core_pattern, r"(?i)vermisst|Vermisste[rn]?|Vermisstenfahndung|Vermisstensuche");
static_regex!(missing_person_explicit_pattern, r"(?i)Öffentlichkeitsfahndung nach.*Vermisst");
static_regex!(public_search_pattern, r"(?i)Öffentlichkeitsfahndung");
static_regex!(missing_person_strong_pattern, r"(?i)\d{1,3}[- ]?jährige[rn]?.*(vermisst|wird gesucht)");
static_regex!(
    missing_person_crime_context_pattern,
    r"(?i)raub|mord|tötungsdelikt|einbruch|betrug|landfriedensbruch|brandstiftung|körperverletzung|tatverdächtig|schwerer bandendiebstahl"
);

/// Why an article was removed before reaching the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JunkReason {
    FeuerwehrSource,
    FeuerwehrTitle,
    JunkTitle(String),
    JunkBody(String),
    MissingPersonBulletin,
}

impl JunkReason {
    pub fn as_tag(&self) -> String {
        match self {
            JunkReason::FeuerwehrSource => "feuerwehr_source".to_string(),
            JunkReason::FeuerwehrTitle => "feuerwehr_title".to_string(),
            JunkReason::JunkTitle(pattern) => format!("junk_title:{pattern}"),
            JunkReason::JunkBody(pattern) => format!("junk_body:{pattern}"),
            JunkReason::MissingPersonBulletin => "missing_person_bulletin".to_string(),
        }
    }
}

/// Conservative: the title must contain a missing-person lexeme AND not
/// contain any crime-context lexeme, so that crime-related public appeals
/// for a missing/wanted person are never dropped.
fn is_missing_person_bulletin(title: &str) -> bool {
    if !missing_person_core_pattern().is_match(title) {
        return false;
    }
    if title.contains(';') {
        return false;
    }
    if public_search_pattern().is_match(title) && !missing_person_explicit_pattern().is_match(title) {
        return false;
    }
    if missing_person_crime_context_pattern().is_match(title) {
        return false;
    }
    missing_person_strong_pattern().is_match(title) || missing_person_explicit_pattern().is_match(title)
}

/// Classifies one article as junk, in priority order: feuerwehr (source
/// then title prefix), missing-person, title patterns, body patterns over
/// the first 500 characters. Returns `None` if the article survives.
pub fn classify_junk(source: Option<&str>, title: &str, body: &str) -> Option<JunkReason> {
    if let Some(s) = source {
        if feuerwehr_pattern().is_match(s) {
            return Some(JunkReason::FeuerwehrSource);
        }
    }
    if feuerwehr_pattern().is_match(title) {
        return Some(JunkReason::FeuerwehrTitle);
    }

    if is_missing_person_bulletin(title) {
        return Some(JunkReason::MissingPersonBulletin);
    }

    for (idx, pattern) in junk_title_patterns().iter().enumerate() {
        if pattern.is_match(title) {
            return Some(JunkReason::JunkTitle(format!("pattern_{idx}")));
        }
    }

    let body_prefix: String = body.chars().take(500).collect();
    for (idx, pattern) in junk_body_patterns().iter().enumerate() {
        if pattern.is_match(&body_prefix) {
            return Some(JunkReason::JunkBody(format!("pattern_{idx}")));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feuerwehr_source_drops_before_anything_else() {
        let reason = classify_junk(Some("Feuerwehr Bremerhaven"), "FW-Bremerhaven: Wohnungsbrand", "Einsatzbericht");
        assert_eq!(reason, Some(JunkReason::FeuerwehrSource));
    }

    #[test]
    fn demo_bilanz_title_is_junk() {
        let reason = classify_junk(Some("Polizei Hamburg"), "POL-HH: Demo-Abschlussmeldung Bilanz zur Versammlung", "");
        assert!(matches!(reason, Some(JunkReason::JunkTitle(_))));
    }

    #[test]
    fn stabbing_report_is_not_junk() {
        let reason = classify_junk(
            Some("Polizei Frankfurt"),
            "Messerstecherei in der Hauptstraße",
            "Am gestrigen Abend kam es in der Hauptstraße 12 in Frankfurt (Main) gegen 23:15 Uhr zu einer Auseinandersetzung mit Stichwaffe.",
        );
        assert_eq!(reason, None);
    }

    #[test]
    fn missing_person_bulletin_is_conservative() {
        // Public search appeal tied to a crime stays (not classified as junk).
        let reason = classify_junk(
            Some("Polizei Köln"),
            "Öffentlichkeitsfahndung nach Raub: Vermisste Zeugin gesucht",
            "",
        );
        assert_eq!(reason, None);

        // A bare "X-jährige vermisst" bulletin with no crime context is junk.
        let reason = classify_junk(Some("Polizei Köln"), "23-jährige Frau aus Köln vermisst", "");
        assert_eq!(reason, Some(JunkReason::MissingPersonBulletin));
    }
}
