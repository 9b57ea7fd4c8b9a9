//! The sum-type shape for one LLM-extracted incident, replacing the
//! original's dict-with-optional-fields representation. Every serialized
//! form carries a `classification` discriminator so legacy cache entries
//! (a bare `{_classification, reason}` sentinel) remain readable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub location_hint: Option<String>,
    pub cross_street: Option<String>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default = "default_precision")]
    pub precision: String,
    #[serde(default)]
    pub bundesland: Option<String>,
}

fn default_precision() -> String {
    "none".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimePrecision {
    Exact,
    Approximate,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentTime {
    pub date: Option<String>,
    pub time: Option<String>,
    pub precision: TimePrecision,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrimeClassification {
    pub pks_code: Option<String>,
    pub pks_category: Option<String>,
    pub sub_type: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IncidentDetails {
    pub weapon_type: Option<String>,
    pub drug_type: Option<String>,
    pub victim_count: Option<i64>,
    pub suspect_count: Option<i64>,
    pub victim_age: Option<String>,
    pub suspect_age: Option<String>,
    pub victim_gender: Option<String>,
    pub suspect_gender: Option<String>,
    pub victim_herkunft: Option<String>,
    pub suspect_herkunft: Option<String>,
    pub severity: Option<String>,
    pub motive: Option<String>,
    pub damage_amount_eur: Option<i64>,
    pub damage_estimate: Option<String>,
}

/// One incident-level record extracted from an article by the model.
/// `Junk`/`Feuerwehr`/`UpdateOnly` carry only a reason; `Incident` carries
/// the full extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "classification", rename_all = "lowercase")]
pub enum Enrichment {
    Junk { reason: String },
    Feuerwehr { reason: String },
    #[serde(rename = "update")]
    UpdateOnly { reason: String, update_type: Option<String> },
    #[serde(rename = "crime")]
    Incident {
        clean_title: Option<String>,
        location: Location,
        incident_time: IncidentTime,
        crime: CrimeClassification,
        details: IncidentDetails,
        #[serde(default)]
        is_update: bool,
        #[serde(default)]
        update_type: Option<String>,
    },
}

impl Enrichment {
    pub fn is_removable(&self) -> bool {
        matches!(self, Enrichment::Junk { .. } | Enrichment::Feuerwehr { .. } | Enrichment::UpdateOnly { .. })
    }

    pub fn removal_reason(&self) -> Option<String> {
        match self {
            Enrichment::Junk { reason } => Some(format!("llm:junk:{reason}")),
            Enrichment::Feuerwehr { reason } => Some(format!("llm:feuerwehr:{reason}")),
            Enrichment::UpdateOnly { reason, .. } => Some(format!("llm:update:{reason}")),
            Enrichment::Incident { .. } => None,
        }
    }
}

/// One object as returned directly by the model, prior to being grouped by
/// `article_index` and converted into an `Enrichment`. Kept loosely typed
/// (`serde_json::Value` sub-objects) because the model is the authority on
/// shape and may omit fields the strict `Enrichment` schema requires.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLlmResult {
    pub article_index: i64,
    pub classification: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub update_type: Option<String>,
    #[serde(default)]
    pub is_update: bool,
    #[serde(default)]
    pub clean_title: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub incident_time: Option<IncidentTime>,
    #[serde(default)]
    pub crime: Option<CrimeClassification>,
    #[serde(default)]
    pub details: Option<IncidentDetails>,
}

/// What is actually stored under one cache key: either the legacy single-
/// element junk/feuerwehr sentinel, or a list of full incident enrichments.
/// Reads tolerate entries with no discriminator at all (pre-existing caches
/// written by the sentinel-list convention).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedEnrichment {
    Sentinel {
        #[serde(rename = "_classification")]
        classification: String,
        #[serde(default)]
        reason: String,
    },
    Incidents(Vec<Enrichment>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn junk_enrichment_round_trips_through_json() {
        let e = Enrichment::Junk { reason: "Verkehrshinweis".to_string() };
        let json = serde_json::to_string(&e).unwrap();
        let back: Enrichment = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn legacy_sentinel_without_discriminator_still_parses() {
        let raw = r#"{"_classification": "junk", "reason": "Verkehrshinweis"}"#;
        let cached: CachedEnrichment = serde_json::from_str(raw).unwrap();
        match cached {
            CachedEnrichment::Sentinel { classification, .. } => assert_eq!(classification, "junk"),
            _ => panic!("expected sentinel"),
        }
    }

    #[test]
    fn incident_list_parses_as_incidents_variant() {
        let raw = r#"[{
            "classification": "crime",
            "clean_title": "Messerangriff",
            "location": {"street": null, "house_number": null, "district": null, "city": "Mannheim", "location_hint": null, "cross_street": null, "confidence": 0.8, "precision": "none"},
            "incident_time": {"date": "2026-01-01", "time": "23:15", "precision": "exact"},
            "crime": {"pks_code": "2200", "pks_category": null, "sub_type": null, "confidence": 0.9},
            "details": {}
        }]"#;
        let cached: CachedEnrichment = serde_json::from_str(raw).unwrap();
        assert!(matches!(cached, CachedEnrichment::Incidents(v) if v.len() == 1));
    }
}
