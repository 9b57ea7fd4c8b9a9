//! Enrichment → normalized `Record` (C5). Ported from
//! `push_to_supabase.py::transform_article`: every enum field is validated
//! against a fixed whitelist and nulled rather than rejected, numeric
//! fields are coerced to non-negative integers, and the deterministic ID
//! is a truncated SHA-256 over the record's identity tuple.

pub mod categories;
pub mod city_coords;

use crate::core::sha256_hex_truncated;
use crate::enrich::types::Enrichment;
use crate::geocode::Precision;
use crate::scrape::Article;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One normalized row, in the shape persisted to the external store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    pub title: String,
    pub clean_title: Option<String>,
    pub summary: Option<String>,
    pub body: String,
    pub published_at: String,
    pub source_url: String,
    pub source_agency: Option<String>,
    pub location_text: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub precision: String,
    pub categories: Vec<String>,
    pub weapon_type: Option<String>,
    pub confidence: f32,
    pub incident_date: Option<String>,
    pub incident_time: Option<String>,
    pub incident_time_precision: Option<String>,
    pub incident_end_date: Option<String>,
    pub incident_end_time: Option<String>,
    pub crime_sub_type: Option<String>,
    pub crime_confidence: Option<f32>,
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
    pub incident_group_id: Option<String>,
    pub group_role: Option<String>,
    pub pipeline_run: String,
    pub classification: String,
}

/// Truncated SHA-256 of `url:published_at:location_text:pks_code:pipeline_run`
/// (§3). Stable across runs and platforms; the canonical upsert key.
pub fn make_id(url: &str, published_at: &str, location_text: &str, pks_code: &str, pipeline_run: &str) -> String {
    sha256_hex_truncated(&format!("{url}:{published_at}:{location_text}:{pks_code}:{pipeline_run}"), 16)
}

fn in_set<'a>(value: Option<&'a str>, set: &[&str]) -> Option<&'a str> {
    value.filter(|v| set.contains(v))
}

fn non_negative_i64(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v >= 0)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// `T00:00:00` for a missing time, `00:00` substituted for a literal
/// `"unknown"` time, matching `push_to_supabase.py::sanitize_timestamp`.
pub fn sanitize_timestamp(ts: Option<&str>) -> String {
    let ts = ts.unwrap_or("").trim();
    if ts.is_empty() {
        return "2026-01-01T00:00:00".to_string();
    }
    let mut ts = ts.to_string();
    if ts.contains("unknown") {
        ts = ts.replace("Tunknown:00", "T00:00:00").replace("unknown", "00:00");
    }
    if !ts.contains('T') {
        ts.push_str("T00:00:00");
    }
    ts
}

fn build_location_text(street: Option<&str>, house_number: Option<&str>, district: Option<&str>, city: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(street) = street.filter(|s| !s.trim().is_empty()) {
        match house_number.filter(|s| !s.trim().is_empty()) {
            Some(house) => parts.push(format!("{street} {house}")),
            None => parts.push(street.to_string()),
        }
    }
    if let Some(district) = district.filter(|s| !s.trim().is_empty()) {
        parts.push(district.to_string());
    }
    if let Some(city) = city.filter(|s| !s.trim().is_empty()) {
        parts.push(city.to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

const VALID_WEAPONS: &[&str] = &["knife", "gun", "blunt", "explosive", "vehicle", "none", "unknown"];
const VALID_DRUGS: &[&str] = &["cannabis", "cocaine", "amphetamine", "heroin", "ecstasy", "meth", "other"];
const VALID_GENDERS: &[&str] = &["male", "female", "unknown"];
const VALID_SEVERITIES: &[&str] = &["minor", "serious", "critical", "fatal", "property_only", "unknown"];
const VALID_MOTIVES: &[&str] = &["domestic", "robbery", "hate", "drugs", "road_rage", "dispute", "unknown"];
const VALID_DAMAGE_ESTIMATES: &[&str] = &["exact", "approximate", "unknown"];
const VALID_GROUP_ROLES: &[&str] = &["primary", "follow_up", "update", "resolution", "related"];

/// Transforms one enriched article (an `Article` whose `hints["enrichment"]`
/// holds one `Enrichment::Incident`, written by the enrichment engine) into
/// a `Record`. Returns `None` for non-incident enrichments (junk/feuerwehr/
/// update-only never reach this stage since they were already removed).
pub fn transform_article(article: &Article, pipeline_run: &str) -> Option<Record> {
    let enrichment: Enrichment = article
        .hints
        .get("enrichment")
        .and_then(|v| serde_json::from_value(v.clone()).ok())?;

    let Enrichment::Incident { clean_title, location, incident_time, crime, details, .. } = enrichment else {
        return None;
    };

    let weapon_type = in_set(details.weapon_type.as_deref(), VALID_WEAPONS).map(str::to_string);
    let drug_type = in_set(details.drug_type.as_deref(), VALID_DRUGS).map(str::to_string);
    let victim_count = non_negative_i64(details.victim_count);
    let suspect_count = non_negative_i64(details.suspect_count);
    let victim_age = non_empty(details.victim_age);
    let suspect_age = non_empty(details.suspect_age);
    let victim_gender = in_set(details.victim_gender.as_deref(), VALID_GENDERS).map(str::to_string);
    let suspect_gender = in_set(details.suspect_gender.as_deref(), VALID_GENDERS).map(str::to_string);
    let victim_herkunft = non_empty(details.victim_herkunft);
    let suspect_herkunft = non_empty(details.suspect_herkunft);
    let severity = in_set(details.severity.as_deref(), VALID_SEVERITIES).map(str::to_string);
    let motive = in_set(details.motive.as_deref(), VALID_MOTIVES).map(str::to_string);
    let damage_amount_eur = non_negative_i64(details.damage_amount_eur);
    let damage_estimate = in_set(details.damage_estimate.as_deref(), VALID_DAMAGE_ESTIMATES).map(str::to_string);

    // The record's own `published_at` is the article's scrape-time publish
    // date, never the LLM-extracted incident date — those are tracked
    // separately as `incident_date`/`incident_time` below. Using the
    // article's own date keeps the deterministic ID stable across re-runs
    // regardless of how the model's extraction varies.
    let published_at = sanitize_timestamp(Some(&article.published_at.to_rfc3339()));
    let incident_date = non_empty(incident_time.date.clone());
    let incident_time_str = non_empty(incident_time.time.clone());
    let incident_time_precision = Some(
        match incident_time.precision {
            crate::enrich::types::TimePrecision::Exact => "exact",
            crate::enrich::types::TimePrecision::Approximate => "approximate",
            crate::enrich::types::TimePrecision::Unknown => "unknown",
        }
        .to_string(),
    );

    let location_text = build_location_text(
        location.street.as_deref(),
        location.house_number.as_deref(),
        location.district.as_deref(),
        location.city.as_deref(),
    );

    let (latitude, longitude, precision) = resolve_coordinates(&location);

    let group_role = article
        .hints
        .get("group_role")
        .and_then(|v| v.as_str())
        .filter(|r| VALID_GROUP_ROLES.contains(r))
        .map(str::to_string);
    let incident_group_id =
        article.hints.get("incident_group_id").and_then(|v| v.as_str()).map(str::to_string);

    let pks_code = crime.pks_code.clone().unwrap_or_default();
    let categories = categories::map_category(crime.pks_code.as_deref(), crime.pks_category.as_deref(), &article.body);

    Some(Record {
        id: make_id(&article.url, &published_at, location_text.as_deref().unwrap_or(""), &pks_code, pipeline_run),
        title: article.title.clone(),
        clean_title: non_empty(clean_title),
        summary: None,
        body: article.body.clone(),
        published_at,
        source_url: article.url.clone(),
        source_agency: article.source.clone(),
        location_text,
        latitude,
        longitude,
        precision,
        categories,
        weapon_type,
        confidence: location.confidence,
        incident_date,
        incident_time: incident_time_str,
        incident_time_precision,
        incident_end_date: None,
        incident_end_time: None,
        crime_sub_type: non_empty(crime.sub_type.clone()),
        crime_confidence: Some(crime.confidence).filter(|c| (0.0..=1.0).contains(c)),
        drug_type,
        victim_count,
        suspect_count,
        victim_age,
        suspect_age,
        victim_gender,
        suspect_gender,
        victim_herkunft,
        suspect_herkunft,
        severity,
        motive,
        damage_amount_eur,
        damage_estimate,
        incident_group_id,
        group_role,
        pipeline_run: pipeline_run.to_string(),
        classification: "crime".to_string(),
    })
}

/// Prefers coordinates the geocoder already wrote onto the location; if
/// none are present, falls back to the built-in city centroid table rather
/// than dropping the record for want of coordinates (§C "City-coordinate
/// fallback table").
fn resolve_coordinates(location: &crate::enrich::types::Location) -> (Option<f64>, Option<f64>, String) {
    if location.lat.is_some() && location.lon.is_some() {
        return (location.lat, location.lon, location.precision.clone());
    }
    if let Some(city) = location.city.as_deref() {
        if let Some((lat, lon)) = city_coords::lookup_city_coords(city) {
            return (Some(lat), Some(lon), Precision::City.as_str().to_string());
        }
    }
    (None, None, Precision::None.as_str().to_string())
}

/// Deduplicates a batch of records by ID, keeping the first occurrence.
/// Defensive: true duplicates are rare but a multi-incident split can, in
/// principle, produce the same identity tuple twice.
pub fn dedupe_by_id(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    records.into_iter().filter(|r| seen.insert(r.id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::types::{CrimeClassification, IncidentDetails, IncidentTime, Location, TimePrecision};
    use chrono::{TimeZone, Utc};

    fn article_with_enrichment(city: &str, lat: Option<f64>, lon: Option<f64>) -> Article {
        let enrichment = Enrichment::Incident {
            clean_title: Some("Messerangriff in der Innenstadt".to_string()),
            location: Location {
                street: Some("Hauptstraße".to_string()),
                house_number: Some("12".to_string()),
                district: None,
                city: Some(city.to_string()),
                location_hint: None,
                cross_street: None,
                confidence: 0.9,
                lat,
                lon,
                precision: "rooftop".to_string(),
                bundesland: None,
            },
            incident_time: IncidentTime {
                date: Some("2026-01-05".to_string()),
                time: Some("23:15".to_string()),
                precision: TimePrecision::Exact,
            },
            crime: CrimeClassification {
                pks_code: Some("2200".to_string()),
                pks_category: None,
                sub_type: None,
                confidence: 0.9,
            },
            details: IncidentDetails { weapon_type: Some("knife".to_string()), ..Default::default() },
            is_update: false,
            update_type: None,
        };
        let mut hints = serde_json::Map::new();
        hints.insert("enrichment".to_string(), serde_json::to_value(&enrichment).unwrap());
        hints.insert("incident_group_id".to_string(), serde_json::Value::String("grp1".to_string()));
        hints.insert("group_role".to_string(), serde_json::Value::String("primary".to_string()));
        Article {
            title: "POL-F: Messerangriff in der Innenstadt".to_string(),
            body: "In der Hauptstraße 12 kam es zu einem Messerangriff.".to_string(),
            published_at: Utc::now(),
            city: Some(city.to_string()),
            state: "hessen".to_string(),
            source: Some("Polizei Frankfurt".to_string()),
            url: "https://x/1".to_string(),
            hints,
        }
    }

    #[test]
    fn transforms_incident_with_geocoded_coordinates() {
        let article = article_with_enrichment("Frankfurt am Main", Some(50.11), Some(8.68));
        let record = transform_article(&article, "default").unwrap();
        assert_eq!(record.latitude, Some(50.11));
        assert_eq!(record.weapon_type.as_deref(), Some("knife"));
        assert!(record.categories.contains(&"knife".to_string()));
        assert_eq!(record.incident_group_id.as_deref(), Some("grp1"));
    }

    #[test]
    fn falls_back_to_city_centroid_when_geocoder_found_nothing() {
        let article = article_with_enrichment("Mannheim", None, None);
        let record = transform_article(&article, "default").unwrap();
        assert_eq!(record.latitude, Some(49.4875));
        assert_eq!(record.precision, "city");
    }

    #[test]
    fn out_of_set_weapon_type_is_nulled_not_dropped() {
        let mut article = article_with_enrichment("Berlin", Some(52.5), Some(13.4));
        let mut enrichment: Enrichment =
            serde_json::from_value(article.hints["enrichment"].clone()).unwrap();
        if let Enrichment::Incident { details, .. } = &mut enrichment {
            details.weapon_type = Some("flamethrower".to_string());
        }
        article.hints.insert("enrichment".to_string(), serde_json::to_value(&enrichment).unwrap());
        let record = transform_article(&article, "default").unwrap();
        assert_eq!(record.weapon_type, None);
    }

    #[test]
    fn dedupe_keeps_first_occurrence_by_id() {
        let a = article_with_enrichment("Berlin", Some(52.5), Some(13.4));
        let r1 = transform_article(&a, "default").unwrap();
        let r2 = r1.clone();
        let deduped = dedupe_by_id(vec![r1, r2]);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn published_at_and_id_follow_article_date_not_incident_date() {
        let fixed_publish = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();

        let mut article_a = article_with_enrichment("Berlin", Some(52.5), Some(13.4));
        article_a.published_at = fixed_publish;

        let mut article_b = article_a.clone();
        // Same article, but the model extracted a different incident date
        // (e.g. a stale "Nachtrag" referencing an earlier event).
        let mut enrichment: Enrichment = serde_json::from_value(article_b.hints["enrichment"].clone()).unwrap();
        if let Enrichment::Incident { incident_time, .. } = &mut enrichment {
            incident_time.date = Some("2025-11-20".to_string());
        }
        article_b.hints.insert("enrichment".to_string(), serde_json::to_value(&enrichment).unwrap());

        let record_a = transform_article(&article_a, "default").unwrap();
        let record_b = transform_article(&article_b, "default").unwrap();

        assert_eq!(record_a.published_at, record_b.published_at);
        assert_eq!(record_a.id, record_b.id);
        assert!(record_a.published_at.starts_with("2026-02-01T08:00:00"));
        assert_eq!(record_b.incident_date.as_deref(), Some("2025-11-20"));
    }

    #[test]
    fn sanitize_timestamp_handles_missing_and_unknown() {
        assert_eq!(sanitize_timestamp(None), "2026-01-01T00:00:00");
        assert_eq!(sanitize_timestamp(Some("2026-03-01")), "2026-03-01T00:00:00");
    }
}
