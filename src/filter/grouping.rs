//! Deterministic-then-heuristic incident grouping, ported from
//! `filter_articles.py::group_incidents`. Assigns each kept article an
//! `incident_group_id` and a `group_role` so that follow-up reports and
//! near-duplicate bulletins about the same incident can be collapsed
//! downstream without ever discarding an article.

use crate::core::sha256_hex_truncated;
use crate::scrape::Article;
use chrono::Datelike;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Role an article plays within its incident group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    Primary,
    FollowUp,
    Update,
    Related,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Primary => "primary",
            GroupRole::FollowUp => "follow_up",
            GroupRole::Update => "update",
            GroupRole::Related => "related",
        }
    }
}

/// An article plus the incident-group assignment computed for it.
#[derive(Debug, Clone)]
pub struct GroupedArticle {
    pub article: Article,
    pub incident_group_id: String,
    pub group_role: GroupRole,
}

fn pm_nr_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*[-–]\s*PM\s+Nr\.?\s*(\d+)\s*$").unwrap())
}

fn follow_up_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        vec![
            Regex::new(r"(?i)^(Nachtrag|Folgemeldung|Korrekturmeldung|Korrektur|Update)\s*[\s:/-]+\s*").unwrap(),
            Regex::new(r"(?i)\s*[-–]\s*(Nachtrag|Folgemeldung|Update|Korrektur)\s*$").unwrap(),
            Regex::new(r"(?i)\(\s*(Nachtrag|Folgemeldung|Update|Korrektur)\s*\)").unwrap(),
        ]
    })
}

fn source_prefix_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{2,5}-[A-Z]{1,4}\s*:\s*").unwrap())
}

fn back_reference_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"presseportal\.de/blaulicht/pm/(\d+)/(\d+)").unwrap())
}

fn word_token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-zäöüß]{3,}").unwrap())
}

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            "der", "die", "das", "und", "in", "von", "zu", "den", "für", "mit", "auf", "im", "ist",
            "ein", "eine", "dem", "des", "am", "aus", "an", "bei", "nach", "pol", "polizei",
        ]
        .into_iter()
        .collect()
    })
}

fn strip_pm_nr(title: &str) -> (String, Option<String>) {
    match pm_nr_pattern().captures(title) {
        Some(caps) => {
            let m = caps.get(0).unwrap();
            (title[..m.start()].trim().to_string(), Some(caps[1].to_string()))
        }
        None => (title.to_string(), None),
    }
}

/// Returns `(is_follow_up, base_title_with_follow_up_marker_stripped)`.
fn is_follow_up(title: &str) -> (bool, String) {
    for pattern in follow_up_patterns() {
        if pattern.is_match(title) {
            return (true, pattern.replace(title, "").trim().to_string());
        }
    }
    (false, title.to_string())
}

fn extract_back_references(body: &str) -> Vec<String> {
    back_reference_pattern()
        .captures_iter(body)
        .map(|c| format!("https://www.presseportal.de/blaulicht/pm/{}/{}", &c[1], &c[2]))
        .collect()
}

fn clean_title(title: &str) -> String {
    source_prefix_pattern().replace(title, "").trim().to_lowercase()
}

fn word_tokens(text: &str) -> HashSet<String> {
    let stop = stopwords();
    word_token_pattern()
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|w| !stop.contains(w.as_str()))
        .collect()
}

fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn make_group_id(key: &str) -> String {
    sha256_hex_truncated(key, 12)
}

/// Assigns `incident_group_id`/`group_role` to every article in `articles`,
/// via the three-tier scheme: deterministic PM-Nr./follow-up/back-reference
/// linking, then a heuristic Jaccard-similarity pass bucketed by
/// (source, city, ISO week) within a 7-day window, then a solo fallback for
/// anything still ungrouped.
pub fn group_incidents(articles: Vec<Article>) -> Vec<GroupedArticle> {
    let n = articles.len();
    let mut group_ids: Vec<Option<String>> = vec![None; n];
    let mut group_roles: Vec<GroupRole> = vec![GroupRole::Primary; n];

    let url_to_idx: HashMap<&str, usize> =
        articles.iter().enumerate().map(|(i, a)| (a.url.as_str(), i)).collect();

    // Tier 1a: PM-Nr. series, same (source, base_title) -> same group.
    let mut pm_groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, art) in articles.iter().enumerate() {
        let (base_title, pm_nr) = strip_pm_nr(&art.title);
        if pm_nr.is_some() {
            let source = art.source.clone().unwrap_or_default();
            pm_groups.entry(format!("{source}|{base_title}")).or_default().push(i);
        }
    }
    for (key, indices) in pm_groups.iter() {
        if indices.len() > 1 {
            let gid = make_group_id(&format!("pm:{key}"));
            for (j, &idx) in indices.iter().enumerate() {
                group_ids[idx] = Some(gid.clone());
                group_roles[idx] = if j == 0 { GroupRole::Primary } else { GroupRole::Update };
            }
        }
    }

    // Tier 1b: Nachtrag/Folgemeldung/Korrektur/Update -> link to parent by stripped title.
    let mut title_to_idx: HashMap<String, usize> = HashMap::new();
    for (i, art) in articles.iter().enumerate() {
        title_to_idx.insert(clean_title(&art.title), i);
    }
    for i in 0..n {
        let (is_fu, base) = is_follow_up(&articles[i].title);
        if !is_fu {
            continue;
        }
        let clean_base = clean_title(&base);
        if let Some(&parent_idx) = title_to_idx.get(&clean_base) {
            if parent_idx != i {
                let gid = match &group_ids[parent_idx] {
                    Some(g) => g.clone(),
                    None => {
                        let gid = make_group_id(&format!("fu:{}", articles[parent_idx].url));
                        group_ids[parent_idx] = Some(gid.clone());
                        gid
                    }
                };
                group_ids[i] = Some(gid);
                group_roles[i] = GroupRole::FollowUp;
            }
        }
    }

    // Tier 1c: body back-references to other articles in this batch.
    for i in 0..n {
        let refs = extract_back_references(&articles[i].body);
        for ref_url in refs {
            if let Some(&parent_idx) = url_to_idx.get(ref_url.as_str()) {
                if parent_idx != i {
                    let gid = match &group_ids[parent_idx] {
                        Some(g) => g.clone(),
                        None => {
                            let gid = make_group_id(&format!("ref:{ref_url}"));
                            group_ids[parent_idx] = Some(gid.clone());
                            gid
                        }
                    };
                    group_ids[i] = Some(gid);
                    group_roles[i] = GroupRole::FollowUp;
                }
            }
        }
    }

    // Tier 2: heuristic Jaccard match within (source, city, ISO week) buckets.
    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
    for i in 0..n {
        if group_ids[i].is_some() {
            continue;
        }
        let art = &articles[i];
        let source = art.source.clone().unwrap_or_default();
        let city = art.city.clone().unwrap_or_default();
        if source.trim().is_empty() || city.trim().is_empty() {
            continue;
        }
        let iso = art.published_at.iso_week();
        let week_key = format!("{}-W{:02}", iso.year(), iso.week());
        buckets.entry(format!("{source}|{city}|{week_key}")).or_default().push(i);
    }

    let mut tier2_pairs: Vec<(usize, usize)> = Vec::new();
    for indices in buckets.values() {
        if indices.len() < 2 {
            continue;
        }
        let mut tokens_cache: HashMap<usize, HashSet<String>> = HashMap::new();
        for a_pos in 0..indices.len() {
            let idx_a = indices[a_pos];
            tokens_cache.entry(idx_a).or_insert_with(|| word_tokens(&articles[idx_a].title));
            for &idx_b in indices.iter().skip(a_pos + 1) {
                tokens_cache.entry(idx_b).or_insert_with(|| word_tokens(&articles[idx_b].title));
                let sim = jaccard_similarity(&tokens_cache[&idx_a], &tokens_cache[&idx_b]);
                if sim >= 0.5 {
                    let delta = (articles[idx_a].published_at - articles[idx_b].published_at)
                        .num_days()
                        .abs();
                    if delta <= 7 {
                        tier2_pairs.push((idx_a, idx_b));
                    }
                }
            }
        }
    }

    for (idx_a, idx_b) in tier2_pairs {
        match (group_ids[idx_a].clone(), group_ids[idx_b].clone()) {
            (Some(g), None) => {
                group_ids[idx_b] = Some(g);
                group_roles[idx_b] = GroupRole::Related;
            }
            (None, Some(g)) => {
                group_ids[idx_a] = Some(g);
                group_roles[idx_a] = GroupRole::Related;
            }
            (None, None) => {
                let gid = make_group_id(&format!("t2:{}:{}", articles[idx_a].url, articles[idx_b].url));
                group_ids[idx_a] = Some(gid.clone());
                group_ids[idx_b] = Some(gid);
                if articles[idx_b].published_at < articles[idx_a].published_at {
                    group_roles[idx_a] = GroupRole::Related;
                } else {
                    group_roles[idx_b] = GroupRole::Related;
                }
            }
            (Some(_), Some(_)) => {}
        }
    }

    // Tier 3 (solo fallback): anything still ungrouped gets its own group.
    for i in 0..n {
        if group_ids[i].is_none() {
            group_ids[i] = Some(make_group_id(&format!("solo:{}", articles[i].url)));
        }
    }

    articles
        .into_iter()
        .zip(group_ids.into_iter())
        .zip(group_roles.into_iter())
        .map(|((article, gid), role)| GroupedArticle {
            article,
            incident_group_id: gid.unwrap(),
            group_role: role,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(title: &str, url: &str, source: &str, city: &str, days_offset: i64, body: &str) -> Article {
        Article {
            title: title.to_string(),
            body: body.to_string(),
            published_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::days(days_offset),
            city: Some(city.to_string()),
            state: "berlin".to_string(),
            source: Some(source.to_string()),
            url: url.to_string(),
            hints: serde_json::Map::new(),
        }
    }

    #[test]
    fn pm_nr_series_collapses_into_one_group_with_update_role() {
        let articles = vec![
            article("Raub in der Innenstadt - PM Nr. 1", "https://x/1", "POL-B", "Berlin", 0, ""),
            article("Raub in der Innenstadt - PM Nr. 2", "https://x/2", "POL-B", "Berlin", 0, ""),
        ];
        let grouped = group_incidents(articles);
        assert_eq!(grouped[0].incident_group_id, grouped[1].incident_group_id);
        assert_eq!(grouped[0].group_role.as_str(), "primary");
        assert_eq!(grouped[1].group_role.as_str(), "update");
    }

    #[test]
    fn nachtrag_links_to_parent_by_title() {
        let articles = vec![
            article("POL-B: Schwerer Unfall auf der A100", "https://x/1", "POL-B", "Berlin", 0, ""),
            article("Nachtrag: Schwerer Unfall auf der A100", "https://x/2", "POL-B", "Berlin", 1, ""),
        ];
        let grouped = group_incidents(articles);
        assert_eq!(grouped[0].incident_group_id, grouped[1].incident_group_id);
        assert_eq!(grouped[1].group_role.as_str(), "follow_up");
    }

    #[test]
    fn back_reference_links_articles() {
        let articles = vec![
            article("POL-B: Einbruch in Tempelhof", "https://www.presseportal.de/blaulicht/pm/12/345", "POL-B", "Berlin", 0, ""),
            article(
                "POL-B: Festnahme nach Einbruch",
                "https://x/2",
                "POL-B",
                "Berlin",
                1,
                "Wie bereits berichtet (https://www.presseportal.de/blaulicht/pm/12/345), ...",
            ),
        ];
        let grouped = group_incidents(articles);
        assert_eq!(grouped[0].incident_group_id, grouped[1].incident_group_id);
        assert_eq!(grouped[1].group_role.as_str(), "follow_up");
    }

    #[test]
    fn unrelated_articles_get_distinct_solo_groups() {
        let articles = vec![
            article("POL-B: Raub in Mitte", "https://x/1", "POL-B", "Berlin", 0, ""),
            article("POL-HH: Brand in Altona", "https://x/2", "POL-HH", "Hamburg", 0, ""),
        ];
        let grouped = group_incidents(articles);
        assert_ne!(grouped[0].incident_group_id, grouped[1].incident_group_id);
        assert_eq!(grouped[0].group_role.as_str(), "primary");
        assert_eq!(grouped[1].group_role.as_str(), "primary");
    }

    #[test]
    fn similar_titles_in_same_bucket_are_related() {
        let articles = vec![
            article(
                "Verkehrsunfall mit schwerverletzter Radfahrerin in Spandau",
                "https://x/1",
                "POL-B",
                "Berlin",
                0,
                "",
            ),
            article(
                "Schwerverletzte Radfahrerin nach Verkehrsunfall in Spandau",
                "https://x/2",
                "POL-B",
                "Berlin",
                1,
                "",
            ),
        ];
        let grouped = group_incidents(articles);
        assert_eq!(grouped[0].incident_group_id, grouped[1].incident_group_id);
        assert!(grouped[0].group_role.as_str() == "related" || grouped[1].group_role.as_str() == "related");
    }
}
