//! Builds the single unified classification+extraction prompt for one
//! batch of articles. Ported from `fast_enricher.py`'s `UNIFIED_PROMPT`;
//! the German rule text is the model's own instructions, not a docstring,
//! so it is kept verbatim rather than translated.

use crate::scrape::Article;
use serde::Serialize;
use serde_json::json;

const PROMPT_TEMPLATE: &str = r#"
Analysiere diese {count} deutschen Polizeipressemeldungen. Klassifiziere und extrahiere strukturierte Daten in EINEM Schritt.

=== REGEL 0: KLASSIFIKATION ===
Prüfe ZUERST ob der Artikel ein Straftatbericht ist:

KEIN Straftatbericht ("junk") — NUR diese Antwort zurückgeben:
  {{"article_index": N, "classification": "junk", "reason": "Verkehrshinweis/Bilanz/etc."}}

Feuerwehr ohne Polizeibezug ("feuerwehr") — NUR diese Antwort zurückgeben:
  {{"article_index": N, "classification": "feuerwehr", "reason": "Feuerwehreinsatz ohne Straftat"}}

IST ein Straftatbericht → vollständige Extraktion mit "classification": "crime".
Handelt es sich um einen Nachtrag/eine Korrektur zu einem bereits bekannten Vorfall ohne neue Fakten
→ "classification": "update" mit kurzem "reason", ohne location/crime falls nichts Neues vorliegt.

=== REGEL 1: MULTI-INCIDENT ERKENNUNG ===
Sammelartikel (mehrere POL-Header, "Weitere Meldungen:", mehrere Orte) MÜSSEN in mehrere Objekte
gesplittet werden, jeweils gebunden an denselben article_index.

=== REGEL 2: NUR DEUTSCHLAND ===
Alle Vorfälle sind in Deutschland. Nutze den Bundesland-Kontext der Quelle zur Disambiguation von
Grenzstädten (z.B. Freiburg-Quelle → NICHT Basel/Schweiz).

=== REGEL 3: TATZEIT ===
Extrahiere date (YYYY-MM-DD), time (HH:MM) und precision (exact/approximate/unknown). precision darf
nur "unknown" sein wenn wirklich keine Zeitangabe im Text vorkommt.

Für jeden Straftat-Vorfall:
1. STANDORT: street, house_number, district, city, location_hint, cross_street, confidence (0-1)
2. TATZEIT: date, time, precision
3. DELIKT (PKS): pks_code (4-stellig), pks_category, sub_type, confidence (0-1)
4. DETAILS: weapon_type, drug_type, victim_count, suspect_count, victim_age, suspect_age,
   victim_gender, suspect_gender, victim_herkunft, suspect_herkunft, severity, motive,
   damage_amount_eur, damage_estimate
5. TITEL: clean_title — kurzer sachlicher Titel ohne Polizeikürzel oder PM-Nummer.

Feldwerte (nur diese verwenden):
- weapon_type: knife|gun|blunt|explosive|vehicle|none|unknown
- drug_type: cannabis|cocaine|amphetamine|heroin|ecstasy|meth|other|null
- severity: minor|serious|critical|fatal|property_only|unknown
- motive: domestic|robbery|hate|drugs|road_rage|dispute|unknown|null
- victim_gender/suspect_gender: male|female|unknown|null
- damage_estimate: exact|approximate|unknown|null

ARTIKEL:
{articles_json}

Antworte NUR mit einem JSON-Array, ein Objekt pro Vorfall (mische junk/feuerwehr/update/crime).
"#;

#[derive(Serialize)]
struct ArticleForPrompt {
    index: usize,
    title: String,
    body: String,
    date: String,
    city: String,
    source: String,
}

/// Builds the prompt text for one batch. Titles are truncated to 200 chars
/// (matching the original); bodies are passed through in full.
pub fn build_batch_prompt(articles: &[Article]) -> String {
    let payload: Vec<ArticleForPrompt> = articles
        .iter()
        .enumerate()
        .map(|(index, art)| ArticleForPrompt {
            index,
            title: art.title.chars().take(200).collect(),
            body: art.body.clone(),
            date: art.published_at.to_rfc3339(),
            city: art.city.clone().unwrap_or_default(),
            source: art.source.clone().unwrap_or_default(),
        })
        .collect();

    let articles_json = serde_json::to_string_pretty(&json!(payload)).unwrap_or_else(|_| "[]".to_string());
    PROMPT_TEMPLATE
        .replace("{count}", &articles.len().to_string())
        .replace("{articles_json}", &articles_json)
}

/// Extracts the JSON array from a chat completion's text content,
/// tolerating a fenced ```json code block wrapper.
pub fn extract_json_array(text: &str) -> Option<String> {
    let mut text = text.trim();
    if let Some(idx) = text.find("```json") {
        text = &text[idx + "```json".len()..];
    }
    if let Some(idx) = text.find("```") {
        text = &text[..idx];
    }
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            body: "Test body".to_string(),
            published_at: Utc::now(),
            city: Some("Mannheim".to_string()),
            state: "baden-wuerttemberg".to_string(),
            source: Some("Polizei Mannheim".to_string()),
            url: "https://x/1".to_string(),
            hints: serde_json::Map::new(),
        }
    }

    #[test]
    fn prompt_embeds_article_count_and_json() {
        let prompt = build_batch_prompt(&[article("A"), article("B")]);
        assert!(prompt.contains("Analysiere diese 2"));
        assert!(prompt.contains("\"title\": \"A\""));
    }

    #[test]
    fn extracts_array_from_fenced_code_block() {
        let text = "Hier ist das Ergebnis:\n```json\n[{\"article_index\": 0}]\n```\n";
        let extracted = extract_json_array(text).unwrap();
        assert_eq!(extracted, "[{\"article_index\": 0}]");
    }

    #[test]
    fn extracts_bare_array_without_fencing() {
        let extracted = extract_json_array("[{\"a\":1}]").unwrap();
        assert_eq!(extracted, "[{\"a\":1}]");
    }
}
