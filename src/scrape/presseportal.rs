//! presseportal.de "Blaulicht" listing/article parsers — the central
//! portal source, used for every Bundesland except the five dedicated
//! state portals (see [`crate::core::config::DEDICATED_SCRAPER_STATES`]).

use super::{resolve_href, Article, ArticleParser, ListingEntry, ListingParser};
use chrono::{NaiveDate, TimeZone, Utc};
use scraper::{Html, Selector};

pub struct PresseportalListingParser {
    pub state_slug: String,
}

impl ListingParser for PresseportalListingParser {
    fn listing_page_url(&self, page_index: u32) -> String {
        format!(
            "https://www.presseportal.de/blaulicht/l/{}?page={}",
            self.state_slug,
            page_index + 1
        )
    }

    fn parse_listing(&self, html: &str) -> Vec<ListingEntry> {
        let document = Html::parse_document(html);
        let row_sel = Selector::parse("article.news").unwrap();
        let link_sel = Selector::parse("a.title-link").unwrap();
        let date_sel = Selector::parse("time").unwrap();
        let city_sel = Selector::parse(".city").unwrap();

        let mut entries = Vec::new();
        for row in document.select(&row_sel) {
            let link = match row.select(&link_sel).next() {
                Some(l) => l,
                None => continue,
            };
            let href = match link.value().attr("href") {
                Some(h) => h,
                None => continue,
            };
            let url = resolve_href("https://www.presseportal.de", href);
            let title = Some(link.text().collect::<String>().trim().to_string());
            let date = row
                .select(&date_sel)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .and_then(|d| NaiveDate::parse_from_str(&d[..10.min(d.len())], "%Y-%m-%d").ok());
            let city = row
                .select(&city_sel)
                .next()
                .map(|c| c.text().collect::<String>().trim().to_string());

            entries.push(ListingEntry { url, title, date, city });
        }
        entries
    }
}

pub struct PresseportalArticleParser;

impl ArticleParser for PresseportalArticleParser {
    fn parse_article(&self, html: &str, url: &str, state: &str) -> Option<Article> {
        let document = Html::parse_document(html);
        let title_sel = Selector::parse("h1").ok()?;
        let body_sel = Selector::parse(".story-text").ok()?;
        let time_sel = Selector::parse("time").ok()?;
        let agency_sel = Selector::parse(".sender-info .company").ok()?;

        let title = document
            .select(&title_sel)
            .next()?
            .text()
            .collect::<String>()
            .trim()
            .to_string();
        let body = document
            .select(&body_sel)
            .next()
            .map(|n| n.text().collect::<String>())
            .unwrap_or_default();
        if title.is_empty() || body.trim().is_empty() {
            return None;
        }

        let published_at = document
            .select(&time_sel)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let source = document
            .select(&agency_sel)
            .next()
            .map(|n| n.text().collect::<String>().trim().to_string());

        let city = extract_city_from_title(&title);

        Some(Article {
            title,
            body: body.trim().to_string(),
            published_at,
            city,
            state: state.to_string(),
            source,
            url: url.to_string(),
            hints: serde_json::Map::new(),
        })
    }
}

/// presseportal titles conventionally read "POL-<AGENCY>: <headline>,
/// <City>": pull a best-effort city hint out of the headline for callers
/// that want one before the LLM extracts a precise location.
fn extract_city_from_title(title: &str) -> Option<String> {
    title
        .rsplit_once(',')
        .map(|(_, tail)| tail.trim().trim_end_matches('.').to_string())
        .filter(|s| !s.is_empty() && s.len() < 40)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_page_url_is_one_indexed() {
        let parser = PresseportalListingParser {
            state_slug: "hessen".to_string(),
        };
        assert_eq!(
            parser.listing_page_url(0),
            "https://www.presseportal.de/blaulicht/l/hessen?page=1"
        );
    }

    #[test]
    fn extracts_trailing_city_hint_from_title() {
        assert_eq!(
            extract_city_from_title("POL-F: Einbruch in Wohnung, Frankfurt"),
            Some("Frankfurt".to_string())
        );
        assert_eq!(extract_city_from_title("POL-F: Pressemitteilung ohne Komma"), None);
    }
}
