//! polizei.berlin.de press release listing/article parsers. One of the
//! five dedicated state portals — presseportal's `/blaulicht/l/berlin`
//! endpoint returns unfiltered, all-German results, so Berlin is scraped
//! directly.

use super::{resolve_href, Article, ArticleParser, ListingEntry, ListingParser};
use chrono::{NaiveDate, TimeZone, Utc};
use scraper::{Html, Selector};

pub struct BerlinListingParser;

impl ListingParser for BerlinListingParser {
    fn listing_page_url(&self, page_index: u32) -> String {
        format!(
            "https://www.berlin.de/polizei/polizeimeldungen/index.php/index?page={}",
            page_index
        )
    }

    fn parse_listing(&self, html: &str) -> Vec<ListingEntry> {
        let document = Html::parse_document(html);
        let row_sel = Selector::parse("div.pressemitteilung").unwrap();
        let link_sel = Selector::parse("a").unwrap();
        let date_sel = Selector::parse(".datum").unwrap();

        document
            .select(&row_sel)
            .filter_map(|row| {
                let link = row.select(&link_sel).next()?;
                let href = link.value().attr("href")?;
                let url = resolve_href("https://www.berlin.de", href);
                let title = Some(link.text().collect::<String>().trim().to_string());
                let date = row
                    .select(&date_sel)
                    .next()
                    .and_then(|d| NaiveDate::parse_from_str(d.text().collect::<String>().trim(), "%d.%m.%Y").ok());
                Some(ListingEntry {
                    url,
                    title,
                    date,
                    city: Some("Berlin".to_string()),
                })
            })
            .collect()
    }
}

pub struct BerlinArticleParser;

impl ArticleParser for BerlinArticleParser {
    fn parse_article(&self, html: &str, url: &str, state: &str) -> Option<Article> {
        let document = Html::parse_document(html);
        let title_sel = Selector::parse("h1").ok()?;
        let body_sel = Selector::parse("div.textile").ok()?;
        let date_sel = Selector::parse(".datum").ok()?;

        let title = document.select(&title_sel).next()?.text().collect::<String>().trim().to_string();
        let body = document
            .select(&body_sel)
            .next()
            .map(|n| n.text().collect::<String>())
            .unwrap_or_default();
        if title.is_empty() || body.trim().is_empty() {
            return None;
        }

        let published_at = document
            .select(&date_sel)
            .next()
            .and_then(|d| NaiveDate::parse_from_str(d.text().collect::<String>().trim(), "%d.%m.%Y").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
            .unwrap_or_else(Utc::now);

        Some(Article {
            title,
            body: body.trim().to_string(),
            published_at,
            city: Some("Berlin".to_string()),
            state: state.to_string(),
            source: Some("Polizei Berlin".to_string()),
            url: url.to_string(),
            hints: serde_json::Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_page_url_is_zero_indexed_query_param() {
        let parser = BerlinListingParser;
        assert!(parser.listing_page_url(2).ends_with("page=2"));
    }
}
