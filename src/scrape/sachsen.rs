//! polizei.sachsen.de press release listing/article parsers.

use super::{resolve_href, Article, ArticleParser, ListingEntry, ListingParser};
use chrono::{NaiveDate, Utc};
use scraper::{Html, Selector};

pub struct SachsenListingParser;

impl ListingParser for SachsenListingParser {
    fn listing_page_url(&self, page_index: u32) -> String {
        format!(
            "https://www.polizei.sachsen.de/de/presse.aspx?page={}",
            page_index
        )
    }

    fn parse_listing(&self, html: &str) -> Vec<ListingEntry> {
        let document = Html::parse_document(html);
        let row_sel = Selector::parse("div.presse-listitem").unwrap();
        let link_sel = Selector::parse("a").unwrap();
        let date_sel = Selector::parse(".presse-datum").unwrap();
        let city_sel = Selector::parse(".presse-ort").unwrap();

        document
            .select(&row_sel)
            .filter_map(|row| {
                let link = row.select(&link_sel).next()?;
                let href = link.value().attr("href")?;
                let url = resolve_href("https://www.polizei.sachsen.de", href);
                let title = Some(link.text().collect::<String>().trim().to_string());
                let date = row
                    .select(&date_sel)
                    .next()
                    .and_then(|d| NaiveDate::parse_from_str(d.text().collect::<String>().trim(), "%d.%m.%Y").ok());
                let city = row.select(&city_sel).next().map(|c| c.text().collect::<String>().trim().to_string());
                Some(ListingEntry { url, title, date, city })
            })
            .collect()
    }
}

pub struct SachsenArticleParser;

impl ArticleParser for SachsenArticleParser {
    fn parse_article(&self, html: &str, url: &str, state: &str) -> Option<Article> {
        let document = Html::parse_document(html);
        let title_sel = Selector::parse("h1").ok()?;
        let body_sel = Selector::parse("div.presse-volltext").ok()?;
        let date_sel = Selector::parse(".presse-datum").ok()?;

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
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);

        Some(Article {
            title,
            body: body.trim().to_string(),
            published_at,
            city: None,
            state: state.to_string(),
            source: Some("Polizei Sachsen".to_string()),
            url: url.to_string(),
            hints: serde_json::Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_page_url_has_page_query() {
        assert!(SachsenListingParser.listing_page_url(4).ends_with("page=4"));
    }
}
