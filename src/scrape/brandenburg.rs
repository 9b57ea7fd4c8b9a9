//! polizei.brandenburg.de press release listing/article parsers.

use super::{resolve_href, Article, ArticleParser, ListingEntry, ListingParser};
use chrono::{NaiveDate, Utc};
use scraper::{Html, Selector};

pub struct BrandenburgListingParser;

impl ListingParser for BrandenburgListingParser {
    fn listing_page_url(&self, page_index: u32) -> String {
        format!(
            "https://polizei.brandenburg.de/pressemeldungen?page={}",
            page_index
        )
    }

    fn parse_listing(&self, html: &str) -> Vec<ListingEntry> {
        let document = Html::parse_document(html);
        let row_sel = Selector::parse("div.views-row").unwrap();
        let link_sel = Selector::parse("a").unwrap();
        let date_sel = Selector::parse("span.date-display-single").unwrap();

        document
            .select(&row_sel)
            .filter_map(|row| {
                let link = row.select(&link_sel).next()?;
                let href = link.value().attr("href")?;
                let url = resolve_href("https://polizei.brandenburg.de", href);
                let title = Some(link.text().collect::<String>().trim().to_string());
                let date = row
                    .select(&date_sel)
                    .next()
                    .and_then(|d| d.value().attr("content"))
                    .and_then(|d| NaiveDate::parse_from_str(&d[..10.min(d.len())], "%Y-%m-%d").ok());
                Some(ListingEntry { url, title, date, city: None })
            })
            .collect()
    }
}

pub struct BrandenburgArticleParser;

impl ArticleParser for BrandenburgArticleParser {
    fn parse_article(&self, html: &str, url: &str, state: &str) -> Option<Article> {
        let document = Html::parse_document(html);
        let title_sel = Selector::parse("h1").ok()?;
        let body_sel = Selector::parse("div.field-name-body").ok()?;
        let date_sel = Selector::parse("span.date-display-single").ok()?;

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
            .and_then(|d| d.value().attr("content"))
            .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let city = title.split(':').nth(1).map(|s| s.trim().split(',').next().unwrap_or("").to_string());

        Some(Article {
            title,
            body: body.trim().to_string(),
            published_at,
            city: city.filter(|c| !c.is_empty()),
            state: state.to_string(),
            source: Some("Polizei Brandenburg".to_string()),
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
        assert!(BrandenburgListingParser.listing_page_url(3).ends_with("page=3"));
    }
}
