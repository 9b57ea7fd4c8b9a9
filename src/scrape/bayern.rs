//! polizei.bayern.de press release listing/article parsers.

use super::{resolve_href, Article, ArticleParser, ListingEntry, ListingParser};
use chrono::{NaiveDate, Utc};
use scraper::{Html, Selector};

pub struct BayernListingParser;

impl ListingParser for BayernListingParser {
    fn listing_page_url(&self, page_index: u32) -> String {
        format!(
            "https://www.polizei.bayern.de/news/presse/aktuell/index.html/{}",
            page_index
        )
    }

    fn parse_listing(&self, html: &str) -> Vec<ListingEntry> {
        let document = Html::parse_document(html);
        let row_sel = Selector::parse("li.teaser").unwrap();
        let link_sel = Selector::parse("a").unwrap();
        let date_sel = Selector::parse(".teaser-date").unwrap();
        let city_sel = Selector::parse(".teaser-city").unwrap();

        document
            .select(&row_sel)
            .filter_map(|row| {
                let link = row.select(&link_sel).next()?;
                let href = link.value().attr("href")?;
                let url = resolve_href("https://www.polizei.bayern.de", href);
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

pub struct BayernArticleParser;

impl ArticleParser for BayernArticleParser {
    fn parse_article(&self, html: &str, url: &str, state: &str) -> Option<Article> {
        let document = Html::parse_document(html);
        let title_sel = Selector::parse("h1").ok()?;
        let body_sel = Selector::parse("div.content-text").ok()?;
        let date_sel = Selector::parse(".teaser-date").ok()?;
        let agency_sel = Selector::parse(".presse-dienststelle").ok()?;

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

        let source = document
            .select(&agency_sel)
            .next()
            .map(|n| n.text().collect::<String>().trim().to_string());

        Some(Article {
            title,
            body: body.trim().to_string(),
            published_at,
            city: None,
            state: state.to_string(),
            source,
            url: url.to_string(),
            hints: serde_json::Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_page_url_appends_page_segment() {
        assert!(BayernListingParser.listing_page_url(1).ends_with("/1"));
    }
}
