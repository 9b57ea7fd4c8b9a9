//! C1: scraper framework. A scraper is a producer of [`Article`] values for
//! one source over a `[start, end]` date range, built on a shared async
//! contract: a semaphore-bounded fetcher with a retry ladder, a persistent
//! URL cache consulted before yielding any URL, and two pure per-site hooks
//! (`parse_listing`, `parse_article`).

pub mod bayern;
pub mod berlin;
pub mod brandenburg;
pub mod fetcher;
pub mod presseportal;
pub mod sachsen;
pub mod sachsen_anhalt;
pub mod url_cache;

pub use fetcher::Fetcher;
pub use url_cache::UrlCache;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A raw article as produced by a scraper. Immutable once created; `url`
/// uniquely identifies a source article across all scrapers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
    pub city: Option<String>,
    pub state: String,
    pub source: Option<String>,
    pub url: String,
    /// Free-form scraper-specific hints consumed downstream (e.g. an
    /// agency code a site encodes in its listing rows). Kept as a JSON map
    /// so site scrapers don't need to touch this struct's shape.
    #[serde(default)]
    pub hints: serde_json::Map<String, serde_json::Value>,
}

/// One entry discovered on a listing page, before the article body is
/// fetched.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub url: String,
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub city: Option<String>,
}

/// Parses a listing (index) page into a list of candidate entries. Entries
/// are expected newest-first; the framework relies on this ordering for
/// early-stop.
pub trait ListingParser: Send + Sync {
    fn parse_listing(&self, html: &str) -> Vec<ListingEntry>;
    /// Builds the URL for page `page_index` (0-based) of the listing.
    fn listing_page_url(&self, page_index: u32) -> String;
}

/// Parses one article page into a structured [`Article`], or `None` if the
/// page doesn't contain a recognizable press release (parse error: logged
/// and skipped, never fatal).
pub trait ArticleParser: Send + Sync {
    fn parse_article(&self, html: &str, url: &str, state: &str) -> Option<Article>;
}

/// Resolves a listing row's `href` against the page it was found on, so a
/// site-relative link (`/blaulicht/...`) becomes an absolute URL while an
/// already-absolute one passes through untouched.
pub fn resolve_href(base: &str, href: &str) -> String {
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_string(),
    }
}

/// A feuerwehr (fire brigade) source/title filter shared by every scraper,
/// applied before an article is even handed to the pre-filter stage so the
/// framework-level `feuerwehr_dropped` counter (kept for parity with the
/// original counters, see SPEC_FULL.md / DESIGN.md open question) reflects
/// scraper-level drops distinctly from the pre-filter's own feuerwehr rule.
pub fn is_feuerwehr_source(source: Option<&str>, title: &str) -> bool {
    let fw = regex::Regex::new(r"(?i)feuerwehr|^FW[ -]|Berufsfeuerwehr|Freiwillige Feuerwehr").unwrap();
    if let Some(s) = source {
        if fw.is_match(s) {
            return true;
        }
    }
    fw.is_match(title)
}

/// Sidecar written alongside every chunk's raw article file, carrying
/// scraper-level counts and the reason discovery stopped.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScrapeMeta {
    pub source: String,
    pub pages_fetched: u32,
    pub listing_errors: u32,
    pub articles_found: usize,
    pub articles_cached_skip: usize,
    pub feuerwehr_dropped: usize,
    pub stop_reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ScrapeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ScrapeWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Drives discovery → parse → emit for one source: paginates the listing,
/// filters by date window and feuerwehr source/title, fetches and parses
/// each new article, and records it in the URL cache only after a
/// successful parse (at-least-once semantics on crash).
pub struct ScraperFramework<L: ListingParser, A: ArticleParser> {
    pub source: String,
    pub state: String,
    pub listing: L,
    pub article: A,
    pub fetcher: Fetcher,
    pub url_cache: UrlCache,
    /// Consecutive empty/failed listing pages before discovery halts.
    pub max_empty_pages: u32,
}

impl<L: ListingParser, A: ArticleParser> ScraperFramework<L, A> {
    pub async fn run(
        &mut self,
        window: ScrapeWindow,
        shutdown: &crate::core::ShutdownToken,
    ) -> (Vec<Article>, ScrapeMeta) {
        let mut articles = Vec::new();
        let mut meta = ScrapeMeta {
            source: self.source.clone(),
            ..Default::default()
        };
        let mut empty_pages = 0u32;
        let mut page_index = 0u32;

        loop {
            if shutdown.is_requested() {
                meta.stop_reason = "shutdown".to_string();
                break;
            }
            if empty_pages >= self.max_empty_pages {
                meta.stop_reason = "max_empty_pages".to_string();
                break;
            }

            let listing_url = self.listing.listing_page_url(page_index);
            let html = match self.fetcher.fetch(&listing_url).await {
                Ok(Some(html)) => html,
                Ok(None) => {
                    empty_pages += 1;
                    meta.listing_errors += 1;
                    page_index += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(url = %listing_url, error = %e, "listing fetch failed");
                    empty_pages += 1;
                    meta.listing_errors += 1;
                    page_index += 1;
                    continue;
                }
            };
            meta.pages_fetched += 1;

            let entries = self.listing.parse_listing(&html);
            if entries.is_empty() {
                empty_pages += 1;
                page_index += 1;
                continue;
            }

            // Early stop: the listing is newest-first; if every entry on
            // this page predates the window start, discovery halts.
            let all_too_old = entries
                .iter()
                .all(|e| e.date.map(|d| d < window.start).unwrap_or(false));
            if all_too_old {
                meta.stop_reason = "before_window_start".to_string();
                break;
            }

            let mut saw_new = false;
            for entry in &entries {
                if let Some(d) = entry.date {
                    if !window.contains(d) {
                        continue;
                    }
                }
                if self.url_cache.contains(&entry.url) {
                    meta.articles_cached_skip += 1;
                    continue;
                }
                if let Some(title) = &entry.title {
                    if is_feuerwehr_source(None, title) {
                        meta.feuerwehr_dropped += 1;
                        continue;
                    }
                }

                saw_new = true;
                match self.fetcher.fetch(&entry.url).await {
                    Ok(Some(article_html)) => {
                        match self.article.parse_article(&article_html, &entry.url, &self.state) {
                            Some(article) => {
                                if is_feuerwehr_source(article.source.as_deref(), &article.title) {
                                    meta.feuerwehr_dropped += 1;
                                } else {
                                    self.url_cache.record(&article.url);
                                    meta.articles_found += 1;
                                    articles.push(article);
                                }
                            }
                            None => {
                                tracing::warn!(url = %entry.url, "article parse returned no structured data");
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::warn!(url = %entry.url, "article fetch returned empty body");
                    }
                    Err(e) => {
                        tracing::warn!(url = %entry.url, error = %e, "article fetch failed");
                    }
                }

                if shutdown.is_requested() {
                    meta.stop_reason = "shutdown".to_string();
                    self.url_cache.flush();
                    return (articles, meta);
                }
            }

            if !saw_new {
                empty_pages += 1;
            } else {
                empty_pages = 0;
            }
            page_index += 1;
        }

        self.url_cache.flush();
        (articles, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_href_joins_relative_links_and_passes_through_absolute_ones() {
        let base = "https://www.presseportal.de/blaulicht/l/hessen";
        assert_eq!(
            resolve_href(base, "/blaulicht/pm/1234/5678"),
            "https://www.presseportal.de/blaulicht/pm/1234/5678"
        );
        assert_eq!(
            resolve_href(base, "https://other.example/x"),
            "https://other.example/x"
        );
    }

    #[test]
    fn feuerwehr_source_is_detected_by_source_or_fw_prefix() {
        assert!(is_feuerwehr_source(Some("Feuerwehr Bremerhaven"), "Einsatzbericht"));
        assert!(is_feuerwehr_source(None, "FW-Bremerhaven: Wohnungsbrand"));
        assert!(!is_feuerwehr_source(Some("Polizei Frankfurt"), "Messerstecherei in Bahnhofsnähe"));
    }

    #[test]
    fn scrape_window_contains_is_inclusive() {
        let window = ScrapeWindow {
            start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        };
        assert!(window.contains(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
        assert!(window.contains(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));
    }
}
