//! Rule-based junk removal and incident grouping, run between scrape and
//! enrich. Nothing in this module calls an LLM; it only decides what never
//! needs to reach one and how surviving articles relate to each other.

pub mod grouping;
pub mod junk;

pub use grouping::{group_incidents, GroupRole, GroupedArticle};
pub use junk::{classify_junk, JunkReason};

use crate::scrape::Article;
use tracing::info;

/// Outcome of running the full filter stage over one batch of scraped
/// articles: survivors carry their incident-group assignment, and every
/// removal is tagged with its reason for the audit log.
pub struct FilterResult {
    pub kept: Vec<GroupedArticle>,
    pub removed: Vec<(Article, JunkReason)>,
}

/// Runs junk removal followed by incident grouping over one batch.
pub fn filter_articles(articles: Vec<Article>) -> FilterResult {
    let total = articles.len();
    let mut kept = Vec::new();
    let mut removed = Vec::new();

    for article in articles {
        match classify_junk(article.source.as_deref(), &article.title, &article.body) {
            Some(reason) => removed.push((article, reason)),
            None => kept.push(article),
        }
    }

    info!(total, kept = kept.len(), removed = removed.len(), "junk filter complete");

    let grouped = group_incidents(kept);
    let multi_group_count = {
        use std::collections::HashMap;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for g in &grouped {
            *counts.entry(g.incident_group_id.as_str()).or_insert(0) += 1;
        }
        counts.values().filter(|&&c| c > 1).count()
    };
    info!(groups = multi_group_count, "incident grouping complete");

    FilterResult { kept: grouped, removed }
}

/// Flattens grouping assignments back onto each `Article`'s `hints` map so
/// downstream stages that only know about plain articles (the enrichment
/// engine) still carry `incident_group_id`/`group_role` through to
/// transform.
pub fn embed_group_hints(grouped: Vec<GroupedArticle>) -> Vec<Article> {
    grouped
        .into_iter()
        .map(|g| {
            let mut article = g.article;
            article.hints.insert(
                "incident_group_id".to_string(),
                serde_json::Value::String(g.incident_group_id),
            );
            article.hints.insert(
                "group_role".to_string(),
                serde_json::Value::String(g.group_role.as_str().to_string()),
            );
            article
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn embed_group_hints_round_trips_id_and_role() {
        let article = Article {
            title: "x".to_string(),
            body: "y".to_string(),
            published_at: Utc::now(),
            city: None,
            state: "berlin".to_string(),
            source: None,
            url: "https://x/1".to_string(),
            hints: serde_json::Map::new(),
        };
        let grouped = GroupedArticle {
            article,
            incident_group_id: "abc123".to_string(),
            group_role: GroupRole::Primary,
        };
        let articles = embed_group_hints(vec![grouped]);
        assert_eq!(articles[0].hints["incident_group_id"], "abc123");
        assert_eq!(articles[0].hints["group_role"], "primary");
    }
}
