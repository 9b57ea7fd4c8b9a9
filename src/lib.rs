//! German police press-release ingestion and enrichment pipeline: scrapes
//! all 16 Bundesländer's press portals, filters junk, classifies and
//! extracts structured incidents via an LLM, geocodes locations, and
//! normalizes the result into records ready for a public crime map.

pub mod core;
pub mod enrich;
pub mod filter;
pub mod geocode;
pub mod live;
pub mod manifest;
pub mod orchestrator;
pub mod scrape;
pub mod sink;
pub mod transform;
