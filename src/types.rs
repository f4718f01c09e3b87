//! Request and response types for the Slabfolio API.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::scraper::CardRecord;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Body of `POST /collection/:username/cards`
#[derive(Debug, Deserialize)]
pub struct AddCardRequest {
    pub cert_number: String,
}

/// Result of an add: the stored record, and whether the page scrape
/// actually succeeded. `scraped: false` means the fetch failed and the
/// deterministic placeholder was stored instead.
#[derive(Debug, Serialize)]
pub struct AddCardResponse {
    pub card: CardRecord,
    pub scraped: bool,
}

/// A user's collection with its summary numbers
#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub username: String,
    pub total_cards: usize,
    pub grade_counts: BTreeMap<String, u32>,
    pub all_tags: BTreeSet<String>,
    pub cards: Vec<CardRecord>,
}

/// Query parameters of `GET /collection/:username`
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub tag: Option<String>,
    pub sort_by: Option<String>,
}

/// Body of `POST /collection/:username/cards/:cert_number/tags`
#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}
