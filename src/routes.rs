//! API route handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::collection::{CardRepository, SortOrder};
use crate::config::AppConfig;
use crate::scraper::{self, CardRecord, PageCache, RateLimiter};
use crate::types::{
    AddCardRequest, AddCardResponse, CollectionResponse, ErrorResponse, HealthResponse,
    ListParams, TagRequest,
};

/// Application state shared across handlers.
pub struct AppState {
    pub repo: Mutex<CardRepository>,
    pub config: AppConfig,
    pub cache: PageCache,
    pub limiter: RateLimiter,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    /// The upstream card page could not be fetched.
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Scrape a card page without storing anything.
pub async fn lookup_card(
    State(state): State<Arc<AppState>>,
    Path(cert_number): Path<String>,
) -> Result<Json<CardRecord>, ApiError> {
    let cert_number = cert_number.trim().to_string();
    if cert_number.is_empty() {
        return Err(ApiError::bad_request("cert_number must not be empty"));
    }

    let record = scrape(&state, &cert_number)
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Failed to fetch card page: {}", e)))?;
    Ok(Json(record))
}

/// Scrape a card and add it to a user's collection.
///
/// A failed fetch still adds the record: the deterministic image and source
/// links always hold, and the response marks the card as not scraped so the
/// client can tell "incomplete data" from "page parsed but empty".
pub async fn add_card(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Json(req): Json<AddCardRequest>,
) -> Result<(StatusCode, Json<AddCardResponse>), ApiError> {
    let cert_number = req.cert_number.trim().to_string();
    if cert_number.is_empty() {
        return Err(ApiError::bad_request("cert_number must not be empty"));
    }

    {
        let repo = state.repo.lock().await;
        if repo
            .get_card(&username, &cert_number)
            .map_err(|e| ApiError::internal(e.to_string()))?
            .is_some()
        {
            return Err(ApiError::conflict("Card already in collection"));
        }
    }

    let (record, scraped) = match scrape(&state, &cert_number).await {
        Ok(record) => (record, true),
        Err(e) => {
            tracing::warn!(%cert_number, "scrape failed, storing placeholder: {}", e);
            (CardRecord::stub(&cert_number), false)
        }
    };

    let repo = state.repo.lock().await;
    let inserted = repo
        .add_card(&username, &record)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !inserted {
        return Err(ApiError::conflict("Card already in collection"));
    }

    Ok((StatusCode::CREATED, Json(AddCardResponse { card: record, scraped })))
}

/// Remove a card from a user's collection.
pub async fn remove_card(
    State(state): State<Arc<AppState>>,
    Path((username, cert_number)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let repo = state.repo.lock().await;
    let removed = repo
        .remove_card(&username, cert_number.trim())
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Card not found"))
    }
}

/// Users owning at least one card.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let repo = state.repo.lock().await;
    let users = repo
        .usernames()
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(users))
}

/// A user's collection, optionally filtered by tag and sorted.
pub async fn get_collection(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<CollectionResponse>, ApiError> {
    let repo = state.repo.lock().await;
    let sort = SortOrder::from_query(params.sort_by.as_deref());
    let cards = repo
        .list_cards(&username, params.tag.as_deref(), sort)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let grade_counts = repo
        .grade_counts(&username)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let all_tags = repo
        .all_tags(&username)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    // Totals describe the whole collection, not the filtered view.
    let total_cards = grade_counts.values().map(|&n| n as usize).sum();

    Ok(Json(CollectionResponse {
        username,
        total_cards,
        grade_counts,
        all_tags,
        cards,
    }))
}

/// Attach a tag to a stored card.
pub async fn add_tag(
    State(state): State<Arc<AppState>>,
    Path((username, cert_number)): Path<(String, String)>,
    Json(req): Json<TagRequest>,
) -> Result<StatusCode, ApiError> {
    if req.tag.trim().is_empty() {
        return Err(ApiError::bad_request("tag must not be empty"));
    }

    let repo = state.repo.lock().await;
    if repo
        .get_card(&username, cert_number.trim())
        .map_err(|e| ApiError::internal(e.to_string()))?
        .is_none()
    {
        return Err(ApiError::not_found("Card not found"));
    }

    let added = repo
        .add_tag(&username, cert_number.trim(), &req.tag)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if added {
        Ok(StatusCode::CREATED)
    } else {
        Err(ApiError::conflict("Tag already exists on this card"))
    }
}

/// Detach a tag from a stored card.
pub async fn remove_tag(
    State(state): State<Arc<AppState>>,
    Path((username, cert_number, tag)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let repo = state.repo.lock().await;
    let removed = repo
        .remove_tag(&username, cert_number.trim(), &tag)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Tag not found on this card"))
    }
}

async fn scrape(state: &AppState, cert_number: &str) -> anyhow::Result<CardRecord> {
    scraper::scrape_card(
        &state.config.fetcher,
        &state.cache,
        &state.limiter,
        cert_number,
    )
    .await
}
