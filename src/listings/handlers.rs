use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateListingRequest, ListingQuery, UpdateListingRequest},
    repo_types::{Listing, ListingFields},
    services,
};
use crate::{
    auth::{dto::MessageResponse, AuthUser},
    error::{AppError, AppResult},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/listing/get", get(search_listings))
        .route("/listing/get/:id", get(get_listing))
        .route("/listings", get(search_listings))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/listing/create", post(create_listing))
        .route("/listing/update/:id", post(update_listing))
        .route("/listing/delete/:id", delete(delete_listing))
}

#[instrument(skip(state, payload))]
pub async fn create_listing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Json(payload), _): WithRejection<Json<CreateListingRequest>, AppError>,
) -> AppResult<(StatusCode, HeaderMap, Json<Listing>)> {
    if let Some(user_ref) = payload.user_ref.filter(|r| *r != user_id) {
        warn!(%user_ref, %user_id, "ignoring client-supplied userRef");
    }
    let fields = ListingFields::try_from(payload)?;
    let listing = services::create(state.users.as_ref(), state.listings.as_ref(), user_id, fields).await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/api/listing/get/{}", listing.id))
        .map_err(|e| AppError::Persistence(e.into()))?;
    headers.insert(header::LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(listing)))
}

#[instrument(skip(state))]
pub async fn get_listing(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Listing>> {
    let listing = services::get(state.listings.as_ref(), id).await?;
    Ok(Json(listing))
}

#[instrument(skip(state))]
pub async fn search_listings(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListingQuery>, AppError>,
) -> AppResult<Json<Vec<Listing>>> {
    let filter = query.into_filter()?;
    let listings = services::search(state.listings.as_ref(), &filter).await?;
    Ok(Json(listings))
}

/// The body is parsed only after the ownership check, so a non-owner is
/// refused the same way whatever they send.
#[instrument(skip(state, body))]
pub async fn update_listing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    body: Bytes,
) -> AppResult<Json<Listing>> {
    let current = services::require_owner(state.listings.as_ref(), id, user_id, "update").await?;

    let changes: UpdateListingRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid listing payload: {e}")))?;
    if let Some(user_ref) = changes.user_ref.filter(|r| *r != user_id) {
        warn!(%user_ref, %user_id, "ignoring client-supplied userRef on update");
    }

    let listing = services::apply_update(state.listings.as_ref(), current, changes).await?;
    Ok(Json(listing))
}

#[instrument(skip(state))]
pub async fn delete_listing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<MessageResponse>> {
    services::delete(state.listings.as_ref(), id, user_id).await?;
    Ok(Json(MessageResponse::ok("Listing has been deleted!")))
}
