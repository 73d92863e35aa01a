use serde::Deserialize;
use uuid::Uuid;

use super::repo_types::{ListingFilter, ListingType, SortKey, SortOrder};
use crate::error::{AppError, AppResult};

/// Body of `POST /listing/create`. `userRef` is accepted for client
/// compatibility but the owner always comes from the session token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateListingRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub bedrooms: i32,
    #[serde(default)]
    pub bathrooms: i32,
    #[serde(default)]
    pub regular_price: f64,
    #[serde(default)]
    pub discount_price: f64,
    #[serde(default)]
    pub furnished: bool,
    #[serde(default)]
    pub parking: bool,
    #[serde(default)]
    pub offer: bool,
    #[serde(rename = "type")]
    pub kind: Option<ListingType>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub user_ref: Option<Uuid>,
}

/// Body of `POST /listing/update/:id`; absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateListingRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub regular_price: Option<f64>,
    pub discount_price: Option<f64>,
    pub furnished: Option<bool>,
    pub parking: Option<bool>,
    pub offer: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<ListingType>,
    pub image_urls: Option<Vec<String>>,
    /// Ignored; ownership never transfers.
    pub user_ref: Option<Uuid>,
}

/// Query string of `GET /listing/get` and `GET /listings`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub offer: Option<bool>,
    pub furnished: Option<bool>,
    pub parking: Option<bool>,
    pub user_id: Option<Uuid>,
    pub search_term: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub start_index: Option<i64>,
}

pub const DEFAULT_LIMIT: i64 = 9;
pub const MAX_LIMIT: i64 = 50;

impl ListingQuery {
    pub fn into_filter(self) -> AppResult<ListingFilter> {
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some("rent") => Some(ListingType::Rent),
            Some("sale") => Some(ListingType::Sale),
            Some(other) => {
                return Err(AppError::Validation(format!("Unknown listing type: {other}")))
            }
        };
        let sort = match self.sort.as_deref() {
            None | Some("") | Some("createdAt") | Some("created_at") => SortKey::CreatedAt,
            Some("regularPrice") | Some("regular_price") => SortKey::RegularPrice,
            Some(other) => return Err(AppError::Validation(format!("Unknown sort key: {other}"))),
        };
        let order = match self.order.as_deref() {
            None | Some("") | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => return Err(AppError::Validation(format!("Unknown order: {other}"))),
        };
        let search_term = self
            .search_term
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(ListingFilter {
            kind,
            offer: self.offer,
            furnished: self.furnished,
            parking: self.parking,
            owner_id: self.user_id,
            search_term,
            sort,
            order,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: self.start_index.unwrap_or(0).max(0),
        })
    }
}
