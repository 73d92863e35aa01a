use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "listing_type", rename_all = "lowercase")]
pub enum ListingType {
    Rent,
    Sale,
}

/// Listing record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub address: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub regular_price: f64,
    pub discount_price: f64,
    pub furnished: bool,
    pub parking: bool,
    pub offer: bool,
    #[serde(rename = "type")]
    #[sqlx(rename = "listing_type")]
    pub kind: ListingType,
    pub image_urls: Vec<String>,
    #[serde(rename = "userRef")]
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Every caller-controlled listing column.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFields {
    pub name: String,
    pub description: String,
    pub address: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub regular_price: f64,
    pub discount_price: f64,
    pub furnished: bool,
    pub parking: bool,
    pub offer: bool,
    pub kind: ListingType,
    pub image_urls: Vec<String>,
}

impl From<&Listing> for ListingFields {
    fn from(l: &Listing) -> Self {
        Self {
            name: l.name.clone(),
            description: l.description.clone(),
            address: l.address.clone(),
            bedrooms: l.bedrooms,
            bathrooms: l.bathrooms,
            regular_price: l.regular_price,
            discount_price: l.discount_price,
            furnished: l.furnished,
            parking: l.parking,
            offer: l.offer,
            kind: l.kind,
            image_urls: l.image_urls.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CreatedAt,
    RegularPrice,
}

impl SortKey {
    pub fn column(self) -> &'static str {
        match self {
            SortKey::CreatedAt => "created_at",
            SortKey::RegularPrice => "regular_price",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Search criteria; `None` means "don't filter on this".
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilter {
    pub kind: Option<ListingType>,
    pub offer: Option<bool>,
    pub furnished: Option<bool>,
    pub parking: Option<bool>,
    pub owner_id: Option<Uuid>,
    pub search_term: Option<String>,
    pub sort: SortKey,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            kind: None,
            offer: None,
            furnished: None,
            parking: None,
            owner_id: None,
            search_term: None,
            sort: SortKey::default(),
            order: SortOrder::default(),
            limit: 9,
            offset: 0,
        }
    }
}
