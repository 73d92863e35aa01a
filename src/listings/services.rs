use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{repo::UserStore, services::require_account};
use crate::error::{AppError, AppResult};
use crate::listings::{
    dto::{CreateListingRequest, UpdateListingRequest},
    repo::ListingStore,
    repo_types::{Listing, ListingFields, ListingFilter},
};

pub const MAX_IMAGES: usize = 6;

impl TryFrom<CreateListingRequest> for ListingFields {
    type Error = AppError;

    fn try_from(r: CreateListingRequest) -> AppResult<Self> {
        let kind = r
            .kind
            .ok_or_else(|| AppError::Validation("Listing type is required".into()))?;
        Ok(Self {
            name: r.name.trim().to_string(),
            description: r.description,
            address: r.address,
            bedrooms: r.bedrooms,
            bathrooms: r.bathrooms,
            regular_price: r.regular_price,
            discount_price: r.discount_price,
            furnished: r.furnished,
            parking: r.parking,
            offer: r.offer,
            kind,
            image_urls: r.image_urls,
        })
    }
}

impl UpdateListingRequest {
    fn apply(self, f: &mut ListingFields) {
        if let Some(v) = self.name {
            f.name = v.trim().to_string();
        }
        if let Some(v) = self.description {
            f.description = v;
        }
        if let Some(v) = self.address {
            f.address = v;
        }
        if let Some(v) = self.bedrooms {
            f.bedrooms = v;
        }
        if let Some(v) = self.bathrooms {
            f.bathrooms = v;
        }
        if let Some(v) = self.regular_price {
            f.regular_price = v;
        }
        if let Some(v) = self.discount_price {
            f.discount_price = v;
        }
        if let Some(v) = self.furnished {
            f.furnished = v;
        }
        if let Some(v) = self.parking {
            f.parking = v;
        }
        if let Some(v) = self.offer {
            f.offer = v;
        }
        if let Some(v) = self.kind {
            f.kind = v;
        }
        if let Some(v) = self.image_urls {
            f.image_urls = v;
        }
    }
}

pub fn validate(f: &ListingFields) -> AppResult<()> {
    if f.name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if f.bedrooms < 0 || f.bathrooms < 0 {
        return Err(AppError::Validation(
            "Bedrooms and bathrooms cannot be negative".into(),
        ));
    }
    let price_ok = |p: f64| p.is_finite() && p >= 0.0;
    if !price_ok(f.regular_price) || !price_ok(f.discount_price) {
        return Err(AppError::Validation("Prices must be non-negative numbers".into()));
    }
    if f.image_urls.len() > MAX_IMAGES {
        return Err(AppError::Validation(format!(
            "A listing can have at most {MAX_IMAGES} images"
        )));
    }
    if f.image_urls.iter().any(|u| u.trim().is_empty()) {
        return Err(AppError::Validation("Image URLs cannot be empty".into()));
    }
    if f.offer && f.discount_price >= f.regular_price {
        return Err(AppError::Validation(
            "Discount price must be less than regular price".into(),
        ));
    }
    Ok(())
}

pub async fn create(
    users: &dyn UserStore,
    listings: &dyn ListingStore,
    owner_id: Uuid,
    fields: ListingFields,
) -> AppResult<Listing> {
    require_account(users, owner_id).await?;
    validate(&fields)?;
    let listing = listings.insert(owner_id, fields).await?;
    info!(listing_id = %listing.id, owner_id = %owner_id, "listing created");
    Ok(listing)
}

pub async fn get(listings: &dyn ListingStore, id: Uuid) -> AppResult<Listing> {
    listings
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".into()))
}

pub async fn search(listings: &dyn ListingStore, filter: &ListingFilter) -> AppResult<Vec<Listing>> {
    listings.search(filter).await
}

/// Loads a listing for a mutating `action`, failing unless `owner_id` owns it.
pub async fn require_owner(
    listings: &dyn ListingStore,
    id: Uuid,
    owner_id: Uuid,
    action: &str,
) -> AppResult<Listing> {
    let listing = get(listings, id).await?;
    if listing.owner_id != owner_id {
        warn!(listing_id = %id, owner_id = %listing.owner_id, caller = %owner_id, "ownership check failed");
        return Err(AppError::Unauthorized(format!(
            "You can only {action} your own listings!"
        )));
    }
    Ok(listing)
}

/// Merges `changes` over an already ownership-checked listing and stores it.
pub async fn apply_update(
    listings: &dyn ListingStore,
    current: Listing,
    changes: UpdateListingRequest,
) -> AppResult<Listing> {
    let id = current.id;
    let mut fields = ListingFields::from(&current);
    changes.apply(&mut fields);
    validate(&fields)?;

    let listing = listings
        .update(id, fields)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".into()))?;
    info!(listing_id = %id, "listing updated");
    Ok(listing)
}

pub async fn delete(listings: &dyn ListingStore, id: Uuid, owner_id: Uuid) -> AppResult<()> {
    require_owner(listings, id, owner_id, "delete").await?;
    if !listings.delete(id).await? {
        return Err(AppError::NotFound("Listing not found".into()));
    }
    info!(listing_id = %id, "listing deleted");
    Ok(())
}
