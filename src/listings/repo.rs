use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppResult;
use crate::listings::repo_types::{Listing, ListingFields, ListingFilter};

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn insert(&self, owner_id: Uuid, fields: ListingFields) -> AppResult<Listing>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Listing>>;
    async fn search(&self, filter: &ListingFilter) -> AppResult<Vec<Listing>>;
    /// Overwrites all caller-controlled columns; the owner is never touched.
    async fn update(&self, id: Uuid, fields: ListingFields) -> AppResult<Option<Listing>>;
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgListingStore {
    db: PgPool,
}

impl PgListingStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const LISTING_COLUMNS: &str = "id, name, description, address, bedrooms, bathrooms, \
     regular_price, discount_price, furnished, parking, offer, listing_type, image_urls, \
     owner_id, created_at, updated_at";

#[async_trait]
impl ListingStore for PgListingStore {
    async fn insert(&self, owner_id: Uuid, f: ListingFields) -> AppResult<Listing> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            INSERT INTO listings (name, description, address, bedrooms, bathrooms,
                                  regular_price, discount_price, furnished, parking, offer,
                                  listing_type, image_urls, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(f.name)
        .bind(f.description)
        .bind(f.address)
        .bind(f.bedrooms)
        .bind(f.bathrooms)
        .bind(f.regular_price)
        .bind(f.discount_price)
        .bind(f.furnished)
        .bind(f.parking)
        .bind(f.offer)
        .bind(f.kind)
        .bind(f.image_urls)
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;
        Ok(listing)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(listing)
    }

    async fn search(&self, filter: &ListingFilter) -> AppResult<Vec<Listing>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {LISTING_COLUMNS} FROM listings WHERE TRUE"));

        if let Some(kind) = filter.kind {
            qb.push(" AND listing_type = ").push_bind(kind);
        }
        if let Some(offer) = filter.offer {
            qb.push(" AND offer = ").push_bind(offer);
        }
        if let Some(furnished) = filter.furnished {
            qb.push(" AND furnished = ").push_bind(furnished);
        }
        if let Some(parking) = filter.parking {
            qb.push(" AND parking = ").push_bind(parking);
        }
        if let Some(owner_id) = filter.owner_id {
            qb.push(" AND owner_id = ").push_bind(owner_id);
        }
        if let Some(term) = &filter.search_term {
            qb.push(" AND name ILIKE ").push_bind(format!("%{}%", escape_like(term)));
        }

        // column and direction come from closed enums, never from input text
        qb.push(" ORDER BY ")
            .push(filter.sort.column())
            .push(" ")
            .push(filter.order.keyword())
            .push(", id");
        qb.push(" LIMIT ").push_bind(filter.limit);
        qb.push(" OFFSET ").push_bind(filter.offset);

        let rows = qb.build_query_as::<Listing>().fetch_all(&self.db).await?;
        Ok(rows)
    }

    async fn update(&self, id: Uuid, f: ListingFields) -> AppResult<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            UPDATE listings
               SET name = $2, description = $3, address = $4, bedrooms = $5, bathrooms = $6,
                   regular_price = $7, discount_price = $8, furnished = $9, parking = $10,
                   offer = $11, listing_type = $12, image_urls = $13, updated_at = now()
             WHERE id = $1
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(f.name)
        .bind(f.description)
        .bind(f.address)
        .bind(f.bedrooms)
        .bind(f.bathrooms)
        .bind(f.regular_price)
        .bind(f.discount_price)
        .bind(f.furnished)
        .bind(f.parking)
        .bind(f.offer)
        .bind(f.kind)
        .bind(f.image_urls)
        .fetch_optional(&self.db)
        .await?;
        Ok(listing)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
