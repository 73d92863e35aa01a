//! In-memory stand-ins for Postgres and S3, used by unit and router tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    repo::UserStore,
    repo_types::{NewUser, User, UserChanges},
};
use crate::error::{AppError, AppResult, STALE_ACCOUNT};
use crate::listings::{
    repo::ListingStore,
    repo_types::{Listing, ListingFields, ListingFilter, ListingType, SortKey, SortOrder},
};
use crate::storage::StorageClient;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    listings: Vec<Listing>,
}

/// Both stores behind one lock, so uniqueness checks and cascades are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub async fn seed_user(&self, username: &str) -> Uuid {
        let user = UserStore::insert(
            self,
            NewUser {
                username: username.into(),
                email: format!("{username}@example.com"),
                password_hash: "unused".into(),
                avatar: None,
            },
        )
        .await
        .expect("seed user");
        user.id
    }
}

fn check_unique(users: &[User], skip: Option<Uuid>, username: &str, email: &str) -> AppResult<()> {
    let others = users.iter().filter(|u| Some(u.id) != skip);
    for u in others {
        if u.email == email {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        if u.username == username {
            return Err(AppError::Conflict("Username already taken".into()));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, new: NewUser) -> AppResult<User> {
        let mut t = self.tables.lock().unwrap();
        check_unique(&t.users, None, &new.username, &new.email)?;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            avatar: new.avatar,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
        let mut t = self.tables.lock().unwrap();
        let Some(current) = t.users.iter().find(|u| u.id == id).cloned() else {
            return Ok(None);
        };
        let username = changes.username.unwrap_or(current.username);
        let email = changes.email.unwrap_or(current.email);
        check_unique(&t.users, Some(id), &username, &email)?;

        let user = t.users.iter_mut().find(|u| u.id == id).expect("present");
        user.username = username;
        user.email = email;
        if let Some(h) = changes.password_hash {
            user.password_hash = h;
        }
        if let Some(a) = changes.avatar {
            user.avatar = Some(a);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        if t.users.len() == before {
            return Ok(false);
        }
        t.listings.retain(|l| l.owner_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn insert(&self, owner_id: Uuid, f: ListingFields) -> AppResult<Listing> {
        let mut t = self.tables.lock().unwrap();
        // mirrors the owner_id foreign key
        if !t.users.iter().any(|u| u.id == owner_id) {
            return Err(AppError::Unauthorized(STALE_ACCOUNT.into()));
        }
        let now = OffsetDateTime::now_utc();
        let listing = Listing {
            id: Uuid::new_v4(),
            name: f.name,
            description: f.description,
            address: f.address,
            bedrooms: f.bedrooms,
            bathrooms: f.bathrooms,
            regular_price: f.regular_price,
            discount_price: f.discount_price,
            furnished: f.furnished,
            parking: f.parking,
            offer: f.offer,
            kind: f.kind,
            image_urls: f.image_urls,
            owner_id,
            created_at: now,
            updated_at: now,
        };
        t.listings.push(listing.clone());
        Ok(listing)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Listing>> {
        let t = self.tables.lock().unwrap();
        Ok(t.listings.iter().find(|l| l.id == id).cloned())
    }

    async fn search(&self, f: &ListingFilter) -> AppResult<Vec<Listing>> {
        let t = self.tables.lock().unwrap();
        let term = f.search_term.as_ref().map(|s| s.to_lowercase());
        let mut rows: Vec<Listing> = t
            .listings
            .iter()
            .filter(|l| f.kind.map_or(true, |k| l.kind == k))
            .filter(|l| f.offer.map_or(true, |v| l.offer == v))
            .filter(|l| f.furnished.map_or(true, |v| l.furnished == v))
            .filter(|l| f.parking.map_or(true, |v| l.parking == v))
            .filter(|l| f.owner_id.map_or(true, |v| l.owner_id == v))
            .filter(|l| {
                term.as_ref()
                    .map_or(true, |t| l.name.to_lowercase().contains(t.as_str()))
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ord = match f.sort {
                SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                SortKey::RegularPrice => a.regular_price.total_cmp(&b.regular_price),
            };
            let ord = match f.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });

        Ok(rows
            .into_iter()
            .skip(f.offset.max(0) as usize)
            .take(f.limit.max(0) as usize)
            .collect())
    }

    async fn update(&self, id: Uuid, f: ListingFields) -> AppResult<Option<Listing>> {
        let mut t = self.tables.lock().unwrap();
        let Some(l) = t.listings.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        l.name = f.name;
        l.description = f.description;
        l.address = f.address;
        l.bedrooms = f.bedrooms;
        l.bathrooms = f.bathrooms;
        l.regular_price = f.regular_price;
        l.discount_price = f.discount_price;
        l.furnished = f.furnished;
        l.parking = f.parking;
        l.offer = f.offer;
        l.kind = f.kind;
        l.image_urls = f.image_urls;
        l.updated_at = OffsetDateTime::now_utc();
        Ok(Some(l.clone()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.listings.len();
        t.listings.retain(|l| l.id != id);
        Ok(t.listings.len() != before)
    }
}

pub fn sample_fields() -> ListingFields {
    ListingFields {
        name: "Sunny loft".into(),
        description: "Two rooms near the park".into(),
        address: "1 Main St".into(),
        bedrooms: 2,
        bathrooms: 1,
        regular_price: 1000.0,
        discount_price: 0.0,
        furnished: true,
        parking: false,
        offer: false,
        kind: ListingType::Rent,
        image_urls: vec!["https://img.example/1.jpg".into()],
    }
}

/// Object store kept in a map. Can be told to fail or to hang after N puts.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    puts: AtomicUsize,
    fail_after: Option<usize>,
    stall_after: Option<usize>,
}

impl FakeStorage {
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Default::default()
        }
    }

    pub fn stalled() -> Self {
        Self::stalling_after(0)
    }

    pub fn stalling_after(n: usize) -> Self {
        Self {
            stall_after: Some(n),
            ..Default::default()
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, body: Bytes, _ct: &str) -> anyhow::Result<()> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst);
        if self.stall_after.is_some_and(|limit| n >= limit) {
            futures::future::pending::<()>().await;
        }
        if self.fail_after.is_some_and(|limit| n >= limit) {
            anyhow::bail!("storage unavailable");
        }
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://fake.local/{}", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_filters_sorts_and_pages() {
        let store = MemoryStore::default();
        let owner = store.seed_user("owner").await;
        for (i, kind) in [ListingType::Rent, ListingType::Sale, ListingType::Rent]
            .into_iter()
            .enumerate()
        {
            let mut f = sample_fields();
            f.kind = kind;
            f.regular_price = 100.0 * (i as f64 + 1.0);
            ListingStore::insert(&store, owner, f).await.unwrap();
        }

        let rentals = store
            .search(&ListingFilter {
                kind: Some(ListingType::Rent),
                sort: SortKey::RegularPrice,
                order: SortOrder::Asc,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rentals.len(), 2);
        assert!(rentals[0].regular_price < rentals[1].regular_price);

        let page = store
            .search(&ListingFilter {
                limit: 1,
                offset: 1,
                sort: SortKey::RegularPrice,
                order: SortOrder::Desc,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].regular_price, 200.0);
    }

    #[tokio::test]
    async fn listing_requires_existing_owner() {
        let store = MemoryStore::default();
        let err = ListingStore::insert(&store, Uuid::new_v4(), sample_fields())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == STALE_ACCOUNT));
    }
}
