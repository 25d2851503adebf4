//! Profile query service: the entry point for callers.
//!
//! The service normalizes tags, stamps timestamps, maps rows into
//! [`CarProfile`] and turns store failures into [`ProfileError`]s. Reads are
//! live [`Subscription`]s.
//!
//! | Read | Mapping |
//! |------|---------|
//! | [`get_all`](ProfileRepository::get_all) | full (references resolved) |
//! | [`get_by_id`](ProfileRepository::get_by_id) | full |
//! | [`search`](ProfileRepository::search) | basic (references left `None`) |
//! | [`get_by_tag`](ProfileRepository::get_by_tag) | basic |

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{ProfileError, StoreError};
use crate::live::{Subscription, Table};
use crate::mapper::{normalize_tags, to_domain, to_domain_basic, to_row};
use crate::models::{CarProfile, RefKind};
use crate::store::ProfileStore;

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The operations callers use to manage profiles.
///
/// Implemented by [`ProfileService`]; the trait lets a caller be tested
/// against a fake.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Every profile, most recently updated first, references resolved.
    fn get_all(&self) -> Subscription<Vec<CarProfile>>;

    /// One profile with references resolved, `None` if absent.
    fn get_by_id(&self, id: i64) -> Subscription<Option<CarProfile>>;

    /// Name substring search.
    fn search(&self, query: &str) -> Subscription<Vec<CarProfile>>;

    /// Tag substring filter.
    fn get_by_tag(&self, tag: &str) -> Subscription<Vec<CarProfile>>;

    /// Create a profile and return its new id.
    async fn create(&self, profile: CarProfile) -> Result<i64, ProfileError>;

    /// Replace an existing profile, identified by `profile.id`.
    async fn update(&self, profile: CarProfile) -> Result<(), ProfileError>;

    /// Delete a profile. Deleting an unknown id succeeds.
    async fn delete(&self, id: i64) -> Result<(), ProfileError>;

    /// Whether no profile other than `excluding_id` uses `name`.
    async fn is_name_unique(&self, name: &str, excluding_id: i64) -> Result<bool, ProfileError>;
}

fn storage_error(err: StoreError) -> ProfileError {
    ProfileError::Storage(err.to_string())
}

/// Apply the write-path rules: non-blank name, normalized tags, fresh
/// `updated_at`, and `created_at` filled in if unset.
fn prepare(mut profile: CarProfile, now: i64) -> Result<CarProfile, ProfileError> {
    if profile.name.trim().is_empty() {
        return Err(ProfileError::NameRequired);
    }
    profile.tags = normalize_tags(&profile.tags);
    if profile.created_at <= 0 {
        profile.created_at = now;
    }
    profile.updated_at = now.max(profile.created_at);
    Ok(profile)
}

/// [`ProfileRepository`] backed by a [`ProfileStore`].
#[derive(Debug, Clone)]
pub struct ProfileService {
    store: ProfileStore,
}

impl ProfileService {
    pub fn new(store: ProfileStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Single-shot by-id read with references resolved.
    pub async fn find(&self, id: i64) -> Result<Option<CarProfile>, ProfileError> {
        self.store
            .get_with_refs(id)
            .await
            .map(|joined| joined.map(to_domain))
            .map_err(storage_error)
    }

    /// Profiles pointing at one reference row, basic mapping.
    pub fn get_by_reference(&self, kind: RefKind, ref_id: i64) -> Subscription<Vec<CarProfile>> {
        let store = self.store.clone();
        self.store.feed().watch(&[Table::CarProfile], move || {
            let store = store.clone();
            async move {
                store
                    .get_by_reference(kind, ref_id)
                    .await
                    .map(|rows| rows.into_iter().map(to_domain_basic).collect::<Vec<_>>())
            }
        })
    }

    pub async fn count(&self) -> Result<i64, ProfileError> {
        self.store.count().await.map_err(storage_error)
    }
}

#[async_trait]
impl ProfileRepository for ProfileService {
    fn get_all(&self) -> Subscription<Vec<CarProfile>> {
        let store = self.store.clone();
        self.store.feed().watch(&Table::PROFILE_WITH_REFS, move || {
            let store = store.clone();
            async move {
                store
                    .get_all_with_refs()
                    .await
                    .map(|joined| joined.into_iter().map(to_domain).collect::<Vec<_>>())
            }
        })
    }

    fn get_by_id(&self, id: i64) -> Subscription<Option<CarProfile>> {
        let store = self.store.clone();
        self.store.feed().watch(&Table::PROFILE_WITH_REFS, move || {
            let store = store.clone();
            async move { store.get_with_refs(id).await.map(|joined| joined.map(to_domain)) }
        })
    }

    fn search(&self, query: &str) -> Subscription<Vec<CarProfile>> {
        let store = self.store.clone();
        let query = query.to_string();
        self.store.feed().watch(&[Table::CarProfile], move || {
            let store = store.clone();
            let query = query.clone();
            async move {
                store
                    .search_by_name(&query)
                    .await
                    .map(|rows| rows.into_iter().map(to_domain_basic).collect::<Vec<_>>())
            }
        })
    }

    fn get_by_tag(&self, tag: &str) -> Subscription<Vec<CarProfile>> {
        let store = self.store.clone();
        let tag = tag.to_string();
        self.store.feed().watch(&[Table::CarProfile], move || {
            let store = store.clone();
            let tag = tag.clone();
            async move {
                store
                    .get_by_tag(&tag)
                    .await
                    .map(|rows| rows.into_iter().map(to_domain_basic).collect::<Vec<_>>())
            }
        })
    }

    async fn create(&self, profile: CarProfile) -> Result<i64, ProfileError> {
        let profile = prepare(profile, now_millis())?;

        match self.store.insert(&to_row(&profile)).await {
            Ok(id) => {
                info!(id, name = %profile.name, tags = profile.tags.len(), "created car profile");
                Ok(id)
            }
            Err(e) => {
                warn!(name = %profile.name, error = %e, "create failed");
                Err(ProfileError::from_store(e, &profile.name))
            }
        }
    }

    async fn update(&self, profile: CarProfile) -> Result<(), ProfileError> {
        if profile.id <= 0 {
            return Err(ProfileError::NotFound(profile.id));
        }
        let profile = prepare(profile, now_millis())?;

        match self.store.update(&to_row(&profile)).await {
            Ok(()) => {
                info!(id = profile.id, name = %profile.name, "updated car profile");
                Ok(())
            }
            Err(e) => {
                warn!(id = profile.id, name = %profile.name, error = %e, "update failed");
                Err(ProfileError::from_store(e, &profile.name))
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<(), ProfileError> {
        self.store
            .delete_by_id(id)
            .await
            .map(|_| ())
            .map_err(storage_error)
    }

    async fn is_name_unique(&self, name: &str, excluding_id: i64) -> Result<bool, ProfileError> {
        let count = self
            .store
            .count_by_name(name, excluding_id)
            .await
            .map_err(storage_error)?;
        debug!(name, excluding_id, count, "name uniqueness check");
        Ok(count == 0)
    }
}
