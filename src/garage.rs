//! Application wiring.
//!
//! [`Garage`] owns the pool and the change feed and hands out the catalog
//! and the profile service built on top of them. Opening a garage runs the
//! schema migrations; seeding the reference catalog is a separate, explicit
//! [`initialize`](Garage::initialize) call made once at startup.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::catalog::ReferenceCatalog;
use crate::config::Config;
use crate::db;
use crate::error::StoreResult;
use crate::live::ChangeFeed;
use crate::migrate;
use crate::seed::{self, SeedReport};
use crate::service::ProfileService;
use crate::store::ProfileStore;

#[derive(Debug, Clone)]
pub struct Garage {
    pool: SqlitePool,
    feed: ChangeFeed,
    catalog: ReferenceCatalog,
    profiles: ProfileService,
}

impl Garage {
    /// Connect to the configured database and bring its schema up to date.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an already-migrated pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        let feed = ChangeFeed::new();
        let catalog = ReferenceCatalog::new(pool.clone(), feed.clone());
        let profiles = ProfileService::new(ProfileStore::new(pool.clone(), feed.clone()));
        Self {
            pool,
            feed,
            catalog,
            profiles,
        }
    }

    /// Seed any empty reference table.
    pub async fn initialize(&self) -> StoreResult<SeedReport> {
        seed::seed_if_empty(&self.pool, &self.feed).await
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
