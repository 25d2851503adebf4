//! Profile store: durable `car_profile` rows.
//!
//! The store persists what it is given. It does not stamp timestamps or
//! normalize tags; that is the job of [`ProfileService`](crate::service::ProfileService).
//! Every committed write is published on the [`ChangeFeed`] so open
//! subscriptions refresh.
//!
//! Lists are ordered by `updated_at` descending, ties broken by id
//! descending.

use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::catalog::{fetch_chassis, fetch_gear_ratios, fetch_motors};
use crate::error::{StoreError, StoreResult};
use crate::live::{ChangeFeed, Subscription, Table};
use crate::models::{
    CarProfileRow, CarProfileWithRefs, ChassisRef, GearRatioRef, MotorRef, RefKind,
    PROFILE_COLUMNS,
};

const ORDER_RECENT: &str = "ORDER BY updated_at DESC, id DESC";

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`
/// pattern, so the needle is matched literally.
fn like_contains(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn decode_rows(rows: &[sqlx::sqlite::SqliteRow]) -> StoreResult<Vec<CarProfileRow>> {
    rows.iter()
        .map(CarProfileRow::from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

/// Reference tables keyed by id, loaded once per joined read.
struct RefMaps {
    chassis: HashMap<i64, ChassisRef>,
    motors: HashMap<i64, MotorRef>,
    gear_ratios: HashMap<i64, GearRatioRef>,
}

impl RefMaps {
    async fn load(conn: &mut SqliteConnection) -> StoreResult<Self> {
        let chassis = fetch_chassis(conn, None).await?;
        let motors = fetch_motors(conn, None).await?;
        let gear_ratios = fetch_gear_ratios(conn, None).await?;

        Ok(Self {
            chassis: chassis.into_iter().map(|c| (c.id, c)).collect(),
            motors: motors.into_iter().map(|m| (m.id, m)).collect(),
            gear_ratios: gear_ratios.into_iter().map(|g| (g.id, g)).collect(),
        })
    }

    fn attach(&self, profile: CarProfileRow) -> CarProfileWithRefs {
        let chassis = profile
            .chassis_ref_id
            .and_then(|id| self.chassis.get(&id).cloned());
        let motor = profile
            .motor_ref_id
            .and_then(|id| self.motors.get(&id).cloned());
        let gear_ratio = profile
            .gear_ratio_ref_id
            .and_then(|id| self.gear_ratios.get(&id).cloned());

        CarProfileWithRefs {
            profile,
            chassis,
            motor,
            gear_ratio,
        }
    }
}

/// SQLite-backed storage of car profiles.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl ProfileStore {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    // ─── Writes ─────────────────────────────────────────────────────────

    /// Insert a new row and return its id. `profile.id` is ignored; ids are
    /// assigned by the database. Fails with
    /// [`StoreError::ConstraintViolation`] when the name is taken.
    pub async fn insert(&self, profile: &CarProfileRow) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO car_profile (name, chassis_ref_id, motor_ref_id, gear_ratio_ref_id,
                                     motor_break_in_status, motor_break_in_date, motor_run_count,
                                     custom_mod_notes,
                                     tire_front_type, tire_front_material, tire_front_diameter_mm,
                                     tire_rear_type, tire_rear_material, tire_rear_diameter_mm,
                                     wheel_type, wheel_material,
                                     roller_config_json, damper_config_json, brake_config_json,
                                     body_type, body_aero_notes, total_weight_g,
                                     battery_type, battery_brand, tags, thumbnail_path,
                                     created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.name)
        .bind(profile.chassis_ref_id)
        .bind(profile.motor_ref_id)
        .bind(profile.gear_ratio_ref_id)
        .bind(profile.motor_break_in_status)
        .bind(profile.motor_break_in_date)
        .bind(profile.motor_run_count)
        .bind(&profile.custom_mod_notes)
        .bind(&profile.tire_front_type)
        .bind(&profile.tire_front_material)
        .bind(profile.tire_front_diameter_mm)
        .bind(&profile.tire_rear_type)
        .bind(&profile.tire_rear_material)
        .bind(profile.tire_rear_diameter_mm)
        .bind(&profile.wheel_type)
        .bind(&profile.wheel_material)
        .bind(&profile.roller_config_json)
        .bind(&profile.damper_config_json)
        .bind(&profile.brake_config_json)
        .bind(&profile.body_type)
        .bind(&profile.body_aero_notes)
        .bind(profile.total_weight_g)
        .bind(&profile.battery_type)
        .bind(&profile.battery_brand)
        .bind(&profile.tags)
        .bind(&profile.thumbnail_path)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) => {
                let err = StoreError::from(e);
                if err.is_constraint_violation() {
                    warn!(name = %profile.name, "insert rejected: name already in use");
                }
                return Err(err);
            }
        };

        info!(id, name = %profile.name, "inserted car profile");
        self.feed.publish(&[Table::CarProfile]);
        Ok(id)
    }

    /// Replace every column of the row identified by `profile.id`, except
    /// `created_at`, which is fixed at insert. `updated_at` is written as
    /// given but never below the stored `created_at`.
    pub async fn update(&self, profile: &CarProfileRow) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE car_profile SET
                name = ?,
                chassis_ref_id = ?,
                motor_ref_id = ?,
                gear_ratio_ref_id = ?,
                motor_break_in_status = ?,
                motor_break_in_date = ?,
                motor_run_count = ?,
                custom_mod_notes = ?,
                tire_front_type = ?,
                tire_front_material = ?,
                tire_front_diameter_mm = ?,
                tire_rear_type = ?,
                tire_rear_material = ?,
                tire_rear_diameter_mm = ?,
                wheel_type = ?,
                wheel_material = ?,
                roller_config_json = ?,
                damper_config_json = ?,
                brake_config_json = ?,
                body_type = ?,
                body_aero_notes = ?,
                total_weight_g = ?,
                battery_type = ?,
                battery_brand = ?,
                tags = ?,
                thumbnail_path = ?,
                updated_at = MAX(?, created_at)
            WHERE id = ?
            "#,
        )
        .bind(&profile.name)
        .bind(profile.chassis_ref_id)
        .bind(profile.motor_ref_id)
        .bind(profile.gear_ratio_ref_id)
        .bind(profile.motor_break_in_status)
        .bind(profile.motor_break_in_date)
        .bind(profile.motor_run_count)
        .bind(&profile.custom_mod_notes)
        .bind(&profile.tire_front_type)
        .bind(&profile.tire_front_material)
        .bind(profile.tire_front_diameter_mm)
        .bind(&profile.tire_rear_type)
        .bind(&profile.tire_rear_material)
        .bind(profile.tire_rear_diameter_mm)
        .bind(&profile.wheel_type)
        .bind(&profile.wheel_material)
        .bind(&profile.roller_config_json)
        .bind(&profile.damper_config_json)
        .bind(&profile.brake_config_json)
        .bind(&profile.body_type)
        .bind(&profile.body_aero_notes)
        .bind(profile.total_weight_g)
        .bind(&profile.battery_type)
        .bind(&profile.battery_brand)
        .bind(&profile.tags)
        .bind(&profile.thumbnail_path)
        .bind(profile.updated_at)
        .bind(profile.id)
        .execute(&self.pool)
        .await;

        let affected = match result {
            Ok(done) => done.rows_affected(),
            Err(e) => {
                let err = StoreError::from(e);
                if err.is_constraint_violation() {
                    warn!(id = profile.id, name = %profile.name, "update rejected: name already in use");
                }
                return Err(err);
            }
        };

        if affected == 0 {
            warn!(id = profile.id, "update target no longer exists");
            return Err(StoreError::NotFound { id: profile.id });
        }

        info!(id = profile.id, name = %profile.name, "updated car profile");
        self.feed.publish(&[Table::CarProfile]);
        Ok(())
    }

    /// Refresh only `updated_at`. Returns whether the row exists.
    pub async fn touch(&self, id: i64, timestamp: i64) -> StoreResult<bool> {
        let affected =
            sqlx::query("UPDATE car_profile SET updated_at = MAX(?, created_at) WHERE id = ?")
                .bind(timestamp)
                .bind(id)
                .execute(&self.pool)
                .await?
                .rows_affected();

        if affected > 0 {
            debug!(id, timestamp, "touched car profile");
            self.feed.publish(&[Table::CarProfile]);
        }
        Ok(affected > 0)
    }

    /// Hard delete. A missing id is not an error. Returns whether a row was
    /// removed.
    pub async fn delete_by_id(&self, id: i64) -> StoreResult<bool> {
        let affected = sqlx::query("DELETE FROM car_profile WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected > 0 {
            info!(id, "deleted car profile");
            self.feed.publish(&[Table::CarProfile]);
        } else {
            debug!(id, "delete of unknown car profile ignored");
        }
        Ok(affected > 0)
    }

    // ─── Single-shot reads ──────────────────────────────────────────────

    pub async fn get_by_id(&self, id: i64) -> StoreResult<Option<CarProfileRow>> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM car_profile WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(CarProfileRow::from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn get_all(&self) -> StoreResult<Vec<CarProfileRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM car_profile {ORDER_RECENT}"
        ))
        .fetch_all(&self.pool)
        .await?;
        decode_rows(&rows)
    }

    /// Substring match on `name` using SQLite `LIKE`, so ASCII letters
    /// match case-insensitively.
    pub async fn search_by_name(&self, needle: &str) -> StoreResult<Vec<CarProfileRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM car_profile WHERE name LIKE ? ESCAPE '\\' {ORDER_RECENT}"
        ))
        .bind(like_contains(needle))
        .fetch_all(&self.pool)
        .await?;
        decode_rows(&rows)
    }

    /// Profiles whose stored tag string contains `tag` as a substring.
    ///
    /// This is a match over the comma-joined column, not set membership:
    /// `car` also matches a profile tagged `nascar`.
    pub async fn get_by_tag(&self, tag: &str) -> StoreResult<Vec<CarProfileRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM car_profile WHERE tags LIKE ? ESCAPE '\\' {ORDER_RECENT}"
        ))
        .bind(like_contains(tag))
        .fetch_all(&self.pool)
        .await?;
        decode_rows(&rows)
    }

    /// Profiles whose `kind` foreign key equals `ref_id`.
    pub async fn get_by_reference(
        &self,
        kind: RefKind,
        ref_id: i64,
    ) -> StoreResult<Vec<CarProfileRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM car_profile WHERE {} = ? {ORDER_RECENT}",
            kind.profile_column()
        ))
        .bind(ref_id)
        .fetch_all(&self.pool)
        .await?;
        decode_rows(&rows)
    }

    /// Number of profiles named exactly `name` (case-sensitive), ignoring
    /// `excluding_id`. Pass 0 to exclude nothing.
    pub async fn count_by_name(&self, name: &str, excluding_id: i64) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM car_profile WHERE name = ? AND id != ?")
                .bind(name)
                .bind(excluding_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM car_profile")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// One profile with its references resolved, read from a single
    /// snapshot.
    pub async fn get_with_refs(&self, id: i64) -> StoreResult<Option<CarProfileWithRefs>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM car_profile WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let joined = match row {
            Some(row) => {
                let profile = CarProfileRow::from_row(&row)?;
                let refs = RefMaps::load(&mut tx).await?;
                Some(refs.attach(profile))
            }
            None => None,
        };

        tx.commit().await?;
        Ok(joined)
    }

    /// Every profile with its references resolved, most recently updated
    /// first.
    pub async fn get_all_with_refs(&self) -> StoreResult<Vec<CarProfileWithRefs>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM car_profile {ORDER_RECENT}"
        ))
        .fetch_all(&mut *tx)
        .await?;
        let profiles = decode_rows(&rows)?;

        let joined = if profiles.is_empty() {
            Vec::new()
        } else {
            let refs = RefMaps::load(&mut tx).await?;
            profiles.into_iter().map(|p| refs.attach(p)).collect()
        };

        tx.commit().await?;
        Ok(joined)
    }

    // ─── Live reads ─────────────────────────────────────────────────────

    pub fn watch_by_id(&self, id: i64) -> Subscription<Option<CarProfileRow>> {
        let store = self.clone();
        self.feed.watch(&[Table::CarProfile], move || {
            let store = store.clone();
            async move { store.get_by_id(id).await }
        })
    }

    pub fn watch_all(&self) -> Subscription<Vec<CarProfileRow>> {
        let store = self.clone();
        self.feed.watch(&[Table::CarProfile], move || {
            let store = store.clone();
            async move { store.get_all().await }
        })
    }

    pub fn watch_search_by_name(&self, needle: &str) -> Subscription<Vec<CarProfileRow>> {
        let store = self.clone();
        let needle = needle.to_string();
        self.feed.watch(&[Table::CarProfile], move || {
            let store = store.clone();
            let needle = needle.clone();
            async move { store.search_by_name(&needle).await }
        })
    }

    pub fn watch_by_tag(&self, tag: &str) -> Subscription<Vec<CarProfileRow>> {
        let store = self.clone();
        let tag = tag.to_string();
        self.feed.watch(&[Table::CarProfile], move || {
            let store = store.clone();
            let tag = tag.clone();
            async move { store.get_by_tag(&tag).await }
        })
    }

    pub fn watch_by_reference(
        &self,
        kind: RefKind,
        ref_id: i64,
    ) -> Subscription<Vec<CarProfileRow>> {
        let store = self.clone();
        self.feed.watch(&[Table::CarProfile], move || {
            let store = store.clone();
            async move { store.get_by_reference(kind, ref_id).await }
        })
    }

    pub fn watch_with_refs(&self, id: i64) -> Subscription<Option<CarProfileWithRefs>> {
        let store = self.clone();
        self.feed.watch(&Table::PROFILE_WITH_REFS, move || {
            let store = store.clone();
            async move { store.get_with_refs(id).await }
        })
    }

    pub fn watch_all_with_refs(&self) -> Subscription<Vec<CarProfileWithRefs>> {
        let store = self.clone();
        self.feed.watch(&Table::PROFILE_WITH_REFS, move || {
            let store = store.clone();
            async move { store.get_all_with_refs().await }
        })
    }
}
