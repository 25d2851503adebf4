//! Schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`. Version 1 holds only the
//! reference tables; version 2 adds `car_profile`. Each step runs in its own
//! transaction together with the version bump, so a crash never leaves a
//! half-applied step behind.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Schema version produced by [`run_migrations`].
pub const SCHEMA_VERSION: i64 = 2;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .context("Failed to read schema version")?;

    if version < 1 {
        migrate_to_v1(pool).await.context("Migration 0 -> 1 failed")?;
        version = 1;
        info!(version, "applied schema migration");
    }

    if version < 2 {
        migrate_to_v2(pool).await.context("Migration 1 -> 2 failed")?;
        info!(version = SCHEMA_VERSION, "applied schema migration");
    }

    Ok(())
}

async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chassis_ref (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            shaft_type TEXT NOT NULL,
            motor_position TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS motor_ref (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL,
            shaft_type TEXT NOT NULL,
            category TEXT NOT NULL,
            rpm_min INTEGER NOT NULL,
            rpm_max INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gear_ratio_ref (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            ratio TEXT NOT NULL,
            ratio_value REAL NOT NULL,
            shaft_type TEXT NOT NULL,
            gear1_teeth INTEGER NOT NULL,
            gear1_color TEXT NOT NULL,
            gear1_code TEXT NOT NULL,
            gear2_teeth INTEGER NOT NULL,
            gear2_color TEXT NOT NULL,
            gear2_code TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("PRAGMA user_version = 1")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// The one additive migration: introduce `car_profile` next to the
/// reference tables of a version 1 database.
async fn migrate_to_v2(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS car_profile (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL,
            chassis_ref_id INTEGER,
            motor_ref_id INTEGER,
            gear_ratio_ref_id INTEGER,
            motor_break_in_status INTEGER NOT NULL DEFAULT 0,
            motor_break_in_date INTEGER,
            motor_run_count INTEGER NOT NULL DEFAULT 0,
            custom_mod_notes TEXT,
            tire_front_type TEXT,
            tire_front_material TEXT,
            tire_front_diameter_mm REAL,
            tire_rear_type TEXT,
            tire_rear_material TEXT,
            tire_rear_diameter_mm REAL,
            wheel_type TEXT,
            wheel_material TEXT,
            roller_config_json TEXT,
            damper_config_json TEXT,
            brake_config_json TEXT,
            body_type TEXT,
            body_aero_notes TEXT,
            total_weight_g REAL,
            battery_type TEXT,
            battery_brand TEXT,
            tags TEXT,
            thumbnail_path TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY(chassis_ref_id) REFERENCES chassis_ref(id) ON UPDATE NO ACTION ON DELETE SET NULL,
            FOREIGN KEY(motor_ref_id) REFERENCES motor_ref(id) ON UPDATE NO ACTION ON DELETE SET NULL,
            FOREIGN KEY(gear_ratio_ref_id) REFERENCES gear_ratio_ref(id) ON UPDATE NO ACTION ON DELETE SET NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS index_car_profile_chassis_ref_id ON car_profile (chassis_ref_id)",
    )
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS index_car_profile_motor_ref_id ON car_profile (motor_ref_id)",
    )
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS index_car_profile_gear_ratio_ref_id ON car_profile (gear_ratio_ref_id)",
    )
    .execute(&mut *tx)
    .await?;
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS index_car_profile_name ON car_profile (name)")
        .execute(&mut *tx)
        .await?;

    sqlx::query("PRAGMA user_version = 2")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
