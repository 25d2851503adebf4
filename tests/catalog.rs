//! Integration tests for migrations, seeding and the reference catalog.

use std::time::Duration;

use mini4wd_lab::config::Config;
use mini4wd_lab::db;
use mini4wd_lab::garage::Garage;
use mini4wd_lab::migrate::{self, SCHEMA_VERSION};
use mini4wd_lab::models::{CarProfile, MotorCategory, RefKind, ShaftType};
use mini4wd_lab::service::ProfileRepository;
use tempfile::TempDir;
use tokio::time::timeout;

async fn open_unseeded() -> (TempDir, Garage) {
    let tmp = TempDir::new().unwrap();
    let cfg = Config::for_db_path(tmp.path().join("m4lab.sqlite"));
    let garage = Garage::open(&cfg).await.unwrap();
    (tmp, garage)
}

async fn open_seeded() -> (TempDir, Garage) {
    let (tmp, garage) = open_unseeded().await;
    garage.initialize().await.unwrap();
    (tmp, garage)
}

// ─── Migrations ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let (_tmp, garage) = open_unseeded().await;

    migrate::run_migrations(garage.pool()).await.unwrap();
    migrate::run_migrations(garage.pool()).await.unwrap();

    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(garage.pool())
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_profile_indexes_exist() {
    let (_tmp, garage) = open_unseeded().await;

    let indexes: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'car_profile' ORDER BY name",
    )
    .fetch_all(garage.pool())
    .await
    .unwrap();

    for expected in [
        "index_car_profile_chassis_ref_id",
        "index_car_profile_gear_ratio_ref_id",
        "index_car_profile_motor_ref_id",
        "index_car_profile_name",
    ] {
        assert!(indexes.iter().any(|i| i == expected), "missing index {}", expected);
    }
}

#[tokio::test]
async fn test_upgrade_from_v1_keeps_reference_rows() {
    let tmp = TempDir::new().unwrap();
    let cfg = Config::for_db_path(tmp.path().join("m4lab.sqlite"));
    let pool = db::connect(&cfg).await.unwrap();

    // A version 1 database: reference tables only, one chassis row.
    for ddl in [
        "CREATE TABLE chassis_ref (id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
         code TEXT NOT NULL, name TEXT NOT NULL, shaft_type TEXT NOT NULL, motor_position TEXT NOT NULL)",
        "CREATE TABLE motor_ref (id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
         name TEXT NOT NULL, shaft_type TEXT NOT NULL, category TEXT NOT NULL, \
         rpm_min INTEGER NOT NULL, rpm_max INTEGER NOT NULL)",
        "CREATE TABLE gear_ratio_ref (id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
         ratio TEXT NOT NULL, ratio_value REAL NOT NULL, shaft_type TEXT NOT NULL, \
         gear1_teeth INTEGER NOT NULL, gear1_color TEXT NOT NULL, gear1_code TEXT NOT NULL, \
         gear2_teeth INTEGER NOT NULL, gear2_color TEXT NOT NULL, gear2_code TEXT NOT NULL)",
        "INSERT INTO chassis_ref (code, name, shaft_type, motor_position) \
         VALUES ('XX', 'Legacy Chassis', 'single', 'rear')",
        "PRAGMA user_version = 1",
    ] {
        sqlx::query(ddl).execute(&pool).await.unwrap();
    }

    migrate::run_migrations(&pool).await.unwrap();

    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);

    let garage = Garage::from_pool(pool);
    let legacy = garage.catalog().chassis_by_code("XX").await.unwrap().unwrap();
    assert_eq!(legacy.name, "Legacy Chassis");
    assert_eq!(garage.catalog().count(RefKind::Chassis).await.unwrap(), 1);

    let indexes: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'car_profile'",
    )
    .fetch_all(garage.pool())
    .await
    .unwrap();
    assert!(indexes.iter().any(|i| i == "index_car_profile_name"));
    assert!(indexes.iter().any(|i| i == "index_car_profile_chassis_ref_id"));

    let mut profile = CarProfile::new("Upgraded");
    profile.chassis_ref_id = Some(legacy.id);
    let id = garage.profiles().create(profile).await.unwrap();
    let loaded = garage.profiles().find(id).await.unwrap().unwrap();
    assert_eq!(loaded.chassis, Some(legacy));

    // Only the still-empty tables get seeded.
    let report = garage.initialize().await.unwrap();
    assert_eq!((report.chassis, report.motors, report.gear_ratios), (0, 15, 8));
}

// ─── Seeding ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_seed_populates_catalog() {
    let (_tmp, garage) = open_unseeded().await;

    let report = garage.initialize().await.unwrap();
    assert_eq!((report.chassis, report.motors, report.gear_ratios), (10, 15, 8));

    let catalog = garage.catalog();
    assert_eq!(catalog.count(RefKind::Chassis).await.unwrap(), 10);
    assert_eq!(catalog.count(RefKind::Motor).await.unwrap(), 15);
    assert_eq!(catalog.count(RefKind::GearRatio).await.unwrap(), 8);
}

#[tokio::test]
async fn test_seed_twice_is_noop() {
    let (_tmp, garage) = open_seeded().await;

    let report = garage.initialize().await.unwrap();
    assert!(report.is_noop());
    assert_eq!(garage.catalog().count(RefKind::Chassis).await.unwrap(), 10);
    assert_eq!(garage.catalog().count(RefKind::Motor).await.unwrap(), 15);
    assert_eq!(garage.catalog().count(RefKind::GearRatio).await.unwrap(), 8);
}

#[tokio::test]
async fn test_concurrent_seeds_do_not_duplicate() {
    let (_tmp, garage) = open_unseeded().await;

    let a = garage.clone();
    let b = garage.clone();
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.initialize().await }),
        tokio::spawn(async move { b.initialize().await }),
    );
    let (ra, rb) = (ra.unwrap().unwrap(), rb.unwrap().unwrap());

    assert!(ra.is_noop() ^ rb.is_noop());
    assert_eq!(garage.catalog().count(RefKind::Chassis).await.unwrap(), 10);
    assert_eq!(garage.catalog().count(RefKind::Motor).await.unwrap(), 15);
    assert_eq!(garage.catalog().count(RefKind::GearRatio).await.unwrap(), 8);
}

#[tokio::test]
async fn test_seed_refills_only_empty_tables() {
    let (_tmp, garage) = open_seeded().await;

    sqlx::query("DELETE FROM gear_ratio_ref")
        .execute(garage.pool())
        .await
        .unwrap();

    let report = garage.initialize().await.unwrap();
    assert_eq!((report.chassis, report.motors, report.gear_ratios), (0, 0, 8));
    assert_eq!(garage.catalog().count(RefKind::Chassis).await.unwrap(), 10);
}

// ─── Lookups ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_by_shaft_type_filters() {
    let (_tmp, garage) = open_seeded().await;
    let catalog = garage.catalog();

    let double = catalog.chassis_by_shaft_type(ShaftType::Double).await.unwrap();
    let codes: Vec<&str> = double.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["MA", "MS"]);

    let single = catalog.chassis_by_shaft_type(ShaftType::Single).await.unwrap();
    assert_eq!(single.len(), 8);
    assert!(single.iter().all(|c| c.shaft_type == ShaftType::Single));

    let motors = catalog.motors_by_shaft_type(ShaftType::Double).await.unwrap();
    assert_eq!(motors.len(), 6);
    assert!(motors.iter().all(|m| m.shaft_type == ShaftType::Double));
    assert!(motors.windows(2).all(|w| w[0].rpm_min <= w[1].rpm_min));

    let gears = catalog.gear_ratios_by_shaft_type(ShaftType::Single).await.unwrap();
    assert!(!gears.is_empty());
    assert!(gears.iter().all(|g| g.shaft_type == ShaftType::Single));
    assert!(gears.windows(2).all(|w| w[0].ratio_value <= w[1].ratio_value));
}

#[tokio::test]
async fn test_lookup_by_id_and_code() {
    let (_tmp, garage) = open_seeded().await;
    let catalog = garage.catalog();

    let ms = catalog.chassis_by_code("MS").await.unwrap().unwrap();
    assert_eq!(ms.name, "MS Chassis");
    assert_eq!(catalog.get_chassis(ms.id).await.unwrap(), Some(ms));
    assert!(catalog.chassis_by_code("XX").await.unwrap().is_none());
    assert!(catalog.get_motor(9_999).await.unwrap().is_none());

    let gear = catalog.list_gear_ratios().await.unwrap()[0].clone();
    assert_eq!(catalog.get_gear_ratio(gear.id).await.unwrap(), Some(gear));
}

#[tokio::test]
async fn test_motors_by_category() {
    let (_tmp, garage) = open_seeded().await;

    let stock = garage.catalog().motors_by_category(MotorCategory::Stock).await.unwrap();
    assert_eq!(stock.len(), 1);
    assert_eq!(stock[0].name, "Normal Motor");

    let dash = garage.catalog().motors_by_category(MotorCategory::Dash).await.unwrap();
    assert!(dash.iter().all(|m| m.category == MotorCategory::Dash));
    assert_eq!(dash.len(), 8);
}

#[tokio::test]
async fn test_watch_chassis_refreshes_after_delete() {
    let (_tmp, garage) = open_seeded().await;
    let catalog = garage.catalog();

    let mut sub = catalog.watch_chassis(Some(ShaftType::Double));
    let first = sub.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 2);

    catalog.delete(RefKind::Chassis, first[0].id).await.unwrap();

    let second = timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(second.len(), 1);
}

#[tokio::test]
async fn test_failed_seed_rolls_back_every_table() {
    let (_tmp, garage) = open_unseeded().await;

    sqlx::query("DROP TABLE gear_ratio_ref")
        .execute(garage.pool())
        .await
        .unwrap();

    assert!(garage.initialize().await.is_err());
    assert_eq!(garage.catalog().count(RefKind::Chassis).await.unwrap(), 0);
    assert_eq!(garage.catalog().count(RefKind::Motor).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cancelled_seed_leaves_pool_usable() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = Config::for_db_path(tmp.path().join("m4lab.sqlite"));
    cfg.db.max_connections = 1;
    let garage = Garage::open(&cfg).await.unwrap();

    // Abort the seed at varying points so some attempts land mid-transaction.
    for yields in 0..20 {
        let seeding = garage.clone();
        let handle = tokio::spawn(async move { seeding.initialize().await });
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }
        handle.abort();
        let _ = handle.await;

        let mut tx = garage.pool().begin().await.unwrap();
        tx.rollback().await.unwrap();
    }

    let id = garage
        .profiles()
        .create(CarProfile::new("Survivor"))
        .await
        .unwrap();
    garage.close().await;

    let garage = Garage::open(&cfg).await.unwrap();
    let loaded = garage.profiles().find(id).await.unwrap();
    assert_eq!(loaded.map(|p| p.name).as_deref(), Some("Survivor"));
}
