//! Reference catalog: chassis, motors and gear ratios.
//!
//! The tables are filled once by [`seed`](crate::seed) and are read-only for
//! the rest of the application. Lists are ordered by each kind's natural key:
//! chassis by code, motors by minimum RPM, gear ratios by ratio value.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::live::{ChangeFeed, Subscription, Table};
use crate::models::{ChassisRef, GearRatioRef, MotorCategory, MotorRef, RefKind, ShaftType};

const CHASSIS_COLUMNS: &str = "id, code, name, shaft_type, motor_position";
const MOTOR_COLUMNS: &str = "id, name, shaft_type, category, rpm_min, rpm_max";
const GEAR_RATIO_COLUMNS: &str = "id, ratio, ratio_value, shaft_type, \
     gear1_teeth, gear1_color, gear1_code, gear2_teeth, gear2_color, gear2_code";

impl RefKind {
    pub(crate) fn feed_table(self) -> Table {
        match self {
            RefKind::Chassis => Table::ChassisRef,
            RefKind::Motor => Table::MotorRef,
            RefKind::GearRatio => Table::GearRatioRef,
        }
    }
}

// ─── Shared fetchers (also used by the profile join) ────────────────────

pub(crate) async fn fetch_chassis(
    conn: &mut SqliteConnection,
    shaft: Option<ShaftType>,
) -> StoreResult<Vec<ChassisRef>> {
    let filter = if shaft.is_some() { "WHERE shaft_type = ?" } else { "" };
    let sql = format!("SELECT {CHASSIS_COLUMNS} FROM chassis_ref {filter} ORDER BY code ASC, id ASC");

    let mut query = sqlx::query(&sql);
    if let Some(shaft) = shaft {
        query = query.bind(shaft.as_str());
    }
    let rows = query.fetch_all(&mut *conn).await?;

    rows.iter()
        .map(ChassisRef::from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

pub(crate) async fn fetch_motors(
    conn: &mut SqliteConnection,
    shaft: Option<ShaftType>,
) -> StoreResult<Vec<MotorRef>> {
    let filter = if shaft.is_some() { "WHERE shaft_type = ?" } else { "" };
    let sql = format!("SELECT {MOTOR_COLUMNS} FROM motor_ref {filter} ORDER BY rpm_min ASC, id ASC");

    let mut query = sqlx::query(&sql);
    if let Some(shaft) = shaft {
        query = query.bind(shaft.as_str());
    }
    let rows = query.fetch_all(&mut *conn).await?;

    rows.iter()
        .map(MotorRef::from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

pub(crate) async fn fetch_gear_ratios(
    conn: &mut SqliteConnection,
    shaft: Option<ShaftType>,
) -> StoreResult<Vec<GearRatioRef>> {
    let filter = if shaft.is_some() { "WHERE shaft_type = ?" } else { "" };
    let sql = format!("SELECT {GEAR_RATIO_COLUMNS} FROM gear_ratio_ref {filter} ORDER BY ratio_value ASC, id ASC");

    let mut query = sqlx::query(&sql);
    if let Some(shaft) = shaft {
        query = query.bind(shaft.as_str());
    }
    let rows = query.fetch_all(&mut *conn).await?;

    rows.iter()
        .map(GearRatioRef::from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

pub(crate) async fn count_kind(conn: &mut SqliteConnection, kind: RefKind) -> StoreResult<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", kind.table()))
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

// ─── Catalog handle ─────────────────────────────────────────────────────

/// Read access to the reference tables.
#[derive(Debug, Clone)]
pub struct ReferenceCatalog {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl ReferenceCatalog {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    pub async fn list_chassis(&self) -> StoreResult<Vec<ChassisRef>> {
        let mut conn = self.pool.acquire().await?;
        fetch_chassis(&mut conn, None).await
    }

    pub async fn list_motors(&self) -> StoreResult<Vec<MotorRef>> {
        let mut conn = self.pool.acquire().await?;
        fetch_motors(&mut conn, None).await
    }

    pub async fn list_gear_ratios(&self) -> StoreResult<Vec<GearRatioRef>> {
        let mut conn = self.pool.acquire().await?;
        fetch_gear_ratios(&mut conn, None).await
    }

    pub async fn chassis_by_shaft_type(&self, shaft: ShaftType) -> StoreResult<Vec<ChassisRef>> {
        let mut conn = self.pool.acquire().await?;
        fetch_chassis(&mut conn, Some(shaft)).await
    }

    pub async fn motors_by_shaft_type(&self, shaft: ShaftType) -> StoreResult<Vec<MotorRef>> {
        let mut conn = self.pool.acquire().await?;
        fetch_motors(&mut conn, Some(shaft)).await
    }

    pub async fn gear_ratios_by_shaft_type(
        &self,
        shaft: ShaftType,
    ) -> StoreResult<Vec<GearRatioRef>> {
        let mut conn = self.pool.acquire().await?;
        fetch_gear_ratios(&mut conn, Some(shaft)).await
    }

    /// Live chassis list, optionally restricted to one shaft type.
    pub fn watch_chassis(&self, shaft: Option<ShaftType>) -> Subscription<Vec<ChassisRef>> {
        let pool = self.pool.clone();
        self.feed.watch(&[Table::ChassisRef], move || {
            let pool = pool.clone();
            async move {
                let mut conn = pool.acquire().await?;
                fetch_chassis(&mut conn, shaft).await
            }
        })
    }

    pub fn watch_motors(&self, shaft: Option<ShaftType>) -> Subscription<Vec<MotorRef>> {
        let pool = self.pool.clone();
        self.feed.watch(&[Table::MotorRef], move || {
            let pool = pool.clone();
            async move {
                let mut conn = pool.acquire().await?;
                fetch_motors(&mut conn, shaft).await
            }
        })
    }

    pub fn watch_gear_ratios(&self, shaft: Option<ShaftType>) -> Subscription<Vec<GearRatioRef>> {
        let pool = self.pool.clone();
        self.feed.watch(&[Table::GearRatioRef], move || {
            let pool = pool.clone();
            async move {
                let mut conn = pool.acquire().await?;
                fetch_gear_ratios(&mut conn, shaft).await
            }
        })
    }

    pub async fn motors_by_category(&self, category: MotorCategory) -> StoreResult<Vec<MotorRef>> {
        let rows = sqlx::query(&format!(
            "SELECT {MOTOR_COLUMNS} FROM motor_ref WHERE category = ? ORDER BY rpm_min ASC, id ASC"
        ))
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(MotorRef::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    pub async fn get_chassis(&self, id: i64) -> StoreResult<Option<ChassisRef>> {
        let row = sqlx::query(&format!("SELECT {CHASSIS_COLUMNS} FROM chassis_ref WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(ChassisRef::from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn chassis_by_code(&self, code: &str) -> StoreResult<Option<ChassisRef>> {
        let row = sqlx::query(&format!(
            "SELECT {CHASSIS_COLUMNS} FROM chassis_ref WHERE code = ? ORDER BY id ASC LIMIT 1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(ChassisRef::from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn get_motor(&self, id: i64) -> StoreResult<Option<MotorRef>> {
        let row = sqlx::query(&format!("SELECT {MOTOR_COLUMNS} FROM motor_ref WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(MotorRef::from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn get_gear_ratio(&self, id: i64) -> StoreResult<Option<GearRatioRef>> {
        let row = sqlx::query(&format!(
            "SELECT {GEAR_RATIO_COLUMNS} FROM gear_ratio_ref WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(GearRatioRef::from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn count(&self, kind: RefKind) -> StoreResult<i64> {
        let mut conn = self.pool.acquire().await?;
        count_kind(&mut conn, kind).await
    }

    /// Remove a reference row. Profiles pointing at it keep every other
    /// field and get that reference set to null. Returns whether a row was
    /// removed.
    pub async fn delete(&self, kind: RefKind, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Dependents are nulled in the same transaction as the delete.
        let nulled = sqlx::query(&format!(
            "UPDATE car_profile SET {col} = NULL WHERE {col} = ?",
            col = kind.profile_column()
        ))
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let deleted = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", kind.table()))
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 || nulled > 0 {
            info!(kind = %kind, id, profiles_detached = nulled, "deleted reference row");
            self.feed.publish(&[kind.feed_table(), Table::CarProfile]);
        } else {
            debug!(kind = %kind, id, "reference row not found, nothing deleted");
        }

        Ok(deleted > 0)
    }
}
