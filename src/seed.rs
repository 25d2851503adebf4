//! Reference catalog seeding.
//!
//! [`seed_if_empty`] fills each reference table that is still empty with the
//! fixed dataset below. All three check-and-insert steps run inside one
//! `BEGIN IMMEDIATE` transaction: concurrent starts serialize on the write
//! lock, and a failure rolls back every insert of that call.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::catalog::count_kind;
use crate::error::StoreResult;
use crate::live::{ChangeFeed, Table};
use crate::models::MotorCategory::{self, Dash, Stock, Tuned};
use crate::models::MotorPosition::{self, Center, Front, Rear};
use crate::models::RefKind;
use crate::models::ShaftType::{self, Double, Single};

pub struct ChassisSeed {
    pub code: &'static str,
    pub name: &'static str,
    pub shaft_type: ShaftType,
    pub motor_position: MotorPosition,
}

pub struct MotorSeed {
    pub name: &'static str,
    pub shaft_type: ShaftType,
    pub category: MotorCategory,
    pub rpm_min: i32,
    pub rpm_max: i32,
}

pub struct GearSeed {
    pub teeth: i32,
    pub color: &'static str,
    pub code: &'static str,
}

pub struct GearRatioSeed {
    pub ratio: &'static str,
    pub ratio_value: f64,
    pub shaft_type: ShaftType,
    pub gear1: GearSeed,
    pub gear2: GearSeed,
}

const fn chassis(
    code: &'static str,
    name: &'static str,
    shaft_type: ShaftType,
    motor_position: MotorPosition,
) -> ChassisSeed {
    ChassisSeed {
        code,
        name,
        shaft_type,
        motor_position,
    }
}

const fn motor(
    name: &'static str,
    shaft_type: ShaftType,
    category: MotorCategory,
    rpm_min: i32,
    rpm_max: i32,
) -> MotorSeed {
    MotorSeed {
        name,
        shaft_type,
        category,
        rpm_min,
        rpm_max,
    }
}

const fn gear(teeth: i32, color: &'static str, code: &'static str) -> GearSeed {
    GearSeed { teeth, color, code }
}

pub const CHASSIS: [ChassisSeed; 10] = [
    chassis("MS", "MS Chassis", Double, Center),
    chassis("MA", "MA Chassis", Double, Center),
    chassis("AR", "AR Chassis", Single, Rear),
    chassis("VZ", "VZ Chassis", Single, Rear),
    chassis("VS", "VS Chassis", Single, Rear),
    chassis("Super-II", "Super-II Chassis", Single, Rear),
    chassis("Super-TZ", "Super-TZ Chassis", Single, Rear),
    chassis("Super-XX", "Super-XX Chassis", Single, Rear),
    chassis("FM-A", "FM-A Chassis", Single, Front),
    chassis("Super FM", "Super FM Chassis", Single, Front),
];

pub const MOTORS: [MotorSeed; 15] = [
    motor("Normal Motor", Single, Stock, 12000, 13000),
    motor("Torque-Tuned 2", Single, Tuned, 12800, 14700),
    motor("Atomic-Tuned 2", Single, Tuned, 12700, 14900),
    motor("Rev-Tuned 2", Single, Tuned, 13400, 15200),
    motor("Light-Dash", Single, Dash, 14600, 17800),
    motor("Hyper-Dash 3", Single, Dash, 17200, 21200),
    motor("Power-Dash", Single, Dash, 19900, 23600),
    motor("Sprint-Dash", Single, Dash, 20700, 27200),
    motor("Mach-Dash", Single, Dash, 25000, 28000),
    motor("Torque-Tuned 2 PRO", Double, Tuned, 12200, 14400),
    motor("Atomic-Tuned 2 PRO", Double, Tuned, 12300, 14500),
    motor("Rev-Tuned 2 PRO", Double, Tuned, 13200, 14900),
    motor("Light-Dash PRO", Double, Dash, 14000, 17800),
    motor("Hyper-Dash PRO", Double, Dash, 17200, 21200),
    motor("Mach-Dash PRO", Double, Dash, 20000, 24500),
];

/// Single-shaft pairs are spur + pinion; double-shaft pairs are spur +
/// counter gear and are listed without tooth counts.
pub const GEAR_RATIOS: [GearRatioSeed; 8] = [
    GearRatioSeed {
        ratio: "3.5:1",
        ratio_value: 3.5,
        shaft_type: Single,
        gear1: gear(35, "Yellow", "G18"),
        gear2: gear(10, "Light Blue", "G17"),
    },
    GearRatioSeed {
        ratio: "3.7:1",
        ratio_value: 3.7,
        shaft_type: Single,
        gear1: gear(37, "Yellow", "G18"),
        gear2: gear(10, "Green", "G24"),
    },
    GearRatioSeed {
        ratio: "4:1",
        ratio_value: 4.0,
        shaft_type: Single,
        gear1: gear(36, "Light Brown", "G11"),
        gear2: gear(9, "Black", "G14"),
    },
    GearRatioSeed {
        ratio: "4.2:1",
        ratio_value: 4.2,
        shaft_type: Single,
        gear1: gear(38, "Light Brown", "G11"),
        gear2: gear(9, "Red", "G9"),
    },
    GearRatioSeed {
        ratio: "5:1",
        ratio_value: 5.0,
        shaft_type: Single,
        gear1: gear(40, "Light Green", "G6"),
        gear2: gear(8, "Blue", "G10"),
    },
    GearRatioSeed {
        ratio: "3.5:1",
        ratio_value: 3.5,
        shaft_type: Double,
        gear1: gear(0, "Pink", "G22"),
        gear2: gear(0, "Light Green", "G21"),
    },
    GearRatioSeed {
        ratio: "3.7:1",
        ratio_value: 3.7,
        shaft_type: Double,
        gear1: gear(0, "Pink", "G22"),
        gear2: gear(0, "Yellow", "G23"),
    },
    GearRatioSeed {
        ratio: "4:1",
        ratio_value: 4.0,
        shaft_type: Double,
        gear1: gear(0, "Orange", "G20"),
        gear2: gear(0, "Blue", "G19"),
    },
];

/// Rows inserted by one [`seed_if_empty`] call, per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub chassis: usize,
    pub motors: usize,
    pub gear_ratios: usize,
}

impl SeedReport {
    pub fn is_noop(&self) -> bool {
        self.chassis == 0 && self.motors == 0 && self.gear_ratios == 0
    }
}

/// Seed every empty reference table. Tables that already hold rows are left
/// untouched, so calling this repeatedly is safe.
pub async fn seed_if_empty(pool: &SqlitePool, feed: &ChangeFeed) -> StoreResult<SeedReport> {
    // Dropping the transaction before commit rolls it back, so a cancelled
    // seed never hands a connection with an open transaction back to the pool.
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let report = match seed_tables(&mut tx).await {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "reference seeding failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback after failed seed also failed");
            }
            return Err(e);
        }
    };

    tx.commit().await?;

    if report.is_noop() {
        debug!("reference catalog already seeded");
    } else {
        info!(
            chassis = report.chassis,
            motors = report.motors,
            gear_ratios = report.gear_ratios,
            "seeded reference catalog"
        );
        let mut touched = Vec::with_capacity(3);
        if report.chassis > 0 {
            touched.push(Table::ChassisRef);
        }
        if report.motors > 0 {
            touched.push(Table::MotorRef);
        }
        if report.gear_ratios > 0 {
            touched.push(Table::GearRatioRef);
        }
        feed.publish(&touched);
    }

    Ok(report)
}

async fn seed_tables(conn: &mut SqliteConnection) -> StoreResult<SeedReport> {
    let mut report = SeedReport::default();

    if count_kind(conn, RefKind::Chassis).await? == 0 {
        for c in &CHASSIS {
            sqlx::query(
                "INSERT INTO chassis_ref (code, name, shaft_type, motor_position) VALUES (?, ?, ?, ?)",
            )
            .bind(c.code)
            .bind(c.name)
            .bind(c.shaft_type.as_str())
            .bind(c.motor_position.as_str())
            .execute(&mut *conn)
            .await?;
        }
        report.chassis = CHASSIS.len();
    }

    if count_kind(conn, RefKind::Motor).await? == 0 {
        for m in &MOTORS {
            sqlx::query(
                "INSERT INTO motor_ref (name, shaft_type, category, rpm_min, rpm_max) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(m.name)
            .bind(m.shaft_type.as_str())
            .bind(m.category.as_str())
            .bind(m.rpm_min)
            .bind(m.rpm_max)
            .execute(&mut *conn)
            .await?;
        }
        report.motors = MOTORS.len();
    }

    if count_kind(conn, RefKind::GearRatio).await? == 0 {
        for g in &GEAR_RATIOS {
            sqlx::query(
                r#"
                INSERT INTO gear_ratio_ref (ratio, ratio_value, shaft_type,
                                            gear1_teeth, gear1_color, gear1_code,
                                            gear2_teeth, gear2_color, gear2_code)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(g.ratio)
            .bind(g.ratio_value)
            .bind(g.shaft_type.as_str())
            .bind(g.gear1.teeth)
            .bind(g.gear1.color)
            .bind(g.gear1.code)
            .bind(g.gear2.teeth)
            .bind(g.gear2.color)
            .bind(g.gear2.code)
            .execute(&mut *conn)
            .await?;
        }
        report.gear_ratios = GEAR_RATIOS.len();
    }

    Ok(report)
}
