//! Core data models.
//!
//! Reference rows (chassis, motors, gear ratios) are read-only after seeding.
//! [`CarProfileRow`] mirrors the `car_profile` table column for column;
//! [`CarProfile`] is the shape handed to callers by the query service.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════════════
// Enumerations
// ═══════════════════════════════════════════════════════════════════════

/// Single-shaft motors drive one axle; double-shaft motors drive both.
/// Chassis, motors and gear ratios are only compatible within one shaft type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaftType {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorPosition {
    Front,
    Center,
    Rear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorCategory {
    Stock,
    Tuned,
    Dash,
}

/// Error returned when a stored or user-supplied enum label is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($label => Ok($ty::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(ShaftType, "shaft type", { Single => "single", Double => "double" });
text_enum!(MotorPosition, "motor position", { Front => "front", Center => "center", Rear => "rear" });
text_enum!(MotorCategory, "motor category", { Stock => "stock", Tuned => "tuned", Dash => "dash" });

/// The three reference kinds a profile can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Chassis,
    Motor,
    GearRatio,
}

impl RefKind {
    pub const ALL: [RefKind; 3] = [RefKind::Chassis, RefKind::Motor, RefKind::GearRatio];

    pub fn table(self) -> &'static str {
        match self {
            RefKind::Chassis => "chassis_ref",
            RefKind::Motor => "motor_ref",
            RefKind::GearRatio => "gear_ratio_ref",
        }
    }

    /// Foreign-key column on `car_profile` pointing at this kind.
    pub fn profile_column(self) -> &'static str {
        match self {
            RefKind::Chassis => "chassis_ref_id",
            RefKind::Motor => "motor_ref_id",
            RefKind::GearRatio => "gear_ratio_ref_id",
        }
    }
}

text_enum!(RefKind, "reference kind", { Chassis => "chassis", Motor => "motor", GearRatio => "gear_ratio" });

fn decode_enum<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: UnknownVariant| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Reference rows
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChassisRef {
    pub id: i64,
    /// Short mnemonic such as `MS` or `Super-II`.
    pub code: String,
    pub name: String,
    pub shaft_type: ShaftType,
    pub motor_position: MotorPosition,
}

impl ChassisRef {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            shaft_type: decode_enum(row, "shaft_type")?,
            motor_position: decode_enum(row, "motor_position")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorRef {
    pub id: i64,
    pub name: String,
    pub shaft_type: ShaftType,
    pub category: MotorCategory,
    pub rpm_min: i32,
    pub rpm_max: i32,
}

impl MotorRef {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            shaft_type: decode_enum(row, "shaft_type")?,
            category: decode_enum(row, "category")?,
            rpm_min: row.try_get("rpm_min")?,
            rpm_max: row.try_get("rpm_max")?,
        })
    }
}

/// One gear of a gear-ratio pair. `teeth` is 0 where the pair is sold as a
/// set and the individual counts are not listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GearDescriptor {
    pub teeth: i32,
    pub color: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GearRatioRef {
    pub id: i64,
    /// Display label, e.g. `3.5:1`.
    pub ratio: String,
    pub ratio_value: f64,
    pub shaft_type: ShaftType,
    /// Spur gear.
    pub gear1: GearDescriptor,
    /// Pinion (single shaft) or counter gear (double shaft).
    pub gear2: GearDescriptor,
}

impl GearRatioRef {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            ratio: row.try_get("ratio")?,
            ratio_value: row.try_get("ratio_value")?,
            shaft_type: decode_enum(row, "shaft_type")?,
            gear1: GearDescriptor {
                teeth: row.try_get("gear1_teeth")?,
                color: row.try_get("gear1_color")?,
                code: row.try_get("gear1_code")?,
            },
            gear2: GearDescriptor {
                teeth: row.try_get("gear2_teeth")?,
                color: row.try_get("gear2_color")?,
                code: row.try_get("gear2_code")?,
            },
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Car profile: storage row
// ═══════════════════════════════════════════════════════════════════════

/// Column list of `car_profile`, in table order.
pub const PROFILE_COLUMNS: &str = "id, name, chassis_ref_id, motor_ref_id, gear_ratio_ref_id, \
     motor_break_in_status, motor_break_in_date, motor_run_count, custom_mod_notes, \
     tire_front_type, tire_front_material, tire_front_diameter_mm, \
     tire_rear_type, tire_rear_material, tire_rear_diameter_mm, \
     wheel_type, wheel_material, roller_config_json, damper_config_json, brake_config_json, \
     body_type, body_aero_notes, total_weight_g, battery_type, battery_brand, \
     tags, thumbnail_path, created_at, updated_at";

/// A `car_profile` row as stored. `tags` is the comma-joined form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarProfileRow {
    pub id: i64,
    pub name: String,
    pub chassis_ref_id: Option<i64>,
    pub motor_ref_id: Option<i64>,
    pub gear_ratio_ref_id: Option<i64>,
    pub motor_break_in_status: bool,
    pub motor_break_in_date: Option<i64>,
    pub motor_run_count: i64,
    pub custom_mod_notes: Option<String>,
    pub tire_front_type: Option<String>,
    pub tire_front_material: Option<String>,
    pub tire_front_diameter_mm: Option<f64>,
    pub tire_rear_type: Option<String>,
    pub tire_rear_material: Option<String>,
    pub tire_rear_diameter_mm: Option<f64>,
    pub wheel_type: Option<String>,
    pub wheel_material: Option<String>,
    pub roller_config_json: Option<String>,
    pub damper_config_json: Option<String>,
    pub brake_config_json: Option<String>,
    pub body_type: Option<String>,
    pub body_aero_notes: Option<String>,
    pub total_weight_g: Option<f64>,
    pub battery_type: Option<String>,
    pub battery_brand: Option<String>,
    pub tags: Option<String>,
    pub thumbnail_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CarProfileRow {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            chassis_ref_id: row.try_get("chassis_ref_id")?,
            motor_ref_id: row.try_get("motor_ref_id")?,
            gear_ratio_ref_id: row.try_get("gear_ratio_ref_id")?,
            motor_break_in_status: row.try_get("motor_break_in_status")?,
            motor_break_in_date: row.try_get("motor_break_in_date")?,
            motor_run_count: row.try_get("motor_run_count")?,
            custom_mod_notes: row.try_get("custom_mod_notes")?,
            tire_front_type: row.try_get("tire_front_type")?,
            tire_front_material: row.try_get("tire_front_material")?,
            tire_front_diameter_mm: row.try_get("tire_front_diameter_mm")?,
            tire_rear_type: row.try_get("tire_rear_type")?,
            tire_rear_material: row.try_get("tire_rear_material")?,
            tire_rear_diameter_mm: row.try_get("tire_rear_diameter_mm")?,
            wheel_type: row.try_get("wheel_type")?,
            wheel_material: row.try_get("wheel_material")?,
            roller_config_json: row.try_get("roller_config_json")?,
            damper_config_json: row.try_get("damper_config_json")?,
            brake_config_json: row.try_get("brake_config_json")?,
            body_type: row.try_get("body_type")?,
            body_aero_notes: row.try_get("body_aero_notes")?,
            total_weight_g: row.try_get("total_weight_g")?,
            battery_type: row.try_get("battery_type")?,
            battery_brand: row.try_get("battery_brand")?,
            tags: row.try_get("tags")?,
            thumbnail_path: row.try_get("thumbnail_path")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A profile row with its references resolved. A null foreign key, or one
/// whose target is gone, yields `None` for that reference.
#[derive(Debug, Clone, PartialEq)]
pub struct CarProfileWithRefs {
    pub profile: CarProfileRow,
    pub chassis: Option<ChassisRef>,
    pub motor: Option<MotorRef>,
    pub gear_ratio: Option<GearRatioRef>,
}

// ═══════════════════════════════════════════════════════════════════════
// Car profile: domain shape
// ═══════════════════════════════════════════════════════════════════════

/// Motor wear tracking, independent of which motor is fitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorUsage {
    pub broken_in: bool,
    /// Epoch milliseconds.
    pub break_in_date: Option<i64>,
    pub run_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TireSpec {
    pub tire_type: Option<String>,
    pub material: Option<String>,
    pub diameter_mm: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TireConfig {
    pub front: TireSpec,
    pub rear: TireSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelConfig {
    pub wheel_type: Option<String>,
    pub material: Option<String>,
}

/// A car configuration as seen by callers.
///
/// Writes use the `*_ref_id` fields. The resolved `chassis`, `motor` and
/// `gear_ratio` objects are filled in only by the by-id and list reads that
/// join the reference catalog; search and tag reads leave them `None`.
///
/// `created_at` of 0 means "not yet persisted"; the query service stamps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarProfile {
    pub id: i64,
    pub name: String,
    pub chassis_ref_id: Option<i64>,
    pub motor_ref_id: Option<i64>,
    pub gear_ratio_ref_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chassis: Option<ChassisRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motor: Option<MotorRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear_ratio: Option<GearRatioRef>,
    #[serde(default)]
    pub motor_usage: MotorUsage,
    pub custom_mod_notes: Option<String>,
    #[serde(default)]
    pub tires: TireConfig,
    pub wheels: Option<WheelConfig>,
    /// Opaque; stored and returned verbatim.
    pub roller_config_json: Option<String>,
    pub damper_config_json: Option<String>,
    pub brake_config_json: Option<String>,
    pub body_type: Option<String>,
    pub body_aero_notes: Option<String>,
    pub total_weight_g: Option<f64>,
    pub battery_type: Option<String>,
    pub battery_brand: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub thumbnail_path: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl CarProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parse_is_case_insensitive() {
        assert_eq!("Double".parse::<ShaftType>().unwrap(), ShaftType::Double);
        assert_eq!(" rear ".parse::<MotorPosition>().unwrap(), MotorPosition::Rear);
        assert_eq!("DASH".parse::<MotorCategory>().unwrap(), MotorCategory::Dash);
        assert_eq!("gear_ratio".parse::<RefKind>().unwrap(), RefKind::GearRatio);
    }

    #[test]
    fn test_enum_parse_rejects_unknown() {
        let err = "triple".parse::<ShaftType>().unwrap_err();
        assert_eq!(err.kind, "shaft type");
        assert!(err.to_string().contains("triple"));
    }

    #[test]
    fn test_ref_kind_columns() {
        assert_eq!(RefKind::Chassis.profile_column(), "chassis_ref_id");
        assert_eq!(RefKind::Motor.table(), "motor_ref");
        assert_eq!(RefKind::GearRatio.profile_column(), "gear_ratio_ref_id");
    }

    #[test]
    fn test_profile_serde_skips_unresolved_refs() {
        let profile = CarProfile::new("Speed King");
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("chassis").is_none());
        assert_eq!(json["name"], "Speed King");
        assert_eq!(json["tags"], serde_json::json!([]));
    }
}
