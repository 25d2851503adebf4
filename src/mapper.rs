//! Translation between `car_profile` rows and [`CarProfile`].
//!
//! Tags are normalized on the way in (see [`normalize_tags`]) and only split
//! on the way out; reads never re-normalize.

use crate::models::{
    CarProfile, CarProfileRow, CarProfileWithRefs, MotorUsage, TireConfig, TireSpec, WheelConfig,
};

/// Trim, lowercase, drop empties and de-duplicate, keeping first-seen order.
///
/// A comma is the storage separator, so an input like `"a,b"` becomes the
/// two tags `a` and `b`; what is written always reads back unchanged.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for part in tags.iter().flat_map(|t| t.as_ref().split(',')) {
        let tag = part.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Storage form of a tag list.
pub fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

/// Split the stored comma-joined form. `None` or an empty string gives an
/// empty list.
pub fn split_tags(stored: Option<&str>) -> Vec<String> {
    stored
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Stored counts outside `u32` saturate at the nearest bound.
fn clamp_run_count(stored: i64) -> u32 {
    u32::try_from(stored.clamp(0, i64::from(u32::MAX))).unwrap_or(u32::MAX)
}

/// Map a bare row. Reference objects stay `None`; the reference ids are kept.
pub fn to_domain_basic(row: CarProfileRow) -> CarProfile {
    let tags = split_tags(row.tags.as_deref());
    let wheels = if row.wheel_type.is_some() || row.wheel_material.is_some() {
        Some(WheelConfig {
            wheel_type: row.wheel_type,
            material: row.wheel_material,
        })
    } else {
        None
    };

    CarProfile {
        id: row.id,
        name: row.name,
        chassis_ref_id: row.chassis_ref_id,
        motor_ref_id: row.motor_ref_id,
        gear_ratio_ref_id: row.gear_ratio_ref_id,
        chassis: None,
        motor: None,
        gear_ratio: None,
        motor_usage: MotorUsage {
            broken_in: row.motor_break_in_status,
            break_in_date: row.motor_break_in_date,
            run_count: clamp_run_count(row.motor_run_count),
        },
        custom_mod_notes: row.custom_mod_notes,
        tires: TireConfig {
            front: TireSpec {
                tire_type: row.tire_front_type,
                material: row.tire_front_material,
                diameter_mm: row.tire_front_diameter_mm,
            },
            rear: TireSpec {
                tire_type: row.tire_rear_type,
                material: row.tire_rear_material,
                diameter_mm: row.tire_rear_diameter_mm,
            },
        },
        wheels,
        roller_config_json: row.roller_config_json,
        damper_config_json: row.damper_config_json,
        brake_config_json: row.brake_config_json,
        body_type: row.body_type,
        body_aero_notes: row.body_aero_notes,
        total_weight_g: row.total_weight_g,
        battery_type: row.battery_type,
        battery_brand: row.battery_brand,
        tags,
        thumbnail_path: row.thumbnail_path,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Map a joined row, carrying the resolved references along.
pub fn to_domain(joined: CarProfileWithRefs) -> CarProfile {
    let mut profile = to_domain_basic(joined.profile);
    profile.chassis = joined.chassis;
    profile.motor = joined.motor;
    profile.gear_ratio = joined.gear_ratio;
    profile
}

/// Flatten a domain profile into its row. Tags are joined as given; the
/// caller is responsible for normalizing them first.
pub fn to_row(profile: &CarProfile) -> CarProfileRow {
    let wheels = profile.wheels.clone().unwrap_or_default();

    CarProfileRow {
        id: profile.id,
        name: profile.name.clone(),
        chassis_ref_id: profile.chassis_ref_id,
        motor_ref_id: profile.motor_ref_id,
        gear_ratio_ref_id: profile.gear_ratio_ref_id,
        motor_break_in_status: profile.motor_usage.broken_in,
        motor_break_in_date: profile.motor_usage.break_in_date,
        motor_run_count: i64::from(profile.motor_usage.run_count),
        custom_mod_notes: profile.custom_mod_notes.clone(),
        tire_front_type: profile.tires.front.tire_type.clone(),
        tire_front_material: profile.tires.front.material.clone(),
        tire_front_diameter_mm: profile.tires.front.diameter_mm,
        tire_rear_type: profile.tires.rear.tire_type.clone(),
        tire_rear_material: profile.tires.rear.material.clone(),
        tire_rear_diameter_mm: profile.tires.rear.diameter_mm,
        wheel_type: wheels.wheel_type,
        wheel_material: wheels.material,
        roller_config_json: profile.roller_config_json.clone(),
        damper_config_json: profile.damper_config_json.clone(),
        brake_config_json: profile.brake_config_json.clone(),
        body_type: profile.body_type.clone(),
        body_aero_notes: profile.body_aero_notes.clone(),
        total_weight_g: profile.total_weight_g,
        battery_type: profile.battery_type.clone(),
        battery_brand: profile.battery_brand.clone(),
        tags: Some(join_tags(&profile.tags)),
        thumbnail_path: profile.thumbnail_path.clone(),
        created_at: profile.created_at,
        updated_at: profile.updated_at,
    }
}
