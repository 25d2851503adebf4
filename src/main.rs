//! # Mini 4WD Lab CLI (`m4lab`)
//!
//! The `m4lab` binary manages the reference catalog and car profiles stored
//! in a local SQLite database.
//!
//! ## Usage
//!
//! ```bash
//! m4lab --config ./config/m4lab.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `m4lab init` | Create the database, run migrations, seed the catalog |
//! | `m4lab seed` | Seed any empty reference table |
//! | `m4lab catalog chassis\|motors\|gears` | List reference rows |
//! | `m4lab catalog remove <kind> <id>` | Delete a reference row |
//! | `m4lab profile create <name>` | Create a car profile |
//! | `m4lab profile update <id>` | Change fields of a car profile |
//! | `m4lab profile show <id>` | Show one profile with references resolved |
//! | `m4lab profile list` | List every profile |
//! | `m4lab profile search <query>` | Name substring search |
//! | `m4lab profile tag <tag>` | Tag substring filter |
//! | `m4lab profile by-ref <kind> <id>` | Profiles using a reference row |
//! | `m4lab profile delete <id>` | Delete a profile |
//! | `m4lab profile check-name <name>` | Check whether a name is free |
//!
//! ## Examples
//!
//! ```bash
//! m4lab init
//! m4lab catalog motors --shaft double --category dash
//! m4lab profile create "Speed Demon" --chassis MS --motor 14 --tags racing,speed
//! m4lab --json profile show 1
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use mini4wd_lab::config::{self, Config};
use mini4wd_lab::garage::Garage;
use mini4wd_lab::live::Subscription;
use mini4wd_lab::logging;
use mini4wd_lab::models::{CarProfile, MotorCategory, RefKind, ShaftType};
use mini4wd_lab::service::ProfileRepository;

/// Mini 4WD Lab: a local catalogue of Mini 4WD car configurations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "m4lab",
    about = "Mini 4WD Lab: reference catalog and car profile store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/m4lab.toml")]
    config: PathBuf,

    /// Print reads as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and seed the reference catalog.
    ///
    /// Idempotent: running it again leaves existing rows alone.
    Init,

    /// Seed any reference table that is still empty.
    Seed,

    /// Browse the reference catalog.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Manage car profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List chassis.
    Chassis {
        #[arg(long)]
        shaft: Option<ShaftType>,
    },
    /// List motors.
    Motors {
        #[arg(long)]
        shaft: Option<ShaftType>,
        #[arg(long)]
        category: Option<MotorCategory>,
    },
    /// List gear ratios.
    Gears {
        #[arg(long)]
        shaft: Option<ShaftType>,
    },
    /// Delete a reference row. Profiles using it keep their other fields.
    Remove {
        /// `chassis`, `motor` or `gear_ratio`.
        kind: RefKind,
        id: i64,
    },
}

/// Fields shared by `profile create` and `profile update`.
#[derive(clap::Args)]
struct ProfileFields {
    /// Chassis code, e.g. `MS`.
    #[arg(long)]
    chassis: Option<String>,
    /// Motor reference id.
    #[arg(long)]
    motor: Option<i64>,
    /// Gear ratio reference id.
    #[arg(long)]
    gear: Option<i64>,
    /// Comma-separated tags. Replaces existing tags on update.
    #[arg(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    body_type: Option<String>,
    #[arg(long)]
    weight: Option<f64>,
    #[arg(long)]
    battery_type: Option<String>,
    #[arg(long)]
    battery_brand: Option<String>,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Create a car profile.
    Create {
        name: String,
        #[command(flatten)]
        fields: ProfileFields,
    },
    /// Change fields of an existing profile.
    Update {
        id: i64,
        /// New name.
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ProfileFields,
    },
    /// Show one profile with references resolved.
    Show { id: i64 },
    /// List every profile, most recently updated first.
    List,
    /// Profiles whose name contains the query.
    Search { query: String },
    /// Profiles whose tags contain the given text.
    Tag { tag: String },
    /// Profiles that use a reference row.
    ByRef { kind: RefKind, id: i64 },
    /// Delete a profile.
    Delete { id: i64 },
    /// Check whether a name is free.
    CheckName {
        name: String,
        /// Ignore this profile id (the one being renamed).
        #[arg(long, default_value_t = 0)]
        exclude: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.logging)?;

    let garage = Garage::open(&cfg).await?;

    match cli.command {
        Commands::Init => {
            let report = garage.initialize().await?;
            println!("Database initialized successfully.");
            print_seed_report(&report);
        }
        Commands::Seed => {
            let report = garage.initialize().await?;
            print_seed_report(&report);
        }
        Commands::Catalog { action } => {
            seed_on_start(&cfg, &garage).await?;
            run_catalog(&garage, action, cli.json).await?;
        }
        Commands::Profile { action } => {
            seed_on_start(&cfg, &garage).await?;
            run_profile(&garage, action, cli.json).await?;
        }
    }

    garage.close().await;
    Ok(())
}

async fn seed_on_start(cfg: &Config, garage: &Garage) -> Result<()> {
    if cfg.startup.seed_on_start {
        garage.initialize().await?;
    }
    Ok(())
}

fn print_seed_report(report: &mini4wd_lab::seed::SeedReport) {
    if report.is_noop() {
        println!("Reference catalog already seeded.");
    } else {
        println!(
            "Seeded chassis: {}, motors: {}, gear ratios: {}",
            report.chassis, report.motors, report.gear_ratios
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Wait for the first snapshot of a live read.
async fn first_snapshot<T>(mut subscription: Subscription<T>) -> Result<T> {
    let snapshot = subscription
        .next()
        .await
        .context("subscription closed before delivering a snapshot")??;
    subscription.cancel();
    Ok(snapshot)
}

async fn run_catalog(garage: &Garage, action: CatalogAction, json: bool) -> Result<()> {
    let catalog = garage.catalog();

    match action {
        CatalogAction::Chassis { shaft } => {
            let rows = first_snapshot(catalog.watch_chassis(shaft)).await?;
            if json {
                return print_json(&rows);
            }
            for c in &rows {
                println!(
                    "{:>3}  {:<10} {:<18} {:<7} {}",
                    c.id, c.code, c.name, c.shaft_type, c.motor_position
                );
            }
            println!("{} chassis", rows.len());
        }
        CatalogAction::Motors { shaft, category } => {
            let mut rows = match category {
                Some(category) => catalog.motors_by_category(category).await?,
                None => first_snapshot(catalog.watch_motors(shaft)).await?,
            };
            if let (Some(_), Some(shaft)) = (category, shaft) {
                rows.retain(|m| m.shaft_type == shaft);
            }
            if json {
                return print_json(&rows);
            }
            for m in &rows {
                println!(
                    "{:>3}  {:<20} {:<7} {:<6} {}-{} rpm",
                    m.id, m.name, m.shaft_type, m.category, m.rpm_min, m.rpm_max
                );
            }
            println!("{} motors", rows.len());
        }
        CatalogAction::Gears { shaft } => {
            let rows = first_snapshot(catalog.watch_gear_ratios(shaft)).await?;
            if json {
                return print_json(&rows);
            }
            for g in &rows {
                println!(
                    "{:>3}  {:<8} {:<7} {} {} / {} {}",
                    g.id, g.ratio, g.shaft_type, g.gear1.code, g.gear1.color, g.gear2.code, g.gear2.color
                );
            }
            println!("{} gear ratios", rows.len());
        }
        CatalogAction::Remove { kind, id } => {
            if catalog.delete(kind, id).await? {
                println!("Deleted {} {}", kind, id);
            } else {
                println!("No {} with id {}", kind, id);
            }
        }
    }

    Ok(())
}

/// Copy the flags that were given onto `profile`, resolving the chassis code.
async fn apply_fields(garage: &Garage, profile: &mut CarProfile, fields: ProfileFields) -> Result<()> {
    if let Some(code) = fields.chassis {
        let chassis = garage
            .catalog()
            .chassis_by_code(&code)
            .await?
            .with_context(|| format!("Unknown chassis code: '{}'", code))?;
        profile.chassis_ref_id = Some(chassis.id);
    }
    if let Some(id) = fields.motor {
        if garage.catalog().get_motor(id).await?.is_none() {
            bail!("Unknown motor id: {}", id);
        }
        profile.motor_ref_id = Some(id);
    }
    if let Some(id) = fields.gear {
        if garage.catalog().get_gear_ratio(id).await?.is_none() {
            bail!("Unknown gear ratio id: {}", id);
        }
        profile.gear_ratio_ref_id = Some(id);
    }
    if let Some(tags) = fields.tags {
        profile.tags = tags;
    }
    if fields.notes.is_some() {
        profile.custom_mod_notes = fields.notes;
    }
    if fields.body_type.is_some() {
        profile.body_type = fields.body_type;
    }
    if fields.weight.is_some() {
        profile.total_weight_g = fields.weight;
    }
    if fields.battery_type.is_some() {
        profile.battery_type = fields.battery_type;
    }
    if fields.battery_brand.is_some() {
        profile.battery_brand = fields.battery_brand;
    }
    Ok(())
}

async fn run_profile(garage: &Garage, action: ProfileAction, json: bool) -> Result<()> {
    let profiles = garage.profiles();

    match action {
        ProfileAction::Create { name, fields } => {
            let mut profile = CarProfile::new(name);
            apply_fields(garage, &mut profile, fields).await?;
            let id = profiles.create(profile).await?;
            println!("Created profile {}", id);
        }
        ProfileAction::Update { id, name, fields } => {
            let mut profile = profiles
                .find(id)
                .await?
                .with_context(|| format!("Profile not found: {}", id))?;
            if let Some(name) = name {
                profile.name = name;
            }
            apply_fields(garage, &mut profile, fields).await?;
            profiles.update(profile).await?;
            println!("Updated profile {}", id);
        }
        ProfileAction::Show { id } => {
            let profile = first_snapshot(profiles.get_by_id(id))
                .await?
                .with_context(|| format!("Profile not found: {}", id))?;
            if json {
                return print_json(&profile);
            }
            print_profile(&profile);
        }
        ProfileAction::List => {
            let rows = first_snapshot(profiles.get_all()).await?;
            print_profiles(&rows, json)?;
        }
        ProfileAction::Search { query } => {
            let rows = first_snapshot(profiles.search(&query)).await?;
            print_profiles(&rows, json)?;
        }
        ProfileAction::Tag { tag } => {
            let rows = first_snapshot(profiles.get_by_tag(&tag)).await?;
            print_profiles(&rows, json)?;
        }
        ProfileAction::ByRef { kind, id } => {
            let rows = first_snapshot(profiles.get_by_reference(kind, id)).await?;
            print_profiles(&rows, json)?;
        }
        ProfileAction::Delete { id } => {
            profiles.delete(id).await?;
            println!("Deleted profile {}", id);
        }
        ProfileAction::CheckName { name, exclude } => {
            if profiles.is_name_unique(&name, exclude).await? {
                println!("available");
            } else {
                println!("taken");
            }
        }
    }

    Ok(())
}

fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn print_profiles(rows: &[CarProfile], json: bool) -> Result<()> {
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No profiles found.");
        return Ok(());
    }
    for p in rows {
        println!("{:>4}  {:<28} {}", p.id, p.name, p.tags.join(", "));
    }
    println!("{} profiles", rows.len());
    Ok(())
}

fn print_profile(p: &CarProfile) {
    println!("#{} {}", p.id, p.name);
    match &p.chassis {
        Some(c) => println!("  chassis:  {} ({}, {} shaft)", c.code, c.name, c.shaft_type),
        None => println!("  chassis:  -"),
    }
    match &p.motor {
        Some(m) => println!("  motor:    {} ({}, {}-{} rpm)", m.name, m.category, m.rpm_min, m.rpm_max),
        None => println!("  motor:    -"),
    }
    match &p.gear_ratio {
        Some(g) => println!("  gear:     {}", g.ratio),
        None => println!("  gear:     -"),
    }
    if p.motor_usage.broken_in || p.motor_usage.run_count > 0 {
        println!(
            "  runs:     {}{}",
            p.motor_usage.run_count,
            if p.motor_usage.broken_in { " (broken in)" } else { "" }
        );
    }
    if let Some(weight) = p.total_weight_g {
        println!("  weight:   {} g", weight);
    }
    if let Some(notes) = &p.custom_mod_notes {
        println!("  notes:    {}", notes);
    }
    if !p.tags.is_empty() {
        println!("  tags:     {}", p.tags.join(", "));
    }
    println!("  created:  {}", format_millis(p.created_at));
    println!("  updated:  {}", format_millis(p.updated_at));
}
