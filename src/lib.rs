//! # Mini 4WD Lab
//!
//! A local-first catalogue of Mini 4WD car configurations.
//!
//! Mini 4WD Lab keeps a fixed reference catalog of chassis, motors and gear
//! ratios next to user-owned car profiles in a single SQLite file, and
//! exposes them through a query service whose reads are live
//! subscriptions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ ProfileService│──▶│ ProfileStore │──▶│      SQLite      │
//! │ normalize/map │   │  CRUD + join │   │ car_profile      │
//! └──────┬───────┘   └──────┬───────┘   │ chassis/motor/   │
//!        │                  │           │ gear_ratio _ref  │
//!        │            ┌─────▼──────┐    └────────▲─────────┘
//!        │            │ ChangeFeed │             │
//!        ▼            └─────┬──────┘    ┌────────┴─────────┐
//!  Subscription ◀───────────┘           │ ReferenceCatalog │
//!                                       │   + seed         │
//!                                       └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! m4lab init                                  # create database, seed catalog
//! m4lab catalog chassis --shaft double
//! m4lab profile create "Speed Demon" --chassis MS --tags racing,speed
//! m4lab profile search Speed
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`models`] | Reference rows, profile row, domain profile |
//! | [`mapper`] | Tag normalization and row/domain mapping |
//! | [`live`] | Change feed and live subscriptions |
//! | [`catalog`] | Reference catalog queries |
//! | [`seed`] | Reference dataset and idempotent seeding |
//! | [`store`] | Profile persistence |
//! | [`service`] | Profile query service |
//! | [`garage`] | Wiring of the above |
//! | [`error`] | Error types |

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod garage;
pub mod live;
pub mod logging;
pub mod mapper;
pub mod migrate;
pub mod models;
pub mod seed;
pub mod service;
pub mod store;
