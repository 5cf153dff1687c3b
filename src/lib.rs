//! Flash offers - capacity-bounded venue promotions
//!
//! Venues publish short-lived offers with a fixed number of claims. Nearby or
//! loyal users are notified once, claim with a race-safe reservation, and
//! redeem a single-use code at the venue.
//!
//! # Architecture
//! - `storage`: SeaORM persistence, including the atomic claim transaction
//! - `services`: offer store, rate limiter, targeting, claims, redemption,
//!   analytics funnel and the publishing workflow
//! - `api`: HTTP endpoints and middleware
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging setup
//! - `utils`: Geodistance and redemption tokens

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
