// src/lib.rs

pub mod db;
pub mod config;
pub mod clock;
pub mod auth;
pub mod repositories;
pub mod payments;
pub mod eventbus;
pub mod realtime;
pub mod services;
pub mod tasks;
pub mod seed;
pub mod test_utils;

pub use db::Database;
pub use config::MeteringConfig;
pub use soulseer_common::error::Error;
pub use soulseer_common::models;
