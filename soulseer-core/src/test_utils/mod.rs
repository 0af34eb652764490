// src/test_utils/mod.rs

pub mod helpers;

pub use helpers::{ManualClock, TestMarket};
