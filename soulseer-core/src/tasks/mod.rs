// src/tasks/mod.rs

pub mod balance_sweep;

pub use balance_sweep::{run_balance_sweep, spawn_balance_sweep_task};
