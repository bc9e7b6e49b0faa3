// src/process/mod.rs
//! Per-source processing of raw collections into output rows.

pub mod fred;
pub mod reddit;
pub mod trends;

pub use crate::process::fred::{combine_observations, Observation};
pub use crate::process::reddit::{process_posts, Post, PostStats};
pub use crate::process::trends::{daily_rows, DailyInterest};
