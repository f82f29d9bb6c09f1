//! Core types for MasteryMap
//!
//! Error taxonomy, failure classification and configuration shared by the
//! storage, HTTP and CLI crates.

mod ai;
mod config;
pub mod constants;
mod database;
mod env_config;
mod error;

mod error_tests;

pub use ai::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use env_config::*;
pub use error::*;
