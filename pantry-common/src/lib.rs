//! # Pantry Common Library
//!
//! Shared code for the Pantry catalog services:
//! - Error taxonomy
//! - Bootstrap configuration (TOML + environment)
//! - Catalog schema initialization and row models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
