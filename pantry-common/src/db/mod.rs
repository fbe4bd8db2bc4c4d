//! Catalog database models and schema

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
