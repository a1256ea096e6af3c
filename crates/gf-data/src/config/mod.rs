//! Configuration module

pub mod airtable_config;
pub mod fetch_config;

pub use airtable_config::*;
pub use fetch_config::*;
