//! # Bandbook Common Library
//!
//! Shared code for the Bandbook services:
//! - Domain models (songs, setlists, sets)
//! - Database initialization and runtime settings
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
