//! # catsnap common library
//!
//! Shared code for the catsnap service:
//! - Error type used by storage and configuration code
//! - Configuration loading and root folder resolution
//! - SQLite schema, models and queries
//! - Key-value document store (tag → filenames index)

pub mod config;
pub mod db;
pub mod document;
pub mod error;

pub use error::{Error, Result};
