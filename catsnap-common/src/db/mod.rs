//! Database schema, models and queries
//!
//! Query functions take a `&mut SqliteConnection` so they run inside whatever
//! transaction the caller holds (usually the request's).

pub mod albums;
pub mod images;
pub mod init;
pub mod models;
pub mod tags;

pub use init::*;
pub use models::*;
