//! Market catalogue metadata.
//!
//! The stream feed omits slow-changing metadata (market names, venues,
//! runner names). A REST client fetches the catalogue; a cache refreshes
//! it periodically and keeps serving stale entries when a refresh fails.
//! The same client also serves one-off book snapshots for markets the
//! price store has not seen yet.

pub mod cache;
pub mod client;
pub mod error;

pub use cache::CatalogueCache;
pub use client::{CatalogueApi, RestCatalogueClient};
pub use error::{CatalogueError, CatalogueResult};
