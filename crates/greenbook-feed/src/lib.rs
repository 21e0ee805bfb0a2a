//! Price state store.
//!
//! Reconstructs per-market order books from the stream's image and
//! delta messages. The engine reads point-in-time snapshots; writers
//! replace whole-market state under a per-market lock so a reader never
//! observes a half-applied merge.

pub mod feed_task;
pub mod price_cache;

pub use feed_task::FeedTask;
pub use price_cache::PriceCache;
