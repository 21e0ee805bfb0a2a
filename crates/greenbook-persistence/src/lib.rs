//! Persisted state for the betting engine.
//!
//! Three families of records survive a restart: bets, the append-only
//! decision ledger, and the engine session (mode, counters, settings,
//! plugin descriptors). Bets and session state live as whole-file JSON
//! replaced atomically; the ledger is JSON Lines with daily rotation so
//! an interrupted write corrupts at most one line.
//!
//! Every store also runs memory-only (no directory) for tests.

pub mod bet_store;
pub mod error;
pub mod ledger;
pub mod session_store;

pub use bet_store::{BetStore, DailyStats};
pub use error::{PersistenceError, PersistenceResult};
pub use ledger::DecisionLedger;
pub use session_store::SessionStore;
