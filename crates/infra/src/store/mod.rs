//! Ledger persistence boundary.
//!
//! A store holds two things: the mutable stock location records and the
//! append-only transaction log. The only write path is [`LedgerStore::commit`],
//! which applies a [`hotelstock_ledger::LedgerCommit`] all-or-nothing.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{ItemFilter, LedgerStore, StoreError};
