//! Infrastructure layer: stores, directory lookups, and the ledger services.

pub mod config;
pub mod directory;
pub mod error;
pub mod locks;
pub mod mutation;
pub mod reconciliation;
pub mod reconstruction;
pub mod store;


pub use config::{ConfigError, LedgerConfig};
pub use directory::{Directory, InMemoryDirectory, LocationRef, PostgresDirectory};
pub use error::LedgerError;
pub use locks::ItemLocks;
pub use mutation::{LedgerMutationService, TransferOutcome};
pub use reconciliation::{LedgerReconciler, ReconciliationReport};
pub use reconstruction::{LedgerReconstructionService, ReportScope};
pub use store::{InMemoryLedgerStore, ItemFilter, LedgerStore, PostgresLedgerStore, StoreError};
