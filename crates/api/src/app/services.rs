use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use hotelstock_infra::{
    Directory, InMemoryDirectory, InMemoryLedgerStore, LedgerConfig, LedgerMutationService, LedgerReconciler,
    LedgerReconstructionService, LedgerStore, PostgresDirectory, PostgresLedgerStore, StoreError,
};

pub type SharedStore = Arc<dyn LedgerStore>;
pub type SharedDirectory = Arc<dyn Directory>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to connect to Postgres: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("failed to prepare the ledger schema: {0}")]
    Schema(#[from] StoreError),
}

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub mutations: LedgerMutationService<SharedStore, SharedDirectory>,
    pub reports: LedgerReconstructionService<SharedStore, SharedDirectory>,
    pub reconciler: LedgerReconciler<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore, directory: SharedDirectory, config: &LedgerConfig) -> Self {
        Self {
            mutations: LedgerMutationService::new(store.clone(), directory.clone(), config.max_commit_retries),
            reports: LedgerReconstructionService::new(
                store.clone(),
                directory,
                config.report_offset,
                config.max_item_report_days,
            ),
            reconciler: LedgerReconciler::new(store),
        }
    }

    /// In-memory wiring. The directory handle is returned so callers can register locations.
    pub fn in_memory(config: &LedgerConfig) -> (Self, Arc<InMemoryDirectory>) {
        let store: SharedStore = Arc::new(InMemoryLedgerStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let services = Self::new(store, directory.clone(), config);
        (services, directory)
    }
}

/// Postgres stores when `DATABASE_URL` is configured, in-memory ones otherwise.
pub async fn build_services(config: &LedgerConfig) -> Result<AppServices, StartupError> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url).await?;
            let store = PostgresLedgerStore::new(pool.clone());
            store.ensure_schema().await?;
            info!("using Postgres ledger store");

            let store: SharedStore = Arc::new(store);
            let directory: SharedDirectory = Arc::new(PostgresDirectory::new(pool));
            Ok(AppServices::new(store, directory, config))
        }
        None => {
            let (services, directory) = AppServices::in_memory(config);
            let hotel_id = directory.add_hotel("Demo Hotel");
            let department_id = directory.add_department("Store Room");
            info!(%hotel_id, %department_id, "DATABASE_URL not set; using in-memory ledger with a demo location");
            Ok(services)
        }
    }
}
