use std::sync::Arc;

use custody_core::memory::MemoryStore;
use custody_core::transfer::TransferService;
use custody_db::{DbPool, PgDirectory, PgMovementLedger};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the service and config sit behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// Write orchestration plus read access to the movement ledger.
    pub transfers: TransferService,
    /// Server configuration (default language, backend selection).
    pub config: Arc<ServerConfig>,
    /// Database pool when running on Postgres; `None` for the in-memory backend.
    pub pool: Option<DbPool>,
}

impl AppState {
    /// State backed by PostgreSQL for both the ledger and the directory.
    pub fn postgres(config: ServerConfig, pool: DbPool) -> Self {
        let directory = Arc::new(PgDirectory::new(pool.clone()));
        let transfers = TransferService::new(
            Arc::new(PgMovementLedger::new(pool.clone())),
            directory.clone(),
            directory,
        );
        Self {
            transfers,
            config: Arc::new(config),
            pool: Some(pool),
        }
    }

    /// State backed by a process-local store.
    pub fn memory(config: ServerConfig, store: Arc<MemoryStore>) -> Self {
        let transfers = TransferService::new(store.clone(), store.clone(), store);
        Self {
            transfers,
            config: Arc::new(config),
            pool: None,
        }
    }
}
