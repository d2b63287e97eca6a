pub mod http;
pub mod router;
pub mod server;
pub mod subsystems;

use membrane_core::MembraneConfig;
use sqlx::PgPool;

use crate::subsystems::VectorMemory;

/// Everything a request handler needs, shared by the IPC and HTTP servers.
#[derive(Clone)]
pub struct AppState {
    pub memory: VectorMemory,
    /// `None` when no database is configured or reachable.
    pub pool: Option<PgPool>,
    pub config: MembraneConfig,
}
