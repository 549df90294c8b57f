use std::sync::Arc;

use vizdb_storage::{DataSourceCatalog, Engine};

use crate::auth::SessionStore;
use crate::charts::ChartStore;
use crate::dashboards::DashboardStore;
use crate::queries::{InMemoryQueryStore, QueryStore, DEFAULT_MAX_RESULT_ROWS};
use crate::users::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub catalog: Arc<DataSourceCatalog>,
    pub users: Arc<UserStore>,
    pub sessions: Arc<SessionStore>,
    pub queries: Arc<dyn QueryStore>,
    pub charts: Arc<ChartStore>,
    pub dashboards: Arc<DashboardStore>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_query_store(Arc::new(InMemoryQueryStore::new(DEFAULT_MAX_RESULT_ROWS)))
    }

    /// The query store is injectable so the run path's partial-success
    /// policy can be exercised against a store that refuses writes.
    pub fn with_query_store(queries: Arc<dyn QueryStore>) -> Self {
        Self {
            engine: Arc::new(Engine::new()),
            catalog: Arc::new(DataSourceCatalog::new()),
            users: Arc::new(UserStore::new()),
            sessions: Arc::new(SessionStore::new()),
            queries,
            charts: Arc::new(ChartStore::new()),
            dashboards: Arc::new(DashboardStore::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
