use std::sync::Arc;

use common::storage::ObjectStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::tenant::TenantHosts;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub object_store: Arc<dyn ObjectStore>,
    pub tenant_hosts: Arc<TenantHosts>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        config: AppConfig,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        let tenant_hosts = Arc::new(TenantHosts::from_config(&config.portfolio));
        Self {
            db,
            config,
            object_store,
            tenant_hosts,
        }
    }
}
