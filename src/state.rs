use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    collaborators::{
        AuditSink, NotificationSink, ProductCatalog, audit::DbAuditSink,
        catalog::DbProductCatalog, notification::DbNotificationSink,
    },
    config::AppConfig,
    reconciler::ReconcilerStatus,
};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub audit: Arc<dyn AuditSink>,
    pub notifier: Arc<dyn NotificationSink>,
    pub reconciler: ReconcilerStatus,
}

impl AppState {
    /// State wired to the database-backed collaborators.
    pub fn new(orm: DatabaseConnection, config: AppConfig) -> Self {
        Self {
            catalog: Arc::new(DbProductCatalog::new(orm.clone())),
            audit: Arc::new(DbAuditSink::new(orm.clone())),
            notifier: Arc::new(DbNotificationSink::new(orm.clone())),
            reconciler: ReconcilerStatus::default(),
            config: Arc::new(config),
            orm,
        }
    }
}
