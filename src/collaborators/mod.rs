//! Narrow interfaces to the parts of the marketplace this engine consumes but does not own.

use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, DbErr};
use serde_json::Value;

pub mod audit;
pub mod catalog;
pub mod notification;

use crate::entity::sea_orm_active_enums::ProductStatus;

/// What checkout needs to know about a live product.
#[derive(Debug, Clone)]
pub struct ProductSnapshot {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
    /// Minor units.
    pub price: i64,
    pub status: ProductStatus,
}

impl ProductSnapshot {
    pub fn is_on_sale(&self) -> bool {
        self.status == ProductStatus::OnSale
    }
}

/// Product lookups plus the listing status changes an order drives.
///
/// The status calls run inside the caller's transaction and are conditional: each returns `false`
/// when the product was not in the status the change starts from.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: i64) -> Result<Option<ProductSnapshot>, DbErr>;

    /// ON_SALE -> LOCKED at checkout.
    async fn hold_product(&self, txn: &DatabaseTransaction, id: i64) -> Result<bool, DbErr>;

    /// LOCKED -> ON_SALE when the order is cancelled or its payment expires.
    async fn release_product(&self, txn: &DatabaseTransaction, id: i64) -> Result<bool, DbErr>;

    /// LOCKED -> SOLD once the buyer confirms receipt.
    async fn mark_sold(&self, txn: &DatabaseTransaction, id: i64) -> Result<bool, DbErr>;
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<i64>,
    pub action: &'static str,
    pub target_type: &'static str,
    pub target_id: Option<String>,
    pub outcome: &'static str,
    pub metadata: Option<Value>,
}

impl AuditEntry {
    pub fn success(
        actor_id: Option<i64>,
        action: &'static str,
        target_type: &'static str,
        target_id: impl ToString,
    ) -> Self {
        Self {
            actor_id,
            action,
            target_type,
            target_id: Some(target_id.to_string()),
            outcome: "success",
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), DbErr>;
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient_id: i64,
    pub title: String,
    pub content: String,
    pub source_order_id: Option<i64>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), DbErr>;
}
