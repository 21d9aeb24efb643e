use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};

use super::{ProductCatalog, ProductSnapshot};
use crate::entity::{
    products::{Column as ProductCol, Entity as Products, Model as ProductModel},
    sea_orm_active_enums::ProductStatus,
};

/// Catalog lookups served straight from the `products` table.
pub struct DbProductCatalog {
    orm: DatabaseConnection,
}

impl DbProductCatalog {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl ProductCatalog for DbProductCatalog {
    async fn find_product(&self, id: i64) -> Result<Option<ProductSnapshot>, DbErr> {
        let product = Products::find_by_id(id)
            .filter(ProductCol::IsDeleted.eq(false))
            .one(&self.orm)
            .await?;
        Ok(product.map(snapshot_from_entity))
    }

    async fn hold_product(&self, txn: &DatabaseTransaction, id: i64) -> Result<bool, DbErr> {
        set_status(txn, id, ProductStatus::OnSale, ProductStatus::Locked).await
    }

    async fn release_product(&self, txn: &DatabaseTransaction, id: i64) -> Result<bool, DbErr> {
        set_status(txn, id, ProductStatus::Locked, ProductStatus::OnSale).await
    }

    async fn mark_sold(&self, txn: &DatabaseTransaction, id: i64) -> Result<bool, DbErr> {
        set_status(txn, id, ProductStatus::Locked, ProductStatus::Sold).await
    }
}

async fn set_status(
    txn: &DatabaseTransaction,
    id: i64,
    from: ProductStatus,
    to: ProductStatus,
) -> Result<bool, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let result = Products::update_many()
        .col_expr(ProductCol::Status, Expr::value(to))
        .col_expr(ProductCol::UpdatedAt, Expr::value(now))
        .filter(ProductCol::Id.eq(id))
        .filter(ProductCol::Status.eq(from))
        .filter(ProductCol::IsDeleted.eq(false))
        .exec(txn)
        .await?;
    Ok(result.rows_affected == 1)
}

fn snapshot_from_entity(model: ProductModel) -> ProductSnapshot {
    // Image urls are a JSON array; an unreadable column degrades to no images.
    let image_urls = serde_json::from_str(&model.image_urls).unwrap_or_else(|err| {
        tracing::warn!(product_id = model.id, error = %err, "unreadable product image urls");
        Vec::new()
    });

    ProductSnapshot {
        id: model.id,
        seller_id: model.seller_id,
        title: model.title,
        description: model.description,
        image_urls,
        price: model.price,
        status: model.status,
    }
}
