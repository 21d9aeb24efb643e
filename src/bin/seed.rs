use chrono::Utc;
use marketplace_trade::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        products::{ActiveModel as ProductActive, Column as ProductCol, Entity as Products},
        sea_orm_active_enums::ProductStatus,
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    services::auth_service::hash_secret,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin", "admin@example.com", "admin123", "admin").await?;
    let seller_id = ensure_user(&orm, "seller", "seller@example.com", "seller123", "user").await?;
    let buyer_id = ensure_user(&orm, "buyer", "buyer@example.com", "buyer123", "user").await?;
    seed_products(&orm, seller_id).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, Seller ID: {seller_id}, Buyer ID: {buyer_id} (payment password 123456)"
    );
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<i64> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        return Ok(existing.id);
    }

    let password_hash = hash_secret(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let payment_password_hash =
        hash_secret("123456").map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let user = UserActive {
        id: NotSet,
        username: Set(username.to_string()),
        nickname: Set(Some(format!("{username} (demo)"))),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        payment_password_hash: Set(Some(payment_password_hash)),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection, seller_id: i64) -> anyhow::Result<()> {
    let products = [
        ("Used mechanical keyboard", "Brown switches, lightly used", 19999),
        ("Desk lamp", "Warm light, adjustable arm", 4999),
        ("Calculus textbook", "Some pencil notes in chapter 3", 5000),
        ("Bike lock", "Spare key included", 9999),
    ];

    for (title, description, price) in products {
        let exists = Products::find()
            .filter(ProductCol::Title.eq(title))
            .filter(ProductCol::SellerId.eq(seller_id))
            .one(orm)
            .await?;
        if exists.is_some() {
            continue;
        }

        let now = Utc::now();
        ProductActive {
            id: NotSet,
            seller_id: Set(seller_id),
            title: Set(title.to_string()),
            description: Set(Some(description.to_string())),
            image_urls: Set("[]".to_string()),
            price: Set(price),
            status: Set(ProductStatus::OnSale),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
