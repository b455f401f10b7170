use rust_decimal::Decimal;
use shopping_cart_api::{
    config::AppConfig,
    db::open_store,
    dto::{
        products::{CreateProductRequest, CreateProducts},
        users::CreateUserRequest,
    },
    error::AppError,
    models::Address,
    services::{product_service, user_service},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let state = AppState::new(open_store(&config).await?);

    ensure_user(&state, "ferris", "ferris@example.com", "ferris123").await?;
    ensure_user(&state, "corro", "corro@example.com", "corro123").await?;
    seed_products(&state).await?;

    state.repo.close().await?;
    println!("Seed completed");
    Ok(())
}

async fn ensure_user(state: &AppState, name: &str, email: &str, pwd: &str) -> anyhow::Result<()> {
    let payload = CreateUserRequest {
        name: name.to_string(),
        email: email.to_string(),
        pwd: pwd.to_string(),
        address: vec![Address {
            street: "1 Crab Lane".to_string(),
            zipcode: "10001".to_string(),
            district: "Harbor".to_string(),
            city: "Rustville".to_string(),
            state: "RS".to_string(),
            is_delivery: true,
        }],
    };
    match user_service::create_user(state, payload).await {
        Ok(_) => println!("Created user {email}"),
        // Seeding twice is fine.
        Err(AppError::Validation(msg)) => println!("Skipped user {email}: {msg}"),
        Err(err) => return Err(anyhow::anyhow!(err.to_string())),
    }
    Ok(())
}

async fn seed_products(state: &AppState) -> anyhow::Result<()> {
    let existing = product_service::list_products(state)
        .await
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    if existing.data.is_some_and(|list| !list.items.is_empty()) {
        println!("Products already seeded");
        return Ok(());
    }

    let products = [
        ("Axum Hoodie", "Warm hoodie for Rustaceans", Decimal::new(5500, 2)),
        ("Ferris Mug", "Coffee tastes better with Ferris", Decimal::new(999, 2)),
        ("Rust Sticker Pack", "Decorate your laptop", Decimal::new(450, 2)),
        ("E-book: Async Rust", "Learn async Rust patterns", Decimal::new(2500, 2)),
    ];

    let batch = products
        .into_iter()
        .map(|(name, description, price)| CreateProductRequest {
            name: name.to_string(),
            description: description.to_string(),
            price,
        })
        .collect();
    product_service::create_products(state, CreateProducts::Many(batch))
        .await
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;

    println!("Seeded products");
    Ok(())
}
