use anyhow::Context;
use shopping_cart_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let database_url = config
        .database_url
        .context("DATABASE_URL must be set to run migrations")?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    orm.close().await?;
    println!("Migrations applied");
    Ok(())
}
