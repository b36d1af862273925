//! Nova Cidade Storefront - catalog, WhatsApp checkout and admin panel

use anyhow::Result;
use storefront::api::{self, AppState};
use storefront::{storage, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let store = storage::connect(&config.database_url).await?;
    store.migrate().await?;
    store.seed(&config.default_whatsapp).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let addr = config.addr;
    let app = api::router(AppState::new(store, config));

    tracing::info!("🚀 Storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
