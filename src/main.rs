use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;

use taskdeck::rate_limit::RateLimiter;
use taskdeck::store::{MemoryStore, PgStore};
use taskdeck::{routes, Config, Store};

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    if config.uses_memory_store() {
        log::warn!("Using the in-memory store; data is lost on shutdown");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgStore::connect(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    store
        .migrate()
        .await
        .context("Failed to run database migrations")?;
    Ok(Arc::new(store))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().context("Invalid configuration")?;

    let store = web::Data::from(open_store(&config).await?);
    let tokens = web::Data::new(config.token_service());
    let hasher = web::Data::new(config.password_hasher());
    let limiter = RateLimiter::per_minute(config.rate_limit_per_minute);

    log::info!("Starting Taskdeck server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .app_data(tokens.clone())
            .app_data(hasher.clone())
            .wrap(limiter.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(routes::app)
    })
    .bind((config.server_host.as_str(), config.server_port))
    .with_context(|| format!("Failed to bind {}", config.server_url()))?
    .run()
    .await?;

    Ok(())
}
