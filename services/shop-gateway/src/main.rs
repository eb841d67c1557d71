use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use coin_ledger::Ledger;
use dotenv::dotenv;
use shop_gateway::{
    config::{Config, ServerConfig},
    handlers,
    security_middleware::TokenIssuer,
    services::ShopService,
};
use std::env;
use std::sync::Arc;
use tracing::info;

fn init_tracing() {
    // LOG_LEVEL=debug switches on debug output with source locations
    let debug = env::var("LOG_LEVEL")
        .map(|level| level.eq_ignore_ascii_case("debug"))
        .unwrap_or(false);
    let level = if debug { "debug" } else { "info" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_file(debug)
        .with_line_number(debug)
        .with_thread_ids(true)
        .with_target(false)
        .init();
}

fn cors(server: &ServerConfig) -> Cors {
    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);
    for origin in &server.allowed_origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    info!("Starting Shop Gateway on port {}", config.server.port);

    let ledger = Arc::new(
        Ledger::open(&config.ledger)
            .await
            .context("Failed to open ledger")?,
    );

    let tokens = TokenIssuer::new(&config.auth.jwt_secret, config.auth.token_ttl_hours);
    let service = web::Data::new(ShopService::new(ledger.clone(), tokens.clone()));
    let server = config.server.clone();

    HttpServer::new(move || {
        let tokens = tokens.clone();

        App::new()
            .wrap(cors(&server))
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(service.clone())
            .configure(|cfg| handlers::configure_routes(cfg, tokens))
    })
    .workers(config.server.workers)
    .keep_alive(config.server.keep_alive())
    .client_request_timeout(config.server.request_timeout())
    .shutdown_timeout(config.server.shutdown_timeout_secs)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    info!("Shop Gateway stopped");
    ledger.close().await;
    Ok(())
}
