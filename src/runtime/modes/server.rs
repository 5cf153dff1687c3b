//! Server mode
//!
//! Builds the service graph once and shares it with every actix worker.

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::Result;
use tracing::warn;

use crate::api::middleware::RequestLogger;
use crate::api::services::{AppStartTime, api_v1_routes, health_routes};
use crate::runtime::lifetime;

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let ctx = lifetime::startup::prepare_server_startup()
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {}", e);
            e
        })?;

    let config = crate::config::get_config();
    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let db_for_shutdown = ctx.storage.get_db().clone();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .wrap(Compress::default())
            .app_data(web::Data::new(ctx.storage.clone()))
            .app_data(web::Data::new(ctx.offers.clone()))
            .app_data(web::Data::new(ctx.claims.clone()))
            .app_data(web::Data::new(ctx.redemption.clone()))
            .app_data(web::Data::new(ctx.analytics.clone()))
            .app_data(web::Data::new(ctx.rate_limiter.clone()))
            .app_data(web::Data::new(ctx.publisher.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-store")))
            .service(health_routes())
            .service(api_v1_routes())
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server.bind(bind_address)?.run();

    // Wait for server or shutdown signal
    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown(&db_for_shutdown) => {
            warn!("Graceful shutdown complete");
        }
    }

    Ok(())
}
