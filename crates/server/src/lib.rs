//! Floodgate server library.
//!
//! Provides the HTTP pipeline the rate limiter plugs into: a reusable
//! `serve` function for the binary and embedders, and the
//! [`RateLimitLayer`] middleware for wrapping arbitrary routers.

#![deny(missing_docs)]

mod health;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;

use ::rate_limit::RateLimiter;
use anyhow::anyhow;
use axum::{Router, routing::get};
use config::Config;
use tokio::net::TcpListener;

pub use rate_limit::RateLimitLayer;

/// Configuration for serving Floodgate.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to.
    pub listen_address: SocketAddr,
    /// The deserialized Floodgate TOML configuration.
    pub config: Config,
}

/// Starts and runs the Floodgate server, throttling every route of `app`.
///
/// The health endpoint is mounted after the rate limiting layer, so probes
/// are never throttled.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig, app: Router) -> anyhow::Result<()> {
    let mut app = app;

    if config.server.rate_limits.enabled {
        log::debug!("Initializing rate limiter with the configured quota");
        let limiter = RateLimiter::new(&config.server.rate_limits).await?;

        app = app.layer(RateLimitLayer::new(Arc::new(limiter)));
    } else {
        log::warn!("Rate limiting is disabled - requests pass through unthrottled");
    }

    if config.server.health.enabled {
        if let Some(listen) = config.server.health.listen {
            tokio::spawn(health::bind_health_endpoint(listen, config.server.health.clone()));
        } else {
            let health_router = Router::new().route(&config.server.health.path, get(health::health));

            app = app.merge(health_router);
        }
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    log::info!("Floodgate listening on http://{listen_address}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;

    Ok(())
}
