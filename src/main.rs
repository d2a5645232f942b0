use anyhow::Result;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shrt::codec::CodeCodec;
use shrt::config::Config;
use shrt::service::Services;
use shrt::{api, redirect, storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env()?);
    info!("Loaded configuration");

    let storage = storage::connect(&config.database).await?;

    let codec = Arc::new(CodeCodec::new(&config.codec.salt, config.codec.min_length)?);
    info!(min_length = codec.min_length(), "Short code codec ready");

    let services = Services::new(storage, codec);

    let api_router = api::create_api_router(services.clone(), Arc::clone(&config));
    let redirect_router = redirect::create_redirect_router(services, Arc::clone(&config));

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("Redirect server listening on http://{}", redirect_addr);
    info!(
        status = config.redirect_status.status_code().as_u16(),
        base_domain = %config.base_domain,
        "Redirects configured"
    );

    tokio::try_join!(
        axum::serve(
            api_listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>()
        )
        .into_future(),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>()
        )
        .into_future(),
    )?;

    Ok(())
}
