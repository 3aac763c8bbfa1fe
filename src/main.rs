use clap::Parser;
use eyre::{Result, WrapErr};
use rpc_relay::{
    cli::Cli,
    logger,
    server::{self, AppState},
    Config, Proxy, UpstreamClient,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).wrap_err("failed to load config")?;
    cli.apply(&mut config);
    config.validate().wrap_err("invalid config")?;

    logger::init(&config.logging)?;

    let upstream_url = config.upstream_url()?;
    info!(
        upstream = %upstream_url,
        timeout_secs = config.upstream.timeout_secs,
        max_batch_items = config.limits.max_batch_items,
        "configuration loaded"
    );

    let client = UpstreamClient::new(upstream_url, config.upstream_timeout())
        .wrap_err("failed to create upstream client")?;
    let proxy = Proxy::new(Arc::new(client), config.limits.max_batch_items);

    let state = AppState {
        proxy: Arc::new(proxy),
        max_body_size: config.limits.max_body_size,
        max_batch_response: config.limits.max_batch_response,
    };
    let router = server::create_router(state, config.request_timeout());

    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "starting server");

    server::serve(listener, router)
        .await
        .wrap_err("server error")?;

    info!("server stopped");
    Ok(())
}
