use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use config::Config;
use log::{error, info};
use web::AppState;

mod config;
mod lan;
mod metrics;
mod range;
mod store;
mod web;

/// Local video sharing server
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML config file; the default path may be absent
    #[clap(short, long, env = "VIDSHARE_CONFIG")]
    config: Option<PathBuf>,
    /// Overrides the port of `web_bind`
    #[clap(short, long, env = "PORT")]
    port: Option<u16>,
    /// Overrides `upload_dir`
    #[clap(short, long)]
    upload_dir: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path, true)?,
        None => Config::load(&PathBuf::from("./config.yaml"), false)?,
    };
    if let Some(port) = args.port {
        config.web_bind.set_port(port);
    }
    if let Some(upload_dir) = &args.upload_dir {
        config.upload_dir = upload_dir.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = load_config(&args)?;
    let state = Arc::new(AppState::new(&config));
    state.store.ensure_root().await.with_context(|| {
        format!(
            "failed to create uploads directory '{}'",
            config.upload_dir.display()
        )
    })?;

    if let Some(prometheus_bind) = config.prometheus_bind {
        prometheus_exporter::start(prometheus_bind).context("failed to start prometheus_exporter")?;
    }

    let router = web::route(&config, state.clone())?;
    info!("uploads directory: {}", state.store.root().display());
    let port = config.web_bind.port();
    info!("Local: http://localhost:{port}");
    info!("Network: http://{}:{port}", lan::network_host(config.web_bind));

    loop {
        if let Err(e) = serve(config.web_bind, router.clone()).await {
            error!("failed to start api server: {:?}", e);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn serve(bind: SocketAddr, router: Router) -> Result<()> {
    let server = axum::Server::try_bind(&bind)?;
    info!("listening @ {}", bind);
    server
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await?;
    Ok(())
}
