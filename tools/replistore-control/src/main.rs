//! Coordinator process: accepts client writes and forwards each to a
//! uniformly randomly chosen worker. The dispatch policy itself is
//! explicitly out of the ordering engine's scope (it's an external
//! collaborator of the core), so it stays this simple.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{extract::State, routing::post, Json, Router};
use clap::Parser;
use rand::seq::SliceRandom;
use replistore_messages::{ClusterConfig, WriteReq, WriteResp};
use tracing::{info, warn};

#[derive(Parser, Debug)]
struct Args {
    /// Path to the cluster configuration TOML file.
    #[arg(long)]
    config: String,

    /// Address to listen on for client writes, overriding `master` in the
    /// config file.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

struct Coordinator {
    client: reqwest::Client,
    workers: Vec<String>,
}

impl Coordinator {
    async fn dispatch(&self, req: WriteReq) -> anyhow::Result<WriteResp> {
        let endpoint = self
            .workers
            .choose(&mut rand::thread_rng())
            .context("empty worker list")?;
        let resp = self
            .client
            .post(format!("{endpoint}/write"))
            .json(&req)
            .send()
            .await?
            .json::<WriteResp>()
            .await?;
        Ok(resp)
    }
}

async fn on_write(
    State(coordinator): State<Arc<Coordinator>>,
    Json(req): Json<WriteReq>,
) -> Json<WriteResp> {
    match coordinator.dispatch(req).await {
        Ok(resp) => Json(resp),
        Err(err) => {
            warn!("dispatch failed: {err:#}");
            Json(WriteResp {
                receiver: 0,
                status: -1,
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config_buf = tokio::fs::read_to_string(&args.config)
        .await
        .with_context(|| format!("reading cluster config {}", args.config))?;
    let config: ClusterConfig = toml::from_str(&config_buf)?;
    let listen = args
        .listen
        .or_else(|| config.master.parse().ok())
        .context("no listen address given and master is not a socket address")?;

    let coordinator = Arc::new(Coordinator {
        client: reqwest::Client::new(),
        workers: config.workers,
    });
    info!(?listen, workers = coordinator.workers.len(), "coordinator starting");

    let app = Router::new()
        .route("/write", post(on_write))
        .with_state(coordinator);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
