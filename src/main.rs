//! Worker process: hosts one `Replica` (both scheduler variants plus the
//! shared store) behind an `axum` router. A worker's identity is its index
//! in the cluster configuration's `workers` list.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use replistore::{net::peer::HttpPeerNet, replica::Replica};
use replistore_messages::{AckReq, ClusterConfig, NodeId, WriteReq, WriteReqBcast, WriteResp};
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    /// Path to the cluster configuration TOML file.
    #[arg(long)]
    config: String,

    /// This worker's index into the configuration's `workers` list.
    #[arg(long)]
    id: NodeId,

    /// Address to listen on, overriding `workers[id]` in the config file.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

/// Wraps a handler-level `anyhow::Error` into a `500` response, the common
/// `axum` idiom for crates that standardize on `anyhow` at their boundary.
struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", self.0)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn on_write(
    State(replica): State<Arc<Replica<HttpPeerNet>>>,
    Json(req): Json<WriteReq>,
) -> Json<WriteResp> {
    Json(replica.on_client_write(req.mode, req.key, req.value).await)
}

async fn on_bcast_write(
    State(replica): State<Arc<Replica<HttpPeerNet>>>,
    Json(req): Json<WriteReqBcast>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(replica.on_broadcast_write(req).await?))
}

async fn on_ack(
    State(replica): State<Arc<Replica<HttpPeerNet>>>,
    Json(req): Json<AckReq>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(replica.on_ack(req).await?))
}

async fn on_get(
    State(replica): State<Arc<Replica<HttpPeerNet>>>,
    Path(key): Path<String>,
) -> Json<Option<String>> {
    Json(replica.store().get(&key).await)
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
    let endpoint = config
        .workers
        .get(args.id as usize)
        .with_context(|| format!("no worker entry for id {}", args.id))?;
    let listen = args
        .listen
        .or_else(|| endpoint.parse().ok())
        .with_context(|| format!("worker endpoint {endpoint} is not a socket address; pass --listen"))?;

    let net = Arc::new(HttpPeerNet::new(args.id, config.workers.clone()));
    let replica = Arc::new(Replica::new(args.id, config.cluster_size(), net));
    replica.spawn_delivery_loops();
    info!(id = args.id, ?listen, cluster_size = config.cluster_size(), "worker starting");

    let app = Router::new()
        .route("/write", post(on_write))
        .route("/bcast-write", post(on_bcast_write))
        .route("/ack", post(on_ack))
        .route("/get/:key", get(on_get))
        .with_state(replica);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
