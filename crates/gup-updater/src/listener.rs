//! Callback listener
//!
//! A minimal HTTP server that runs for the lifetime of the batch, parallel
//! to the task loop. The remote indexing service reports import completion
//! by requesting the callback URL it was handed at submission time; the
//! handler routes the `region` parameter to the pending completion signal.
//! The response is always 200 with an empty body, including for unknown
//! regions: the remote side has nothing useful to do with an error.

use crate::error::{Result, UpdateError};
use crate::signal::CompletionRegistry;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

/// Query parameters the remote service fills into the callback URL template
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

/// Handle to the running callback server
pub struct CallbackServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl CallbackServer {
    /// Bind and start serving callbacks on a background task
    pub async fn start(host: &str, port: u16, registry: CompletionRegistry) -> Result<Self> {
        let app = Router::new()
            .route("/", get(handle_callback))
            .with_state(registry)
            .layer(tracing_layer());

        let listener = TcpListener::bind((host, port)).await.map_err(|e| {
            UpdateError::listener(format!("cannot bind {}:{}: {}", host, port, e))
        })?;
        let addr = listener
            .local_addr()
            .map_err(|e| UpdateError::listener(e.to_string()))?;
        info!("Callback listener on {}", addr);

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = serve.await {
                warn!("Callback listener stopped with error: {}", e);
            }
        });

        Ok(Self {
            addr,
            shutdown,
            handle,
        })
    }

    /// Address the listener actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting callbacks and wait for the server task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            warn!("Callback listener task failed: {}", e);
        }
    }
}

/// Create tracing/logging layer for callback requests
fn tracing_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::DEBUG)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
}

/// Handle one completion callback from the indexing service
async fn handle_callback(
    State(registry): State<CompletionRegistry>,
    Query(params): Query<CallbackParams>,
) -> StatusCode {
    info!("Got callback from gazetteer-web");

    if params.status.as_deref() != Some("done") {
        info!(
            "Import task aborted, status {}, message: {}",
            params.status.as_deref().unwrap_or("<none>"),
            params.error_msg.as_deref().unwrap_or("<none>")
        );
    }

    match params.region {
        Some(ref region) => {
            if !registry.complete(region) {
                warn!("Callback for region {} with no pending import, ignored", region);
            }
        },
        None => warn!("Callback without region parameter, ignored"),
    }

    StatusCode::OK
}
