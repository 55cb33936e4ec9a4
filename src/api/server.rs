//! API Server Module
//!
//! This module implements the HTTP endpoint callers use to submit
//! transactions. A request to `/tx?key=<key>&value=<value>` (GET or POST)
//! is validated, turned into a [`Transaction`] and handed to the scheduler.
//! The response only acknowledges receipt; the transaction is written to
//! disk later, when its block is flushed.

use crate::{
    Receipt, Transaction,
    config::ApiConfig,
    scheduler::BlockInput,
    validation::validate_submission,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::future::Future;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Shared application state that is accessible across all request handlers
#[derive(Clone)]
struct AppState {
    input: BlockInput,
}

/// The HTTP server, bound and ready to serve
pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    /// Bind the configured address
    ///
    /// Binding happens here rather than in [`Server::serve`] so that an
    /// unusable address is reported before anything else starts.
    pub async fn bind(config: &ApiConfig, input: BlockInput) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&config.listen).await?;
        info!("API server listening on http://{}", listener.local_addr()?);

        Ok(Self {
            listener,
            app: router(input),
        })
    }

    /// Serve requests until `shutdown` completes
    ///
    /// After `shutdown` resolves no new connections are accepted; the call
    /// returns once in-flight requests have finished.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Build the router without binding it anywhere
pub fn router(input: BlockInput) -> Router {
    Router::new()
        .route("/tx", get(handle_tx).post(handle_tx))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new()),
        )
        .with_state(AppState { input })
}

/// Query pairs in request order; repeated names are kept
type QueryPairs = Vec<(String, String)>;

/// First value given for `name`, ignoring later repeats
fn first_param<'a>(pairs: &'a QueryPairs, name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(param, _)| param == name)
        .map(|(_, value)| value.as_str())
}

/// Handles `/tx`
///
/// When a parameter is repeated, its first value is used.
///
/// # Responses
/// * `200` with a JSON [`Receipt`] once the scheduler took the transaction
/// * `400` if key or value is missing or empty
/// * `503` if the scheduler has stopped
async fn handle_tx(State(state): State<AppState>, Query(params): Query<QueryPairs>) -> Response {
    let submission = validate_submission(first_param(&params, "key"), first_param(&params, "value"));
    let (key, value) = match submission {
        Ok(submission) => submission,
        Err(e) => {
            warn!(error = %e, "Rejected transaction");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let tx = Transaction::new(key, value);
    let receipt = Receipt::from(&tx);

    match state.input.send(tx).await {
        Ok(()) => {
            info!(id = %receipt.id, "Transaction accepted");
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(e) => {
            error!(id = %receipt.id, error = %e, "Transaction dropped");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Block, config::BatchConfig, scheduler::Scheduler};
    use axum::body::{self, Body};
    use axum::http::{Method, Request};
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_accepted_transaction_is_flushed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocks.json");
        let handle = Scheduler::start(&BatchConfig::new(3600, 1000, &path)).unwrap();
        let app = router(handle.input());

        let (status, body) = call(app.clone(), Method::GET, "/tx?key=test_key&value=test_value").await;
        assert_eq!(status, StatusCode::OK);
        let first: Receipt = serde_json::from_slice(&body).unwrap();

        let (status, body) = call(app, Method::POST, "/tx?key=other&value=1").await;
        assert_eq!(status, StatusCode::OK);
        let second: Receipt = serde_json::from_slice(&body).unwrap();

        handle.close().await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let block: Block = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].id, first.id);
        assert_eq!(block.transactions[0].key, "test_key");
        assert_eq!(block.transactions[0].value, "test_value");
        assert_eq!(block.transactions[1].id, second.id);
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocks.json");
        let handle = Scheduler::start(&BatchConfig::new(3600, 1000, &path)).unwrap();
        let app = router(handle.input());

        let (status, body) = call(app.clone(), Method::GET, "/tx?value=v").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"key is required");

        let (status, body) = call(app.clone(), Method::GET, "/tx?key=k&value=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"value is required");

        let (status, _) = call(app, Method::GET, "/tx").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let stats = handle.close().await.unwrap();
        assert_eq!(stats.transactions_written, 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_repeated_parameters_use_first_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocks.json");
        let handle = Scheduler::start(&BatchConfig::new(3600, 1000, &path)).unwrap();
        let app = router(handle.input());

        let (status, _) = call(app.clone(), Method::GET, "/tx?key=a&key=b&value=v&value=w").await;
        assert_eq!(status, StatusCode::OK);

        // An empty first value is not replaced by a later one
        let (status, body) = call(app, Method::GET, "/tx?key=&key=b&value=v").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"key is required");

        handle.close().await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let block: Block = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].key, "a");
        assert_eq!(block.transactions[0].value, "v");
    }

    #[tokio::test]
    async fn test_closed_scheduler_returns_unavailable() {
        let dir = TempDir::new().unwrap();
        let handle =
            Scheduler::start(&BatchConfig::new(3600, 1000, dir.path().join("blocks.json"))).unwrap();
        let app = router(handle.input());
        handle.close().await.unwrap();

        let (status, _) = call(app, Method::GET, "/tx?key=k&value=v").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
