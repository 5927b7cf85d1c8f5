//! HTTP invocation handler
//!
//! One path, three verbs: PUT syncs the function catalog with the
//! orchestrator, POST executes an invocation against the memo table in the
//! request, GET answers introspection probes. Every response carries the
//! SDK identity headers.

pub mod execute;
pub mod introspect;
pub mod sync;

use crate::config::Config;
use crate::event::EventClient;
use crate::function::FunctionRegistry;
use crate::{InngestError, Result, constants};
use axum::Router;
use axum::http::{HeaderValue, StatusCode};
use axum::Json;
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub(crate) config: Arc<Config>,
    pub(crate) registry: Arc<FunctionRegistry>,
    pub(crate) events: Option<Arc<EventClient>>,
    pub(crate) http: reqwest::Client,
}

impl AppState {
    /// Build shared state; the event sender is absent when no key can be
    /// resolved (cloud mode without an event key).
    pub fn new(config: Arc<Config>, registry: Arc<FunctionRegistry>) -> Self {
        let events = EventClient::new(&config).ok().map(Arc::new);
        Self {
            config,
            registry,
            events,
            http: reqwest::Client::new(),
        }
    }
}

/// Build the router serving the invocation endpoint
///
/// The endpoint is mounted at `config.serve_path()`; mount the returned
/// router into a larger app or hand it straight to [`serve`].
pub fn router(config: Arc<Config>, registry: Arc<FunctionRegistry>) -> Router {
    let path = config.serve_path();
    let state = AppState::new(config, registry);

    Router::new()
        .route(
            &path,
            put(sync::handle)
                .post(execute::handle)
                .get(introspect::handle),
        )
        .layer(axum::middleware::map_response(stamp_sdk_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the invocation endpoint
pub async fn serve(addr: &str, config: Config, registry: FunctionRegistry) -> Result<()> {
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| InngestError::config(format!("Invalid address {}: {}", addr, e)))?;

    let config = Arc::new(config);
    let function_count = registry.len();
    let app = router(config.clone(), Arc::new(registry));

    tracing::info!(
        "Serving {} function(s) on {}{}",
        function_count,
        socket_addr,
        config.serve_path()
    );

    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| InngestError::config(format!("Server error: {}", e)))?;

    Ok(())
}

/// Stamp the SDK identity headers onto every response
async fn stamp_sdk_headers(mut response: Response) -> Response {
    if let Ok(label) = HeaderValue::from_str(&constants::sdk_label()) {
        response.headers_mut().insert(constants::HEADER_SDK, label);
    }
    response.headers_mut().insert(
        constants::HEADER_REQ_VERSION,
        HeaderValue::from_static(constants::REQ_VERSION),
    );
    response
}

/// Error wrapper mapping SDK errors onto protocol responses
///
/// Used by the sync and introspect handlers; the execute handler maps its
/// outcomes explicitly because the outcome table is richer there.
#[derive(Debug)]
pub(crate) struct AppError(pub(crate) InngestError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = self.0.to_detail();
        let status = match &self.0 {
            InngestError::BadRequest(_) => StatusCode::BAD_REQUEST,
            InngestError::UnknownFunction(_) => StatusCode::NOT_FOUND,
            InngestError::Signature(_) => StatusCode::UNAUTHORIZED,
            _ => {
                tracing::error!("request failed: {:?}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(detail)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<InngestError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
