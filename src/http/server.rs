//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the downstream handler
//! - Wire up middleware (static responses, timeout, request ID, tracing)
//! - Bind server to listener
//! - Swap in recompiled rules as they arrive
//! - Forward unmatched requests to the upstream, or answer 404

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderValue, StatusCode, Uri, Version,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::middleware::static_response_middleware;
use crate::rules::renderer::TEXT_PLAIN;
use crate::rules::{RuleSet, SharedRuleSet};

/// State for the downstream handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Option<Authority>,
}

/// HTTP server answering from static rules and forwarding the rest.
pub struct HttpServer {
    router: Router,
    rules: SharedRuleSet,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and initial rules.
    pub fn new(config: ServerConfig, rules: RuleSet) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let upstream = config.upstream.as_ref().and_then(|upstream| {
            match upstream.address.parse::<Authority>() {
                Ok(authority) => Some(authority),
                Err(e) => {
                    tracing::error!(
                        address = %upstream.address,
                        error = %e,
                        "Invalid upstream address, forwarding disabled"
                    );
                    None
                }
            }
        });

        let rules = rules.into_shared();
        let state = AppState { client, upstream };
        let router = Self::build_router(&config, state, rules.clone());

        Self { router, rules }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState, rules: SharedRuleSet) -> Router {
        Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(rules, static_response_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Handle to the live rule set.
    pub fn rules(&self) -> SharedRuleSet {
        self.rules.clone()
    }

    /// The fully layered router, for serving without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Rule sets received on `updates` replace the current one; requests
    /// already in flight finish with the set they started with.
    pub async fn run(
        self,
        listener: TcpListener,
        mut updates: mpsc::UnboundedReceiver<RuleSet>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rules = self.rules.load().len(),
            "HTTP server starting"
        );

        let rules = self.rules.clone();
        let reloader = tokio::spawn(async move {
            while let Some(next) = updates.recv().await {
                tracing::info!(rules = next.len(), "Rule set replaced");
                rules.store(Arc::new(next));
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Downstream handler for requests no rule answered.
async fn forward_handler(State(state): State<AppState>, request: Request) -> Response {
    let Some(upstream) = state.upstream else {
        return not_found();
    };

    let (mut parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Failed to build upstream URI");
            return bad_gateway();
        }
    };
    // The upstream connection is always HTTP/1.1.
    parts.version = Version::HTTP_11;

    tracing::debug!(
        method = %parts.method,
        path = %path,
        upstream = %upstream,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => response.map(Body::new),
        Err(e) => {
            tracing::error!(path = %path, upstream = %upstream, error = %e, "Upstream error");
            bad_gateway()
        }
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))],
        "404 page not found\n",
    )
        .into_response()
}

fn bad_gateway() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))],
        "upstream request failed\n",
    )
        .into_response()
}
