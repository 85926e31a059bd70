//! HTTP surface: maps inbound requests onto the library's request handler.

use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tsat_supply::{CacheStore, RequestHandler, ResponseFormat, RpcTransport, SupplyResponse};

pub const SUPPLY_PATH: &str = "/api/circulating-supply";

#[derive(Deserialize)]
struct SupplyQuery {
    format: Option<String>,
}

pub fn router<T, S>(handler: Arc<RequestHandler<T, S>>) -> Router
where
    T: RpcTransport + 'static,
    S: CacheStore + 'static,
{
    Router::new()
        .route("/", any(supply_endpoint::<T, S>))
        .route(SUPPLY_PATH, any(supply_endpoint::<T, S>))
        .route("/health", get(|| async { "ok" }))
        .with_state(handler)
        .layer(TraceLayer::new_for_http())
}

async fn supply_endpoint<T, S>(
    State(handler): State<Arc<RequestHandler<T, S>>>,
    method: Method,
    query: Option<Query<SupplyQuery>>,
) -> Response
where
    T: RpcTransport + 'static,
    S: CacheStore + 'static,
{
    let format = ResponseFormat::from_query(query.as_ref().and_then(|q| q.format.as_deref()));
    into_response(handler.handle(method.as_str(), format).await)
}

fn into_response(res: SupplyResponse) -> Response {
    let status = StatusCode::from_u16(res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let headers = res.headers();
    let mut response = (status, res.body).into_response();
    for (name, value) in headers {
        response
            .headers_mut()
            .insert(name, HeaderValue::from_static(value));
    }
    response
}

/// Serve until Ctrl-C.
pub async fn serve<T, S>(
    handler: Arc<RequestHandler<T, S>>,
    addr: SocketAddr,
) -> Result<(), std::io::Error>
where
    T: RpcTransport + 'static,
    S: CacheStore + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, path = SUPPLY_PATH, "supply server listening");
    axum::serve(listener, router(handler))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
}
