use std::{any::Any, net::SocketAddr};

use axum::{
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth,
    error::{not_found_fallback, AppError},
    images,
    state::AppState,
};

pub const API_PREFIX: &str = "/api/v2";

pub fn build_app(state: AppState) -> Router {
    let cors_origin = state.config.cors_origin.clone();

    let routes = Router::new()
        .route("/", get(|| async { "API is running..." }))
        .route("/health", get(|| async { "ok" }))
        .nest(
            API_PREFIX,
            Router::new()
                .nest("/users", auth::router(state.clone()))
                .nest("/image", images::router(state.clone())),
        )
        .fallback(not_found_fallback)
        .with_state(state);

    with_middleware(routes, cors_origin.as_deref())
}

/// Panic recovery, CORS and request tracing, outermost last.
fn with_middleware(routes: Router, cors_origin: Option<&str>) -> Router {
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors_layer(cors_origin))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

/// Credentialed CORS for a configured origin, permissive otherwise.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        Err(e) => {
            tracing::warn!(error = %e, "invalid CORS_ORIGIN; falling back to permissive CORS");
            CorsLayer::permissive()
        }
    }
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
    AppError::internal("Something went wrong").into_response()
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
