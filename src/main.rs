//! BDPADrive server binary.
//!
//! Server-rendered pages and JSON endpoints in front of the remote drive
//! API. The remote API owns all data, including editor locks; this process
//! keeps only sessions and a short-lived search cache in memory.

mod auth;
mod background;
mod cache;
mod config;
mod dashboard;
mod editor;
mod error;
mod explorer;
mod extract;
mod format;
mod frontend;
mod http;
mod logging;
mod markdown;
mod remote;
mod search;
mod sharing;
mod tls;
mod trash;
mod version;
mod versions;
mod views;

use axum::extract::{Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Router, middleware};
use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::auth::SessionStore;
use crate::background::spawn_background_tasks;
use crate::cache::ResponseCache;
use crate::config::Args;
use crate::editor::EditorConfig;
use crate::http::{RequestScheme, build_cors_layer};
use crate::remote::RemoteClient;
use crate::views::Views;

shadow!(build);

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let remote = Arc::new(
        RemoteClient::new(
            &args.api_base_url,
            args.api_key.clone(),
            Duration::from_secs(args.api_timeout_secs),
        )
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?,
    );
    if args.api_key.is_none() {
        tracing::warn!("no api key configured, remote calls will likely be rejected");
    }
    let sessions = Arc::new(SessionStore::new(
        Duration::from_secs(args.session_ttl_secs),
        args.login_max_attempts,
        Duration::from_secs(args.login_window_secs),
        Duration::from_secs(args.login_lockout_secs),
    ));
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(
        args.search_cache_ttl_secs,
    )));
    let views = Arc::new(Views::load().map_err(|err| std::io::Error::other(err.to_string()))?);
    let editor_config = Arc::new(EditorConfig::from_args(&args));

    let mut app = Router::new()
        .route("/", get(auth::home))
        .route("/auth", get(auth::auth_page))
        .route("/auth/login", post(auth::auth_login))
        .route("/auth/register", post(auth::auth_register))
        .route(
            "/auth/logout",
            get(auth::auth_logout).post(auth::auth_logout),
        )
        .route("/api/search", get(search::search_api))
        .route("/api/version", get(version::get_version_info))
        .route("/static/{*path}", get(frontend::serve_static))
        .merge(dashboard::routes())
        .merge(explorer::routes())
        .merge(editor::routes())
        .merge(versions::routes())
        .merge(trash::routes())
        .merge(sharing::routes())
        .fallback(frontend::not_found)
        .layer(middleware::from_fn(auth::auth_middleware))
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.ip());
                    let client_ip = http::resolve_client_ip(request.headers(), connect_ip)
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(remote))
        .layer(Extension(sessions.clone()))
        .layer(Extension(cache.clone()))
        .layer(Extension(views))
        .layer(Extension(editor_config));

    if let Some(cors_layer) = build_cors_layer(args.cors_origins.as_deref()) {
        app = app.layer(cors_layer);
    }

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let http_addr = SocketAddr::new(host, args.http_port);
    let handle = Handle::new();

    let https = match args.https_port {
        Some(port) => Some((
            SocketAddr::new(host, port),
            tls::build_rustls_config(&args, host).await?,
        )),
        None => None,
    };

    info!(api = %args.api_base_url, "remote drive api");
    info!("Starting HTTP server at {}", http_addr);

    let http_app = app.clone().layer(Extension(RequestScheme::Http));
    let https_app = app.layer(Extension(RequestScheme::Https));

    let http_server = axum_server::bind(http_addr)
        .handle(handle.clone())
        .serve(http_app.into_make_service_with_connect_info::<SocketAddr>());
    let https_server = {
        let handle = handle.clone();
        async move {
            match https {
                Some((addr, tls_config)) => {
                    info!("Starting HTTPS server at {}", addr);
                    axum_server::bind_rustls(addr, tls_config)
                        .handle(handle)
                        .serve(https_app.into_make_service_with_connect_info::<SocketAddr>())
                        .await
                }
                None => std::future::pending().await,
            }
        }
    };

    spawn_background_tasks(sessions, cache);
    tokio::select! {
        result = http_server => result?,
        result = https_server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal, shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
