use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ListenConfig, ListenType};
use crate::state::AppState;
use crate::users;

pub fn build_app(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;

    Router::new()
        .merge(users::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: Duration,
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

pub async fn serve(app: Router, listen: &ListenConfig) -> anyhow::Result<()> {
    match listen.kind {
        ListenType::Port => serve_tcp(app, listen).await,
        ListenType::Sock => serve_unix(app, &listen.socket_path, shutdown_signal()).await,
    }
}

async fn serve_tcp(app: Router, listen: &ListenConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", listen.bind_ip, listen.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", listen.bind_ip, listen.port))?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Time allowed for open connections to finish after shutdown starts.
#[cfg(unix)]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
/// Pause after a failed accept, e.g. when out of file descriptors.
#[cfg(unix)]
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

#[cfg(unix)]
async fn serve_unix<F>(app: Router, path: &Path, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
{
    use std::os::unix::fs::FileTypeExt;

    use axum::http::Request;
    use hyper::body::Incoming;
    use hyper_util::{
        rt::{TokioExecutor, TokioIo},
        server::conn::auto::Builder,
    };
    use tokio::{net::UnixListener, sync::watch, task::JoinSet};
    use tower::Service;

    // only a socket left behind by a previous run may be replaced
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.file_type().is_socket() => {
            tokio::fs::remove_file(path)
                .await
                .with_context(|| format!("remove stale socket {}", path.display()))?;
        }
        Ok(_) => anyhow::bail!(
            "{} exists and is not a socket; refusing to replace it",
            path.display()
        ),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("inspect {}", path.display())),
    }

    let listener =
        UnixListener::bind(path).with_context(|| format!("bind unix socket {}", path.display()))?;
    tracing::info!("listening on unix socket {}", path.display());

    let builder = Builder::new(TokioExecutor::new());
    let (signal_tx, signal_rx) = watch::channel(());
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        let socket = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, _)) => socket,
                Err(e) => {
                    tracing::warn!(error = %e, "accept on unix socket failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            _ = &mut shutdown => break,
        };

        let tower_service = app.clone();
        let builder = builder.clone();
        let mut signal = signal_rx.clone();
        connections.spawn(async move {
            let socket = TokioIo::new(socket);
            let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
                tower_service.clone().call(request)
            });
            let conn = builder.serve_connection_with_upgrades(socket, hyper_service);
            tokio::pin!(conn);

            let mut closing = false;
            loop {
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "unix socket connection failed");
                        }
                        break;
                    }
                    _ = signal.changed(), if !closing => {
                        closing = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        });
    }

    drop(listener);
    let _ = signal_tx.send(());
    tracing::info!(open = connections.len(), "draining unix socket connections");
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(open = connections.len(), "drain timed out; aborting connections");
        connections.abort_all();
    }

    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(error = %e, "failed to remove unix socket");
    }
    Ok(())
}

#[cfg(not(unix))]
async fn serve_unix<F>(_app: Router, path: &Path, _shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
{
    anyhow::bail!(
        "unix sockets are not supported on this platform ({})",
        path.display()
    )
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
