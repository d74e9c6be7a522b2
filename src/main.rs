//! arena-sync binary entrypoint wiring local storage, the remote service,
//! background reconciliation and the REST/SSE layer.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "http-remote")]
use arena_sync::dao::remote::HttpRemote;
use arena_sync::{
    config::AppConfig,
    dao::{
        medium::{FileMedium, MemoryMedium, StorageMedium},
        remote::{MemoryRemote, RemoteService},
    },
    routes,
    services::reconciler,
    state::{
        AppState, SharedContext, SharedState, SyncContext, bus::RelayChannel, task::PeriodicTask,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let medium = open_medium(&config)?;
    let remote = open_remote(&config)?;
    let online = config.remote_base_url.is_some();

    let context = SyncContext::open(
        medium,
        Arc::new(RelayChannel::default()),
        remote,
        config.context_settings(),
    )
    .await;

    if online {
        start_reconciliation(&context, &config);
    }

    let app_state = AppState::new(context);
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.close();
    Ok(())
}

/// Open the storage medium: a data directory, or memory when none is configured.
fn open_medium(config: &AppConfig) -> anyhow::Result<Arc<dyn StorageMedium>> {
    match &config.data_dir {
        Some(dir) => {
            let medium = FileMedium::open(dir).context("opening data directory")?;
            info!(dir = %dir.display(), "using file storage");
            Ok(Arc::new(medium))
        }
        None => {
            info!("using in-memory storage; nothing survives a restart");
            Ok(Arc::new(MemoryMedium::new()))
        }
    }
}

/// Build the remote client, or an unreachable stand-in when running offline.
fn open_remote(config: &AppConfig) -> anyhow::Result<Arc<dyn RemoteService>> {
    match config.remote_base_url.as_deref() {
        #[cfg(feature = "http-remote")]
        Some(url) => {
            let remote = HttpRemote::new(url).context("building remote client")?;
            info!(url, "using remote service");
            Ok(Arc::new(remote))
        }
        #[cfg(not(feature = "http-remote"))]
        Some(url) => {
            tracing::warn!(url, "built without the http-remote feature; running offline");
            Ok(Arc::new(MemoryRemote::unreachable()))
        }
        None => {
            info!("no remote service configured; running offline");
            Ok(Arc::new(MemoryRemote::unreachable()))
        }
    }
}

/// Run a first reconciliation pass right away, then keep refreshing on the
/// configured interval.
fn start_reconciliation(context: &SharedContext, config: &AppConfig) {
    let initial = context.clone();
    context.attach_task(PeriodicTask::spawn("initial-reconcile", async move {
        reconciler::reconcile_all(&initial).await;
    }));

    if let Some(every) = config.refresh_interval {
        context.attach_task(reconciler::spawn_periodic(context, every));
        info!(every_secs = every.as_secs(), "periodic refresh enabled");
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
