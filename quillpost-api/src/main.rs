use quillpost_api::{
    config::{ApiConfig, Env},
    media::{MediaError, MediaStore},
    server::{self, ServerState},
};
use quillpost_db::client::{DbClient, DbError};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error connecting to the database: {0}")]
    DbConnect(sqlx::Error),
    #[error("Error migrating the database: {0}")]
    DbMigrate(DbError),
    #[error("Error preparing the media directory: {0}")]
    Media(#[from] MediaError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quillpost_api=debug,\
                quillpost_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn connect_db(env: &Env) -> Result<DbClient, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, data is kept in memory only");
        return Ok(DbClient::in_memory(env.worker_id, env.process_id));
    };

    let pool = PgPool::connect(database_url)
        .await
        .map_err(InitError::DbConnect)?;
    let db_client = DbClient::new(pool, env.worker_id, env.process_id);
    db_client.migrate().await.map_err(InitError::DbMigrate)?;

    Ok(db_client)
}

/// Cancels `shutdown` on Ctrl-C or, on unix, SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(%err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown requested");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let db_client = connect_db(&env).await?;
    let media = MediaStore::new(env.media_dir.clone(), &env.media_base_url, env.media_max_bytes);
    media.prepare().await?;

    let state = ServerState {
        db_client: Arc::new(db_client),
        media: Arc::new(media),
        config: ApiConfig::from(&env),
    };
    let app = server::app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    info!(%server_address, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;
    info!("Server stopped");

    Ok(())
}
