use std::net::SocketAddr;
use std::process::exit;

use clap::Parser;
use trialtree::{
    abstract_server::ServerError,
    file_format::config::{load, ServerConfig},
    hierarchy::OrphanPolicy,
    logging::init_logging,
    server::{build_router, AppState},
};

/// Serve the trial file tree and the artifact archive over HTTP.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// JSON config file; the flags below override what it says.
    #[clap(long, short, value_parser)]
    config: Option<String>,

    /// SQLite database with the customer/part/trial tables.
    #[clap(long, value_parser, env = "TRIALTREE_DATABASE")]
    database: Option<String>,

    /// JSON file of pre-joined rows to serve instead of a database.
    #[clap(long, value_parser, env = "TRIALTREE_ROWS")]
    rows: Option<String>,

    /// Zip archive holding the trial artifacts.
    #[clap(long, value_parser, env = "TRIALTREE_ARCHIVE")]
    archive: Option<String>,

    /// Address to listen on, like 0.0.0.0:3000.
    #[clap(long, value_parser, env = "TRIALTREE_LISTEN")]
    listen: Option<String>,

    /// Place rows with columns beyond a missing key as far as their keys go
    /// instead of leaving them out.
    #[clap(long, value_parser)]
    truncate_orphans: bool,

    /// Fail the whole `/file-tree` request on a row with columns beyond a
    /// missing key.
    #[clap(long, value_parser, conflicts_with = "truncate_orphans")]
    fail_on_orphans: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<ServerConfig, ServerError> {
        let mut config = match &self.config {
            Some(path) => load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(database) = &self.database {
            config.database_path = Some(database.clone());
        }
        if let Some(rows) = &self.rows {
            config.rows_path = Some(rows.clone());
        }
        if let Some(archive) = &self.archive {
            config.archive_path = archive.clone();
        }
        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        if self.truncate_orphans {
            config.orphan_fields = OrphanPolicy::Truncate;
        } else if self.fail_on_orphans {
            config.orphan_fields = OrphanPolicy::Fail;
        }
        Ok(config)
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "unable to listen for ctrl-c");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "bad configuration");
            exit(1);
        }
    };
    let rows = match config.row_source() {
        Ok(rows) => rows,
        Err(err) => {
            tracing::error!(%err, "no row source");
            exit(1);
        }
    };
    let addr: SocketAddr = match config.listen_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!(%err, listen_addr = %config.listen_addr, "bad listen address");
            exit(1);
        }
    };

    let state = AppState::new(rows, config.archive_store(), config.hierarchy_builder());
    let app = build_router(state);

    let server = match axum::Server::try_bind(&addr) {
        Ok(builder) => builder,
        Err(err) => {
            tracing::error!(%err, %addr, "unable to bind");
            exit(1);
        }
    };
    tracing::info!(
        %addr,
        archive = %config.archive_path,
        orphan_fields = ?config.orphan_fields,
        "trialtree server listening"
    );
    if let Err(err) = server
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%err, "server error");
        exit(1);
    }
}
