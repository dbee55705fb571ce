//! breeze server binary
//!
//! Binds the configured address, watches the served directory for
//! changes, and serves until ctrl-c. The working directory determines the
//! served files; configuration comes from the environment, not flags.

use breeze_core::{Server, ServerConfig, ServerContext};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to start runtime");
            std::process::exit(1);
        }
    };

    runtime.block_on(run(config));
}

async fn run(config: ServerConfig) {
    info!(
        port = config.port,
        root = %config.root.display(),
        "starting breeze"
    );

    let server = Server::new(ServerContext::new(config));
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to listen for ctrl-c");
        }
        info!("shutting down");
    };

    if let Err(err) = server.serve(shutdown).await {
        error!(%err, "fatal server error");
        server.context().pool.teardown();
        std::process::exit(1);
    }

    let stats = server.context().pool.teardown();
    info!(
        blocks = stats.active_blocks,
        bytes = stats.total_allocated,
        "final pool state"
    );
}
