mod cli;
mod observability;
mod rpc;
mod server;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use state::AppState;
use std::net::SocketAddr;

fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing();

    match cli.command {
        Commands::Serve { listen } => serve(&listen),
    }
}

fn serve(listen_addr: &str) -> Result<()> {
    let app_state = AppState::from_env();
    let janitor_limiter = app_state.rate_limiter.clone();

    // ctrlc runs in a dedicated thread and exits immediately; tokio's own
    // signal handling can be starved while the runtime is busy.
    ctrlc::set_handler(move || {
        tracing::info!("Ctrl+C received, exiting...");
        std::process::exit(0);
    })
    .context("failed to set Ctrl+C handler")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let _janitor = wardline_trust::ratelimit::spawn_janitor(janitor_limiter);

        let router = server::build_router(app_state);
        let std_listener =
            std::net::TcpListener::bind(listen_addr).context("failed to bind TCP listener")?;
        std_listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(std_listener)?;

        tracing::info!(listen = %listen_addr, "wardline gateway listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .context("server error")?;

        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}
