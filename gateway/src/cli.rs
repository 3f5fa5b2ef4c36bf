use clap::{Parser, Subcommand};

/// Wardline gateway - WebSocket RPC surface over the trust & control core
#[derive(Parser, Debug)]
#[command(name = "wardline-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the WebSocket gateway and block until shutdown
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8787
        #[arg(long, default_value = "127.0.0.1:8787")]
        listen: String,
    },
}
