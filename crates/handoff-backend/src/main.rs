use std::net::SocketAddr;

use clap::Parser;
use handoff_backend::{Backend, BackendConfig};

#[derive(Parser)]
#[command(name = "handoff-backend", about = "In-memory Handoff storage backend")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:7400")]
    bind: SocketAddr,

    /// Connection ceiling.
    #[arg(long, default_value_t = 256)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let config = BackendConfig {
        bind_addr: args.bind,
        max_connections: args.max_connections,
    };
    let backend = Backend::bind(config).await?;
    backend.serve().await?;
    Ok(())
}
