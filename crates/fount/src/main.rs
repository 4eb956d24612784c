use clap::Parser;
use fount::config::Config;
use fount::registry::Registry;
use fount::server::Server;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fount", about = "Directive-driven synthetic HTTP origin")]
struct Args {
    /// Listen port, overriding the config file.
    #[arg(short, long)]
    port: Option<u16>,
    /// Path to a YAML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    let server = Server::new(config, Registry::builtin())?;
    server.run().await
}
