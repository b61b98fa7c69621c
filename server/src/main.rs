use clap::Parser;
use log::{error, info};
use server::network::Server;
use shared::SessionConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// JSON session config (capacity, cursor_scale)
    #[arg(short, long)]
    config: Option<String>,

    /// Slot groups per entity, clamped to 0..=10. Overrides the config file.
    #[arg(long, allow_negative_numbers = true)]
    capacity: Option<i64>,

    /// Maximum connected peers
    #[arg(short, long, default_value = "32")]
    max_clients: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path).map_err(|e| e.to_string())?,
        None => SessionConfig::default(),
    };
    if let Some(capacity) = args.capacity {
        config = config.override_capacity(capacity);
    }

    let address = format!("{}:{}", args.host, args.port);

    let mut server = Server::new(&address, args.max_clients, &config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Host stopped with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
