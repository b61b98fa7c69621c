use clap::Parser;
use client::input::InputSimulator;
use client::network::Client;
use log::info;
use shared::SessionConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// JSON session config (capacity, cursor_scale)
    #[arg(short, long)]
    config: Option<String>,

    /// Slot groups per entity, clamped to 0..=10. Must match the host.
    #[arg(long, allow_negative_numbers = true)]
    capacity: Option<i64>,

    /// Chance per input tick of a simulated slot edit
    #[arg(long, default_value = "0.05")]
    churn: f64,

    /// Seed for the simulated input
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file the local slots are loaded from and saved to
    #[arg(long)]
    save: Option<PathBuf>,

    /// Leave after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(capacity) = args.capacity {
        config = config.override_capacity(capacity);
    }

    let input = match args.seed {
        Some(seed) => InputSimulator::with_seed(seed, args.churn),
        None => InputSimulator::new(args.churn),
    };

    info!("Starting peer...");
    info!("Connecting to: {}", args.server);

    let mut client = Client::new(&args.server, config, input, args.save).await?;
    client.run(args.duration.map(Duration::from_secs)).await?;

    Ok(())
}
