use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address for join/move/fire/leave requests
    #[arg(short = 'c', long, default_value = "127.0.0.1:5556")]
    control: String,

    /// Address display clients subscribe to
    #[arg(short = 'p', long, default_value = "127.0.0.1:5555")]
    publish: String,

    /// Alien simulation period in milliseconds
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Beam lifetime in milliseconds
    #[arg(long, default_value = "500")]
    beam_ms: u64,

    /// Aliens placed at start
    #[arg(long, default_value = "85")]
    aliens: usize,

    /// Seed for deterministic placement
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = ServerConfig {
        control_addr: args.control,
        publish_addr: args.publish,
        alien_tick: Duration::from_millis(args.tick_ms),
        beam_duration: Duration::from_millis(args.beam_ms),
        initial_aliens: args.aliens,
        seed: args.seed,
        ..ServerConfig::default()
    };

    let server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => match result {
            Ok(summary) => info!("{} with score {}", summary.banner(), summary.score),
            Err(e) => {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
