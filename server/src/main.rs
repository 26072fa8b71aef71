use clap::Parser;
use crowdmaze_server::config::GameSettings;
use crowdmaze_server::http;
use crowdmaze_server::network::{Server, ServerOptions};
use crowdmaze_shared::{default_exit, EXIT_RESET_SECONDS, MAZE_SIZE, ROUND_SECONDS};
use log::{error, info};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// UDP port for game sessions
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Also serve the HTTP polling API on this port
    #[arg(long)]
    http_port: Option<u16>,

    /// Let HTTP clients restart the game with POST /api/state
    #[arg(long)]
    allow_restart: bool,

    /// Seconds in a voting round
    #[arg(short, long, default_value_t = ROUND_SECONDS)]
    round_seconds: u32,

    /// Seconds to wait at the exit before a new maze is generated
    #[arg(short, long, default_value_t = EXIT_RESET_SECONDS)]
    exit_seconds: u32,

    /// Maze side length (odd, 5 to 101)
    #[arg(short, long, default_value_t = MAZE_SIZE)]
    size: usize,

    /// Seed for reproducible mazes and tie-breaks
    #[arg(long)]
    seed: Option<u64>,

    /// Length of one clock tick in milliseconds
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Maximum number of UDP sessions
    #[arg(long, default_value = "256")]
    max_clients: usize,

    /// Seconds of silence before a session is dropped
    #[arg(long, default_value = "10")]
    client_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let settings = GameSettings {
        maze_size: args.size,
        exit: default_exit(args.size),
        round_seconds: args.round_seconds,
        exit_seconds: args.exit_seconds,
        seed: args.seed,
    };
    let options = ServerOptions {
        tick_duration: Duration::from_millis(args.tick_ms.max(1)),
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.client_timeout),
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, settings, options).await?;

    if let Some(http_port) = args.http_port {
        let http_addr: SocketAddr = format!("{}:{}", args.host, http_port).parse()?;
        let game_tx = server.message_sender();
        let allow_restart = args.allow_restart;
        tokio::spawn(async move {
            if let Err(e) = http::serve(http_addr, game_tx, allow_restart).await {
                error!("HTTP polling API stopped: {}", e);
            }
        });
    }

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
