//! Headless voting client: connects over UDP, casts votes and logs the
//! state updates it receives.

use bincode::{deserialize, serialize};
use clap::Parser;
use crowdmaze_shared::{Direction, GameSnapshot, Packet, PROTOCOL_VERSION};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Instant};

const MAX_DATAGRAM: usize = 65_536;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Direction to vote for; a random one each time when omitted
    #[arg(short, long)]
    direction: Option<Direction>,

    /// Number of votes to cast before disconnecting
    #[arg(short, long, default_value = "10")]
    votes: u32,

    /// Milliseconds between votes
    #[arg(short, long, default_value = "1000")]
    interval_ms: u64,
}

fn describe(snapshot: &GameSnapshot) -> String {
    format!(
        "{:?} {}s left, player at {}, exit at {}, votes up {} down {} left {} right {}, {} connected",
        snapshot.phase,
        snapshot.time_left,
        snapshot.player_pos,
        snapshot.exit_pos,
        snapshot.votes.up,
        snapshot.votes.down,
        snapshot.votes.left,
        snapshot.votes.right,
        snapshot.connected_players,
    )
}

/// Logs every packet that arrives within `window`.
async fn drain_updates(socket: &UdpSocket, window: Duration) -> std::io::Result<()> {
    let deadline = Instant::now() + window;
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Ok(received) = timeout(remaining, socket.recv_from(&mut buf)).await else {
            return Ok(());
        };
        let (len, _) = received?;

        match deserialize::<Packet>(&buf[..len]) {
            Ok(Packet::GameState { snapshot }) => info!("{}", describe(&snapshot)),
            Ok(Packet::PlayersUpdate { players }) => info!("{} players connected", players),
            Ok(Packet::VoteRejected { reason }) => warn!("Vote rejected: {}", reason),
            Ok(other) => warn!("Unexpected packet: {:?}", other),
            Err(e) => warn!("Failed to deserialize packet: {}", e),
        }
    }
}

/// Waits for `Connected`, skipping state broadcasts that may arrive first.
/// Returns `None` when the server refuses the session.
async fn wait_for_session(
    socket: &UdpSocket,
    window: Duration,
) -> Result<Option<u32>, Box<dyn std::error::Error>> {
    let deadline = Instant::now() + window;
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let len = timeout(remaining, socket.recv(&mut buf)).await??;

        match deserialize::<Packet>(&buf[..len]) {
            Ok(Packet::Connected { client_id }) => return Ok(Some(client_id)),
            Ok(Packet::Disconnected { reason }) => {
                warn!("Server refused connection: {}", reason);
                return Ok(None);
            }
            Ok(other) => debug!("Skipping {:?} while waiting for session", other),
            Err(e) => warn!("Failed to deserialize packet: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);
    socket.connect(args.server).await?;

    let connect = Packet::Connect {
        client_version: PROTOCOL_VERSION,
    };
    socket.send(&serialize(&connect)?).await?;
    info!("Sent connection request to {}", args.server);

    match wait_for_session(&socket, Duration::from_secs(5)).await? {
        Some(client_id) => info!("Connected with client ID {}", client_id),
        None => return Ok(()),
    }

    let interval = Duration::from_millis(args.interval_ms);
    let mut rng = rand::thread_rng();

    for _ in 0..args.votes {
        let direction = match args.direction {
            Some(direction) => direction,
            None => *Direction::ALL.choose(&mut rng).unwrap_or(&Direction::Up),
        };

        let vote = Packet::Vote {
            direction: direction.to_string(),
        };
        socket.send(&serialize(&vote)?).await?;
        info!("Voted {}", direction);

        drain_updates(&socket, interval).await?;
    }

    socket.send(&serialize(&Packet::Disconnect)?).await?;
    info!("Disconnected after {} votes", args.votes);

    // Give the datagram a moment to leave before the socket closes.
    sleep(Duration::from_millis(50)).await;
    Ok(())
}
