use bincode::{deserialize, serialize};
use clap::Parser;
use shared::{ControlMessage, Direction, Packet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

/// Scripted player: joins, walks its zone, fires, then leaves
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server control address
    #[arg(short, long, default_value = "127.0.0.1:5556")]
    server: SocketAddr,

    /// Move/fire rounds to play
    #[arg(short, long, default_value = "10")]
    rounds: u32,
}

async fn send_request(
    socket: &UdpSocket,
    server: SocketAddr,
    request: ControlMessage,
) -> Result<Packet, Box<dyn std::error::Error>> {
    let data = serialize(&Packet::Request(request))?;
    socket.send_to(&data, server).await?;

    let mut buf = [0u8; 2048];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    Ok(deserialize::<Packet>(&buf[..len])?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    println!("Joining arena at {}", args.server);
    let joined = match send_request(&socket, args.server, ControlMessage::join()).await? {
        Packet::Joined(reply) if reply.ticket.is_full() => {
            println!("Arena is full");
            return Ok(());
        }
        Packet::Joined(reply) => reply,
        other => {
            println!("Expected join reply but got: {:?}", other);
            return Ok(());
        }
    };
    println!(
        "Joined as {} with ticket {}",
        joined.glyph as char, joined.ticket
    );

    for round in 0..args.rounds {
        let direction = Direction::ALL[round as usize % Direction::ALL.len()];
        let moved = send_request(
            &socket,
            args.server,
            ControlMessage::movement(joined.glyph, joined.ticket, direction),
        )
        .await?;
        println!("Moved {:?}: {:?}", direction, moved);

        let fired = send_request(
            &socket,
            args.server,
            ControlMessage::fire(joined.glyph, joined.ticket),
        )
        .await?;
        match fired {
            Packet::Score { text } => println!("Fired, score {}", text),
            other => println!("Unexpected packet: {:?}", other),
        }

        sleep(Duration::from_secs(1)).await;
    }

    let left = send_request(
        &socket,
        args.server,
        ControlMessage::leave(joined.glyph, joined.ticket),
    )
    .await?;
    println!("Left with {:?}", left);

    println!("Test client finished");
    Ok(())
}
