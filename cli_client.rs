use anyhow::Context;
use clap::Parser;
use golf_protocol::{Command, Endpoint};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "cli_client")]
#[command(about = "Six Card Golf - interactive tracker client")]
struct Args {
    /// Tracker host
    #[arg(long, env = "TRACKER_HOST", default_value = "127.0.0.1")]
    host: String,
    /// Tracker port
    #[arg(short, long, env = "PORT", default_value_t = 27000)]
    port: u16,
    /// Player name (prompted for when omitted)
    #[arg(short, long)]
    name: Option<String>,
    /// Host peers should use to reach this player
    #[arg(long)]
    peer_host: Option<String>,
    /// Tracker-facing port advertised at registration
    #[arg(long, requires = "peer_host")]
    t_port: Option<u16>,
    /// Peer-to-peer port advertised at registration
    #[arg(long, requires = "t_port")]
    p_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    println!("⛳ Six Card Golf CLI Client");
    println!("==========================");

    let player_name = match args.name.clone() {
        Some(name) => name,
        None => {
            print!("Enter your name: ");
            io::stdout().flush()?;
            let mut name = String::new();
            io::stdin().read_line(&mut name)?;
            name.trim().to_string()
        }
    };

    if player_name.is_empty() || player_name.contains(char::is_whitespace) {
        println!("❌ Name must be a single non-empty word");
        return Ok(());
    }

    let addr = format!("{}:{}", args.host, args.port);
    println!("🔗 Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connecting to tracker at {addr}"))?;
    println!("✅ Connected to tracker!");

    let (read_half, mut write_half) = stream.into_split();

    // Print everything the tracker sends, including the roster pushed when we deal.
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => println!("📨 {}", line),
                Ok(None) => {
                    println!("🔌 Connection closed by tracker");
                    break;
                }
                Err(e) => {
                    println!("❌ Connection error: {}", e);
                    break;
                }
            }
        }
    });

    let register = Command::Register {
        name: player_name.clone(),
        endpoint: endpoint_from(&args),
    };
    write_half.write_all(format!("{}\n", register).as_bytes()).await?;

    println!("\n📋 Commands available:");
    println!("  players          - List registered players");
    println!("  game             - Show the game status");
    println!("  start <n> [holes] - Deal a game for n players (default 9 holes)");
    println!("  end <game_id>    - End a game you dealt");
    println!("  deregister       - Leave the tracker");
    println!("  <raw request>    - Any tracker request, e.g. query_players");
    println!("  quit             - Exit");
    println!("\nType commands and press Enter:");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }

        match parse_command(line, &player_name) {
            Ok(cmd) => {
                write_half.write_all(format!("{}\n", cmd).as_bytes()).await?;
            }
            Err(e) => println!("❓ {}", e),
        }
    }

    println!("👋 Goodbye!");
    Ok(())
}

fn endpoint_from(args: &Args) -> Option<Endpoint> {
    let host = args.peer_host.clone()?;
    let t_port = args.t_port?;
    Some(match args.p_port {
        Some(p_port) => Endpoint::Split { host, t_port, p_port },
        None => Endpoint::Single { host, port: t_port },
    })
}

/// Shortcuts fill in our own name; anything else must be a full request.
fn parse_command(input: &str, me: &str) -> Result<Command, golf_protocol::ProtocolError> {
    let parts: Vec<&str> = input.split_whitespace().collect();

    match parts.as_slice() {
        ["players"] => Ok(Command::QueryPlayers),
        ["game"] => Ok(Command::QueryGame),
        ["deregister"] => Ok(Command::Deregister { name: me.to_string() }),
        ["start", n] => Command::parse(&format!("start_game {} {} 9", me, n)),
        ["start", n, holes] => Command::parse(&format!("start_game {} {} {}", me, n, holes)),
        ["end", id] => Command::parse(&format!("end {} {}", id, me)),
        _ => Command::parse(input),
    }
}
