use golf_protocol::{Command, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::registry::ConnectionId;
use crate::tracker::{Mailbox, Tracker};

/// Serve one connection until EOF or a transport error, then force-remove
/// whatever it registered. The tracker lock is only taken inside `Tracker`
/// calls; socket writes happen on a separate task fed by a channel.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, tracker: Tracker, config: Arc<Config>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("[CONNECT] {}: could not set TCP_NODELAY: {}", peer, e);
    }
    let (read_half, mut write_half) = stream.into_split();

    let (tx_out, mut rx_out) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(mut text) = rx_out.recv().await {
            text.push('\n');
            if write_half.write_all(text.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let conn = tracker.connect(tx_out.clone());
    info!("[CONNECT] {} as connection {}", peer, conn);

    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    loop {
        match read_request(&mut reader, &mut buf, config.max_line_len, config.idle_timeout()).await {
            Ok(true) => {
                let line = buf.trim();
                if line.is_empty() {
                    continue;
                }
                route_line(line, &tracker, conn, &tx_out);
            }
            Ok(false) => {
                info!("[DISCONNECT] connection {} ({}) closed", conn, peer);
                break;
            }
            Err(e) => {
                warn!("[DISCONNECT] connection {} ({}): {}", conn, peer, e);
                break;
            }
        }
    }

    let removed = tracker.disconnect(conn);
    if !removed.is_empty() {
        debug!("[DISCONNECT] connection {} released {} player(s)", conn, removed.len());
    }
}

/// Read one `\n`-terminated request into `buf`. `Ok(false)` means EOF.
async fn read_request<R>(
    reader: &mut R,
    buf: &mut String,
    max_len: usize,
    idle: Option<Duration>,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut limited = (&mut *reader).take(max_len as u64 + 1);
    let read = limited.read_line(buf);
    let n = match idle {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| TrackerError::IdleTimeout(limit))??,
        None => read.await?,
    };
    if n == 0 {
        return Ok(false);
    }
    if n > max_len && !buf.ends_with('\n') {
        return Err(TrackerError::LineTooLong(max_len));
    }
    Ok(true)
}

fn route_line(line: &str, tracker: &Tracker, conn: ConnectionId, tx_out: &Mailbox) {
    match Command::parse(line) {
        Ok(cmd) => {
            debug!("[RECV] {} → {} ({:?})", conn, cmd.name(), line);
            route_cmd(cmd, tracker, conn, tx_out)
        }
        Err(e) => {
            warn!("[PROTOCOL] connection {}: {} ({:?})", conn, e, line);
            reply(tx_out, Response::from(e));
        }
    }
}

/// Apply one command and queue its response on the requester's channel.
pub fn route_cmd(cmd: Command, tracker: &Tracker, conn: ConnectionId, tx_out: &Mailbox) {
    match cmd {
        Command::Register { name, endpoint } => {
            let resp = match tracker.register(&name, endpoint, Some(conn)) {
                Ok(()) => Response::Registered,
                Err(e) => Response::failure(e),
            };
            reply(tx_out, resp);
        }
        Command::Deregister { name } => {
            let resp = match tracker.deregister(&name) {
                Ok(()) => Response::Deregistered,
                Err(e) => Response::failure(e),
            };
            reply(tx_out, resp);
        }
        Command::QueryPlayers => reply(tx_out, Response::Players(tracker.list_players())),
        Command::QueryGame => reply(tx_out, Response::Game(tracker.query_state())),
        Command::StartGame { dealer, num_players, holes } => {
            match tracker.start_game(&dealer, num_players, holes) {
                Ok(started) => {
                    reply(
                        tx_out,
                        Response::Started {
                            game_id: started.game_id,
                            players: started.participants.clone(),
                        },
                    );
                    tracker.announce(&started);
                }
                Err(e) => reply(tx_out, Response::failure(e)),
            }
        }
        Command::End { game_id, dealer } => {
            let resp = match tracker.end_game(game_id, &dealer) {
                Ok(()) => Response::Ended,
                Err(e) => Response::failure(e),
            };
            reply(tx_out, resp);
        }
    }
}

fn reply(tx_out: &Mailbox, resp: Response) {
    if tx_out.send(resp.to_string()).is_err() {
        debug!("[REPLY] writer gone, dropping response");
    }
}
