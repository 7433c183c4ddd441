use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type GameId = u64;

pub const REGISTER_USAGE: &str = "register <name> [<host> <t_port> [<p_port>]]";
pub const DEREGISTER_USAGE: &str = "deregister <name>";
pub const QUERY_PLAYERS_USAGE: &str = "query_players";
pub const QUERY_GAME_USAGE: &str = "query_game";
pub const START_GAME_USAGE: &str = "start_game <dealer> <num_players> <holes>";
pub const END_USAGE: &str = "end <game_id> <dealer>";

/// ---- Players ----
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Free,
    InSession,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Free => write!(f, "free"),
            PlayerState::InSession => write!(f, "in-play"),
        }
    }
}

/// Where a player can be reached. Players colocated with the session host
/// register without one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    Single { host: String, port: u16 },
    Split { host: String, t_port: u16, p_port: u16 },
}

impl Endpoint {
    pub fn host(&self) -> &str {
        match self {
            Endpoint::Single { host, .. } | Endpoint::Split { host, .. } => host,
        }
    }

    /// Port peers should dial: the peer port when one was given.
    pub fn peer_port(&self) -> u16 {
        match self {
            Endpoint::Single { port, .. } => *port,
            Endpoint::Split { p_port, .. } => *p_port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Single { host, port } => write!(f, "{} {}", host, port),
            Endpoint::Split { host, t_port, p_port } => write!(f, "{} {} {}", host, t_port, p_port),
        }
    }
}

/// One row of the `query_players` roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerInfo {
    pub name: String,
    pub endpoint: Option<Endpoint>,
    pub state: PlayerState,
}

impl fmt::Display for PlayerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            Some(ep) => write!(f, "{}: {} {}", self.name, ep, self.state),
            None => write!(f, "{}: local {}", self.name, self.state),
        }
    }
}

/// One line of the roster pushed to a dealer when its game starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for RosterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.host, self.port)
    }
}

/// ---- Games ----
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    InProgress,
    Ended,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Waiting => write!(f, "waiting"),
            GameStatus::InProgress => write!(f, "in_progress"),
            GameStatus::Ended => write!(f, "ended"),
        }
    }
}

/// ---- Requests ----
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty request")]
    Empty,
    #[error("Unknown command.")]
    UnknownCommand(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register { name: String, endpoint: Option<Endpoint> },
    Deregister { name: String },
    QueryPlayers,
    QueryGame,
    StartGame { dealer: String, num_players: usize, holes: u32 },
    End { game_id: GameId, dealer: String },
}

impl Command {
    /// Parse one request line. The first token selects the command, the rest
    /// are positional arguments.
    pub fn parse(line: &str) -> Result<Command, ProtocolError> {
        let mut tokens = line.split_whitespace();
        let head = tokens.next().ok_or(ProtocolError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        match head {
            "register" => parse_register(&args),
            "deregister" => match args.as_slice() {
                [name] => Ok(Command::Deregister { name: name.to_string() }),
                _ => Err(ProtocolError::Usage(DEREGISTER_USAGE)),
            },
            "query_players" if args.is_empty() => Ok(Command::QueryPlayers),
            "query_players" => Err(ProtocolError::Usage(QUERY_PLAYERS_USAGE)),
            "query_game" if args.is_empty() => Ok(Command::QueryGame),
            "query_game" => Err(ProtocolError::Usage(QUERY_GAME_USAGE)),
            "start_game" => match args.as_slice() {
                [dealer, num_players, holes] => {
                    let num_players = positive::<usize>(num_players, START_GAME_USAGE)?;
                    let holes = positive::<u32>(holes, START_GAME_USAGE)?;
                    Ok(Command::StartGame {
                        dealer: dealer.to_string(),
                        num_players,
                        holes,
                    })
                }
                _ => Err(ProtocolError::Usage(START_GAME_USAGE)),
            },
            "end" => match args.as_slice() {
                [game_id, dealer] => {
                    let game_id = game_id
                        .parse::<GameId>()
                        .map_err(|_| ProtocolError::Usage(END_USAGE))?;
                    Ok(Command::End {
                        game_id,
                        dealer: dealer.to_string(),
                    })
                }
                _ => Err(ProtocolError::Usage(END_USAGE)),
            },
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::Deregister { .. } => "deregister",
            Command::QueryPlayers => "query_players",
            Command::QueryGame => "query_game",
            Command::StartGame { .. } => "start_game",
            Command::End { .. } => "end",
        }
    }
}

fn parse_register(args: &[&str]) -> Result<Command, ProtocolError> {
    let port = |s: &str| s.parse::<u16>().map_err(|_| ProtocolError::Usage(REGISTER_USAGE));
    let (name, endpoint) = match *args {
        [name] => (name, None),
        [name, host, p] => (
            name,
            Some(Endpoint::Single {
                host: host.to_string(),
                port: port(p)?,
            }),
        ),
        [name, host, t, p] => (
            name,
            Some(Endpoint::Split {
                host: host.to_string(),
                t_port: port(t)?,
                p_port: port(p)?,
            }),
        ),
        _ => return Err(ProtocolError::Usage(REGISTER_USAGE)),
    };
    Ok(Command::Register {
        name: name.to_string(),
        endpoint,
    })
}

fn positive<T>(token: &str, usage: &'static str) -> Result<T, ProtocolError>
where
    T: FromStr + PartialOrd + Default,
{
    match token.parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(ProtocolError::Usage(usage)),
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

/// Wire form of a request, without the trailing newline.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Register { name, endpoint: Some(ep) } => write!(f, "register {} {}", name, ep),
            Command::Register { name, endpoint: None } => write!(f, "register {}", name),
            Command::Deregister { name } => write!(f, "deregister {}", name),
            Command::QueryPlayers => write!(f, "query_players"),
            Command::QueryGame => write!(f, "query_game"),
            Command::StartGame { dealer, num_players, holes } => {
                write!(f, "start_game {} {} {}", dealer, num_players, holes)
            }
            Command::End { game_id, dealer } => write!(f, "end {} {}", game_id, dealer),
        }
    }
}

/// ---- Responses ----
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Registered,
    Deregistered,
    Players(Vec<PlayerInfo>),
    Game(GameStatus),
    Started { game_id: GameId, players: Vec<String> },
    Ended,
    Failure(String),
    UnknownCommand,
}

impl Response {
    pub fn failure(reason: impl fmt::Display) -> Self {
        Response::Failure(reason.to_string())
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownCommand(_) | ProtocolError::Empty => Response::UnknownCommand,
            usage @ ProtocolError::Usage(_) => Response::failure(usage),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Registered => write!(f, "SUCCESS: Player registered."),
            Response::Deregistered => write!(f, "SUCCESS: Player deregistered."),
            Response::Players(rows) => {
                let lines: Vec<String> = rows.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", lines.join("\n"))
            }
            Response::Game(status) => write!(f, "Game is currently {}.", status),
            Response::Started { game_id, players } => write!(
                f,
                "SUCCESS: Game {} started with players: [{}]",
                game_id,
                players.join(", ")
            ),
            Response::Ended => write!(f, "SUCCESS: Game ended."),
            Response::Failure(reason) => write!(f, "FAILURE: {}", reason),
            Response::UnknownCommand => write!(f, "Unknown command."),
        }
    }
}
