use clap::{Parser, Subcommand};
use golf_tracker::Config;
use std::process::{Command, Stdio};

#[derive(Parser)]
#[command(name = "sixcard-golf")]
#[command(about = "Six Card Golf - tracker and client launcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracker in this process
    Tracker {
        #[command(flatten)]
        config: Config,
    },
    /// Run the interactive client shell
    Client {
        /// Tracker host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Tracker port
        #[arg(short, long, default_value = "27000")]
        port: u16,
        /// Player name (prompted for when omitted)
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tracker { config } => run_tracker(config),
        Commands::Client { host, port, name } => run_client(&host, port, name.as_deref()),
    }
}

fn run_tracker(config: Config) {
    golf_tracker::init_tracing(&config.log_level);
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(golf_tracker::run(config)) {
        tracing::error!("[FATAL] {:#}", e);
        std::process::exit(1);
    }
}

fn run_client(host: &str, port: u16, name: Option<&str>) {
    let port = port.to_string();
    let mut args = vec!["run", "--bin", "cli_client", "--", "--host", host, "--port", port.as_str()];
    if let Some(name) = name {
        args.extend(["--name", name]);
    }

    let status = Command::new("cargo")
        .args(&args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status();

    match status {
        Ok(exit_status) => {
            if !exit_status.success() {
                eprintln!("❌ Client exited with error: {}", exit_status);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start client: {}", e);
            std::process::exit(1);
        }
    }
}
