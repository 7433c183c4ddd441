use clap::Parser;
use golf_tracker::Config;

#[derive(Parser)]
#[command(name = "golf-tracker")]
#[command(about = "Six Card Golf tracker - player registry and game sessions")]
struct Cli {
    #[command(flatten)]
    config: Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    golf_tracker::init_tracing(&cli.config.log_level);

    if let Err(e) = golf_tracker::run(cli.config).await {
        tracing::error!("[FATAL] {:#}", e);
        std::process::exit(1);
    }
}
