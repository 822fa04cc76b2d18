use clap::Parser;
use ping_watch::{Config, Settings, TransportKind};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ping_watch")]
#[command(about = "Chat bot that monitors website availability", long_about = None)]
struct Args {
    /// Verbose output (-v, -vv, -vvv, -vvvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Chat service to serve
    #[arg(long, value_enum, default_value = "telegram")]
    transport: TransportKind,

    /// Settings file (default: ~/.ping-watch/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    Config::ensure_log_directory().ok();
    ping_watch::init_tracing(args.verbose, Some(Config::log_file_path()));

    let settings = Settings::load(args.config.as_deref())?;
    ping_watch::run(args.transport, settings).await
}
