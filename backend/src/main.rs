use std::path::PathBuf;

use clap::Parser;

/// Poll wagering backend.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON file with users to create on startup
    #[arg(long)]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    server::start_server(args.seed).await
}
