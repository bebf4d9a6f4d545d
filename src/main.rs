// src/main.rs
use std::process::exit;
use clap::Parser;
use tracing::{error, Level};

use dossier::cli::{App, Args};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let app = App::new(args);
    if let Err(e) = app.run().await {
        error!("{:#}", e);
        exit(1);
    }
}
