// src/main.rs

use clap::Parser;
use tablesync::cli::{self, Cli, Commands};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Query(args) => cli::query::run(args),
        Commands::Sync { db, sheet, settings } => {
            cli::sync::run(&db, &sheet, settings.as_deref()).await
        }
        Commands::Submit {
            db,
            sheet,
            line,
            settings,
        } => cli::sync::submit(&db, &sheet, line, settings.as_deref()).await,
        Commands::Replace { db, sheet, settings } => {
            cli::replace::run(&db, &sheet, settings.as_deref()).await
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
