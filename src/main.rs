use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use binaried::config::Config;
use binaried::db::Database;

/// Binaried: a small social network backend.
///
/// Serves the JSON API and live event stream the Binaried web client talks
/// to: accounts, posts with images, likes, replies and follows.
#[derive(Parser)]
#[command(name = "binaried", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and upload directory
    Init,

    /// Start the API server
    Serve {
        /// Port to listen on (default: $PORT or 5000)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },

    /// Load demo users and posts
    Seed {
        /// Wipe existing data first
        #[arg(long)]
        force: bool,
    },

    /// Show database status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("binaried=info,tower_http=info")
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing Binaried database...");
            let config = Config::load()?;
            let db = binaried::db::initialize_sqlite(&config.db_path)?;
            tokio::fs::create_dir_all(&config.upload_dir).await?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("Uploads stored in: {}", config.upload_dir.display());
            println!("\nBinaried is ready. Next step: set BINARIED_SESSION_SECRET in your .env file");
            println!("\nThen run: binaried seed   (optional demo data)");
            println!("     and: binaried serve");
        }

        Commands::Serve { port, bind } => {
            let config = Config::load()?;
            config.require_session_secret()?;
            let db = binaried::db::initialize_sqlite(&config.db_path)?;
            let port = port.unwrap_or(config.port);
            binaried::web::run_server(config, db, port, &bind).await?;
        }

        Commands::Seed { force } => {
            let config = Config::load()?;
            let db = binaried::db::initialize_sqlite(&config.db_path)?;
            println!("Seeding database...");
            binaried::seed::seed(&db, &config.upload_dir, force).await?;

            println!("\n{}", "Database seeded successfully.".bold());
            println!("Demo credentials:");
            println!("  Email: demo@example.com");
            println!("  Password: {}", binaried::seed::DEMO_PASSWORD);
        }

        Commands::Status => {
            let config = Config::load()?;
            if !binaried::status::is_initialized(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `binaried init` to set up the database.");
                return Ok(());
            }
            let db: Arc<dyn Database> = binaried::db::open_sqlite(&config.db_path)?;
            binaried::status::show(&db, &config.db_path).await?;
        }
    }

    Ok(())
}
