use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use casetrack_db::{Database, DbConfig, SqliteDatabase};
use casetrack_server::auth;
use casetrack_store::StoreConfig;

#[derive(Parser)]
#[command(name = "casetrack-server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new API key
    Keygen {
        /// Human-readable name for the key
        #[arg(long, default_value = "")]
        name: String,
    },
    /// List all API keys (metadata only, no secrets)
    ListKeys,
    /// Revoke (delete) an API key by ID
    RevokeKey {
        /// The API key ID to revoke
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open(&DbConfig::from_env())?);

    match cli.command {
        Some(Commands::Keygen { name }) => {
            let raw_key = auth::generate_api_key();
            let hash = auth::sha256_hex(&raw_key);
            let api_key = db.insert_api_key(&name, &hash).await?;
            eprintln!("Created API key (id: {})", api_key.id);
            if !name.is_empty() {
                eprintln!("  name: {name}");
            }
            // Print the raw key to stdout so it can be captured
            println!("{raw_key}");
            eprintln!("\nSave this key — it cannot be retrieved again.");
        }
        Some(Commands::ListKeys) => {
            let keys = db.list_api_keys().await?;
            if keys.is_empty() {
                eprintln!("No API keys found.");
            } else {
                println!("{:<38} {:<20} {:<28} LAST USED", "ID", "NAME", "CREATED");
                for key in keys {
                    println!(
                        "{:<38} {:<20} {:<28} {}",
                        key.id,
                        if key.name.is_empty() { "-" } else { &key.name },
                        key.created_at,
                        key.last_used_at.as_deref().unwrap_or("never"),
                    );
                }
            }
        }
        Some(Commands::RevokeKey { id }) => {
            db.delete_api_key(&id).await?;
            eprintln!("Revoked API key {id}");
        }
        None => {
            // Default: start server
            let bind = std::env::var("CASETRACK_BIND").unwrap_or_else(|_| "0.0.0.0".into());
            let port: u16 = std::env::var("CASETRACK_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3720);

            let addr = SocketAddr::new(bind.parse()?, port);

            let store = casetrack_store::create_store(&StoreConfig::from_env())?;

            let auth = auth::build_auth_config(db.clone()).await;
            if auth.is_some() {
                eprintln!("authentication enabled");
            } else {
                eprintln!("authentication disabled (no CASETRACK_API_KEY or DB keys)");
            }

            let listener = TcpListener::bind(addr).await?;
            eprintln!("casetrack-server listening on http://{addr}");

            casetrack_server::serve(listener, db, store, auth).await?;
        }
    }

    Ok(())
}
