use std::fs;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use armory::codec::IdCodec;
use armory::config::ServerConfig;
use armory::server::{AppState, create_router};
use armory::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "armory")]
#[command(about = "A release bundle server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database, staging area and bundle store
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Largest accepted upload body, in bytes
        #[arg(long, default_value_t = 512 * 1024 * 1024)]
        max_upload_size: usize,

        /// Secret keying the external identifier codec
        #[arg(long, env = "ARMORY_SECRET", hide_env_values = true)]
        secret_key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("armory=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            data_dir,
            max_upload_size,
            secret_key,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                max_upload_size,
                secret_key,
            };

            fs::create_dir_all(&config.data_dir)?;
            fs::create_dir_all(config.temp_dir())?;
            fs::create_dir_all(config.bundle_dir())?;

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;

            let codec = IdCodec::new(&config.secret_key)?;

            let state = Arc::new(AppState::new(Arc::new(store), codec, &config));
            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
