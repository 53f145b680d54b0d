use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use tokengate::auth::{Argon2Hasher, MemoryUserDirectory, SharedUserDirectory};
use tokengate::config::GateConfig;
use tokengate::mailer::LogMailer;
use tokengate::routes::routes;
use tokengate::services::{AuthService, TokenService};
use tokengate::storage::{MemoryStore, SharedStore};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Load config from configs/.env (or the environment specific file)
    let config = match GateConfig::load("configs") {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, environment={}",
        config.host, config.port, config.environment
    );

    let users = match &config.users_file {
        Some(path) => match MemoryUserDirectory::load_json_file(path).await {
            Ok(users) => users,
            Err(e) => {
                error!("Failed to load users: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            warn!("TOKENGATE_USERS_FILE is not set, starting with an empty user directory");
            MemoryUserDirectory::new()
        }
    };
    let users: SharedUserDirectory = Arc::new(users);

    // Expiring stores with periodic sweeps
    let refresh_store = Arc::new(MemoryStore::new("refresh-token"));
    let revocation_store = Arc::new(MemoryStore::new("revocation"));
    let reset_store = Arc::new(MemoryStore::new("password-reset"));
    refresh_store.start_cleanup_task(config.store_cleanup_interval);
    revocation_store.start_cleanup_task(config.store_cleanup_interval);
    reset_store.start_cleanup_task(config.store_cleanup_interval);

    let tokens = Arc::new(TokenService::new(
        &config,
        Arc::clone(&users),
        refresh_store as SharedStore,
        revocation_store as SharedStore,
    ));
    // Reset links are only logged until a delivering mailer is configured
    let auth = Arc::new(AuthService::new(
        &config,
        users,
        Arc::new(Argon2Hasher::new()),
        tokens,
        reset_store as SharedStore,
        Arc::new(LogMailer::new()),
    ));

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting TokenGate {} on {}", config.version, addr);

    warp::serve(routes(auth, config.version.clone()))
        .run(addr)
        .await;
}
