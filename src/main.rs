use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use todanni::api::{self, AppState};
use todanni::config::{self, Config};
use todanni::store::postgres::PgStore;
use todanni::store::PermissionSource;
use todanni::token::AccessToken;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let cfg = config::load()?;
    init_tracing(cfg.json_logs);

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Token { command }) => handle_token_command(command, cfg).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "todanni=debug,tower_http=debug".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!(order = ?cfg.token_order, "Token extraction order");
    let state = Arc::new(AppState::new(cfg, Arc::new(db)));
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("todanni API listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_token_command(cmd: cli::TokenCommands, cfg: Config) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Issue {
            user_id,
            projects,
            dashboards,
            from_db,
        } => {
            if user_id.trim().is_empty() {
                anyhow::bail!("--user-id must not be empty");
            }
            let (projects, dashboards) = if from_db {
                let db = PgStore::connect(&cfg.database_url).await?;
                (
                    db.project_ids_for_user(&user_id)
                        .await
                        .context("failed to load project permissions")?,
                    db.dashboard_ids_for_user(&user_id)
                        .await
                        .context("failed to load dashboard permissions")?,
                )
            } else {
                (projects, dashboards)
            };

            let token = AccessToken::create(user_id, projects, dashboards);
            let signed = token.sign(&cfg.signing_key)?;
            eprintln!("Token issued, expires {}", token.expires_at());
            println!("{}", signed.as_str());
        }
        cli::TokenCommands::Inspect { token } => {
            let verified = AccessToken::verify(token.trim(), &cfg.signing_key)
                .context("token did not verify")?;
            let session = api::auth::SessionResponse::from(&verified);
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
    }
    Ok(())
}
