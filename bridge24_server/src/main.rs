use bridge24_core::config::{BitrixConfig, EmailMatching, SyncSettings};
use bridge24_core::forward::ContactForwarder;
use bridge24_core::models::{User, UserProfile};
use bridge24_core::reconcile::engine::Reconciler;
use bridge24_core::store::sqlite::SqliteStore;
use bridge24_core::store::traits::UserStore;
use bridge24_integrations::BitrixClient;
use bridge24_server::auth::SessionAuth;
use bridge24_server::cli::{Cli, Commands};
use bridge24_server::server::{self, AppState};
use chrono::Utc;
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

async fn open_store(data_dir: &Path) -> anyhow::Result<Arc<SqliteStore>> {
    Ok(Arc::new(
        SqliteStore::open(data_dir.join("bridge24.db")).await?,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_directive = match &cli.command {
        Some(Commands::Sync { verbose: true, .. }) => "debug",
        _ => "info",
    };
    bridge24_core::o11y::init_global_from_env(default_directive)?;

    let cmd = cli.command.unwrap_or(Commands::Serve {
        host: "0.0.0.0".to_string(),
        port: 8000,
        data_dir: ".bridge24_dev".into(),
    });

    match cmd {
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            let addr: SocketAddr = format!("{host}:{port}").parse()?;
            let store = open_store(&data_dir).await?;

            let bitrix = Arc::new(BitrixClient::new(BitrixConfig::from_env()?)?);
            let forwarder = Arc::new(ContactForwarder::new(store.clone(), bitrix));

            let state = AppState::new(store.clone(), store, forwarder);
            server::serve(addr, state).await?;
        }
        Commands::Sync {
            dry_run,
            verbose: _,
            exact_email,
            data_dir,
        } => {
            let store = open_store(&data_dir).await?;
            let bitrix = Arc::new(BitrixClient::new(BitrixConfig::from_env()?)?);

            let settings = SyncSettings {
                dry_run,
                matching: if exact_email {
                    EmailMatching::Exact
                } else {
                    EmailMatching::CaseInsensitive
                },
            };

            let reconciler = Reconciler::new(bitrix, store);
            let report = reconciler.run(settings).await?;
            println!("{report}");
        }
        Commands::Migrate { data_dir } => {
            // `open` applies the schema.
            let _ = open_store(&data_dir).await?;
            tracing::info!("schema applied");
        }
        Commands::CreateUser {
            data_dir,
            email,
            password,
            first_name,
            last_name,
        } => {
            let store = open_store(&data_dir).await?;

            let user = User {
                user_id: Uuid::new_v4(),
                email: email.trim().to_lowercase(),
                password_hash: SessionAuth::hash_password(&password)?,
                first_name,
                last_name,
                date_joined: Utc::now(),
                last_login: None,
                profile: UserProfile::default(),
            };
            store.create_user(&user).await?;

            let auth = SessionAuth::new(store);
            let token = auth.issue_token(user.user_id).await?;

            println!("user_id: {}", user.user_id);
            println!("token: {token}");
        }
    }

    Ok(())
}
