use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use bw_crypto::{boxes, BoxKeyPair};
use bw_gateway::{load_settings, GatewaySettings};
use bw_store::{Session, SqliteSessionStore, TokenStore};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bwctl")]
#[command(author, version, about = "Boxwire session administration", long_about = None)]
struct Cli {
    /// SQLite session database
    #[arg(long, env = "BOXWIRE_DB", default_value = "boxwire.db")]
    db: PathBuf,

    /// JSON settings file
    #[arg(long, env = "BOXWIRE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue a new access token for a user
    Issue {
        user_id: String,
        /// Token lifetime, defaults to the configured session TTL
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// Revoke one session by id
    Revoke { id: String },

    /// Revoke every session of a user
    RevokeAll { user_id: String },

    /// Bind a client box public key (base64) to a session
    BindKey { id: String, public_key: String },

    /// Generate a client box key pair
    Keygen,

    /// Show the session behind an access token
    Inspect { access_token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    init_tracing(&settings);

    match cli.command {
        Commands::Keygen => keygen(),
        command => {
            let tokens = open_tokens(&cli.db).await?;
            run(command, &tokens, &settings).await
        }
    }
}

fn init_tracing(settings: &GatewaySettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_tokens(db: &Path) -> Result<TokenStore> {
    let store = SqliteSessionStore::open(db)
        .await
        .with_context(|| format!("opening {}", db.display()))?;
    Ok(TokenStore::new(Arc::new(store)))
}

async fn run(command: Commands, tokens: &TokenStore, settings: &GatewaySettings) -> Result<()> {
    match command {
        Commands::Issue { user_id, ttl_secs } => {
            let ttl = ttl_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| settings.session_ttl());
            let session = tokens.issue(&user_id, ttl).await?;
            print_json(&session_summary(&session, true))
        }
        Commands::Revoke { id } => {
            if !tokens.revoke(&id).await? {
                return Err(anyhow!("no session {id}"));
            }
            println!("revoked {id}");
            Ok(())
        }
        Commands::RevokeAll { user_id } => {
            let cleared = tokens.revoke_all(&user_id).await?;
            info!(user_id = %user_id, cleared, "revoke-all finished");
            println!("revoked all sessions for {user_id}");
            Ok(())
        }
        Commands::BindKey { id, public_key } => {
            let raw = STANDARD.decode(public_key.trim()).context("public key is not base64")?;
            let key = boxes::public_key_from_slice(&raw)?;
            if !tokens.bind_client_key(&id, &key).await? {
                return Err(anyhow!("no session {id}"));
            }
            println!("bound client key to {id}");
            Ok(())
        }
        Commands::Inspect { access_token } => {
            let session = tokens
                .resolve(&access_token)
                .await?
                .ok_or_else(|| anyhow!("access token unknown or expired"))?;
            print_json(&session_summary(&session, false))
        }
        Commands::Keygen => keygen(),
    }
}

fn keygen() -> Result<()> {
    let pair = BoxKeyPair::generate();
    print_json(&json!({
        "public_key": STANDARD.encode(pair.public_key()),
        "secret_key": STANDARD.encode(pair.secret_bytes()),
    }))
}

/// Tokens and `ikm` are printed only at issue time.
fn session_summary(session: &Session, with_secrets: bool) -> serde_json::Value {
    let token = &session.token;
    let mut out = json!({
        "id": token.id,
        "user_id": token.user_id,
        "expires_at": token.expires_at.to_rfc3339(),
        "box_public_key": session.keys.box_public_key,
        "sign_public_key": session.keys.sign_public_key,
        "client_public_key": session.keys.client_public_key,
    });
    if with_secrets {
        out["access_token"] = json!(token.access_token);
        out["refresh_token"] = json!(token.refresh_token);
        out["ikm"] = json!(token.ikm);
    }
    out
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
