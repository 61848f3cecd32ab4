//! Command handlers driving the credential manager.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokencache_core::transport::{ConnectOptions, Connector, TcpConnector};
use tokencache_core::{CredentialManager, Storage, TokenRecord, UserId};
use tracing::{debug, info};

use crate::cli::{Command, UserAction};
use crate::format::{format_optional, format_ttl, redact};

/// Default token lifetime: two weeks.
pub const DEFAULT_TTL_SECS: i64 = 1_209_600;

pub async fn run<S: Storage>(command: Command, auth: &mut CredentialManager<S>) -> Result<()> {
    match command {
        Command::Show => show(auth),
        Command::Login {
            id,
            user_id,
            ttl,
            created,
            response,
            remember,
        } => {
            let id = match id {
                Some(id) => id,
                None => prompt_token()?,
            };
            let mut token = TokenRecord {
                id: Some(id),
                user_id: user_id.as_deref().map(UserId::parse),
                created: Some(created.unwrap_or_else(now)),
                ttl: Some(ttl),
                ..TokenRecord::default()
            };
            if let Some(response) = response {
                let patch: TokenRecord =
                    serde_json::from_str(&response).context("Failed to parse login response")?;
                token.merge(patch);
            }
            login(auth, token, remember);
            Ok(())
        }
        Command::User { action } => match action {
            UserAction::Show => show_user(auth),
            UserAction::Set { user, remember } => {
                let user: Value = serde_json::from_str(&user).context("User must be JSON")?;
                if remember {
                    auth.set_remember_me(true);
                }
                auth.set_user(user);
                Ok(())
            }
        },
        Command::Clear => {
            auth.clear();
            info!("Credentials cleared");
            println!("Credentials cleared.");
            Ok(())
        }
        Command::Connect {
            address,
            timeout_ms,
            message,
        } => connect(auth, &address, timeout_ms, message.as_deref()).await,
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn prompt_token() -> Result<String> {
    let token = rpassword::prompt_password("Access token: ")?;
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(anyhow::anyhow!("Access token required"));
    }
    Ok(token)
}

fn login<S: Storage>(auth: &mut CredentialManager<S>, token: TokenRecord, remember: bool) {
    auth.set_remember_me(remember);
    auth.set_token(token);
    info!(remember, "Access token cached");

    if remember {
        println!("Token cached.");
    } else {
        println!("Token cached for this session only (use --remember to keep it).");
    }
}

fn show<S: Storage>(auth: &CredentialManager<S>) -> Result<()> {
    let token = auth.token();
    if token.is_empty() {
        println!("No cached credentials.");
        return Ok(());
    }

    println!(
        "Access token: {}",
        auth.access_token_id()
            .map(redact)
            .unwrap_or_else(|| "-".to_string())
    );
    println!("User id:      {}", format_optional(auth.current_user_id(), "-"));
    println!("Created:      {}", format_optional(token.created.as_deref(), "-"));
    println!("TTL:          {}", format_optional(token.ttl.map(format_ttl), "-"));
    println!("Remember me:  {}", format_optional(token.remember_me, "-"));
    Ok(())
}

fn show_user<S: Storage>(auth: &CredentialManager<S>) -> Result<()> {
    match auth
        .current_user_data()
        .context("Cached user data is unusable")?
    {
        Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
        None => println!("No cached user."),
    }
    Ok(())
}

async fn connect<S: Storage>(
    auth: &CredentialManager<S>,
    address: &str,
    timeout_ms: Option<u64>,
    message: Option<&str>,
) -> Result<()> {
    let mut options = ConnectOptions::new();
    if let Some(id) = auth.access_token_id() {
        options.insert("auth_token".to_string(), Value::String(id.to_string()));
    } else {
        debug!("No cached access token, connecting anonymously");
    }
    if let Some(timeout_ms) = timeout_ms {
        options.insert("timeout_ms".to_string(), Value::from(timeout_ms));
    }

    let mut channel = TcpConnector::new()
        .connect(address, &options)
        .await
        .with_context(|| format!("Failed to connect to {}", address))?;
    info!(address, "Channel open");

    if let Some(message) = message {
        let message: Value = serde_json::from_str(message).context("Message must be JSON")?;
        channel.send(&message).await?;
        if let Some(reply) = channel.recv().await? {
            println!("{}", reply);
        }
    }

    channel.close().await?;
    Ok(())
}
