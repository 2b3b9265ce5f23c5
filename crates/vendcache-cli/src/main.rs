//! vendcache command line client.
//!
//! Thin consumer of the core library: boots the client, restores the
//! persisted session and exposes login, logout, status and sync as
//! subcommands. All session and cache behavior lives in the core; this
//! binary only drives it and formats the output.

use std::io::{self, Write};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vendcache_core::{AuthError, Config, CredentialStore, VendClient};

/// Environment variable supplying the login email non-interactively.
const EMAIL_ENV: &str = "VENDCACHE_EMAIL";

/// Environment variable supplying the login password non-interactively.
const PASSWORD_ENV: &str = "VENDCACHE_PASSWORD";

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    // Use RUST_LOG to control log level (e.g. RUST_LOG=vendcache_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // Rolling file log next to the cached data; skipped when the directory
    // cannot be created.
    let file_layer = config
        .data_dir()
        .and_then(|dir| {
            let logs = dir.join("logs");
            std::fs::create_dir_all(&logs)?;
            Ok(logs)
        })
        .ok()
        .map(|logs| {
            let appender = tracing_appender::rolling::daily(logs, "vendcache.log");
            fmt::layer().with_ansi(false).with_writer(appender)
        });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    init_tracing(&config);

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "login" => {
            let remember = args.iter().any(|arg| arg == "--remember");
            cmd_login(config, remember).await
        }
        "logout" => cmd_logout(config).await,
        "status" => cmd_status(config).await,
        "sync" => cmd_sync(config).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("unknown command '{other}'");
        }
    }
}

fn print_usage() {
    eprintln!("vendcache - session and cache client for the Vendora marketplace");
    eprintln!();
    eprintln!("Usage: vendcache <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  login [--remember]   Sign in; --remember keeps the password in the OS keychain");
    eprintln!("  logout               Sign out and clear the stored session");
    eprintln!("  status               Show the session and per-dataset cache state");
    eprintln!("  sync                 Refresh every stale dataset");
    eprintln!();
    eprintln!("{EMAIL_ENV} and {PASSWORD_ENV} skip the prompts when set.");
}

async fn cmd_login(mut config: Config, remember: bool) -> Result<()> {
    let email = match std::env::var(EMAIL_ENV) {
        Ok(email) if !email.is_empty() => email,
        _ => prompt_email(config.last_email.as_deref())?,
    };
    let password = resolve_password(&email)?;

    let client = VendClient::bootstrap(config.clone()).await?;
    match client.login(&email, &password).await {
        Ok(session) => {
            println!("Logged in as {}", session.display_name);
            if let Some(entity) = &session.selected_entity {
                let name = entity.name.as_deref().unwrap_or(&entity.entity_id);
                println!("Acting for {name}");
            }
            if remember {
                if let Err(error) = CredentialStore::store(&email, &password) {
                    warn!(%error, "Could not save credentials to the keychain");
                }
            }
            config.last_email = Some(email);
            if let Err(error) = config.save() {
                warn!(%error, "Could not save config");
            }
            Ok(())
        }
        Err(AuthError::InvalidCredentials) => bail!("invalid email or password"),
        Err(AuthError::EmailNotVerified) => {
            bail!("email address not verified; check your inbox for the verification mail")
        }
        Err(error) => bail!("login failed: {error}"),
    }
}

async fn cmd_logout(config: Config) -> Result<()> {
    let client = VendClient::bootstrap(config).await?;
    if !client.snapshot().is_authenticated {
        println!("Not logged in");
        return Ok(());
    }
    client.logout().await;
    println!("Logged out");
    Ok(())
}

async fn cmd_status(config: Config) -> Result<()> {
    let client = VendClient::bootstrap(config).await?;
    let snapshot = client.snapshot();
    match &snapshot.session {
        Some(session) => {
            println!("Logged in as {} (user {})", session.display_name, session.user_id);
            if let Some(entity) = &session.selected_entity {
                let name = entity.name.as_deref().unwrap_or(&entity.entity_id);
                match entity.role.as_deref() {
                    Some(role) => println!("Acting for {name} [{role}]"),
                    None => println!("Acting for {name}"),
                }
            }
            println!(
                "Session issued {}",
                session.issued_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        None => println!("Not logged in"),
    }

    println!();
    println!("{:<22} {:>7}  {:<5} {}", "dataset", "entries", "fresh", "fetched");
    for (tag, status) in client.cache_overview() {
        println!(
            "{:<22} {:>7}  {:<5} {}",
            tag.to_string(),
            status.entries,
            if status.fresh { "yes" } else { "no" },
            status.last_fetched.map_or_else(|| "-".to_string(), age_display),
        );
    }
    Ok(())
}

async fn cmd_sync(config: Config) -> Result<()> {
    let client = VendClient::bootstrap(config).await?;
    if !client.snapshot().is_authenticated {
        bail!("not logged in; run `vendcache login` first");
    }
    info!("Sync requested");
    let report = client.sync_all().await;
    println!("Refreshed {} datasets ({} failed)", report.refreshed, report.failed);
    if report.failed > 0 {
        bail!("{} datasets failed to refresh", report.failed);
    }
    Ok(())
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => eprint!("Email [{last}]: "),
        None => eprint!("Email: "),
    }
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let entered = line.trim();
    if entered.is_empty() {
        match last {
            Some(last) => Ok(last.to_string()),
            None => bail!("an email address is required"),
        }
    } else {
        Ok(entered.to_string())
    }
}

/// Password resolution order: environment, then the keychain entry saved by
/// a previous `login --remember`, then an interactive prompt.
fn resolve_password(email: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    if CredentialStore::has_credentials(email) {
        info!("Using remembered credentials");
        return CredentialStore::get_password(email);
    }
    Ok(rpassword::prompt_password("Password: ")?)
}

/// Compact relative age for the status table.
fn age_display(last_fetched: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - last_fetched).num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{hours}h ago")
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{days}d ago")
        }
    }
}
