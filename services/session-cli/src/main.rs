//! Session CLI
//!
//! Command-line front end for the browser-style login flow:
//! 1. `login` prints the provider URL (optionally serving the callback itself)
//! 2. `callback` finishes a login from the URL the browser landed on
//! 3. `whoami`, `token` and `logout` read or end the stored session
//! 4. `keys` and `profile` call the internal API with the session's credential

mod callback;
mod config;
mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use api_client::{ApiClient, LogSink, Revoked};
use clap::{Parser, Subcommand};
use session_auth::{FileStore, KeyValueStore, LoginFlow, MemoryStore, Session};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "session-cli", version, about = "Sign in and manage API keys")]
struct Cli {
    /// Config file (falls back to CONFIG_PATH, then ./session-cli.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a login and print the URL to open
    Login {
        /// Serve the callback on the configured origin and wait for it
        #[arg(long)]
        listen: bool,
    },
    /// Finish a login from the URL the provider redirected to
    Callback { url: String },
    /// Show the signed-in user
    Whoami,
    /// Print the bearer credential for scripting
    Token,
    /// Sign out and print where to end the provider session
    Logout,
    /// Manage API keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Read or update profile fields
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Debug, Subcommand)]
enum KeysAction {
    List,
    Create { label: String },
    Revoke { key_id: String },
}

#[derive(Debug, Subcommand)]
enum ProfileAction {
    Get,
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr, LOG_LEVEL / RUST_LOG support; stdout is for command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(config = %config_path.display(), strategy = ?config.auth.strategy, "config loaded");

    let http = reqwest::Client::new();
    let durable: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(config.credentials_path()).context("failed to open credential store")?,
    );

    match cli.command {
        Command::Login { listen: true } => {
            // Verifier lives only as long as this process.
            let flow = LoginFlow::new(
                config.auth.clone(),
                http,
                durable,
                Arc::new(MemoryStore::new()),
            )?;
            let url = flow.begin_login()?;
            println!("Open this URL to sign in:\n\n  {url}\n");
            let timeout = Duration::from_secs(config.callback.timeout_secs);
            if !callback::await_callback(flow.clone(), timeout).await? {
                bail!("login failed");
            }
            print_user(flow.session());
        }
        Command::Login { listen: false } => {
            let flow = pending_flow(&config, http, durable)?;
            let url = flow.begin_login()?;
            println!("Open this URL to sign in:\n\n  {url}\n");
            println!("Then run: session-cli callback '<URL the browser lands on>'");
        }
        Command::Callback { url } => {
            let url = Url::parse(&url).context("callback URL is not a valid URL")?;
            let flow = pending_flow(&config, http, durable)?;
            if !flow.complete_login(&url).await {
                bail!("login failed; start again with `session-cli login`");
            }
            print_user(flow.session());
        }
        Command::Whoami => {
            let session = Session::new(durable);
            if session.current_user().is_none() {
                bail!("not signed in");
            }
            print_user(&session);
        }
        Command::Token => {
            let session = Session::new(durable);
            let Some(credential) = session.access_credential() else {
                bail!("not signed in");
            };
            println!("{}", credential.expose());
        }
        Command::Logout => {
            let target = sign_out(&config, http, durable)?;
            println!("Signed out. To end the provider session too, open:\n\n  {target}");
        }
        Command::Keys { action } => {
            let client = api_client(&config, http, durable);
            run_keys(&client, action).await?;
        }
        Command::Profile { action } => {
            let client = api_client(&config, http, durable);
            run_profile(&client, action).await?;
        }
    }

    Ok(())
}

/// Flow whose verifier survives between `login` and `callback` invocations.
fn pending_flow(
    config: &Config,
    http: reqwest::Client,
    durable: Arc<dyn KeyValueStore>,
) -> Result<LoginFlow> {
    let pending =
        FileStore::open(config.pending_path()).context("failed to open pending login store")?;
    Ok(LoginFlow::new(
        config.auth.clone(),
        http,
        durable,
        Arc::new(pending),
    )?)
}

/// Clear the stored session. Works even when the pending login store can't be opened.
fn sign_out(
    config: &Config,
    http: reqwest::Client,
    durable: Arc<dyn KeyValueStore>,
) -> Result<Url> {
    let pending: Arc<dyn KeyValueStore> = match FileStore::open(config.pending_path()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "pending login store unavailable, clearing credentials only");
            Arc::new(MemoryStore::new())
        }
    };
    let flow = LoginFlow::new(config.auth.clone(), http, durable, pending)?;
    Ok(flow.logout())
}

fn api_client(
    config: &Config,
    http: reqwest::Client,
    durable: Arc<dyn KeyValueStore>,
) -> ApiClient {
    ApiClient::new(
        http,
        config.auth.api_base.clone(),
        Session::new(durable),
        Arc::new(LogSink),
    )
}

fn print_user(session: &Session) {
    match session.current_user() {
        Some(user) if user.name.is_empty() => println!("Signed in as {}", user.email),
        Some(user) => println!("Signed in as {} <{}>", user.name, user.email),
        None => println!("Signed in"),
    }
}

async fn run_keys(client: &ApiClient, action: KeysAction) -> Result<()> {
    match action {
        KeysAction::List => {
            let rows = client.annotate(client.list_keys().await?);
            if rows.is_empty() {
                println!("No API keys");
            }
            for row in rows {
                let marker = if row.current_session {
                    "  (this session)"
                } else {
                    ""
                };
                println!(
                    "{}\t{}\t{}{marker}",
                    row.info.key_id,
                    row.info.display_label(),
                    row.info.created_at
                );
            }
        }
        KeysAction::Create { label } => {
            let issued = client.create_key(&label).await?;
            println!(
                "Created key {}. It will not be shown again:\n\n  {}",
                issued.key_id, issued.api_key
            );
        }
        KeysAction::Revoke { key_id } => match client.revoke_key(&key_id).await? {
            Revoked::OtherKey => println!("Revoked {key_id}"),
            Revoked::CurrentSession => {
                println!("Revoked {key_id}, the key this session used. Signed out.")
            }
        },
    }
    Ok(())
}

async fn run_profile(client: &ApiClient, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Get => {
            for (key, value) in client.get_profile().await? {
                println!("{key}={value}");
            }
        }
        ProfileAction::Set { key, value } => {
            client.update_profile_field(&key, &value).await?;
            println!("Updated {key}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_nested_subcommands() {
        let cli = Cli::try_parse_from(["session-cli", "keys", "create", "Claude"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Keys { action: KeysAction::Create { ref label } } if label == "Claude"
        ));

        let cli = Cli::try_parse_from(["session-cli", "login", "--listen", "--config", "x.toml"])
            .unwrap();
        assert!(matches!(cli.command, Command::Login { listen: true }));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));

        let cli =
            Cli::try_parse_from(["session-cli", "profile", "set", "timezone", "UTC"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Profile { action: ProfileAction::Set { ref key, ref value } }
                if key == "timezone" && value == "UTC"
        ));
    }

    #[test]
    fn cli_requires_a_command() {
        assert!(Cli::try_parse_from(["session-cli"]).is_err());
        assert!(Cli::try_parse_from(["session-cli", "keys", "revoke"]).is_err());
    }

    fn write_config(dir: &std::path::Path) -> Config {
        let path = dir.join("session-cli.toml");
        std::fs::write(
            &path,
            r#"
[auth]
provider_url = "https://auth.example.com"
client_id = "client-123"
origin = "http://127.0.0.1:8765"
api_base = "https://api.example.com"
timezone = "UTC"
"#,
        )
        .unwrap();
        Config::load(&path).unwrap()
    }

    #[test]
    fn logout_recovers_from_corrupt_store_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        std::fs::write(config.credentials_path(), "{truncated").unwrap();
        std::fs::write(config.pending_path(), "{truncated").unwrap();

        let durable: Arc<dyn KeyValueStore> =
            Arc::new(FileStore::open(config.credentials_path()).unwrap());
        let target = sign_out(&config, reqwest::Client::new(), durable.clone()).unwrap();

        assert!(target.as_str().starts_with("https://auth.example.com/logout?"));
        assert!(!Session::new(durable).has_session());
        let durable: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        assert!(pending_flow(&config, reqwest::Client::new(), durable).is_ok());
    }

    #[test]
    fn logout_does_not_need_pending_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        // A directory where the pending file should be cannot be opened as a store.
        std::fs::create_dir_all(config.pending_path()).unwrap();

        let durable: Arc<dyn KeyValueStore> =
            Arc::new(FileStore::open(config.credentials_path()).unwrap());
        durable
            .set_all(&[("api_key", "k"), ("api_key_id", "kid")])
            .unwrap();

        sign_out(&config, reqwest::Client::new(), durable.clone()).unwrap();
        assert!(durable.get("api_key").is_none());
        assert!(durable.get("api_key_id").is_none());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
