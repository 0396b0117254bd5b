mod commands;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sparkpoint_auth::{CookieAttributes, CookieStore, FileJar, SessionStore};
use sparkpoint_client::{ApiClient, ServerCookies};
use sparkpoint_core::{
    COOKIE_FILE, CONFIG_FILE, FormSchema, FormValues, SERVER_COOKIE_FILE, default_config_dir,
    load_config, write_default_config,
};
use tracing_subscriber::EnvFilter;

use crate::commands::owners::{self, OwnerCommands};
use crate::commands::session::{self, AdminCommands};
use crate::commands::stations::{self, StationCommands};

const LOG_ENV: &str = "SPARKPOINT_LOG";

#[derive(Debug, Parser)]
#[command(name = "sparkpoint", about = "SparkPoint admin console, from the terminal")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a default config.toml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Sign in and persist the session
    Login {
        #[arg(long)]
        identifier: String,
        /// Read from the environment when set, otherwise prompted for
        #[arg(long, env = "SPARKPOINT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out (local state is always cleared)
    Logout,
    /// Show the persisted session
    Whoami,
    /// Fetch the signed-in user's profile from the server
    Profile,
    /// Administrator management
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    /// Charging stations
    Stations {
        #[command(subcommand)]
        command: StationCommands,
    },
    /// EV owners
    Owners {
        #[command(subcommand)]
        command: OwnerCommands,
    },
    /// Check a form locally without contacting the server
    Validate {
        #[command(subcommand)]
        form: ValidateForm,
    },
}

#[derive(Debug, Subcommand)]
enum ValidateForm {
    Station {
        #[arg(long = "set", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);

    match cli.command {
        Commands::Init { force } => {
            let path = cfg_dir.join(CONFIG_FILE);
            if force && path.exists() {
                fs::remove_file(&path)?;
            }
            let written = write_default_config(&cfg_dir)?;
            let text = if written { "Init complete" } else { "Config already present" };
            pout(
                cli.json,
                serde_json::json!({"written": written, "config_dir": cfg_dir}),
                text,
            )?;
        }
        Commands::Validate { form: ValidateForm::Station { fields } } => {
            let values: FormValues = fields.into_iter().collect();
            let errors = FormSchema::station().validate_form(&values);
            if errors.is_empty() {
                pout(cli.json, serde_json::json!({"valid": true}), "Station form is valid")?;
            } else {
                pout(
                    cli.json,
                    serde_json::json!({"valid": false, "errors": errors}),
                    &errors.to_string(),
                )?;
                anyhow::bail!("{} field(s) invalid", errors.len());
            }
        }
        Commands::Login { identifier, password } => {
            let client = open_client(&cfg_dir)?;
            let password = match password {
                Some(p) => p,
                None => rpassword::prompt_password(format!("Password for {identifier}: "))?,
            };
            if password.is_empty() {
                anyhow::bail!("Password cannot be empty");
            }
            session::login(&client, &identifier, &password, cli.json).await?;
        }
        Commands::Logout => session::logout(&open_client(&cfg_dir)?, cli.json).await?,
        Commands::Whoami => session::whoami(&open_client(&cfg_dir)?, cli.json)?,
        Commands::Profile => session::profile(&open_client(&cfg_dir)?, cli.json).await?,
        Commands::Admin { command } => {
            session::admin(&open_client(&cfg_dir)?, command, cli.json).await?;
        }
        Commands::Stations { command } => {
            stations::run(&open_client(&cfg_dir)?, command, cli.json).await?;
        }
        Commands::Owners { command } => {
            owners::run(&open_client(&cfg_dir)?, command, cli.json).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config, persisted cookies, rehydrated session, client: in that order.
/// Both cookie files live next to `config.toml`.
fn open_client(cfg_dir: &Path) -> anyhow::Result<ApiClient> {
    let cfg = load_config(cfg_dir)?;
    let attrs = CookieAttributes::for_transport(cfg.is_secure()).with_max_age(cfg.cookie_max_age_secs);
    let jar = FileJar::new(cfg_dir.join(COOKIE_FILE));
    let cookies = Arc::new(CookieStore::new(jar, cfg.is_secure()).with_attributes(attrs));
    let session = Arc::new(SessionStore::rehydrate(cookies));
    let server_cookies = ServerCookies::load(cfg_dir.join(SERVER_COOKIE_FILE));
    tracing::debug!(api_root = %cfg.api_root(), authenticated = session.snapshot().is_authenticated(), "client ready");
    Ok(ApiClient::from_config(&cfg, session, server_cookies)?)
}

pub(crate) fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| "must be KEY=VALUE".to_string())?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

pub(crate) fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_val_splits_on_first_equals() {
        assert_eq!(
            parse_key_val("address=1=2 Main").unwrap(),
            ("address".to_string(), "1=2 Main".to_string())
        );
        assert!(parse_key_val("nope").is_err());
    }

    #[test]
    fn cli_parses_station_update() {
        let cli = Cli::try_parse_from([
            "sparkpoint",
            "--json",
            "stations",
            "update",
            "st-1",
            "--set",
            "city=Kandy",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Stations { .. }));
    }

    #[test]
    fn session_cookies_carry_configured_lifetime() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "cookie_max_age_secs = 3600\n").unwrap();

        let client = open_client(dir.path()).unwrap();
        client.session().login_start().unwrap();
        client
            .session()
            .login_success(sparkpoint_api::User::new("u1", Some(1)))
            .unwrap();

        let saved = fs::read_to_string(dir.path().join(COOKIE_FILE)).unwrap();
        assert!(saved.contains("expires_at"));
        assert!(open_client(dir.path()).unwrap().session().snapshot().is_authenticated());
    }

    #[test]
    fn open_client_starts_signed_out_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let client = open_client(dir.path()).unwrap();
        assert!(!client.session().snapshot().is_authenticated());
        assert_eq!(client.bearer(), None);
    }
}
