use anyhow::bail;
use clap::Subcommand;
use sparkpoint_api::AdminRegistration;
use sparkpoint_client::{ApiClient, ClientError};

use crate::pout;

#[derive(Debug, Subcommand)]
pub enum AdminCommands {
    /// Register another administrator (requires an admin session)
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, env = "SPARKPOINT_NEW_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

pub async fn login(client: &ApiClient, identifier: &str, password: &str, json: bool) -> anyhow::Result<()> {
    let payload = match client.login(identifier, password).await {
        Ok(payload) => payload,
        Err(e) => bail!("{}", login_error(&e)),
    };

    let session = client.session().snapshot();
    if !session.is_authenticated() {
        bail!("{}", session.error().unwrap_or(sparkpoint_client::LOGIN_FAILED));
    }

    let user_id = payload.user.as_ref().map(|u| u.id.clone()).unwrap_or_default();
    pout(
        json,
        serde_json::json!({"ok": true, "user": payload.user, "admin": session.is_admin()}),
        &format!("Signed in as {user_id}"),
    )
}

fn login_error(err: &ClientError) -> String {
    match err {
        ClientError::Session(sparkpoint_auth::Error::InvalidTransition { .. }) => {
            "Already signed in; run `sparkpoint logout` first".to_string()
        }
        other => other.best_message(),
    }
}

pub async fn logout(client: &ApiClient, json: bool) -> anyhow::Result<()> {
    let report = client.logout().await;
    if let Some(err) = &report.remote_error {
        eprintln!("warning: server logout not confirmed: {err}");
    }
    pout(json, serde_json::to_value(&report)?, "Signed out")
}

pub fn whoami(client: &ApiClient, json: bool) -> anyhow::Result<()> {
    let session = client.session().snapshot();
    let text = match session.user() {
        Some(user) if session.is_authenticated() => {
            let role = if session.is_admin() { "administrator" } else { "user" };
            format!("Signed in as {} ({role})", user.id)
        }
        _ => "Not signed in".to_string(),
    };
    pout(json, serde_json::to_value(&session)?, &text)
}

pub async fn profile(client: &ApiClient, json: bool) -> anyhow::Result<()> {
    let profile = client.users().profile().await?;
    let text = serde_json::to_string_pretty(&profile)?;
    pout(json, profile, &text)
}

pub async fn admin(client: &ApiClient, command: AdminCommands, json: bool) -> anyhow::Result<()> {
    match command {
        AdminCommands::Register {
            username,
            email,
            first_name,
            last_name,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => rpassword::prompt_password(format!("Password for new admin {username}: "))?,
            };
            if password.is_empty() {
                bail!("Password cannot be empty");
            }
            let registration = AdminRegistration {
                username,
                email,
                first_name,
                last_name,
                password,
            };
            let created = client.users().register_admin(&registration).await?;
            pout(json, created, &format!("Administrator {} registered", registration.username))
        }
    }
}
