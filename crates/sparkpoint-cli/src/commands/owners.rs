use anyhow::{Context, ensure};
use clap::Subcommand;
use serde_json::Value;
use sparkpoint_client::ApiClient;

use crate::pout;

#[derive(Debug, Subcommand)]
pub enum OwnerCommands {
    List,
    /// Owners whose accounts are deactivated
    Deactivated,
    /// Create an owner from a JSON object
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        nic: String,
        #[arg(long)]
        data: String,
    },
    Deactivate { nic: String },
    Reactivate { nic: String },
    Delete { nic: String },
}

fn parse_owner(data: &str) -> anyhow::Result<Value> {
    let value: Value = serde_json::from_str(data).context("--data must be valid JSON")?;
    ensure!(value.is_object(), "--data must be a JSON object");
    Ok(value)
}

pub async fn run(client: &ApiClient, command: OwnerCommands, json: bool) -> anyhow::Result<()> {
    let owners = client.owners();
    let (value, text) = match command {
        OwnerCommands::List => (owners.list().await?, None),
        OwnerCommands::Deactivated => (owners.deactivated().await?, None),
        OwnerCommands::Create { data } => (owners.create(parse_owner(&data)?).await?, Some("Owner created")),
        OwnerCommands::Update { nic, data } => (owners.update(&nic, parse_owner(&data)?).await?, Some("Owner updated")),
        OwnerCommands::Deactivate { nic } => (owners.deactivate(&nic).await?, Some("Owner deactivated")),
        OwnerCommands::Reactivate { nic } => (owners.reactivate(&nic).await?, Some("Owner reactivated")),
        OwnerCommands::Delete { nic } => (owners.delete(&nic).await?, Some("Owner deleted")),
    };

    let text = match text {
        Some(t) => t.to_string(),
        None => serde_json::to_string_pretty(&value)?,
    };
    pout(json, value, &text)
}
