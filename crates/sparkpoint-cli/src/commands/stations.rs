use clap::Subcommand;
use sparkpoint_client::{ApiClient, ClientError};
use sparkpoint_core::FormValues;

use crate::{parse_key_val, pout};

#[derive(Debug, Subcommand)]
pub enum StationCommands {
    List,
    Get { id: String },
    /// Create a station from `--set field=value` pairs
    Create {
        #[arg(long = "set", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
    },
    /// Replace a station; every field must be supplied again
    Update {
        id: String,
        #[arg(long = "set", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
    },
    Activate { id: String },
    Deactivate { id: String },
}

pub async fn run(client: &ApiClient, command: StationCommands, json: bool) -> anyhow::Result<()> {
    let stations = client.stations();
    let (value, text) = match command {
        StationCommands::List => (stations.list().await?, None),
        StationCommands::Get { id } => (stations.get(&id).await?, None),
        StationCommands::Create { fields } => {
            let values: FormValues = fields.into_iter().collect();
            (with_field_errors(stations.create(&values).await, json)?, Some("Station created"))
        }
        StationCommands::Update { id, fields } => {
            let values: FormValues = fields.into_iter().collect();
            (with_field_errors(stations.update(&id, &values).await, json)?, Some("Station updated"))
        }
        StationCommands::Activate { id } => (stations.set_active(&id, true).await?, Some("Station activated")),
        StationCommands::Deactivate { id } => (stations.set_active(&id, false).await?, Some("Station deactivated")),
    };

    let text = match text {
        Some(t) => t.to_string(),
        None => serde_json::to_string_pretty(&value)?,
    };
    pout(json, value, &text)
}

/// Field errors go to stdout (so `--json` callers can read them) before failing.
fn with_field_errors(result: sparkpoint_client::Result<serde_json::Value>, json: bool) -> anyhow::Result<serde_json::Value> {
    match result {
        Err(ClientError::Validation(errors)) => {
            pout(json, serde_json::json!({"errors": errors}), &errors.to_string())?;
            anyhow::bail!("{} field(s) invalid", errors.len())
        }
        other => Ok(other?),
    }
}
