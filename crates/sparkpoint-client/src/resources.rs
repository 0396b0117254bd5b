//! Station and EV-owner endpoints. Bodies are opaque JSON; these calls
//! inherit the client's refresh-on-401 behavior like any other.

use serde_json::Value;
use sparkpoint_core::{FormSchema, FormValues};

use crate::ApiClient;
use crate::error::{ClientError, Result};

fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

#[derive(Debug, Clone, Copy)]
pub struct Stations<'a> {
    client: &'a ApiClient,
}

impl<'a> Stations<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Value> {
        self.client.get("/stations").await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        self.client.get(&format!("/stations/{}", segment(id))).await
    }

    /// Validate the form and create the station. Invalid forms are never sent.
    pub async fn create(&self, values: &FormValues) -> Result<Value> {
        let body = station_body(values)?;
        tracing::debug!("creating station");
        self.client.post("/stations", body).await
    }

    /// Validate the form and replace the station `id`.
    pub async fn update(&self, id: &str, values: &FormValues) -> Result<Value> {
        let body = station_body(values)?;
        tracing::debug!(station_id = id, "updating station");
        self.client
            .put(&format!("/stations/{}", segment(id)), Some(body))
            .await
    }

    pub async fn set_active(&self, id: &str, active: bool) -> Result<Value> {
        let action = if active { "activate" } else { "deactivate" };
        tracing::debug!(station_id = id, action, "toggling station status");
        self.client
            .put(&format!("/stations/{action}/{}", segment(id)), None)
            .await
    }
}

fn station_body(values: &FormValues) -> Result<Value> {
    FormSchema::station()
        .to_payload(values)
        .map_err(ClientError::Validation)
}

/// EV owners are keyed by NIC.
#[derive(Debug, Clone, Copy)]
pub struct Owners<'a> {
    client: &'a ApiClient,
}

impl<'a> Owners<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Value> {
        self.client.get("/evowners/all").await
    }

    pub async fn deactivated(&self) -> Result<Value> {
        self.client.get("/evowners/deactivated").await
    }

    pub async fn create(&self, owner: Value) -> Result<Value> {
        self.client.post("/evowners/admin/create", owner).await
    }

    pub async fn update(&self, nic: &str, owner: Value) -> Result<Value> {
        self.client
            .put(&format!("/evowners/admin/update/{}", segment(nic)), Some(owner))
            .await
    }

    pub async fn deactivate(&self, nic: &str) -> Result<Value> {
        self.client
            .put(&format!("/evowners/admin/deactivate/{}", segment(nic)), None)
            .await
    }

    pub async fn reactivate(&self, nic: &str) -> Result<Value> {
        self.client
            .put(&format!("/evowners/reactivate/{}", segment(nic)), None)
            .await
    }

    pub async fn delete(&self, nic: &str) -> Result<Value> {
        self.client
            .delete(&format!("/evowners/delete/{}", segment(nic)))
            .await
    }
}
