use anyhow::Context;
use mongodb::{
    bson::doc,
    options::{Acknowledgment, ClientOptions, Credential, WriteConcern},
    Client, Database,
};
use tracing::info;

use crate::config::MongoConfig;

/// Full connection string for a configured URI; bare hosts are treated as SRV records.
pub fn connection_uri(raw: &str) -> String {
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("mongodb+srv://{raw}")
    }
}

/// Connects to MongoDB, verifies the connection with a ping and returns the
/// configured database.
pub async fn connect(cfg: &MongoConfig) -> anyhow::Result<Database> {
    let uri = connection_uri(&cfg.uri);
    let mut options = ClientOptions::parse(&uri)
        .await
        .context("parse mongodb uri")?;

    if !cfg.username.is_empty() || !cfg.password.is_empty() {
        let mut credential = Credential::default();
        credential.username = Some(cfg.username.clone());
        credential.password = Some(cfg.password.clone());
        options.credential = Some(credential);

        let mut write_concern = WriteConcern::default();
        write_concern.w = Some(Acknowledgment::Majority);
        options.write_concern = Some(write_concern);
        options.retry_writes = Some(true);
    }
    options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
    options.connect_timeout = Some(cfg.timeout);
    options.server_selection_timeout = Some(cfg.timeout);

    info!(hosts = ?options.hosts, "connecting to mongodb");
    let client = Client::with_options(options).context("build mongodb client")?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await
        .context("ping mongodb")?;
    info!(database = %cfg.database, "connected to mongodb");

    Ok(client.database(&cfg.database))
}
