use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};
use url::Url;

use super::models::{
    ConnectorConfiguration, CreatedWork, GraphqlRequest, GraphqlResponse, RegisteredConnector,
};
use crate::config::PlatformSettings;
use crate::domain::{Checkpoint, ConnectorIdentity};
use crate::work::{WorkOutcome, WorkTracker};
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const REGISTER_CONNECTOR: &str = r#"
mutation RegisterConnector($input: RegisterConnectorInput) {
  registerConnector(input: $input) {
    id
    connector_state
    config {
      connection { host vhost use_ssl port user pass }
      push
      push_exchange
    }
    connector_user_id
  }
}
"#;

const PING_CONNECTOR: &str = r#"
mutation PingConnector($id: ID!, $state: String) {
  pingConnector(id: $id, state: $state) { id }
}
"#;

const WORK_ADD: &str = r#"
mutation WorkAdd($connectorId: String!, $friendlyName: String) {
  workAdd(connectorId: $connectorId, friendlyName: $friendlyName) { id }
}
"#;

const WORK_EXPECTATIONS: &str = r#"
mutation AddExpectations($id: ID!, $expectations: Int) {
  workEdit(id: $id) { addExpectations(expectations: $expectations) }
}
"#;

const WORK_TO_PROCESSED: &str = r#"
mutation WorkToProcessed($id: ID!, $message: String, $inError: Boolean) {
  workEdit(id: $id) { toProcessed(message: $message, inError: $inError) }
}
"#;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Client for the platform's GraphQL endpoint.
///
/// Handles registration, state pings and work tracking.
#[derive(Clone)]
pub struct PlatformClient {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl PlatformClient {
    pub fn new(settings: &PlatformSettings) -> Result<Self> {
        install_rustls_provider();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!settings.ssl_verify)
            .build()?;

        Ok(Self {
            client,
            endpoint: graphql_endpoint(&settings.url)?,
            token: settings.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&GraphqlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::platform(operation, format!("HTTP {status}: {body}")));
        }

        let body: GraphqlResponse = response.json().await?;
        body.field(operation, operation)
    }

    /// Register this connector and fetch its broker configuration and stored state.
    #[instrument(skip(self), fields(connector_id = %identity.id))]
    pub async fn register(&self, identity: &ConnectorIdentity) -> Result<ConnectorConfiguration> {
        let registered: RegisteredConnector = self
            .execute(
                "registerConnector",
                REGISTER_CONNECTOR,
                registration_variables(identity),
            )
            .await?;
        let configuration = ConnectorConfiguration::try_from(registered)?;
        info!(
            "Registered the connector on the platform ({})",
            configuration.connector_id
        );
        Ok(configuration)
    }

    /// Report liveness and persist the checkpoint on the platform.
    pub async fn ping(&self, connector_id: &str, state: &Checkpoint) -> Result<()> {
        let _: Value = self
            .execute(
                "pingConnector",
                PING_CONNECTOR,
                json!({ "id": connector_id, "state": state.to_json()? }),
            )
            .await?;
        debug!(connector_id, "Connector pinged");
        Ok(())
    }
}

#[async_trait]
impl WorkTracker for PlatformClient {
    async fn initiate(&self, connector_id: &str, work_name: &str) -> Result<String> {
        let work: CreatedWork = self
            .execute(
                "workAdd",
                WORK_ADD,
                json!({ "connectorId": connector_id, "friendlyName": work_name }),
            )
            .await?;
        Ok(work.id)
    }

    async fn declare_expectations(&self, work_id: &str, count: usize) -> Result<()> {
        let _: Value = self
            .execute(
                "workEdit",
                WORK_EXPECTATIONS,
                json!({ "id": work_id, "expectations": count }),
            )
            .await?;
        Ok(())
    }

    async fn finalize(&self, work_id: &str, outcome: WorkOutcome, message: &str) -> Result<()> {
        let _: Value = self
            .execute(
                "workEdit",
                WORK_TO_PROCESSED,
                json!({ "id": work_id, "message": message, "inError": outcome.is_error() }),
            )
            .await?;
        Ok(())
    }
}

fn graphql_endpoint(base: &str) -> Result<Url> {
    let base = Url::parse(base.trim_end_matches('/'))
        .map_err(|e| Error::config(format!("Invalid OPENCTI_URL '{base}': {e}")))?;
    let path = format!("{}/graphql", base.path().trim_end_matches('/'));
    let mut endpoint = base;
    endpoint.set_path(&path);
    Ok(endpoint)
}

fn registration_variables(identity: &ConnectorIdentity) -> Value {
    json!({
        "input": {
            "id": identity.id,
            "name": identity.name,
            "type": identity.connector_type.as_str(),
            "scope": identity.scope,
            "auto": false,
            "only_contextual": false,
            "playbook_compatible": false,
        }
    })
}
