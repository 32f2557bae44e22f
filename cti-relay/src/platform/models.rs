//! Wire types for the platform's GraphQL API.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::PushDestination;
use crate::broker::amqp::AmqpParams;
use crate::domain::Checkpoint;
use crate::{Error, Result};

/// Request body sent to `/graphql`.
#[derive(Debug, Serialize)]
pub(crate) struct GraphqlRequest<'a> {
    pub query: &'a str,
    pub variables: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

impl GraphqlResponse {
    /// Extract `data.<field>` as `T`, surfacing GraphQL errors first.
    pub(crate) fn field<T: DeserializeOwned>(self, operation: &str, field: &str) -> Result<T> {
        if !self.errors.is_empty() {
            let message = self
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::platform(operation, message));
        }

        let value = self
            .data
            .and_then(|mut data| data.get_mut(field).map(Value::take))
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::platform(operation, format!("response has no '{field}' field")))?;

        serde_json::from_value(value)
            .map_err(|e| Error::platform(operation, format!("malformed '{field}': {e}")))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisteredConnector {
    pub id: String,
    #[serde(default)]
    pub connector_state: Option<String>,
    pub config: RegisteredConfig,
    pub connector_user_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisteredConfig {
    pub connection: AmqpParams,
    #[serde(alias = "push_routing")]
    pub push: String,
    pub push_exchange: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedWork {
    pub id: String,
}

/// What the platform hands back when the connector registers.
#[derive(Debug, Clone)]
pub struct ConnectorConfiguration {
    pub connector_id: String,
    /// Checkpoint stored on the platform at registration time.
    pub state: Checkpoint,
    pub broker: AmqpParams,
    pub push: PushDestination,
    /// Platform user id stamped on every envelope.
    pub applicant_id: String,
}

impl TryFrom<RegisteredConnector> for ConnectorConfiguration {
    type Error = Error;

    fn try_from(registered: RegisteredConnector) -> Result<Self> {
        let state = match registered.connector_state.as_deref() {
            Some(raw) => Checkpoint::from_json(raw)
                .map_err(|e| Error::platform("registerConnector", format!("connector_state: {e}")))?,
            None => Checkpoint::default(),
        };

        Ok(Self {
            connector_id: registered.id,
            state,
            broker: registered.config.connection,
            push: PushDestination {
                exchange: registered.config.push_exchange,
                routing_key: registered.config.push,
            },
            applicant_id: registered.connector_user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(body: Value) -> GraphqlResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_registration_payload() {
        let body = json!({
            "data": {
                "registerConnector": {
                    "id": "c-1",
                    "connector_state": "{\"last_run\": 1714521600}",
                    "connector_user_id": "user-7",
                    "config": {
                        "connection": {
                            "host": "rabbitmq",
                            "vhost": "/",
                            "use_ssl": false,
                            "port": 5672,
                            "user": "opencti",
                            "pass": "secret"
                        },
                        "push": "push_routing_c-1",
                        "push_exchange": "amqp.worker.exchange"
                    }
                }
            }
        });

        let registered: RegisteredConnector = response(body)
            .field("registerConnector", "registerConnector")
            .unwrap();
        let config = ConnectorConfiguration::try_from(registered).unwrap();

        assert_eq!(config.connector_id, "c-1");
        assert_eq!(config.applicant_id, "user-7");
        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.push.exchange, "amqp.worker.exchange");
        assert_eq!(config.push.routing_key, "push_routing_c-1");
        assert_eq!(config.state.get("last_run"), Some(&json!(1714521600)));
    }

    #[test]
    fn test_null_state_is_empty() {
        let registered = RegisteredConnector {
            id: "c-1".into(),
            connector_state: None,
            connector_user_id: "u".into(),
            config: RegisteredConfig {
                connection: AmqpParams {
                    host: "h".into(),
                    port: 5672,
                    vhost: "/".into(),
                    user: "u".into(),
                    pass: "p".into(),
                    use_ssl: false,
                },
                push: "r".into(),
                push_exchange: "x".into(),
            },
        };
        let config = ConnectorConfiguration::try_from(registered).unwrap();
        assert!(config.state.is_empty());
    }

    #[test]
    fn test_graphql_errors_surface() {
        let body = json!({
            "data": null,
            "errors": [{ "message": "Forbidden" }, { "message": "Try again" }]
        });
        let err = response(body)
            .field::<CreatedWork>("workAdd", "workAdd")
            .unwrap_err();
        match err {
            Error::Platform { operation, message } => {
                assert_eq!(operation, "workAdd");
                assert_eq!(message, "Forbidden; Try again");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_field() {
        let err = response(json!({ "data": { "other": {} } }))
            .field::<CreatedWork>("workAdd", "workAdd")
            .unwrap_err();
        assert!(err.to_string().contains("no 'workAdd' field"));
    }
}
