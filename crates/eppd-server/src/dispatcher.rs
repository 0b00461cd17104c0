//! Per-registry command dispatch.
//!
//! A [`Dispatcher`] owns the session for one registry and the credentials it
//! logs in with. It applies the logged-in guard and assigns transaction ids.

use chrono::Utc;
use eppd_codec::CommandCodec;
use eppd_core::{Credentials, EppdConfig};
use rand::Rng;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{ServerResult, SessionError, SessionResult};
use crate::session::{CommandOutcome, Session};
use crate::transport::{TlsTransport, Transport};

/// Generates a client transaction id: `<COMMAND>-<unix millis>-<16 hex>`.
pub fn transaction_id(command: &str) -> String {
    format!(
        "{}-{}-{:016X}",
        command.to_uppercase(),
        Utc::now().timestamp_millis(),
        rand::rng().random::<u64>()
    )
}

/// Result of a dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Response(Value),
    /// The worker should exit; carries the logout reply if one was sent.
    Terminate(Option<Value>),
}

pub struct Dispatcher<T> {
    session: Session<T>,
    credentials: Credentials,
}

impl Dispatcher<TlsTransport> {
    /// Builds the TLS session for a configured registry.
    pub fn from_config(registry: &str, config: &EppdConfig) -> ServerResult<Self> {
        let registry_config = config.registry(registry)?;
        let credentials = registry_config.credentials()?;
        let transport = TlsTransport::new(registry_config)?;
        let session = Session::new(
            registry,
            transport,
            CommandCodec::new(registry_config)?,
            config.heartbeat,
        );
        info!(registry, address = %registry_config.address(), "Starting dispatcher");
        Ok(Self::new(session, credentials))
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(session: Session<T>, credentials: Credentials) -> Self {
        Self {
            session,
            credentials,
        }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Connects and logs in with the configured credentials.
    pub async fn start(&mut self) -> SessionResult<Value> {
        self.session.connect().await?;
        let tr_id = transaction_id("login");
        let response = self.session.login(&self.credentials, &tr_id).await?;
        if !self.session.is_logged_in() {
            error!(registry = %self.session.registry(), ?response, "Unable to log in");
        }
        Ok(response)
    }

    /// Runs a command on behalf of a caller.
    ///
    /// Without a session only `login` goes out. `logout` then terminates
    /// without traffic and anything else is a session state error. A `login`
    /// with a `null` payload uses the configured credentials.
    pub async fn command(&mut self, name: &str, payload: Value) -> SessionResult<DispatchOutcome> {
        if !self.session.is_logged_in() {
            if name == "logout" {
                warn!(registry = %self.session.registry(), "Logout without a session, terminating");
                return Ok(DispatchOutcome::Terminate(None));
            }
            if name != "login" {
                error!(
                    registry = %self.session.registry(),
                    command = name,
                    "Attempted command while not logged in"
                );
                return Err(SessionError::NotLoggedIn {
                    command: name.to_string(),
                });
            }
        }

        let payload = if name == "login" && payload.is_null() {
            CommandCodec::login_payload(&self.credentials)
        } else {
            payload
        };
        let tr_id = payload
            .get("transactionId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| transaction_id(name));

        Ok(match self.session.command(name, &payload, &tr_id).await? {
            CommandOutcome::Response(response) => DispatchOutcome::Response(response),
            CommandOutcome::Terminate(response) => DispatchOutcome::Terminate(Some(response)),
        })
    }

    /// Forwards a heartbeat tick to the session.
    pub async fn heartbeat(&mut self) -> SessionResult<bool> {
        self.session.heartbeat().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{StubTransport, reply};
    use eppd_core::{HeartbeatSettings, RegistryConfig};
    use serde_json::json;

    fn dispatcher(transport: StubTransport) -> Dispatcher<StubTransport> {
        let session = Session::from_config(
            "registry-test1",
            transport,
            &RegistryConfig::new("epp.example.net"),
            HeartbeatSettings::default(),
        )
        .unwrap();
        Dispatcher::new(session, Credentials::new("user1", "abc123"))
    }

    #[test]
    fn transaction_id_format() {
        let id = transaction_id("checkDomain");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CHECKDOMAIN");
        assert!(parts[1].parse::<i64>().unwrap() > 1_600_000_000_000);
        assert_eq!(parts[2].len(), 16);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(transaction_id("hello"), transaction_id("hello"));
    }

    #[tokio::test]
    async fn start_logs_in_with_generated_id() {
        let transport = StubTransport::new();
        transport.push(reply(1000, "x"));
        let mut dispatcher = dispatcher(transport.clone());

        dispatcher.start().await.unwrap();
        assert!(dispatcher.session().is_logged_in());
        assert!(transport.sent()[0].contains("<clTRID>LOGIN-"));
    }

    #[tokio::test]
    async fn commands_require_a_session() {
        let transport = StubTransport::new();
        let mut dispatcher = dispatcher(transport.clone());

        let err = dispatcher
            .command("infoDomain", json!({"name": "example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotLoggedIn { .. }));
        assert!(!dispatcher.session().is_logged_in());

        let outcome = dispatcher.command("logout", json!({"kill": true})).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Terminate(None));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn caller_transaction_id_is_used() {
        let transport = StubTransport::new();
        transport.push(reply(1000, "x"));
        transport.push(reply(1000, "CALLER-1"));
        let mut dispatcher = dispatcher(transport.clone());
        dispatcher.start().await.unwrap();

        let outcome = dispatcher
            .command(
                "checkDomain",
                json!({"name": "example.com", "transactionId": "CALLER-1"}),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Response(_)));
        assert!(transport.sent()[1].contains("<clTRID>CALLER-1</clTRID>"));
    }

    #[tokio::test]
    async fn null_login_uses_configured_credentials() {
        let transport = StubTransport::new();
        transport.push(reply(1000, "x"));
        let mut dispatcher = dispatcher(transport.clone());

        dispatcher.command("login", Value::Null).await.unwrap();
        assert!(dispatcher.session().is_logged_in());
        assert!(transport.sent()[0].contains("<clID>user1</clID>"));
    }

    #[tokio::test]
    async fn logout_with_kill_terminates_with_reply() {
        let transport = StubTransport::new();
        transport.push(reply(1000, "x"));
        transport.push(reply(1500, "y"));
        let mut dispatcher = dispatcher(transport);
        dispatcher.start().await.unwrap();

        match dispatcher.command("logout", json!({"kill": true})).await.unwrap() {
            DispatchOutcome::Terminate(Some(response)) => {
                assert_eq!(eppd_codec::result_code(&response), Some(1500));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
