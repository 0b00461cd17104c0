//! Registry session state machine.
//!
//! ```text
//! offline --connect--> idle --command--> command --reply--> idle
//!                                                  \--logout--> offline
//! ```
//!
//! The session never runs its own timers. The owner calls
//! [`Session::heartbeat`] on every tick of its event loop, which keeps the
//! keepalive `hello` from ever interleaving with a command exchange.

use eppd_codec::fields::truthy;
use eppd_codec::{CommandCodec, decode, result_code};
use eppd_core::{Credentials, HeartbeatSettings, RegistryConfig};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::SessionResult;
use crate::transport::{Connected, Transport};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection, or logged out.
    Offline,
    /// Connected and waiting; the heartbeat is armed.
    Idle,
    /// An exchange is in progress.
    Command,
}

/// What a completed command asks of the owner.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Response(Value),
    /// `logout` with `kill` set: the owner should stop after replying.
    Terminate(Value),
}

impl CommandOutcome {
    pub fn response(&self) -> &Value {
        match self {
            Self::Response(value) | Self::Terminate(value) => value,
        }
    }
}

/// One registry session over a transport.
pub struct Session<T> {
    registry: String,
    transport: T,
    codec: CommandCodec,
    state: SessionState,
    logged_in: bool,
    last_exchange: Option<Instant>,
    heartbeat: HeartbeatSettings,
}

impl<T: Transport> Session<T> {
    pub fn new(
        registry: impl Into<String>,
        transport: T,
        codec: CommandCodec,
        heartbeat: HeartbeatSettings,
    ) -> Self {
        Self {
            registry: registry.into(),
            transport,
            codec,
            state: SessionState::Offline,
            logged_in: false,
            last_exchange: None,
            heartbeat,
        }
    }

    /// Builds the codec from the registry configuration.
    pub fn from_config(
        registry: impl Into<String>,
        transport: T,
        config: &RegistryConfig,
        heartbeat: HeartbeatSettings,
    ) -> SessionResult<Self> {
        Ok(Self::new(
            registry,
            transport,
            CommandCodec::new(config)?,
            heartbeat,
        ))
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn heartbeat_settings(&self) -> HeartbeatSettings {
        self.heartbeat
    }

    /// Connects the transport and decodes the greeting.
    ///
    /// Returns `None` when the connection was already open.
    pub async fn connect(&mut self) -> SessionResult<Option<Value>> {
        match self.transport.connect().await? {
            Connected::Established { greeting } => {
                self.state = SessionState::Idle;
                let greeting = decode(&greeting)?;
                debug!(registry = %self.registry, ?greeting, "Received greeting");
                Ok(Some(greeting))
            }
            Connected::AlreadyConnected => Ok(None),
        }
    }

    /// Logs in; `logged_in` follows the result code.
    pub async fn login(&mut self, credentials: &Credentials, tr_id: &str) -> SessionResult<Value> {
        let payload = CommandCodec::login_payload(credentials);
        let outcome = self.command("login", &payload, tr_id).await?;
        Ok(outcome.response().clone())
    }

    /// Runs one command.
    ///
    /// Codec and decode failures leave the session usable. A `login` reply
    /// sets `logged_in` from its result code; any `logout` reply clears it.
    #[tracing::instrument(skip(self, payload), fields(registry = %self.registry))]
    pub async fn command(
        &mut self,
        name: &str,
        payload: &Value,
        tr_id: &str,
    ) -> SessionResult<CommandOutcome> {
        self.state = SessionState::Command;

        let xml = match self.codec.render(name, payload, tr_id) {
            Ok(xml) => xml,
            Err(e) => {
                self.rearm();
                return Err(e.into());
            }
        };

        if !self.transport.is_connected()
            && let Err(e) = self.connect().await
        {
            self.rearm();
            return Err(e);
        }

        debug!(xml = %xml, "Sending command");
        let started = Instant::now();
        let bytes = match self.transport.send(xml.as_bytes()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.rearm();
                return Err(e.into());
            }
        };
        self.last_exchange = Some(Instant::now());
        debug!(
            xml = %String::from_utf8_lossy(&bytes),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Received response"
        );

        let response = match decode(&bytes) {
            Ok(response) => response,
            Err(e) => {
                self.rearm();
                return Err(e.into());
            }
        };
        let code = result_code(&response);

        match name {
            "login" => {
                self.logged_in = code.is_some_and(|c| c < 2000);
                if self.logged_in {
                    info!(code, "Logged in");
                } else {
                    warn!(code, "Login rejected");
                }
                self.rearm();
                Ok(CommandOutcome::Response(response))
            }
            "logout" => {
                self.logged_in = false;
                self.state = SessionState::Offline;
                info!(code, "Logged out");
                if payload.get("kill").is_some_and(truthy) {
                    Ok(CommandOutcome::Terminate(response))
                } else {
                    Ok(CommandOutcome::Response(response))
                }
            }
            _ => {
                self.rearm();
                Ok(CommandOutcome::Response(response))
            }
        }
    }

    /// Sends a keepalive `hello` when the idle session is due for one.
    ///
    /// Returns whether a `hello` was sent.
    pub async fn heartbeat(&mut self) -> SessionResult<bool> {
        if self.state != SessionState::Idle || !self.heartbeat_due() {
            return Ok(false);
        }
        if !self.logged_in {
            warn!(registry = %self.registry, "Idle session is not logged in, skipping keepalive");
            return Ok(false);
        }
        debug!(registry = %self.registry, "Sending keepalive");
        self.command("hello", &Value::Null, "").await?;
        Ok(true)
    }

    fn heartbeat_due(&self) -> bool {
        self.last_exchange
            .is_none_or(|at| at.elapsed() > self.heartbeat.idle_threshold())
    }

    fn rearm(&mut self) {
        self.state = if self.transport.is_connected() {
            SessionState::Idle
        } else {
            SessionState::Offline
        };
    }
}
