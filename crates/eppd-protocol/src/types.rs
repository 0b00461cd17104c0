//! Messages exchanged between front-end clients, the supervisor and workers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PROTOCOL_VERSION;

/// Front-end message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub protocol_version: String,
    /// Correlates a response with its request.
    pub request_id: String,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Requests accepted on the supervisor socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Run an EPP command on a registry's worker.
    Command {
        registry: String,
        command: String,
        #[serde(default)]
        data: Value,
    },

    /// List the registries the supervisor serves.
    Registries,

    /// Log every worker out and stop the supervisor.
    Shutdown,

    Ping,
}

impl Request {
    pub fn command(registry: impl Into<String>, command: impl Into<String>, data: Value) -> Self {
        Self::Command {
            registry: registry.into(),
            command: command.into(),
            data,
        }
    }
}

/// Responses written on the supervisor socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// A worker's reply to a command.
    Reply { reply: WorkerReply },

    Registries { names: Vec<String> },

    /// The request could not be routed to a worker.
    Error { error: ErrorPayload },

    ShuttingDown,

    Pong,
}

impl Response {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorPayload::new(kind, message),
        }
    }
}

/// Structured error carried in replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable machine-readable identifier, e.g. `validation`.
    pub kind: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Messages read by a worker on stdin.
///
/// The first message names the registry; every later one is a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerRequest {
    Command {
        command: String,
        #[serde(default)]
        data: Value,
    },
    Init {
        registry: String,
    },
}

impl WorkerRequest {
    pub fn init(registry: impl Into<String>) -> Self {
        Self::Init {
            registry: registry.into(),
        }
    }

    pub fn command(command: impl Into<String>, data: Value) -> Self {
        Self::Command {
            command: command.into(),
            data,
        }
    }
}

/// One reply per worker request, written on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    /// The decoded registry response.
    Ok { response: Value },

    Error { error: ErrorPayload },

    /// The session logged out with `kill` set; the worker exits after this.
    Terminated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },
}

impl WorkerReply {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorPayload::new(kind, message),
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn worker_request_shapes() {
        let init: WorkerRequest = serde_json::from_value(json!({"registry": "r1"})).unwrap();
        assert_eq!(init, WorkerRequest::init("r1"));

        let command: WorkerRequest =
            serde_json::from_value(json!({"command": "hello", "data": null})).unwrap();
        assert_eq!(command, WorkerRequest::command("hello", Value::Null));

        let without_data: WorkerRequest =
            serde_json::from_value(json!({"command": "hello"})).unwrap();
        assert_eq!(without_data, WorkerRequest::command("hello", Value::Null));
    }

    #[test]
    fn worker_reply_serialization() {
        insta::assert_json_snapshot!(
            WorkerReply::Ok { response: json!({"result": {"code": 1000}}) },
            @r#"
        {
          "status": "ok",
          "response": {
            "result": {
              "code": 1000
            }
          }
        }
        "#
        );
        insta::assert_json_snapshot!(
            WorkerReply::error("validation", "pw is required!"),
            @r#"
        {
          "status": "error",
          "error": {
            "kind": "validation",
            "message": "pw is required!"
          }
        }
        "#
        );
        insta::assert_json_snapshot!(
            WorkerReply::Terminated { response: None },
            @r#"
        {
          "status": "terminated"
        }
        "#
        );
    }

    #[test]
    fn request_round_trip_through_envelope() {
        let envelope = Envelope::new(
            "req-1",
            Request::command("registry-test1", "checkDomain", json!({"name": "example.com"})),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["payload"]["type"], "command");
        assert_eq!(json["payload"]["registry"], "registry-test1");

        let decoded: Envelope<Request> = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, envelope);
        assert!(decoded.is_compatible());
    }

    #[test]
    fn response_wraps_worker_reply() {
        let response = Response::Reply {
            reply: WorkerReply::Terminated {
                response: Some(json!({"result": {"code": 1500}})),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "reply");
        assert_eq!(json["reply"]["status"], "terminated");

        let decoded: Response = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, response);
    }
}
