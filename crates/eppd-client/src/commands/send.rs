//! Front-end commands sent to a running supervisor.

use std::io::Read;

use serde_json::Value;

use eppd_protocol::{Request, Response, WorkerReply};

use crate::error::{ClientError, ClientResult};
use crate::socket::SocketClient;

/// Parses the payload argument: absent means `null`, `-` reads stdin.
pub fn parse_data(data: Option<&str>) -> ClientResult<Value> {
    let text = match data {
        None => return Ok(Value::Null),
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(text) => text.to_string(),
    };
    serde_json::from_str(&text)
        .map_err(|e| ClientError::InvalidInput(format!("payload is not valid JSON: {}", e)))
}

/// Sends one EPP command and prints the decoded registry response.
pub async fn command(client: &SocketClient, registry: &str, command: &str, data: Value) -> ClientResult<()> {
    let response = client
        .send(Request::command(registry, command, data))
        .await?;
    let reply = reply_value(response)?;
    println!("{}", pretty(&reply)?);
    Ok(())
}

pub async fn registries(client: &SocketClient) -> ClientResult<()> {
    match client.send(Request::Registries).await? {
        Response::Registries { names } => {
            for name in names {
                println!("{}", name);
            }
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

pub async fn ping(client: &SocketClient) -> ClientResult<()> {
    match client.send(Request::Ping).await? {
        Response::Pong => {
            println!("pong");
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

pub async fn stop(client: &SocketClient) -> ClientResult<()> {
    match client.send(Request::Shutdown).await? {
        Response::ShuttingDown => {
            println!("Supervisor is shutting down.");
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

/// Extracts the registry response from a supervisor reply.
///
/// Routing and worker errors become [`ClientError::Command`].
pub fn reply_value(response: Response) -> ClientResult<Value> {
    match response {
        Response::Reply {
            reply: WorkerReply::Ok { response },
        } => Ok(response),
        Response::Reply {
            reply: WorkerReply::Terminated { response },
        } => Ok(response.unwrap_or(Value::Null)),
        Response::Reply {
            reply: WorkerReply::Error { error },
        }
        | Response::Error { error } => Err(ClientError::Command(error.to_string())),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> ClientError {
    ClientError::Protocol(format!("unexpected response: {:?}", response))
}

fn pretty(value: &Value) -> ClientResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ClientError::Protocol(format!("failed to format response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_parsing() {
        assert_eq!(parse_data(None).unwrap(), Value::Null);
        assert_eq!(
            parse_data(Some(r#"{"name": ["a.com", "b.com"]}"#)).unwrap(),
            json!({"name": ["a.com", "b.com"]})
        );
        assert!(matches!(
            parse_data(Some("{not json")),
            Err(ClientError::InvalidInput(_))
        ));
    }

    #[test]
    fn reply_errors_fail_the_command() {
        let ok = Response::Reply {
            reply: WorkerReply::Ok {
                response: json!({"result": {"code": "1000"}}),
            },
        };
        assert_eq!(reply_value(ok).unwrap()["result"]["code"], "1000");

        let refused = Response::Reply {
            reply: WorkerReply::error("validation", "pw is required!"),
        };
        match reply_value(refused) {
            Err(ClientError::Command(msg)) => assert_eq!(msg, "validation: pw is required!"),
            other => panic!("unexpected result: {:?}", other),
        }

        let unknown = Response::error("unknown_registry", "Unknown registry `nope`");
        assert!(matches!(reply_value(unknown), Err(ClientError::Command(_))));
        assert!(matches!(reply_value(Response::Pong), Err(ClientError::Protocol(_))));
    }
}
