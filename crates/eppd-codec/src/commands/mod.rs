//! Command names and verb builders.
//!
//! Each builder turns a normalized payload into the verb element that goes
//! inside `<command>` (`<create>`, `<transfer op="…">`, `<poll/>`, ...), with
//! children in the order the object schemas require.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::element::Element;
use crate::error::{CodecError, CodecResult};
use crate::namespaces::Namespaces;

mod contact;
mod domain;
mod host;
mod session;

/// Object family a command operates on. Drives synonym folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Session,
    Domain,
    Host,
    Contact,
}

/// Every command the codec can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Command {
    Hello,
    Login,
    Logout,
    Poll,
    CheckDomain,
    InfoDomain,
    CreateDomain,
    UpdateDomain,
    RenewDomain,
    TransferDomain,
    DeleteDomain,
    CheckHost,
    InfoHost,
    CreateHost,
    UpdateHost,
    DeleteHost,
    CheckContact,
    InfoContact,
    CreateContact,
    UpdateContact,
    TransferContact,
    DeleteContact,
}

impl Command {
    pub const ALL: [Command; 22] = [
        Self::Hello,
        Self::Login,
        Self::Logout,
        Self::Poll,
        Self::CheckDomain,
        Self::InfoDomain,
        Self::CreateDomain,
        Self::UpdateDomain,
        Self::RenewDomain,
        Self::TransferDomain,
        Self::DeleteDomain,
        Self::CheckHost,
        Self::InfoHost,
        Self::CreateHost,
        Self::UpdateHost,
        Self::DeleteHost,
        Self::CheckContact,
        Self::InfoContact,
        Self::CreateContact,
        Self::UpdateContact,
        Self::TransferContact,
        Self::DeleteContact,
    ];

    /// The name callers use, e.g. `createDomain`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Poll => "poll",
            Self::CheckDomain => "checkDomain",
            Self::InfoDomain => "infoDomain",
            Self::CreateDomain => "createDomain",
            Self::UpdateDomain => "updateDomain",
            Self::RenewDomain => "renewDomain",
            Self::TransferDomain => "transferDomain",
            Self::DeleteDomain => "deleteDomain",
            Self::CheckHost => "checkHost",
            Self::InfoHost => "infoHost",
            Self::CreateHost => "createHost",
            Self::UpdateHost => "updateHost",
            Self::DeleteHost => "deleteHost",
            Self::CheckContact => "checkContact",
            Self::InfoContact => "infoContact",
            Self::CreateContact => "createContact",
            Self::UpdateContact => "updateContact",
            Self::TransferContact => "transferContact",
            Self::DeleteContact => "deleteContact",
        }
    }

    pub fn kind(self) -> ObjectKind {
        match self {
            Self::Hello | Self::Login | Self::Logout | Self::Poll => ObjectKind::Session,
            Self::CheckDomain
            | Self::InfoDomain
            | Self::CreateDomain
            | Self::UpdateDomain
            | Self::RenewDomain
            | Self::TransferDomain
            | Self::DeleteDomain => ObjectKind::Domain,
            Self::CheckHost
            | Self::InfoHost
            | Self::CreateHost
            | Self::UpdateHost
            | Self::DeleteHost => ObjectKind::Host,
            Self::CheckContact
            | Self::InfoContact
            | Self::CreateContact
            | Self::UpdateContact
            | Self::TransferContact
            | Self::DeleteContact => ObjectKind::Contact,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|command| command.name() == s)
            .ok_or_else(|| CodecError::UnknownCommand(s.to_string()))
    }
}

/// Registry settings a builder may need.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub command: Command,
    pub namespaces: &'a Namespaces,
    /// Namespace keys announced as `objURI` at login.
    pub services: &'a [String],
    /// Namespace keys announced as `extURI` at login.
    pub extensions: &'a [String],
}

impl BuildContext<'_> {
    /// Returns the namespace URI for `key`.
    pub fn xmlns(&self, key: &str) -> CodecResult<&str> {
        self.namespaces.xmlns(key)
    }

    /// Creates `<prefix:element xmlns:prefix="…">` for an object namespace.
    pub(crate) fn object_root(&self, prefix: &str, element: &str) -> CodecResult<Element> {
        let (key, value) = self.namespaces.declaration(prefix, prefix)?;
        Ok(Element::new(format!("{}:{}", prefix, element)).attr(key, value))
    }
}

/// Builds the verb element for every command but `hello`.
pub(crate) fn build_verb(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    match ctx.command {
        Command::Hello => Ok(Element::new("hello")),
        Command::Login => session::login(ctx, data),
        Command::Logout => Ok(Element::new("logout")),
        Command::Poll => session::poll(data),
        Command::CheckDomain => domain::check(ctx, data),
        Command::InfoDomain => domain::info(ctx, data),
        Command::CreateDomain => domain::create(ctx, data),
        Command::UpdateDomain => domain::update(ctx, data),
        Command::RenewDomain => domain::renew(ctx, data),
        Command::TransferDomain => domain::transfer(ctx, data),
        Command::DeleteDomain => domain::delete(ctx, data),
        Command::CheckHost => host::check(ctx, data),
        Command::InfoHost => host::info(ctx, data),
        Command::CreateHost => host::create(ctx, data),
        Command::UpdateHost => host::update(ctx, data),
        Command::DeleteHost => host::delete(ctx, data),
        Command::CheckContact => contact::check(ctx, data),
        Command::InfoContact => contact::info(ctx, data),
        Command::CreateContact => contact::create(ctx, data),
        Command::UpdateContact => contact::update(ctx, data),
        Command::TransferContact => contact::transfer(ctx, data),
        Command::DeleteContact => contact::delete(ctx, data),
    }
}

const TRANSFER_OPS: [&str; 5] = ["approve", "cancel", "query", "reject", "request"];

/// Validates a transfer `op`, defaulting to `request`.
pub(crate) fn transfer_op(data: &Map<String, Value>, object: &str) -> CodecResult<String> {
    let Some(op) = crate::fields::scalar(data, "op")?.filter(|op| !op.is_empty()) else {
        return Ok("request".to_string());
    };
    if TRANSFER_OPS.contains(&op.as_str()) {
        Ok(op)
    } else {
        Err(CodecError::validation(format!(
            "Transfer {} op must be one of the following: [{}].",
            object,
            TRANSFER_OPS.join(", ")
        )))
    }
}

/// Renders one or many identifiers (`check` accepts a list).
pub(crate) fn identifiers(
    data: &Map<String, Value>,
    field: &str,
    element: &str,
    what: &str,
) -> CodecResult<Vec<Element>> {
    use crate::fields::{OneOrMany, Scalar, parse};

    let value = data
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| CodecError::validation(format!("{} is required", what)))?;
    let names = parse::<OneOrMany<Scalar>>(value, field)?.into_vec();
    if names.is_empty() {
        return Err(CodecError::validation(format!("{} is required", what)));
    }
    Ok(names
        .into_iter()
        .map(|name| Element::text(element, name.to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_round_trip() {
        for command in Command::ALL {
            assert_eq!(command.name().parse::<Command>().unwrap(), command);
        }
    }

    #[test]
    fn unknown_command() {
        let err = "frobDomain".parse::<Command>().unwrap_err();
        assert_eq!(err, CodecError::UnknownCommand("frobDomain".to_string()));
        assert_eq!(err.kind(), "unknown_command");
    }

    #[test]
    fn transfer_op_validation() {
        let data = |op: &str| {
            let mut map = Map::new();
            map.insert("op".to_string(), Value::String(op.to_string()));
            map
        };

        assert_eq!(transfer_op(&Map::new(), "domain").unwrap(), "request");
        assert_eq!(transfer_op(&data("reject"), "domain").unwrap(), "reject");
        assert_eq!(
            transfer_op(&data("yipee"), "domain").unwrap_err().to_string(),
            "Transfer domain op must be one of the following: [approve, cancel, query, reject, request]."
        );
        assert_eq!(
            transfer_op(&data("yipee"), "contact").unwrap_err().to_string(),
            "Transfer contact op must be one of the following: [approve, cancel, query, reject, request]."
        );
    }
}
