//! eppd command-line interface.
//!
//! One binary plays three roles: the supervisor (`eppd serve`), a registry
//! worker (`eppd worker`, spawned by the supervisor) and a front-end client
//! for the supervisor socket (`send`, `registries`, `ping`, `stop`).

pub mod cli;
pub mod commands;
pub mod error;
pub mod socket;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
pub use socket::SocketClient;
