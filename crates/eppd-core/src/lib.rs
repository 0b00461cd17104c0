//! Core types for eppd: configuration, credentials and tracing setup.
//!
//! Every other crate in the workspace depends on this one. It owns the
//! immutable configuration objects that are resolved before a session is
//! constructed:
//!
//! - [`EppdConfig`]: the whole `config.toml` file
//! - [`RegistryConfig`]: connection, namespace and extension settings for one registry
//! - [`Credentials`]: resolved login/password pair
//!
//! # Example
//!
//! ```rust
//! use eppd_core::EppdConfig;
//!
//! let config: EppdConfig = toml::from_str(r#"
//!     [registries.example]
//!     host = "epp.example.net"
//!     login = "registrar-1"
//!     password = "secret"
//! "#).unwrap();
//!
//! let registry = config.registry("example").unwrap();
//! assert_eq!(registry.port, 700);
//! ```

mod config;
mod error;
pub mod secret;
pub mod tracing;

pub use config::{
    Credentials, DaemonSettings, EppdConfig, ExtensionClass, FramingSettings, HeaderWidth,
    HeartbeatSettings, LengthMode, NamespaceConfig, RegistryConfig, default_services,
};
pub use error::{ConfigError, ConfigResult};
