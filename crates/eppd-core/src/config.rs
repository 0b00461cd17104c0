//! Daemon and registry configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/eppd/config.toml` by default. Registry credentials support
//! secret references (see [`crate::secret`]).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::secret;

// ---------------------------------------------------------------------------
// EppdConfig (config.toml)
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EppdConfig {
    /// Supervisor / front-end socket settings.
    pub daemon: DaemonSettings,

    /// Idle keepalive settings shared by every session.
    pub heartbeat: HeartbeatSettings,

    /// Registries keyed by name. Each gets its own worker process.
    pub registries: BTreeMap<String, RegistryConfig>,
}

impl EppdConfig {
    /// Loads configuration from the default path.
    ///
    /// A missing file yields the default (empty) configuration.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eppd")
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Looks up a registry by name.
    pub fn registry(&self, name: &str) -> ConfigResult<&RegistryConfig> {
        self.registries
            .get(name)
            .ok_or_else(|| ConfigError::UnknownRegistry(name.to_string()))
    }

    /// Checks that every registry is usable.
    ///
    /// Credentials are resolved as part of validation, so broken secret
    /// references are reported here rather than at login time.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.heartbeat.check_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "heartbeat.check_interval_secs must be greater than zero",
            ));
        }
        for (name, registry) in &self.registries {
            registry
                .validate()
                .map_err(|e| ConfigError::invalid(format!("registry `{}`: {}", name, e)))?;
        }
        Ok(())
    }
}

/// Supervisor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Path to the front-end Unix socket.
    pub socket_path: Option<PathBuf>,

    /// Path to the supervisor PID file.
    pub pid_path: Option<PathBuf>,

    /// Front-end connection timeout in seconds.
    pub timeout: u64,

    /// Emit JSON-formatted logs.
    pub json_logs: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            pid_path: None,
            timeout: 30,
            json_logs: false,
        }
    }
}

/// Idle keepalive settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    /// How often an idle session checks whether a `hello` is due.
    pub check_interval_secs: u64,

    /// How long a session may stay silent before a `hello` is sent.
    pub idle_threshold_secs: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: 5,
            idle_threshold_secs: 60,
        }
    }
}

impl HeartbeatSettings {
    /// Returns the check interval.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Returns the idle threshold.
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Connection and protocol settings for one registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry EPP host.
    pub host: String,

    /// Registry EPP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client login (supports `env::`, `file::` and `pass::` prefixes).
    #[serde(default)]
    pub login: Option<String>,

    /// Client password (supports `env::`, `file::` and `pass::` prefixes).
    #[serde(default)]
    pub password: Option<String>,

    /// PEM private key for client certificate authentication.
    #[serde(default)]
    pub key: Option<PathBuf>,

    /// PEM client certificate chain.
    #[serde(default)]
    pub cert: Option<PathBuf>,

    /// PEM bundle used to verify the registry certificate.
    #[serde(default)]
    pub ca: Option<PathBuf>,

    /// XML namespaces keyed by short name (`epp`, `domain`, `DNSSEC`, ...).
    #[serde(default)]
    pub namespaces: BTreeMap<String, NamespaceConfig>,

    /// Namespace keys announced as `objURI` at login.
    #[serde(default = "default_services")]
    pub services: Vec<String>,

    /// Namespace keys announced as `extURI` at login.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Extension builder families to install for this registry.
    #[serde(default)]
    pub extension_classes: Vec<ExtensionClass>,

    /// Frame length semantics used by this registry.
    #[serde(default)]
    pub framing: FramingSettings,
}

fn default_port() -> u16 {
    700
}

/// Returns the object services announced when none are configured.
pub fn default_services() -> Vec<String> {
    vec![
        "domain".to_string(),
        "contact".to_string(),
        "host".to_string(),
    ]
}

impl RegistryConfig {
    /// Creates a registry configuration with defaults for everything but the host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            login: None,
            password: None,
            key: None,
            cert: None,
            ca: None,
            namespaces: BTreeMap::new(),
            services: default_services(),
            extensions: Vec::new(),
            extension_classes: Vec::new(),
            framing: FramingSettings::default(),
        }
    }

    /// Builder: set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder: set inline credentials.
    pub fn with_credentials(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.password = Some(password.into());
        self
    }

    /// Builder: add a namespace.
    pub fn with_namespace(mut self, key: impl Into<String>, xmlns: impl Into<String>) -> Self {
        self.namespaces.insert(key.into(), NamespaceConfig::new(xmlns));
        self
    }

    /// Builder: install an extension family and announce its namespace.
    pub fn with_extension_class(
        mut self,
        extension: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        let extension = extension.into();
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension.clone());
        }
        self.extension_classes.push(ExtensionClass {
            extension,
            class_name: class_name.into(),
        });
        self
    }

    /// Returns the namespace configured under `key`, if any.
    pub fn namespace(&self, key: &str) -> Option<&NamespaceConfig> {
        self.namespaces.get(key)
    }

    /// Returns `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolves the login credentials, expanding secret references.
    pub fn credentials(&self) -> ConfigResult<Credentials> {
        let login = self
            .login
            .as_deref()
            .ok_or_else(|| ConfigError::invalid("login is not configured"))?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| ConfigError::invalid("password is not configured"))?;

        Ok(Credentials::new(
            secret::resolve(login)?,
            secret::resolve(password)?,
        ))
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("host must not be empty"));
        }
        if self.key.is_some() != self.cert.is_some() {
            return Err(ConfigError::invalid("key and cert must be configured together"));
        }
        for key in self.services.iter().chain(self.extensions.iter()) {
            if !self.namespaces.contains_key(key) && !is_builtin_namespace(key) {
                return Err(ConfigError::invalid(format!(
                    "namespace `{}` is announced but not configured",
                    key
                )));
            }
        }
        self.credentials()?;
        Ok(())
    }
}

/// Namespace keys that have a well-known default URI.
fn is_builtin_namespace(key: &str) -> bool {
    matches!(key, "epp" | "domain" | "host" | "contact" | "DNSSEC")
}

/// An XML namespace and any extra attributes to put next to it.
///
/// For the `epp` key the extra attributes end up on the document root, which
/// is how `xmlns:xsi` and `xsi:schemaLocation` are configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Namespace URI.
    pub xmlns: String,

    /// Additional attributes.
    #[serde(default, flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl NamespaceConfig {
    /// Creates a namespace with no extra attributes.
    pub fn new(xmlns: impl Into<String>) -> Self {
        Self {
            xmlns: xmlns.into(),
            attributes: BTreeMap::new(),
        }
    }
}

/// Selects a built-in extension family for an extension name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionClass {
    /// Key used in command payloads (`extension.<name>`) and in `namespaces`.
    pub extension: String,

    /// Builder family, e.g. `SecDnsExtension`.
    pub class_name: String,
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// How a registry interprets the frame length header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthMode {
    /// The length counts the header too (RFC 5734).
    IncludesHeader,
    /// The length counts the payload only.
    ExcludesHeader,
    /// Send RFC 5734 frames, accept either interpretation on receive.
    ///
    /// The two readings are told apart by how many bytes are buffered. A
    /// header-excluded frame whose buffer holds exactly `length` bytes reads
    /// as complete one header width early, truncating the document.
    /// Registries known to exclude the header should be configured with
    /// `excludes-header`.
    #[default]
    Either,
}

/// Width of the frame length header in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HeaderWidth {
    /// Three-byte header used by some historical servers.
    Three,
    /// Four-byte header (RFC 5734).
    #[default]
    Four,
}

impl HeaderWidth {
    /// Returns the width in bytes.
    pub fn bytes(self) -> usize {
        match self {
            Self::Three => 3,
            Self::Four => 4,
        }
    }
}

impl TryFrom<u8> for HeaderWidth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            other => Err(format!("frame header width must be 3 or 4, got {}", other)),
        }
    }
}

impl From<HeaderWidth> for u8 {
    fn from(width: HeaderWidth) -> Self {
        width.bytes() as u8
    }
}

/// Per-registry framing settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingSettings {
    /// Length header interpretation.
    pub length: LengthMode,

    /// Length header width.
    pub header: HeaderWidth,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Resolved login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Client identifier (`clID`).
    pub login: String,
    /// Current password.
    pub password: String,
    /// Replacement password to set during login (`newPW`).
    pub new_password: Option<String>,
}

impl Credentials {
    /// Creates credentials without a password change.
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            new_password: None,
        }
    }

    /// Builder: request a password change at login.
    pub fn with_new_password(mut self, new_password: impl Into<String>) -> Self {
        self.new_password = Some(new_password.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("new_password", &self.new_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
