//! Extension builder registry.
//!
//! A command payload may carry `extension: {<name>: <payload>}`. For every
//! key with a builder registered under `(command, name)`, the builder's
//! fragment is appended to the command's `<extension>` element. Keys without
//! a builder are ignored.
//!
//! Builders come from the registry configuration (`extension_classes`) and
//! from library users calling [`ExtensionRegistry::register`]:
//!
//! ```rust
//! use eppd_codec::{BuildContext, CodecResult, Command, Element, ExtensionRegistry};
//!
//! let mut registry = ExtensionRegistry::new();
//! registry.register(
//!     Command::CreateDomain,
//!     "fee",
//!     |payload: &serde_json::Value, _ctx: &BuildContext<'_>| -> CodecResult<Option<Element>> {
//!         Ok(payload
//!             .get("amount")
//!             .and_then(|a| a.as_str())
//!             .map(|a| Element::text("fee:fee", a)))
//!     },
//! );
//! assert!(registry.get(Command::CreateDomain, "fee").is_some());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use eppd_core::ExtensionClass;
use serde_json::Value;
use tracing::debug;

use crate::commands::{BuildContext, Command};
use crate::element::Element;
use crate::error::{CodecError, CodecResult};

mod command_ext;
mod keyvalue;
mod ropoll;
mod secdns;

/// Builds one extension fragment for a command.
pub trait ExtensionBuilder: Send + Sync {
    /// Returns the fragment, or `None` when the payload asks for nothing.
    fn build(&self, payload: &Value, ctx: &BuildContext<'_>) -> CodecResult<Option<Element>>;
}

impl<F> ExtensionBuilder for F
where
    F: Fn(&Value, &BuildContext<'_>) -> CodecResult<Option<Element>> + Send + Sync,
{
    fn build(&self, payload: &Value, ctx: &BuildContext<'_>) -> CodecResult<Option<Element>> {
        self(payload, ctx)
    }
}

type BuilderFn = fn(&Value, &BuildContext<'_>) -> CodecResult<Option<Element>>;

const SECDNS: &[(Command, BuilderFn)] = &[
    (Command::CreateDomain, secdns::create),
    (Command::UpdateDomain, secdns::update),
];
const HEXONET: &[(Command, BuilderFn)] = &[(Command::CreateDomain, keyvalue::create_domain)];
const AFILIAS: &[(Command, BuilderFn)] = &[(Command::Poll, ropoll::poll)];
const METAREGISTRAR: &[(Command, BuilderFn)] =
    &[(Command::TransferDomain, command_ext::transfer_domain)];

/// Built-in extension families and the commands they hook.
fn builtin_family(class_name: &str) -> Option<&'static [(Command, BuilderFn)]> {
    match class_name {
        "SecDnsExtension" => Some(SECDNS),
        "HexonetExtension" => Some(HEXONET),
        "AfiliasExtension" => Some(AFILIAS),
        "MetaregistrarExtension" => Some(METAREGISTRAR),
        _ => None,
    }
}

/// `(command, extension name) → builder`, assembled once per session.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    builders: BTreeMap<(Command, String), Arc<dyn ExtensionBuilder>>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.builders.keys().map(|(c, e)| format!("{}/{}", c, e)))
            .finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the built-in families named by the registry configuration.
    ///
    /// An unknown class name is a configuration error.
    pub fn from_classes(classes: &[ExtensionClass]) -> CodecResult<Self> {
        let mut registry = Self::new();
        for class in classes {
            let family = builtin_family(&class.class_name).ok_or_else(|| {
                CodecError::config(format!("unknown extension class `{}`", class.class_name))
            })?;
            for (command, builder) in family {
                registry.register(*command, class.extension.clone(), *builder);
            }
            debug!(
                extension = %class.extension,
                class = %class.class_name,
                "installed extension builders"
            );
        }
        Ok(registry)
    }

    /// Registers a builder, replacing any previous one for the same key.
    pub fn register(
        &mut self,
        command: Command,
        extension: impl Into<String>,
        builder: impl ExtensionBuilder + 'static,
    ) {
        self.builders
            .insert((command, extension.into()), Arc::new(builder));
    }

    pub fn get(&self, command: Command, extension: &str) -> Option<&Arc<dyn ExtensionBuilder>> {
        self.builders.get(&(command, extension.to_string()))
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Runs every registered builder named in the payload's `extension` map.
    ///
    /// Returns `None` when no builder produced a fragment.
    pub fn build(&self, payload: &Value, ctx: &BuildContext<'_>) -> CodecResult<Option<Element>> {
        let Some(requested) = payload.get("extension").and_then(Value::as_object) else {
            return Ok(None);
        };

        let mut fragments = Vec::new();
        for (name, ext_payload) in requested {
            match self.get(ctx.command, name) {
                Some(builder) => {
                    if let Some(fragment) = builder.build(ext_payload, ctx)? {
                        fragments.push(fragment);
                    }
                }
                None => debug!(command = %ctx.command, extension = %name, "no extension builder"),
            }
        }

        if fragments.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Element::new("extension").children(fragments)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::Namespaces;
    use serde_json::json;

    fn ctx(command: Command, namespaces: &Namespaces) -> BuildContext<'_> {
        BuildContext {
            command,
            namespaces,
            services: &[],
            extensions: &[],
        }
    }

    #[test]
    fn unknown_class_is_a_config_error() {
        let err = ExtensionRegistry::from_classes(&[ExtensionClass {
            extension: "x".to_string(),
            class_name: "NopeExtension".to_string(),
        }])
        .unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn classes_install_their_commands() {
        let registry = ExtensionRegistry::from_classes(&[ExtensionClass {
            extension: "DNSSEC".to_string(),
            class_name: "SecDnsExtension".to_string(),
        }])
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(Command::CreateDomain, "DNSSEC").is_some());
        assert!(registry.get(Command::UpdateDomain, "DNSSEC").is_some());
        assert!(registry.get(Command::InfoDomain, "DNSSEC").is_none());
    }

    #[test]
    fn unregistered_keys_are_ignored() {
        let namespaces = Namespaces::default();
        let registry = ExtensionRegistry::new();
        let payload = json!({"extension": {"mystery": {"a": 1}}});
        assert!(
            registry
                .build(&payload, &ctx(Command::CreateDomain, &namespaces))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn closures_are_builders() {
        let namespaces = Namespaces::default();
        let mut registry = ExtensionRegistry::new();
        registry.register(
            Command::InfoDomain,
            "tag",
            |payload: &Value, _ctx: &BuildContext<'_>| -> CodecResult<Option<Element>> {
                Ok(Some(Element::text(
                    "tag:name",
                    payload.as_str().unwrap_or_default(),
                )))
            },
        );

        let payload = json!({"name": "example.com", "extension": {"tag": "blue", "other": 1}});
        let ext = registry
            .build(&payload, &ctx(Command::InfoDomain, &namespaces))
            .unwrap()
            .unwrap();
        assert_eq!(ext.to_xml().unwrap(), "<extension><tag:name>blue</tag:name></extension>");

        // Same key, different command: nothing registered.
        assert!(
            registry
                .build(&payload, &ctx(Command::CreateDomain, &namespaces))
                .unwrap()
                .is_none()
        );
    }
}
