//! EPP command rendering and response decoding.
//!
//! [`CommandCodec`] turns a command name and a loosely shaped JSON payload
//! into an EPP document for one registry. Payloads are normalized first
//! (synonym folding, name assembly), then rendered by the command's builder,
//! then extended by any registered [`ExtensionBuilder`]s. Every failure is a
//! [`CodecError`] raised before anything reaches the wire.
//!
//! [`decode`] turns a response frame back into JSON.
//!
//! # Example
//!
//! ```rust
//! use eppd_codec::CommandCodec;
//! use eppd_core::RegistryConfig;
//! use serde_json::json;
//!
//! let codec = CommandCodec::new(&RegistryConfig::new("epp.example.net")).unwrap();
//! let xml = codec
//!     .render("checkDomain", &json!({"name": ["example.com", "example.net"]}), "CHECK-1")
//!     .unwrap();
//! assert!(xml.contains("<domain:name>example.net</domain:name>"));
//! ```

mod codec;
mod commands;
mod element;
mod error;
mod extensions;
pub mod fields;
pub mod namespaces;
pub mod normalize;
pub mod response;

pub use codec::CommandCodec;
pub use commands::{BuildContext, Command, ObjectKind};
pub use element::{Content, Element};
pub use error::{CodecError, CodecResult, DecodeError};
pub use extensions::{ExtensionBuilder, ExtensionRegistry};
pub use namespaces::Namespaces;
pub use response::{decode, result_code};
