//! Command documents for one registry.

use eppd_core::{Credentials, RegistryConfig};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::commands::{BuildContext, Command, build_verb};
use crate::element::Element;
use crate::error::{CodecError, CodecResult};
use crate::extensions::{ExtensionBuilder, ExtensionRegistry};
use crate::namespaces::Namespaces;
use crate::normalize::normalize;

/// Renders EPP command documents with a registry's namespaces, services and
/// extension builders.
#[derive(Debug, Clone)]
pub struct CommandCodec {
    namespaces: Namespaces,
    services: Vec<String>,
    extensions: Vec<String>,
    registry: ExtensionRegistry,
}

impl CommandCodec {
    /// Creates a codec for a registry, installing its extension classes.
    pub fn new(config: &RegistryConfig) -> CodecResult<Self> {
        Ok(Self {
            namespaces: Namespaces::new(config.namespaces.clone()),
            services: config.services.clone(),
            extensions: config.extensions.clone(),
            registry: ExtensionRegistry::from_classes(&config.extension_classes)?,
        })
    }

    /// Registers an additional extension builder.
    pub fn register_extension(
        &mut self,
        command: Command,
        extension: impl Into<String>,
        builder: impl ExtensionBuilder + 'static,
    ) {
        self.registry.register(command, extension, builder);
    }

    pub fn extension_registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    fn root(&self) -> Element {
        let mut epp = Element::new("epp");
        for (key, value) in self.namespaces.root_attributes() {
            epp = epp.attr(key, value);
        }
        epp
    }

    /// Builds the `<epp>` element for a command.
    ///
    /// A `null` payload counts as empty. The payload is normalized for the
    /// command's object type before any builder sees it.
    pub fn build(&self, command: Command, payload: &Value, tr_id: &str) -> CodecResult<Element> {
        let data = match payload {
            Value::Null => Map::new(),
            Value::Object(map) => normalize(command.kind(), map),
            _ => {
                return Err(CodecError::validation(format!(
                    "{} payload must be an object",
                    command
                )));
            }
        };

        if command == Command::Hello {
            return Ok(self.root().child(Element::new("hello")));
        }

        let ctx = BuildContext {
            command,
            namespaces: &self.namespaces,
            services: &self.services,
            extensions: &self.extensions,
        };
        let verb = build_verb(&ctx, &data)?;
        let extension = self.registry.build(payload, &ctx)?;
        let cl_tr_id = Some(tr_id)
            .filter(|id| !id.is_empty())
            .map(|id| Element::text("clTRID", id));

        debug!(command = %command, tr_id, "built command");
        Ok(self.root().child(
            Element::new("command")
                .child(verb)
                .maybe_child(extension)
                .maybe_child(cl_tr_id),
        ))
    }

    /// Renders a command, looked up by name, as an XML document.
    pub fn render(&self, command: &str, payload: &Value, tr_id: &str) -> CodecResult<String> {
        let command: Command = command.parse()?;
        self.build(command, payload, tr_id)?.to_document()
    }

    /// Returns the `login` payload for a set of credentials.
    pub fn login_payload(credentials: &Credentials) -> Value {
        let mut payload = json!({
            "login": credentials.login,
            "password": credentials.password,
        });
        if let (Some(new_password), Some(map)) =
            (&credentials.new_password, payload.as_object_mut())
        {
            map.insert("newPassword".to_string(), Value::String(new_password.clone()));
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> CommandCodec {
        CommandCodec::new(&RegistryConfig::new("epp.example.net")).unwrap()
    }

    #[test]
    fn hello_document() {
        let xml = codec().render("hello", &Value::Null, "ignored").unwrap();
        insta::assert_snapshot!(xml, @r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?><epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><hello/></epp>"#);
    }

    #[test]
    fn login_document() {
        let payload = CommandCodec::login_payload(&Credentials::new("registrar-1", "secret"));
        let xml = codec().render("login", &payload, "LOGIN-1").unwrap();
        insta::assert_snapshot!(xml, @r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?><epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><command><login><clID>registrar-1</clID><pw>secret</pw><options><version>1.0</version><lang>en</lang></options><svcs><objURI>urn:ietf:params:xml:ns:domain-1.0</objURI><objURI>urn:ietf:params:xml:ns:contact-1.0</objURI><objURI>urn:ietf:params:xml:ns:host-1.0</objURI></svcs></login><clTRID>LOGIN-1</clTRID></command></epp>"#);
    }

    #[test]
    fn login_with_password_change_and_extensions() {
        let config = RegistryConfig::new("epp.example.net")
            .with_extension_class("DNSSEC", "SecDnsExtension");
        let codec = CommandCodec::new(&config).unwrap();
        let payload = CommandCodec::login_payload(
            &Credentials::new("registrar-1", "secret").with_new_password("n3w"),
        );
        let login = codec.build(Command::Login, &payload, "T").unwrap();
        let login = login.path(&["command", "login"]).unwrap();
        assert_eq!(login.find("newPW").unwrap().text_content(), Some("n3w"));
        assert_eq!(
            login
                .path(&["svcs", "svcExtension", "extURI"])
                .unwrap()
                .text_content(),
            Some("urn:ietf:params:xml:ns:secDNS-1.1")
        );
    }

    #[test]
    fn create_domain_document() {
        let payload = serde_json::json!({
            "domain": "example.com",
            "period": 2,
            "ns": ["ns1.example.net", "ns2.example.net"],
            "owner": "R-1",
            "contact": [{"admin": "A-1"}, {"tech": "T-1"}],
            "authcode": "2fooBAR"
        });
        let xml = codec()
            .render("createDomain", &payload, "CREATEDOMAIN-1")
            .unwrap();
        insta::assert_snapshot!(xml, @r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?><epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><command><create><domain:create xmlns:domain="urn:ietf:params:xml:ns:domain-1.0"><domain:name>example.com</domain:name><domain:period unit="y">2</domain:period><domain:ns><domain:hostObj>ns1.example.net</domain:hostObj><domain:hostObj>ns2.example.net</domain:hostObj></domain:ns><domain:registrant>R-1</domain:registrant><domain:contact type="admin">A-1</domain:contact><domain:contact type="tech">T-1</domain:contact><domain:authInfo><domain:pw>2fooBAR</domain:pw></domain:authInfo></domain:create></create><clTRID>CREATEDOMAIN-1</clTRID></command></epp>"#);
    }

    #[test]
    fn create_domain_defaults() {
        let el = codec()
            .build(Command::CreateDomain, &serde_json::json!({"name": "example.org"}), "T")
            .unwrap();
        let create = el.path(&["command", "create", "domain:create"]).unwrap();
        let period = create.find("domain:period").unwrap();
        assert_eq!(period.attribute("unit"), Some("y"));
        assert_eq!(period.text_content(), Some("1"));
        assert!(create.find("domain:registrant").is_none());
        assert_eq!(
            create.path(&["domain:authInfo", "domain:pw"]).unwrap().text_content(),
            Some("")
        );
    }

    #[test]
    fn transfer_op_is_validated() {
        let err = codec()
            .render(
                "transferDomain",
                &serde_json::json!({"name": "example.com", "op": "steal"}),
                "T",
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transfer domain op must be one of the following: [approve, cancel, query, reject, request]."
        );

        let err = codec()
            .render(
                "transferContact",
                &serde_json::json!({"id": "C-1", "op": "steal"}),
                "T",
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transfer contact op must be one of the following: [approve, cancel, query, reject, request]."
        );
    }

    #[test]
    fn update_domain_with_dnssec_remove_all() {
        let config = RegistryConfig::new("epp.example.net")
            .with_extension_class("DNSSEC", "SecDnsExtension");
        let codec = CommandCodec::new(&config).unwrap();
        let payload = serde_json::json!({
            "name": "example.com",
            "chg": {"authInfo": "n3w"},
            "extension": {"DNSSEC": {"rem": {"all": true}}}
        });
        let xml = codec.render("updateDomain", &payload, "UPDATEDOMAIN-1").unwrap();
        insta::assert_snapshot!(xml, @r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?><epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><command><update><domain:update xmlns:domain="urn:ietf:params:xml:ns:domain-1.0"><domain:name>example.com</domain:name><domain:chg><domain:authInfo><domain:pw>n3w</domain:pw></domain:authInfo></domain:chg></domain:update></update><extension><secDNS:update xmlns:secDNS="urn:ietf:params:xml:ns:secDNS-1.1"><secDNS:rem><secDNS:all>true</secDNS:all></secDNS:rem></secDNS:update></extension><clTRID>UPDATEDOMAIN-1</clTRID></command></epp>"#);
    }

    #[test]
    fn poll_ack_document() {
        let xml = codec()
            .render("poll", &serde_json::json!({"msgID": "12345"}), "POLL-1")
            .unwrap();
        insta::assert_snapshot!(xml, @r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?><epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><command><poll op="ack" msgID="12345"/><clTRID>POLL-1</clTRID></command></epp>"#);
    }

    #[test]
    fn contact_create_normalizes_synonyms() {
        let payload = serde_json::json!({
            "contact": "C-1",
            "tel": "+1.7035555555",
            "email": "jdoe@example.com",
            "postalInfo": {
                "type": "int",
                "firstname": "John",
                "lastname": "Doe",
                "company": "Example Inc.",
                "addr": {"street": ["123 Example Dr.", "Suite 100"], "city": "Dulles", "state": "VA", "zip": "20166-6503", "country": "US"}
            },
            "disclose": {"flag": 0, "disclosing": ["voice", {"name": "addr", "type": "int"}]}
        });
        let xml = codec().render("createContact", &payload, "C-1").unwrap();
        insta::assert_snapshot!(xml, @r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?><epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><command><create><contact:create xmlns:contact="urn:ietf:params:xml:ns:contact-1.0"><contact:id>C-1</contact:id><contact:postalInfo type="int"><contact:name>John Doe</contact:name><contact:org>Example Inc.</contact:org><contact:addr><contact:street>123 Example Dr.</contact:street><contact:street>Suite 100</contact:street><contact:city>Dulles</contact:city><contact:sp>VA</contact:sp><contact:pc>20166-6503</contact:pc><contact:cc>US</contact:cc></contact:addr></contact:postalInfo><contact:voice>+1.7035555555</contact:voice><contact:email>jdoe@example.com</contact:email><contact:authInfo><contact:pw></contact:pw></contact:authInfo><contact:disclose flag="0"><contact:voice/><contact:addr type="int"/></contact:disclose></contact:create></create><clTRID>C-1</clTRID></command></epp>"#);
    }

    #[test]
    fn unknown_commands_and_bad_payloads() {
        let err = codec().render("frobDomain", &Value::Null, "T").unwrap_err();
        assert_eq!(err.kind(), "unknown_command");

        let err = codec()
            .render("infoDomain", &serde_json::json!(["example.com"]), "T")
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn custom_builders_extend_any_command() {
        let mut codec = codec();
        codec.register_extension(
            Command::InfoHost,
            "note",
            |payload: &Value, _ctx: &BuildContext<'_>| -> CodecResult<Option<Element>> {
                Ok(payload.as_str().map(|s| Element::text("note:text", s)))
            },
        );
        let el = codec
            .build(
                Command::InfoHost,
                &serde_json::json!({"host": "ns1.example.net", "extension": {"note": "hi"}}),
                "T",
            )
            .unwrap();
        assert_eq!(
            el.path(&["command", "extension", "note:text"])
                .unwrap()
                .text_content(),
            Some("hi")
        );
        assert_eq!(
            el.path(&["command", "info", "host:info", "host:name"])
                .unwrap()
                .text_content(),
            Some("ns1.example.net")
        );
    }
}
