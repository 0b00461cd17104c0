//! Hexonet key/value extension: arbitrary registry parameters as
//! `<keyvalue:kv key="…" value="…"/>`.

use serde_json::Value;

use crate::commands::BuildContext;
use crate::element::Element;
use crate::error::{CodecError, CodecResult};

fn attribute_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(super) fn create_domain(
    payload: &Value,
    ctx: &BuildContext<'_>,
) -> CodecResult<Option<Element>> {
    let pairs = payload
        .as_object()
        .ok_or_else(|| CodecError::validation("keyvalue extension data must be an object"))?;
    if pairs.is_empty() {
        return Ok(None);
    }

    let (key, value) = ctx.namespaces.declaration("keyvalue", "keyvalue")?;
    let kv = pairs.iter().map(|(k, v)| {
        Element::new("keyvalue:kv")
            .attr("key", k.as_str())
            .attr("value", attribute_value(v))
    });
    Ok(Some(
        Element::new("keyvalue:extension").attr(key, value).children(kv),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::namespaces::Namespaces;
    use eppd_core::NamespaceConfig;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn namespaces() -> Namespaces {
        let mut entries = BTreeMap::new();
        entries.insert(
            "keyvalue".to_string(),
            NamespaceConfig::new("http://schema.ispapi.net/epp/xml/keyvalue-1.0"),
        );
        Namespaces::new(entries)
    }

    fn ctx(namespaces: &Namespaces) -> BuildContext<'_> {
        BuildContext {
            command: Command::CreateDomain,
            namespaces,
            services: &[],
            extensions: &[],
        }
    }

    #[test]
    fn pairs_become_attributes() {
        let namespaces = namespaces();
        let el = create_domain(&json!({"X-ACCEPT-TRUSTEE-TAC": 1, "X-CA-LEGALTYPE": "CCT"}), &ctx(&namespaces))
            .unwrap()
            .unwrap();
        assert_eq!(
            el.to_xml().unwrap(),
            "<keyvalue:extension xmlns:keyvalue=\"http://schema.ispapi.net/epp/xml/keyvalue-1.0\">\
             <keyvalue:kv key=\"X-ACCEPT-TRUSTEE-TAC\" value=\"1\"/>\
             <keyvalue:kv key=\"X-CA-LEGALTYPE\" value=\"CCT\"/>\
             </keyvalue:extension>"
        );
    }

    #[test]
    fn empty_map_renders_nothing() {
        let namespaces = namespaces();
        assert!(create_domain(&json!({}), &ctx(&namespaces)).unwrap().is_none());
    }

    #[test]
    fn namespace_must_be_configured() {
        let namespaces = Namespaces::default();
        let err = create_domain(&json!({"a": "b"}), &ctx(&namespaces)).unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
