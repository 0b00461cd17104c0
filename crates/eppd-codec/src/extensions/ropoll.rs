//! Afilias registry-operator poll extension.

use serde_json::Value;

use crate::commands::BuildContext;
use crate::element::Element;
use crate::error::CodecResult;

/// `<roPoll:req/>`, sent whatever the payload holds.
pub(super) fn poll(_payload: &Value, ctx: &BuildContext<'_>) -> CodecResult<Option<Element>> {
    let (key, value) = ctx.namespaces.declaration("roPoll", "ro-poll")?;
    Ok(Some(Element::new("roPoll:req").attr(key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::namespaces::Namespaces;
    use eppd_core::NamespaceConfig;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn renders_request_marker() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "ro-poll".to_string(),
            NamespaceConfig::new("urn:afilias:params:xml:ns:roPoll-1.0"),
        );
        let namespaces = Namespaces::new(entries);
        let ctx = BuildContext {
            command: Command::Poll,
            namespaces: &namespaces,
            services: &[],
            extensions: &[],
        };
        let el = poll(&json!(true), &ctx).unwrap().unwrap();
        assert_eq!(
            el.to_xml().unwrap(),
            "<roPoll:req xmlns:roPoll=\"urn:afilias:params:xml:ns:roPoll-1.0\"/>"
        );
    }
}
