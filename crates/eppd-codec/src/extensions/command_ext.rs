//! Metaregistrar `command-ext`: extra domain data sent with a transfer.

use serde_json::{Map, Value};

use crate::commands::BuildContext;
use crate::element::Element;
use crate::error::{CodecError, CodecResult};
use crate::fields::{OneOrMany, parse_opt, scalar};

const DOMAIN_XMLNS: &str = "http://www.metaregistrar.com/epp/command-ext-domain-1.0";
const CONTACT_TYPES: [&str; 3] = ["admin", "tech", "billing"];

fn domain_namespace(ctx: &BuildContext<'_>) -> String {
    ctx.xmlns("commandExtDomain")
        .map(str::to_string)
        .unwrap_or_else(|_| DOMAIN_XMLNS.to_string())
}

fn transfer_data(data: &Map<String, Value>) -> CodecResult<Vec<Element>> {
    let mut elements = Vec::new();

    if let Some(hosts) = parse_opt::<OneOrMany<String>>(data, "ns")? {
        let hosts = hosts.into_vec();
        if !hosts.is_empty() {
            elements.push(
                Element::new("command-ext-domain:ns").children(
                    hosts
                        .into_iter()
                        .map(|h| Element::text("command-ext-domain:hostObj", h)),
                ),
            );
        }
    }

    if let Some(registrant) = scalar(data, "registrant")?.filter(|r| !r.is_empty()) {
        elements.push(Element::text("command-ext-domain:registrant", registrant));
    }

    if let Some(contacts) = data.get("contact").filter(|v| !v.is_null()) {
        let contacts = contacts.as_object().ok_or_else(|| {
            CodecError::validation("command-ext contact must be an object mapping type to id")
        })?;
        for kind in CONTACT_TYPES {
            if let Some(id) = scalar(contacts, kind)?.filter(|id| !id.is_empty()) {
                elements.push(Element::text("command-ext-domain:contact", id).attr("type", kind));
            }
        }
    }

    Ok(elements)
}

pub(super) fn transfer_domain(
    payload: &Value,
    ctx: &BuildContext<'_>,
) -> CodecResult<Option<Element>> {
    let data = payload
        .as_object()
        .ok_or_else(|| CodecError::validation("command-ext extension data must be an object"))?;
    let elements = transfer_data(data)?;
    if elements.is_empty() {
        return Ok(None);
    }

    let (key, value) = ctx.namespaces.declaration("command-ext", "commandExt")?;
    let domain = Element::new("command-ext-domain:domain")
        .attr("xmlns:command-ext-domain", domain_namespace(ctx))
        .child(Element::new("command-ext-domain:transfer").children(elements));
    Ok(Some(
        Element::new("command-ext:command-ext")
            .attr(key, value)
            .child(domain),
    ))
}
