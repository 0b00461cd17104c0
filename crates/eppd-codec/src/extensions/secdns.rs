//! DNSSEC extension (RFC 5910, `secDNS-1.1`).

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::commands::BuildContext;
use crate::element::Element;
use crate::error::{CodecError, CodecResult};
use crate::fields::{OneOrMany, Scalar, parse_opt, scalar};

const NAMESPACE_KEY: &str = "DNSSEC";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyData {
    flags: Scalar,
    protocol: Scalar,
    alg: Scalar,
    pub_key: Scalar,
}

impl KeyData {
    fn to_element(&self) -> Element {
        Element::new("secDNS:keyData")
            .child(Element::text("secDNS:flags", self.flags.to_string()))
            .child(Element::text("secDNS:protocol", self.protocol.to_string()))
            .child(Element::text("secDNS:alg", self.alg.to_string()))
            .child(Element::text("secDNS:pubKey", self.pub_key.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DsData {
    key_tag: Scalar,
    alg: Scalar,
    digest_type: Scalar,
    digest: Scalar,
    #[serde(default)]
    key_data: Option<KeyData>,
}

impl DsData {
    fn to_element(&self) -> Element {
        Element::new("secDNS:dsData")
            .child(Element::text("secDNS:keyTag", self.key_tag.to_string()))
            .child(Element::text("secDNS:alg", self.alg.to_string()))
            .child(Element::text("secDNS:digestType", self.digest_type.to_string()))
            .child(Element::text("secDNS:digest", self.digest.to_string()))
            .maybe_child(self.key_data.as_ref().map(KeyData::to_element))
    }
}

fn max_sig_life(data: &Map<String, Value>) -> CodecResult<Option<Element>> {
    Ok(scalar(data, "maxSigLife")?
        .filter(|v| !v.is_empty())
        .map(|v| Element::text("secDNS:maxSigLife", v)))
}

/// dsData takes precedence over keyData, as in the RFC's interfaces.
fn key_material(data: &Map<String, Value>) -> CodecResult<Vec<Element>> {
    if let Some(ds) = parse_opt::<OneOrMany<DsData>>(data, "dsData")? {
        return Ok(ds.into_vec().iter().map(DsData::to_element).collect());
    }
    if let Some(keys) = parse_opt::<OneOrMany<KeyData>>(data, "keyData")? {
        return Ok(keys.into_vec().iter().map(KeyData::to_element).collect());
    }
    Ok(Vec::new())
}

fn object<'a>(value: &'a Value, what: &str) -> CodecResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| CodecError::validation(format!("DNSSEC {} must be an object", what)))
}

fn root(ctx: &BuildContext<'_>, element: &str) -> CodecResult<Element> {
    let (key, value) = ctx.namespaces.declaration("secDNS", NAMESPACE_KEY)?;
    Ok(Element::new(format!("secDNS:{}", element)).attr(key, value))
}

/// `<secDNS:create>` for `createDomain`; nothing when no key material is given.
pub(super) fn create(payload: &Value, ctx: &BuildContext<'_>) -> CodecResult<Option<Element>> {
    let data = object(payload, "extension data")?;
    let material = key_material(data)?;
    if material.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        root(ctx, "create")?
            .maybe_child(max_sig_life(data)?)
            .children(material),
    ))
}

fn remove_all(value: &Value) -> CodecResult<bool> {
    match value {
        Value::Bool(all) => Ok(*all),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n > 0.0)),
        _ => Err(CodecError::validation(
            "'all' must be a boolean or truthy number.",
        )),
    }
}

/// `<secDNS:update>` for `updateDomain`, in schema order: rem, add, chg.
pub(super) fn update(payload: &Value, ctx: &BuildContext<'_>) -> CodecResult<Option<Element>> {
    let data = object(payload, "extension data")?;
    let present = |key: &str| data.get(key).filter(|v| !v.is_null());
    let (add, rem, chg) = (present("add"), present("rem"), present("chg"));
    if add.is_none() && rem.is_none() && chg.is_none() {
        return Err(CodecError::validation(
            "At least one 'chg', 'add', or 'rem' required in DNSSEC updates.",
        ));
    }

    let mut update = root(ctx, "update")?;

    if let Some(rem) = rem {
        let rem = object(rem, "rem")?;
        let el = match rem.get("all").filter(|v| !v.is_null()) {
            Some(all) => Element::new("secDNS:rem").child(Element::text(
                "secDNS:all",
                remove_all(all)?.to_string(),
            )),
            None => Element::new("secDNS:rem").children(key_material(rem)?),
        };
        update.push(el);
    }

    if let Some(add) = add {
        let add = object(add, "add")?;
        update.push(Element::new("secDNS:add").children(key_material(add)?));
    }

    if let Some(chg) = chg {
        let chg = object(chg, "chg")?;
        update.push(Element::new("secDNS:chg").maybe_child(max_sig_life(chg)?));
    }

    Ok(Some(update))
}
