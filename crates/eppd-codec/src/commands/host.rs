//! Host commands (RFC 5732).

use serde_json::{Map, Value};

use super::{BuildContext, identifiers};
use crate::element::Element;
use crate::error::{CodecError, CodecResult};
use crate::fields::{addr_elements, required, scalar, status_elements};

const PREFIX: &str = "host";

fn name(data: &Map<String, Value>) -> CodecResult<Element> {
    Ok(Element::text("host:name", required(data, "name", "host name")?))
}

fn addresses(data: &Map<String, Value>) -> CodecResult<Vec<Element>> {
    match data.get("addr").filter(|v| !v.is_null()) {
        Some(addr) => addr_elements(addr, "host:addr"),
        None => Ok(Vec::new()),
    }
}

pub(super) fn check(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let check = ctx
        .object_root(PREFIX, "check")?
        .children(identifiers(data, "name", "host:name", "host name")?);
    Ok(Element::new("check").child(check))
}

pub(super) fn info(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let info = ctx.object_root(PREFIX, "info")?.child(name(data)?);
    Ok(Element::new("info").child(info))
}

pub(super) fn create(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let create = ctx
        .object_root(PREFIX, "create")?
        .child(name(data)?)
        .children(addresses(data)?);
    Ok(Element::new("create").child(create))
}

pub(super) fn update(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let mut update = ctx.object_root(PREFIX, "update")?.child(name(data)?);

    for action in ["add", "rem"] {
        if let Some(set) = data.get(action).filter(|v| !v.is_null()) {
            let set = set.as_object().ok_or_else(|| {
                CodecError::validation(format!("host update `{}` must be an object", action))
            })?;
            let mut el = Element::new(format!("host:{}", action)).children(addresses(set)?);
            if let Some(status) = set.get("status").filter(|v| !v.is_null()) {
                el = el.children(status_elements(status, "host:status")?);
            }
            update.push(el);
        }
    }

    if let Some(chg) = data.get("chg").filter(|v| !v.is_null()) {
        let new_name = chg
            .as_object()
            .map(|chg| scalar(chg, "name"))
            .transpose()?
            .flatten()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                CodecError::validation("when changing the host object, a name is required")
            })?;
        update.push(Element::new("host:chg").child(Element::text("host:name", new_name)));
    }

    Ok(Element::new("update").child(update))
}

pub(super) fn delete(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let delete = ctx.object_root(PREFIX, "delete")?.child(name(data)?);
    Ok(Element::new("delete").child(delete))
}
