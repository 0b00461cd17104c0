//! Domain commands (RFC 5731).

use serde_json::{Map, Value};

use super::{BuildContext, identifiers, transfer_op};
use crate::element::Element;
use crate::error::{CodecError, CodecResult};
use crate::fields::{
    Period, ResolvedPeriod, auth_info_if_present, auth_info_or_empty, nameservers, parse_opt, required, scalar,
    status_elements,
};

const PREFIX: &str = "domain";

fn name(data: &Map<String, Value>) -> CodecResult<Element> {
    Ok(Element::text("domain:name", required(data, "name", "domain name")?))
}

fn period(data: &Map<String, Value>) -> CodecResult<Option<Element>> {
    Ok(parse_opt::<Period>(data, "period")?.map(|p| p.resolve().to_element(PREFIX)))
}

/// Renders domain contacts.
///
/// Accepts a list of single-entry objects (`[{"admin": "P-1"}, {"tech": "P-2"}]`)
/// or one object mapping types to ids.
fn contacts(value: &Value) -> CodecResult<Vec<Element>> {
    let entries: Vec<&Map<String, Value>> = match value {
        Value::Null => Vec::new(),
        Value::Object(map) => vec![map],
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object().ok_or_else(|| {
                    CodecError::validation("domain contacts must be objects mapping type to id")
                })
            })
            .collect::<CodecResult<_>>()?,
        _ => {
            return Err(CodecError::validation(
                "domain contacts must be objects mapping type to id",
            ));
        }
    };

    let mut elements = Vec::new();
    for entry in entries {
        for (kind, id) in entry {
            let ids: Vec<&Value> = match id {
                Value::Array(ids) => ids.iter().collect(),
                id => vec![id],
            };
            for id in ids {
                let id = id.as_str().ok_or_else(|| {
                    CodecError::validation(format!("contact id for `{}` must be a string", kind))
                })?;
                elements.push(Element::text("domain:contact", id).attr("type", kind.as_str()));
            }
        }
    }
    Ok(elements)
}

pub(super) fn check(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let check = ctx
        .object_root(PREFIX, "check")?
        .children(identifiers(data, "name", "domain:name", "domain name")?);
    Ok(Element::new("check").child(check))
}

pub(super) fn info(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let mut name = name(data)?;
    if let Some(hosts) = scalar(data, "hosts")? {
        name = name.attr("hosts", hosts);
    }
    let info = ctx
        .object_root(PREFIX, "info")?
        .child(name)
        .maybe_child(auth_info_if_present(data, PREFIX)?);
    Ok(Element::new("info").child(info))
}

pub(super) fn create(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let period = period(data)?.unwrap_or_else(|| ResolvedPeriod::default().to_element(PREFIX));
    let ns = match data.get("ns").filter(|v| !v.is_null()) {
        Some(ns) => nameservers(ns, PREFIX)?,
        None => None,
    };
    let registrant = scalar(data, "registrant")?
        .filter(|r| !r.is_empty())
        .map(|r| Element::text("domain:registrant", r));
    let contacts = contacts(data.get("contact").unwrap_or(&Value::Null))?;

    let create = ctx
        .object_root(PREFIX, "create")?
        .child(name(data)?)
        .child(period)
        .maybe_child(ns)
        .maybe_child(registrant)
        .children(contacts)
        .child(auth_info_or_empty(data, PREFIX)?);
    Ok(Element::new("create").child(create))
}

fn add_or_remove(action: &str, set: &Map<String, Value>) -> CodecResult<Element> {
    let mut el = Element::new(format!("domain:{}", action));
    if let Some(ns) = set.get("ns").filter(|v| !v.is_null()) {
        el = el.maybe_child(nameservers(ns, PREFIX)?);
    }
    if let Some(contact) = set.get("contact") {
        el = el.children(contacts(contact)?);
    }
    if let Some(status) = set.get("status").filter(|v| !v.is_null()) {
        el = el.children(status_elements(status, "domain:status")?);
    }
    Ok(el)
}

pub(super) fn update(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let mut update = ctx.object_root(PREFIX, "update")?.child(name(data)?);

    for action in ["add", "rem"] {
        if let Some(set) = data.get(action).filter(|v| !v.is_null()) {
            let set = set.as_object().ok_or_else(|| {
                CodecError::validation(format!("domain update `{}` must be an object", action))
            })?;
            update.push(add_or_remove(action, set)?);
        }
    }

    if let Some(chg) = data.get("chg").filter(|v| !v.is_null()) {
        let chg = chg
            .as_object()
            .ok_or_else(|| CodecError::validation("domain update `chg` must be an object"))?;
        let registrant = scalar(chg, "registrant")?
            .filter(|r| !r.is_empty())
            .map(|r| Element::text("domain:registrant", r));
        update.push(
            Element::new("domain:chg")
                .maybe_child(registrant)
                .maybe_child(auth_info_if_present(chg, PREFIX)?),
        );
    }

    Ok(Element::new("update").child(update))
}

pub(super) fn renew(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let cur_exp_date = required(data, "curExpDate", "curExpDate")?;
    let renew = ctx
        .object_root(PREFIX, "renew")?
        .child(name(data)?)
        .child(Element::text("domain:curExpDate", cur_exp_date))
        .maybe_child(period(data)?);
    Ok(Element::new("renew").child(renew))
}

pub(super) fn transfer(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let op = transfer_op(data, "domain")?;
    let transfer = ctx
        .object_root(PREFIX, "transfer")?
        .child(name(data)?)
        .maybe_child(period(data)?)
        .child(auth_info_or_empty(data, PREFIX)?);
    Ok(Element::new("transfer").attr("op", op).child(transfer))
}

pub(super) fn delete(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let delete = ctx.object_root(PREFIX, "delete")?.child(name(data)?);
    Ok(Element::new("delete").child(delete))
}
