//! Contact commands (RFC 5733).

use serde_json::{Map, Value};

use super::{BuildContext, identifiers, transfer_op};
use crate::element::Element;
use crate::error::{CodecError, CodecResult};
use crate::fields::{
    Attributed, Disclose, OneOrMany, auth_info_if_present, auth_info_or_empty, parse, parse_opt,
    required, scalar, status_elements,
};

const PREFIX: &str = "contact";

fn id(data: &Map<String, Value>) -> CodecResult<Element> {
    Ok(Element::text("contact:id", required(data, "id", "contact id")?))
}

fn objects<'a>(value: &'a Value, field: &str) -> CodecResult<Vec<&'a Map<String, Value>>> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| CodecError::validation(format!("{} must be an object", field)))
        })
        .collect()
}

fn address(addr: &Map<String, Value>) -> CodecResult<Element> {
    let mut el = Element::new("contact:addr");
    if let Some(street) = addr.get("street").filter(|v| !v.is_null()) {
        for line in parse::<OneOrMany<String>>(street, "street")?.into_vec() {
            el.push(Element::text("contact:street", line));
        }
    }
    for field in ["city", "sp", "pc", "cc"] {
        if let Some(value) = scalar(addr, field)?.filter(|v| !v.is_empty()) {
            el.push(Element::text(format!("contact:{}", field), value));
        }
    }
    Ok(el)
}

fn postal_info(info: &Map<String, Value>) -> CodecResult<Element> {
    let mut el = Element::new("contact:postalInfo");
    if let Some(kind) = scalar(info, "type")? {
        el = el.attr("type", kind);
    }
    for field in ["name", "org"] {
        if let Some(value) = scalar(info, field)?.filter(|v| !v.is_empty()) {
            el.push(Element::text(format!("contact:{}", field), value));
        }
    }
    if let Some(addr) = info.get("addr").filter(|v| !v.is_null()) {
        for addr in objects(addr, "addr")? {
            el.push(address(addr)?);
        }
    }
    Ok(el)
}

/// Renders postalInfo, voice, fax, email, authInfo and disclose.
///
/// `create` requires postalInfo and always sends authInfo; `chg` sends
/// whatever is present.
fn contact_data(data: &Map<String, Value>, creating: bool) -> CodecResult<Vec<Element>> {
    let mut elements = Vec::new();

    match data.get("postalInfo").filter(|v| !v.is_null()) {
        Some(info) => {
            for info in objects(info, "postalInfo")? {
                elements.push(postal_info(info)?);
            }
        }
        None if creating => {
            return Err(CodecError::validation("postalInfo required in contact data."));
        }
        None => {}
    }

    for field in ["voice", "fax", "email"] {
        if let Some(value) = parse_opt::<Attributed>(data, field)? {
            elements.push(value.to_text_element(&format!("contact:{}", field)));
        }
    }

    if creating {
        elements.push(auth_info_or_empty(data, PREFIX)?);
    } else if let Some(auth) = auth_info_if_present(data, PREFIX)? {
        elements.push(auth);
    }

    if let Some(disclose) = parse_opt::<Disclose>(data, "disclose")? {
        elements.push(disclose.to_element(PREFIX));
    }
    Ok(elements)
}

pub(super) fn check(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let check = ctx
        .object_root(PREFIX, "check")?
        .children(identifiers(data, "id", "contact:id", "contact id")?);
    Ok(Element::new("check").child(check))
}

pub(super) fn info(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let info = ctx
        .object_root(PREFIX, "info")?
        .child(id(data)?)
        .maybe_child(auth_info_if_present(data, PREFIX)?);
    Ok(Element::new("info").child(info))
}

pub(super) fn create(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let create = ctx
        .object_root(PREFIX, "create")?
        .child(id(data)?)
        .children(contact_data(data, true)?);
    Ok(Element::new("create").child(create))
}

pub(super) fn update(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let mut update = ctx.object_root(PREFIX, "update")?.child(id(data)?);

    for action in ["add", "rem"] {
        if let Some(statuses) = data.get(action).filter(|v| !v.is_null()) {
            // `{"status": [...]}` and a bare list are both accepted.
            let statuses = match statuses {
                Value::Object(set) => set.get("status").unwrap_or(&Value::Null),
                other => other,
            };
            let mut el = Element::new(format!("contact:{}", action));
            if !statuses.is_null() {
                el = el.children(status_elements(statuses, "contact:status")?);
            }
            update.push(el);
        }
    }

    if let Some(chg) = data.get("chg").filter(|v| !v.is_null()) {
        let chg = chg
            .as_object()
            .ok_or_else(|| CodecError::validation("contact update `chg` must be an object"))?;
        update.push(Element::new("contact:chg").children(contact_data(chg, false)?));
    }

    Ok(Element::new("update").child(update))
}

pub(super) fn transfer(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let op = transfer_op(data, "contact")?;
    let transfer = ctx
        .object_root(PREFIX, "transfer")?
        .child(id(data)?)
        .child(auth_info_or_empty(data, PREFIX)?);
    Ok(Element::new("transfer").attr("op", op).child(transfer))
}

pub(super) fn delete(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let delete = ctx.object_root(PREFIX, "delete")?.child(id(data)?);
    Ok(Element::new("delete").child(delete))
}
