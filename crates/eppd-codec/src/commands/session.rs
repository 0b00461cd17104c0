use serde_json::{Map, Value};

use super::BuildContext;
use crate::element::Element;
use crate::error::CodecResult;
use crate::fields::{required, scalar};

/// `<login>`: clID, pw, newPW, options, svcs.
pub(super) fn login(ctx: &BuildContext<'_>, data: &Map<String, Value>) -> CodecResult<Element> {
    let login = required(data, "login", "login")?;
    let password = required(data, "password", "password")?;
    let new_password = match scalar(data, "newPassword")? {
        Some(pw) => Some(pw),
        None => scalar(data, "newPW")?,
    };

    let mut svcs = Element::new("svcs");
    for service in ctx.services {
        svcs.push(Element::text("objURI", ctx.xmlns(service)?));
    }
    if !ctx.extensions.is_empty() {
        let mut ext = Element::new("svcExtension");
        for extension in ctx.extensions {
            ext.push(Element::text("extURI", ctx.xmlns(extension)?));
        }
        svcs.push(ext);
    }

    Ok(Element::new("login")
        .child(Element::text("clID", login))
        .child(Element::text("pw", password))
        .maybe_child(new_password.map(|pw| Element::text("newPW", pw)))
        .child(
            Element::new("options")
                .child(Element::text("version", "1.0"))
                .child(Element::text("lang", "en")),
        )
        .child(svcs))
}

/// `<poll op="req"/>`, or `op="ack"` when a message id is given.
pub(super) fn poll(data: &Map<String, Value>) -> CodecResult<Element> {
    let msg_id = scalar(data, "msgID")?.filter(|id| !id.is_empty());
    let op = match scalar(data, "op")?.filter(|op| !op.is_empty()) {
        Some(op) => op,
        None if msg_id.is_some() => "ack".to_string(),
        None => "req".to_string(),
    };

    let poll = Element::new("poll").attr("op", op);
    Ok(match msg_id {
        Some(id) => poll.attr("msgID", id),
        None => poll,
    })
}
