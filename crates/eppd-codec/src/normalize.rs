//! Field synonym folding.
//!
//! Callers send human-friendly field names (`tel`, `authcode`, `zip`, ...).
//! Each synonym is folded into its canonical EPP field before any builder
//! runs. An already present canonical field is never overwritten, and the
//! synonyms are removed, so folding twice gives the same payload as folding
//! once.

use serde_json::{Map, Value};

use crate::commands::ObjectKind;

pub(crate) const AUTH_INFO: &[&str] = &["authcode", "authCode", "auth_code", "password", "pw"];
const VOICE: &[&str] = &["tel", "telephone", "phone"];
const ORG: &[&str] = &["company", "organization", "organisation"];
const COUNTRY: &[&str] = &["country", "ccode"];
const POSTCODE: &[&str] = &["pcode", "postcode", "zip"];
const STATE: &[&str] = &["state"];
const FIRST_NAME: &[&str] = &["firstname", "first_name"];
const LAST_NAME: &[&str] = &["lastname", "last_name", "surname"];

/// Folds synonyms of `canonical` in `map`.
///
/// The first synonym present wins when the canonical field is missing.
pub fn fold(map: &mut Map<String, Value>, canonical: &str, synonyms: &[&str]) {
    for synonym in synonyms {
        if let Some(value) = map.remove(*synonym)
            && !map.contains_key(canonical)
        {
            map.insert(canonical.to_string(), value);
        }
    }
}

/// Returns the canonical form of a command payload for an object type.
pub fn normalize(kind: ObjectKind, payload: &Map<String, Value>) -> Map<String, Value> {
    let mut map = payload.clone();
    match kind {
        ObjectKind::Domain => {
            fold(&mut map, "name", &["domain"]);
            fold(&mut map, "period", &["interval"]);
            fold(&mut map, "registrant", &["owner"]);
            fold(&mut map, "authInfo", AUTH_INFO);
            if let Some(Value::Object(chg)) = map.get_mut("chg") {
                fold(chg, "registrant", &["owner"]);
                fold(chg, "authInfo", AUTH_INFO);
            }
        }
        ObjectKind::Host => {
            fold(&mut map, "name", &["host"]);
        }
        ObjectKind::Contact => {
            fold(&mut map, "id", &["contact"]);
            normalize_contact_data(&mut map);
            if let Some(Value::Object(chg)) = map.get_mut("chg") {
                normalize_contact_data(chg);
            }
        }
        ObjectKind::Session => {}
    }
    map
}

fn normalize_contact_data(map: &mut Map<String, Value>) {
    fold(map, "voice", VOICE);
    fold(map, "authInfo", AUTH_INFO);
    if let Some(postal_info) = map.get_mut("postalInfo") {
        for_each_object(postal_info, normalize_postal_info);
    }
}

fn normalize_postal_info(map: &mut Map<String, Value>) {
    fold(map, "org", ORG);
    assemble_name(map);
    if let Some(addr) = map.get_mut("addr") {
        for_each_object(addr, |addr| {
            fold(addr, "cc", COUNTRY);
            fold(addr, "pc", POSTCODE);
            fold(addr, "sp", STATE);
        });
    }
}

/// Synthesizes `name` from first and last name fields.
///
/// Nothing happens when `name` is present or when neither part is.
fn assemble_name(map: &mut Map<String, Value>) {
    if map.contains_key("name") {
        return;
    }
    let first = first_string(map, FIRST_NAME);
    let last = first_string(map, LAST_NAME);
    if first.is_empty() && last.is_empty() {
        return;
    }
    map.insert("name".to_string(), Value::String(format!("{} {}", first, last)));
}

fn first_string(map: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| map.get(*key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Applies `f` to an object, or to every object in an array.
fn for_each_object(value: &mut Value, mut f: impl FnMut(&mut Map<String, Value>)) {
    match value {
        Value::Object(map) => f(map),
        Value::Array(items) => {
            for item in items {
                if let Value::Object(map) = item {
                    f(map);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn folds_without_overwriting() {
        let mut map = object(json!({"authInfo": "keep", "authcode": "drop", "pw": "drop"}));
        fold(&mut map, "authInfo", AUTH_INFO);
        assert_eq!(map, object(json!({"authInfo": "keep"})));

        let mut map = object(json!({"zip": "1000", "postcode": "2000"}));
        fold(&mut map, "pc", POSTCODE);
        assert_eq!(map, object(json!({"pc": "2000"})));
    }

    #[test]
    fn domain_synonyms() {
        let map = normalize(
            ObjectKind::Domain,
            &object(json!({
                "domain": "example.com",
                "interval": 2,
                "owner": "P-123",
                "auth_code": "s3cret",
                "chg": {"owner": "P-456", "password": "n3w"}
            })),
        );
        assert_eq!(
            Value::Object(map),
            json!({
                "name": "example.com",
                "period": 2,
                "registrant": "P-123",
                "authInfo": "s3cret",
                "chg": {"registrant": "P-456", "authInfo": "n3w"}
            })
        );
    }

    #[test]
    fn object_specific_identifiers() {
        let host = normalize(ObjectKind::Host, &object(json!({"host": "ns1.example.com"})));
        assert_eq!(host.get("name"), Some(&json!("ns1.example.com")));

        let contact = normalize(ObjectKind::Contact, &object(json!({"contact": "P-1"})));
        assert_eq!(contact.get("id"), Some(&json!("P-1")));

        let domain = normalize(
            ObjectKind::Domain,
            &object(json!({"name": "example.com", "contact": [{"admin": "P-1"}]})),
        );
        assert_eq!(domain.get("contact"), Some(&json!([{"admin": "P-1"}])));
    }

    #[test]
    fn contact_nested_synonyms_and_name() {
        let map = normalize(
            ObjectKind::Contact,
            &object(json!({
                "id": "P-1",
                "telephone": "+1.5555555555",
                "postalInfo": [{
                    "type": "int",
                    "firstname": "John",
                    "surname": "Doe",
                    "company": "Example Ltd",
                    "addr": {"country": "US", "zip": "10001", "state": "NY"}
                }]
            })),
        );
        assert_eq!(map.get("voice"), Some(&json!("+1.5555555555")));
        let postal = &map["postalInfo"][0];
        assert_eq!(postal["name"], "John Doe");
        assert_eq!(postal["org"], "Example Ltd");
        assert_eq!(postal["addr"], json!({"cc": "US", "pc": "10001", "sp": "NY"}));
    }

    #[test]
    fn name_assembly_with_one_part() {
        let mut map = object(json!({"last_name": "Doe"}));
        assemble_name(&mut map);
        assert_eq!(map.get("name"), Some(&json!(" Doe")));

        let mut map = object(json!({"type": "loc"}));
        assemble_name(&mut map);
        assert!(!map.contains_key("name"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let payloads = [
            (
                ObjectKind::Contact,
                json!({
                    "contact": "P-1",
                    "phone": "+1.1",
                    "tel": "+1.2",
                    "pw": "x",
                    "postalInfo": {"first_name": "A", "organisation": "O", "addr": [{"ccode": "NZ"}]},
                    "chg": {"tel": "+1.3", "postalInfo": {"lastname": "B"}}
                }),
            ),
            (
                ObjectKind::Domain,
                json!({"domain": "a.example", "name": "b.example", "interval": {"value": 2}, "authCode": ""}),
            ),
            (ObjectKind::Host, json!({"host": "ns1.example.com", "addr": ["192.0.2.1"]})),
        ];

        for (kind, payload) in payloads {
            let once = normalize(kind, &object(payload));
            let twice = normalize(kind, &once);
            assert_eq!(once, twice, "{:?}", kind);
        }
    }
}
