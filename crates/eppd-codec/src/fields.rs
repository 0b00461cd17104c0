//! Loosely shaped payload fields, modelled as closed sets of variants.
//!
//! The same logical field may arrive as a bare scalar or as an object
//! (`period: 2` or `period: {unit: "m", value: 24}`). Each field type here
//! deserializes from every accepted shape and renders the EPP elements for
//! it.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::element::Element;
use crate::error::{CodecError, CodecResult};

/// A string, number or boolean leaf value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A value that may be given once or as a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

/// Deserializes a field, reporting shape mismatches as validation errors.
pub fn parse<T: DeserializeOwned>(value: &Value, field: &str) -> CodecResult<T> {
    T::deserialize(value).map_err(|e| CodecError::validation(format!("invalid {}: {}", field, e)))
}

/// Deserializes an optional field. `null` counts as absent.
pub fn parse_opt<T: DeserializeOwned>(
    map: &Map<String, Value>,
    field: &str,
) -> CodecResult<Option<T>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse(value, field).map(Some),
    }
}

/// Returns a scalar field as text.
pub fn scalar(map: &Map<String, Value>, field: &str) -> CodecResult<Option<String>> {
    Ok(parse_opt::<Scalar>(map, field)?.map(|s| s.to_string()))
}

/// Returns a scalar field as text, rejecting an absent or empty value.
pub fn required(map: &Map<String, Value>, field: &str, what: &str) -> CodecResult<String> {
    match scalar(map, field)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(CodecError::validation(format!("{} is required", what))),
    }
}

/// JavaScript-style truthiness, used for flags sent by loosely typed callers.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// Registration period: a year count, or an explicit unit and value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Period {
    Years(Scalar),
    Explicit {
        #[serde(default)]
        unit: Option<String>,
        #[serde(default)]
        value: Option<Scalar>,
    },
}

/// A period with its defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPeriod {
    pub unit: String,
    pub value: Scalar,
}

impl Default for ResolvedPeriod {
    fn default() -> Self {
        Self {
            unit: "y".to_string(),
            value: Scalar::Number(1.into()),
        }
    }
}

impl Period {
    pub fn resolve(self) -> ResolvedPeriod {
        let default = ResolvedPeriod::default();
        match self {
            Self::Years(value) => ResolvedPeriod {
                value,
                ..default
            },
            Self::Explicit { unit, value } => ResolvedPeriod {
                unit: unit.filter(|u| !u.is_empty()).unwrap_or(default.unit),
                value: value.unwrap_or(default.value),
            },
        }
    }
}

impl ResolvedPeriod {
    pub fn to_element(&self, prefix: &str) -> Element {
        Element::text(format!("{}:period", prefix), self.value.to_string()).attr("unit", &self.unit)
    }
}

// ---------------------------------------------------------------------------
// Addresses and nameservers
// ---------------------------------------------------------------------------

/// An IP address: bare (IPv4) or with an explicit family.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IpAddress {
    Bare(String),
    Explicit {
        #[serde(default)]
        ip: Option<String>,
        #[serde(default, rename = "type")]
        family: Option<String>,
    },
}

impl IpAddress {
    pub fn to_element(&self, name: &str) -> CodecResult<Element> {
        let (ip, family) = match self {
            Self::Bare(ip) => (ip.as_str(), "v4"),
            Self::Explicit { ip, family } => {
                let ip = ip
                    .as_deref()
                    .filter(|ip| !ip.is_empty())
                    .ok_or_else(|| CodecError::validation("Nameserver object missing IP"))?;
                (ip, family.as_deref().unwrap_or("v4"))
            }
        };
        Ok(Element::text(name, ip).attr("ip", family))
    }
}

/// Renders an address set (one address or a list) as `name` elements.
pub fn addr_elements(value: &Value, name: &str) -> CodecResult<Vec<Element>> {
    parse::<OneOrMany<IpAddress>>(value, "addr")?
        .into_vec()
        .iter()
        .map(|addr| addr.to_element(name))
        .collect()
}

/// One nameserver entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Nameserver {
    HostObj(String),
    HostAttr {
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        addr: Option<Value>,
    },
}

/// Renders a nameserver set as `<prefix:ns>`.
///
/// The first entry decides the representation: host names give `hostObj`
/// references, `{host, addr}` objects give `hostAttr` glue records. An entry
/// of the other shape is rejected.
pub fn nameservers(value: &Value, prefix: &str) -> CodecResult<Option<Element>> {
    let entries = parse::<OneOrMany<Nameserver>>(value, "ns")?.into_vec();
    let Some(first) = entries.first() else {
        return Ok(None);
    };
    let host_obj = matches!(first, Nameserver::HostObj(_));

    let mut ns = Element::new(format!("{}:ns", prefix));
    for entry in &entries {
        match (entry, host_obj) {
            (Nameserver::HostObj(host), true) => {
                ns.push(Element::text(format!("{}:hostObj", prefix), host));
            }
            (Nameserver::HostAttr { host, addr }, false) => {
                let host = host
                    .as_deref()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| CodecError::validation("Host required in nameserver object!"))?;
                let mut attr = Element::new(format!("{}:hostAttr", prefix))
                    .child(Element::text(format!("{}:hostName", prefix), host));
                if let Some(addr) = addr.as_ref().filter(|a| !a.is_null()) {
                    attr = attr.children(addr_elements(addr, &format!("{}:hostAddr", prefix))?);
                }
                ns.push(attr);
            }
            _ => {
                return Err(CodecError::validation(
                    "Nameserver list mixes host names and host objects; the first entry decides the form",
                ));
            }
        }
    }
    Ok(Some(ns))
}

// ---------------------------------------------------------------------------
// AuthInfo
// ---------------------------------------------------------------------------

/// Authorization secret: bare, or `{pw, roid}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AuthInfo {
    Secret(Scalar),
    Object {
        #[serde(default)]
        pw: Option<Scalar>,
        #[serde(default)]
        roid: Option<String>,
    },
}

impl AuthInfo {
    /// Renders `<prefix:authInfo><prefix:pw>…</prefix:pw></prefix:authInfo>`.
    pub fn to_element(&self, prefix: &str) -> CodecResult<Element> {
        let pw_name = format!("{}:pw", prefix);
        let pw = match self {
            Self::Secret(secret) => Element::text(pw_name, secret.to_string()),
            Self::Object { pw, roid } => {
                let pw = pw.as_ref().ok_or_else(|| CodecError::validation("pw is required!"))?;
                let el = Element::text(pw_name, pw.to_string());
                match roid.as_deref().filter(|r| !r.is_empty()) {
                    Some(roid) => el.attr("roid", roid),
                    None => el,
                }
            }
        };
        Ok(Element::new(format!("{}:authInfo", prefix)).child(pw))
    }
}

/// Renders `authInfo`, with an empty secret when the field is absent.
///
/// Used by create and transfer, where the element is mandatory.
pub fn auth_info_or_empty(map: &Map<String, Value>, prefix: &str) -> CodecResult<Element> {
    let auth = parse_opt::<AuthInfo>(map, "authInfo")?
        .unwrap_or_else(|| AuthInfo::Secret(Scalar::String(String::new())));
    auth.to_element(prefix)
}

/// Renders `authInfo` only when the field is present.
pub fn auth_info_if_present(map: &Map<String, Value>, prefix: &str) -> CodecResult<Option<Element>> {
    parse_opt::<AuthInfo>(map, "authInfo")?
        .map(|auth| auth.to_element(prefix))
        .transpose()
}

// ---------------------------------------------------------------------------
// Status and attributed values
// ---------------------------------------------------------------------------

/// A bare value, or an object whose `value` key is the text and whose other
/// keys are attributes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Attributed {
    Bare(Scalar),
    Detailed(Map<String, Value>),
}

impl Attributed {
    fn detailed_element(name: &str, map: &Map<String, Value>) -> Element {
        let mut el = Element::new(name);
        for (key, value) in map {
            if key != "value" {
                el = el.attr(key.as_str(), value_text(value));
            }
        }
        match map.get("value").filter(|v| !v.is_null()) {
            Some(value) => Element {
                content: crate::element::Content::Text(value_text(value)),
                ..el
            },
            None => el,
        }
    }

    /// Renders a text element (`voice`, `fax`, ...).
    pub fn to_text_element(&self, name: &str) -> Element {
        match self {
            Self::Bare(value) => Element::text(name, value.to_string()),
            Self::Detailed(map) => Self::detailed_element(name, map),
        }
    }

    /// Renders a status element: a bare value becomes the `s` attribute.
    pub fn to_status_element(&self, name: &str) -> Element {
        match self {
            Self::Bare(status) => Element::new(name).attr("s", status.to_string()),
            Self::Detailed(map) => Self::detailed_element(name, map),
        }
    }
}

/// Renders a status set (one status or a list).
pub fn status_elements(value: &Value, name: &str) -> CodecResult<Vec<Element>> {
    Ok(parse::<OneOrMany<Attributed>>(value, "status")?
        .into_vec()
        .iter()
        .map(|status| status.to_status_element(name))
        .collect())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Disclose
// ---------------------------------------------------------------------------

/// A disclosed field: a bare name or `{name, type}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DiscloseField {
    Name(String),
    Typed {
        name: String,
        #[serde(default, rename = "type")]
        kind: Option<String>,
    },
}

/// Contact disclosure preferences.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Disclose {
    #[serde(default)]
    pub flag: Value,
    #[serde(default)]
    pub disclosing: Vec<DiscloseField>,
}

impl Disclose {
    pub fn to_element(&self, prefix: &str) -> Element {
        let flag = if truthy(&self.flag) { "1" } else { "0" };
        let mut el = Element::new(format!("{}:disclose", prefix)).attr("flag", flag);
        for field in &self.disclosing {
            el.push(match field {
                DiscloseField::Name(name) => Element::new(format!("{}:{}", prefix, name)),
                DiscloseField::Typed { name, kind } => {
                    let child = Element::new(format!("{}:{}", prefix, name));
                    match kind {
                        Some(kind) => child.attr("type", kind),
                        None => child,
                    }
                }
            });
        }
        el
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn period(value: Value) -> Value {
        let period: Period = parse(&value, "period").unwrap();
        serde_json::to_value(period.resolve()).unwrap()
    }

    #[test]
    fn period_encoding() {
        assert_eq!(period(json!(3)), json!({"unit": "y", "value": 3}));
        assert_eq!(period(json!("3")), json!({"unit": "y", "value": "3"}));
        assert_eq!(
            period(json!({"unit": "m", "value": 12})),
            json!({"unit": "m", "value": 12})
        );
        assert_eq!(period(json!({"value": 2})), json!({"unit": "y", "value": 2}));
        assert_eq!(period(json!({})), json!({"unit": "y", "value": 1}));
    }

    #[test]
    fn auth_info_variants() {
        let empty: AuthInfo = parse(&json!(""), "authInfo").unwrap();
        let el = empty.to_element("domain").unwrap();
        assert_eq!(el.find("domain:pw").and_then(Element::text_content), Some(""));
        assert_eq!(
            el.to_xml().unwrap(),
            "<domain:authInfo><domain:pw></domain:pw></domain:authInfo>"
        );

        let with_roid: AuthInfo = parse(&json!({"pw": "x", "roid": "R1"}), "authInfo").unwrap();
        let el = with_roid.to_element("domain").unwrap();
        let pw = el.find("domain:pw").unwrap();
        assert_eq!(pw.text_content(), Some("x"));
        assert_eq!(pw.attribute("roid"), Some("R1"));

        let missing: AuthInfo = parse(&json!({}), "authInfo").unwrap();
        assert_eq!(
            missing.to_element("domain").unwrap_err(),
            CodecError::validation("pw is required!")
        );

        let number: AuthInfo = parse(&json!(1234), "authInfo").unwrap();
        let el = number.to_element("contact").unwrap();
        assert_eq!(el.path(&["contact:pw"]).and_then(Element::text_content), Some("1234"));
    }

    #[test]
    fn ip_addresses() {
        let els = addr_elements(&json!("192.0.2.1"), "host:addr").unwrap();
        assert_eq!(els[0].attribute("ip"), Some("v4"));

        let els = addr_elements(
            &json!([{"ip": "2001:db8::1", "type": "v6"}, "192.0.2.2"]),
            "host:addr",
        )
        .unwrap();
        assert_eq!(els.len(), 2);
        assert_eq!(els[0].attribute("ip"), Some("v6"));
        assert_eq!(els[0].text_content(), Some("2001:db8::1"));

        let err = addr_elements(&json!({"type": "v6"}), "host:addr").unwrap_err();
        assert_eq!(err, CodecError::validation("Nameserver object missing IP"));
    }

    #[test]
    fn nameserver_host_objects() {
        let ns = nameservers(&json!(["ns1.example.net", "ns2.example.net"]), "domain")
            .unwrap()
            .unwrap();
        let hosts: Vec<_> = ns
            .find_all("domain:hostObj")
            .filter_map(Element::text_content)
            .collect();
        assert_eq!(hosts, ["ns1.example.net", "ns2.example.net"]);
    }

    #[test]
    fn nameserver_host_attributes() {
        let ns = nameservers(
            &json!([{"host": "ns1.example.com", "addr": ["192.0.2.1", {"ip": "2001:db8::1", "type": "v6"}]}]),
            "domain",
        )
        .unwrap()
        .unwrap();
        let attr = ns.find("domain:hostAttr").unwrap();
        assert_eq!(
            attr.find("domain:hostName").and_then(Element::text_content),
            Some("ns1.example.com")
        );
        assert_eq!(attr.find_all("domain:hostAddr").count(), 2);
    }

    #[test]
    fn nameserver_errors() {
        let err = nameservers(&json!([{"addr": "192.0.2.1"}]), "domain").unwrap_err();
        assert_eq!(err, CodecError::validation("Host required in nameserver object!"));

        let err = nameservers(&json!(["ns1.example.net", {"host": "ns2.example.net"}]), "domain")
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        assert!(nameservers(&json!([]), "domain").unwrap().is_none());
    }

    #[test]
    fn status_shapes() {
        let els = status_elements(
            &json!(["clientHold", {"s": "clientUpdateProhibited", "lang": "en", "value": "locked"}]),
            "domain:status",
        )
        .unwrap();
        assert_eq!(els[0].to_xml().unwrap(), "<domain:status s=\"clientHold\"/>");
        assert_eq!(
            els[1].to_xml().unwrap(),
            "<domain:status s=\"clientUpdateProhibited\" lang=\"en\">locked</domain:status>"
        );
    }

    #[test]
    fn disclose_flags() {
        let disclose: Disclose = parse(
            &json!({"flag": 0, "disclosing": ["voice", {"name": "name", "type": "int"}]}),
            "disclose",
        )
        .unwrap();
        assert_eq!(
            disclose.to_element("contact").to_xml().unwrap(),
            "<contact:disclose flag=\"0\"><contact:voice/><contact:name type=\"int\"/></contact:disclose>"
        );

        let disclose: Disclose = parse(&json!({"flag": true}), "disclose").unwrap();
        assert_eq!(disclose.to_element("contact").attribute("flag"), Some("1"));
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!(2)));
    }
}
