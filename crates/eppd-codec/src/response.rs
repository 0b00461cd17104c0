//! Registry response decoding.
//!
//! A response frame is turned into a JSON value with these rules:
//!
//! - an element becomes an object; its attributes become keys
//! - repeated children with the same name become an array
//! - text becomes a string, or the `$t` key when the element also has
//!   attributes or children
//! - an element without attributes, children or text becomes `{}`
//!
//! Qualified names are kept as written (`domain:name`). Values stay strings.
//!
//! When the document is an `<epp><response>`, the result is reduced to
//! `{result, data, transactionId, msgQ?, extension?}`. Any other `<epp>`
//! body (a `<greeting>`, for instance) is returned as is.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Key under which mixed text content is stored.
pub const TEXT_KEY: &str = "$t";

#[derive(Default)]
struct Node {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Node {
    fn open(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Self, DecodeError> {
        let mut node = Node {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Node::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(|e| malformed(reader, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| malformed(reader, e))?;
            node.fields.insert(key, Value::String(value.into_owned()));
        }
        Ok(node)
    }

    /// Decoded elements are objects or strings, so an array value can only
    /// come from an earlier repetition.
    fn add_child(&mut self, name: String, value: Value) {
        match self.fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.fields.insert(name, value);
            }
        }
    }

    fn close(mut self) -> (String, Value) {
        let value = if self.fields.is_empty() {
            if self.text.is_empty() {
                Value::Object(Map::new())
            } else {
                Value::String(self.text)
            }
        } else {
            if !self.text.is_empty() {
                self.fields
                    .insert(TEXT_KEY.to_string(), Value::String(self.text));
            }
            Value::Object(self.fields)
        };
        (self.name, value)
    }
}

fn malformed(reader: &Reader<&[u8]>, e: impl std::fmt::Display) -> DecodeError {
    DecodeError::Malformed {
        position: reader.buffer_position() as u64,
        message: e.to_string(),
    }
}

/// Parses an XML document into its JSON form, `{<root name>: <root value>}`.
pub fn parse_document(xml: &str) -> Result<Value, DecodeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<(String, Value)> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| malformed(&reader, e))?;
        match event {
            Event::Start(start) => {
                stack.push(Node::open(&start, &reader)?);
            }
            Event::Empty(start) => {
                let (name, value) = Node::open(&start, &reader)?.close();
                match stack.last_mut() {
                    Some(parent) => parent.add_child(name, value),
                    None => root = Some((name, value)),
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| malformed(&reader, "unexpected closing tag"))?;
                let (name, value) = node.close();
                match stack.last_mut() {
                    Some(parent) => parent.add_child(name, value),
                    None => root = Some((name, value)),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| malformed(&reader, e))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(malformed(&reader, "unexpected end of document"));
    }
    let (name, value) = root.ok_or(DecodeError::Empty)?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

/// Decodes a response frame.
pub fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
    let xml = std::str::from_utf8(bytes)?;
    let document = parse_document(xml)?;

    let Some(epp) = document.get("epp") else {
        return Ok(document);
    };
    let Some(response) = epp.get("response").and_then(Value::as_object) else {
        return Ok(epp.clone());
    };

    let mut decoded = Map::new();
    decoded.insert(
        "result".to_string(),
        response.get("result").cloned().unwrap_or(Value::Null),
    );
    decoded.insert(
        "data".to_string(),
        response.get("resData").cloned().unwrap_or(Value::Null),
    );
    decoded.insert(
        "transactionId".to_string(),
        response.get("trID").cloned().unwrap_or(Value::Null),
    );
    for optional in ["msgQ", "extension"] {
        if let Some(value) = response.get(optional) {
            decoded.insert(optional.to_string(), value.clone());
        }
    }
    Ok(Value::Object(decoded))
}

/// Returns the code of the first `<result>` of a decoded response.
pub fn result_code(response: &Value) -> Option<u16> {
    let result = response.get("result")?;
    let first = match result {
        Value::Array(results) => results.first()?,
        other => other,
    };
    match first.get("code")? {
        Value::String(code) => code.parse().ok(),
        Value::Number(code) => code.as_u64().and_then(|c| u16::try_from(c).ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CHECK_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
  <response>
    <result code="1000">
      <msg>Command completed successfully</msg>
    </result>
    <resData>
      <domain:chkData xmlns:domain="urn:ietf:params:xml:ns:domain-1.0">
        <domain:cd>
          <domain:name avail="1">example.com</domain:name>
        </domain:cd>
        <domain:cd>
          <domain:name avail="0">example.net</domain:name>
          <domain:reason>In use</domain:reason>
        </domain:cd>
      </domain:chkData>
    </resData>
    <trID>
      <clTRID>CHECKDOMAIN-1700000000000-0123456789ABCDEF</clTRID>
      <svTRID>54322-XYZ</svTRID>
    </trID>
  </response>
</epp>"#;

    #[test]
    fn decodes_check_response() {
        let decoded = decode(CHECK_RESPONSE.as_bytes()).unwrap();
        insta::assert_json_snapshot!(decoded, @r###"
        {
          "result": {
            "code": "1000",
            "msg": "Command completed successfully"
          },
          "data": {
            "domain:chkData": {
              "xmlns:domain": "urn:ietf:params:xml:ns:domain-1.0",
              "domain:cd": [
                {
                  "domain:name": {
                    "avail": "1",
                    "$t": "example.com"
                  }
                },
                {
                  "domain:name": {
                    "avail": "0",
                    "$t": "example.net"
                  },
                  "domain:reason": "In use"
                }
              ]
            }
          },
          "transactionId": {
            "clTRID": "CHECKDOMAIN-1700000000000-0123456789ABCDEF",
            "svTRID": "54322-XYZ"
          }
        }
        "###);
        assert_eq!(result_code(&decoded), Some(1000));
    }

    #[test]
    fn response_without_res_data_has_null_data() {
        let xml = r#"<epp><response><result code="1500"><msg>Command completed successfully; ending session</msg></result><trID><svTRID>1</svTRID></trID></response></epp>"#;
        let decoded = decode(xml.as_bytes()).unwrap();
        assert_eq!(decoded["data"], Value::Null);
        assert_eq!(result_code(&decoded), Some(1500));
        assert!(decoded.get("msgQ").is_none());
    }

    #[test]
    fn message_queue_is_kept() {
        let xml = r#"<epp><response><result code="1301"><msg>ack to dequeue</msg></result><msgQ count="5" id="12345"><qDate>2000-06-08T22:00:00.0Z</qDate><msg>Transfer requested.</msg></msgQ><trID><svTRID>2</svTRID></trID></response></epp>"#;
        let decoded = decode(xml.as_bytes()).unwrap();
        assert_eq!(decoded["msgQ"]["count"], json!("5"));
        assert_eq!(decoded["msgQ"]["msg"], json!("Transfer requested."));
    }

    #[test]
    fn greeting_is_returned_unchanged() {
        let xml = r#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><greeting><svID>Example EPP server</svID><svDate>2000-06-08T22:00:00.0Z</svDate><dcp><access><all/></access></dcp></greeting></epp>"#;
        let decoded = decode(xml.as_bytes()).unwrap();
        assert_eq!(decoded["greeting"]["svID"], json!("Example EPP server"));
        assert_eq!(decoded["greeting"]["dcp"]["access"]["all"], json!({}));
        assert_eq!(decoded["xmlns"], json!("urn:ietf:params:xml:ns:epp-1.0"));
    }

    #[test]
    fn multiple_results_use_the_first_code() {
        let xml = r#"<epp><response><result code="2004"><msg>a</msg></result><result code="2005"><msg>b</msg></result></response></epp>"#;
        let decoded = decode(xml.as_bytes()).unwrap();
        assert!(decoded["result"].is_array());
        assert_eq!(result_code(&decoded), Some(2004));
    }

    #[test]
    fn three_repeats_form_one_array() {
        let doc = parse_document("<a><b>1</b><b>2</b><b>3</b></a>").unwrap();
        assert_eq!(doc, json!({"a": {"b": ["1", "2", "3"]}}));
    }

    #[test]
    fn entities_are_unescaped() {
        let doc = parse_document(r#"<a t="x &amp; y">&lt;ok&gt;</a>"#).unwrap();
        assert_eq!(doc, json!({"a": {"t": "x & y", "$t": "<ok>"}}));
    }

    #[test]
    fn other_documents_are_returned_whole() {
        let doc = decode(b"<note><to>x</to></note>").unwrap();
        assert_eq!(doc, json!({"note": {"to": "x"}}));
    }

    #[test]
    fn numeric_codes_are_accepted() {
        assert_eq!(result_code(&json!({"result": {"code": 2400}})), Some(2400));
        assert_eq!(result_code(&json!({"result": {"msg": "x"}})), None);
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(matches!(
            decode(b"<epp><response></epp>"),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            decode(b"<epp><response>"),
            Err(DecodeError::Malformed { .. })
        ));
        assert_eq!(decode(b"   "), Err(DecodeError::Empty));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(DecodeError::Encoding(_))));
    }
}
