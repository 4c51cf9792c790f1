//! Minimal XML-RPC codec: request encoding and response decoding.
//!
//! Only what subtitle services use is supported. `dateTime.iso8601` and
//! `base64` are kept as plain strings.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::{Result, SubseekError};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a struct member
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(key),
            _ => None,
        }
    }

    /// Struct member rendered as text, whatever its scalar type
    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Double(d) => Some(d.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<const N: usize> From<[(&str, Value); N]> for Value {
    fn from(members: [(&str, Value); N]) -> Self {
        Value::Struct(
            members
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

/// Encode a `methodCall` document
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    xml.push_str(&escape(method));
    xml.push_str("</methodName><params>");
    for param in params {
        xml.push_str("<param>");
        encode_value(&mut xml, param);
        xml.push_str("</param>");
    }
    xml.push_str("</params></methodCall>");
    xml
}

fn encode_value(xml: &mut String, value: &Value) {
    xml.push_str("<value>");
    match value {
        Value::Int(i) => {
            let _ = write!(xml, "<int>{}</int>", i);
        }
        Value::Bool(b) => {
            let _ = write!(xml, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::Double(d) => {
            let _ = write!(xml, "<double>{}</double>", d);
        }
        Value::String(s) => {
            let _ = write!(xml, "<string>{}</string>", escape(s.as_str()));
        }
        Value::Array(items) => {
            xml.push_str("<array><data>");
            for item in items {
                encode_value(xml, item);
            }
            xml.push_str("</data></array>");
        }
        Value::Struct(members) => {
            xml.push_str("<struct>");
            for (name, member) in members {
                let _ = write!(xml, "<member><name>{}</name>", escape(name.as_str()));
                encode_value(xml, member);
                xml.push_str("</member>");
            }
            xml.push_str("</struct>");
        }
        Value::Nil => xml.push_str("<nil/>"),
    }
    xml.push_str("</value>");
}

/// Decode a `methodResponse` document into its single return value.
///
/// A `<fault>` response becomes a [`SubseekError::RemoteProtocol`].
pub fn decode_response(body: &str) -> Result<Value> {
    let root = parse_tree(body)?;
    if root.name != "methodResponse" {
        return Err(protocol_error(format!("unexpected root element <{}>", root.name)));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .map(decode_value)
            .transpose()?
            .unwrap_or(Value::Nil);
        let code = value.get_text("faultCode").unwrap_or_default();
        let message = value.get_text("faultString").unwrap_or_default();
        return Err(protocol_error(format!("fault {}: {}", code, message)));
    }

    let value = root
        .child("params")
        .and_then(|params| params.child("param"))
        .and_then(|param| param.child("value"))
        .ok_or_else(|| protocol_error("response has no return value".to_string()))?;

    decode_value(value)
}

fn protocol_error(message: String) -> SubseekError {
    SubseekError::RemoteProtocol(format!("XML-RPC: {}", message))
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn parse_tree(body: &str) -> Result<Element> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ..Default::default()
                });
            }
            Event::Empty(e) => {
                let element = Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ..Default::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| protocol_error("unbalanced closing tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| protocol_error("empty document".to_string()))
}

fn decode_value(element: &Element) -> Result<Value> {
    let Some(typed) = element.children.first() else {
        // A bare <value>text</value> is a string
        return Ok(Value::String(element.text.clone()));
    };

    let text = typed.text.trim();
    let value = match typed.name.as_str() {
        "int" | "i4" | "i8" => Value::Int(
            text.parse()
                .map_err(|_| protocol_error(format!("invalid integer '{}'", text)))?,
        ),
        "boolean" => Value::Bool(text == "1" || text.eq_ignore_ascii_case("true")),
        "double" => Value::Double(
            text.parse()
                .map_err(|_| protocol_error(format!("invalid double '{}'", text)))?,
        ),
        "string" | "dateTime.iso8601" | "base64" => Value::String(typed.text.clone()),
        "nil" => Value::Nil,
        "array" => {
            let items = match typed.child("data") {
                Some(data) => data
                    .children
                    .iter()
                    .filter(|c| c.name == "value")
                    .map(decode_value)
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            Value::Array(items)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member
                    .child("name")
                    .map(|n| n.text.clone())
                    .ok_or_else(|| protocol_error("struct member without name".to_string()))?;
                let value = member
                    .child("value")
                    .map(decode_value)
                    .transpose()?
                    .unwrap_or(Value::Nil);
                members.insert(name, value);
            }
            Value::Struct(members)
        }
        other => return Err(protocol_error(format!("unsupported value type <{}>", other))),
    };

    Ok(value)
}
