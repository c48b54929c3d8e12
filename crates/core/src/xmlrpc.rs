//! XML-RPC wire codec: `methodCall` / `methodResponse` / `fault` envelopes
//! and the standard scalar and composite value types.
//!
//! Faults are values, not transport errors. A server answering over HTTP is
//! expected to return a `<fault>` envelope with status 200 whenever a method
//! fails, so the codec models a response as success-or-fault and leaves HTTP
//! status handling to the caller.

use crate::xml::{Element, XmlError};
use base64::Engine;
use chrono::NaiveDateTime;

const DATE_FORMAT: &str = "%Y%m%dT%H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("invalid XML-RPC document: {0}")]
    Invalid(String),
}

/// One XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Bool(bool),
    String(String),
    Double(f64),
    DateTime(NaiveDateTime),
    Base64(Vec<u8>),
    Struct(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Value {
        Value::String(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Member lookup on a struct value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_struct()?
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, value)| value)
    }

    fn to_element(&self) -> Element {
        let mut value = Element::new("value");
        match self {
            Value::Int(n) => {
                value.push_element(Element::with_text("i4", n.to_string()));
            }
            Value::Bool(b) => {
                value.push_element(Element::with_text("boolean", if *b { "1" } else { "0" }));
            }
            Value::String(s) => {
                value.push_element(Element::with_text("string", s.clone()));
            }
            Value::Double(d) => {
                value.push_element(Element::with_text("double", d.to_string()));
            }
            Value::DateTime(dt) => {
                value.push_element(Element::with_text(
                    "dateTime.iso8601",
                    dt.format(DATE_FORMAT).to_string(),
                ));
            }
            Value::Base64(bytes) => {
                value.push_element(Element::with_text(
                    "base64",
                    base64::engine::general_purpose::STANDARD.encode(bytes),
                ));
            }
            Value::Struct(members) => {
                let el = value.push_element(Element::new("struct"));
                for (name, member) in members {
                    let m = el.push_element(Element::new("member"));
                    m.push_element(Element::with_text("name", name.clone()));
                    m.push_element(member.to_element());
                }
            }
            Value::Array(items) => {
                let data = value
                    .push_element(Element::new("array"))
                    .push_element(Element::new("data"));
                for item in items {
                    data.push_element(item.to_element());
                }
            }
        }
        value
    }

    fn from_element(value: &Element) -> Result<Value, RpcError> {
        if value.name != "value" {
            return Err(RpcError::Invalid(format!(
                "expected <value>, found <{}>",
                value.name
            )));
        }
        let Some(inner) = value.elements().next() else {
            // XML-RPC treats a bare <value>text</value> as a string.
            return Ok(Value::String(value.text()));
        };
        let text = inner.text();
        match inner.name.as_str() {
            "i4" | "int" => text
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| RpcError::Invalid(format!("bad integer: {text:?}"))),
            "boolean" => match text.trim() {
                "1" | "true" => Ok(Value::Bool(true)),
                "0" | "false" => Ok(Value::Bool(false)),
                other => Err(RpcError::Invalid(format!("bad boolean: {other:?}"))),
            },
            "string" => Ok(Value::String(text)),
            "double" => text
                .trim()
                .parse()
                .map(Value::Double)
                .map_err(|_| RpcError::Invalid(format!("bad double: {text:?}"))),
            "dateTime.iso8601" => NaiveDateTime::parse_from_str(text.trim(), DATE_FORMAT)
                .map(Value::DateTime)
                .map_err(|_| RpcError::Invalid(format!("bad dateTime: {text:?}"))),
            "base64" => base64::engine::general_purpose::STANDARD
                .decode(text.trim())
                .map(Value::Base64)
                .map_err(|_| RpcError::Invalid("bad base64 payload".to_string())),
            "struct" => {
                let mut members = Vec::new();
                for member in inner.children_named("member") {
                    let name = member
                        .child_text("name")
                        .ok_or_else(|| RpcError::Invalid("member without name".to_string()))?;
                    let value = member
                        .child("value")
                        .ok_or_else(|| RpcError::Invalid("member without value".to_string()))?;
                    members.push((name, Value::from_element(value)?));
                }
                Ok(Value::Struct(members))
            }
            "array" => {
                let data = inner
                    .child("data")
                    .ok_or_else(|| RpcError::Invalid("array without data".to_string()))?;
                let items = data
                    .children_named("value")
                    .map(Value::from_element)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(items))
            }
            other => Err(RpcError::Invalid(format!("unknown value type: {other}"))),
        }
    }
}

/// An incoming or outgoing `methodCall` document.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub name: String,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(name: impl Into<String>, params: Vec<Value>) -> Self {
        MethodCall {
            name: name.into(),
            params,
        }
    }

    pub fn parse(xml: &str) -> Result<MethodCall, RpcError> {
        let root = Element::parse(xml)?;
        if root.name != "methodCall" {
            return Err(RpcError::Invalid(format!(
                "expected <methodCall>, found <{}>",
                root.name
            )));
        }
        let name = root
            .child_text("methodName")
            .ok_or_else(|| RpcError::Invalid("missing methodName".to_string()))?
            .trim()
            .to_string();
        let mut params = Vec::new();
        if let Some(container) = root.child("params") {
            for param in container.children_named("param") {
                let value = param
                    .child("value")
                    .ok_or_else(|| RpcError::Invalid("param without value".to_string()))?;
                params.push(Value::from_element(value)?);
            }
        }
        Ok(MethodCall { name, params })
    }

    pub fn to_xml(&self) -> String {
        let mut root = Element::new("methodCall");
        root.push_element(Element::with_text("methodName", self.name.clone()));
        let params = root.push_element(Element::new("params"));
        for value in &self.params {
            params
                .push_element(Element::new("param"))
                .push_element(value.to_element());
        }
        root.to_xml()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Fault {
            code,
            message: message.into(),
        }
    }
}

/// A `methodResponse`: exactly one return value, or a fault.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault(Fault),
}

impl MethodResponse {
    pub fn parse(xml: &str) -> Result<MethodResponse, RpcError> {
        let root = Element::parse(xml)?;
        if root.name != "methodResponse" {
            return Err(RpcError::Invalid(format!(
                "expected <methodResponse>, found <{}>",
                root.name
            )));
        }
        if let Some(fault) = root.child("fault") {
            let value = fault
                .child("value")
                .ok_or_else(|| RpcError::Invalid("fault without value".to_string()))?;
            let value = Value::from_element(value)?;
            let code = value
                .get("faultCode")
                .and_then(Value::as_i32)
                .ok_or_else(|| RpcError::Invalid("fault without faultCode".to_string()))?;
            let message = value
                .get("faultString")
                .and_then(Value::as_str)
                .ok_or_else(|| RpcError::Invalid("fault without faultString".to_string()))?
                .to_string();
            return Ok(MethodResponse::Fault(Fault { code, message }));
        }
        let value = root
            .child("params")
            .and_then(|params| params.child("param"))
            .and_then(|param| param.child("value"))
            .ok_or_else(|| RpcError::Invalid("response without value or fault".to_string()))?;
        Ok(MethodResponse::Success(Value::from_element(value)?))
    }

    pub fn to_xml(&self) -> String {
        let mut root = Element::new("methodResponse");
        match self {
            MethodResponse::Success(value) => {
                root.push_element(Element::new("params"))
                    .push_element(Element::new("param"))
                    .push_element(value.to_element());
            }
            MethodResponse::Fault(fault) => {
                let value = Value::Struct(vec![
                    ("faultCode".to_string(), Value::Int(fault.code)),
                    ("faultString".to_string(), Value::string(&fault.message)),
                ]);
                root.push_element(Element::new("fault"))
                    .push_element(value.to_element());
            }
        }
        root.to_xml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn round_trip(value: Value) {
        let call = MethodCall::new("echo", vec![value.clone()]);
        let reparsed = MethodCall::parse(&call.to_xml()).unwrap();
        assert_eq!(reparsed.name, "echo");
        assert_eq!(reparsed.params, vec![value]);
    }

    #[test]
    fn test_scalars_round_trip() {
        round_trip(Value::Int(-42));
        round_trip(Value::Bool(true));
        round_trip(Value::Bool(false));
        round_trip(Value::string("a <b> & \"c\""));
        round_trip(Value::Double(3.25));
        round_trip(Value::Base64(vec![0, 1, 2, 254, 255]));
        round_trip(Value::DateTime(
            NaiveDate::from_ymd_opt(2008, 6, 3)
                .unwrap()
                .and_hms_opt(17, 38, 8)
                .unwrap(),
        ));
    }

    #[test]
    fn test_composites_round_trip() {
        round_trip(Value::Struct(vec![
            ("title".to_string(), Value::string("hello")),
            (
                "categories".to_string(),
                Value::Array(vec![Value::string("a"), Value::string("b")]),
            ),
        ]));
        round_trip(Value::Array(vec![]));
    }

    #[test]
    fn test_datetime_wire_format() {
        let dt = NaiveDate::from_ymd_opt(2008, 6, 3)
            .unwrap()
            .and_hms_opt(17, 38, 8)
            .unwrap();
        let xml = MethodCall::new("m", vec![Value::DateTime(dt)]).to_xml();
        assert!(xml.contains("20080603T17:38:08"), "{xml}");
    }

    #[test]
    fn test_bare_value_is_a_string() {
        let xml = r#"<methodCall><methodName>m</methodName>
            <params><param><value>plain text</value></param></params>
            </methodCall>"#;
        let call = MethodCall::parse(xml).unwrap();
        assert_eq!(call.params, vec![Value::string("plain text")]);
    }

    #[test]
    fn test_int_accepts_both_spellings() {
        for tag in ["i4", "int"] {
            let xml = format!(
                "<methodCall><methodName>m</methodName><params><param>\
                 <value><{tag}>7</{tag}></value></param></params></methodCall>"
            );
            let call = MethodCall::parse(&xml).unwrap();
            assert_eq!(call.params, vec![Value::Int(7)]);
        }
    }

    #[test]
    fn test_fault_round_trip() {
        let response = MethodResponse::Fault(Fault::new(405, "unknown method: mt.bogus"));
        let xml = response.to_xml();
        assert!(xml.contains("<fault>"), "{xml}");
        assert_eq!(MethodResponse::parse(&xml).unwrap(), response);
    }

    #[test]
    fn test_success_round_trip() {
        let response = MethodResponse::Success(Value::string("201"));
        assert_eq!(MethodResponse::parse(&response.to_xml()).unwrap(), response);
    }

    #[test]
    fn test_rejects_wrong_root() {
        assert!(MethodCall::parse("<methodResponse/>").is_err());
        assert!(MethodResponse::parse("<methodCall/>").is_err());
    }

    #[test]
    fn test_struct_member_lookup() {
        let value = Value::Struct(vec![
            ("postid".to_string(), Value::string("12")),
            ("count".to_string(), Value::Int(2)),
        ]);
        assert_eq!(value.get("postid").and_then(Value::as_str), Some("12"));
        assert_eq!(value.get("count").and_then(Value::as_i32), Some(2));
        assert_eq!(value.get("missing"), None);
    }
}
