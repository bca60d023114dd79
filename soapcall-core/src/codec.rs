//! Envelope encoding and decoding.
//!
//! The client treats the codec as a black box: `encode` turns a logical call into
//! request bytes plus the action to advertise, `decode` turns response bytes into a
//! value tree or a fault. [`XmlCodec`] is the bundled RPC-style implementation.

use crate::call::{LogicalCall, SoapHeader, SoapVersion};
use crate::error::{Fault, SoapError};
use crate::value::{is_typed_wrapper, typed, ENC_TYPE, ENC_VALUE};
use crate::xml::{self, XmlNode, XSI_NAMESPACE};
use bytes::Bytes;
use quick_xml::escape::escape;
use serde_json::{Map, Value};
use tracing::trace;

const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Inputs the codec needs besides the call itself.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub namespace: &'a str,
    pub version: SoapVersion,
    /// Explicit action; `None` falls back to `<namespace>#<method>`.
    pub action: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRequest {
    pub body: Bytes,
    pub action: String,
}

/// What the codec sees of a completed exchange.
#[derive(Debug, Clone, Copy)]
pub struct ResponseView<'a> {
    pub status: Option<u16>,
    pub reason: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    pub headers: Vec<Value>,
}

pub trait Codec: Send + Sync {
    fn encode(&self, call: &LogicalCall, ctx: &EncodeContext<'_>) -> Result<EncodedRequest, SoapError>;

    fn decode(&self, response: &ResponseView<'_>) -> Result<Decoded, SoapError>;
}

/// RPC-style SOAP 1.1/1.2 envelope codec.
#[derive(Debug, Clone, Copy)]
pub struct XmlCodec {
    /// Annotate scalar arguments with `xsi:type`.
    pub encode_types: bool,
}

impl XmlCodec {
    pub fn new() -> Self {
        XmlCodec { encode_types: true }
    }

    pub fn untyped() -> Self {
        XmlCodec {
            encode_types: false,
        }
    }

    fn scalar_type(value: &Value) -> Option<&'static str> {
        match value {
            Value::Bool(_) => Some("xsd:boolean"),
            Value::String(_) => Some("xsd:string"),
            Value::Number(n) => match n.as_i64() {
                Some(i) if i32::try_from(i).is_ok() => Some("xsd:int"),
                Some(_) => Some("xsd:long"),
                None if n.is_u64() => Some("xsd:unsignedLong"),
                None => Some("xsd:double"),
            },
            _ => None,
        }
    }

    fn write_element(&self, out: &mut String, tag: &str, extra_attrs: &str, value: &Value) {
        if is_typed_wrapper(value) {
            let enc_type = value.get(ENC_TYPE).and_then(Value::as_str);
            let inner = value.get(ENC_VALUE).unwrap_or(&Value::Null);
            let type_attr = enc_type
                .map(|t| format!(" xsi:type=\"{}\"", escape(t)))
                .unwrap_or_default();
            let attrs = format!("{}{}", extra_attrs, type_attr);
            self.write_body(out, tag, &attrs, inner);
            return;
        }

        let type_attr = if self.encode_types {
            Self::scalar_type(value)
                .map(|t| format!(" xsi:type=\"{}\"", t))
                .unwrap_or_default()
        } else {
            String::new()
        };
        let attrs = format!("{}{}", extra_attrs, type_attr);
        self.write_body(out, tag, &attrs, value);
    }

    fn write_body(&self, out: &mut String, tag: &str, attrs: &str, value: &Value) {
        match value {
            Value::Null => {
                out.push_str(&format!("<{}{} xsi:nil=\"true\"/>", tag, attrs));
            }
            Value::Bool(b) => {
                out.push_str(&format!("<{tag}{attrs}>{}</{tag}>", b));
            }
            Value::Number(n) => {
                out.push_str(&format!("<{tag}{attrs}>{}</{tag}>", n));
            }
            Value::String(s) => {
                out.push_str(&format!("<{tag}{attrs}>{}</{tag}>", escape(s.as_str())));
            }
            Value::Array(items) => {
                out.push_str(&format!("<{}{}>", tag, attrs));
                for item in items {
                    self.write_element(out, "item", "", item);
                }
                out.push_str(&format!("</{}>", tag));
            }
            Value::Object(map) => {
                out.push_str(&format!("<{}{}>", tag, attrs));
                for (key, item) in map {
                    self.write_element(out, key, "", item);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }

    fn write_header(&self, out: &mut String, index: usize, header: &SoapHeader, version: SoapVersion) {
        let prefix = format!("ns{}", index + 2);
        let mut attrs = format!(" xmlns:{}=\"{}\"", prefix, escape(header.namespace.as_str()));
        if header.must_understand {
            let flag = match version {
                SoapVersion::Soap11 => "1",
                SoapVersion::Soap12 => "true",
            };
            attrs.push_str(&format!(" SOAP-ENV:mustUnderstand=\"{}\"", flag));
        }
        if let Some(actor) = &header.actor {
            let attr = match version {
                SoapVersion::Soap11 => "actor",
                SoapVersion::Soap12 => "role",
            };
            attrs.push_str(&format!(" SOAP-ENV:{}=\"{}\"", attr, escape(actor.as_str())));
        }
        let tag = format!("{}:{}", prefix, header.name);
        self.write_element(out, &tag, &attrs, &header.value);
    }
}

/// A request envelope as seen by the answering side.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRequest {
    pub method: String,
    pub namespace: Option<String>,
    pub args: Vec<Value>,
    pub headers: Vec<Value>,
}

impl XmlCodec {
    fn envelope_open(out: &mut String, version: SoapVersion, namespace: Option<&str>) {
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<SOAP-ENV:Envelope xmlns:SOAP-ENV=\"{}\" xmlns:xsd=\"{}\" xmlns:xsi=\"{}\"",
            version.envelope_namespace(),
            XSD_NAMESPACE,
            XSI_NAMESPACE,
        ));
        if let Some(namespace) = namespace {
            out.push_str(&format!(" xmlns:ns1=\"{}\"", escape(namespace)));
        }
        out.push_str("><SOAP-ENV:Body>");
    }

    /// Envelope answering `method` with a single `return` part.
    pub fn encode_response(
        &self,
        method: &str,
        namespace: &str,
        value: &Value,
        version: SoapVersion,
    ) -> Bytes {
        let mut out = String::with_capacity(512);
        Self::envelope_open(&mut out, version, Some(namespace));
        let tag = format!("ns1:{}Response", method);
        out.push_str(&format!("<{}>", tag));
        self.write_element(&mut out, "return", "", value);
        out.push_str(&format!("</{}>", tag));
        out.push_str("</SOAP-ENV:Body></SOAP-ENV:Envelope>\n");
        Bytes::from(out)
    }

    pub fn encode_fault(&self, fault: &Fault, version: SoapVersion) -> Bytes {
        let mut out = String::with_capacity(512);
        Self::envelope_open(&mut out, version, None);
        out.push_str("<SOAP-ENV:Fault>");
        match version {
            SoapVersion::Soap11 => {
                out.push_str(&format!(
                    "<faultcode>SOAP-ENV:{}</faultcode><faultstring>{}</faultstring>",
                    escape(fault.code.as_str()),
                    escape(fault.message.as_str())
                ));
                if let Some(actor) = &fault.actor {
                    out.push_str(&format!("<faultactor>{}</faultactor>", escape(actor.as_str())));
                }
                if let Some(detail) = &fault.detail {
                    self.write_body(&mut out, "detail", "", detail);
                }
            }
            SoapVersion::Soap12 => {
                out.push_str(&format!(
                    "<SOAP-ENV:Code><SOAP-ENV:Value>SOAP-ENV:{}</SOAP-ENV:Value></SOAP-ENV:Code>\
                     <SOAP-ENV:Reason><SOAP-ENV:Text>{}</SOAP-ENV:Text></SOAP-ENV:Reason>",
                    escape(fault.code.as_str()),
                    escape(fault.message.as_str())
                ));
                if let Some(actor) = &fault.actor {
                    out.push_str(&format!("<SOAP-ENV:Role>{}</SOAP-ENV:Role>", escape(actor.as_str())));
                }
                if let Some(detail) = &fault.detail {
                    self.write_body(&mut out, "SOAP-ENV:Detail", "", detail);
                }
            }
        }
        out.push_str("</SOAP-ENV:Fault></SOAP-ENV:Body></SOAP-ENV:Envelope>\n");
        Bytes::from(out)
    }

    /// Read the method name and arguments out of a request envelope.
    pub fn decode_request(&self, body: &[u8]) -> Result<DecodedRequest, SoapError> {
        let envelope = xml::parse_document(body)?;
        if envelope.name != "Envelope" {
            return Err(SoapError::codec(format!(
                "expected Envelope, found <{}>",
                envelope.name
            )));
        }
        let method = envelope
            .child("Body")
            .and_then(|body| body.children.first())
            .ok_or_else(|| SoapError::codec("request has no method element"))?;
        let headers = envelope
            .child("Header")
            .map(|header| {
                header
                    .children
                    .iter()
                    .map(|block| {
                        let mut map = Map::new();
                        map.insert(block.name.clone(), crate::value::unwrap_typed(node_to_value(block)));
                        Value::Object(map)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(DecodedRequest {
            method: method.name.clone(),
            namespace: method.namespace.clone(),
            args: method
                .children
                .iter()
                .map(|arg| crate::value::unwrap_typed(node_to_value(arg)))
                .collect(),
            headers,
        })
    }
}

impl Default for XmlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for XmlCodec {
    fn encode(&self, call: &LogicalCall, ctx: &EncodeContext<'_>) -> Result<EncodedRequest, SoapError> {
        if call.method.is_empty() {
            return Err(SoapError::codec("method name must not be empty"));
        }

        let mut out = String::with_capacity(512);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<SOAP-ENV:Envelope xmlns:SOAP-ENV=\"{}\" xmlns:ns1=\"{}\" xmlns:xsd=\"{}\" xmlns:xsi=\"{}\">",
            ctx.version.envelope_namespace(),
            escape(ctx.namespace),
            XSD_NAMESPACE,
            XSI_NAMESPACE,
        ));

        if !call.input_headers.is_empty() {
            out.push_str("<SOAP-ENV:Header>");
            for (index, header) in call.input_headers.iter().enumerate() {
                self.write_header(&mut out, index, header, ctx.version);
            }
            out.push_str("</SOAP-ENV:Header>");
        }

        out.push_str("<SOAP-ENV:Body>");
        let method_tag = format!("ns1:{}", call.method);
        out.push_str(&format!("<{}>", method_tag));
        for (index, arg) in call.args.iter().enumerate() {
            self.write_element(&mut out, &format!("param{}", index), "", arg);
        }
        out.push_str(&format!("</{}>", method_tag));
        out.push_str("</SOAP-ENV:Body></SOAP-ENV:Envelope>\n");

        let action = ctx
            .action
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}#{}", ctx.namespace, call.method));

        trace!(method = %call.method, bytes = out.len(), "encoded request envelope");
        Ok(EncodedRequest {
            body: Bytes::from(out),
            action,
        })
    }

    fn decode(&self, response: &ResponseView<'_>) -> Result<Decoded, SoapError> {
        let envelope = match xml::parse_document(response.body) {
            Ok(root) if root.name == "Envelope" => root,
            _ => return Err(non_envelope_error(response)),
        };

        let headers = envelope
            .child("Header")
            .map(|header| {
                header
                    .children
                    .iter()
                    .map(|block| {
                        let mut map = Map::new();
                        map.insert(block.name.clone(), node_to_value(block));
                        Value::Object(map)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let body = envelope
            .child("Body")
            .ok_or_else(|| SoapError::codec("envelope has no Body element"))?;

        let value = match body.children.first() {
            None => Value::Null,
            Some(node) if node.name == "Fault" => {
                return Err(SoapError::Application(parse_fault(node)));
            }
            Some(node) if node.is_leaf() && node.text.is_empty() => Value::Null,
            Some(node) if node.is_leaf() => node_to_value(node),
            Some(node) if node.children.len() == 1 => node_to_value(&node.children[0]),
            Some(node) => children_to_value(node),
        };

        Ok(Decoded { value, headers })
    }
}

fn non_envelope_error(response: &ResponseView<'_>) -> SoapError {
    match response.status {
        Some(status) if status >= 400 => {
            let reason = response
                .reason
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP status {}", status));
            SoapError::application("HTTP", reason)
        }
        _ => SoapError::codec("looks like we got no XML document"),
    }
}

fn strip_prefix(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

fn parse_fault(node: &XmlNode) -> Fault {
    let text_of = |name: &str| node.child(name).map(|n| n.text.trim().to_string());

    // SOAP 1.2 nests code and reason; 1.1 uses flat faultcode/faultstring
    let (code, message, actor, detail) = if let Some(code) = node.child("Code") {
        let code = code
            .child("Value")
            .map(|v| strip_prefix(v.text.trim()).to_string())
            .unwrap_or_default();
        let message = node
            .child("Reason")
            .and_then(|r| r.child("Text"))
            .map(|t| t.text.trim().to_string())
            .unwrap_or_default();
        (code, message, text_of("Role"), node.child("Detail"))
    } else {
        let code = text_of("faultcode")
            .map(|c| strip_prefix(&c).to_string())
            .unwrap_or_default();
        let message = text_of("faultstring").unwrap_or_default();
        (code, message, text_of("faultactor"), node.child("detail"))
    };

    let mut fault = Fault::new(code, message);
    if let Some(actor) = actor {
        fault = fault.with_actor(actor);
    }
    if let Some(detail) = detail {
        fault = fault.with_detail(crate::value::unwrap_typed(node_to_value(detail)));
    }
    fault
}

fn is_nil(node: &XmlNode) -> bool {
    matches!(node.attr_ns(XSI_NAMESPACE, "nil"), Some("true") | Some("1"))
}

fn coerce_scalar(xsi_type: &str, value: Value) -> Value {
    let text = match &value {
        Value::String(text) => text.trim().to_string(),
        _ => return value,
    };
    match strip_prefix(xsi_type) {
        "int" | "integer" | "long" | "short" | "byte" | "unsignedInt" | "unsignedShort"
        | "unsignedByte" | "nonNegativeInteger" | "positiveInteger" | "negativeInteger"
        | "nonPositiveInteger" => text.parse::<i64>().map(Value::from).unwrap_or(value),
        "unsignedLong" => text.parse::<u64>().map(Value::from).unwrap_or(value),
        "float" | "double" | "decimal" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(value),
        "boolean" => match text.as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => value,
        },
        _ => value,
    }
}

fn node_to_value(node: &XmlNode) -> Value {
    if is_nil(node) {
        return Value::Null;
    }
    let value = if node.is_leaf() {
        Value::String(node.text.clone())
    } else {
        children_to_value(node)
    };
    match node.attr_ns(XSI_NAMESPACE, "type") {
        Some(xsi_type) => typed(xsi_type, coerce_scalar(xsi_type, value)),
        None => value,
    }
}

fn children_to_value(node: &XmlNode) -> Value {
    let first = match node.children.first() {
        Some(first) => first,
        None => return Value::Null,
    };
    let uniform = node.children.iter().all(|child| child.name == first.name);
    if uniform && (node.children.len() > 1 || first.name == "item") {
        return Value::Array(node.children.iter().map(node_to_value).collect());
    }

    let mut map = Map::new();
    for child in &node.children {
        let value = node_to_value(child);
        match map.get_mut(&child.name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
            None => {
                map.insert(child.name.clone(), value);
            }
        }
    }
    Value::Object(map)
}
