//! Minimal namespace-aware element tree on top of `quick-xml`.

use crate::error::SoapError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttr {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub attrs: Vec<XmlAttr>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Attribute by local name, ignoring its prefix.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Attribute by namespace and local name.
    pub fn attr_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name && attr.namespace.as_deref() == Some(namespace))
            .map(|attr| attr.value.as_str())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first walk over this node and all descendants.
    pub fn descendants(&self) -> Vec<&XmlNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

struct Scope {
    bindings: HashMap<String, String>,
}

fn split_qname(raw: &[u8]) -> (Option<String>, String) {
    let raw = String::from_utf8_lossy(raw);
    match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, raw.into_owned()),
    }
}

fn resolve(scopes: &[Scope], prefix: Option<&str>) -> Option<String> {
    let key = prefix.unwrap_or("");
    scopes
        .iter()
        .rev()
        .find_map(|scope| scope.bindings.get(key))
        .filter(|uri| !uri.is_empty())
        .cloned()
}

fn open_element(start: &BytesStart<'_>, scopes: &mut Vec<Scope>) -> Result<XmlNode, SoapError> {
    let mut bindings = HashMap::new();
    let mut raw_attrs = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| SoapError::codec(format!("bad attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            bindings.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            bindings.insert(prefix.to_string(), value);
        } else {
            raw_attrs.push((key, value));
        }
    }
    scopes.push(Scope { bindings });

    let (prefix, name) = split_qname(start.name().as_ref());
    let namespace = resolve(scopes, prefix.as_deref());
    let attrs = raw_attrs
        .into_iter()
        .map(|(key, value)| {
            let (prefix, name) = split_qname(key.as_bytes());
            // unprefixed attributes carry no namespace
            let namespace = prefix
                .as_deref()
                .and_then(|p| resolve(scopes, Some(p)));
            XmlAttr {
                prefix,
                namespace,
                name,
                value,
            }
        })
        .collect();

    Ok(XmlNode {
        prefix,
        namespace,
        name,
        attrs,
        children: Vec::new(),
        text: String::new(),
    })
}

fn close_element(
    node: XmlNode,
    stack: &mut Vec<XmlNode>,
    scopes: &mut Vec<Scope>,
) -> Option<XmlNode> {
    scopes.pop();
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            None
        }
        None => Some(node),
    }
}

/// Parse `bytes` into the root element. Text outside the root is rejected.
pub fn parse_document(bytes: &[u8]) -> Result<XmlNode, SoapError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut scopes: Vec<Scope> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let node = open_element(&start, &mut scopes)?;
                stack.push(node);
            }
            Event::Empty(start) => {
                let node = open_element(&start, &mut scopes)?;
                if let Some(root) = close_element(node, &mut stack, &mut scopes) {
                    return Ok(root);
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| SoapError::codec("unbalanced end tag"))?;
                if let Some(root) = close_element(node, &mut stack, &mut scopes) {
                    return Ok(root);
                }
            }
            Event::Text(text) => match stack.last_mut() {
                Some(top) => top.text.push_str(&text.unescape()?),
                None => return Err(SoapError::codec("text outside of the document element")),
            },
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => return Err(SoapError::codec("no XML document element")),
            _ => {}
        }
    }
}
