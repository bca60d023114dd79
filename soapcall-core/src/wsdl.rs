//! Just enough WSDL 1.1 reading to default a client's endpoint, namespace and actions.

use crate::call::SoapVersion;
use crate::error::SoapError;
use crate::xml::{self, XmlNode};
use std::collections::BTreeMap;

pub const WSDL_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const WSDL_SOAP11_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const WSDL_SOAP12_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub location: String,
    pub version: SoapVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationInfo {
    pub soap_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceDescription {
    pub target_namespace: Option<String>,
    pub endpoints: Vec<Endpoint>,
    pub operations: BTreeMap<String, OperationInfo>,
}

fn binding_version(node: &XmlNode) -> Option<SoapVersion> {
    match node.namespace.as_deref() {
        Some(WSDL_SOAP11_NAMESPACE) => Some(SoapVersion::Soap11),
        Some(WSDL_SOAP12_NAMESPACE) => Some(SoapVersion::Soap12),
        _ => None,
    }
}

impl ServiceDescription {
    pub fn parse(bytes: &[u8]) -> Result<Self, SoapError> {
        let root = xml::parse_document(bytes)
            .map_err(|e| SoapError::Wsdl(format!("unparsable WSDL document: {}", e)))?;
        if root.name != "definitions" {
            return Err(SoapError::Wsdl(format!(
                "expected <definitions> root element, found <{}>",
                root.name
            )));
        }

        let mut description = ServiceDescription {
            target_namespace: root.attr("targetNamespace").map(str::to_string),
            ..Default::default()
        };

        for port_type in root.children_named("portType") {
            for operation in port_type.children_named("operation") {
                if let Some(name) = operation.attr("name") {
                    description.operations.entry(name.to_string()).or_default();
                }
            }
        }

        for binding in root.children_named("binding") {
            for operation in binding.children_named("operation") {
                let Some(name) = operation.attr("name") else {
                    continue;
                };
                let action = operation
                    .children
                    .iter()
                    .filter(|child| child.name == "operation" && binding_version(child).is_some())
                    .find_map(|child| child.attr("soapAction"))
                    .filter(|action| !action.is_empty());
                let info = description.operations.entry(name.to_string()).or_default();
                if info.soap_action.is_none() {
                    info.soap_action = action.map(str::to_string);
                }
            }
        }

        for service in root.children_named("service") {
            for port in service.children_named("port") {
                for address in port.children_named("address") {
                    if let (Some(version), Some(location)) =
                        (binding_version(address), address.attr("location"))
                    {
                        description.endpoints.push(Endpoint {
                            location: location.to_string(),
                            version,
                        });
                    }
                }
            }
        }

        if description.endpoints.is_empty() {
            return Err(SoapError::Wsdl("WSDL declares no SOAP endpoint".to_string()));
        }
        Ok(description)
    }

    /// Endpoint for `version`, falling back to the first declared one.
    pub fn endpoint(&self, version: SoapVersion) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.version == version)
            .or_else(|| self.endpoints.first())
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn soap_action(&self, operation: &str) -> Option<&str> {
        self.operations
            .get(operation)
            .and_then(|info| info.soap_action.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WSDL: &str = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
    xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    xmlns:soap12="http://schemas.xmlsoap.org/wsdl/soap12/"
    targetNamespace="urn:calc">
  <portType name="CalcPort">
    <operation name="add"/>
    <operation name="divide"/>
  </portType>
  <binding name="CalcBinding" type="CalcPort">
    <soap:binding style="rpc" transport="http://schemas.xmlsoap.org/soap/http"/>
    <operation name="add"><soap:operation soapAction="urn:calc#add"/></operation>
    <operation name="divide"><soap:operation soapAction=""/></operation>
  </binding>
  <service name="Calc">
    <port name="CalcPort11" binding="CalcBinding">
      <soap:address location="http://example.test/soap11"/>
    </port>
    <port name="CalcPort12" binding="CalcBinding12">
      <soap12:address location="http://example.test/soap12"/>
    </port>
  </service>
</definitions>"#;

    #[test]
    fn test_parse_service_description() {
        let description = ServiceDescription::parse(WSDL.as_bytes()).unwrap();
        assert_eq!(description.target_namespace.as_deref(), Some("urn:calc"));
        assert_eq!(description.endpoints.len(), 2);
        assert!(description.has_operation("add"));
        assert!(description.has_operation("divide"));
        assert!(!description.has_operation("multiply"));
        assert_eq!(description.soap_action("add"), Some("urn:calc#add"));
        assert_eq!(description.soap_action("divide"), None);
    }

    #[test]
    fn test_endpoint_selection_by_version() {
        let description = ServiceDescription::parse(WSDL.as_bytes()).unwrap();
        assert_eq!(
            description.endpoint(SoapVersion::Soap12).map(|e| e.location.as_str()),
            Some("http://example.test/soap12")
        );
        assert_eq!(
            description.endpoint(SoapVersion::Soap11).map(|e| e.location.as_str()),
            Some("http://example.test/soap11")
        );
    }

    #[test]
    fn test_rejects_non_wsdl() {
        let err = ServiceDescription::parse(b"<html><body/></html>").unwrap_err();
        assert!(matches!(err, SoapError::Wsdl(_)));
        let err = ServiceDescription::parse(b"plain text").unwrap_err();
        assert!(matches!(err, SoapError::Wsdl(_)));
    }

    #[test]
    fn test_requires_an_endpoint() {
        let doc = br#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" targetNamespace="urn:x"/>"#;
        assert!(ServiceDescription::parse(doc).is_err());
    }
}
