//! Scriptable SOAP endpoint for exercising soapcall clients, plus the shared
//! logging setup used by the workspace binaries.

pub mod logging;
pub mod server;

pub use logging::{init_logging, init_test_logging};
pub use server::{
    generate_wsdl, MockSoapServer, RecordedRequest, Reply, Route, ServerConfig, SoapTarget,
};
