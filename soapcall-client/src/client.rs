// SOAP RPC Client
// Every call goes through the same three steps:
// - prepare: encode the envelope and bind a connection handle, no I/O
// - execute: send it, or defer it while a batch is capturing
// - finish: decode the response and unwrap typed values
// `run_batch` (batch.rs) reuses these steps to run many calls concurrently.

use crate::config::ClientConfig;
use crate::cookies::CookieJar;
use crate::description;
use crate::state::{Engine, EngineMode};
use bytes::Bytes;
use indexmap::IndexMap;
use serde_json::Value;
use soapcall_core::{
    unwrap_typed, Codec, EncodeContext, LogicalCall, ResponseView, ServiceDescription, SoapError,
    SoapVersion, XmlCodec,
};
use soapcall_transport::{
    ConnectionCache, ConnectionSettings, HttpTransport, PreparedRequest, RawResponse,
    RequestBuilder, RequestOptions, ReqwestTransport, TlsOptions, TransferInfo,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

/// What the executor did with a prepared request.
#[derive(Debug)]
pub(crate) enum Exchange {
    /// The exchange completed, possibly with an HTTP error status.
    Ready(RawResponse),
    /// A batch is capturing; the request was not sent.
    Deferred(Arc<PreparedRequest>),
    /// No response could be obtained.
    Faulted(SoapError),
}

/// Mutable per-client state shared by all calls.
#[derive(Debug, Default)]
struct Session {
    location: Option<String>,
    /// Keyed by lowercased name.
    headers: IndexMap<String, (String, String)>,
    cookies: CookieJar,
    tls: TlsOptions,
    last_request: Option<Bytes>,
    last_request_headers: Option<String>,
    last_response: Option<Bytes>,
    last_response_headers: Option<String>,
    last_transfer: Option<TransferInfo>,
}

struct ClientInner {
    config: ClientConfig,
    namespace: String,
    service: Option<ServiceDescription>,
    codec: Arc<dyn Codec>,
    transport: Arc<dyn HttpTransport>,
    requests: RequestBuilder,
    engine: Engine,
    session: Mutex<Session>,
}

/// Handle to a SOAP endpoint. Clones share connections, session and batch state.
#[derive(Clone)]
pub struct SoapClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for SoapClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoapClient")
            .field("namespace", &self.inner.namespace)
            .field("location", &self.location())
            .field("mode", &self.inner.engine.mode())
            .finish_non_exhaustive()
    }
}

impl SoapClient {
    /// Client for an endpoint used without a service description.
    ///
    /// `config.location` and `config.uri` are both required.
    pub fn new(config: ClientConfig) -> Result<Self, SoapError> {
        Self::assemble(
            config,
            None,
            Arc::new(XmlCodec::new()),
            Arc::new(ReqwestTransport::new()),
            RequestBuilder::new(Arc::new(ConnectionCache::new())),
        )
    }

    pub fn builder() -> SoapClientBuilder {
        SoapClientBuilder::new()
    }

    fn assemble(
        config: ClientConfig,
        service: Option<ServiceDescription>,
        codec: Arc<dyn Codec>,
        transport: Arc<dyn HttpTransport>,
        requests: RequestBuilder,
    ) -> Result<Self, SoapError> {
        let location = config.location.clone().or_else(|| {
            service
                .as_ref()
                .and_then(|service| service.endpoint(config.soap_version))
                .map(|endpoint| endpoint.location.clone())
        });
        if service.is_none() && location.is_none() {
            return Err(SoapError::client("'location' option is required in non-WSDL mode"));
        }
        let namespace = config
            .uri
            .clone()
            .or_else(|| service.as_ref().and_then(|s| s.target_namespace.clone()))
            .ok_or_else(|| SoapError::client("'uri' option is required in non-WSDL mode"))?;

        let session = Session {
            location,
            tls: config.tls.clone(),
            ..Default::default()
        };
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                namespace,
                service,
                codec,
                transport,
                requests,
                engine: Engine::default(),
                session: Mutex::new(session),
            }),
        })
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub(crate) fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.inner.transport
    }

    /// Call `method` with positional arguments.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, SoapError> {
        self.invoke(LogicalCall::new(method, args)).await
    }

    /// Run one logical call.
    ///
    /// While a batch is capturing this only queues the call and returns `Null`;
    /// the real result is delivered by `run_batch`. A call that cannot even be
    /// prepared still takes its place in the batch, holding the same error.
    pub async fn invoke(&self, call: LogicalCall) -> Result<Value, SoapError> {
        let request = match self.prepare(&call) {
            Ok(request) => request,
            Err(err) => {
                if self.inner.engine.mode() == EngineMode::Capturing {
                    let position = self.inner.engine.enqueue_failed(err.clone());
                    debug!(method = %call.method, position, error = %err, "call failed during capture");
                }
                return Err(err);
            }
        };
        match self.execute(request).await {
            Exchange::Ready(response) => self.finish(&call, &response),
            Exchange::Deferred(request) => {
                let id = request.id;
                let method = call.method.clone();
                let position = self.inner.engine.enqueue(request, call);
                debug!(request = %id, method = %method, position, "captured call for batch");
                Ok(Value::Null)
            }
            Exchange::Faulted(err) => Err(err),
        }
    }

    /// Build the network operation for `call` without performing I/O.
    pub(crate) fn prepare(&self, call: &LogicalCall) -> Result<Arc<PreparedRequest>, SoapError> {
        if let Some(forced) = self.inner.engine.forced_request() {
            trace!(request = %forced.id, method = %call.method, "reusing forced request");
            return Ok(forced);
        }

        if let Some(service) = &self.inner.service {
            if !service.operations.is_empty() && !service.has_operation(&call.method) {
                return Err(SoapError::client(format!(
                    "Function (\"{}\") is not a valid method for this service",
                    call.method
                )));
            }
        }

        let version = self.inner.config.soap_version;
        let namespace = call.options.uri.as_deref().unwrap_or(&self.inner.namespace);
        let action = call.options.soap_action.as_deref().or_else(|| {
            self.inner
                .service
                .as_ref()
                .and_then(|service| service.soap_action(&call.method))
        });
        let encoded = self.inner.codec.encode(
            call,
            &EncodeContext {
                namespace,
                version,
                action,
            },
        )?;

        let (location, options) = {
            let session = self.session();
            let location = call
                .options
                .location
                .clone()
                .or_else(|| session.location.clone())
                .ok_or_else(|| SoapError::client("no endpoint location configured"))?;
            let options = self.request_options(&session, &location, call.options.timeout_ms);
            (location, options)
        };

        let request = self.inner.requests.prepare(
            encoded.body,
            &location,
            &encoded.action,
            version,
            &options,
        )?;
        Ok(Arc::new(request))
    }

    fn request_options(
        &self,
        session: &Session,
        location: &str,
        timeout_ms: Option<u64>,
    ) -> RequestOptions {
        let config = &self.inner.config;
        let (host, path) = reqwest::Url::parse(location)
            .map(|url| (url.host_str().unwrap_or_default().to_string(), url.path().to_string()))
            .unwrap_or_default();
        RequestOptions {
            timeout: config.request_timeout(timeout_ms),
            user_agent: Some(config.user_agent.clone()),
            basic_auth: config.basic_auth(),
            custom_headers: session.headers.values().cloned().collect(),
            cookies: session.cookies.pairs_for(&host, &path),
            connection: ConnectionSettings {
                tls: session.tls.clone(),
                keep_alive: config.keep_alive,
            },
            async_active: self.inner.engine.mode() == EngineMode::Capturing,
        }
    }

    /// Perform the exchange, consume a forced outcome, or defer while capturing.
    pub(crate) async fn execute(&self, request: Arc<PreparedRequest>) -> Exchange {
        let outcome = match self.inner.engine.mode() {
            EngineMode::Capturing => return Exchange::Deferred(request),
            EngineMode::Idle | EngineMode::Executing => {
                match self.inner.engine.take_forced(request.id) {
                    Some(outcome) => outcome,
                    None => self.inner.transport.execute(&request).await,
                }
            }
        };

        self.record_request(&request);
        match outcome {
            Ok(response) => {
                self.record_response(Some(&response));
                Exchange::Ready(response)
            }
            Err(err) => {
                warn!(request = %request.id, url = %request.url, error = %err, "request failed");
                self.record_response(None);
                Exchange::Faulted(err.into())
            }
        }
    }

    fn finish(&self, call: &LogicalCall, response: &RawResponse) -> Result<Value, SoapError> {
        let decoded = self.inner.codec.decode(&ResponseView {
            status: response.status,
            reason: response.reason.as_deref(),
            body: &response.body,
        })?;
        if let Some(slot) = &call.output_headers {
            slot.set(decoded.headers.into_iter().map(unwrap_typed).collect());
        }
        Ok(unwrap_typed(decoded.value))
    }

    fn record_request(&self, request: &PreparedRequest) {
        let mut session = self.session();
        session.last_request = Some(request.body.clone());
        session.last_request_headers = Some(request.header_block());
    }

    fn record_response(&self, response: Option<&RawResponse>) {
        let mut session = self.session();
        match response {
            Some(response) => {
                for set_cookie in response.header_values("set-cookie") {
                    session.cookies.absorb(set_cookie);
                }
                session.last_response = Some(response.body.clone());
                session.last_response_headers = Some(response.header_block());
                session.last_transfer = Some(response.info.clone());
            }
            None => {
                session.last_response = None;
                session.last_response_headers = None;
                session.last_transfer = None;
            }
        }
    }

    /// Send `name: value` with every later request, or stop sending it with `None`.
    pub fn set_header(&self, name: &str, value: Option<&str>) {
        let key = name.to_ascii_lowercase();
        let mut session = self.session();
        match value {
            Some(value) => {
                session
                    .headers
                    .insert(key, (name.to_string(), value.to_string()));
            }
            None => {
                session.headers.shift_remove(&key);
            }
        }
    }

    pub fn set_cookie(&self, name: &str, value: Option<&str>) {
        self.session().cookies.set(name, value);
    }

    /// Cookie name to `[value, path?, domain?]`.
    pub fn cookies(&self) -> BTreeMap<String, Vec<String>> {
        self.session().cookies.snapshot()
    }

    /// Replace the endpoint URL, returning the previous one.
    pub fn set_location(&self, location: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.session().location, location)
    }

    pub fn location(&self) -> Option<String> {
        self.session().location.clone()
    }

    /// Change TLS settings; cached connections built with the old ones are rebuilt on next use.
    /// Use `tls` for later requests. Cached connections are dropped and PEM
    /// files are read again on next use.
    pub fn set_tls_options(&self, tls: TlsOptions) {
        self.session().tls = tls;
        self.inner.requests.connections().clear();
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn soap_version(&self) -> SoapVersion {
        self.inner.config.soap_version
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn service(&self) -> Option<&ServiceDescription> {
        self.inner.service.as_ref()
    }

    /// Operation names declared by the service description.
    pub fn functions(&self) -> Vec<String> {
        self.inner
            .service
            .as_ref()
            .map(|service| service.operations.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn connections(&self) -> &Arc<ConnectionCache> {
        self.inner.requests.connections()
    }

    pub fn mode(&self) -> EngineMode {
        self.inner.engine.mode()
    }

    pub fn last_request(&self) -> Option<Bytes> {
        self.session().last_request.clone()
    }

    pub fn last_request_headers(&self) -> Option<String> {
        self.session().last_request_headers.clone()
    }

    pub fn last_response(&self) -> Option<Bytes> {
        self.session().last_response.clone()
    }

    pub fn last_response_headers(&self) -> Option<String> {
        self.session().last_response_headers.clone()
    }

    pub fn last_transfer_info(&self) -> Option<TransferInfo> {
        self.session().last_transfer.clone()
    }
}

/// Builder for clients that load a service description or swap out the codec or transport.
pub struct SoapClientBuilder {
    config: ClientConfig,
    wsdl: Option<String>,
    codec: Option<Arc<dyn Codec>>,
    transport: Option<Arc<dyn HttpTransport>>,
    connections: Option<Arc<ConnectionCache>>,
}

impl fmt::Debug for SoapClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoapClientBuilder")
            .field("config", &self.config)
            .field("wsdl", &self.wsdl)
            .finish_non_exhaustive()
    }
}

impl Default for SoapClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SoapClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            wsdl: None,
            codec: None,
            transport: None,
            connections: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// URL, `file://` URL or filesystem path of a WSDL document.
    pub fn wsdl(mut self, source: impl Into<String>) -> Self {
        self.wsdl = Some(source.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.location = Some(location.into());
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.config.uri = Some(uri.into());
        self
    }

    pub fn soap_version(mut self, version: SoapVersion) -> Self {
        self.config.soap_version = version;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn connection_cache(mut self, connections: Arc<ConnectionCache>) -> Self {
        self.connections = Some(connections);
        self
    }

    pub async fn build(self) -> Result<SoapClient, SoapError> {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let requests = RequestBuilder::new(
            self.connections
                .unwrap_or_else(|| Arc::new(ConnectionCache::new())),
        );
        let service = match &self.wsdl {
            Some(source) => {
                Some(description::load(source, &self.config, &requests, transport.as_ref()).await?)
            }
            None => None,
        };
        SoapClient::assemble(
            self.config,
            service,
            self.codec.unwrap_or_else(|| Arc::new(XmlCodec::new())),
            transport,
            requests,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedTransport};
    use soapcall_core::{CallOptions, Fault, OutputHeaders};
    use soapcall_transport::TransportError;
    use serde_json::json;

    const WSDL: &str = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
    xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    targetNamespace="urn:calc">
  <portType name="CalcPort"><operation name="add"/></portType>
  <binding name="CalcBinding" type="CalcPort">
    <operation name="add"><soap:operation soapAction="urn:calc#add"/></operation>
  </binding>
  <service name="Calc">
    <port name="CalcPort" binding="CalcBinding">
      <soap:address location="http://calc.test/soap"/>
    </port>
  </service>
</definitions>"#;

    async fn client_with(transport: Arc<ScriptedTransport>) -> SoapClient {
        SoapClient::builder()
            .location("http://calc.test/soap")
            .uri("urn:calc")
            .transport(transport)
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_call_returns_unwrapped_value() {
        let transport = Arc::new(ScriptedTransport::new().route(
            "add",
            0,
            Reply::Value(json!({"sum": 3, "parts": [1, 2]})),
        ));
        let client = client_with(Arc::clone(&transport)).await;

        let value = client.call("add", vec![json!(1), json!(2)]).await.unwrap();
        assert_eq!(value, json!({"sum": 3, "parts": [1, 2]}));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("SOAPAction"), Some("\"urn:calc#add\""));
        assert!(String::from_utf8_lossy(&client.last_request().unwrap()).contains("<ns1:add>"));
        assert!(client
            .last_request_headers()
            .unwrap()
            .starts_with("POST /soap HTTP/1.1\r\n"));
        assert!(client
            .last_response_headers()
            .unwrap()
            .starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(client.last_transfer_info().unwrap().status, Some(200));
        assert_eq!(client.mode(), EngineMode::Idle);
    }

    #[tokio::test]
    async fn test_fault_becomes_application_error() {
        let transport = Arc::new(ScriptedTransport::new().route(
            "divide",
            0,
            Reply::Fault(Fault::new("Server", "Division by zero")),
        ));
        let client = client_with(transport).await;

        let err = client.call("divide", vec![json!(1), json!(0)]).await.unwrap_err();
        assert_eq!(err.fault_code(), "Server");
        assert_eq!(err.as_fault().unwrap().message, "Division by zero");
        assert!(client.last_response().is_some());
    }

    #[tokio::test]
    async fn test_transport_failures_are_classified() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("slow", 0, Reply::Fail(TransportError::Timeout("deadline".into())))
                .route("down", 0, Reply::Fail(TransportError::Connect("refused".into()))),
        );
        let client = client_with(transport).await;

        let err = client.call("slow", vec![]).await.unwrap_err();
        assert!(err.is_timeout());
        let err = client.call("down", vec![]).await.unwrap_err();
        assert!(matches!(err, SoapError::Transport(_)));
        assert!(client.last_response().is_none());
        assert!(client.last_request().is_some());
    }

    #[tokio::test]
    async fn test_non_envelope_responses() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("broken", 0, Reply::Raw(200, "not xml"))
                .route("missing", 0, Reply::Raw(404, "<html>gone</html>")),
        );
        let client = client_with(transport).await;

        let err = client.call("broken", vec![]).await.unwrap_err();
        assert!(matches!(err, SoapError::Codec(_)));
        let err = client.call("missing", vec![]).await.unwrap_err();
        assert_eq!(err.fault_code(), "HTTP");
    }

    #[tokio::test]
    async fn test_sequential_calls_reuse_connection() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(Arc::clone(&transport)).await;

        client.call("echo", vec![json!("a")]).await.unwrap();
        client.call("echo", vec![json!("b")]).await.unwrap();
        let sent = transport.sent();
        assert_eq!(sent[0].connection, sent[1].connection);
        assert_eq!(client.connections().len(), 1);

        client.set_tls_options(TlsOptions {
            verify_peer: false,
            ..Default::default()
        });
        client.call("echo", vec![json!("c")]).await.unwrap();
        assert_ne!(transport.sent()[2].connection, sent[0].connection);
    }

    #[tokio::test]
    async fn test_cookies_round_trip() {
        let transport = Arc::new(
            ScriptedTransport::new().with_response_header("login", "Set-Cookie", "sid=abc; Path=/"),
        );
        let client = client_with(Arc::clone(&transport)).await;
        client.set_cookie("lang", Some("en"));

        client.call("login", vec![]).await.unwrap();
        assert_eq!(transport.sent()[0].header("Cookie"), Some("lang=en"));
        assert_eq!(client.cookies().get("sid"), Some(&vec!["abc".to_string(), "/".to_string()]));

        client.call("echo", vec![]).await.unwrap();
        assert_eq!(transport.sent()[1].header("Cookie"), Some("lang=en; sid=abc"));

        client.set_cookie("lang", None);
        client.set_cookie("sid", None);
        client.call("echo", vec![]).await.unwrap();
        assert_eq!(transport.sent()[2].header("Cookie"), None);
    }

    #[tokio::test]
    async fn test_custom_headers_and_call_options() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(Arc::clone(&transport)).await;
        client.set_header("X-Trace", Some("t-1"));
        client.set_header("User-Agent", Some("custom/1.0"));

        let call = LogicalCall::new("echo", vec![json!(1)]).with_options(
            CallOptions::default()
                .with_soap_action("urn:other#echo")
                .with_location("http://other.test/rpc"),
        );
        client.invoke(call).await.unwrap();

        let sent = &transport.sent()[0];
        assert_eq!(sent.header("x-trace"), Some("t-1"));
        assert_eq!(sent.header("User-Agent"), Some("custom/1.0"));
        assert_eq!(sent.header("SOAPAction"), Some("\"urn:other#echo\""));
        assert_eq!(sent.header("Host"), Some("other.test"));

        client.set_header("X-Trace", None);
        client.call("echo", vec![]).await.unwrap();
        assert_eq!(transport.sent()[1].header("x-trace"), None);
    }

    #[tokio::test]
    async fn test_output_headers_are_filled() {
        const ENVELOPE: &str = concat!(
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<SOAP-ENV:Header><Quota xsi:type="xsd:int">9</Quota></SOAP-ENV:Header>"#,
            r#"<SOAP-ENV:Body><getResponse><return>ok</return></getResponse></SOAP-ENV:Body>"#,
            r#"</SOAP-ENV:Envelope>"#
        );
        let transport = Arc::new(ScriptedTransport::new().route("get", 0, Reply::Raw(200, ENVELOPE)));
        let client = client_with(transport).await;

        let slot = OutputHeaders::new();
        let value = client
            .invoke(LogicalCall::new("get", vec![]).with_output_headers(slot.clone()))
            .await
            .unwrap();
        assert_eq!(value, json!("ok"));
        assert_eq!(slot.get(), vec![json!({"Quota": 9})]);
    }

    #[tokio::test]
    async fn test_non_wsdl_mode_requires_location_and_uri() {
        let err = SoapClient::new(ClientConfig::default()).unwrap_err();
        assert!(err.to_string().contains("'location'"));
        let err = SoapClient::new(ClientConfig {
            location: Some("http://calc.test/soap".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("'uri'"));
        assert!(SoapClient::new(ClientConfig::for_endpoint("http://calc.test/soap", "urn:calc")).is_ok());
    }

    #[tokio::test]
    async fn test_wsdl_mode_defaults_and_rejects_unknown_operations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calc.wsdl");
        std::fs::write(&path, WSDL).unwrap();

        let transport = Arc::new(ScriptedTransport::new());
        let mut config = ClientConfig::default();
        config.wsdl_cache.enabled = false;
        let client = SoapClient::builder()
            .config(config)
            .wsdl(format!("file://{}", path.display()))
            .transport(transport.clone())
            .build()
            .await
            .unwrap();

        assert_eq!(client.namespace(), "urn:calc");
        assert_eq!(client.location().as_deref(), Some("http://calc.test/soap"));
        assert_eq!(client.functions(), vec!["add".to_string()]);

        client.call("add", vec![json!(5)]).await.unwrap();
        assert_eq!(transport.sent()[0].header("SOAPAction"), Some("\"urn:calc#add\""));

        let err = client.call("subtract", vec![]).await.unwrap_err();
        assert!(matches!(err, SoapError::Client(_)));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_wsdl_file_is_wsdl_error() {
        let mut config = ClientConfig::default();
        config.wsdl_cache.enabled = false;
        let err = SoapClient::builder()
            .config(config)
            .wsdl("/definitely/not/here.wsdl")
            .transport(Arc::new(ScriptedTransport::new()))
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, SoapError::Wsdl(_)));
    }
}
