use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use serde_json::Value;
use soapcall_core::{Fault, SoapVersion, XmlCodec};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Computes replies for a method; the dynamic counterpart of a fixed [`Reply`].
#[async_trait]
pub trait SoapTarget: Send + Sync {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, Fault>;
}

#[derive(Clone)]
pub enum Reply {
    Value(Value),
    Fault(Fault),
    /// Answer with the first argument.
    Echo,
    Target(Arc<dyn SoapTarget>),
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Reply::Fault(fault) => f.debug_tuple("Fault").field(fault).finish(),
            Reply::Echo => f.write_str("Echo"),
            Reply::Target(_) => f.write_str("Target(..)"),
        }
    }
}

/// How one method is answered.
#[derive(Debug, Clone)]
pub struct Route {
    pub reply: Reply,
    pub delay: Duration,
    pub set_cookie: Option<String>,
}

impl Route {
    pub fn new(reply: Reply) -> Self {
        Route {
            reply,
            delay: Duration::ZERO,
            set_cookie: None,
        }
    }

    pub fn value(value: Value) -> Self {
        Self::new(Reply::Value(value))
    }

    pub fn fault(code: &str, message: &str) -> Self {
        Self::new(Reply::Fault(Fault::new(code, message)))
    }

    pub fn echo() -> Self {
        Self::new(Reply::Echo)
    }

    pub fn target(target: Arc<dyn SoapTarget>) -> Self {
        Self::new(Reply::Target(target))
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    pub fn with_set_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.set_cookie = Some(cookie.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// `0` picks a free port.
    pub port: u16,
    pub namespace: String,
    pub soap_version: SoapVersion,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            namespace: "urn:mock".to_string(),
            soap_version: SoapVersion::Soap11,
        }
    }
}

/// One request as received on `/soap`.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub args: Vec<Value>,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

struct ServerState {
    config: ServerConfig,
    base_url: String,
    codec: XmlCodec,
    routes: DashMap<String, Route>,
    hits: DashMap<String, usize>,
    wsdl_hits: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ServerState {
    fn record(&self, request: RecordedRequest) {
        *self.hits.entry(request.method.clone()).or_insert(0) += 1;
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }
}

/// Scriptable SOAP endpoint on a local port, stopped when dropped.
pub struct MockSoapServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl fmt::Debug for MockSoapServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSoapServer")
            .field("addr", &self.addr)
            .field("routes", &self.state.routes.len())
            .finish()
    }
}

impl MockSoapServer {
    /// Start on a free local port with the default configuration.
    pub async fn start<I, S>(routes: I) -> std::io::Result<Self>
    where
        I: IntoIterator<Item = (S, Route)>,
        S: Into<String>,
    {
        Self::start_with(ServerConfig::default(), routes).await
    }

    pub async fn start_with<I, S>(config: ServerConfig, routes: I) -> std::io::Result<Self>
    where
        I: IntoIterator<Item = (S, Route)>,
        S: Into<String>,
    {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(ServerState {
            base_url: format!("http://{}", addr),
            config,
            codec: XmlCodec::new(),
            routes: routes
                .into_iter()
                .map(|(method, route)| (method.into(), route))
                .collect(),
            hits: DashMap::new(),
            wsdl_hits: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let app = router(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(error = %e, "mock SOAP server stopped");
            }
        });
        info!(%addr, "mock SOAP server listening");

        Ok(MockSoapServer {
            addr,
            state,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Endpoint URL for SOAP posts.
    pub fn url(&self) -> String {
        format!("{}/soap", self.state.base_url)
    }

    pub fn wsdl_url(&self) -> String {
        format!("{}/wsdl", self.state.base_url)
    }

    pub fn namespace(&self) -> &str {
        &self.state.config.namespace
    }

    pub fn route(&self, method: impl Into<String>, route: Route) {
        self.state.routes.insert(method.into(), route);
    }

    pub fn hits(&self, method: &str) -> usize {
        self.state.hits.get(method).map(|count| *count).unwrap_or(0)
    }

    pub fn wsdl_hits(&self) -> usize {
        self.state.wsdl_hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait for the serving task; it only ends if the listener fails.
    pub async fn wait(mut self) -> std::io::Result<()> {
        (&mut self.handle).await.map_err(std::io::Error::other)
    }
}

impl Drop for MockSoapServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/soap", post(handle_soap))
        .route("/wsdl", get(handle_wsdl))
        .with_state(state)
}

fn xml_response(status: StatusCode, version: SoapVersion, body: Bytes) -> Response {
    (
        status,
        [(
            header::CONTENT_TYPE,
            format!("{}; charset=utf-8", version.media_type()),
        )],
        body,
    )
        .into_response()
}

async fn handle_soap(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let version = state.config.soap_version;
    let request = match state.codec.decode_request(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "rejecting malformed request");
            let fault = Fault::new("Client", format!("Bad Request: {}", e));
            return xml_response(
                StatusCode::BAD_REQUEST,
                version,
                state.codec.encode_fault(&fault, version),
            );
        }
    };

    let method = request.method.clone();
    let args = request.args.clone();
    state.record(RecordedRequest {
        method: request.method,
        args: request.args,
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
    });

    let route = state.routes.get(&method).map(|route| route.clone());
    let Some(route) = route else {
        debug!(method = %method, "no route for method");
        let fault = Fault::new("Client", format!("Function (\"{}\") is not a valid method", method));
        return xml_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            version,
            state.codec.encode_fault(&fault, version),
        );
    };

    if !route.delay.is_zero() {
        tokio::time::sleep(route.delay).await;
    }

    let outcome = match &route.reply {
        Reply::Value(value) => Ok(value.clone()),
        Reply::Fault(fault) => Err(fault.clone()),
        Reply::Echo => Ok(args.into_iter().next().unwrap_or(Value::Null)),
        Reply::Target(target) => target.call(&method, args).await,
    };
    debug!(method = %method, ok = outcome.is_ok(), "answering");

    let mut response = match outcome {
        Ok(value) => xml_response(
            StatusCode::OK,
            version,
            state
                .codec
                .encode_response(&method, &state.config.namespace, &value, version),
        ),
        Err(fault) => xml_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            version,
            state.codec.encode_fault(&fault, version),
        ),
    };
    if let Some(cookie) = route.set_cookie.as_deref() {
        if let Ok(value) = cookie.parse() {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

async fn handle_wsdl(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    state.wsdl_hits.fetch_add(1, Ordering::SeqCst);
    let mut methods: Vec<String> = state.routes.iter().map(|entry| entry.key().clone()).collect();
    methods.sort();
    let document = generate_wsdl(
        &state.config.namespace,
        &format!("{}/soap", state.base_url),
        state.config.soap_version,
        &methods,
    );
    ([(header::CONTENT_TYPE, "text/xml; charset=utf-8")], document)
}

/// Minimal RPC-style WSDL 1.1 document describing `methods` at `location`.
pub fn generate_wsdl(
    namespace: &str,
    location: &str,
    version: SoapVersion,
    methods: &[String],
) -> String {
    let (prefix, binding_ns) = match version {
        SoapVersion::Soap11 => ("soap", "http://schemas.xmlsoap.org/wsdl/soap/"),
        SoapVersion::Soap12 => ("soap12", "http://schemas.xmlsoap.org/wsdl/soap12/"),
    };
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<definitions xmlns=\"http://schemas.xmlsoap.org/wsdl/\" xmlns:{prefix}=\"{binding_ns}\" \
         xmlns:tns=\"{namespace}\" targetNamespace=\"{namespace}\">\n"
    ));
    out.push_str("  <portType name=\"MockPortType\">\n");
    for method in methods {
        out.push_str(&format!("    <operation name=\"{}\"/>\n", method));
    }
    out.push_str("  </portType>\n");
    out.push_str("  <binding name=\"MockBinding\" type=\"tns:MockPortType\">\n");
    out.push_str(&format!(
        "    <{prefix}:binding style=\"rpc\" transport=\"http://schemas.xmlsoap.org/soap/http\"/>\n"
    ));
    for method in methods {
        out.push_str(&format!(
            "    <operation name=\"{method}\"><{prefix}:operation soapAction=\"{namespace}#{method}\"/></operation>\n"
        ));
    }
    out.push_str("  </binding>\n");
    out.push_str("  <service name=\"MockService\">\n");
    out.push_str("    <port name=\"MockPort\" binding=\"tns:MockBinding\">\n");
    out.push_str(&format!("      <{prefix}:address location=\"{location}\"/>\n"));
    out.push_str("    </port>\n  </service>\n</definitions>\n");
    out
}
