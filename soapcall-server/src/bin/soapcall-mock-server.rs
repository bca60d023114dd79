//! soapcall mock server
//!
//! Serves a small calculator and echo service over SOAP 1.1 for manual testing
//! of clients. The port comes from `SOAPCALL_PORT` (default 8080) and logs go to
//! `./logs` as well as stderr.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use soapcall_core::Fault;
use soapcall_server::{init_logging, MockSoapServer, Route, ServerConfig, SoapTarget};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
struct CalculatorService;

fn number(args: &[Value], index: usize) -> Result<f64, Fault> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| Fault::new("Client", format!("argument {} must be a number", index)))
}

#[async_trait]
impl SoapTarget for CalculatorService {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, Fault> {
        match method {
            "add" => Ok(json!(number(&args, 0)? + number(&args, 1)?)),
            "multiply" => Ok(json!(number(&args, 0)? * number(&args, 1)?)),
            "divide" => {
                let divisor = number(&args, 1)?;
                if divisor == 0.0 {
                    return Err(Fault::new("Server", "Division by zero")
                        .with_detail(json!({"divisor": args[1].clone()})));
                }
                Ok(json!(number(&args, 0)? / divisor))
            }
            _ => Err(Fault::new("Client", format!("Unknown method: {}", method))),
        }
    }
}

#[derive(Debug)]
struct ClockService;

#[async_trait]
impl SoapTarget for ClockService {
    async fn call(&self, _method: &str, _args: Vec<Value>) -> Result<Value, Fault> {
        Ok(json!({ "now": chrono::Utc::now().to_rfc3339() }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("logs", "soapcall-mock-server")?;

    let port = match std::env::var("SOAPCALL_PORT") {
        Ok(port) => port
            .parse()
            .with_context(|| format!("SOAPCALL_PORT is not a port number: {}", port))?,
        Err(_) => 8080,
    };
    let config = ServerConfig {
        port,
        ..Default::default()
    };

    let calculator: Arc<dyn SoapTarget> = Arc::new(CalculatorService);
    let server = MockSoapServer::start_with(
        config,
        [
            ("add", Route::target(Arc::clone(&calculator))),
            ("multiply", Route::target(Arc::clone(&calculator))),
            ("divide", Route::target(calculator)),
            ("echo", Route::echo()),
            ("slowEcho", Route::echo().with_delay_ms(2_000)),
            ("now", Route::target(Arc::new(ClockService))),
            ("login", Route::value(json!(true)).with_set_cookie("session=mock; Path=/")),
        ],
    )
    .await
    .context("Failed to start mock server")?;

    info!("SOAP endpoint: {}", server.url());
    info!("WSDL:          {}", server.wsdl_url());

    server.wait().await.context("Mock server stopped")?;
    Ok(())
}
