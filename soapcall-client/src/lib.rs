//! Async SOAP RPC client.
//!
//! Calls made through a [`SoapClient`] run one at a time; calls made inside
//! [`SoapClient::run_batch`] are captured, executed concurrently and replayed so
//! that each caller gets exactly the result it would have gotten on its own.
//!
//! ```no_run
//! use serde_json::json;
//! use soapcall_client::{ClientConfig, SoapClient, SoapError};
//!
//! # async fn demo() -> Result<(), SoapError> {
//! let client = SoapClient::new(ClientConfig::for_endpoint("http://calc.test/soap", "urn:calc"))?;
//! let sum = client.call("add", vec![json!(1), json!(2)]).await?;
//!
//! let results = client
//!     .run_batch(|c| async move {
//!         c.call("add", vec![json!(1), json!(2)]).await?;
//!         c.call("divide", vec![json!(1), json!(0)]).await?;
//!         Ok::<(), SoapError>(())
//!     })
//!     .await?;
//! assert_eq!(results.len(), 2);
//! # let _ = sum;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod cookies;
mod description;
pub mod state;
pub mod wsdl_cache;

#[cfg(test)]
mod testing;

pub use client::{SoapClient, SoapClientBuilder};
pub use config::{ClientConfig, DEFAULT_USER_AGENT};
pub use cookies::CookieJar;
pub use state::EngineMode;
pub use wsdl_cache::{WsdlCache, WsdlCacheConfig};

pub use soapcall_core::{
    typed, unwrap_typed, CallOptions, Fault, LogicalCall, OutputHeaders, SoapError, SoapHeader,
    SoapVersion,
};
pub use soapcall_transport::{TlsOptions, TransferInfo};
