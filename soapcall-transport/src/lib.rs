pub mod connection;
pub mod http;
pub mod multi;
pub mod payload;
pub mod request;
pub mod transport;

pub use connection::{Connection, ConnectionCache, ConnectionSettings, TlsOptions};
pub use http::ReqwestTransport;
pub use multi::{Completion, MultiDriver};
pub use request::{HttpMethod, PreparedRequest, RequestBuilder, RequestOptions};
pub use transport::{HttpTransport, RawResponse, TransferInfo, TransportError};
