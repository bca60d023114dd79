pub mod call;
pub mod codec;
pub mod error;
pub mod ids;
pub mod value;
pub mod wsdl;
pub mod xml;

pub use call::{CallOptions, LogicalCall, OutputHeaders, SoapHeader, SoapVersion};
pub use codec::{
    Codec, Decoded, DecodedRequest, EncodeContext, EncodedRequest, ResponseView, XmlCodec,
};
pub use error::{Fault, SoapError};
pub use ids::{ConnectionId, ConnectionIdAllocator, RequestId, RequestIdAllocator};
pub use value::{is_typed_wrapper, typed, unwrap_typed};
pub use wsdl::{Endpoint, OperationInfo, ServiceDescription};
