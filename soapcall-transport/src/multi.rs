//! Drives many prepared requests concurrently from a single task.

use crate::request::PreparedRequest;
use crate::transport::{HttpTransport, RawResponse, TransportError};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use soapcall_core::RequestId;
use std::fmt;
use std::sync::Arc;

/// One finished operation, reported exactly once.
#[derive(Debug)]
pub struct Completion {
    pub id: RequestId,
    pub result: Result<RawResponse, TransportError>,
}

/// Registration set of in-flight operations.
///
/// All registered operations advance whenever the driver is polled;
/// [`next_completed`](MultiDriver::next_completed) parks on I/O readiness until
/// one of them finishes and removes it from the set.
pub struct MultiDriver<T: ?Sized> {
    transport: Arc<T>,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl<T> MultiDriver<T>
where
    T: HttpTransport + ?Sized + 'static,
{
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn register(&mut self, request: Arc<PreparedRequest>) {
        let transport = Arc::clone(&self.transport);
        self.in_flight.push(Box::pin(async move {
            let result = transport.execute(&request).await;
            Completion {
                id: request.id,
                result,
            }
        }));
    }

    pub fn active(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Next finished operation, or `None` once nothing is registered.
    pub async fn next_completed(&mut self) -> Option<Completion> {
        self.in_flight.next().await
    }
}

impl<T: ?Sized> fmt::Debug for MultiDriver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiDriver")
            .field("active", &self.in_flight.len())
            .finish()
    }
}
