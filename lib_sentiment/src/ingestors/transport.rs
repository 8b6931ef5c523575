// Pluggable stream transport
//
// The lifecycle controller only needs "open a connection and give me bytes".
// Keeping that behind a trait lets the HTTP implementation, replayed
// transcripts and scripted test transports share the same pipeline.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use crate::types::StreamResult;

/// Raw chunks as they arrive. An `Err` item reports a transport failure and is
/// the last item of the stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = StreamResult<Bytes>> + Send>>;

/// A source of one long-lived byte stream per call.
///
/// Implementations must not retry on their own: reconnect policy belongs to
/// the lifecycle controller.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a new connection.
    ///
    /// Resolves once the server has accepted the request (success status
    /// received). A non-success status resolves to `StreamError::HttpStatus`
    /// without delivering any bytes.
    async fn open(&self) -> StreamResult<ByteStream>;

    /// Short description for logs, e.g. the endpoint URL.
    fn describe(&self) -> String;
}
